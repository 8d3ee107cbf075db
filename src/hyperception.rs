//! The hyperception model builder: a hypertunable adaptation of Xception.
//!
//! Resolution and assembly happen in one pass: defaults are merged with the
//! caller's overrides, the layer graph is assembled stage by stage (each stage
//! a named entry, so the chosen topology stays inspectable), and the optimizer
//! selected by the `optimizer` hyperparameter is compiled in.

use crate::blocks::{conv_block, dense_block};
use crate::error::{HyperceptionError, Result};
use crate::hparams::{default_fixed_hparams, default_hparams, Hparam, Hparams};
use crate::model::Model;
use crate::nn::layers::{
    Activation, Flatten, GlobalAvgPool2d, GlobalMaxPool2d, Linear, Residual, Softmax,
};
use crate::shape::{conv_output_hw, same_padding};

/// Builder for hyperception models.
///
/// ```
/// use hyperception::Hyperception;
///
/// let model = Hyperception::new(&[3, 32, 32], 10)
///     .hparam("num_residual_blocks", 2usize)
///     .build()
///     .unwrap();
/// assert_eq!(model.num_classes(), 10);
/// ```
pub struct Hyperception {
    input_shape: Vec<usize>,
    num_classes: usize,
    overrides: Hparams,
}

impl Hyperception {
    pub fn new(input_shape: &[usize], num_classes: usize) -> Self {
        Hyperception {
            input_shape: input_shape.to_vec(),
            num_classes,
            overrides: Hparams::new(),
        }
    }

    /// Override a single hyperparameter.
    #[must_use]
    pub fn hparam(mut self, key: impl Into<String>, value: impl Into<Hparam>) -> Self {
        self.overrides.set(key, value);
        self
    }

    /// Override a batch of hyperparameters.
    #[must_use]
    pub fn hparams(mut self, overrides: Hparams) -> Self {
        self.overrides.merge(&overrides);
        self
    }

    /// Resolve against the full defaults, assemble, and compile.
    pub fn build(&self) -> Result<Model> {
        let mut hp = default_hparams(&self.input_shape, self.num_classes);
        hp.merge(&self.overrides);
        build_resolved(&self.input_shape, self.num_classes, &hp)
    }

    /// Resolve against the single fixed configuration, assemble, and compile.
    pub fn build_fixed(&self) -> Result<Model> {
        let mut hp = default_fixed_hparams(&self.input_shape, self.num_classes);
        hp.merge(&self.overrides);
        build_resolved(&self.input_shape, self.num_classes, &hp)
    }

    /// Defer construction: the search framework calls the returned closure
    /// once per trial, getting a freshly initialized model each time.
    pub fn model_fn(self) -> impl Fn() -> Result<Model> {
        move || self.build()
    }
}

/// Assemble and compile from an already-resolved hyperparameter mapping.
fn build_resolved(input_shape: &[usize], num_classes: usize, hp: &Hparams) -> Result<Model> {
    if input_shape.len() != 3 || input_shape.iter().any(|&d| d == 0) || num_classes == 0 {
        return Err(HyperceptionError::InvalidShape(input_shape.to_vec()));
    }

    // [general]
    let kernel_size = hp.get_pair("kernel_size")?;
    let initial_strides = hp.get_pair("initial_strides")?;
    let activation = Activation::from_name(hp.get_str("activation")?)?;

    // [entry flow]
    let conv2d_num_filters = hp.get_usize("conv2d_num_filters")?;
    let sep_num_filters = hp.get_usize("sep_num_filters")?;

    // [middle flow]
    let num_residual_blocks = hp.get_usize("num_residual_blocks")?;

    // [exit flow]
    let dense_merge_type = hp.get_str("dense_merge_type")?;
    let num_dense_layers = hp.get_usize("num_dense_layers")?;
    let dropout_rate = hp.get_f32("dropout_rate")?;
    let dense_use_bn = hp.get_bool("dense_use_bn")?;

    let (mut channels, mut height, mut width) = (input_shape[0], input_shape[1], input_shape[2]);
    let mut builder = crate::nn::layers::Sequential::builder();

    // Initial conv
    builder = builder.add_named(
        "conv1",
        Box::new(conv_block(
            channels,
            conv2d_num_filters,
            kernel_size,
            initial_strides,
            activation,
        )),
    );
    channels = conv2d_num_filters;
    let (h, w) = conv_output_hw(
        (height, width),
        kernel_size,
        initial_strides,
        same_padding(kernel_size),
    );
    height = h;
    width = w;

    // Middle flow: resolution-preserving residual blocks
    let mut dims = sep_num_filters;
    for i in 0..num_residual_blocks {
        builder = builder.add_named(
            format!("residual_{}", i),
            Box::new(Residual::new(channels, dims, activation, false)),
        );
        channels = dims;
    }

    // Exit flow: one downsampling residual block at doubled width
    dims *= 2;
    builder = builder.add_named(
        "residual_exit",
        Box::new(Residual::new(channels, dims, activation, true)),
    );
    channels = dims;
    let (h, w) = conv_output_hw((height, width), (3, 3), (2, 2), (1, 1));
    height = h;
    width = w;

    // Merge down to a flat feature vector. Anything other than the two
    // recognized values falls back to global max pooling (see DESIGN.md).
    let mut features = match dense_merge_type {
        "flatten" => {
            builder = builder.add_named("flatten", Box::new(Flatten::new()));
            channels * height * width
        }
        "avg" => {
            builder = builder.add_named("global_avg_pool", Box::new(GlobalAvgPool2d));
            channels
        }
        _ => {
            builder = builder.add_named("global_max_pool", Box::new(GlobalMaxPool2d));
            channels
        }
    };

    // Dense stack
    for i in 0..num_dense_layers {
        builder = builder.add_named(
            format!("dense_{}", i),
            Box::new(dense_block(
                features,
                num_classes,
                activation,
                dense_use_bn,
                dropout_rate,
            )),
        );
        features = num_classes;
    }

    // Classification head
    builder = builder.add_named("classifier", Box::new(Linear::new(features, num_classes, true)));
    builder = builder.add_named("softmax", Box::new(Softmax));

    let mut model = Model::new(builder.build(), input_shape.to_vec(), num_classes);
    model.compile(hp)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{seed_rng, RawTensor};

    #[test]
    fn test_default_build_is_compiled() {
        let model = Hyperception::new(&[3, 32, 32], 10).build().unwrap();
        assert!(model.is_compiled());
        assert_eq!(model.input_shape(), &[3, 32, 32]);
        assert_eq!(model.num_classes(), 10);
    }

    #[test]
    fn test_invalid_shape_is_rejected() {
        assert!(Hyperception::new(&[32, 32], 10).build().is_err());
        assert!(Hyperception::new(&[3, 0, 32], 10).build().is_err());
        assert!(Hyperception::new(&[3, 32, 32], 0).build().is_err());
    }

    #[test]
    fn test_model_fn_defers_construction() {
        seed_rng(7);
        let model_fn = Hyperception::new(&[1, 16, 16], 4)
            .hparam("num_residual_blocks", 1usize)
            .model_fn();
        let a = model_fn().unwrap();
        let b = model_fn().unwrap();
        // each call constructs a fresh model with its own initialization
        let pa = a.parameters();
        let pb = b.parameters();
        assert_eq!(pa.len(), pb.len());
        assert_ne!(pa[0].borrow().data, pb[0].borrow().data);
    }

    #[test]
    fn test_fixed_build_is_smaller_than_default() {
        let fixed = Hyperception::new(&[3, 32, 32], 10).build_fixed().unwrap();
        let full = Hyperception::new(&[3, 32, 32], 10).build().unwrap();
        let count = |m: &crate::model::Model| -> usize {
            m.parameters().iter().map(|p| p.borrow().data.len()).sum()
        };
        assert!(count(&fixed) < count(&full));
    }

    #[test]
    fn test_forward_shape_through_small_model() {
        let model = Hyperception::new(&[1, 8, 8], 3)
            .hparam("conv2d_num_filters", 4usize)
            .hparam("sep_num_filters", 4usize)
            .hparam("num_residual_blocks", 1usize)
            .build()
            .unwrap();
        let x = RawTensor::randn(&[2, 1, 8, 8]);
        let y = model.forward(&x);
        assert_eq!(y.borrow().shape, vec![2, 3]);
    }
}
