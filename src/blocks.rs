//! Building blocks for the hyperception topology: thin compositions of the
//! base layers with batch norm folded in, mirroring the conv / sep_conv /
//! dense units of the Xception entry, middle, and exit flows. The residual
//! block lives with the other layers in `nn::layers`.

use crate::nn::layers::{
    Activation, BatchNorm1d, BatchNorm2d, Conv2d, Dropout, Linear, SeparableConv2d, Sequential,
};
use crate::shape::same_padding;

/// Convolution unit: Conv2d (same padding, no bias) -> BatchNorm2d -> activation.
pub fn conv_block(
    in_ch: usize,
    filters: usize,
    kernel: (usize, usize),
    strides: (usize, usize),
    activation: Activation,
) -> Sequential {
    Sequential::new(vec![
        Box::new(Conv2d::with_params(
            in_ch,
            filters,
            kernel,
            strides,
            same_padding(kernel),
            false,
        )),
        Box::new(BatchNorm2d::new(filters)),
        Box::new(activation),
    ])
}

/// Separable-convolution unit: SeparableConv2d (same padding, no bias) ->
/// BatchNorm2d -> activation.
pub fn sep_conv_block(
    in_ch: usize,
    filters: usize,
    kernel: usize,
    activation: Activation,
) -> Sequential {
    Sequential::new(vec![
        Box::new(SeparableConv2d::new(in_ch, filters, kernel, false)),
        Box::new(BatchNorm2d::new(filters)),
        Box::new(activation),
    ])
}

/// Dense unit: Linear -> optional BatchNorm1d -> activation -> Dropout.
pub fn dense_block(
    in_features: usize,
    units: usize,
    activation: Activation,
    use_bn: bool,
    dropout_rate: f32,
) -> Sequential {
    let mut layers: Vec<Box<dyn crate::nn::Module>> =
        vec![Box::new(Linear::new(in_features, units, true))];
    if use_bn {
        layers.push(Box::new(BatchNorm1d::new(units)));
    }
    layers.push(Box::new(activation));
    layers.push(Box::new(Dropout::new(dropout_rate)));
    Sequential::new(layers)
}
