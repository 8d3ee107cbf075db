use crate::io::StateDict;
use crate::nn::layers::{Activation, BatchNorm2d, Conv2d, MaxPool2d, SeparableConv2d, Sequential};
use crate::nn::Module;
use crate::tensor::{Tensor, TensorOps};

/// Xception-style residual block.
///
/// The body is two separable-conv units (sep conv -> batch norm -> activation);
/// a downsampling block appends a 3x3 stride-2 max pool. The skip connection is
/// the identity when shapes line up, otherwise a 1x1 projection conv (stride 2
/// when downsampling) so the add is always well-formed.
pub struct Residual {
    body: Sequential,
    shortcut: Option<Conv2d>,
    downsample: bool,
}

impl Residual {
    pub fn new(in_ch: usize, filters: usize, activation: Activation, downsample: bool) -> Self {
        let mut builder = Sequential::builder()
            .add_unnamed(Box::new(SeparableConv2d::new(in_ch, filters, 3, false)))
            .add_unnamed(Box::new(BatchNorm2d::new(filters)))
            .add_unnamed(Box::new(activation))
            .add_unnamed(Box::new(SeparableConv2d::new(filters, filters, 3, false)))
            .add_unnamed(Box::new(BatchNorm2d::new(filters)))
            .add_unnamed(Box::new(activation));
        if downsample {
            builder = builder.add_unnamed(Box::new(MaxPool2d::new(3, 2, 1)));
        }

        // Projection shortcut whenever identity would not match the body output
        let shortcut = if downsample {
            Some(Conv2d::new(in_ch, filters, 1, 2, 0, false))
        } else if in_ch != filters {
            Some(Conv2d::new(in_ch, filters, 1, 1, 0, false))
        } else {
            None
        };

        Residual {
            body: builder.build(),
            shortcut,
            downsample,
        }
    }

    pub fn is_downsampling(&self) -> bool {
        self.downsample
    }
}

impl Module for Residual {
    fn forward(&self, x: &Tensor) -> Tensor {
        let y = self.body.forward(x);
        let skip = match &self.shortcut {
            Some(proj) => proj.forward(x),
            None => x.clone(),
        };
        y.add(&skip)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.body.parameters();
        if let Some(ref proj) = self.shortcut {
            params.extend(proj.parameters());
        }
        params
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        for (key, value) in self.body.state_dict() {
            state.insert(format!("body.{}", key), value);
        }
        if let Some(ref proj) = self.shortcut {
            for (key, value) in proj.state_dict() {
                state.insert(format!("shortcut.{}", key), value);
            }
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        let mut body_state = StateDict::new();
        let mut shortcut_state = StateDict::new();
        for (key, value) in state {
            if let Some(sub) = key.strip_prefix("body.") {
                body_state.insert(sub.to_string(), value.clone());
            } else if let Some(sub) = key.strip_prefix("shortcut.") {
                shortcut_state.insert(sub.to_string(), value.clone());
            }
        }
        self.body.load_state_dict(&body_state);
        if let Some(ref mut proj) = self.shortcut {
            proj.load_state_dict(&shortcut_state);
        }
    }

    fn train(&mut self, mode: bool) {
        self.body.train(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::RawTensor;

    #[test]
    fn test_identity_block_preserves_shape() {
        let block = Residual::new(8, 8, Activation::Relu, false);
        let x = RawTensor::randn(&[2, 8, 10, 10]);
        let y = block.forward(&x);
        assert_eq!(y.borrow().shape, vec![2, 8, 10, 10]);
    }

    #[test]
    fn test_channel_projection_when_filters_differ() {
        let block = Residual::new(4, 16, Activation::Relu, false);
        let x = RawTensor::randn(&[1, 4, 8, 8]);
        let y = block.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 16, 8, 8]);
    }

    #[test]
    fn test_downsampling_halves_spatial_dims() {
        let block = Residual::new(8, 16, Activation::Relu, true);
        assert!(block.is_downsampling());
        let x = RawTensor::randn(&[1, 8, 16, 16]);
        let y = block.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 16, 8, 8]);
    }

    #[test]
    fn test_downsampling_odd_input() {
        // pool: (9 + 2 - 3)/2 + 1 = 5; projection: (9 - 1)/2 + 1 = 5
        let block = Residual::new(4, 4, Activation::Relu, true);
        let x = RawTensor::randn(&[1, 4, 9, 9]);
        let y = block.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 4, 5, 5]);
    }
}
