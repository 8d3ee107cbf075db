use crate::io::StateDict;
use crate::nn::Module;
use crate::tensor::{Tensor, TensorOps};

/// Collapse feature maps to a flat feature vector: (B, C, H, W) -> (B, C*H*W).
///
/// The `dense_merge_type = "flatten"` bridge between the exit-flow residual
/// block and the dense stack. Inputs that are already 2D pass through as-is.
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Flatten
    }
}

impl Default for Flatten {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Flatten {
    fn forward(&self, x: &Tensor) -> Tensor {
        let shape = x.borrow().shape.clone();
        if shape.len() < 2 {
            return x.clone();
        }
        let batch = shape[0];
        let features: usize = shape[1..].iter().product();
        x.reshape(&[batch, features])
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    fn load_state_dict(&mut self, _state: &StateDict) {
        // Stateless
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::RawTensor;

    #[test]
    fn test_feature_map_flattens_per_sample() {
        // the exit-flow output shape the dense stack sees under "flatten"
        let x = RawTensor::randn(&[2, 8, 4, 4]);
        let y = Flatten::new().forward(&x);
        assert_eq!(y.borrow().shape, vec![2, 8 * 4 * 4]);
    }

    #[test]
    fn test_row_major_order_is_preserved() {
        let x = RawTensor::new((0..8).map(|v| v as f32).collect(), &[2, 1, 2, 2], false);
        let y = Flatten::new().forward(&x);
        assert_eq!(y.borrow().data, x.borrow().data);
        assert_eq!(y.borrow().shape, vec![2, 4]);
    }

    #[test]
    fn test_already_flat_input_is_untouched() {
        let x = RawTensor::randn(&[3, 6]);
        let y = Flatten::new().forward(&x);
        assert_eq!(y.borrow().shape, vec![3, 6]);
    }
}
