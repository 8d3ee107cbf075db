use crate::error::{HyperceptionError, Result};
use crate::io::StateDict;
use crate::nn::Module;
use crate::tensor::{Tensor, TensorOps};

/// Pointwise activation, selected by the `activation` hyperparameter string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Parse the string form used in hyperparameter mappings.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            other => Err(HyperceptionError::UnknownActivation(other.to_string())),
        }
    }

    pub fn apply(&self, x: &Tensor) -> Tensor {
        match self {
            Activation::Relu => x.relu(),
            Activation::Sigmoid => x.sigmoid(),
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Module for Activation {
    fn forward(&self, x: &Tensor) -> Tensor {
        self.apply(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![] // No learnable params
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    fn load_state_dict(&mut self, _state: &StateDict) {
        // Stateless
    }
}

/// Softmax over the class axis of (B, num_classes) scores.
///
/// The final layer of every hyperception model.
pub struct Softmax;

impl Module for Softmax {
    fn forward(&self, x: &Tensor) -> Tensor {
        x.softmax_rows()
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
    fn test_parse_known_names() {
        assert_eq!(Activation::from_name("relu").unwrap(), Activation::Relu);
        assert_eq!(Activation::from_name("tanh").unwrap(), Activation::Tanh);
    }

    #[test]
    fn test_parse_unknown_name_reports_value() {
        let err = Activation::from_name("swish").unwrap_err();
        assert!(err.to_string().contains("swish"));
    }

    #[test]
    fn test_relu_clamps_negatives() {
        let x = RawTensor::new(vec![-1.0, 0.0, 2.0], &[3], false);
        let y = Activation::Relu.forward(&x);
        assert_eq!(y.borrow().data, vec![0.0, 0.0, 2.0]);
    }
}
