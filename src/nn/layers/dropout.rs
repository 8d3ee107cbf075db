use crate::io::StateDict;
use crate::nn::Module;
use crate::tensor::{with_rng, RawTensor, Tensor, TensorOps};
use rand::Rng;

pub struct Dropout {
    p: f32,
    training: bool,
}

impl Dropout {
    /// Create a new Dropout layer
    ///
    /// # Arguments
    /// * `p` - Probability of an element being zeroed out
    ///
    /// # Panics
    /// dropout prob must be in \[0,1\]
    #[must_use]
    pub fn new(p: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&p),
            "Dropout probability must be in [0, 1]"
        );
        Self { p, training: true }
    }

    pub fn rate(&self) -> f32 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, x: &Tensor) -> Tensor {
        if !self.training || self.p == 0.0 {
            return x.clone();
        }

        let keep_prob = 1.0 - self.p;
        let scale = 1.0 / keep_prob;

        let shape = x.borrow().shape.clone();
        let size: usize = shape.iter().product();

        // Inverted dropout: surviving activations are rescaled so eval
        // needs no correction
        let mask_data: Vec<f32> = with_rng(|rng| {
            (0..size)
                .map(|_| {
                    if rng.random::<f32>() < keep_prob {
                        scale
                    } else {
                        0.0
                    }
                })
                .collect()
        });

        let mask = RawTensor::new(mask_data, &shape, false);
        x.elem_mul(&mask)
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

    fn train(&mut self, mode: bool) {
        self.training = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_mode_is_identity() {
        let mut dropout = Dropout::new(0.5);
        dropout.eval();
        let x = RawTensor::randn(&[2, 8]);
        let y = dropout.forward(&x);
        assert_eq!(y.borrow().data, x.borrow().data);
    }

    #[test]
    fn test_full_dropout_zeroes_everything() {
        let dropout = Dropout::new(1.0);
        let x = RawTensor::ones(&[4, 4]);
        let y = dropout.forward(&x);
        assert!(y.borrow().data.iter().all(|&v| v == 0.0));
    }
}
