use crate::io::{StateDict, TensorData};
use crate::nn::Module;
use crate::tensor::{RawTensor, Tensor};

/// Batch normalization over the channel axis of (B, C, H, W) inputs.
///
/// Training mode normalizes with batch statistics and updates the running
/// buffers; eval mode normalizes with the running statistics.
pub struct BatchNorm2d {
    num_features: usize,
    eps: f32,
    momentum: f32,
    training: bool,
    // Parameters (learnable)
    gamma: Tensor,
    beta: Tensor,
    // Buffers (non-learnable)
    running_mean: Tensor,
    running_var: Tensor,
}

impl BatchNorm2d {
    pub fn new(num_features: usize) -> Self {
        Self::new_with_params(num_features, 1e-5, 0.1)
    }

    pub fn new_with_params(num_features: usize, eps: f32, momentum: f32) -> Self {
        let gamma = RawTensor::ones(&[num_features]);
        gamma.borrow_mut().requires_grad = true;

        let beta = RawTensor::zeros(&[num_features]);
        beta.borrow_mut().requires_grad = true;

        // Running stats are buffers, so they don't require grad
        let running_mean = RawTensor::zeros(&[num_features]);
        let running_var = RawTensor::ones(&[num_features]);

        BatchNorm2d {
            num_features,
            eps,
            momentum,
            training: true,
            gamma,
            beta,
            running_mean,
            running_var,
        }
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        let (data, shape) = {
            let s = x.borrow();
            assert_eq!(s.shape.len(), 4, "BatchNorm2d expected 4D input (B,C,H,W)");
            assert_eq!(s.shape[1], self.num_features, "Channel mismatch");
            (s.data.clone(), s.shape.clone())
        };
        let (b, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let plane = h * w;
        let n = (b * plane) as f32;

        let (mean, var) = if self.training {
            let mut mean = vec![0.0f32; c];
            let mut var = vec![0.0f32; c];
            for ch in 0..c {
                let mut sum = 0.0;
                for bi in 0..b {
                    let base = (bi * c + ch) * plane;
                    for i in 0..plane {
                        sum += data[base + i];
                    }
                }
                mean[ch] = sum / n;
                let m = mean[ch];
                let mut sq = 0.0;
                for bi in 0..b {
                    let base = (bi * c + ch) * plane;
                    for i in 0..plane {
                        let d = data[base + i] - m;
                        sq += d * d;
                    }
                }
                // biased variance for normalization, like PyTorch train mode
                var[ch] = sq / n;
            }

            // Update running stats (Bessel-corrected variance, standard practice)
            {
                let mut rm = self.running_mean.borrow_mut();
                let mut rv = self.running_var.borrow_mut();
                let mom = self.momentum;
                for ch in 0..c {
                    rm.data[ch] = (1.0 - mom) * rm.data[ch] + mom * mean[ch];
                    let unbiased = if n > 1.0 { var[ch] * n / (n - 1.0) } else { var[ch] };
                    rv.data[ch] = (1.0 - mom) * rv.data[ch] + mom * unbiased;
                }
            }

            (mean, var)
        } else {
            (
                self.running_mean.borrow().data.clone(),
                self.running_var.borrow().data.clone(),
            )
        };

        let gamma = self.gamma.borrow();
        let beta = self.beta.borrow();
        let mut out = vec![0.0f32; data.len()];
        for ch in 0..c {
            let denom = (var[ch] + self.eps).sqrt();
            let g = gamma.data[ch];
            let bt = beta.data[ch];
            let m = mean[ch];
            for bi in 0..b {
                let base = (bi * c + ch) * plane;
                for i in 0..plane {
                    out[base + i] = g * (data[base + i] - m) / denom + bt;
                }
            }
        }

        RawTensor::new(out, &shape, false)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    fn train(&mut self, mode: bool) {
        self.training = mode;
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("gamma".to_string(), TensorData::from_tensor(&self.gamma));
        state.insert("beta".to_string(), TensorData::from_tensor(&self.beta));
        state.insert(
            "running_mean".to_string(),
            TensorData::from_tensor(&self.running_mean),
        );
        state.insert(
            "running_var".to_string(),
            TensorData::from_tensor(&self.running_var),
        );
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        for (key, slot) in [
            ("gamma", &self.gamma),
            ("beta", &self.beta),
            ("running_mean", &self.running_mean),
            ("running_var", &self.running_var),
        ] {
            if let Some(t) = state.get(key) {
                let mut b = slot.borrow_mut();
                b.data = t.data.clone();
                b.shape = t.shape.clone();
            }
        }
    }
}

/// Batch normalization over the feature axis of (B, F) inputs.
///
/// Used in dense blocks when `dense_use_bn` is set.
pub struct BatchNorm1d {
    num_features: usize,
    eps: f32,
    momentum: f32,
    training: bool,
    gamma: Tensor,
    beta: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
}

impl BatchNorm1d {
    pub fn new(num_features: usize) -> Self {
        let gamma = RawTensor::ones(&[num_features]);
        gamma.borrow_mut().requires_grad = true;
        let beta = RawTensor::zeros(&[num_features]);
        beta.borrow_mut().requires_grad = true;
        BatchNorm1d {
            num_features,
            eps: 1e-5,
            momentum: 0.1,
            training: true,
            gamma,
            beta,
            running_mean: RawTensor::zeros(&[num_features]),
            running_var: RawTensor::ones(&[num_features]),
        }
    }
}

impl Module for BatchNorm1d {
    fn forward(&self, x: &Tensor) -> Tensor {
        let (data, shape) = {
            let s = x.borrow();
            assert_eq!(s.shape.len(), 2, "BatchNorm1d expected 2D input (B,F)");
            assert_eq!(s.shape[1], self.num_features, "Feature mismatch");
            (s.data.clone(), s.shape.clone())
        };
        let (b, f) = (shape[0], shape[1]);
        let n = b as f32;

        let (mean, var) = if self.training {
            let mut mean = vec![0.0f32; f];
            let mut var = vec![0.0f32; f];
            for j in 0..f {
                let mut sum = 0.0;
                for i in 0..b {
                    sum += data[i * f + j];
                }
                mean[j] = sum / n;
                let mut sq = 0.0;
                for i in 0..b {
                    let d = data[i * f + j] - mean[j];
                    sq += d * d;
                }
                var[j] = sq / n;
            }
            {
                let mut rm = self.running_mean.borrow_mut();
                let mut rv = self.running_var.borrow_mut();
                let mom = self.momentum;
                for j in 0..f {
                    rm.data[j] = (1.0 - mom) * rm.data[j] + mom * mean[j];
                    let unbiased = if n > 1.0 { var[j] * n / (n - 1.0) } else { var[j] };
                    rv.data[j] = (1.0 - mom) * rv.data[j] + mom * unbiased;
                }
            }
            (mean, var)
        } else {
            (
                self.running_mean.borrow().data.clone(),
                self.running_var.borrow().data.clone(),
            )
        };

        let gamma = self.gamma.borrow();
        let beta = self.beta.borrow();
        let mut out = vec![0.0f32; data.len()];
        for i in 0..b {
            for j in 0..f {
                let idx = i * f + j;
                out[idx] =
                    gamma.data[j] * (data[idx] - mean[j]) / (var[j] + self.eps).sqrt() + beta.data[j];
            }
        }
        RawTensor::new(out, &shape, false)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    fn train(&mut self, mode: bool) {
        self.training = mode;
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("gamma".to_string(), TensorData::from_tensor(&self.gamma));
        state.insert("beta".to_string(), TensorData::from_tensor(&self.beta));
        state.insert(
            "running_mean".to_string(),
            TensorData::from_tensor(&self.running_mean),
        );
        state.insert(
            "running_var".to_string(),
            TensorData::from_tensor(&self.running_var),
        );
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        for (key, slot) in [
            ("gamma", &self.gamma),
            ("beta", &self.beta),
            ("running_mean", &self.running_mean),
            ("running_var", &self.running_var),
        ] {
            if let Some(t) = state.get(key) {
                let mut b = slot.borrow_mut();
                b.data = t.data.clone();
                b.shape = t.shape.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bn2d_normalizes_in_train_mode() {
        let bn = BatchNorm2d::new(1);
        // channel values: 1..8 across a (2,1,2,2) batch
        let x = RawTensor::new(
            (1..=8).map(|v| v as f32).collect(),
            &[2, 1, 2, 2],
            false,
        );
        let y = bn.forward(&x);
        let data = y.borrow().data.clone();
        let mean: f32 = data.iter().sum::<f32>() / data.len() as f32;
        let var: f32 = data.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / data.len() as f32;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_bn2d_eval_uses_running_stats() {
        let mut bn = BatchNorm2d::new(1);
        bn.eval();
        // running mean 0, var 1: eval is (nearly) the identity
        let x = RawTensor::new(vec![0.5, -0.5, 1.0, -1.0], &[1, 1, 2, 2], false);
        let y = bn.forward(&x);
        for (a, b) in y.borrow().data.iter().zip(&x.borrow().data) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bn1d_forward_shape() {
        let bn = BatchNorm1d::new(3);
        let x = RawTensor::randn(&[4, 3]);
        let y = bn.forward(&x);
        assert_eq!(y.borrow().shape, vec![4, 3]);
    }
}
