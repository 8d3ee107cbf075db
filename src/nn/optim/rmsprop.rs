use super::{clear_grads, Optimizer};
use crate::tensor::Tensor;

/// RMSprop optimizer with time-based learning-rate decay
///
/// Keeps a running average of squared gradients per parameter:
/// s ← ρ·s + (1-ρ)·g², θ ← θ - lr_t·g / (√s + ε)
/// with lr_t = lr / (1 + decay·t).
pub struct RmsProp {
    params: Vec<Tensor>,
    lr: f32,
    rho: f32,
    eps: f32,
    decay: f32,
    mean_square: Vec<Vec<f32>>,
    t: usize,
}

impl RmsProp {
    /// Create an RMSprop optimizer with the standard ρ/ε constants.
    #[must_use]
    pub fn new(params: Vec<Tensor>, lr: f32, decay: f32) -> Self {
        let mean_square = params
            .iter()
            .map(|p| vec![0.0; p.borrow().data.len()])
            .collect();
        RmsProp {
            params,
            lr,
            rho: 0.9,
            eps: 1e-7,
            decay,
            mean_square,
            t: 0,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.lr
    }

    /// Effective learning rate after decay at the current timestep.
    pub fn current_lr(&self) -> f32 {
        self.lr / (1.0 + self.decay * self.t as f32)
    }
}

impl Optimizer for RmsProp {
    fn step(&mut self) {
        self.t += 1;
        let lr_t = self.lr / (1.0 + self.decay * self.t as f32);

        for (i, param) in self.params.iter().enumerate() {
            let mut p = param.borrow_mut();
            let grad = match p.grad.clone() {
                Some(g) => g,
                None => continue,
            };

            let ms = &mut self.mean_square[i];
            for j in 0..grad.len() {
                ms[j] = self.rho * ms[j] + (1.0 - self.rho) * grad[j] * grad[j];
                p.data[j] -= lr_t * grad[j] / (ms[j].sqrt() + self.eps);
            }
        }
    }

    fn zero_grad(&self) {
        clear_grads(&self.params);
    }
}
