use super::{clear_grads, Optimizer};
use crate::tensor::Tensor;

/// Stochastic Gradient Descent with momentum and time-based learning-rate decay
///
/// Update rule:
/// - lr_t = lr / (1 + decay·t)
/// - v ← momentum·v - lr_t·∇θ, θ ← θ + v (plain descent when momentum is 0)
pub struct Sgd {
    params: Vec<Tensor>,
    lr: f32,
    momentum: f32,
    decay: f32,
    velocity: Vec<Vec<f32>>,
    t: usize,
}

impl Sgd {
    /// Create a new SGD optimizer
    ///
    /// # Arguments
    /// * `params` - List of parameters to optimize
    /// * `lr` - Learning rate (typical: 0.01 to 0.1)
    /// * `momentum` - Momentum coefficient (typical: 0.9, or 0.0 for none)
    /// * `decay` - Time-based learning-rate decay (0.0 for a constant rate)
    pub fn new(params: Vec<Tensor>, lr: f32, momentum: f32, decay: f32) -> Self {
        let velocity = if momentum > 0.0 {
            params
                .iter()
                .map(|p| vec![0.0; p.borrow().data.len()])
                .collect()
        } else {
            vec![]
        };

        Sgd {
            params,
            lr,
            momentum,
            decay,
            velocity,
            t: 0,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.lr
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    /// Effective learning rate after decay at the current timestep.
    pub fn current_lr(&self) -> f32 {
        self.lr / (1.0 + self.decay * self.t as f32)
    }
}

impl Optimizer for Sgd {
    fn step(&mut self) {
        self.t += 1;
        let lr_t = self.lr / (1.0 + self.decay * self.t as f32);

        for (i, param) in self.params.iter().enumerate() {
            let mut p = param.borrow_mut();
            let grad = match p.grad.clone() {
                Some(g) => g,
                None => continue,
            };

            if self.momentum > 0.0 {
                // v = momentum·v - lr_t·grad, θ = θ + v
                for (v, &g) in self.velocity[i].iter_mut().zip(grad.iter()) {
                    *v = self.momentum * *v - lr_t * g;
                }
                for (d, &v) in p.data.iter_mut().zip(&self.velocity[i]) {
                    *d += v;
                }
            } else {
                for (d, &g) in p.data.iter_mut().zip(grad.iter()) {
                    *d -= lr_t * g;
                }
            }
        }
    }

    fn zero_grad(&self) {
        clear_grads(&self.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::RawTensor;

    fn param_with_grad(data: Vec<f32>, grad: Vec<f32>) -> Tensor {
        let len = data.len();
        let p = RawTensor::new(data, &[len], true);
        p.borrow_mut().grad = Some(grad);
        p
    }

    #[test]
    fn test_plain_step_descends_gradient() {
        let p = param_with_grad(vec![1.0, -1.0], vec![0.5, -0.5]);
        let mut opt = Sgd::new(vec![p.clone()], 0.1, 0.0, 0.0);
        opt.step();
        let data = p.borrow().data.clone();
        assert!((data[0] - 0.95).abs() < 1e-6);
        assert!((data[1] + 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let p = param_with_grad(vec![0.0, 0.0], vec![1.0, 1.0]);
        let mut opt = Sgd::new(vec![p.clone()], 0.1, 0.9, 0.0);
        opt.step();
        let after_one = p.borrow().data[0];
        p.borrow_mut().grad = Some(vec![1.0, 1.0]);
        opt.step();
        let after_two = p.borrow().data[0];
        // second step moves further than the first thanks to velocity
        assert!((after_one - after_two) > (0.0 - after_one));
    }

    #[test]
    fn test_decay_shrinks_effective_lr() {
        let p = param_with_grad(vec![0.0], vec![1.0]);
        let mut opt = Sgd::new(vec![p.clone()], 0.1, 0.0, 1.0);
        assert_eq!(opt.current_lr(), 0.1);
        opt.step();
        // t=1: lr/(1 + 1·1) = 0.05
        assert!((opt.current_lr() - 0.05).abs() < 1e-6);
        assert!((p.borrow().data[0] + 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_zero_grad_clears_gradients() {
        let p = param_with_grad(vec![0.0, 0.0], vec![1.0, 1.0]);
        let opt = Sgd::new(vec![p.clone()], 0.1, 0.0, 0.0);
        opt.zero_grad();
        assert!(p.borrow().grad.is_none());
    }
}
