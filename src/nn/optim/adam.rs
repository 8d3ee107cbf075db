use super::{clear_grads, Optimizer};
use crate::tensor::Tensor;

/// Adam optimizer
///
/// Keeps per-parameter first/second moment estimates with bias correction:
/// m ← β1·m + (1-β1)·g, v ← β2·v + (1-β2)·g², θ ← θ - lr·m̂ / (√v̂ + ε)
pub struct Adam {
    params: Vec<Tensor>,
    lr: f32,
    betas: (f32, f32),
    eps: f32,
    m: Vec<Vec<f32>>, // 1st moment
    v: Vec<Vec<f32>>, // 2nd moment
    t: usize,         // timestep
}

impl Adam {
    /// Create an Adam optimizer with the standard β/ε constants.
    #[must_use]
    pub fn new(params: Vec<Tensor>, lr: f32) -> Self {
        Self::with_params(params, lr, (0.9, 0.999), 1e-8)
    }

    #[must_use]
    pub fn with_params(params: Vec<Tensor>, lr: f32, betas: (f32, f32), eps: f32) -> Self {
        let m = params
            .iter()
            .map(|p| vec![0.0; p.borrow().data.len()])
            .collect();
        let v = params
            .iter()
            .map(|p| vec![0.0; p.borrow().data.len()])
            .collect();

        Adam {
            params,
            lr,
            betas,
            eps,
            m,
            v,
            t: 0,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.lr
    }
}

impl Optimizer for Adam {
    fn step(&mut self) {
        self.t += 1;

        let m_hat_scale = 1.0 / (1.0 - self.betas.0.powi(self.t as i32));
        let v_hat_scale = 1.0 / (1.0 - self.betas.1.powi(self.t as i32));

        for (i, param) in self.params.iter().enumerate() {
            let mut p = param.borrow_mut();
            let grad = match p.grad.clone() {
                Some(g) => g,
                None => continue,
            };

            let m = &mut self.m[i];
            let v = &mut self.v[i];
            for j in 0..grad.len() {
                m[j] = self.betas.0 * m[j] + (1.0 - self.betas.0) * grad[j];
                v[j] = self.betas.1 * v[j] + (1.0 - self.betas.1) * grad[j] * grad[j];

                let m_hat = m[j] * m_hat_scale;
                let v_hat = v[j] * v_hat_scale;
                p.data[j] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
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

    #[test]
    fn test_first_step_magnitude_close_to_lr() {
        // With bias correction, the very first Adam step is ~lr per element
        let p = RawTensor::new(vec![1.0], &[1], true);
        p.borrow_mut().grad = Some(vec![10.0]);
        let mut opt = Adam::new(vec![p.clone()], 0.01);
        opt.step();
        let moved = 1.0 - p.borrow().data[0];
        assert!((moved - 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_params_without_grad_are_skipped() {
        let p = RawTensor::new(vec![3.0], &[1], true);
        let mut opt = Adam::new(vec![p.clone()], 0.1);
        opt.step();
        assert_eq!(p.borrow().data, vec![3.0]);
    }
}
