use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::cell::RefCell;
use std::rc::Rc;

/// Type alias for a reference-counted, interior-mutable tensor.
///
/// `Rc<RefCell<RawTensor>>` lets layers hand out shared parameter handles
/// (the model and its optimizer both hold the same weights) while still
/// allowing in-place updates during an optimizer step.
///
/// **Note**: single-threaded only. For multi-threading this would become
/// `Arc<Mutex<RawTensor>>`.
pub type Tensor = Rc<RefCell<RawTensor>>;

// ===== THREAD-LOCAL RNG =====

thread_local! {
    static THREAD_RNG: RefCell<StdRng> = RefCell::new(StdRng::from_os_rng());
}

/// Run a closure with the crate-wide RNG.
///
/// All random initialization (weights, dropout masks) goes through here so a
/// single `seed_rng` call makes a whole model construction reproducible.
pub fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    THREAD_RNG.with(|rng| f(&mut rng.borrow_mut()))
}

/// Reseed the crate-wide RNG (mainly for tests and repeatable searches).
pub fn seed_rng(seed: u64) {
    THREAD_RNG.with(|rng| *rng.borrow_mut() = StdRng::seed_from_u64(seed));
}

// ===== RAW TENSOR STRUCTURE =====

/// The core tensor structure.
///
/// Fields:
/// - `data`: flat `Vec<f32>` of values (row-major order)
/// - `shape`: dimensions, e.g. [batch, channels, height, width]
/// - `grad`: accumulated gradient, filled in by a caller-side training loop
/// - `requires_grad`: whether this tensor is a learnable parameter
pub struct RawTensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
    pub grad: Option<Vec<f32>>,
    pub requires_grad: bool,
}

impl Clone for RawTensor {
    fn clone(&self) -> Self {
        RawTensor {
            data: self.data.clone(),
            shape: self.shape.clone(),
            grad: self.grad.clone(),
            requires_grad: self.requires_grad,
        }
    }
}

impl std::fmt::Debug for RawTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.is_some())
            .finish()
    }
}

// ===== TENSOR CONSTRUCTORS =====

impl RawTensor {
    /// Create a new tensor from data and shape
    ///
    /// # Panics
    /// Panics if `data.len() != shape.product()`
    pub fn new(data: Vec<f32>, shape: &[usize], requires_grad: bool) -> Tensor {
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "Data length must match shape"
        );
        let raw = RawTensor {
            data,
            shape: shape.to_vec(),
            grad: None,
            requires_grad,
        };
        Rc::new(RefCell::new(raw))
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Tensor {
        let size = shape.iter().product();
        Self::new(vec![0.0; size], shape, false)
    }

    /// Create a tensor filled with ones
    pub fn ones(shape: &[usize]) -> Tensor {
        let size = shape.iter().product();
        Self::new(vec![1.0; size], shape, false)
    }

    /// Create a tensor with values uniformly distributed in [0, 1)
    pub fn rand(shape: &[usize]) -> Tensor {
        let size = shape.iter().product();
        let data: Vec<f32> = with_rng(|rng| (0..size).map(|_| rng.random::<f32>()).collect());
        Self::new(data, shape, false)
    }

    /// Create a tensor with values from standard normal distribution N(0, 1)
    pub fn randn(shape: &[usize]) -> Tensor {
        let size = shape.iter().product();
        let normal = Normal::new(0.0f32, 1.0).expect("valid stddev");
        let data: Vec<f32> = with_rng(|rng| (0..size).map(|_| normal.sample(rng)).collect());
        Self::new(data, shape, false)
    }

    /// Xavier uniform initialization for 2D weight matrices.
    ///
    /// Samples uniformly from [-limit, limit] with
    /// limit = sqrt(6 / (fan_in + fan_out)).
    pub fn xavier_uniform(shape: &[usize]) -> Tensor {
        assert_eq!(shape.len(), 2, "xavier_uniform expects a 2D shape");
        let fan_in = shape[0];
        let fan_out = shape[1];
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        let data: Vec<f32> = with_rng(|rng| {
            (0..fan_in * fan_out)
                .map(|_| rng.random_range(-limit..limit))
                .collect()
        });
        Self::new(data, shape, false)
    }

    /// He (Kaiming) normal initialization: N(0, sqrt(2 / fan_in)).
    ///
    /// Better suited than Xavier for ReLU stacks; used for conv kernels.
    pub fn he_normal(shape: &[usize], fan_in: usize) -> Tensor {
        assert!(fan_in > 0, "fan_in must be positive");
        let size = shape.iter().product();
        let std = (2.0 / fan_in as f32).sqrt();
        let normal = Normal::new(0.0f32, std).expect("valid stddev");
        let data: Vec<f32> = with_rng(|rng| (0..size).map(|_| normal.sample(rng)).collect());
        Self::new(data, shape, false)
    }
}

// ===== ELEMENTWISE & MOVEMENT OPS =====

impl RawTensor {
    /// Elementwise add with trailing-suffix broadcast.
    ///
    /// Shapes must either match exactly, or `rhs.shape` must be a suffix of
    /// `lhs.shape` (the bias-add case: [B, F] + [F]).
    pub fn add(lhs: &Tensor, rhs: &Tensor) -> Tensor {
        let a = lhs.borrow();
        let b = rhs.borrow();
        if a.shape == b.shape {
            let data: Vec<f32> = a.data.iter().zip(&b.data).map(|(x, y)| x + y).collect();
            return Self::new(data, &a.shape, false);
        }
        assert!(
            a.shape.len() > b.shape.len() && a.shape.ends_with(&b.shape),
            "Cannot broadcast shapes {:?} and {:?}",
            a.shape,
            b.shape
        );
        let chunk = b.data.len();
        let data: Vec<f32> = a
            .data
            .iter()
            .enumerate()
            .map(|(i, x)| x + b.data[i % chunk])
            .collect();
        Self::new(data, &a.shape, false)
    }

    /// Elementwise multiply (shapes must match)
    pub fn elem_mul(lhs: &Tensor, rhs: &Tensor) -> Tensor {
        let a = lhs.borrow();
        let b = rhs.borrow();
        assert_eq!(
            a.shape, b.shape,
            "elem_mul requires matching shapes ({:?} vs {:?})",
            a.shape, b.shape
        );
        let data: Vec<f32> = a.data.iter().zip(&b.data).map(|(x, y)| x * y).collect();
        Self::new(data, &a.shape, false)
    }

    fn map(t: &Tensor, f: impl Fn(f32) -> f32) -> Tensor {
        let s = t.borrow();
        let data: Vec<f32> = s.data.iter().map(|&x| f(x)).collect();
        Self::new(data, &s.shape, false)
    }

    pub fn relu(t: &Tensor) -> Tensor {
        Self::map(t, |x| x.max(0.0))
    }

    pub fn sigmoid(t: &Tensor) -> Tensor {
        Self::map(t, |x| 1.0 / (1.0 + (-x).exp()))
    }

    pub fn tanh(t: &Tensor) -> Tensor {
        Self::map(t, f32::tanh)
    }

    /// Reshape to a new shape with the same number of elements
    pub fn reshape(t: &Tensor, new_shape: &[usize]) -> Tensor {
        let s = t.borrow();
        assert_eq!(
            s.data.len(),
            new_shape.iter().product::<usize>(),
            "Cannot reshape {:?} to {:?}",
            s.shape,
            new_shape
        );
        Self::new(s.data.clone(), new_shape, false)
    }

    /// 2D matrix multiply: (m, k) @ (k, n) -> (m, n)
    pub fn matmul(lhs: &Tensor, rhs: &Tensor) -> Tensor {
        let a = lhs.borrow();
        let b = rhs.borrow();
        assert_eq!(a.shape.len(), 2, "matmul lhs must be 2D");
        assert_eq!(b.shape.len(), 2, "matmul rhs must be 2D");
        assert_eq!(
            a.shape[1], b.shape[0],
            "matmul inner dims must agree ({:?} vs {:?})",
            a.shape, b.shape
        );
        let (m, k) = (a.shape[0], a.shape[1]);
        let n = b.shape[1];
        let mut out = vec![0.0f32; m * n];
        for i in 0..m {
            for p in 0..k {
                let av = a.data[i * k + p];
                if av == 0.0 {
                    continue;
                }
                let row = p * n;
                for j in 0..n {
                    out[i * n + j] += av * b.data[row + j];
                }
            }
        }
        Self::new(out, &[m, n], false)
    }
}

// ===== SOFTMAX, ARGMAX & LOSS =====

impl RawTensor {
    /// Numerically stable softmax over the rows of a 2D tensor.
    pub fn softmax_rows(t: &Tensor) -> Tensor {
        let s = t.borrow();
        assert_eq!(s.shape.len(), 2, "softmax_rows expects a 2D tensor");
        let (rows, cols) = (s.shape[0], s.shape[1]);
        let mut out = vec![0.0f32; rows * cols];
        for r in 0..rows {
            let row = &s.data[r * cols..(r + 1) * cols];
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0;
            for (j, &x) in row.iter().enumerate() {
                let e = (x - max).exp();
                out[r * cols + j] = e;
                sum += e;
            }
            for j in 0..cols {
                out[r * cols + j] /= sum;
            }
        }
        Self::new(out, &s.shape, false)
    }

    /// Index of the maximum entry in each row of a 2D tensor.
    pub fn argmax_rows(t: &Tensor) -> Vec<usize> {
        let s = t.borrow();
        assert_eq!(s.shape.len(), 2, "argmax_rows expects a 2D tensor");
        let (rows, cols) = (s.shape[0], s.shape[1]);
        (0..rows)
            .map(|r| {
                let row = &s.data[r * cols..(r + 1) * cols];
                row.iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).expect("no NaN in argmax"))
                    .map(|(j, _)| j)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Categorical cross-entropy over class probabilities.
    ///
    /// `probs` are post-softmax probabilities (the model's output layer),
    /// `targets` are one-hot rows. Returns a scalar tensor:
    /// -mean_batch sum_c t_c * ln(p_c).
    pub fn categorical_crossentropy(probs: &Tensor, targets: &Tensor) -> Tensor {
        let p = probs.borrow();
        let t = targets.borrow();
        assert_eq!(
            p.shape, t.shape,
            "loss requires matching shapes ({:?} vs {:?})",
            p.shape, t.shape
        );
        assert_eq!(p.shape.len(), 2, "loss expects (batch, classes)");
        let (rows, cols) = (p.shape[0], p.shape[1]);
        let eps = 1e-7f32;
        let mut total = 0.0;
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                total -= t.data[idx] * (p.data[idx].max(eps)).ln();
            }
        }
        Self::new(vec![total / rows as f32], &[1], false)
    }
}

// ===== TRAIT-BASED API =====

/// Ergonomic method syntax on the `Tensor` alias:
/// `x.add(&y)` instead of `RawTensor::add(&x, &y)`.
pub trait TensorOps {
    fn add(&self, other: &Tensor) -> Tensor;
    fn elem_mul(&self, other: &Tensor) -> Tensor;
    fn matmul(&self, other: &Tensor) -> Tensor;
    fn reshape(&self, new_shape: &[usize]) -> Tensor;
    fn relu(&self) -> Tensor;
    fn sigmoid(&self) -> Tensor;
    fn tanh(&self) -> Tensor;
    fn softmax_rows(&self) -> Tensor;
    fn shape(&self) -> Vec<usize>;
    fn numel(&self) -> usize;
}

impl TensorOps for Tensor {
    fn add(&self, other: &Tensor) -> Tensor {
        RawTensor::add(self, other)
    }
    fn elem_mul(&self, other: &Tensor) -> Tensor {
        RawTensor::elem_mul(self, other)
    }
    fn matmul(&self, other: &Tensor) -> Tensor {
        RawTensor::matmul(self, other)
    }
    fn reshape(&self, new_shape: &[usize]) -> Tensor {
        RawTensor::reshape(self, new_shape)
    }
    fn relu(&self) -> Tensor {
        RawTensor::relu(self)
    }
    fn sigmoid(&self) -> Tensor {
        RawTensor::sigmoid(self)
    }
    fn tanh(&self) -> Tensor {
        RawTensor::tanh(self)
    }
    fn softmax_rows(&self) -> Tensor {
        RawTensor::softmax_rows(self)
    }
    fn shape(&self) -> Vec<usize> {
        self.borrow().shape.clone()
    }
    fn numel(&self) -> usize {
        self.borrow().data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_same_shape() {
        let a = RawTensor::new(vec![1.0, 2.0, 3.0], &[3], false);
        let b = RawTensor::new(vec![10.0, 20.0, 30.0], &[3], false);
        assert_eq!(a.add(&b).borrow().data, vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_add_bias_broadcast() {
        // (2, 3) + (3)
        let x = RawTensor::new(vec![0.0; 6], &[2, 3], false);
        let bias = RawTensor::new(vec![1.0, 2.0, 3.0], &[3], false);
        let y = x.add(&bias);
        assert_eq!(y.borrow().data, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matmul() {
        let a = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], false);
        let b = RawTensor::new(vec![5.0, 6.0, 7.0, 8.0], &[2, 2], false);
        let c = a.matmul(&b);
        assert_eq!(c.borrow().shape, vec![2, 2]);
        assert_eq!(c.borrow().data, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0], &[2, 3], false);
        let p = x.softmax_rows();
        let data = p.borrow().data.clone();
        for r in 0..2 {
            let sum: f32 = data[r * 3..(r + 1) * 3].iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_argmax_rows() {
        let x = RawTensor::new(vec![0.1, 0.7, 0.2, 0.9, 0.05, 0.05], &[2, 3], false);
        assert_eq!(RawTensor::argmax_rows(&x), vec![1, 0]);
    }

    #[test]
    fn test_crossentropy_perfect_prediction_near_zero() {
        let probs = RawTensor::new(vec![1.0, 0.0, 0.0, 1.0], &[2, 2], false);
        let targets = RawTensor::new(vec![1.0, 0.0, 0.0, 1.0], &[2, 2], false);
        let loss = RawTensor::categorical_crossentropy(&probs, &targets);
        assert!(loss.borrow().data[0].abs() < 1e-5);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        seed_rng(42);
        let a = RawTensor::randn(&[4]);
        seed_rng(42);
        let b = RawTensor::randn(&[4]);
        assert_eq!(a.borrow().data, b.borrow().data);
    }
}
