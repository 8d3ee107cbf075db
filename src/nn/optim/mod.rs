use crate::tensor::Tensor;

mod adam;
mod rmsprop;
mod sgd;

pub use adam::Adam;
pub use rmsprop::RmsProp;
pub use sgd::Sgd;

/// Common surface over the optimizer variants so a compiled model can hold
/// whichever one the `optimizer` hyperparameter selected.
pub trait Optimizer {
    /// Perform one optimization step over the bound parameters.
    fn step(&mut self);

    /// Zero all parameter gradients.
    ///
    /// Must be called before each backward pass to avoid gradient
    /// accumulation across batches.
    fn zero_grad(&self);
}

pub(crate) fn clear_grads(params: &[Tensor]) {
    for param in params {
        param.borrow_mut().grad = None;
    }
}
