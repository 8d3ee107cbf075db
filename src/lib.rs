//! # hyperception
//!
//! A hypertunable adaptation of the Xception architecture, built for
//! hyperparameter search: one call turns an input shape, a class count, and a
//! mapping of hyperparameter overrides into a compiled classification model.
//!
//! The crate carries its own compact CPU backend (tensors, conv / separable
//! conv / dense / batch-norm / pooling layers, Adam / SGD / RMSprop
//! optimizers) so assembled models have real forward passes and inspectable
//! parameters.
//!
//! ```
//! use hyperception::{Hyperception, OptimizerConfig};
//!
//! let model = Hyperception::new(&[3, 32, 32], 10)
//!     .hparam("optimizer", "sgd")
//!     .hparam("num_residual_blocks", 2usize)
//!     .build()
//!     .unwrap();
//!
//! assert!(matches!(
//!     model.optimizer_config(),
//!     Some(OptimizerConfig::Sgd { .. })
//! ));
//! ```

pub mod blocks;
pub mod error;
pub mod hparams;
pub mod hyperception;
pub mod io;
pub mod model;
pub mod nn;
pub mod shape;
pub mod tensor;

pub use error::{HyperceptionError, Result};
pub use hparams::{default_fixed_hparams, default_hparams, Hparam, Hparams};
pub use hyperception::Hyperception;
pub use model::{Loss, Metric, Model, OptimizerConfig};
pub use nn::layers::{
    Activation, BatchNorm1d, BatchNorm2d, Conv2d, Dropout, Flatten, GlobalAvgPool2d,
    GlobalMaxPool2d, Linear, MaxPool2d, Residual, SeparableConv2d, Sequential, SequentialBuilder,
    Softmax,
};
pub use nn::optim::{Adam, Optimizer, RmsProp, Sgd};
pub use nn::Module;
pub use tensor::{seed_rng, RawTensor, Tensor, TensorOps};
