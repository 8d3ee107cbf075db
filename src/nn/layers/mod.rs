mod activation;
mod batchnorm;
mod conv;
mod dropout;
mod flatten;
mod linear;
mod pool;
mod residual;
mod sep_conv;
mod sequential;

pub use activation::{Activation, Softmax};
pub use batchnorm::{BatchNorm1d, BatchNorm2d};
pub use conv::Conv2d;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use linear::Linear;
pub use pool::{GlobalAvgPool2d, GlobalMaxPool2d, MaxPool2d};
pub use residual::Residual;
pub use sep_conv::SeparableConv2d;
pub use sequential::{LayerEntry, Sequential, SequentialBuilder};
