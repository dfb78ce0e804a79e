//! Trains a small convolutional classifier on MNIST with Adadelta and a step learning rate
//! schedule, reporting the loss and accuracy of every epoch.

#[macro_use]
extern crate derive_new;

pub mod backend;
pub mod data;
pub mod error;
pub mod logger;
pub mod loss;
pub mod lr_scheduler;
pub mod model;
pub mod optim;
pub mod persist;
pub mod training;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod tests {
    pub type TestBackend = burn::backend::NdArray;
    pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
}
