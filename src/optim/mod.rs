mod adadelta;
mod model_optimizer;

pub use adadelta::*;
pub use model_optimizer::*;

use burn::LearningRate;

/// Anything owning a global learning rate that a scheduler may adjust.
pub trait LearningRateControl {
    /// The learning rate applied by the next update.
    fn learning_rate(&self) -> LearningRate;

    /// Replaces the learning rate applied by the following updates.
    fn set_learning_rate(&mut self, lr: LearningRate);
}
