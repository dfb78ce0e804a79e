use crate::{error::Error, optim::LearningRateControl};
use burn::{prelude::*, LearningRate};

/// The configuration for creating a [step learning rate scheduler](StepLr).
///
/// The learning rate of the controlled optimizer is multiplied by `gamma` every `step_size`
/// advances. With the default step size of one, the rate used during epoch `n` (counting from one)
/// is `lr * gamma^(n - 1)`.
#[derive(Config, Debug)]
pub struct StepLrConfig {
    /// Number of advances between two decays.
    #[config(default = 1)]
    pub step_size: usize,
    /// The factor by which the learning rate is multiplied at each decay.
    #[config(default = 0.7)]
    pub gamma: f64,
}

impl StepLrConfig {
    /// Initializes a [step learning rate scheduler](StepLr).
    ///
    /// # Errors
    ///
    /// Returns [Error::Config] when the step size is zero.
    pub fn init(&self) -> crate::Result<StepLr> {
        if self.step_size == 0 {
            return Err(Error::Config(
                "Scheduler step size must be greater than 0".to_string(),
            ));
        }

        Ok(StepLr {
            step_size: self.step_size,
            gamma: self.gamma,
            step_index: 0,
        })
    }
}

/// Step learning rate scheduler.
#[derive(Clone, Debug)]
pub struct StepLr {
    step_size: usize,
    gamma: f64,
    // Number of advances so far.
    step_index: usize,
}

impl StepLr {
    /// Moves the schedule one step forward and decays the learning rate of `target` when a decay
    /// boundary is reached. Returns the learning rate `target` uses from now on.
    ///
    /// The decay multiplies the current rate of `target`, so a rate changed by hand in between two
    /// advances is decayed from its new value.
    pub fn advance<C>(&mut self, target: &mut C) -> LearningRate
    where
        C: LearningRateControl + ?Sized,
    {
        self.step_index += 1;

        if self.step_index % self.step_size == 0 {
            let lr = target.learning_rate() * self.gamma;
            log::debug!("Learning rate decayed to {lr:e}");
            target.set_learning_rate(lr);
        }

        target.learning_rate()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }
}
