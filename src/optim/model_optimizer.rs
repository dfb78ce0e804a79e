use super::LearningRateControl;
use burn::{
    module::AutodiffModule,
    optim::{GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
    LearningRate,
};
use core::marker::PhantomData;

/// An [optimizer](Optimizer) bound to one model, with its gradient buffers and learning rate.
///
/// One training step is always `zero_grad`, `backward`, then `step`. Gradients of consecutive
/// backward passes add up until the buffers are cleared, and [step](Self::step) consumes them, so
/// an update is applied at most once to the whole parameter collection.
pub struct ModelOptimizer<M, B, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    optim: O,
    grads: GradientsAccumulator<M>,
    lr: LearningRate,
    num_steps: usize,
    _backend: PhantomData<B>,
}

impl<M, B, O> ModelOptimizer<M, B, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    pub fn new(optim: O, lr: LearningRate) -> Self {
        Self {
            optim,
            grads: GradientsAccumulator::new(),
            lr,
            num_steps: 0,
            _backend: PhantomData,
        }
    }

    /// Discards every gradient collected since the last update.
    pub fn zero_grad(&mut self) {
        self.grads = GradientsAccumulator::new();
    }

    /// Runs the backward pass of `loss` and adds the gradients of the model parameters to the
    /// buffers.
    pub fn backward(&mut self, model: &M, loss: Tensor<B, 1>) {
        let grads = GradientsParams::from_grads(loss.backward(), model);
        self.grads.accumulate(model, grads);
    }

    /// Applies one update with the buffered gradients and returns the updated model.
    pub fn step(&mut self, model: M) -> M {
        let grads = self.grads.grads();
        self.num_steps += 1;

        self.optim.step(self.lr, model, grads)
    }

    /// Number of updates applied so far.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }
}

impl<M, B, O> LearningRateControl for ModelOptimizer<M, B, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn learning_rate(&self) -> LearningRate {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: LearningRate) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{optim::AdadeltaConfig, tests::TestAutodiffBackend};
    use burn::{
        nn::{Linear, LinearConfig},
        tensor::Distribution,
    };

    fn setup() -> (
        Linear<TestAutodiffBackend>,
        Tensor<TestAutodiffBackend, 2>,
        ModelOptimizer<
            Linear<TestAutodiffBackend>,
            TestAutodiffBackend,
            impl Optimizer<Linear<TestAutodiffBackend>, TestAutodiffBackend>,
        >,
    ) {
        let device = Default::default();
        let linear = LinearConfig::new(4, 2).init(&device);
        let x = Tensor::random([3, 4], Distribution::Default, &device);
        let optim = ModelOptimizer::new(AdadeltaConfig::new().init(), 1.0);

        (linear, x, optim)
    }

    fn weights(linear: &Linear<TestAutodiffBackend>) -> Vec<f32> {
        linear.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn step_should_update_parameters() {
        let (linear, x, mut optim) = setup();
        let before = weights(&linear);

        optim.zero_grad();
        let loss = linear.forward(x).sum();
        optim.backward(&linear, loss);
        let linear = optim.step(linear);

        assert_ne!(before, weights(&linear));
        assert_eq!(optim.num_steps(), 1);
    }

    #[test]
    fn zero_grad_should_discard_buffered_gradients() {
        let (linear, x, mut optim) = setup();
        let before = weights(&linear);

        let loss = linear.forward(x).sum();
        optim.backward(&linear, loss);
        optim.zero_grad();
        let linear = optim.step(linear);

        assert_eq!(before, weights(&linear));
    }

    #[test]
    fn step_should_consume_buffered_gradients() {
        let (linear, x, mut optim) = setup();

        let loss = linear.forward(x).sum();
        optim.backward(&linear, loss);
        let linear = optim.step(linear);
        let after_first = weights(&linear);
        let linear = optim.step(linear);

        assert_eq!(after_first, weights(&linear));
        assert_eq!(optim.num_steps(), 2);
    }

    #[test]
    fn learning_rate_should_be_adjustable() {
        let (_, _, mut optim) = setup();

        optim.set_learning_rate(0.25);

        assert_eq!(optim.learning_rate(), 0.25);
    }
}
