use burn::{
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor,
        decay::{WeightDecay, WeightDecayConfig},
        SimpleOptimizer,
    },
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
    LearningRate,
};

/// Adadelta configuration.
#[derive(Config)]
pub struct AdadeltaConfig {
    /// Decay of the running averages of squared gradients and squared updates.
    #[config(default = 0.9)]
    rho: f32,
    /// A value required for numerical stability.
    #[config(default = 1e-6)]
    epsilon: f32,
    /// [Weight decay](WeightDecayConfig) config.
    weight_decay: Option<WeightDecayConfig>,
}

/// Adadelta optimizer as described in the paper
/// [ADADELTA: An Adaptive Learning Rate Method](https://arxiv.org/abs/1212.5701).
///
/// Every parameter gets its own step size, the ratio between the running RMS of past updates and
/// the running RMS of gradients. The learning rate scales that step globally.
#[derive(Clone)]
pub struct Adadelta {
    rho: f32,
    epsilon: f32,
    weight_decay: Option<WeightDecay>,
}

/// Adadelta state.
#[derive(Record, Clone, new)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    /// Running average of the squared gradients.
    pub square_avg: Tensor<B, D>,
    /// Running average of the squared updates.
    pub acc_delta: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        mut grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        if let Some(weight_decay) = &self.weight_decay {
            grad = weight_decay.transform(grad, tensor.clone());
        }

        let (square_avg, acc_delta) = match state {
            Some(state) => (state.square_avg, state.acc_delta),
            None => (grad.zeros_like(), grad.zeros_like()),
        };

        let square_avg = square_avg
            .mul_scalar(self.rho)
            .add(grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho));

        // Unit correction: RMS of past updates over RMS of gradients.
        let std = square_avg.clone().add_scalar(self.epsilon).sqrt();
        let delta = acc_delta
            .clone()
            .add_scalar(self.epsilon)
            .sqrt()
            .div(std)
            .mul(grad);

        let acc_delta = acc_delta
            .mul_scalar(self.rho)
            .add(delta.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho));

        let state = AdadeltaState::new(square_avg, acc_delta);

        (tensor - delta.mul_scalar(lr), Some(state))
    }

    fn to_device<const D: usize>(
        mut state: Self::State<D>,
        device: &B::Device,
    ) -> Self::State<D> {
        state.square_avg = state.square_avg.to_device(device);
        state.acc_delta = state.acc_delta.to_device(device);
        state
    }
}

impl AdadeltaConfig {
    /// Initialize Adadelta optimizer.
    ///
    /// # Returns
    ///
    /// Returns an optimizer that can be used to optimize a module.
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
    ) -> OptimizerAdaptor<Adadelta, M, B> {
        let optim = Adadelta {
            rho: self.rho,
            epsilon: self.epsilon,
            weight_decay: self.weight_decay.as_ref().map(WeightDecay::new),
        };

        OptimizerAdaptor::from(optim)
    }
}
