use crate::{
    data::{MnistBatch, CHANNELS, IMAGE_SIZE},
    loss::nll_loss,
};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::Reduction,
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::activation::log_softmax,
    train::ClassificationOutput,
};

/// Whether the forward pass regularizes (training) or is deterministic (evaluation).
///
/// The mode travels with each call instead of living in the layers, so two handles on the same
/// parameters can never disagree about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 10)]
    pub num_classes: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = 0.25)]
    pub dropout_features: f64,
    #[config(default = 0.5)]
    pub dropout_hidden: f64,
}

/// Two convolutions, a max pooling and two fully connected layers.
///
/// The layer geometry is fixed for single channel 28x28 images:
///
/// | layer | output shape      |
/// |-------|-------------------|
/// | conv1 | `[N, 32, 26, 26]` |
/// | conv2 | `[N, 64, 24, 24]` |
/// | pool  | `[N, 64, 12, 12]` |
/// | fc1   | `[N, 128]`        |
/// | fc2   | `[N, 10]`         |
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout1: Dropout,
    dropout2: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

const CONV1_CHANNELS: usize = 32;
const CONV2_CHANNELS: usize = 64;
const KERNEL_SIZE: usize = 3;
// Two valid 3x3 convolutions followed by a 2x2 pooling.
const POOLED_SIZE: usize = (IMAGE_SIZE - 2 * (KERNEL_SIZE - 1)) / 2;
const FLATTENED_SIZE: usize = CONV2_CHANNELS * POOLED_SIZE * POOLED_SIZE;

impl ModelConfig {
    /// Returns the initialized model, with randomly initialized parameters.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        Model {
            conv1: Conv2dConfig::new([CHANNELS, CONV1_CHANNELS], [KERNEL_SIZE, KERNEL_SIZE])
                .init(device),
            conv2: Conv2dConfig::new([CONV1_CHANNELS, CONV2_CHANNELS], [KERNEL_SIZE, KERNEL_SIZE])
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout1: DropoutConfig::new(self.dropout_features).init(),
            dropout2: DropoutConfig::new(self.dropout_hidden).init(),
            fc1: LinearConfig::new(FLATTENED_SIZE, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Model<B> {
    /// # Shapes
    ///   - Images `[batch_size, 1, 28, 28]`
    ///   - Output `[batch_size, num_classes]`, log-probabilities.
    pub fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);
        let x = regularize(&self.dropout1, x, mode);

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = regularize(&self.dropout2, x, mode);
        let x = self.fc2.forward(x);

        log_softmax(x, 1)
    }

    /// Forward pass with the mean negative log-likelihood of the targets.
    pub fn forward_classification(
        &self,
        batch: MnistBatch<B>,
        mode: Mode,
    ) -> ClassificationOutput<B> {
        let output = self.forward(batch.images, mode);
        let loss = nll_loss(output.clone(), batch.targets.clone(), Reduction::Mean);

        ClassificationOutput::new(loss, output, batch.targets)
    }

    pub fn num_classes(&self) -> usize {
        self.fc2.weight.dims()[1]
    }

    /// Rejects a batch the fixed layer geometry cannot process, or with labels outside of the
    /// classes of this model.
    pub fn check_batch(&self, batch: &MnistBatch<B>) -> crate::Result<()> {
        batch.check(self.num_classes())
    }
}

fn regularize<B: Backend, const D: usize>(
    dropout: &Dropout,
    x: Tensor<B, D>,
    mode: Mode,
) -> Tensor<B, D> {
    match mode {
        Mode::Train => dropout.forward(x),
        Mode::Eval => x,
    }
}
