use crate::{
    data::{build_loaders, MnistBatch},
    error::Error,
    loss::EvaluationAccumulator,
    lr_scheduler::StepLrConfig,
    model::{Mode, Model, ModelConfig},
    optim::{AdadeltaConfig, LearningRateControl, ModelOptimizer},
    persist,
};
use burn::{
    data::{
        dataloader::DataLoader,
        dataset::{vision::MnistItem, Dataset},
    },
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    tensor::backend::AutodiffBackend,
    LearningRate,
};
use std::path::Path;

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdadeltaConfig,
    /// Input batch size for training.
    #[config(default = 64)]
    pub batch_size: usize,
    /// Input batch size for testing.
    #[config(default = 1000)]
    pub test_batch_size: usize,
    #[config(default = 14)]
    pub num_epochs: usize,
    /// Learning rate of the first epoch.
    #[config(default = 1.0)]
    pub lr: LearningRate,
    /// Learning rate decay applied after every epoch.
    #[config(default = 0.7)]
    pub gamma: f64,
    #[config(default = 1)]
    pub seed: u64,
    /// Number of training batches between two progress reports.
    #[config(default = 10)]
    pub log_interval: usize,
    /// Stop every training pass after its first progress report.
    #[config(default = false)]
    pub dry_run: bool,
    /// Save the trained model in `artifact_dir` at the end of the run.
    #[config(default = false)]
    pub save_model: bool,
    /// Background workers of each data loader, zero loads batches on the calling thread.
    #[config(default = 0)]
    pub num_workers: usize,
    /// Reshuffle both splits at every pass.
    #[config(default = false)]
    pub shuffle: bool,
    #[config(default = false)]
    pub pin_memory: bool,
    #[config(default = "String::from(\".\")")]
    pub artifact_dir: String,
}

impl TrainingConfig {
    /// Rejects options no run could make sense of.
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 || self.test_batch_size == 0 {
            return Err(Error::Config("Batch sizes must be greater than 0".to_string()));
        }
        if self.log_interval == 0 {
            return Err(Error::Config("Log interval must be greater than 0".to_string()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::Config(format!(
                "Learning rate must be a positive number, got {}",
                self.lr
            )));
        }

        Ok(())
    }
}

/// How a training pass, or a whole run, came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every batch of every pass was processed.
    Completed,
    /// At least one pass stopped after its first progress report.
    DryRun,
}

/// One progress report of a training pass.
#[derive(Clone, Debug)]
pub struct TrainingProgress {
    pub epoch: usize,
    /// Index of the reported batch in the pass, starting at zero.
    pub iteration: usize,
    /// Samples of the batches before the reported one.
    pub items_processed: usize,
    /// Samples of the whole split.
    pub items_total: usize,
    /// Share of the batches of the pass before the reported one, in percent.
    pub percent: f64,
    /// Mean loss of the reported batch.
    pub loss: f64,
}

/// Result of a full evaluation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationSummary {
    pub epoch: usize,
    pub mean_loss: f64,
    pub correct: usize,
    pub total: usize,
}

impl EvaluationSummary {
    fn new(epoch: usize, accumulator: &EvaluationAccumulator) -> Self {
        Self {
            epoch,
            mean_loss: accumulator.mean_loss(),
            correct: accumulator.correct(),
            total: accumulator.total(),
        }
    }

    /// Percentage of correctly classified samples.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }
}

/// Receives the progress reports of a run.
pub trait ProgressRenderer {
    /// Renders one training progress report.
    fn render_train(&mut self, item: &TrainingProgress);

    /// Renders the result of an evaluation pass, once per epoch.
    fn render_eval(&mut self, item: &EvaluationSummary);
}

/// Prints the progress reports to the standard output.
#[derive(Default)]
pub struct ConsoleRenderer;

impl ProgressRenderer for ConsoleRenderer {
    fn render_train(&mut self, item: &TrainingProgress) {
        println!(
            "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
            item.epoch,
            item.items_processed,
            item.items_total,
            item.percent,
            item.loss
        );
    }

    fn render_eval(&mut self, item: &EvaluationSummary) {
        println!(
            "\nTest set: Average loss: {:.4}, Accuracy: {}/{} ({:.0}%)\n",
            item.mean_loss,
            item.correct,
            item.total,
            item.accuracy()
        );
    }
}

/// What a training pass went through.
#[derive(Clone, Debug)]
pub struct TrainEpochOutcome {
    /// Number of batches processed, each one followed by an optimizer update.
    pub batches: usize,
    pub samples: usize,
    /// Loss of the last reported batch.
    pub last_loss: Option<f64>,
    pub outcome: RunOutcome,
}

/// Runs one training pass over `loader`.
///
/// Every batch goes through the same cycle: clear the gradient buffers, forward in training mode,
/// backward, then one optimizer update. A progress report is rendered every `log_interval`
/// batches, starting with the first one. With `dry_run`, the pass stops right after that first
/// report.
pub fn train_epoch<B, O>(
    mut model: Model<B>,
    optim: &mut ModelOptimizer<Model<B>, B, O>,
    loader: &dyn DataLoader<B, MnistBatch<B>>,
    device: &B::Device,
    epoch: usize,
    config: &TrainingConfig,
    renderer: &mut dyn ProgressRenderer,
) -> crate::Result<(Model<B>, TrainEpochOutcome)>
where
    B: AutodiffBackend,
    O: Optimizer<Model<B>, B>,
{
    let items_total = loader.num_items();
    let num_batches = items_total.div_ceil(config.batch_size).max(1);
    let mut summary = TrainEpochOutcome {
        batches: 0,
        samples: 0,
        last_loss: None,
        outcome: RunOutcome::Completed,
    };

    for (iteration, batch) in loader.iter().enumerate() {
        let batch = batch.to_device(device);
        model.check_batch(&batch)?;
        let batch_size = batch.len();

        optim.zero_grad();
        let output = model.forward_classification(batch, Mode::Train);
        let loss = output.loss.clone();
        optim.backward(&model, output.loss);
        model = optim.step(model);

        summary.batches += 1;
        summary.samples += batch_size;

        if iteration % config.log_interval != 0 {
            continue;
        }

        let loss = loss.into_scalar().elem::<f64>();
        renderer.render_train(&TrainingProgress {
            epoch,
            iteration,
            items_processed: iteration * batch_size,
            items_total,
            percent: 100.0 * iteration as f64 / num_batches as f64,
            loss,
        });
        summary.last_loss = Some(loss);

        if config.dry_run {
            summary.outcome = RunOutcome::DryRun;
            break;
        }
    }

    Ok((model, summary))
}

/// Runs one evaluation pass with the gradient-free view of `model`.
///
/// The view lives on the inner backend for the whole pass, so no operation of the pass is ever
/// recorded for a backward pass.
pub fn evaluate<B: AutodiffBackend>(
    model: &Model<B>,
    loader: &dyn DataLoader<B::InnerBackend, MnistBatch<B::InnerBackend>>,
    device: &B::Device,
    epoch: usize,
) -> crate::Result<EvaluationSummary> {
    let model = model.valid();

    evaluate_inner(&model, loader, device, epoch)
}

/// Runs one evaluation pass on any backend. Losses are summed over the batches and divided by the
/// number of samples at the end.
pub fn evaluate_inner<B: Backend>(
    model: &Model<B>,
    loader: &dyn DataLoader<B, MnistBatch<B>>,
    device: &B::Device,
    epoch: usize,
) -> crate::Result<EvaluationSummary> {
    let mut accumulator = EvaluationAccumulator::new();

    for batch in loader.iter() {
        let batch = batch.to_device(device);
        model.check_batch(&batch)?;

        let output = model.forward(batch.images, Mode::Eval);
        accumulator.update(output, batch.targets);
    }

    Ok(EvaluationSummary::new(epoch, &accumulator))
}

#[derive(Clone, Debug)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train: TrainEpochOutcome,
    pub eval: EvaluationSummary,
    /// Learning rate used during this epoch.
    pub lr: LearningRate,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub epochs: Vec<EpochSummary>,
    /// Total number of optimizer updates of the run.
    pub num_steps: usize,
    pub outcome: RunOutcome,
}

/// Trains a model from scratch for `num_epochs` epochs.
///
/// Each epoch is one training pass, one evaluation pass, then one learning rate decay. When
/// `save_model` is set, the trained model and the configuration are written to `artifact_dir` once
/// every epoch completed. Any error aborts the run.
pub fn run<B, D>(
    config: &TrainingConfig,
    device: B::Device,
    train: D,
    test: D,
    renderer: &mut dyn ProgressRenderer,
) -> crate::Result<RunSummary>
where
    B: AutodiffBackend,
    D: Dataset<MnistItem> + 'static,
{
    config.validate()?;
    B::seed(config.seed);

    let loaders = build_loaders::<B, D>(config, &device, train, test);
    let mut model = config.model.init::<B>(&device);
    let mut optim = ModelOptimizer::new(config.optimizer.init(), config.lr);
    let mut scheduler = StepLrConfig::new().with_gamma(config.gamma).init()?;

    log::info!(
        "Training for {} epochs on {} samples, evaluating on {} samples",
        config.num_epochs,
        loaders.train.num_items(),
        loaders.test.num_items()
    );

    let mut epochs = Vec::with_capacity(config.num_epochs);
    let mut outcome = RunOutcome::Completed;

    for epoch in 1..=config.num_epochs {
        let lr = optim.learning_rate();
        let (trained, train) = train_epoch(
            model,
            &mut optim,
            loaders.train.as_ref(),
            &device,
            epoch,
            config,
            renderer,
        )?;
        model = trained;

        let eval = evaluate(&model, loaders.test.as_ref(), &device, epoch)?;
        renderer.render_eval(&eval);

        let next_lr = scheduler.advance(&mut optim);
        log::info!(
            "Epoch {epoch} done: {} batches, learning rate {lr:e} -> {next_lr:e}",
            train.batches
        );

        if train.outcome == RunOutcome::DryRun {
            outcome = RunOutcome::DryRun;
        }
        epochs.push(EpochSummary {
            epoch,
            train,
            eval,
            lr,
        });
    }

    if config.save_model {
        let artifact_dir = Path::new(&config.artifact_dir);
        std::fs::create_dir_all(artifact_dir)?;
        config.save(artifact_dir.join(persist::CONFIG_FILE))?;
        persist::save_model(model, artifact_dir.join(persist::MODEL_NAME))?;
    }

    Ok(RunSummary {
        epochs,
        num_steps: optim.num_steps(),
        outcome,
    })
}
