#![recursion_limit = "256"]

use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    tensor::backend::AutodiffBackend,
};
use clap::Parser;
use mnist_cnn::{
    backend::DeviceKind,
    data::MnistData,
    logger::install_logger,
    model::ModelConfig,
    optim::AdadeltaConfig,
    training::{self, ConsoleRenderer, RunOutcome, TrainingConfig},
};

#[cfg(feature = "cuda")]
use burn::backend::{cuda::CudaDevice, Cuda};
#[cfg(feature = "mps")]
use burn::backend::{wgpu::WgpuDevice, Wgpu};

/// Trains a convolutional classifier on MNIST.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input batch size for training
    #[arg(long, value_name = "N", default_value_t = 64)]
    batch_size: usize,
    /// Input batch size for testing
    #[arg(long, value_name = "N", default_value_t = 1000)]
    test_batch_size: usize,
    /// Number of epochs to train
    #[arg(long, value_name = "N", default_value_t = 14)]
    epochs: usize,
    /// Learning rate
    #[arg(long, value_name = "LR", default_value_t = 1.0)]
    lr: f64,
    /// Learning rate step gamma
    #[arg(long, value_name = "M", default_value_t = 0.7)]
    gamma: f64,
    /// Disables CUDA training
    #[arg(long)]
    no_cuda: bool,
    /// Disables macOS GPU training
    #[arg(long)]
    no_mps: bool,
    /// Quickly check a single pass
    #[arg(long)]
    dry_run: bool,
    /// Random seed
    #[arg(long, value_name = "S", default_value_t = 1)]
    seed: u64,
    /// How many batches to wait before logging training status
    #[arg(long, value_name = "N", default_value_t = 10)]
    log_interval: usize,
    /// For saving the current model
    #[arg(long)]
    save_model: bool,
    /// Directory of the saved model and configuration
    #[arg(long, value_name = "DIR", default_value = ".")]
    artifact_dir: String,
}

impl Args {
    fn config(&self, device: DeviceKind) -> TrainingConfig {
        // Loader hints only apply to CUDA, MPS runs load like the CPU.
        let accelerated = device == DeviceKind::Cuda;

        TrainingConfig::new(ModelConfig::new(), AdadeltaConfig::new())
            .with_batch_size(self.batch_size)
            .with_test_batch_size(self.test_batch_size)
            .with_num_epochs(self.epochs)
            .with_lr(self.lr)
            .with_gamma(self.gamma)
            .with_seed(self.seed)
            .with_log_interval(self.log_interval)
            .with_dry_run(self.dry_run)
            .with_save_model(self.save_model)
            .with_artifact_dir(self.artifact_dir.clone())
            .with_num_workers(if accelerated { 1 } else { 0 })
            .with_shuffle(accelerated)
            .with_pin_memory(accelerated)
    }
}

fn launch<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: B::Device,
) -> mnist_cnn::Result<()> {
    config.validate()?;
    let data = MnistData::download();

    let summary = training::run::<B, _>(
        config,
        device,
        data.train,
        data.test,
        &mut ConsoleRenderer,
    )?;

    match summary.outcome {
        RunOutcome::Completed => log::info!(
            "Training completed: {} epochs, {} updates",
            summary.epochs.len(),
            summary.num_steps
        ),
        RunOutcome::DryRun => log::info!(
            "Dry run finished: {} epochs, {} updates",
            summary.epochs.len(),
            summary.num_steps
        ),
    }

    Ok(())
}

fn main() {
    install_logger();

    let args = Args::parse();
    let device = DeviceKind::select(args.no_cuda, args.no_mps);
    let config = args.config(device);
    log::info!("Running on {device}");

    let result = match device {
        #[cfg(feature = "cuda")]
        DeviceKind::Cuda => launch::<Autodiff<Cuda>>(&config, CudaDevice::default()),
        #[cfg(feature = "mps")]
        DeviceKind::Mps => launch::<Autodiff<Wgpu>>(&config, WgpuDevice::default()),
        _ => launch::<Autodiff<NdArray>>(&config, NdArrayDevice::Cpu),
    };

    if let Err(err) = result {
        log::error!("{err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
