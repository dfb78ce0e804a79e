use crate::{
    error::{Error, Result},
    training::TrainingConfig,
};
use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::{
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

/// Side length of an MNIST image.
pub const IMAGE_SIZE: usize = 28;
/// Number of input channels of an MNIST image.
pub const CHANNELS: usize = 1;

// Statistics of the MNIST training split.
const MEAN: f32 = 0.1307;
const STD: f32 = 0.3081;

#[derive(Clone, Default)]
pub struct MnistBatcher {}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            .map(|tensor| tensor.reshape([1, CHANNELS, IMAGE_SIZE, IMAGE_SIZE]))
            // Scale between [0, 1], then center with the dataset statistics.
            .map(|tensor| ((tensor / 255) - MEAN) / STD)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data([(item.label as i64).elem::<B::IntElem>()], device)
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}

impl<B: Backend> MnistBatch<B> {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the batch to the given device. Moving to the device the batch already lives on is a
    /// no-op.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            images: self.images.to_device(device),
            targets: self.targets.to_device(device),
        }
    }

    /// Verifies that the batch matches the fixed input geometry of the model and that every label
    /// is a valid class index.
    pub fn check(&self, num_classes: usize) -> Result<()> {
        let [batch_size, channels, height, width] = self.images.dims();
        let [num_targets] = self.targets.dims();

        if channels != CHANNELS || height != IMAGE_SIZE || width != IMAGE_SIZE {
            return Err(Error::InvalidBatch(format!(
                "expected images of shape [N, {CHANNELS}, {IMAGE_SIZE}, {IMAGE_SIZE}], got \
                 [{batch_size}, {channels}, {height}, {width}]"
            )));
        }
        if batch_size != num_targets {
            return Err(Error::InvalidBatch(format!(
                "{batch_size} images for {num_targets} targets"
            )));
        }
        if batch_size == 0 {
            return Err(Error::InvalidBatch("empty batch".to_string()));
        }

        let min = self.targets.clone().min().into_scalar().elem::<i64>();
        let max = self.targets.clone().max().into_scalar().elem::<i64>();
        for label in [min, max] {
            if label < 0 || label >= num_classes as i64 {
                return Err(Error::LabelOutOfRange { label, num_classes });
            }
        }

        Ok(())
    }
}

/// Options forwarded to the data loader of one split.
///
/// None of them changes what a pass over the split computes, only how fast batches arrive.
#[derive(Clone, Debug, new)]
pub struct LoaderOptions {
    pub batch_size: usize,
    /// Reshuffle the split at every pass with this seed.
    pub shuffle: Option<u64>,
    /// Number of background workers preparing batches.
    pub num_workers: Option<usize>,
    /// Page-locked host memory for faster device transfers.
    pub pin_memory: bool,
}

impl LoaderOptions {
    /// Builds a restartable loader over `dataset`, producing batches on `device`.
    pub fn build<B, D>(&self, dataset: D, device: &B::Device) -> Arc<dyn DataLoader<B, MnistBatch<B>>>
    where
        B: Backend,
        D: Dataset<MnistItem> + 'static,
    {
        if self.pin_memory {
            log::debug!("Pinned memory requested, batches are allocated by the backend directly");
        }

        let mut builder = DataLoaderBuilder::new(MnistBatcher::default())
            .batch_size(self.batch_size)
            .set_device(device.clone());

        if let Some(seed) = self.shuffle {
            builder = builder.shuffle(seed);
        }
        if let Some(num_workers) = self.num_workers {
            builder = builder.num_workers(num_workers);
        }

        builder.build(dataset)
    }
}

/// Loaders of one run: the training split on the autodiff backend, the test split on its inner
/// backend since evaluation never tracks gradients.
pub struct Loaders<B: AutodiffBackend> {
    pub train: Arc<dyn DataLoader<B, MnistBatch<B>>>,
    pub test: Arc<dyn DataLoader<B::InnerBackend, MnistBatch<B::InnerBackend>>>,
}

/// Builds the train and test loaders of a run with their own batch sizes.
///
/// Shuffling is seeded with the run seed, so two runs with the same configuration see the batches in
/// the same order.
pub fn build_loaders<B, D>(
    config: &TrainingConfig,
    device: &B::Device,
    train: D,
    test: D,
) -> Loaders<B>
where
    B: AutodiffBackend,
    D: Dataset<MnistItem> + 'static,
{
    let options = |batch_size| {
        LoaderOptions::new(
            batch_size,
            config.shuffle.then_some(config.seed),
            (config.num_workers > 0).then_some(config.num_workers),
            config.pin_memory,
        )
    };

    Loaders {
        train: options(config.batch_size).build::<B, D>(train, device),
        test: options(config.test_batch_size).build::<B::InnerBackend, D>(test, device),
    }
}

/// The MNIST train and test splits.
pub struct MnistData {
    pub train: MnistDataset,
    pub test: MnistDataset,
}

impl MnistData {
    /// Downloads the dataset on first use, then reads it from the local cache.
    pub fn download() -> Self {
        log::info!("Loading the MNIST dataset");
        let train = MnistDataset::train();
        let test = MnistDataset::test();
        log::info!(
            "Loaded {} training and {} test samples",
            train.len(),
            test.len()
        );

        Self { train, test }
    }
}
