#![allow(dead_code)]

use burn::data::dataset::{vision::MnistItem, InMemDataset};
use mnist_cnn::{
    model::ModelConfig,
    optim::AdadeltaConfig,
    training::{EvaluationSummary, ProgressRenderer, TrainingConfig, TrainingProgress},
};

pub type TestBackend = burn::backend::NdArray<f32>;
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

/// Synthetic digits: a bright 6x6 square whose position depends on the label.
pub fn synthetic_dataset(count: usize) -> InMemDataset<MnistItem> {
    let items = (0..count)
        .map(|index| {
            let label = (index % 10) as u8;
            let mut image = [[0.0f32; 28]; 28];
            let offset = 2 + 2 * label as usize;
            for row in image.iter_mut().skip(offset).take(6) {
                for pixel in row.iter_mut().skip(offset).take(6) {
                    *pixel = 200.0 + (index % 7) as f32;
                }
            }
            MnistItem { image, label }
        })
        .collect();

    InMemDataset::new(items)
}

pub fn config() -> TrainingConfig {
    TrainingConfig::new(ModelConfig::new(), AdadeltaConfig::new())
}

/// Keeps every report of a run.
#[derive(Default)]
pub struct RecordingRenderer {
    pub train: Vec<TrainingProgress>,
    pub eval: Vec<EvaluationSummary>,
}

impl ProgressRenderer for RecordingRenderer {
    fn render_train(&mut self, item: &TrainingProgress) {
        self.train.push(item.clone());
    }

    fn render_eval(&mut self, item: &EvaluationSummary) {
        self.eval.push(item.clone());
    }
}
