use burn::{nn::loss::Reduction, prelude::*};

/// Negative log-likelihood of the targets under the predicted log-probabilities.
///
/// # Shapes
///   - log_probs: `[batch_size, num_classes]`
///   - targets: `[batch_size]`
///   - output: `[1]`
pub fn nll_loss<B: Backend>(
    log_probs: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    reduction: Reduction,
) -> Tensor<B, 1> {
    let [batch_size, _] = log_probs.dims();
    let losses = log_probs.gather(1, targets.reshape([batch_size, 1])).neg();

    match reduction {
        Reduction::Mean | Reduction::Auto => losses.mean(),
        Reduction::Sum => losses.sum(),
    }
}

/// Number of samples whose most likely class is the target.
pub fn correct_count<B: Backend>(log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [batch_size, _] = log_probs.dims();

    log_probs
        .argmax(1)
        .reshape([batch_size])
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

/// Running sums over a full evaluation pass.
///
/// Losses are summed per batch and divided by the number of samples only at the end, so the mean
/// does not depend on how the split was cut into batches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationAccumulator {
    loss_sum: f64,
    correct: usize,
    total: usize,
}

impl EvaluationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one batch of predictions.
    pub fn update<B: Backend>(&mut self, log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) {
        let [batch_size] = targets.dims();
        let loss = nll_loss(log_probs.clone(), targets.clone(), Reduction::Sum)
            .into_scalar()
            .elem::<f64>();

        self.loss_sum += loss;
        self.correct += correct_count(log_probs, targets);
        self.total += batch_size;
    }

    pub fn mean_loss(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.loss_sum / self.total as f64
    }

    /// Percentage of correct predictions.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    fn log_probs(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        let probs = Tensor::<TestBackend, 2>::from_data(
            [
                [0.7, 0.2, 0.1], // 0
                [0.1, 0.8, 0.1], // 1
                [0.25, 0.25, 0.5], // 2
                [0.6, 0.3, 0.1], // 0
            ],
            device,
        );
        probs.log()
    }

    #[test]
    fn nll_loss_mean_should_average_target_log_probabilities() {
        let device = Default::default();
        let targets = Tensor::from_data([0, 1, 2, 1], &device);

        let loss = nll_loss(log_probs(&device), targets, Reduction::Mean)
            .into_scalar()
            .elem::<f64>();

        let expected = -(0.7f64.ln() + 0.8f64.ln() + 0.5f64.ln() + 0.3f64.ln()) / 4.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} != {expected}");
    }

    #[test]
    fn nll_loss_sum_should_not_divide_by_batch_size() {
        let device = Default::default();
        let targets = Tensor::<TestBackend, 1, Int>::from_data([0, 1, 2, 1], &device);

        let mean = nll_loss(log_probs(&device), targets.clone(), Reduction::Mean)
            .into_scalar()
            .elem::<f64>();
        let sum = nll_loss(log_probs(&device), targets, Reduction::Sum)
            .into_scalar()
            .elem::<f64>();

        assert!((sum - 4.0 * mean).abs() < 1e-5);
    }

    #[test]
    fn accuracy_should_be_full_when_all_predictions_match() {
        let device = Default::default();
        let mut accumulator = EvaluationAccumulator::new();

        accumulator.update(log_probs(&device), Tensor::from_data([0, 1, 2, 0], &device));

        assert_eq!(accumulator.correct(), 4);
        assert_eq!(accumulator.accuracy(), 100.0);
    }

    #[test]
    fn accuracy_should_be_zero_when_no_prediction_matches() {
        let device = Default::default();
        let mut accumulator = EvaluationAccumulator::new();

        accumulator.update(log_probs(&device), Tensor::from_data([1, 2, 0, 2], &device));

        assert_eq!(accumulator.correct(), 0);
        assert_eq!(accumulator.accuracy(), 0.0);
    }

    #[test]
    fn accumulator_should_weight_partial_batches() {
        let device = Default::default();
        let targets = [0, 1, 2, 1];
        let mut whole = EvaluationAccumulator::new();
        let mut split = EvaluationAccumulator::new();

        whole.update(log_probs(&device), Tensor::from_data(targets, &device));
        split.update(
            log_probs(&device).slice([0..3, 0..3]),
            Tensor::from_data([0, 1, 2], &device),
        );
        split.update(
            log_probs(&device).slice([3..4, 0..3]),
            Tensor::from_data([1], &device),
        );

        assert_eq!(whole.total(), split.total());
        assert_eq!(whole.correct(), split.correct());
        assert!((whole.mean_loss() - split.mean_loss()).abs() < 1e-6);
    }

    #[test]
    fn empty_accumulator_should_report_zero() {
        let accumulator = EvaluationAccumulator::new();

        assert_eq!(accumulator.mean_loss(), 0.0);
        assert_eq!(accumulator.accuracy(), 0.0);
    }
}
