//! Seeded runs share the process-wide random generator of the backend, so the tests of this binary
//! take turns.

mod common;

use common::*;
use mnist_cnn::training::{run, RunOutcome, RunSummary, TrainingConfig};
use std::sync::Mutex;

static SEEDED: Mutex<()> = Mutex::new(());

fn seeded_run(config: &TrainingConfig, train_size: usize) -> (RunSummary, RecordingRenderer) {
    let _guard = SEEDED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut renderer = RecordingRenderer::default();

    let summary = run::<TestAutodiffBackend, _>(
        config,
        Default::default(),
        synthetic_dataset(train_size),
        synthetic_dataset(4),
        &mut renderer,
    )
    .unwrap();

    (summary, renderer)
}

#[test]
fn first_loss_should_be_reproducible_with_same_seed() {
    let config = config()
        .with_batch_size(64)
        .with_num_epochs(1)
        .with_lr(1.0)
        .with_seed(1);

    let (_, first) = seeded_run(&config, 4);
    let (_, second) = seeded_run(&config, 4);

    assert_eq!(first.train[0].loss.to_bits(), second.train[0].loss.to_bits());
}

#[test]
fn dry_run_should_match_control_run_up_to_its_stop() {
    let control = config()
        .with_batch_size(4)
        .with_test_batch_size(4)
        .with_num_epochs(1)
        .with_seed(7);
    let dry_run = control.clone().with_dry_run(true);

    let (control_summary, control_reports) = seeded_run(&control, 20);
    let (dry_summary, dry_reports) = seeded_run(&dry_run, 20);

    assert_eq!(dry_summary.outcome, RunOutcome::DryRun);
    assert_eq!(dry_summary.num_steps, 1);
    assert_eq!(control_summary.num_steps, 5);
    assert_eq!(dry_reports.train.len(), 1);
    assert_eq!(
        dry_reports.train[0].loss.to_bits(),
        control_reports.train[0].loss.to_bits()
    );
    assert_eq!(
        dry_summary.epochs[0].train.last_loss.map(f64::to_bits),
        Some(control_reports.train[0].loss.to_bits())
    );
}
