use crate::{
    error::Result,
    model::{Model, ModelConfig},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::path::PathBuf;

/// File name of a saved model, the recorder adds the extension.
pub const MODEL_NAME: &str = "mnist_cnn";
/// File name of the configuration saved next to a model.
pub const CONFIG_FILE: &str = "config.json";

/// Recorder storing parameters as a name to tensor map, without loss of precision.
pub type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Saves the parameters of `model` to `path`.
pub fn save_model<B: Backend>(model: Model<B>, path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    log::info!("Saving the model to {}", path.display());

    model.save_file(path, &ModelRecorder::new())?;
    Ok(())
}

/// Builds a model from `config` and loads the parameters saved at `path` into it.
pub fn load_model<B: Backend>(
    config: &ModelConfig,
    path: impl Into<PathBuf>,
    device: &B::Device,
) -> Result<Model<B>> {
    let path = path.into();
    log::info!("Loading the model from {}", path.display());

    let model = config
        .init::<B>(device)
        .load_file(path, &ModelRecorder::new(), device)?;
    Ok(model)
}
