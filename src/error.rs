/// Errors that abort a training run.
///
/// Numeric instabilities are not represented here: a non-finite loss keeps flowing through the
/// tensor backend exactly like any other value.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid run configuration, detected before any training state exists.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A batch does not match the fixed input geometry of the model.
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// A target label is outside of `[0, num_classes)`.
    #[error("Label {label} is out of range for {num_classes} classes")]
    LabelOutOfRange { label: i64, num_classes: usize },

    /// Failure while saving or loading a record.
    #[error("Record error: {0}")]
    Record(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<burn::record::RecorderError> for Error {
    fn from(error: burn::record::RecorderError) -> Self {
        Error::Record(format!("{error:?}"))
    }
}
