use thiserror::Error;

/// Result type alias for sheet operations.
pub type Result<T, E = SheetError> = std::result::Result<T, E>;

/// Sheet shape violations are all detected before any record is stored;
/// ingestion is all-or-nothing.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("invalid file format, only .csv files are accepted")]
    InvalidFormat,

    #[error("the file is empty")]
    Empty,

    #[error("invalid sheet structure: {0}")]
    InvalidStructure(String),

    #[error("error processing file: {0}")]
    Processing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
