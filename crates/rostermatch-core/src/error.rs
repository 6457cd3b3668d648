use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no configured encoding decodes {0}")]
    Decode(PathBuf),
    #[error("invalid roster header in {path}: expected columns {expected:?}, got {found:?}")]
    Format {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
