use std::path::PathBuf;

use thiserror::Error;

use crate::{NodeId, model::CentralityMetric};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Node {0} is not part of the road network")]
    UnknownNode(NodeId),
    #[error("Centrality data not available for metric '{0}'")]
    DataUnavailable(CentralityMetric),
    #[error("Artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
}

/// Coarse classification of an [`Error`] for callers that map failures
/// onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something unusable, retrying the same request cannot succeed
    Validation,
    /// A required node or artifact does not exist
    NotFound,
    /// Anything else
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::Validation,
            Error::UnknownNode(_) | Error::DataUnavailable(_) | Error::ArtifactNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::InvalidData(_)
            | Error::IoError(_)
            | Error::CsvError(_)
            | Error::GeoJsonError(_) => ErrorKind::Internal,
        }
    }
}
