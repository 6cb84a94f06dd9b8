/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::path::PathBuf;
use thiserror::Error;
use wcl::WclError;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a FITS file", .path.display())]
    NotFits { path: PathBuf },

    #[error("Header {hdu} of {} has no END card", .path.display())]
    Truncated { path: PathBuf, hdu: usize },

    #[error("Invalid {keyword} in header {hdu} of {}: '{value}'", .path.display())]
    InvalidKeyword {
        path: PathBuf,
        hdu: usize,
        keyword: String,
        value: String,
    },

    #[error("Keyword {keyword} not found in {}", .path.display())]
    MissingKeyword { path: PathBuf, keyword: String },
}

impl FitsError {
    pub fn path(&self) -> &PathBuf {
        match self {
            FitsError::Io { path, .. }
            | FitsError::NotFits { path }
            | FitsError::Truncated { path, .. }
            | FitsError::InvalidKeyword { path, .. }
            | FitsError::MissingKeyword { path, .. } => path,
        }
    }
}

impl From<FitsError> for WclError {
    fn from(err: FitsError) -> Self {
        WclError::Header {
            path: err.path().clone(),
            message: err.to_string(),
        }
    }
}

pub type FitsResult<T> = Result<T, FitsError>;
