/*
 * header.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Header reading for `$HEAD{file,key1,key2,...}` tokens.

use crate::error::{WclError, WclResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Trait for reading header fields out of data files.
pub trait HeaderReader {
    /// Read a single header field from the file at `path`.
    fn lookup_header(&self, path: &Path, key: &str) -> WclResult<String>;

    /// Read several fields from the same file.
    ///
    /// Implementations that parse the whole header should override this
    /// to open the file once.
    fn lookup_headers(&self, path: &Path, keys: &[String]) -> WclResult<Vec<String>> {
        keys.iter()
            .map(|key| self.lookup_header(path, key))
            .collect()
    }
}

/// Reader that has no headers at all.
///
/// Every lookup fails, so `$HEAD{...}` tokens are reported instead of
/// silently substituted.
#[derive(Debug, Clone, Default)]
pub struct NullHeaderReader;

impl HeaderReader for NullHeaderReader {
    fn lookup_header(&self, path: &Path, key: &str) -> WclResult<String> {
        Err(WclError::Header {
            path: path.to_path_buf(),
            message: format!("no header reader configured (key {})", key),
        })
    }
}

/// Reader backed by an in-memory table of file → key → value.
///
/// Keys are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MemoryHeaderReader {
    headers: HashMap<PathBuf, HashMap<String, String>>,
}

impl MemoryHeaderReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        path: impl Into<PathBuf>,
        key: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        self.headers
            .entry(path.into())
            .or_default()
            .insert(key.to_uppercase(), value.into());
        self
    }
}

impl HeaderReader for MemoryHeaderReader {
    fn lookup_header(&self, path: &Path, key: &str) -> WclResult<String> {
        let file = self.headers.get(path).ok_or_else(|| WclError::Header {
            path: path.to_path_buf(),
            message: "no such file".to_string(),
        })?;
        file.get(&key.to_uppercase())
            .cloned()
            .ok_or_else(|| WclError::Header {
                path: path.to_path_buf(),
                message: format!("keyword {} not found", key),
            })
    }
}
