/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Include file resolution.
//!
//! This module provides traits and implementations for loading the text of
//! `<<include path>>` targets from various sources (filesystem, memory).

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Trait for loading included WCL text.
pub trait IncludeResolver {
    /// Load the text of an include by its already-expanded path.
    fn read_include(&self, path: &Path) -> io::Result<String>;
}

/// Resolver that reads includes from the filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileSystemResolver;

impl IncludeResolver for FileSystemResolver {
    fn read_include(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Resolver that serves includes from an in-memory map.
///
/// Useful for tests and for configurations bundled into an application.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<PathBuf, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn with_files(
        files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (path, content) in files {
            resolver.add(path, content);
        }
        resolver
    }
}

impl IncludeResolver for MemoryResolver {
    fn read_include(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not in memory resolver", path.display()),
            )
        })
    }
}

/// Expand a leading `~` and `$VAR` / `${VAR}` environment references.
///
/// Unknown variables are left untouched, as is a `~` when no home
/// directory can be determined.
pub fn expand_path(path: &str) -> PathBuf {
    let with_home = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => format!("{}{}", home.display(), rest),
            None => path.to_string(),
        },
        _ => path.to_string(),
    };
    PathBuf::from(expand_env_vars(&with_home))
}

fn expand_env_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), std::env::var(name)) {
            (false, Ok(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }
    out.push_str(rest);
    out
}
