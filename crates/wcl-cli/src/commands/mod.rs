//! Command implementations for the WCL CLI
//!
//! Each command renders its output to a string so it can be checked
//! without capturing stdout; `execute` prints it.

pub mod check;
pub mod expand;
pub mod fmt;
pub mod get;
pub mod vars;

use std::path::Path;

use anyhow::{Context, Result};
use wcl::{Document, SearchOptions, WclParser};
use wcl_fits::FitsHeaderReader;

/// Parse `file`, reading `$HEAD{...}` values in include paths from FITS files.
pub fn load_document(file: &str, max_iterations: usize) -> Result<Document> {
    let headers = FitsHeaderReader::new();
    WclParser::new()
        .with_headers(&headers)
        .with_max_iterations(max_iterations)
        .parse_file(Path::new(file))
        .with_context(|| format!("Failed to load {}", file))
}

/// Build search options from `KEY=VALUE` bindings.
pub fn current_bindings(bindings: &[String]) -> Result<SearchOptions> {
    let mut opts = SearchOptions::new();
    for binding in bindings {
        let (key, value) = binding
            .split_once('=')
            .with_context(|| format!("Invalid binding '{}', expected KEY=VALUE", binding))?;
        opts = opts.with_current(key.trim(), value.trim());
    }
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_bindings() {
        let opts =
            current_bindings(&["curr_exec=exec_2".to_string(), "BAND = r".to_string()]).unwrap();
        assert_eq!(opts.currentvals.get_str("curr_exec"), Some("exec_2"));
        assert_eq!(opts.currentvals.get_str("band"), Some("r"));

        assert!(current_bindings(&["nonsense".to_string()]).is_err());
    }
}
