/*
 * expand.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Expand command implementation
 */

use anyhow::{Context, Result};
use wcl::{ReplaceOptions, replace_vars};
use wcl_fits::FitsHeaderReader;

/// Arguments for the expand command
#[derive(Debug)]
pub struct ExpandArgs {
    pub file: String,
    pub text: String,
    pub expand: bool,
    /// `KEY=VALUE` current-context bindings
    pub current: Vec<String>,
    pub json: bool,
    pub max_iterations: usize,
}

/// Execute the expand command
pub fn execute(args: ExpandArgs) -> Result<()> {
    print!("{}", run(&args)?);
    Ok(())
}

pub fn run(args: &ExpandArgs) -> Result<String> {
    let doc = super::load_document(&args.file, args.max_iterations)?;

    let headers = FitsHeaderReader::new();
    let opts = ReplaceOptions::new()
        .with_search(super::current_bindings(&args.current)?)
        .with_expand(args.expand)
        .with_headers(&headers)
        .with_max_iterations(args.max_iterations);

    let result = replace_vars(&args.text, &doc, &opts)
        .with_context(|| format!("Failed to expand '{}'", args.text))?;

    if args.json {
        let mut out = serde_json::to_string_pretty(result.branches())?;
        out.push('\n');
        return Ok(out);
    }
    Ok(result.values().iter().map(|v| format!("{}\n", v)).collect())
}
