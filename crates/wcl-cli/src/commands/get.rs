/*
 * get.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Get command implementation
 */

use anyhow::{Context, Result};
use tracing::debug;
use wcl::{Document, FullValue, ReplaceOptions};
use wcl_fits::FitsHeaderReader;

/// Arguments for the get command
#[derive(Debug)]
pub struct GetArgs {
    pub file: String,
    pub key: String,
    /// `KEY=VALUE` current-context bindings
    pub current: Vec<String>,
    /// Comma-separated section types
    pub search_order: Option<String>,
    pub raw: bool,
    pub max_iterations: usize,
}

/// Execute the get command
pub fn execute(args: GetArgs) -> Result<()> {
    print!("{}", run(&args)?);
    Ok(())
}

pub fn run(args: &GetArgs) -> Result<String> {
    let mut doc = super::load_document(&args.file, args.max_iterations)?;
    if let Some(order) = &args.search_order {
        doc.set_search_order(wcl::split_values(order, ','));
    }
    debug!(key = %args.key, search_order = ?doc.search_order(), "get");

    let headers = FitsHeaderReader::new();
    let mut opts = ReplaceOptions::new()
        .with_search(super::current_bindings(&args.current)?.required(true))
        .with_headers(&headers)
        .with_max_iterations(args.max_iterations);
    opts.replace_vars = !args.raw;

    let value = doc
        .getfull(&args.key, &opts)
        .with_context(|| format!("Failed to get {}", args.key))?
        .with_context(|| format!("Could not find value for {}", args.key))?;

    Ok(match value {
        FullValue::Scalar(text) => format!("{}\n", text),
        FullValue::List(values) => values.iter().map(|v| format!("{}\n", v)).collect(),
        FullValue::Section(section) => wcl::serialize(&Document::from_section(section), false, 4),
    })
}
