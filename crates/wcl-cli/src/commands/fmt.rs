/*
 * fmt.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Fmt command implementation
 */

use anyhow::Result;

/// Arguments for the fmt command
#[derive(Debug)]
pub struct FmtArgs {
    pub file: String,
    pub sort: bool,
    pub indent: usize,
    pub max_iterations: usize,
}

/// Execute the fmt command
pub fn execute(args: FmtArgs) -> Result<()> {
    print!("{}", run(&args)?);
    Ok(())
}

pub fn run(args: &FmtArgs) -> Result<String> {
    let doc = super::load_document(&args.file, args.max_iterations)?;
    Ok(wcl::serialize(&doc, args.sort, args.indent))
}
