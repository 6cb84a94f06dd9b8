/*
 * vars.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Vars command implementation
 */

use anyhow::Result;

/// Arguments for the vars command
#[derive(Debug)]
pub struct VarsArgs {
    pub file: String,
    pub max_iterations: usize,
}

/// Execute the vars command
pub fn execute(args: VarsArgs) -> Result<()> {
    print!("{}", run(&args)?);
    Ok(())
}

pub fn run(args: &VarsArgs) -> Result<String> {
    let doc = super::load_document(&args.file, args.max_iterations)?;
    Ok(doc
        .used_variables()
        .iter()
        .map(|name| format!("{}\n", name))
        .collect())
}
