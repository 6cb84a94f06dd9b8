/*
 * check.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Check command implementation
 */

use anyhow::Result;
use tracing::info;
use wcl::{Node, Section};

/// Arguments for the check command
#[derive(Debug)]
pub struct CheckArgs {
    pub file: String,
    pub max_iterations: usize,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    println!("{}", run(&args)?);
    Ok(())
}

pub fn run(args: &CheckArgs) -> Result<String> {
    let doc = super::load_document(&args.file, args.max_iterations)?;
    let sections = count_sections(doc.root());
    let keys = doc.root().scalar_count();
    info!(file = %args.file, sections, keys, "parsed");
    Ok(format!("{}: {} sections, {} keys", args.file, sections, keys))
}

fn count_sections(section: &Section) -> usize {
    section
        .iter()
        .filter_map(|(_, node)| match node {
            Node::Section(child) => Some(1 + count_sections(child)),
            Node::Scalar(_) => None,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_counts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.wcl");
        std::fs::write(&path, "a = 1\n<s>\nb = 2\n<t>\n</t>\n</s>\n").unwrap();

        let out = run(&CheckArgs {
            file: path.display().to_string(),
            max_iterations: 100,
        })
        .unwrap();
        assert!(out.ends_with(": 2 sections, 2 keys"));
    }

    #[test]
    fn test_check_reports_structure_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.wcl");
        std::fs::write(&path, "<s>\n").unwrap();

        let err = run(&CheckArgs {
            file: path.display().to_string(),
            max_iterations: 100,
        })
        .unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("Failed to load"));
        assert!(chain.contains("missing section closing line"));
    }
}
