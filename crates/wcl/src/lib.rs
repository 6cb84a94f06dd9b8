/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Workflow Control Language (WCL).
//!
//! WCL is a hierarchical configuration format used to describe data
//! processing jobs. This crate provides:
//!
//! - A line-oriented parser: `<section>` / `</section>` tags, `key = value`
//!   and `key value` pairs, comments, continuation lines, and the
//!   `<<include path>>` / `<<inclfunc name(args)>>` directives
//! - Scoped lookup: dotted paths, current-context bindings and a per-document
//!   search order over section types
//! - Variable substitution: `${var}`, `${var:width}`, `$opt{var}`,
//!   `$HEAD{file,key}`, `$FUNC{name,args}`
//! - Loop expansion of multi-valued variables into every combination
//! - Serialization back to text
//!
//! # Example
//!
//! ```ignore
//! use wcl::{ReplaceOptions, parse, replace_vars};
//!
//! let doc = parse("band = g,r\nccd = 7\n")?;
//! let opts = ReplaceOptions::new().with_expand(true);
//! let result = replace_vars("D_${band}_${ccd:2}.fits", &doc, &opts)?;
//! assert_eq!(result.values(), vec!["D_g_07.fits", "D_r_07.fits"]);
//! ```

pub mod document;
pub mod error;
pub mod header;
pub mod parser;
pub mod registry;
pub mod replace;
pub mod resolver;
pub mod split;
pub mod value;
pub mod writer;

// Re-export main types at crate root
pub use document::{CURRENT_PREFIX, CURRENT_SECTION, Document, FullValue, SearchOptions};
pub use error::{WclError, WclResult};
pub use header::{HeaderReader, MemoryHeaderReader, NullHeaderReader};
pub use parser::{WclParser, parse, parse_file};
pub use registry::{FragmentArgs, FunctionRegistry};
pub use replace::{
    Branch, Keep, MAX_ITERATIONS, ReplaceOptions, Substitution, TokenKind, VarSource,
    replace_vars, replace_vars_loop, replace_vars_single, replace_vars_type,
};
pub use resolver::{FileSystemResolver, IncludeResolver, MemoryResolver, expand_path};
pub use split::{is_multi_valued, split_values};
pub use value::{KeyCase, Node, Section};
pub use writer::{serialize, write_to};
