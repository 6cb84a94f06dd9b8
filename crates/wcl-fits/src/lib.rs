/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! FITS header access for WCL.
//!
//! [`FitsHeaderReader`] implements [`wcl::HeaderReader`], so `$HEAD{file,key}`
//! tokens can read keywords from the primary header or any extension of a
//! FITS file.
//!
//! ```ignore
//! let headers = FitsHeaderReader::new();
//! let opts = ReplaceOptions::new().with_headers(&headers);
//! let band = replace_vars_single("$HEAD{${red_file},BAND}", &doc, &opts)?;
//! ```

pub mod card;
pub mod error;
pub mod reader;

pub use card::{Card, Header};
pub use error::{FitsError, FitsResult};
pub use reader::{FitsHeaderReader, read_headers};
