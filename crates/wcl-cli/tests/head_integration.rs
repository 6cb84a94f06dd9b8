/*
 * head_integration.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for $HEAD{...} substitution against FITS files.
 */

//! These tests wire the WCL parser and substitution engine to the FITS
//! header reader the way the `wcl` binary does.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wcl::{FullValue, ReplaceOptions, WclError, WclParser, replace_vars_single};
use wcl_fits::FitsHeaderReader;

/// Write a single-HDU FITS file holding the given header cards.
fn write_fits(path: &Path, cards: &[&str]) {
    let mut bytes = Vec::new();
    for card in cards.iter().chain(std::iter::once(&"END")) {
        bytes.extend(format!("{:<80}", card).bytes());
    }
    let blocks = bytes.len().div_ceil(2880);
    bytes.resize(blocks * 2880, b' ');
    fs::write(path, bytes).expect("Failed to write FITS file");
}

fn exposure(temp: &TempDir) -> String {
    let path = temp.path().join("exposure.fits");
    write_fits(
        &path,
        &[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
            "BAND    = 'r       '",
            "CCDNUM  =                    5",
            "EXPNUM  =               229346",
        ],
    );
    path.display().to_string()
}

#[test]
fn test_head_in_document_values() {
    let temp = TempDir::new().unwrap();
    let fits = exposure(&temp);
    let text = format!(
        "red = {}\nname = D$HEAD{{${{red}},expnum}}_$HEAD{{${{red}},band,ccdnum}}\n",
        fits
    );

    let headers = FitsHeaderReader::new();
    let doc = WclParser::new().with_headers(&headers).parse_str(&text).unwrap();

    let opts = ReplaceOptions::new().with_headers(&headers);
    assert_eq!(
        doc.getfull("name", &opts).unwrap(),
        Some(FullValue::Scalar("D229346_r,5".to_string()))
    );
}

#[test]
fn test_head_feeds_width_and_loops() {
    let temp = TempDir::new().unwrap();
    let fits = exposure(&temp);
    let headers = FitsHeaderReader::new();
    let doc = WclParser::new()
        .parse_str(&format!("red = {}\nccd = $HEAD{{${{red}},ccdnum}}\n", fits))
        .unwrap();

    let opts = ReplaceOptions::new().with_headers(&headers);
    let value = replace_vars_single("c${ccd:2}", &doc, &opts).unwrap();
    assert_eq!(value, "c05");
}

#[test]
fn test_head_errors() {
    let temp = TempDir::new().unwrap();
    let fits = exposure(&temp);
    let headers = FitsHeaderReader::new();
    let doc = WclParser::new().parse_str("x = 1\n").unwrap();
    let opts = ReplaceOptions::new().with_headers(&headers);

    let err = replace_vars_single(&format!("$HEAD{{{},airmass}}", fits), &doc, &opts).unwrap_err();
    assert!(matches!(err, WclError::Header { .. }));

    let missing = temp.path().join("missing.fits");
    let err = replace_vars_single(
        &format!("$HEAD{{{},band}}", missing.display()),
        &doc,
        &opts,
    )
    .unwrap_err();
    assert!(matches!(err, WclError::Header { .. }));
}
