/*
 * reader.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Walk the header/data units of a FITS file.

use crate::card::{BLOCK_SIZE, CARD_SIZE, Card, Header, parse_card};
use crate::error::{FitsError, FitsResult};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use wcl::{HeaderReader, WclResult};

/// Reads `$HEAD{...}` values from FITS files.
///
/// Every header/data unit is scanned; a keyword's value comes from the
/// first unit that defines it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsHeaderReader;

impl FitsHeaderReader {
    pub fn new() -> Self {
        Self
    }

    /// Look up several keywords with a single pass over the file.
    pub fn values(&self, path: &Path, keywords: &[String]) -> FitsResult<Vec<String>> {
        let headers = read_headers(path)?;
        keywords
            .iter()
            .map(|keyword| find(&headers, path, keyword))
            .collect()
    }
}

impl HeaderReader for FitsHeaderReader {
    fn lookup_header(&self, path: &Path, key: &str) -> WclResult<String> {
        let headers = read_headers(path)?;
        Ok(find(&headers, path, key)?)
    }

    fn lookup_headers(&self, path: &Path, keys: &[String]) -> WclResult<Vec<String>> {
        Ok(self.values(path, keys)?)
    }
}

fn find(headers: &[Header], path: &Path, keyword: &str) -> FitsResult<String> {
    headers
        .iter()
        .find_map(|header| header.get(keyword))
        .map(str::to_string)
        .ok_or_else(|| FitsError::MissingKeyword {
            path: path.to_path_buf(),
            keyword: keyword.to_string(),
        })
}

/// Read the headers of every header/data unit in the file.
pub fn read_headers(path: &Path) -> FitsResult<Vec<Header>> {
    let io_error = |source: io::Error| FitsError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let len = file.metadata().map_err(io_error)?.len();
    let mut reader = BufReader::new(file);

    let mut headers = Vec::new();
    let mut offset = 0u64;
    while offset < len {
        let hdu = headers.len();
        let Some((header, blocks)) = read_header(&mut reader, path, hdu)? else {
            break;
        };
        let data = data_size(&header, path, hdu)?;
        offset += (blocks * BLOCK_SIZE) as u64 + padded(data);
        tracing::debug!(path = %path.display(), hdu, cards = header.len(), data, "read FITS header");
        headers.push(header);
        reader.seek(SeekFrom::Start(offset)).map_err(io_error)?;
    }

    if headers.is_empty() {
        return Err(FitsError::NotFits {
            path: path.to_path_buf(),
        });
    }
    Ok(headers)
}

/// Read one header, returning it with the number of blocks it spans.
///
/// Returns `None` when the next block does not start a header unit
/// (trailing special records after the last extension).
fn read_header<R: Read>(
    reader: &mut R,
    path: &Path,
    hdu: usize,
) -> FitsResult<Option<(Header, usize)>> {
    let first_keyword = if hdu == 0 { "SIMPLE" } else { "XTENSION" };
    let mut header = Header::default();
    let mut block = [0u8; BLOCK_SIZE];
    let mut blocks = 0;

    loop {
        match reader.read_exact(&mut block) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return match (blocks, hdu) {
                    (0, 0) => Err(FitsError::NotFits {
                        path: path.to_path_buf(),
                    }),
                    (0, _) => Ok(None),
                    _ => Err(FitsError::Truncated {
                        path: path.to_path_buf(),
                        hdu,
                    }),
                };
            }
            Err(source) => {
                return Err(FitsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        if blocks == 0 && !block.starts_with(first_keyword.as_bytes()) {
            return if hdu == 0 {
                Err(FitsError::NotFits {
                    path: path.to_path_buf(),
                })
            } else {
                Ok(None)
            };
        }
        blocks += 1;

        for raw in block.chunks(CARD_SIZE) {
            match parse_card(raw) {
                Card::End => return Ok(Some((header, blocks))),
                Card::Value { keyword, value } => header.push(keyword, value),
                Card::Other => {}
            }
        }
    }
}

/// Size in bytes of the data unit following `header`.
fn data_size(header: &Header, path: &Path, hdu: usize) -> FitsResult<u64> {
    let int = |keyword: &str, default: Option<i64>| -> FitsResult<i64> {
        match (header.get(keyword), default) {
            (Some(value), _) => value.parse().map_err(|_| FitsError::InvalidKeyword {
                path: path.to_path_buf(),
                hdu,
                keyword: keyword.to_string(),
                value: value.to_string(),
            }),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(FitsError::InvalidKeyword {
                path: path.to_path_buf(),
                hdu,
                keyword: keyword.to_string(),
                value: String::new(),
            }),
        }
    };

    let naxis = int("NAXIS", Some(0))?;
    if naxis == 0 {
        return Ok(0);
    }
    let bitpix = int("BITPIX", None)?;
    let pcount = int("PCOUNT", Some(0))?;
    let gcount = int("GCOUNT", Some(1))?;

    let overflow = |keyword: &str, value: i64| FitsError::InvalidKeyword {
        path: path.to_path_buf(),
        hdu,
        keyword: keyword.to_string(),
        value: value.to_string(),
    };

    let mut elements = 1i64;
    for axis in 1..=naxis {
        let keyword = format!("NAXIS{}", axis);
        let length = int(&keyword, None)?;
        elements = elements
            .checked_mul(length)
            .ok_or_else(|| overflow(&keyword, length))?;
    }
    let bits = pcount
        .checked_add(elements)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bitpix.abs()))
        .ok_or_else(|| overflow("GCOUNT", gcount))?;
    Ok((bits / 8).max(0) as u64)
}

fn padded(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wcl::WclError;

    /// Build a header padded to whole blocks, ending with END.
    fn header_block(cards: &[&str]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for card in cards.iter().chain(std::iter::once(&"END")) {
            bytes.extend(format!("{:<80}", card).bytes());
        }
        bytes.resize(padded(bytes.len() as u64) as usize, b' ');
        bytes
    }

    fn data_block(len: usize) -> Vec<u8> {
        let mut bytes = vec![7u8; len];
        bytes.resize(padded(len as u64) as usize, 0);
        bytes
    }

    fn write_fits(parts: &[Vec<u8>]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for part in parts {
            file.write_all(part).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn image_file() -> NamedTempFile {
        write_fits(&[
            header_block(&[
                "SIMPLE  =                    T",
                "BITPIX  =                   16",
                "NAXIS   =                    2",
                "NAXIS1  =                   10",
                "NAXIS2  =                    3",
                "EXTEND  =                    T",
                "OBJECT  = 'M31     '           / target",
                "OBSERVER= 'O''Brien'",
            ]),
            data_block(60),
            header_block(&[
                "XTENSION= 'BINTABLE'",
                "BITPIX  =                    8",
                "NAXIS   =                    2",
                "NAXIS1  =                   12",
                "NAXIS2  =                  300",
                "PCOUNT  =                    0",
                "GCOUNT  =                    1",
                "EXPTIME =                 90.0 / seconds",
                "OBJECT  = 'ignored'",
            ]),
            data_block(3600),
        ])
    }

    #[test]
    fn test_reads_every_hdu() {
        let file = image_file();
        let headers = read_headers(file.path()).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].get("xtension"), Some("BINTABLE"));
    }

    #[test]
    fn test_first_hdu_wins() {
        let file = image_file();
        let reader = FitsHeaderReader::new();
        assert_eq!(reader.lookup_header(file.path(), "object").unwrap(), "M31");
        assert_eq!(reader.lookup_header(file.path(), "EXPTIME").unwrap(), "90.0");
        assert_eq!(
            reader
                .lookup_headers(
                    file.path(),
                    &["observer".to_string(), "extend".to_string()]
                )
                .unwrap(),
            vec!["O'Brien", "True"]
        );
    }

    #[test]
    fn test_missing_keyword() {
        let file = image_file();
        let err = FitsHeaderReader::new()
            .lookup_header(file.path(), "AIRMASS")
            .unwrap_err();
        match err {
            WclError::Header { message, .. } => assert!(message.contains("AIRMASS not found")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_not_a_fits_file() {
        let file = write_fits(&[b"band = g\n".to_vec()]);
        let err = read_headers(file.path()).unwrap_err();
        assert!(matches!(err, FitsError::NotFits { .. }));

        let file = write_fits(&[vec![b'x'; BLOCK_SIZE]]);
        let err = read_headers(file.path()).unwrap_err();
        assert!(matches!(err, FitsError::NotFits { .. }));
    }

    #[test]
    fn test_missing_end_card() {
        let mut block = header_block(&["SIMPLE  =                    T"]);
        // Overwrite END so the header runs off the end of the file
        block[CARD_SIZE..CARD_SIZE + 3].copy_from_slice(b"   ");
        let file = write_fits(&[block]);
        let err = read_headers(file.path()).unwrap_err();
        assert!(matches!(err, FitsError::Truncated { hdu: 0, .. }));
    }

    #[test]
    fn test_bad_axis_length() {
        let file = write_fits(&[header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    1",
            "NAXIS1  = 'wide'",
        ])]);
        let err = read_headers(file.path()).unwrap_err();
        match err {
            FitsError::InvalidKeyword { keyword, value, .. } => {
                assert_eq!(keyword, "NAXIS1");
                assert_eq!(value, "wide");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_oversized_data_unit() {
        let file = write_fits(&[header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =  9000000000000000000",
            "NAXIS2  =                    2",
        ])]);
        let err = read_headers(file.path()).unwrap_err();
        match err {
            FitsError::InvalidKeyword { keyword, value, .. } => {
                assert_eq!(keyword, "NAXIS2");
                assert_eq!(value, "2");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = read_headers(Path::new("/nonexistent/file.fits")).unwrap_err();
        assert!(matches!(err, FitsError::Io { .. }));
    }
}
