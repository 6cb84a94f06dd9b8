/*
 * card.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! FITS header cards.
//!
//! A header is a run of 2880-byte blocks, each holding 36 cards of 80
//! ASCII characters. A value card has the keyword in columns 1-8 and `= `
//! in columns 9-10; the value follows, optionally trailed by `/ comment`.

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

const KEYWORD_SIZE: usize = 8;
const VALUE_INDICATOR: &str = "= ";

/// One parsed header of a header/data unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// Keyword (uppercase) and rendered value, in card order.
    cards: Vec<(String, String)>,
}

impl Header {
    /// Rendered value of the first card with `keyword`, ignoring case.
    pub fn get(&self, keyword: &str) -> Option<&str> {
        let keyword = keyword.to_uppercase();
        self.cards
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub(crate) fn push(&mut self, keyword: String, value: String) {
        self.cards.push((keyword, value));
    }
}

/// What a single 80-character card holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Card {
    Value { keyword: String, value: String },
    End,
    /// Comment, history, blank or otherwise valueless card.
    Other,
}

pub fn parse_card(raw: &[u8]) -> Card {
    let text = String::from_utf8_lossy(raw);
    let keyword = text.get(..KEYWORD_SIZE).unwrap_or(&*text).trim_end();
    if keyword == "END" {
        return Card::End;
    }
    match text.get(KEYWORD_SIZE..) {
        Some(rest) if rest.starts_with(VALUE_INDICATOR) && !keyword.is_empty() => Card::Value {
            keyword: keyword.to_uppercase(),
            value: render_value(&rest[VALUE_INDICATOR.len()..]),
        },
        _ => Card::Other,
    }
}

/// Render a card value as text.
///
/// Strings lose their quotes and trailing blanks (`''` is a literal
/// quote), logicals become `True`/`False`, anything else is kept as
/// written without its comment.
fn render_value(field: &str) -> String {
    let field = field.trim_start();
    if let Some(quoted) = field.strip_prefix('\'') {
        let mut out = String::new();
        let mut chars = quoted.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                    continue;
                }
                break;
            }
            out.push(c);
        }
        return out.trim_end().to_string();
    }

    let value = field.split('/').next().unwrap_or_default().trim();
    match value {
        "T" => "True".to_string(),
        "F" => "False".to_string(),
        other => other.to_string(),
    }
}
