//! Accept header parsing.
//!
//! Clients list the representations they understand with optional `q`
//! weights. Entries are ordered by descending weight; an entry without a
//! usable weight counts as `0` and ties keep the order the client sent them in.

use std::cmp::Ordering;

/// One media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedAcceptEntry {
    pub content_type: String,
    pub weight: f32,
}

impl WeightedAcceptEntry {
    fn parse(token: &str) -> Option<Self> {
        let mut parts = token.split(';');
        let content_type = parts.next().filter(|t| !t.is_empty())?;

        let weight = parts
            .find_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.eq_ignore_ascii_case("q").then_some(value)
            })
            .map(parse_weight)
            .unwrap_or(0.0);

        Some(Self {
            content_type: content_type.to_string(),
            weight,
        })
    }
}

fn parse_weight(raw: &str) -> f32 {
    match raw.parse::<f32>() {
        Ok(w) if w.is_finite() => w,
        _ => 0.0,
    }
}

/// Parse an `Accept` header into weighted entries, highest weight first.
///
/// Whitespace is ignored anywhere in the header. Malformed weights never fail
/// the parse, they just sink to weight `0`. Empty tokens such as a trailing
/// comma are skipped.
pub fn parse_weighted(header: Option<&str>) -> Vec<WeightedAcceptEntry> {
    let Some(header) = header else {
        return Vec::new();
    };

    let compact: String = header.chars().filter(|c| !c.is_whitespace()).collect();
    let mut entries: Vec<WeightedAcceptEntry> = compact
        .split(',')
        .filter_map(WeightedAcceptEntry::parse)
        .collect();

    // sort_by is stable, so equal weights stay in encounter order
    entries.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
    entries
}

/// Parse an `Accept` header into content types, most preferred first.
pub fn parse_accept(header: Option<&str>) -> Vec<String> {
    parse_weighted(header)
        .into_iter()
        .map(|entry| entry.content_type)
        .collect()
}

/// Media types compare case-insensitively, ignoring parameters such as `charset`.
pub fn same_media_type(a: &str, b: &str) -> bool {
    essence(a).eq_ignore_ascii_case(essence(b))
}

fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or(media_type).trim()
}
