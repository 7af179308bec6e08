// Merchant / date / total resolution over the unified receipt text
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::parse_decimal;

/// Best-effort header fields; anything undetermined stays `None` and never
/// blocks the other fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub merchant: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub total_amount: Option<f64>,
}

// Known chains first, then the generic purchase phrasing with the merchant
// as a capture group. First match wins.
static MERCHANT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"DIA",
        r"MERCADONA",
        r"CARREFOUR",
        r"LIDL",
        r"ALDI",
        r"Compra en (.+?) \d{2}/\d{2}/\d{4}",
    ]
    .iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("merchant pattern"))
    .collect()
});

// Decreasing specificity: date+time beats bare date, day-first beats
// year-first.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\d{1,2}[/-]\d{1,2}[/-]\d{4}\s+\d{1,2}:\d{2})",
        r"(\d{1,2}[/-]\d{1,2}[/-]\d{4})",
        r"(\d{4}[/-]\d{1,2}[/-]\d{1,2})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("date pattern"))
    .collect()
});

const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%Y-%m-%d",
];

// Most specific label first; the generic "Total:" only applies when nothing
// better matched anywhere in the document.
static TOTAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Total a pagar[._\s]*(\d+[,\.]\d{2})",
        r"Total venta [A-Za-z]*\s+(\d+[,\.]\d{2})",
        r"IMPORTE:\s*(\d+[,\.]\d{2})",
        r"Total[:\s]*(\d+[,\.]\d{2})",
    ]
    .iter()
    .map(|pattern| Regex::new(&format!("(?im){pattern}")).expect("total pattern"))
    .collect()
});

/// Resolve all three header fields from the unified text.
pub fn parse_fields(text: &str) -> ParsedFields {
    let lines: Vec<&str> = text.lines().collect();
    let fields = ParsedFields {
        merchant: resolve_merchant(text, &lines),
        timestamp: resolve_timestamp(text),
        total_amount: resolve_total(text),
    };
    debug!(?fields, "resolved header fields");
    fields
}

pub fn resolve_merchant(text: &str, lines: &[&str]) -> Option<String> {
    for pattern in MERCHANT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let matched = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = matched {
                return Some(m.as_str().trim().to_string());
            }
        }
    }

    // Fallback: first plausible line near the top of the document
    for line in lines.iter().take(5) {
        let line = line.trim();
        if line.chars().count() > 3 && !line.starts_with(|c: char| c.is_ascii_digit()) {
            return Some(line.chars().take(50).collect());
        }
    }

    None
}

pub fn resolve_timestamp(text: &str) -> Option<NaiveDateTime> {
    for pattern in DATE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let Some(date_str) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        for format in DATE_FORMATS {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(date_str, format) {
                return Some(datetime);
            }
            if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
                return Some(date.and_time(chrono::NaiveTime::MIN));
            }
        }
        // Matched substring parses under no known format; try the next,
        // less specific pattern.
    }
    None
}

pub fn resolve_total(text: &str) -> Option<f64> {
    for pattern in TOTAL_PATTERNS.iter() {
        let amounts: Vec<&str> = pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect();
        // The last labeled match is the grand total; earlier ones tend to be
        // subtotals or per-item figures.
        if let Some(raw) = amounts.last() {
            if let Some(value) = parse_decimal(raw) {
                return Some(value);
            }
        }
    }
    None
}
