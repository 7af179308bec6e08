// Line-item recovery from the product section of the receipt
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::parse_decimal;
use crate::models::LineItem;

// Product sections are bounded by a vendor header and the matching total
// line. Scanning outside a recognized section would pick up unrelated
// numeric text, so no section means no items.
static SECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"Productos vendidos por Dia[^A-Z]*?DESCRIPCIÓN.*?Total venta Dia"]
        .iter()
        .map(|pattern| Regex::new(&format!("(?is){pattern}")).expect("section pattern"))
        .collect()
});

// Family A: name, explicit quantity, unit token, unit price, total price
static EXPLICIT_QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Z\s]+?)\s+(\d+[,\.]?\d*)\s+(ud|kg)\s+(\d+[,\.]\d{2})\s*€\s+(\d+[,\.]\d{2})\s*€")
        .expect("explicit quantity pattern")
});

// Family B: name, unit price, total price - the "ud" keyword with no
// numeral means a single unit
static IMPLICIT_QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][A-Z\s]+?)\s+ud\s+(\d+[,\.]\d{2})\s*€\s+(\d+[,\.]\d{2})\s*€")
        .expect("implicit quantity pattern")
});

// Column labels bleed into the name capture when the table header folds
// into the same text run; any leading run of them is stripped, most
// specific first. The name capture classes cannot express "not a header
// word", so this happens after the fact.
static HEADER_RUNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^.*?TOTAL\s+", r"^.*?PRECIO\s+KG\s+", r"^.*?CANTIDAD\s+"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("header run pattern"))
        .collect()
});

static CATEGORY_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[AB]\s+").expect("category pattern"));
static ANY_SINGLE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\s+").expect("single letter pattern"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

const RESERVED_LABELS: &[&str] = &["DESCRIPCIÓN", "CANTIDAD", "PRECIO", "TOTAL"];

/// Parse purchased products out of the unified text.
///
/// Family A matches are taken first in document order; family B matches are
/// merged in afterwards, skipping names already present. Malformed
/// candidates are dropped individually, never failing the parse.
pub fn parse_line_items(text: &str) -> Vec<LineItem> {
    let Some(section) = find_product_section(text) else {
        debug!("no product section found; yielding no line items");
        return Vec::new();
    };

    let mut items: Vec<LineItem> = Vec::new();

    for caps in EXPLICIT_QUANTITY.captures_iter(section) {
        match build_explicit_item(&caps) {
            Some(item) => items.push(item),
            None => debug!(
                candidate = caps.get(0).map(|m| m.as_str()),
                "discarded explicit-quantity candidate"
            ),
        }
    }

    for caps in IMPLICIT_QUANTITY.captures_iter(section) {
        let Some(item) = build_implicit_item(&caps) else {
            debug!(
                candidate = caps.get(0).map(|m| m.as_str()),
                "discarded implicit-quantity candidate"
            );
            continue;
        };
        if items.iter().any(|existing| existing.name == item.name) {
            continue;
        }
        items.push(item);
    }

    debug!(items = items.len(), "parsed line items");
    items
}

fn find_product_section(text: &str) -> Option<&str> {
    SECTION_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(text).map(|m| m.as_str()))
}

fn build_explicit_item(caps: &Captures<'_>) -> Option<LineItem> {
    let name = clean_name(caps.get(1)?.as_str());
    let quantity_raw = parse_decimal(caps.get(2)?.as_str())?;
    let unit = caps.get(3)?.as_str();
    let unit_price = parse_decimal(caps.get(4)?.as_str())?;
    let total_price = parse_decimal(caps.get(5)?.as_str())?;

    // Unit-counted quantities are whole numbers; weight stays fractional
    let quantity = if unit == "ud" {
        quantity_raw.trunc()
    } else {
        quantity_raw
    };

    valid_name(&name).then_some(LineItem {
        name,
        quantity,
        unit_price,
        total_price,
    })
}

fn build_implicit_item(caps: &Captures<'_>) -> Option<LineItem> {
    let name = clean_name_loose(caps.get(1)?.as_str());
    let unit_price = parse_decimal(caps.get(2)?.as_str())?;
    let total_price = parse_decimal(caps.get(3)?.as_str())?;

    valid_name(&name).then_some(LineItem {
        name,
        quantity: 1.0,
        unit_price,
        total_price,
    })
}

/// Family A cleanup: drop any folded header run, then a single leading
/// category letter (A/B on these layouts), then collapse whitespace.
fn clean_name(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    for prefix in HEADER_RUNS.iter() {
        name = prefix.replace(&name, "").to_string();
    }
    let name = CATEGORY_LETTER.replace(name.trim(), "");
    WHITESPACE_RUN.replace_all(name.trim(), " ").to_string()
}

/// Family B captures swallow more of the surrounding layout; after the
/// header runs, any single leading capital counts as a category letter.
fn clean_name_loose(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    for prefix in HEADER_RUNS.iter() {
        name = prefix.replace(&name, "").to_string();
    }
    let name = ANY_SINGLE_LETTER.replace(name.trim(), "");
    WHITESPACE_RUN.replace_all(name.trim(), " ").to_string()
}

fn valid_name(name: &str) -> bool {
    name.chars().count() > 2 && !RESERVED_LABELS.iter().any(|label| name.contains(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = "\
Productos vendidos por Dia
  DESCRIPCIÓN CANTIDAD PRECIO KG TOTAL
A LECHE ENTERA 1 ud 1,20 € 1,20 €
B PLATANO CANARIO 0,75 kg 2,40 € 1,80 €
A PAN INTEGRAL ud 0,95 € 0,95 €
Total venta Dia 3,95";

    #[test]
    fn explicit_unit_item_has_whole_quantity() {
        let items = parse_line_items(SECTION);
        let leche = items.iter().find(|i| i.name == "LECHE ENTERA").unwrap();
        assert_eq!(leche.quantity, 1.0);
        assert_eq!(leche.unit_price, 1.20);
        assert_eq!(leche.total_price, 1.20);
    }

    #[test]
    fn weight_item_keeps_fractional_quantity() {
        let items = parse_line_items(SECTION);
        let platano = items.iter().find(|i| i.name == "PLATANO CANARIO").unwrap();
        assert_eq!(platano.quantity, 0.75);
        assert_eq!(platano.unit_price, 2.40);
        assert_eq!(platano.total_price, 1.80);
    }

    #[test]
    fn implicit_quantity_defaults_to_one() {
        let items = parse_line_items(SECTION);
        let pan = items.iter().find(|i| i.name == "PAN INTEGRAL").unwrap();
        assert_eq!(pan.quantity, 1.0);
        assert_eq!(pan.unit_price, 0.95);
    }

    #[test]
    fn no_section_means_no_items() {
        let text = "GASOLINERA\n50,00 € 50,00 €\nTotal: 50,00";
        assert!(parse_line_items(text).is_empty());
    }

    #[test]
    fn families_deduplicate_by_cleaned_name() {
        // The same product listed once in each shape must come out once,
        // sourced from family A.
        let section = "\
Productos vendidos por Dia
  DESCRIPCIÓN CANTIDAD PRECIO KG TOTAL
A MANZANA GOLDEN 2 ud 0,80 € 1,60 €
A MANZANA GOLDEN ud 0,80 € 0,80 €
Total venta Dia 2,40";
        let items = parse_line_items(section);
        let manzanas: Vec<_> = items.iter().filter(|i| i.name == "MANZANA GOLDEN").collect();
        assert_eq!(manzanas.len(), 1);
        assert_eq!(manzanas[0].quantity, 2.0);
        assert_eq!(manzanas[0].total_price, 1.60);
    }

    #[test]
    fn header_labels_never_survive_as_names() {
        let items = parse_line_items(SECTION);
        assert!(!items.is_empty());
        for item in &items {
            for label in RESERVED_LABELS {
                assert!(
                    !item.name.contains(label),
                    "{} leaked into {}",
                    label,
                    item.name
                );
            }
        }
    }

    #[test]
    fn short_names_are_dropped() {
        let section = "\
Productos vendidos por Dia
  DESCRIPCIÓN CANTIDAD PRECIO KG TOTAL
A AB 1 ud 1,00 € 1,00 €
Total venta Dia 1,00";
        assert!(parse_line_items(section).is_empty());
    }

    #[test]
    fn header_runs_are_stripped_from_names() {
        assert_eq!(
            clean_name_loose("CANTIDAD PRECIO KG TOTAL A QUESO CURADO"),
            "QUESO CURADO"
        );
        assert_eq!(clean_name_loose("B  YOGUR  NATURAL"), "YOGUR NATURAL");
    }

    #[test]
    fn category_letter_is_stripped_once() {
        assert_eq!(clean_name("A LECHE  ENTERA"), "LECHE ENTERA");
        // Not a category prefix, just a name starting with A
        assert_eq!(clean_name("ARROZ REDONDO"), "ARROZ REDONDO");
    }

    #[test]
    fn parsing_twice_yields_identical_items() {
        assert_eq!(parse_line_items(SECTION), parse_line_items(SECTION));
    }
}
