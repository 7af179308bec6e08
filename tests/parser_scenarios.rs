// End-to-end parsing scenarios over realistic receipt text
use recibo::extraction::{fields, line_items};

const DIA_RECEIPT: &str = "\
DIA RETAIL ESPAÑA S.A.
CALLE EJEMPLO 12, MADRID
15/03/2024 10:30
Productos vendidos por Dia
  DESCRIPCIÓN CANTIDAD PRECIO KG TOTAL
A LECHE ENTERA 1 ud 1,20 € 1,20 €
B PLATANO CANARIO 0,75 kg 2,40 € 1,80 €
A PAN INTEGRAL ud 0,95 € 0,95 €
Total venta Dia 3,95
Total a pagar 3,95
Gracias por su compra";

#[test]
fn full_receipt_resolves_every_field() {
    let parsed = fields::parse_fields(DIA_RECEIPT);

    assert_eq!(parsed.merchant.as_deref(), Some("DIA"));
    let timestamp = parsed.timestamp.expect("timestamp");
    assert_eq!(timestamp.format("%d/%m/%Y %H:%M").to_string(), "15/03/2024 10:30");
    assert_eq!(parsed.total_amount, Some(3.95));
}

#[test]
fn full_receipt_recovers_all_three_items() {
    let items = line_items::parse_line_items(DIA_RECEIPT);

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].name, "LECHE ENTERA");
    assert_eq!(items[0].quantity, 1.0);
    assert_eq!(items[1].name, "PLATANO CANARIO");
    assert_eq!(items[1].quantity, 0.75);
    assert_eq!(items[2].name, "PAN INTEGRAL");
    assert_eq!(items[2].quantity, 1.0);
}

#[test]
fn single_unit_line_parses_to_the_expected_item() {
    let text = "\
Productos vendidos por Dia
  DESCRIPCIÓN CANTIDAD PRECIO KG TOTAL
LECHE ENTERA 1 ud 1,20 € 1,20 €
Total venta Dia 1,20";

    let items = line_items::parse_line_items(text);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "LECHE ENTERA");
    assert_eq!(items[0].quantity, 1.0);
    assert_eq!(items[0].unit_price, 1.20);
    assert_eq!(items[0].total_price, 1.20);
}

#[test]
fn repeated_specific_label_takes_the_last_amount() {
    let text = "Total a pagar 23,45\npromociones aplicadas\nTotal a pagar 12,00";
    assert_eq!(fields::resolve_total(text), Some(12.00));
}

#[test]
fn comma_amounts_equal_dot_amounts() {
    let with_comma = fields::resolve_total("Total: 12,50").expect("comma total");
    let with_dot = fields::resolve_total("Total: 12.50").expect("dot total");
    assert_eq!(with_comma, with_dot);
    assert_eq!(with_comma, 12.50);
}

#[test]
fn dateless_text_leaves_timestamp_unset() {
    let parsed = fields::parse_fields("MERCADONA\nTotal: 5,00");
    assert_eq!(parsed.merchant.as_deref(), Some("MERCADONA"));
    assert!(parsed.timestamp.is_none());
    assert_eq!(parsed.total_amount, Some(5.00));
}

#[test]
fn unparseable_fields_do_not_block_each_other() {
    // Lowercase everything and drop the date; every field resolves or
    // stays None on its own.
    let text = "\
productos vendidos por dia
descripción cantidad precio kg total
A QUESO CURADO 1 ud 3,10 € 3,10 €
total venta dia 3,10";

    let parsed = fields::parse_fields(text);
    let items = line_items::parse_line_items(text);

    // Section matching is case-insensitive, so items still parse
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "QUESO CURADO");
    // The merchant table is case-insensitive too, and the "Total venta"
    // label resolves the amount; the missing date stays None without
    // blocking either.
    assert_eq!(parsed.merchant.as_deref(), Some("dia"));
    assert!(parsed.timestamp.is_none());
    assert_eq!(parsed.total_amount, Some(3.10));
}

#[test]
fn whole_document_numbers_outside_a_section_are_ignored() {
    let text = "\
FERRETERIA EL TORNILLO
TORNILLOS 5 ud 0,10 € 0,50 €
Total: 0,50";
    // No recognized product-section bounds, so no items even though the
    // line shape matches family A.
    assert!(line_items::parse_line_items(text).is_empty());
}

#[test]
fn parsing_the_same_text_twice_is_stable() {
    assert_eq!(fields::parse_fields(DIA_RECEIPT), fields::parse_fields(DIA_RECEIPT));
    assert_eq!(
        line_items::parse_line_items(DIA_RECEIPT),
        line_items::parse_line_items(DIA_RECEIPT)
    );
}
