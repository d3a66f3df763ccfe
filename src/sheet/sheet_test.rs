use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::ROW_INDEX_FIELD;

#[test]
fn test_column_letter_known_values() {
    assert_eq!(column_letter(1), "A");
    assert_eq!(column_letter(26), "Z");
    assert_eq!(column_letter(27), "AA");
    assert_eq!(column_letter(52), "AZ");
    assert_eq!(column_letter(702), "ZZ");
    assert_eq!(column_letter(703), "AAA");
    assert_eq!(column_letter(0), "");
}

#[test]
fn test_column_number_known_values() {
    assert_eq!(column_number("A"), Some(1));
    assert_eq!(column_number("Z"), Some(26));
    assert_eq!(column_number("AA"), Some(27));
    assert_eq!(column_number("ZZ"), Some(702));
    assert_eq!(column_number("AAA"), Some(703));
    assert_eq!(column_number("aa"), Some(27));
    assert_eq!(column_number(""), None);
    assert_eq!(column_number("A1"), None);
}

#[test]
fn test_column_letter_round_trip() {
    for n in 1..=20_000 {
        assert_eq!(column_number(&column_letter(n)), Some(n), "column {}", n);
    }
}

#[test]
fn test_cell_ref_a1_is_one_indexed() {
    // row 5 of the table is the sixth sheet row
    assert_eq!(CellRef::new(5, 0).a1(), "A6");
    assert_eq!(CellRef::new(0, 26).a1(), "AA1");
}

#[test]
fn test_range_ref_parse_and_display() {
    let range: RangeRef = "Leads!E6".parse().unwrap();
    assert_eq!(range.sheet, "Leads");
    assert_eq!(range.cell, CellRef::new(5, 4));
    assert_eq!(range.to_string(), "Leads!E6");

    let quoted = RangeRef::new("My Sheet", CellRef::new(0, 27));
    assert_eq!(quoted.to_string(), "'My Sheet'!AB1");
    let parsed: RangeRef = quoted.to_string().parse().unwrap();
    assert_eq!(parsed, quoted);

    let apostrophe = RangeRef::new("Bob's", CellRef::new(2, 1));
    assert_eq!(apostrophe.to_string(), "'Bob''s'!B3");
    assert_eq!(apostrophe.to_string().parse::<RangeRef>().unwrap(), apostrophe);
}

#[test]
fn test_range_ref_rejects_malformed() {
    for bad in ["E6", "Sheet!", "Sheet!6", "Sheet!E", "Sheet!E0", "!E6", "Sheet!E6x"] {
        assert!(bad.parse::<RangeRef>().is_err(), "{} should not parse", bad);
    }
}

#[test]
fn test_column_map_from_header() {
    let header = vec![json!("Topic"), json!(""), json!(42), json!("Summary"), json!("Topic")];
    let map = ColumnMap::from_header(&header);

    assert_eq!(map.len(), 5);
    // rightmost duplicate wins
    assert_eq!(map.index_of("Topic"), Some(4));
    assert_eq!(map.index_of("Summary"), Some(3));
    assert_eq!(map.letter_of("Summary").as_deref(), Some("D"));
    assert_eq!(map.name_at(1), None);
    assert_eq!(map.name_at(2), None);
    assert_eq!(map.index_of("Missing"), None);
}

#[test]
fn test_row_snapshot_defaults_missing_cells() {
    let columns = Arc::new(ColumnMap::from_header(&[json!("Topic"), json!("Tone"), json!("Summary")]));
    let row = RowSnapshot::build(3, columns, &[json!("cats")]);

    assert_eq!(row.row_index(), 3);
    assert_eq!(row.get("Topic"), Some("cats"));
    assert_eq!(row.get("Tone"), Some(""));
    assert_eq!(row.get("Summary"), Some(""));
    assert_eq!(row.get("Nope"), None);
    assert_eq!(row.get(ROW_INDEX_FIELD), Some("3"));
    assert!(row.has_value("Topic"));
    assert!(!row.has_value("Summary"));
    assert_eq!(row.cell("Summary"), Some(CellRef::new(3, 2)));
}

#[test]
fn test_row_snapshot_tolerates_malformed_values() {
    let columns = Arc::new(ColumnMap::from_header(&[json!("A"), json!("B"), json!("C"), json!("D")]));
    let row = RowSnapshot::build(1, columns, &[json!(12.5), json!(true), json!({"x": 1}), json!(null)]);

    assert_eq!(row.get("A"), Some("12.5"));
    assert_eq!(row.get("B"), Some("true"));
    assert_eq!(row.get("C"), Some(""));
    assert_eq!(row.get("D"), Some(""));
}

#[test]
fn test_row_snapshot_fields_in_header_order() {
    let columns = Arc::new(ColumnMap::from_header(&[json!("B"), json!("A")]));
    let row = RowSnapshot::build(1, columns, &[json!("1"), json!("2")]);

    let fields: Vec<_> = row.fields().collect();
    assert_eq!(fields, vec![("B", "1"), ("A", "2")]);
}

#[test]
fn test_table_snapshot_from_table() {
    let table: Table = vec![
        vec![json!("Topic"), json!("Summary")],
        vec![json!("cats")],
        vec![],
        vec![json!("dogs"), json!("good")],
    ];
    let snapshot = TableSnapshot::from_table(&table);

    assert_eq!(snapshot.row_count(), 4);
    assert_eq!(snapshot.rows.len(), 3);
    assert_eq!(snapshot.rows[0].row_index(), 1);
    assert_eq!(snapshot.rows[2].get("Summary"), Some("good"));
    assert_eq!(snapshot.rows[1].get("Topic"), Some(""));
}

#[test]
fn test_table_snapshot_empty() {
    let snapshot = TableSnapshot::from_table(&Vec::new());
    assert!(snapshot.rows.is_empty());
    assert_eq!(snapshot.row_count(), 0);
}
