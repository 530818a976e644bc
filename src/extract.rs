//! Lenient table data extraction.
//!
//! Extraction never fails on data: unparseable numbers become `null`, and `null` in a
//! non-nullable field becomes the type default (`0` or `""`). Strict checks belong to
//! the validator, which reports what this module silently repairs.

use crate::annotation::{Annotation, FieldAnnotation, FieldType, TableType};
use crate::fields::{field_label, header_map, HEADER_ROW, LABEL_COLUMN, VALUE_COLUMN};
use crate::spreadsheet::{CellValue, Sheet};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// One exported record, keys in annotation field order.
pub type Record = Map<String, Value>;

/// Extracted data of one table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableData {
    List(Vec<Record>),
    Constant(Record),
}

impl From<TableData> for Value {
    fn from(data: TableData) -> Self {
        match data {
            TableData::List(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            TableData::Constant(record) => Value::Object(record),
        }
    }
}

/// Largest integer a JSON consumer can hold without loss.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// JSON number for `number`; integral values are written without a fraction.
pub fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Applies the field's type and null policy to a cell.
pub fn coerce(value: Option<&CellValue>, field: &FieldAnnotation) -> Value {
    let coerced = match field.field_type {
        FieldType::Number => value
            .and_then(CellValue::to_number)
            .map(number_value)
            .unwrap_or(Value::Null),
        _ => value
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null),
    };
    if coerced.is_null() && !field.nullable {
        match field.field_type {
            FieldType::Number => Value::from(0),
            _ => Value::String(String::new()),
        }
    } else {
        coerced
    }
}

/// One record per non-blank data row, keyed by field alias. Fields whose header is
/// missing from the sheet are skipped.
pub fn extract_list_table(sheet: &Sheet, fields: &[FieldAnnotation]) -> Vec<Record> {
    let data_rows: Vec<usize> = sheet.rows().filter(|row| *row > HEADER_ROW).collect();
    if sheet.rows().next() != Some(HEADER_ROW) || data_rows.is_empty() {
        return Vec::new();
    }

    let headers = header_map(sheet);
    let columns: Vec<(&FieldAnnotation, usize)> = fields
        .iter()
        .filter_map(|field| headers.get(&field.name).map(|col| (field, *col)))
        .collect();

    data_rows
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .map(|(field, col)| (field.key().to_owned(), coerce(sheet.get(row, *col), field)))
                .collect()
        })
        .collect()
}

/// One flat record built from label/value rows. Comment rows, empty labels and labels
/// without an annotation are skipped.
pub fn extract_constant_table(sheet: &Sheet, fields: &[FieldAnnotation]) -> Record {
    let by_name: HashMap<&str, &FieldAnnotation> = fields
        .iter()
        .map(|field| (field.name.as_str(), field))
        .collect();

    let mut record = Record::new();
    for row in sheet.rows() {
        let Some(label) = sheet.get(row, LABEL_COLUMN).and_then(field_label) else {
            continue;
        };
        let Some(field) = by_name.get(label.as_str()) else {
            continue;
        };
        record.insert(
            field.key().to_owned(),
            coerce(sheet.get(row, VALUE_COLUMN), field),
        );
    }
    record
}

/// Extracts a sheet according to its annotation's table type; `None` for unclassified types.
pub fn extract_table(sheet: &Sheet, annotation: &Annotation) -> Option<TableData> {
    match annotation.table_type {
        TableType::List => Some(TableData::List(extract_list_table(sheet, &annotation.fields))),
        TableType::Constant => Some(TableData::Constant(extract_constant_table(
            sheet,
            &annotation.fields,
        ))),
        TableType::Unset | TableType::Other(_) => None,
    }
}
