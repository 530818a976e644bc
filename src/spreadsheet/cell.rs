use std::fmt::Display;

/// Raw value of a non-empty cell, as stored in the workbook.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// Shared, inline, formula, error and ISO date strings
    Text(String),
    /// Numeric values (dates stay serial numbers)
    Number(f64),
    /// Boolean values
    Bool(bool),
}

impl CellValue {
    /// True for whitespace-only text. Numbers and booleans are never blank.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric interpretation of the value, `None` when it is not a finite number.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(number) => Some(*number).filter(|number| number.is_finite()),
            CellValue::Text(text) => parse_number(text),
            CellValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
        }
    }

    /// Trimmed textual form, used wherever a cell acts as a label.
    pub fn label(&self) -> String {
        self.to_string().trim().to_owned()
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(text) => f.write_str(text),
            CellValue::Number(number) => f.write_str(&format_number(*number)),
            CellValue::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Represents a single non-empty cell with its zero-based position.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub value: CellValue,
}

/// Formats a number the way spreadsheet users read it: integral values have no fraction.
pub fn format_number(number: f64) -> String {
    if number == 0.0 {
        // avoids "-0"
        "0".to_owned()
    } else {
        number.to_string()
    }
}

/// Parses numeric text. Surrounding whitespace is ignored, empty text is not a number,
/// and `0x`/`0o`/`0b` prefixed integers are accepted.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let radix = match text.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&text[2..], radix).ok().map(|value| value as f64);
    }
    text.parse::<f64>().ok().filter(|number| number.is_finite())
}
