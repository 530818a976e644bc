use crate::error::RustyCfgError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::parse_number;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing the xlsx format
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_SHARED_STRING_ITEM: QName = QName(b"si"); // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh"); // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t"); // Text content within strings
const TAG_SHEET: QName = QName(b"sheet"); // Worksheet definition
const TAG_ROW: QName = QName(b"row"); // Row in worksheet
const TAG_CELL: QName = QName(b"c"); // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is"); // Inline string value
const TAG_VALUE: QName = QName(b"v"); // Cell value content

/// Type alias for buffered file reader
pub(crate) type FileReader = BufReader<File>;

/// How the `<v>`/`<is>` content of a cell is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
enum CellType {
    #[default]
    Empty,
    Number,
    Boolean,
    SharedString,
    InlineString,
    /// Formula results, error codes and ISO dates are kept as their text
    Text,
}

/// An opened xlsx workbook. Sheets are parsed on demand.
pub struct Workbook {
    /// Path of the workbook file
    pub path: PathBuf,
    zip: ZipArchive<FileReader>,
    shared_strings: Vec<String>,
    /// Worksheets as (name, zip_path) pairs, in workbook order
    sheets: Vec<(String, String)>,
}

impl Workbook {
    /// Opens an xlsx file and parses its structure and shared strings.
    pub fn open(path: &Path) -> Result<Workbook, RustyCfgError> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        let sheets = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(path.display().to_string()))?
        }
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(Workbook {
            path: path.to_path_buf(),
            zip,
            shared_strings,
            sheets,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Parses the named worksheet, `None` when the workbook has no such sheet.
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<Option<Sheet>, RustyCfgError> {
        let zip_path = match self.sheets.iter().find(|(name, _)| name == sheet_name) {
            Some((_, zip_path)) => zip_path.to_owned(),
            None => return Ok(None),
        };

        let mut sheet = Sheet::new(sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                row_count = event.get_attribute_value("r")?
                    .and_then(|r| row_to_index(&r))
                    .unwrap_or(row_count);
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value.clear();
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "s" => CellType::SharedString,
                        "inlineStr" => CellType::InlineString,
                        "b" => CellType::Boolean,
                        "str" | "e" | "d" => CellType::Text,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
            }
            Event::Start(event) if kind == CellType::InlineString && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if kind != CellType::Empty && !value.is_empty() {
                    let cell_value = to_cell_value(kind, &value, &self.shared_strings)?;
                    sheet.push(Cell { row, col, value: cell_value });
                }
                kind = CellType::Empty;
            }
        });
        Ok(Some(sheet))
    }
}

/// Converts the raw text of a cell to its value.
fn to_cell_value(kind: CellType, value: &str, shared_strings: &[String]) -> Result<CellValue, RustyCfgError> {
    Ok(match kind {
        CellType::SharedString => {
            let index = value.trim().parse::<usize>()?;
            let text = shared_strings
                .get(index)
                .ok_or_else(|| SpreadsheetError::SharedStringError(index))?;
            CellValue::Text(text.to_owned())
        }
        CellType::Boolean => CellValue::Bool(value == "1" || value.eq_ignore_ascii_case("true")),
        CellType::Number => match parse_number(value) {
            Some(number) => CellValue::Number(number),
            None => CellValue::Text(value.to_owned()),
        },
        CellType::InlineString | CellType::Text | CellType::Empty => CellValue::Text(value.to_owned()),
    })
}

/// Loads worksheet relationships, mapping relationship ids to worksheet paths.
fn load_relationships(zip: &mut ZipArchive<FileReader>, path: &str) -> Result<HashMap<String, String>, RustyCfgError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only process worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Loads worksheet names and their zip paths from `xl/workbook.xml`.
fn load_workbook(zip: &mut ZipArchive<FileReader>) -> Result<Vec<(String, String)>, RustyCfgError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id.to_string()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// Loads the shared string table; workbooks without one have no shared strings.
fn load_shared_strings(zip: &mut ZipArchive<FileReader>) -> Result<Vec<String>, RustyCfgError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Normalizes a relationship target to its location within the archive
fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix("/xl/") {
        format!("xl/{stripped}")
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Reads string content up to `end_tag`, skipping phonetic annotations.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, FileReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, RustyCfgError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::XlsxBuilder;

    #[test]
    fn read_sheet_names_and_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = XlsxBuilder::new()
            .sheet("Item", &[&["id", "name", "price"], &["sword", "Iron Sword", "100"]])
            .sheet("#notes", &[&["ignored"]])
            .write(dir.path(), "Items.xlsx");

        let mut workbook = Workbook::open(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Item".to_owned(), "#notes".to_owned()]);

        let sheet = workbook.read_sheet("Item").unwrap().unwrap();
        assert_eq!(sheet.get(0, 0), Some(&CellValue::from("id")));
        assert_eq!(sheet.get(1, 1), Some(&CellValue::from("Iron Sword")));
        assert_eq!(sheet.get(1, 2), Some(&CellValue::Number(100.0)));
        assert_eq!(sheet.row_upper_bound, Some(1));
        assert_eq!(sheet.col_upper_bound, Some(2));

        assert!(workbook.read_sheet("Missing").unwrap().is_none());
    }

    #[test]
    fn read_sparse_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = XlsxBuilder::new()
            .sheet("Const", &[&["speed", "5"], &[], &["", "orphan"], &["name", "hero & co"]])
            .write(dir.path(), "Const.xlsx");

        let mut workbook = Workbook::open(&path).unwrap();
        let sheet = workbook.read_sheet("Const").unwrap().unwrap();
        assert_eq!(sheet.rows().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(sheet.get(2, 0), None);
        assert_eq!(sheet.get(3, 1), Some(&CellValue::from("hero & co")));
    }

    #[test]
    fn open_rejects_non_zip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        assert!(Workbook::open(&path).is_err());
    }

    #[test]
    fn zip_path_normalization() {
        assert_eq!(to_zip_path(Cow::from("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::from("/xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::from("xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
    }
}
