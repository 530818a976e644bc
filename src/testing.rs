//! Test-only xlsx writer producing the minimal SpreadsheetML package the reader understands.

use crate::spreadsheet::cell::parse_number;
use crate::spreadsheet::reference::index_to_reference;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builds an xlsx file sheet by sheet. Numeric-looking strings become number cells,
/// other non-empty strings become shared strings, empty strings leave the cell empty.
#[derive(Default)]
pub(crate) struct XlsxBuilder {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl XlsxBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|value| value.to_string()).collect())
            .collect();
        self.sheets.push((name.to_owned(), rows));
        self
    }

    pub(crate) fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        let mut shared_strings = Vec::<String>::new();

        let put = |zip: &mut ZipWriter<std::fs::File>, name: &str, content: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        put(&mut zip, "[Content_Types].xml", CONTENT_TYPES);
        put(&mut zip, "_rels/.rels", ROOT_RELS);

        let mut workbook_sheets = String::new();
        let mut relationships = String::new();
        for (index, (name, rows)) in self.sheets.iter().enumerate() {
            let number = index + 1;
            workbook_sheets.push_str(&format!(
                r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#,
                escape(name)
            ));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
            ));

            let mut sheet_data = String::new();
            for (row, values) in rows.iter().enumerate() {
                sheet_data.push_str(&format!(r#"<row r="{}">"#, row + 1));
                for (col, value) in values.iter().enumerate() {
                    if value.is_empty() {
                        continue;
                    }
                    let reference = index_to_reference(row, col);
                    if parse_number(value).is_some() && !value.starts_with("0x") {
                        sheet_data.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
                    } else {
                        let id = shared_strings.len();
                        shared_strings.push(value.to_owned());
                        sheet_data.push_str(&format!(r#"<c r="{reference}" t="s"><v>{id}</v></c>"#));
                    }
                }
                sheet_data.push_str("</row>");
            }
            put(
                &mut zip,
                &format!("xl/worksheets/sheet{number}.xml"),
                &format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
                ),
            );
        }

        put(
            &mut zip,
            "xl/workbook.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{workbook_sheets}</sheets></workbook>"#
            ),
        );
        put(
            &mut zip,
            "xl/_rels/workbook.xml.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
            ),
        );
        let items: String = shared_strings
            .iter()
            .map(|value| format!("<si><t>{}</t></si>", escape(value)))
            .collect();
        put(
            &mut zip,
            "xl/sharedStrings.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{items}</sst>"#,
                shared_strings.len()
            ),
        );
        zip.finish().unwrap();
        path
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
