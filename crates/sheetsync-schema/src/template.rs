//! Template readers.
//!
//! A template is any tabular file whose first row names the columns the
//! table must have. Spreadsheets (`.xlsx`, `.xls`, `.ods`, ...) are read with
//! `calamine`, `.csv` files with the `csv` crate.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use calamine::{Data, Reader, open_workbook_auto};

use crate::error::{Result, SyncError};
use crate::schema::CanonicalSchema;

/// Source of the template header row.
///
/// Reads are blocking; the synchronizer runs them on the blocking pool.
pub trait TemplateSource: Send + Sync + 'static {
    /// Location of the template, used in errors and logs.
    fn path(&self) -> &Path;

    /// Returns the template's modification marker, or `None` if it cannot be
    /// read (for example because the file is missing).
    fn modified(&self) -> Option<SystemTime>;

    /// Returns the raw cells of the header row.
    fn read_headers(&self) -> Result<Vec<String>>;

    /// Reads the header row and derives the canonical schema from it.
    fn read_schema(&self) -> Result<CanonicalSchema> {
        let schema = CanonicalSchema::from_headers(self.read_headers()?);
        if schema.is_empty() {
            return Err(SyncError::unreadable(self.path(), "empty header row"));
        }
        Ok(schema)
    }
}

/// File formats understood by [`TemplateFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    /// Any workbook `calamine` can open.
    Spreadsheet,
    /// Comma-separated values.
    Csv,
}

impl TemplateFormat {
    /// Picks the format from the file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Spreadsheet,
        }
    }
}

/// A template file on disk.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    path: PathBuf,
    format: TemplateFormat,
}

impl TemplateFile {
    /// Creates a template reader, inferring the format from the extension.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = TemplateFormat::from_path(&path);
        Self { path, format }
    }

    /// Returns the detected format.
    #[must_use]
    pub fn format(&self) -> TemplateFormat {
        self.format
    }

    fn read_spreadsheet_headers(&self) -> Result<Vec<String>> {
        let mut workbook =
            open_workbook_auto(&self.path).map_err(|e| SyncError::unreadable(&self.path, e))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SyncError::unreadable(&self.path, "workbook has no sheets"))?
            .map_err(|e| SyncError::unreadable(&self.path, e))?;

        let header = range
            .rows()
            .next()
            .ok_or_else(|| SyncError::unreadable(&self.path, "first sheet is empty"))?;

        Ok(header.iter().map(cell_text).collect())
    }

    fn read_csv_headers(&self) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| SyncError::unreadable(&self.path, e))?;

        let record = reader
            .records()
            .next()
            .ok_or_else(|| SyncError::unreadable(&self.path, "file is empty"))?
            .map_err(|e| SyncError::unreadable(&self.path, e))?;

        Ok(record
            .iter()
            .map(|cell| cell.trim_start_matches('\u{feff}').to_string())
            .collect())
    }
}

impl TemplateSource for TemplateFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
    }

    fn read_headers(&self) -> Result<Vec<String>> {
        match self.format {
            TemplateFormat::Spreadsheet => self.read_spreadsheet_headers(),
            TemplateFormat::Csv => self.read_csv_headers(),
        }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn csv_template(contents: &str) -> (tempfile::TempDir, TemplateFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, TemplateFile::new(path))
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            TemplateFormat::from_path(Path::new("template.xlsx")),
            TemplateFormat::Spreadsheet
        );
        assert_eq!(
            TemplateFormat::from_path(Path::new("template.xls")),
            TemplateFormat::Spreadsheet
        );
        assert_eq!(
            TemplateFormat::from_path(Path::new("Template.CSV")),
            TemplateFormat::Csv
        );
    }

    #[test]
    fn test_csv_header_row() {
        let (_dir, template) = csv_template(
            "\u{feff}Customer_Number,customer_name,STATE,State\nC1,Acme,Delhi,Delhi\n",
        );

        let schema = template.read_schema().unwrap();
        assert_eq!(
            schema.columns(),
            ["CUSTOMER_NUMBER", "CUSTOMER_NAME", "STATE"]
        );
        assert!(template.modified().is_some());
    }

    /// Workbook with a `Template` sheet whose header is
    /// ` customer_number | Customer_Name | (blank) | STATE | state | 2024`,
    /// followed by a `Notes` sheet headed `ZONE`.
    fn workbook_fixture() -> TemplateFile {
        TemplateFile::new(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/template.xlsx"),
        )
    }

    #[test]
    fn test_spreadsheet_header_row() {
        let template = workbook_fixture();
        assert_eq!(template.format(), TemplateFormat::Spreadsheet);

        let headers = template.read_headers().unwrap();
        assert_eq!(headers.len(), 6);
        assert_eq!(headers[0].trim(), "customer_number");
        assert_eq!(headers[2], "");
        assert_eq!(headers[5], "2024");
    }

    #[test]
    fn test_spreadsheet_schema_uses_first_sheet() {
        let schema = workbook_fixture().read_schema().unwrap();

        assert_eq!(
            schema.columns(),
            ["CUSTOMER_NUMBER", "CUSTOMER_NAME", "STATE", "2024"]
        );
        assert!(!schema.contains("ZONE"));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("STATE".into())), "STATE");
        assert_eq!(cell_text(&Data::Float(2024.0)), "2024");
        assert_eq!(cell_text(&Data::Int(7)), "7");
    }

    #[test]
    fn test_csv_blank_header_is_unreadable() {
        let (_dir, template) = csv_template(" , ,\nC1,Acme,Delhi\n");

        let err = template.read_schema().unwrap_err();
        assert!(matches!(err, SyncError::TemplateUnreadable { .. }));
        assert!(err.to_string().contains("empty header row"));
    }

    #[test]
    fn test_empty_csv_is_unreadable() {
        let (_dir, template) = csv_template("");
        assert!(matches!(
            template.read_schema(),
            Err(SyncError::TemplateUnreadable { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let template = TemplateFile::new(dir.path().join("template.xlsx"));

        assert!(template.modified().is_none());
        assert!(matches!(
            template.read_schema(),
            Err(SyncError::TemplateUnreadable { .. })
        ));
    }

    #[test]
    fn test_garbage_spreadsheet_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.xlsx");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();

        let template = TemplateFile::new(path);
        assert!(matches!(
            template.read_schema(),
            Err(SyncError::TemplateUnreadable { .. })
        ));
    }
}
