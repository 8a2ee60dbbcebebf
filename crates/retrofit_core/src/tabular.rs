//! CSV and spreadsheet input/output

use crate::errors::{Result, RetrofitError};
use crate::features::{CellValue, InputRow};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Cell contents read as missing values (the usual dataframe defaults)
const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Supported tabular file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
}

impl FileKind {
    /// Format implied by a file name's extension (case-insensitive)
    pub fn from_file_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(FileKind::Csv),
            Some("xlsx") => Ok(FileKind::Xlsx),
            Some("xls") => Ok(FileKind::Xls),
            _ => Err(RetrofitError::UnsupportedFileType(name.to_string())),
        }
    }
}

/// Rows with a shared, ordered header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<InputRow>,
}

impl Table {
    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Read a CSV or spreadsheet from disk
    pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Table> {
        let path = path.as_ref();
        let name = path.to_string_lossy();
        match FileKind::from_file_name(&name)? {
            FileKind::Csv => Self::read_csv(File::open(path)?),
            FileKind::Xlsx | FileKind::Xls => Self::read_spreadsheet(std::fs::read(path)?),
        }
    }

    /// Read uploaded bytes, dispatching on `file_name`'s extension
    pub fn read_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Table> {
        match FileKind::from_file_name(file_name)? {
            FileKind::Csv => Self::read_csv(Cursor::new(bytes)),
            FileKind::Xlsx | FileKind::Xls => Self::read_spreadsheet(bytes),
        }
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Table> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: InputRow = headers
                .iter()
                .cloned()
                .zip(record.iter().map(text_cell))
                .collect();
            rows.push(row);
        }

        Ok(Table { headers, rows })
    }

    /// Read the first worksheet of an `.xlsx`/`.xls` workbook
    pub fn read_spreadsheet(bytes: Vec<u8>) -> Result<Table> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
            RetrofitError::Spreadsheet(format!(
                "Could not read Excel file. Please ensure it's a valid Excel format: {e}"
            ))
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| RetrofitError::Spreadsheet("workbook has no worksheets".to_string()))?
            .map_err(|e| RetrofitError::Spreadsheet(e.to_string()))?;

        let mut sheet_rows = range.rows();
        let headers: Vec<String> = match sheet_rows.next() {
            Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
            None => return Ok(Table::default()),
        };

        let rows: Vec<InputRow> = sheet_rows
            .map(|cells| {
                headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().map(sheet_cell).chain(std::iter::repeat(CellValue::Null)))
                    .collect()
            })
            .collect();

        Ok(Table { headers, rows })
    }

    /// Write `headers` then one record per row; absent cells are left empty
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(
                self.headers
                    .iter()
                    .map(|header| row.get(header).map(ToString::to_string).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Reject tables outside the accepted upload shape
pub fn validate_upload(table: &Table, min_columns: usize, max_rows: usize) -> Result<()> {
    if table.n_columns() < min_columns {
        return Err(RetrofitError::TooFewColumns {
            found: table.n_columns(),
            required: min_columns,
        });
    }
    if table.is_empty() {
        return Err(RetrofitError::EmptyInput);
    }
    if table.len() > max_rows {
        return Err(RetrofitError::TooManyRows {
            rows: table.len(),
            limit: max_rows,
        });
    }
    Ok(())
}

fn text_cell(raw: &str) -> CellValue {
    if NULL_TOKENS.contains(&raw.trim()) {
        CellValue::Null
    } else {
        CellValue::Text(raw.to_string())
    }
}

fn sheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => text_cell(s),
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_from_extension() {
        assert_eq!(FileKind::from_file_name("data.CSV").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_file_name("b.xlsx").unwrap(), FileKind::Xlsx);
        assert_eq!(FileKind::from_file_name("b.xls").unwrap(), FileKind::Xls);
        assert!(matches!(
            FileKind::from_file_name("notes.txt"),
            Err(RetrofitError::UnsupportedFileType(_))
        ));
        assert!(FileKind::from_file_name("no_extension").is_err());
    }

    #[test]
    fn csv_reads_nulls_and_text() {
        let data = "a,b,c\n1,,x\nNA,2.5,\n";
        let table = Table::read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0]["a"], CellValue::from("1"));
        assert_eq!(table.rows[0]["b"], CellValue::Null);
        assert_eq!(table.rows[1]["a"], CellValue::Null);
        assert_eq!(table.rows[1]["b"], CellValue::from("2.5"));
    }

    #[test]
    fn dataframe_null_markers_read_as_missing() {
        let data = "x\nn/a\n#N/A\n<NA>\n-nan\n1.#QNAN\n#N/A N/A\n n/a \nn.a.\n";
        let table = Table::read_csv(data.as_bytes()).unwrap();
        let cells: Vec<&CellValue> = table.rows.iter().map(|row| &row["x"]).collect();
        assert!(cells[..7].iter().all(|cell| **cell == CellValue::Null));
        assert_eq!(*cells[7], CellValue::from("n.a."));
    }

    #[test]
    fn csv_with_ragged_rows_fails() {
        let data = "a,b\n1\n";
        assert!(matches!(Table::read_csv(data.as_bytes()), Err(RetrofitError::Csv(_))));
    }

    #[test]
    fn write_keeps_header_order() {
        let table = Table::read_csv("z,a\n1,2\n3,\n".as_bytes()).unwrap();
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "z,a\n1,2\n3,\n");
    }

    #[test]
    fn head_truncates() {
        let table = Table::read_csv("a\n1\n2\n3\n4\n".as_bytes()).unwrap();
        assert_eq!(table.head(3).len(), 3);
        assert_eq!(table.head(10).len(), 4);
    }

    #[test]
    fn upload_shape_limits() {
        let table = Table::read_csv("a,b,c\n1,2,3\n4,5,6\n".as_bytes()).unwrap();
        assert!(validate_upload(&table, 3, 2).is_ok());
        assert!(matches!(
            validate_upload(&table, 4, 2),
            Err(RetrofitError::TooFewColumns { found: 3, required: 4 })
        ));
        assert!(matches!(
            validate_upload(&table, 3, 1),
            Err(RetrofitError::TooManyRows { rows: 2, limit: 1 })
        ));
        assert!(matches!(
            validate_upload(&table.head(0), 3, 2),
            Err(RetrofitError::EmptyInput)
        ));
    }

    #[test]
    fn garbage_spreadsheet_is_rejected() {
        assert!(matches!(
            Table::read_bytes("upload.xlsx", b"not a workbook".to_vec()),
            Err(RetrofitError::Spreadsheet(_))
        ));
    }
}
