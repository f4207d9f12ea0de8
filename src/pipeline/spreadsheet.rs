//! Spreadsheet template read/fill/write.
//!
//! The template is the first sheet of whatever workbook the operator
//! uploads (xlsx, xls, ods; anything calamine reads). Row 0 is the header.
//! Filled output is that same grid with one appended row per consolidated
//! record, written as a single-sheet xlsx under the template's sheet name.

use crate::error::DocFillError;
use crate::pipeline::columns;
use crate::pipeline::consolidate::ConsolidatedRecord;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use std::fmt;
use std::io::Cursor;
use tracing::debug;

/// File name of the filled workbook.
pub const SPREADSHEET_FILE_NAME: &str = "Dokumen_Terisi.xlsx";

/// One cell of the template grid.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel date/time serial, day 0 = 1899-12-30.
    DateTime(f64),
    /// Elapsed time in days.
    Duration(f64),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(d) if d.is_duration() => Cell::Duration(d.as_f64()),
            Data::DateTime(d) => Cell::DateTime(d.as_f64()),
            // ISO strings (ods) and error cells are carried over as their text.
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) | Cell::DateTime(n) | Cell::Duration(n)
                if n.fract() == 0.0 && n.abs() < 1e15 =>
            {
                write!(f, "{}", *n as i64)
            }
            Cell::Number(n) | Cell::DateTime(n) | Cell::Duration(n) => write!(f, "{n}"),
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

/// The uploaded template: first sheet, every row kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub sheet_name: String,
    /// Full grid, header included, anchored at A1.
    pub rows: Vec<Vec<Cell>>,
    /// Row 0 as text.
    pub header: Vec<String>,
}

/// Read the first sheet of a workbook.
pub fn read_template(bytes: &[u8]) -> Result<Template, DocFillError> {
    let fail = |detail: String| DocFillError::TemplateReadFailed { detail };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| fail(format!("not a readable workbook: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| fail("workbook has no sheets".into()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| fail(format!("sheet '{sheet_name}': {e}")))?;

    // calamine ranges start at the first used cell; re-anchor at A1 so
    // column indices match what the operator sees.
    let (row_offset, col_offset) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Err(fail(format!("sheet '{sheet_name}' is empty"))),
    };

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(Cell::from_data));
        while cells.last().is_some_and(Cell::is_empty) {
            cells.pop();
        }
        rows.push(cells);
    }

    let header: Vec<String> = rows
        .first()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(fail(format!("sheet '{sheet_name}' has no header row")));
    }

    debug!(
        "Template '{}': {} rows, {} header columns",
        sheet_name,
        rows.len(),
        header.len()
    );

    Ok(Template {
        sheet_name,
        rows,
        header,
    })
}

/// Template rows followed by one mapped row per consolidated record.
pub fn filled_rows(template: &Template, records: &[ConsolidatedRecord]) -> Vec<Vec<Cell>> {
    let roles = columns::plan_columns(&template.header);

    let mut rows = template.rows.clone();
    if rows.is_empty() {
        rows.push(template.header.iter().cloned().map(Cell::from).collect());
    }
    rows.extend(records.iter().map(|c| {
        columns::fill_row(&roles, &c.record, c.annotation)
            .into_iter()
            .map(Cell::from)
            .collect::<Vec<_>>()
    }));
    rows
}

/// Serialise `rows` as a single-sheet xlsx.
pub fn write_workbook(sheet_name: &str, rows: &[Vec<Cell>]) -> Result<Vec<u8>, DocFillError> {
    let err = |e: rust_xlsxwriter::XlsxError| DocFillError::SpreadsheetWriteFailed(e.to_string());

    let date = Format::new().set_num_format("yyyy-mm-dd");
    let date_time = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let time = Format::new().set_num_format("hh:mm:ss");
    let duration = Format::new().set_num_format("[h]:mm:ss");

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(err)?;

    for (r, row) in rows.iter().enumerate() {
        let r = u32::try_from(r)
            .map_err(|_| DocFillError::SpreadsheetWriteFailed("too many rows".into()))?;
        for (c, cell) in row.iter().enumerate() {
            let c = u16::try_from(c)
                .map_err(|_| DocFillError::SpreadsheetWriteFailed("too many columns".into()))?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s).map_err(err)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n).map_err(err)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b).map_err(err)?;
                }
                Cell::DateTime(serial) => {
                    let format = if serial.fract() == 0.0 {
                        &date
                    } else if *serial < 1.0 {
                        &time
                    } else {
                        &date_time
                    };
                    worksheet
                        .write_number_with_format(r, c, *serial, format)
                        .map_err(err)?;
                }
                Cell::Duration(days) => {
                    worksheet
                        .write_number_with_format(r, c, *days, &duration)
                        .map_err(err)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::consolidate::Annotation;
    use crate::record::ExtractedRecord;

    fn sample_template() -> Vec<u8> {
        let rows = vec![
            vec![
                Cell::Text("Nama".into()),
                Cell::Text("NIK".into()),
                Cell::Text("Keterangan".into()),
                Cell::Text("No".into()),
            ],
            vec![
                Cell::Text("Lama".into()),
                Cell::Text("3201".into()),
                Cell::Empty,
                Cell::Number(1.0),
            ],
        ];
        write_workbook("Data Pelanggan", &rows).unwrap()
    }

    #[test]
    fn reads_header_and_rows() {
        let t = read_template(&sample_template()).unwrap();
        assert_eq!(t.sheet_name, "Data Pelanggan");
        assert_eq!(t.header, ["Nama", "NIK", "Keterangan", "No"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1][3], Cell::Number(1.0));
    }

    #[test]
    fn garbage_is_a_read_failure() {
        let err = read_template(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, DocFillError::TemplateReadFailed { .. }));
    }

    #[test]
    fn empty_sheet_is_a_read_failure() {
        let bytes = write_workbook("Kosong", &[]).unwrap();
        let err = read_template(&bytes).unwrap_err();
        assert!(matches!(err, DocFillError::TemplateReadFailed { .. }));
    }

    #[test]
    fn leading_blank_row_means_no_header() {
        let rows = vec![vec![], vec![Cell::Text("Nama".into())]];
        let err = read_template(&write_workbook("S", &rows).unwrap()).unwrap_err();
        assert!(err.to_string().contains("no header row"));
    }

    #[test]
    fn leading_blank_column_keeps_positions() {
        let rows = vec![vec![Cell::Empty, Cell::Text("Nama".into())]];
        let t = read_template(&write_workbook("S", &rows).unwrap()).unwrap();
        assert_eq!(t.header, ["", "Nama"]);
    }

    #[test]
    fn fills_and_round_trips() {
        let t = read_template(&sample_template()).unwrap();
        let record = ExtractedRecord {
            name: "Ani".into(),
            ..Default::default()
        };
        let rows = filled_rows(
            &t,
            &[ConsolidatedRecord {
                record,
                annotation: Annotation::MissingBoth,
            }],
        );
        assert_eq!(rows.len(), 3);

        let bytes = write_workbook(&t.sheet_name, &rows).unwrap();
        let back = read_template(&bytes).unwrap();
        assert_eq!(back.sheet_name, "Data Pelanggan");
        assert_eq!(back.rows.len(), 3);
        assert_eq!(back.rows[1][0], Cell::Text("Lama".into()));
        assert_eq!(back.rows[2][0], Cell::Text("Ani".into()));
        assert_eq!(back.rows[2][1], Cell::Text("Tidak Ditemukan".into()));
        assert_eq!(back.rows[2][2], Cell::Text("NO KTP & RL".into()));
    }

    #[test]
    fn template_dates_stay_dates() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Nama").unwrap();
        sheet.write_string(0, 1, "Tanggal Daftar").unwrap();
        sheet.write_string(1, 0, "Lama").unwrap();
        // 2024-01-15
        sheet
            .write_number_with_format(1, 1, 45306.0, &Format::new().set_num_format("dd/mm/yyyy"))
            .unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let t = read_template(&bytes).unwrap();
        assert_eq!(t.rows[1][1], Cell::DateTime(45306.0));

        let out = write_workbook(&t.sheet_name, &filled_rows(&t, &[])).unwrap();
        let mut wb = open_workbook_auto_from_rs(Cursor::new(out)).unwrap();
        let range = wb.worksheet_range("Sheet1").unwrap();
        match range.get((1, 1)) {
            Some(Data::DateTime(d)) => {
                assert!(!d.is_duration());
                assert_eq!(d.as_f64(), 45306.0);
            }
            other => panic!("expected a date cell, got {other:?}"),
        }
    }

    #[test]
    fn number_display() {
        assert_eq!(Cell::Number(18.0).to_string(), "18");
        assert_eq!(Cell::Number(1.5).to_string(), "1.5");
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::DateTime(45306.0).to_string(), "45306");
    }
}
