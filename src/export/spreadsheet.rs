//! Spreadsheet export.
//!
//! One row per record, anomalies included. Column order and headers are a
//! contract with downstream spreadsheet users; do not reorder.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;

use crate::types::NormalizedRecord;

/// Record field behind a spreadsheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Longitude,
    Latitude,
    City,
    Remain,
    CoordStatus,
    TypeName,
    Id,
    ControlId,
    RawX,
    RawY,
    Area,
    MaxBury,
    ApplyDate,
}

/// Columns in output order with their localized headers.
pub const COLUMNS: [(Column, &str); 14] = [
    (Column::Name, "名稱"),
    (Column::Longitude, "經度"),
    (Column::Latitude, "緯度"),
    (Column::City, "縣市"),
    (Column::Remain, "B1~B7剩餘填埋量"),
    (Column::CoordStatus, "轉換狀態"),
    (Column::TypeName, "類型"),
    (Column::Id, "ID"),
    (Column::ControlId, "流向編號"),
    (Column::RawX, "原始X"),
    (Column::RawY, "原始Y"),
    (Column::Area, "面積"),
    (Column::MaxBury, "B1~B7核准填埋量"),
    (Column::ApplyDate, "申報日期"),
];

/// Header row, in order.
pub fn headers() -> Vec<&'static str> {
    COLUMNS.iter().map(|(_, header)| *header).collect()
}

enum Cell<'a> {
    Json(Option<&'a Value>),
    Number(f64),
    Text(&'a str),
}

fn cell(record: &NormalizedRecord, column: Column) -> Cell<'_> {
    let raw = &record.raw;
    match column {
        Column::Name => Cell::Json(raw.dumpname.as_ref()),
        Column::Longitude => Cell::Number(record.longitude),
        Column::Latitude => Cell::Number(record.latitude),
        Column::City => Cell::Json(raw.city.as_ref()),
        Column::Remain => Cell::Json(raw.remain.as_ref()),
        Column::CoordStatus => Cell::Text(record.coord_status.label()),
        Column::TypeName => Cell::Json(raw.typename.as_ref()),
        Column::Id => Cell::Json(raw.id.as_ref()),
        Column::ControlId => Cell::Json(raw.control_id.as_ref()),
        Column::RawX => Cell::Json(raw.x.as_ref()),
        Column::RawY => Cell::Json(raw.y.as_ref()),
        Column::Area => Cell::Json(raw.area.as_ref()),
        Column::MaxBury => Cell::Json(raw.maxbury.as_ref()),
        Column::ApplyDate => Cell::Json(raw.applydate.as_ref()),
    }
}

/// Write a JSON scalar keeping its type: numbers stay numeric, text stays text.
fn write_value(sheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                sheet.write_number(row, col, f)?;
            }
            None => {
                sheet.write_string(row, col, n.to_string())?;
            }
        },
        Value::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        other => {
            sheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

/// Render the workbook to an in-memory `.xlsx` buffer.
pub fn render_spreadsheet(records: &[NormalizedRecord], sheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    let header_format = Format::new().set_bold();
    for (col, (_, header)) in (0u16..).zip(COLUMNS.iter()) {
        sheet.write_string_with_format(0, col, *header, &header_format)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (row, record) in (1u32..).zip(records) {
        for (col, (column, _)) in (0u16..).zip(COLUMNS.iter()) {
            match cell(record, *column) {
                Cell::Json(Some(value)) => write_value(sheet, row, col, value)?,
                Cell::Json(None) => {}
                Cell::Number(f) => {
                    sheet.write_number(row, col, f)?;
                }
                Cell::Text(text) => {
                    sheet.write_string(row, col, text)?;
                }
            }
        }
    }

    sheet.autofit();
    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_contract() {
        assert_eq!(
            headers(),
            vec![
                "名稱",
                "經度",
                "緯度",
                "縣市",
                "B1~B7剩餘填埋量",
                "轉換狀態",
                "類型",
                "ID",
                "流向編號",
                "原始X",
                "原始Y",
                "面積",
                "B1~B7核准填埋量",
                "申報日期",
            ]
        );
    }

    #[test]
    fn test_renders_empty_workbook() {
        let bytes = render_spreadsheet(&[], "土資場清單").unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_rejects_invalid_sheet_name() {
        assert!(render_spreadsheet(&[], "bad/name").is_err());
    }
}
