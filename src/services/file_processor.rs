use std::path::Path;

use bytes::Bytes;
use serde::Serialize;

use crate::services::excel::types::NormalizedSheet;
use crate::services::excel::{decode, normalize, DecodeError};

const SPREADSHEET_MIME_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "application/vnd.ms-excel.sheet.macroenabled.12",
    "application/vnd.ms-excel.sheet.binary.macroenabled.12",
    "application/vnd.oasis.opendocument.spreadsheet",
];

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Outcome of decoding and normalizing one upload, in the shape returned to
/// HTTP clients.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Processed {
        success: bool,
        data: Vec<NormalizedSheet>,
        #[serde(rename = "totalSheets")]
        total_sheets: usize,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl ProcessOutcome {
    pub fn processed(sheets: Vec<NormalizedSheet>) -> Self {
        ProcessOutcome::Processed {
            success: true,
            total_sheets: sheets.len(),
            data: sheets,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ProcessOutcome::Failed {
            success: false,
            error: error.into(),
        }
    }
}

impl From<Result<Vec<NormalizedSheet>, DecodeError>> for ProcessOutcome {
    fn from(result: Result<Vec<NormalizedSheet>, DecodeError>) -> Self {
        match result {
            Ok(sheets) => ProcessOutcome::processed(sheets),
            Err(e) => ProcessOutcome::failed(e.to_string()),
        }
    }
}

/// Decodes `file_data` and normalizes every sheet.
pub fn process_workbook(file_data: Bytes) -> Result<Vec<NormalizedSheet>, DecodeError> {
    let start = std::time::Instant::now();
    tracing::info!("Processing workbook, size: {}KB", file_data.len() / 1024);

    let workbook = decode(file_data)?;
    let sheets = normalize(workbook);

    tracing::info!(
        "Processed {} sheets ({} rows total) in {:?}",
        sheets.len(),
        sheets.iter().map(NormalizedSheet::row_count).sum::<usize>(),
        start.elapsed()
    );
    Ok(sheets)
}

/// Whether an upload looks like a spreadsheet, judged by its declared
/// content type, falling back to the file extension for generic types.
pub fn is_spreadsheet_upload(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase());

    match mime.as_deref() {
        Some(mime) if SPREADSHEET_MIME_TYPES.contains(&mime) => true,
        None | Some("application/octet-stream") => file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{xlsx_fixture, Fixture};
    use serde_json::json;

    #[test]
    fn test_processed_shape() {
        let bytes = xlsx_fixture(&[
            (
                "Sales",
                vec![
                    vec![Fixture::Text("region"), Fixture::Text("units")],
                    vec![Fixture::Text("north"), Fixture::Num(4.0)],
                ],
            ),
            ("Notes", vec![]),
        ]);

        let outcome = ProcessOutcome::from(process_workbook(Bytes::from(bytes)));
        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["totalSheets"], json!(2));
        assert_eq!(
            body["data"][0],
            json!({
                "sheetName": "Sales",
                "headers": ["region", "units"],
                "columnTypes": {"region": "string", "units": "number"},
                "data": [{"region": "north", "units": 4}],
                "rowCount": 1,
                "columnCount": 2
            })
        );
        assert_eq!(body["data"][1]["rowCount"], json!(0));
    }

    #[test]
    fn test_failed_shape() {
        let outcome = ProcessOutcome::from(process_workbook(Bytes::from_static(b"nope")));
        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().starts_with("Failed to open workbook"));
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_is_spreadsheet_upload() {
        assert!(is_spreadsheet_upload(
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            None
        ));
        assert!(is_spreadsheet_upload(Some("application/vnd.ms-excel"), Some("a.bin")));
        assert!(is_spreadsheet_upload(Some("application/octet-stream"), Some("report.XLSX")));
        assert!(is_spreadsheet_upload(None, Some("sheet.ods")));
        assert!(!is_spreadsheet_upload(Some("text/csv"), Some("data.csv")));
        assert!(!is_spreadsheet_upload(Some("application/octet-stream"), Some("notes.txt")));
        assert!(!is_spreadsheet_upload(None, None));
    }
}
