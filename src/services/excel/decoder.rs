use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use thiserror::Error;

use super::types::{CellValue, Sheet, Workbook};
use super::utils::cell_value;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open workbook: {0}")]
    Open(#[source] calamine::Error),
    #[error("Failed to read sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },
}

/// Parses raw spreadsheet bytes (xlsx, xlsm, xlsb, xls or ods) into a
/// workbook whose sheets follow the file's internal order.
pub fn decode(file_data: Bytes) -> Result<Workbook, DecodeError> {
    let start = std::time::Instant::now();
    tracing::debug!("Decoding workbook of {} bytes", file_data.len());

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file_data)).map_err(|e| {
        tracing::warn!("Failed to open workbook: {}", e);
        DecodeError::Open(e)
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in sheet_names {
        let range = workbook.worksheet_range(&name).map_err(|source| {
            tracing::warn!("Failed to read sheet {}: {}", name, source);
            DecodeError::Sheet {
                sheet: name.clone(),
                source,
            }
        })?;
        sheets.push(Sheet {
            cells: grid(&range),
            name,
        });
    }

    tracing::debug!("Decoded {} sheets in {:?}", sheets.len(), start.elapsed());
    Ok(Workbook { sheets })
}

fn grid(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect()
}
