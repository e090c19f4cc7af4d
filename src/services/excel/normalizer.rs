use std::collections::HashSet;

use indexmap::IndexMap;

use super::types::{CellValue, ColumnType, NormalizedSheet, Record, RecordExt, Sheet, Workbook};
use super::utils::{header_text, unique_header};

/// Normalizes every sheet of `workbook`, in decode order.
pub fn normalize(workbook: Workbook) -> Vec<NormalizedSheet> {
    workbook.sheets.into_iter().map(normalize_sheet).collect()
}

pub fn normalize_sheet(sheet: Sheet) -> NormalizedSheet {
    let rows = sheet_to_records(&sheet.cells);

    // Headers come from the first record's keys, not from the header row.
    let headers: Vec<String> = rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    let column_types = infer_column_types(&rows, &headers);

    tracing::debug!(
        "Normalized sheet {}: {} rows, {} columns",
        sheet.name,
        rows.len(),
        headers.len()
    );
    NormalizedSheet::new(sheet.name, headers, column_types, rows)
}

/// Turns a cell grid into records keyed by the header row. Blank cells are
/// left out of a record and rows with no cells at all are dropped.
pub fn sheet_to_records(cells: &[Vec<CellValue>]) -> Vec<Record> {
    let Some((header_row, body)) = cells.split_first() else {
        return Vec::new();
    };

    let mut existing_names = HashSet::new();
    let keys: Vec<String> = header_row
        .iter()
        .map(|cell| unique_header(&header_text(cell), &mut existing_names))
        .collect();

    body.iter()
        .filter_map(|row| {
            let record: Record = row
                .iter()
                .zip(&keys)
                .filter(|(cell, _)| !cell.is_missing())
                .map(|(cell, key)| (key.clone(), cell.clone()))
                .collect();
            (!record.is_empty()).then_some(record)
        })
        .collect()
}

/// Type of each header as sampled from the first row only.
pub fn infer_column_types(rows: &[Record], headers: &[String]) -> IndexMap<String, ColumnType> {
    let Some(first) = rows.first() else {
        return IndexMap::new();
    };

    headers
        .iter()
        .map(|header| (header.clone(), first.value(header).column_type()))
        .collect()
}
