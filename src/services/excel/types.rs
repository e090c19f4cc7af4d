use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use super::utils::serialize_number;

static MISSING: CellValue = CellValue::Missing;

/// A spreadsheet cell after ingestion. Cells carry no fixed type, so every
/// consumer branches on the variant instead of assuming one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            CellValue::Number(_) => ColumnType::Number,
            CellValue::String(_) => ColumnType::String,
            CellValue::Boolean(_) => ColumnType::Boolean,
            CellValue::Missing => ColumnType::Undefined,
        }
    }
}

// -0.0 and 0.0 compare equal, so they must hash the same.
fn canonical_bits(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a == b,
            (CellValue::Missing, CellValue::Missing) => true,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Number(n) => canonical_bits(*n).hash(state),
            CellValue::String(s) => s.hash(state),
            CellValue::Boolean(b) => b.hash(state),
            CellValue::Missing => {}
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Number(n) => serialize_number(n, serializer),
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
            CellValue::Missing => serializer.serialize_none(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

/// One data row, keyed by column header in header order. Blank cells have
/// no entry.
pub type Record = IndexMap<String, CellValue>;

pub trait RecordExt {
    /// The value under `header`, or `Missing` when the row has no such key.
    fn value(&self, header: &str) -> &CellValue;
}

impl RecordExt for Record {
    fn value(&self, header: &str) -> &CellValue {
        self.get(header).unwrap_or(&MISSING)
    }
}

/// A decoded workbook, sheets in the file's own order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Raw cell grid of one sheet's used range, header row included.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub cells: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    String,
    Boolean,
    Undefined,
}

/// A sheet after header extraction, type inference and counting.
///
/// `row_count` and `column_count` are derived from `data` and `headers` on
/// construction and cannot be set independently. Deserializing ignores any
/// stored counts and recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SheetPayload")]
pub struct NormalizedSheet {
    sheet_name: String,
    headers: Vec<String>,
    column_types: IndexMap<String, ColumnType>,
    data: Vec<Record>,
    row_count: usize,
    column_count: usize,
}

impl NormalizedSheet {
    pub fn new(
        sheet_name: String,
        headers: Vec<String>,
        column_types: IndexMap<String, ColumnType>,
        data: Vec<Record>,
    ) -> Self {
        Self {
            row_count: data.len(),
            column_count: headers.len(),
            sheet_name,
            headers,
            column_types,
            data,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_types(&self) -> &IndexMap<String, ColumnType> {
        &self.column_types
    }

    pub fn data(&self) -> &[Record] {
        &self.data
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn has_header(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetPayload {
    sheet_name: String,
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default)]
    column_types: IndexMap<String, ColumnType>,
    #[serde(default)]
    data: Vec<Record>,
}

impl From<SheetPayload> for NormalizedSheet {
    fn from(payload: SheetPayload) -> Self {
        NormalizedSheet::new(payload.sheet_name, payload.headers, payload.column_types, payload.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub has_data: bool,
    pub has_headers: bool,
    pub is_consistent: bool,
}

/// Statistics for one column: numeric when every value coerces to a number,
/// categorical otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    #[serde(serialize_with = "serialize_number")]
    pub min: f64,
    #[serde(serialize_with = "serialize_number")]
    pub max: f64,
    #[serde(serialize_with = "serialize_number")]
    pub average: f64,
    #[serde(serialize_with = "serialize_number")]
    pub sum: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalSummary {
    pub unique_values: Vec<CellValue>,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: SummaryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Categorical,
}
