use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::services::excel::types::{ColumnStatistics, ValidationResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub owner: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
    pub sheet_names: Vec<String>,
}

#[derive(Debug)]
pub struct NewFile<'a> {
    pub owner: &'a str,
    pub file_name: &'a str,
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
    Area,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Area => "area",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "pie" => Ok(ChartType::Pie),
            "scatter" => Ok(ChartType::Scatter),
            "area" => Ok(ChartType::Area),
            other => Err(format!("unknown chart type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDefinition {
    pub id: String,
    pub owner: String,
    pub file_id: String,
    pub sheet_name: String,
    pub title: String,
    pub chart_type: ChartType,
    pub x_column: String,
    pub y_column: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChart {
    pub file_id: String,
    pub sheet_name: String,
    pub title: String,
    pub chart_type: ChartType,
    pub x_column: String,
    pub y_column: String,
}

/// A chart together with analysis computed from its sheet at read time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub chart: ChartDefinition,
    pub validation: ValidationResult,
    pub x_statistics: Option<ColumnStatistics>,
    pub y_statistics: Option<ColumnStatistics>,
}
