use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{ChartDefinition, ChartType, NewChart, NewFile, StoredFile};
use crate::services::excel::types::NormalizedSheet;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    file_name TEXT NOT NULL,
    content_type TEXT,
    size INTEGER NOT NULL,
    bytes BLOB NOT NULL,
    uploaded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sheets (
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    sheet_name TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (file_id, position)
);

CREATE TABLE IF NOT EXISTS charts (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    sheet_name TEXT NOT NULL,
    title TEXT NOT NULL,
    chart_type TEXT NOT NULL,
    x_column TEXT NOT NULL,
    y_column TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

const FILE_COLUMNS: &str = "id, owner, file_name, content_type, size, uploaded_at";
const CHART_COLUMNS: &str =
    "id, owner, file_id, sheet_name, title, chart_type, x_column, y_column, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid stored sheet: {0}")]
    Payload(#[from] serde_json::Error),
}

/// SQLite-backed storage for uploaded files, their normalized sheets and
/// chart definitions.
pub struct SheetStore {
    conn: Mutex<Connection>,
}

impl SheetStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        info!("Opening sheet store at {}", path);
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open database {}: {}", path, e);
            e
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(|e| {
            error!("Failed to create schema: {}", e);
            e
        })?;
        debug!("Sheet store schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Stores the raw upload and its normalized sheets in one transaction.
    pub fn save_file(
        &self,
        file: NewFile<'_>,
        sheets: &[NormalizedSheet],
    ) -> Result<StoredFile, StoreError> {
        let id = Uuid::new_v4().to_string();
        let uploaded_at = Utc::now();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO files (id, owner, file_name, content_type, size, bytes, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                file.owner,
                file.file_name,
                file.content_type,
                file.bytes.len() as i64,
                file.bytes,
                uploaded_at.to_rfc3339()
            ],
        )?;
        insert_sheets(&tx, &id, sheets)?;
        tx.commit()?;

        info!(
            "Stored file {} ({}, {} bytes, {} sheets) for {}",
            id,
            file.file_name,
            file.bytes.len(),
            sheets.len(),
            file.owner
        );

        Ok(StoredFile {
            id,
            owner: file.owner.to_string(),
            file_name: file.file_name.to_string(),
            content_type: file.content_type.map(str::to_string),
            size: file.bytes.len(),
            uploaded_at,
            sheet_names: sheets.iter().map(|s| s.sheet_name().to_string()).collect(),
        })
    }

    /// Files owned by `owner`, or every file when `owner` is `None`.
    pub fn list_files(&self, owner: Option<&str>) -> Result<Vec<StoredFile>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM files WHERE ?1 IS NULL OR owner = ?1 ORDER BY uploaded_at, id",
            FILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let files = stmt
            .query_map(params![owner], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        files
            .into_iter()
            .map(|mut file| -> Result<StoredFile, StoreError> {
                file.sheet_names = sheet_names(&conn, &file.id)?;
                Ok(file)
            })
            .collect()
    }

    pub fn get_file(&self, id: &str) -> Result<Option<StoredFile>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS);
        let file = conn.query_row(&sql, params![id], file_from_row).optional()?;

        match file {
            Some(mut file) => {
                file.sheet_names = sheet_names(&conn, &file.id)?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    pub fn load_file_bytes(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn.lock();
        let bytes = conn
            .query_row("SELECT bytes FROM files WHERE id = ?1", params![id], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(bytes)
    }

    /// Normalized sheets of a file, in workbook order.
    pub fn load_sheets(&self, file_id: &str) -> Result<Vec<NormalizedSheet>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT payload FROM sheets WHERE file_id = ?1 ORDER BY position")?;
        let payloads = stmt
            .query_map(params![file_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|payload| -> Result<NormalizedSheet, StoreError> {
                Ok(serde_json::from_str(payload)?)
            })
            .collect()
    }

    pub fn load_sheet(
        &self,
        file_id: &str,
        sheet_name: &str,
    ) -> Result<Option<NormalizedSheet>, StoreError> {
        let conn = self.conn.lock();
        let payload = conn
            .query_row(
                "SELECT payload FROM sheets WHERE file_id = ?1 AND sheet_name = ?2
                 ORDER BY position LIMIT 1",
                params![file_id, sheet_name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub fn replace_sheets(&self, file_id: &str, sheets: &[NormalizedSheet]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sheets WHERE file_id = ?1", params![file_id])?;
        insert_sheets(&tx, file_id, sheets)?;
        tx.commit()?;
        info!("Replaced sheets of file {} ({} sheets)", file_id, sheets.len());
        Ok(())
    }

    /// Deletes a file with its sheets and charts. Returns false if it did not exist.
    pub fn delete_file(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM files WHERE id = ?1", params![id])?;
        if deleted > 0 {
            info!("Deleted file {}", id);
        }
        Ok(deleted > 0)
    }

    pub fn create_chart(&self, owner: &str, chart: &NewChart) -> Result<ChartDefinition, StoreError> {
        let created = ChartDefinition {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            file_id: chart.file_id.clone(),
            sheet_name: chart.sheet_name.clone(),
            title: chart.title.clone(),
            chart_type: chart.chart_type,
            x_column: chart.x_column.clone(),
            y_column: chart.y_column.clone(),
            created_at: Utc::now(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO charts (id, owner, file_id, sheet_name, title, chart_type, x_column, y_column, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                created.id,
                created.owner,
                created.file_id,
                created.sheet_name,
                created.title,
                created.chart_type.as_str(),
                created.x_column,
                created.y_column,
                created.created_at.to_rfc3339()
            ],
        )?;
        info!("Created {} chart {} on file {}", created.chart_type, created.id, created.file_id);
        Ok(created)
    }

    pub fn list_charts(&self, owner: Option<&str>) -> Result<Vec<ChartDefinition>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM charts WHERE ?1 IS NULL OR owner = ?1 ORDER BY created_at, id",
            CHART_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let charts = stmt
            .query_map(params![owner], chart_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(charts)
    }

    pub fn get_chart(&self, id: &str) -> Result<Option<ChartDefinition>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM charts WHERE id = ?1", CHART_COLUMNS);
        Ok(conn.query_row(&sql, params![id], chart_from_row).optional()?)
    }

    pub fn delete_chart(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM charts WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn insert_sheets(
    conn: &Connection,
    file_id: &str,
    sheets: &[NormalizedSheet],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO sheets (file_id, position, sheet_name, payload) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, sheet) in sheets.iter().enumerate() {
        let payload = serde_json::to_string(sheet)?;
        stmt.execute(params![file_id, position as i64, sheet.sheet_name(), payload])?;
    }
    Ok(())
}

fn sheet_names(conn: &Connection, file_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT sheet_name FROM sheets WHERE file_id = ?1 ORDER BY position")?;
    let names = stmt
        .query_map(params![file_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<StoredFile> {
    Ok(StoredFile {
        id: row.get(0)?,
        owner: row.get(1)?,
        file_name: row.get(2)?,
        content_type: row.get(3)?,
        size: row.get::<_, i64>(4)? as usize,
        uploaded_at: parse_timestamp(5, row.get(5)?)?,
        sheet_names: Vec::new(),
    })
}

fn chart_from_row(row: &Row<'_>) -> rusqlite::Result<ChartDefinition> {
    let chart_type = row
        .get::<_, String>(5)?
        .parse::<ChartType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    Ok(ChartDefinition {
        id: row.get(0)?,
        owner: row.get(1)?,
        file_id: row.get(2)?,
        sheet_name: row.get(3)?,
        title: row.get(4)?,
        chart_type,
        x_column: row.get(6)?,
        y_column: row.get(7)?,
        created_at: parse_timestamp(8, row.get(8)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::excel::types::{CellValue, Record};
    use indexmap::IndexMap;

    fn sheet(name: &str, rows: usize) -> NormalizedSheet {
        let data: Vec<Record> = (0..rows)
            .map(|i| [("n".to_string(), CellValue::Number(i as f64))].into_iter().collect())
            .collect();
        NormalizedSheet::new(name.to_string(), vec!["n".to_string()], IndexMap::new(), data)
    }

    fn upload<'a>(owner: &'a str, bytes: &'a [u8]) -> NewFile<'a> {
        NewFile {
            owner,
            file_name: "book.xlsx",
            content_type: Some("application/vnd.ms-excel"),
            bytes,
        }
    }

    fn chart_for(file_id: &str) -> NewChart {
        NewChart {
            file_id: file_id.to_string(),
            sheet_name: "A".to_string(),
            title: "Counts".to_string(),
            chart_type: ChartType::Bar,
            x_column: "n".to_string(),
            y_column: "n".to_string(),
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let store = SheetStore::open_in_memory().unwrap();
        let stored = store
            .save_file(upload("alice", b"raw"), &[sheet("A", 2), sheet("B", 0)])
            .unwrap();

        assert_eq!(stored.size, 3);
        assert_eq!(stored.sheet_names, vec!["A", "B"]);

        let fetched = store.get_file(&stored.id).unwrap().unwrap();
        assert_eq!(fetched.sheet_names, vec!["A", "B"]);
        assert_eq!(fetched.owner, "alice");
        assert_eq!(store.load_file_bytes(&stored.id).unwrap().unwrap(), b"raw".to_vec());

        let sheets = store.load_sheets(&stored.id).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].row_count(), 2);
        assert_eq!(sheets[0], sheet("A", 2));

        let b = store.load_sheet(&stored.id, "B").unwrap().unwrap();
        assert_eq!(b.row_count(), 0);
        assert!(store.load_sheet(&stored.id, "C").unwrap().is_none());
    }

    #[test]
    fn test_list_files_filters_by_owner() {
        let store = SheetStore::open_in_memory().unwrap();
        store.save_file(upload("alice", b"a"), &[]).unwrap();
        store.save_file(upload("bob", b"b"), &[]).unwrap();

        assert_eq!(store.list_files(Some("alice")).unwrap().len(), 1);
        assert_eq!(store.list_files(Some("carol")).unwrap().len(), 0);
        assert_eq!(store.list_files(None).unwrap().len(), 2);
    }

    #[test]
    fn test_replace_sheets() {
        let store = SheetStore::open_in_memory().unwrap();
        let stored = store.save_file(upload("alice", b"a"), &[sheet("A", 1)]).unwrap();

        store.replace_sheets(&stored.id, &[sheet("X", 3)]).unwrap();
        let sheets = store.load_sheets(&stored.id).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].sheet_name(), "X");
        assert_eq!(sheets[0].row_count(), 3);
    }

    #[test]
    fn test_chart_crud_and_cascade() {
        let store = SheetStore::open_in_memory().unwrap();
        let stored = store.save_file(upload("alice", b"a"), &[sheet("A", 1)]).unwrap();

        let chart = store.create_chart("alice", &chart_for(&stored.id)).unwrap();
        assert_eq!(store.get_chart(&chart.id).unwrap().unwrap(), chart);
        assert_eq!(store.list_charts(Some("alice")).unwrap().len(), 1);
        assert_eq!(store.list_charts(Some("bob")).unwrap().len(), 0);

        assert!(store.delete_file(&stored.id).unwrap());
        assert!(store.get_chart(&chart.id).unwrap().is_none());
        assert!(store.load_sheets(&stored.id).unwrap().is_empty());
        assert!(!store.delete_file(&stored.id).unwrap());
    }

    #[test]
    fn test_delete_chart() {
        let store = SheetStore::open_in_memory().unwrap();
        let stored = store.save_file(upload("alice", b"a"), &[sheet("A", 1)]).unwrap();
        let chart = store.create_chart("alice", &chart_for(&stored.id)).unwrap();

        assert!(store.delete_chart(&chart.id).unwrap());
        assert!(!store.delete_chart(&chart.id).unwrap());
    }
}
