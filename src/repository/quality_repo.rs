// ==========================================
// 零件制造跟踪系统 - 质量报告与文档仓储
// ==========================================

use crate::db::{fmt_ts, get_ts};
use crate::domain::quality::{Document, ErrorReport};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ErrorReportRepository - 质量错误报告仓储
// ==========================================
pub struct ErrorReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ErrorReportRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, report: &ErrorReport) -> RepositoryResult<i64> {
        let errors_json = serde_json::to_string(&report.errors)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO error_report (
                part_id, step_id, machine, operator, description, errors_json, reported_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &report.part_id,
                &report.step_id,
                &report.machine,
                &report.operator,
                &report.description,
                errors_json,
                fmt_ts(&report.reported_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 查询零件的质量报告（最新在前）
    pub fn list_by_part(&self, part_id: i64) -> RepositoryResult<Vec<ErrorReport>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT id, part_id, step_id, machine, operator, description, errors_json, reported_at
               FROM error_report
               WHERE part_id = ?
               ORDER BY reported_at DESC, id DESC"#,
        )?;

        let rows = stmt
            .query_map(params![part_id], |row| {
                let errors_json: String = row.get(6)?;
                Ok(ErrorReport {
                    id: Some(row.get(0)?),
                    part_id: row.get(1)?,
                    step_id: row.get(2)?,
                    machine: row.get(3)?,
                    operator: row.get(4)?,
                    description: row.get(5)?,
                    errors: serde_json::from_str(&errors_json).unwrap_or_default(),
                    reported_at: get_ts(row, 7)?,
                })
            })?
            .collect::<Result<Vec<ErrorReport>, _>>()?;

        Ok(rows)
    }
}

// ==========================================
// DocumentRepository - 零件文档仓储
// ==========================================
pub struct DocumentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, doc: &Document) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO document (
                part_id, file_name, is_image, storage_path, uploaded_by, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &doc.part_id,
                &doc.file_name,
                doc.is_image,
                &doc.storage_path,
                &doc.uploaded_by,
                fmt_ts(&doc.uploaded_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_by_part(&self, part_id: i64) -> RepositoryResult<Vec<Document>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT id, part_id, file_name, is_image, storage_path, uploaded_by, uploaded_at
               FROM document
               WHERE part_id = ?
               ORDER BY uploaded_at DESC, id DESC"#,
        )?;

        let rows = stmt
            .query_map(params![part_id], |row| {
                Ok(Document {
                    id: Some(row.get(0)?),
                    part_id: row.get(1)?,
                    file_name: row.get(2)?,
                    is_image: row.get::<_, i32>(3)? != 0,
                    storage_path: row.get(4)?,
                    uploaded_by: row.get(5)?,
                    uploaded_at: get_ts(row, 6)?,
                })
            })?
            .collect::<Result<Vec<Document>, _>>()?;

        Ok(rows)
    }
}
