// ==========================================
// 零件制造跟踪系统 - 零件数据仓储
// ==========================================
// 并发: update 带 revision 乐观锁检查
// 红线: 工序推进与流转日志在同一事务内落库
// ==========================================

use crate::db::{fmt_date, fmt_ts, get_opt_date, get_ts};
use crate::domain::archive::StepTransitionLog;
use crate::domain::order::Part;
use crate::domain::types::PartStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::step_transition_repo::insert_log;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, erp_id, part_type_id, step_id, order_id, status, archived, assigned_emp, estimated_completion, revision, created_at, updated_at";

// ==========================================
// PartRepository - 零件仓储
// ==========================================
pub struct PartRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PartRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建零件
    pub fn create(&self, part: &Part) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_row(&conn, part)
    }

    /// 批量创建零件（单事务，任一失败整体回滚）
    pub fn batch_create(&self, parts: &[Part]) -> RepositoryResult<Vec<i64>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(parts.len());
        for part in parts {
            ids.push(insert_row(&tx, part)?);
        }

        tx.commit()?;
        Ok(ids)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Part>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM part WHERE id = ?"),
                params![id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询订单下的零件
    pub fn list_by_order(&self, order_id: i64, include_archived: bool) -> RepositoryResult<Vec<Part>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM part
               WHERE order_id = ?1 AND (?2 = 1 OR archived = 0)
               ORDER BY erp_id, id"#
        ))?;

        let rows = stmt
            .query_map(params![order_id, include_archived], map_row)?
            .collect::<Result<Vec<Part>, _>>()?;

        Ok(rows)
    }

    /// 查询全部未归档零件
    pub fn list_active(&self) -> RepositoryResult<Vec<Part>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM part WHERE archived = 0 ORDER BY order_id, erp_id, id"
        ))?;

        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<Part>, _>>()?;

        Ok(rows)
    }

    /// 保存工序推进结果并追加流转日志（单事务）
    ///
    /// # 红线
    /// - 零件更新与日志写入必须原子
    /// - revision 冲突时整体回滚，不写日志
    pub fn save_transition(&self, part: &Part, log: &StepTransitionLog) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let new_revision = update_row(&tx, part)?;
        insert_log(&tx, log)?;

        tx.commit()?;
        Ok(new_revision)
    }
}

fn insert_row(conn: &Connection, part: &Part) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO part (
            erp_id, part_type_id, step_id, order_id, status, archived,
            assigned_emp, estimated_completion, revision, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &part.erp_id,
            &part.part_type_id,
            &part.step_id,
            &part.order_id,
            part.status.to_db_str(),
            part.archived,
            &part.assigned_emp,
            part.estimated_completion.as_ref().map(fmt_date),
            &part.revision,
            fmt_ts(&part.created_at),
            fmt_ts(&part.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_row(conn: &Connection, part: &Part) -> RepositoryResult<i32> {
    let id = part
        .id
        .ok_or_else(|| RepositoryError::ValidationError("零件未持久化".to_string()))?;

    let rows_affected = conn.execute(
        r#"UPDATE part
           SET erp_id = ?, part_type_id = ?, step_id = ?, order_id = ?, status = ?,
               assigned_emp = ?, estimated_completion = ?,
               revision = revision + 1, updated_at = ?
           WHERE id = ? AND revision = ?"#,
        params![
            &part.erp_id,
            &part.part_type_id,
            &part.step_id,
            &part.order_id,
            part.status.to_db_str(),
            &part.assigned_emp,
            part.estimated_completion.as_ref().map(fmt_date),
            fmt_ts(&chrono::Local::now().naive_local()),
            id,
            &part.revision,
        ],
    )?;

    if rows_affected == 0 {
        let actual: Option<i32> = conn
            .query_row("SELECT revision FROM part WHERE id = ?", params![id], |row| row.get(0))
            .optional()?;

        return Err(match actual {
            Some(actual) => RepositoryError::OptimisticLockFailure {
                entity: "Part".to_string(),
                id,
                expected: part.revision,
                actual,
            },
            None => RepositoryError::not_found("Part", id),
        });
    }

    Ok(part.revision + 1)
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Part> {
    let status_str: String = row.get(5)?;
    let status = PartStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown part status: {}", status_str).into(),
        )
    })?;
    Ok(Part {
        id: Some(row.get(0)?),
        erp_id: row.get(1)?,
        part_type_id: row.get(2)?,
        step_id: row.get(3)?,
        order_id: row.get(4)?,
        status,
        archived: row.get::<_, i32>(6)? != 0,
        assigned_emp: row.get(7)?,
        estimated_completion: get_opt_date(row, 8)?,
        revision: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}
