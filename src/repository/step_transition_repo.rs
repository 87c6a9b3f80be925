// ==========================================
// 零件制造跟踪系统 - 工序流转日志仓储
// ==========================================
// 红线: append-only，不提供 update/delete（表上另有触发器兜底）
// ==========================================

use crate::db::{fmt_ts, get_ts};
use crate::domain::archive::StepTransitionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// StepTransitionRepository - 工序流转日志仓储
// ==========================================
pub struct StepTransitionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StepTransitionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条流转日志
    pub fn insert(&self, log: &StepTransitionLog) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_log(&conn, log)
    }

    /// 查询零件的流转记录（按时间升序）
    pub fn list_by_part(&self, part_id: i64) -> RepositoryResult<Vec<StepTransitionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT id, part_id, step_id, operator, transitioned_at
               FROM step_transition_log
               WHERE part_id = ?
               ORDER BY transitioned_at, id"#,
        )?;

        let rows = stmt
            .query_map(params![part_id], |row| {
                Ok(StepTransitionLog {
                    id: Some(row.get(0)?),
                    part_id: row.get(1)?,
                    step_id: row.get(2)?,
                    operator: row.get(3)?,
                    transitioned_at: get_ts(row, 4)?,
                })
            })?
            .collect::<Result<Vec<StepTransitionLog>, _>>()?;

        Ok(rows)
    }

    /// 操作人的流转记录数
    pub fn count_by_operator(&self, operator: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM step_transition_log WHERE operator = ?",
            params![operator],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// 插入流转日志（可在其他仓储的事务内调用）
pub(crate) fn insert_log(conn: &Connection, log: &StepTransitionLog) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO step_transition_log (part_id, step_id, operator, transitioned_at)
           VALUES (?, ?, ?, ?)"#,
        params![
            &log.part_id,
            &log.step_id,
            &log.operator,
            fmt_ts(&log.transitioned_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
