use super::core::ActionLogRepository;
use crate::db::get_ts;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str =
    "action_id, action_type, action_ts, actor, entity_kind, entity_id, payload_json, detail";

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;

        let log = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM action_log WHERE action_id = ?"),
                params![action_id],
                map_row,
            )
            .optional()?;

        Ok(log)
    }

    /// 查询实体相关的操作日志（最新在前）
    pub fn find_by_entity(&self, entity_kind: &str, entity_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SELECT_COLUMNS}
               FROM action_log
               WHERE entity_kind = ? AND entity_id = ?
               ORDER BY action_ts DESC"#
        ))?;

        let logs = stmt
            .query_map(params![entity_kind, entity_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定操作人的操作日志
    pub fn find_by_actor(&self, actor: &str, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SELECT_COLUMNS}
               FROM action_log
               WHERE actor = ?
               ORDER BY action_ts DESC
               LIMIT ?"#
        ))?;

        let logs = stmt
            .query_map(params![actor, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定操作类型的日志
    pub fn find_by_action_type(&self, action_type: &str, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SELECT_COLUMNS}
               FROM action_log
               WHERE action_type = ?
               ORDER BY action_ts DESC
               LIMIT ?"#
        ))?;

        let logs = stmt
            .query_map(params![action_type, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM action_log ORDER BY action_ts DESC LIMIT ?"
        ))?;

        let logs = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }
}

/// 映射数据库行到ActionLog对象
fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let payload: Option<String> = row.get(6)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: row.get(1)?,
        action_ts: get_ts(row, 2)?,
        actor: row.get(3)?,
        entity_kind: row.get(4)?,
        entity_id: row.get(5)?,
        payload_json: payload.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}
