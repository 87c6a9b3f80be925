// ==========================================
// 零件制造跟踪系统 - 归档数据仓储
// ==========================================
// 职责: archived 标记 + ArchiveReason 写入（同一事务）
// 约束: archive_reason (entity_kind, entity_id) 唯一
// 幂等: 已归档实体不再写入，保留首条归档原因
// ==========================================

use crate::db::{fmt_ts, get_ts};
use crate::domain::archive::ArchiveReason;
use crate::domain::types::{ArchiveReasonCode, EntityKind, EntityRef};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// ArchiveRepository - 归档仓储
// ==========================================
pub struct ArchiveRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ArchiveRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量归档（单事务，按顺序处理）
    ///
    /// # 返回
    /// - `Ok(Vec<bool>)`: 与入参一一对应，true=本次归档，false=此前已归档（no-op）
    ///
    /// # 错误
    /// - `NotFound`: 任一目标实体不存在（整体回滚）
    pub fn archive_all(&self, reasons: &[ArchiveReason]) -> RepositoryResult<Vec<bool>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut results = Vec::with_capacity(reasons.len());
        for reason in reasons {
            results.push(archive_one(&tx, reason)?);
        }

        tx.commit()?;
        Ok(results)
    }

    /// 归档单个实体
    pub fn archive(&self, reason: &ArchiveReason) -> RepositoryResult<bool> {
        let mut results = self.archive_all(std::slice::from_ref(reason))?;
        Ok(results.pop().unwrap_or(false))
    }

    /// 查询实体的归档原因
    pub fn find_reason(&self, target: EntityRef) -> RepositoryResult<Option<ArchiveReason>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"SELECT id, entity_kind, entity_id, reason, notes, archived_by, archived_at
                   FROM archive_reason
                   WHERE entity_kind = ? AND entity_id = ?"#,
                params![target.kind.to_db_str(), target.id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询某类实体的全部归档原因
    pub fn list_by_kind(&self, kind: EntityKind) -> RepositoryResult<Vec<ArchiveReason>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT id, entity_kind, entity_id, reason, notes, archived_by, archived_at
               FROM archive_reason
               WHERE entity_kind = ?
               ORDER BY archived_at DESC, id DESC"#,
        )?;

        let rows = stmt
            .query_map(params![kind.to_db_str()], map_row)?
            .collect::<Result<Vec<ArchiveReason>, _>>()?;

        Ok(rows)
    }

    /// 实体是否已归档
    pub fn is_archived(&self, target: EntityRef) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        read_archived_flag(&conn, target)?
            .ok_or_else(|| RepositoryError::not_found(target.kind.to_db_str(), target.id))
    }
}

/// 归档单个实体（事务内）
fn archive_one(conn: &Connection, reason: &ArchiveReason) -> RepositoryResult<bool> {
    let target = reason.target;

    let rows = conn.execute(
        &format!(
            r#"UPDATE {}
               SET archived = 1, revision = revision + 1, updated_at = ?
               WHERE id = ? AND archived = 0"#,
            target.kind.table_name()
        ),
        params![fmt_ts(&reason.archived_at), target.id],
    )?;

    if rows == 0 {
        return match read_archived_flag(conn, target)? {
            Some(_) => Ok(false),
            None => Err(RepositoryError::not_found(target.kind.to_db_str(), target.id)),
        };
    }

    conn.execute(
        r#"INSERT INTO archive_reason (
               entity_kind, entity_id, reason, notes, archived_by, archived_at
           ) VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT(entity_kind, entity_id) DO NOTHING"#,
        params![
            target.kind.to_db_str(),
            target.id,
            reason.reason.to_db_str(),
            &reason.notes,
            &reason.user,
            fmt_ts(&reason.archived_at),
        ],
    )?;

    Ok(true)
}

fn read_archived_flag(conn: &Connection, target: EntityRef) -> RepositoryResult<Option<bool>> {
    let flag: Option<i32> = conn
        .query_row(
            &format!("SELECT archived FROM {} WHERE id = ?", target.kind.table_name()),
            params![target.id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(flag.map(|f| f != 0))
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ArchiveReason> {
    let kind_str: String = row.get(1)?;
    let kind = EntityKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown entity kind: {}", kind_str).into(),
        )
    })?;
    let reason_str: String = row.get(3)?;
    let reason = ArchiveReasonCode::parse(&reason_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown archive reason: {}", reason_str).into(),
        )
    })?;

    Ok(ArchiveReason {
        id: Some(row.get(0)?),
        target: EntityRef {
            kind,
            id: row.get(2)?,
        },
        reason,
        notes: row.get(4)?,
        user: row.get(5)?,
        archived_at: get_ts(row, 6)?,
    })
}
