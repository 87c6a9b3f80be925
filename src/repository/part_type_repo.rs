// ==========================================
// 零件制造跟踪系统 - 零件类型数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: part_type 行不可 UPDATE，编辑走 save_as_new_version
// ==========================================

use crate::db::{fmt_ts, get_ts};
use crate::domain::process::{PartType, Versioned};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str =
    "id, name, id_prefix, version, previous_version_id, created_at";

// ==========================================
// PartTypeRepository - 零件类型仓储
// ==========================================
pub struct PartTypeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PartTypeRepository {
    /// 创建新的PartTypeRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建零件类型（首个版本）
    ///
    /// # 返回
    /// - `Ok(PartType)`: 带 id 的已持久化实体
    pub fn create(&self, part_type: &PartType) -> RepositoryResult<PartType> {
        if part_type.id.is_some() {
            return Err(RepositoryError::ValidationError(
                "已持久化的零件类型不能再次创建，请使用 save_as_new_version".to_string(),
            ));
        }
        let conn = self.get_conn()?;
        let id = insert_row(&conn, part_type)?;

        let mut saved = part_type.clone();
        saved.id = Some(id);
        Ok(saved)
    }

    /// 按id查询
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<PartType>> {
        let conn = self.get_conn()?;
        find_row(&conn, id)
    }

    /// 查询所有最新版本（无后继版本的行）
    pub fn list_latest(&self) -> RepositoryResult<Vec<PartType>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SELECT_COLUMNS}
               FROM part_type
               WHERE id NOT IN (
                   SELECT previous_version_id FROM part_type WHERE previous_version_id IS NOT NULL
               )
               ORDER BY name, id"#
        ))?;

        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<PartType>, _>>()?;

        Ok(rows)
    }

    /// 保存为新版本
    ///
    /// # 规则
    /// - 被编辑行必须已存在
    /// - 新行: id 重新分配，version = 原 version + 1，previous_version_id = 原 id
    /// - 被编辑行已有后继版本时返回 VersionConflict（禁止版本链分叉）
    ///
    /// # 说明
    /// 版本号以库中已存行为准，调用方传入的 version 被忽略
    pub fn save_as_new_version(&self, edited: &PartType) -> RepositoryResult<PartType> {
        let current_id = edited.id.ok_or_else(|| {
            RepositoryError::ValidationError("未持久化的零件类型不能生成新版本".to_string())
        })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let stored = find_row(&tx, current_id)?
            .ok_or_else(|| RepositoryError::not_found(PartType::ENTITY, current_id))?;

        if let Some(successor) = find_successor_id(&tx, current_id)? {
            return Err(RepositoryError::VersionConflict {
                message: format!(
                    "零件类型(id={})已有后继版本(id={})，请基于最新版本编辑",
                    current_id, successor
                ),
            });
        }

        let mut next = edited.clone();
        next.version = stored.version;
        next.bump_version(chrono::Local::now().naive_local());

        let new_id = insert_row(&tx, &next)?;
        tx.commit()?;

        next.id = Some(new_id);
        Ok(next)
    }

    /// 版本历史（从指定版本回溯到 version 1，按版本号降序）
    pub fn history(&self, id: i64) -> RepositoryResult<Vec<PartType>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"WITH RECURSIVE chain(cid) AS (
                   SELECT ?1
                   UNION ALL
                   SELECT pt.previous_version_id
                   FROM part_type pt JOIN chain ON pt.id = chain.cid
                   WHERE pt.previous_version_id IS NOT NULL
               )
               SELECT {SELECT_COLUMNS}
               FROM part_type
               WHERE id IN (SELECT cid FROM chain)
               ORDER BY version DESC"#
        ))?;

        let rows = stmt
            .query_map(params![id], map_row)?
            .collect::<Result<Vec<PartType>, _>>()?;

        Ok(rows)
    }

    /// 查询同一版本链上的最新版本
    pub fn find_latest_version(&self, id: i64) -> RepositoryResult<Option<PartType>> {
        let conn = self.get_conn()?;

        let latest_id: Option<i64> = conn
            .query_row(
                r#"WITH RECURSIVE chain(cid, depth) AS (
                       SELECT ?1, 0
                       UNION ALL
                       SELECT pt.id, chain.depth + 1
                       FROM part_type pt JOIN chain ON pt.previous_version_id = chain.cid
                   )
                   SELECT cid FROM chain ORDER BY depth DESC LIMIT 1"#,
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match latest_id {
            Some(latest) => find_row(&conn, latest),
            None => Ok(None),
        }
    }
}

// ==========================================
// 行级辅助（可在事务内复用）
// ==========================================

fn insert_row(conn: &Connection, pt: &PartType) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO part_type (
            name, id_prefix, version, previous_version_id, created_at
        ) VALUES (?, ?, ?, ?, ?)"#,
        params![
            &pt.name,
            &pt.id_prefix,
            &pt.version,
            &pt.previous_version_id,
            fmt_ts(&pt.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn find_row(conn: &Connection, id: i64) -> RepositoryResult<Option<PartType>> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM part_type WHERE id = ?"),
            params![id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

fn find_successor_id(conn: &Connection, id: i64) -> RepositoryResult<Option<i64>> {
    let successor = conn
        .query_row(
            "SELECT id FROM part_type WHERE previous_version_id = ?",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(successor)
}

/// 映射数据库行到PartType对象
fn map_row(row: &rusqlite::Row) -> rusqlite::Result<PartType> {
    Ok(PartType {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        id_prefix: row.get(2)?,
        version: row.get(3)?,
        previous_version_id: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_with_schema;

    fn setup() -> PartTypeRepository {
        let conn = open_in_memory_with_schema().unwrap();
        PartTypeRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_create_and_find() {
        let repo = setup();
        let saved = repo
            .create(&PartType::new("喷油器".to_string(), Some("DI".to_string())))
            .unwrap();

        let found = repo.find_by_id(saved.id.unwrap()).unwrap().unwrap();
        assert_eq!(found.name, "喷油器");
        assert_eq!(found.version, 1);
        assert_eq!(found.previous_version_id, None);
    }

    #[test]
    fn test_save_as_new_version_chain() {
        let repo = setup();
        let v1 = repo
            .create(&PartType::new("喷油器".to_string(), None))
            .unwrap();

        let mut edit = v1.clone();
        edit.name = "喷油器A".to_string();
        let v2 = repo.save_as_new_version(&edit).unwrap();

        let mut edit = v2.clone();
        edit.id_prefix = Some("DIA".to_string());
        let v3 = repo.save_as_new_version(&edit).unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(v2.previous_version_id, v1.id);
        assert_eq!(v3.version, 3);
        assert_eq!(v3.previous_version_id, v2.id);

        // 原行保持不变
        let old = repo.find_by_id(v1.id.unwrap()).unwrap().unwrap();
        assert_eq!(old.name, "喷油器");

        let history = repo.history(v3.id.unwrap()).unwrap();
        let versions: Vec<i32> = history.iter().map(|p| p.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert_eq!(history.last().unwrap().previous_version_id, None);

        let latest = repo.find_latest_version(v1.id.unwrap()).unwrap().unwrap();
        assert_eq!(latest.id, v3.id);

        let latest_list = repo.list_latest().unwrap();
        assert_eq!(latest_list.len(), 1);
        assert_eq!(latest_list[0].id, v3.id);
    }

    #[test]
    fn test_editing_stale_version_conflicts() {
        let repo = setup();
        let v1 = repo.create(&PartType::new("泵".to_string(), None)).unwrap();
        repo.save_as_new_version(&v1).unwrap();

        let result = repo.save_as_new_version(&v1);
        assert!(matches!(result, Err(RepositoryError::VersionConflict { .. })));
    }

    #[test]
    fn test_new_version_requires_identity() {
        let repo = setup();
        let result = repo.save_as_new_version(&PartType::new("泵".to_string(), None));
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));
    }

    #[test]
    fn test_new_version_ignores_caller_version() {
        let repo = setup();
        let v1 = repo.create(&PartType::new("泵".to_string(), None)).unwrap();

        let mut edit = v1.clone();
        edit.version = 40;
        let v2 = repo.save_as_new_version(&edit).unwrap();
        assert_eq!(v2.version, 2);
    }
}
