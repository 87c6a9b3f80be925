// ==========================================
// 零件制造跟踪系统 - 工艺流程数据仓储
// ==========================================
// 红线: process 行不可 UPDATE，编辑走 save_as_new_version
// 说明: 新版本不继承旧版本的工序，需重新生成
// ==========================================

use crate::db::{fmt_ts, get_ts};
use crate::domain::process::{Process, Versioned};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, name, is_remanufactured, num_steps, part_type_id, version, previous_version_id, created_at";

// ==========================================
// ProcessRepository - 工艺流程仓储
// ==========================================
pub struct ProcessRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建工艺流程（首个版本）
    pub fn create(&self, process: &Process) -> RepositoryResult<Process> {
        if process.id.is_some() {
            return Err(RepositoryError::ValidationError(
                "已持久化的工艺流程不能再次创建，请使用 save_as_new_version".to_string(),
            ));
        }
        let conn = self.get_conn()?;
        let id = insert_row(&conn, process)?;

        let mut saved = process.clone();
        saved.id = Some(id);
        Ok(saved)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Process>> {
        let conn = self.get_conn()?;
        find_row(&conn, id)
    }

    /// 查询零件类型下的所有工艺流程（含历史版本）
    pub fn list_by_part_type(&self, part_type_id: i64) -> RepositoryResult<Vec<Process>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM process WHERE part_type_id = ? ORDER BY name, version"
        ))?;

        let rows = stmt
            .query_map(params![part_type_id], map_row)?
            .collect::<Result<Vec<Process>, _>>()?;

        Ok(rows)
    }

    /// 保存为新版本
    ///
    /// # 规则
    /// 同 PartTypeRepository::save_as_new_version
    pub fn save_as_new_version(&self, edited: &Process) -> RepositoryResult<Process> {
        let current_id = edited.id.ok_or_else(|| {
            RepositoryError::ValidationError("未持久化的工艺流程不能生成新版本".to_string())
        })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let stored = find_row(&tx, current_id)?
            .ok_or_else(|| RepositoryError::not_found(Process::ENTITY, current_id))?;

        let successor: Option<i64> = tx
            .query_row(
                "SELECT id FROM process WHERE previous_version_id = ?",
                params![current_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(successor) = successor {
            return Err(RepositoryError::VersionConflict {
                message: format!(
                    "工艺流程(id={})已有后继版本(id={})，请基于最新版本编辑",
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

    /// 版本历史（按版本号降序，终止于 version 1）
    pub fn history(&self, id: i64) -> RepositoryResult<Vec<Process>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"WITH RECURSIVE chain(cid) AS (
                   SELECT ?1
                   UNION ALL
                   SELECT p.previous_version_id
                   FROM process p JOIN chain ON p.id = chain.cid
                   WHERE p.previous_version_id IS NOT NULL
               )
               SELECT {SELECT_COLUMNS}
               FROM process
               WHERE id IN (SELECT cid FROM chain)
               ORDER BY version DESC"#
        ))?;

        let rows = stmt
            .query_map(params![id], map_row)?
            .collect::<Result<Vec<Process>, _>>()?;

        Ok(rows)
    }

    /// 查询同一版本链上的最新版本
    pub fn find_latest_version(&self, id: i64) -> RepositoryResult<Option<Process>> {
        let conn = self.get_conn()?;

        let latest_id: Option<i64> = conn
            .query_row(
                r#"WITH RECURSIVE chain(cid, depth) AS (
                       SELECT ?1, 0
                       UNION ALL
                       SELECT p.id, chain.depth + 1
                       FROM process p JOIN chain ON p.previous_version_id = chain.cid
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

fn insert_row(conn: &Connection, p: &Process) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO process (
            name, is_remanufactured, num_steps, part_type_id,
            version, previous_version_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &p.name,
            p.is_remanufactured as i32,
            &p.num_steps,
            &p.part_type_id,
            &p.version,
            &p.previous_version_id,
            fmt_ts(&p.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn find_row(conn: &Connection, id: i64) -> RepositoryResult<Option<Process>> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM process WHERE id = ?"),
            params![id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Process> {
    Ok(Process {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        is_remanufactured: row.get::<_, i32>(2)? != 0,
        num_steps: row.get(3)?,
        part_type_id: row.get(4)?,
        version: row.get(5)?,
        previous_version_id: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_with_schema;
    use crate::domain::process::PartType;
    use crate::repository::part_type_repo::PartTypeRepository;

    fn setup() -> (ProcessRepository, i64) {
        let conn = Arc::new(Mutex::new(open_in_memory_with_schema().unwrap()));
        let pt = PartTypeRepository::new(conn.clone())
            .create(&PartType::new("喷油器".to_string(), None))
            .unwrap();
        (ProcessRepository::new(conn), pt.id.unwrap())
    }

    #[test]
    fn test_create_and_list_by_part_type() {
        let (repo, pt_id) = setup();
        repo.create(&Process::new("装配".to_string(), pt_id, 3, false))
            .unwrap();
        repo.create(&Process::new("再制造".to_string(), pt_id, 5, true))
            .unwrap();

        let list = repo.list_by_part_type(pt_id).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().any(|p| p.is_remanufactured && p.num_steps == 5));
    }

    #[test]
    fn test_rejects_zero_steps() {
        let (repo, pt_id) = setup();
        let result = repo.create(&Process::new("空".to_string(), pt_id, 0, false));
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));
    }

    #[test]
    fn test_save_as_new_version() {
        let (repo, pt_id) = setup();
        let v1 = repo
            .create(&Process::new("装配".to_string(), pt_id, 3, false))
            .unwrap();

        let mut edit = v1.clone();
        edit.num_steps = 4;
        let v2 = repo.save_as_new_version(&edit).unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(v2.previous_version_id, v1.id);
        assert_eq!(repo.find_by_id(v1.id.unwrap()).unwrap().unwrap().num_steps, 3);

        let history = repo.history(v2.id.unwrap()).unwrap();
        assert_eq!(history.len(), 2);

        let latest = repo.find_latest_version(v1.id.unwrap()).unwrap().unwrap();
        assert_eq!(latest.id, v2.id);

        assert!(matches!(
            repo.save_as_new_version(&v1),
            Err(RepositoryError::VersionConflict { .. })
        ));
    }
}
