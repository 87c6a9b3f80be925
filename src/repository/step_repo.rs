// ==========================================
// 零件制造跟踪系统 - 工序数据仓储
// ==========================================
// 约束: (process_id, step_number) 唯一
// ==========================================

use crate::domain::process::{Process, Step};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str =
    "id, process_id, step_number, expected_duration_min, description, is_last_step";

// ==========================================
// StepRepository - 工序仓储
// ==========================================
pub struct StepRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StepRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量插入工序（单事务）
    ///
    /// # 返回
    /// - `Ok(Vec<Step>)`: 带 id 的工序列表
    /// - `Err(UniqueConstraintViolation)`: 流程已生成过工序
    pub fn insert_all(&self, steps: &[Step]) -> RepositoryResult<Vec<Step>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut saved = Vec::with_capacity(steps.len());
        for step in steps {
            tx.execute(
                r#"INSERT INTO step (
                    process_id, step_number, expected_duration_min, description, is_last_step
                ) VALUES (?, ?, ?, ?, ?)"#,
                params![
                    &step.process_id,
                    &step.step_number,
                    &step.expected_duration_min,
                    &step.description,
                    step.is_last_step,
                ],
            )?;
            let mut s = step.clone();
            s.id = Some(tx.last_insert_rowid());
            saved.push(s);
        }

        tx.commit()?;
        Ok(saved)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Step>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM step WHERE id = ?"),
                params![id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 按 (流程, 序号) 查询工序
    pub fn find_by_number(&self, process_id: i64, step_number: i32) -> RepositoryResult<Option<Step>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM step WHERE process_id = ? AND step_number = ?"),
                params![process_id, step_number],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询流程的全部工序（按序号升序）
    pub fn list_by_process(&self, process_id: i64) -> RepositoryResult<Vec<Step>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM step WHERE process_id = ? ORDER BY step_number"
        ))?;

        let rows = stmt
            .query_map(params![process_id], map_row)?
            .collect::<Result<Vec<Step>, _>>()?;

        Ok(rows)
    }

    /// 查询工序所属的工艺流程
    pub fn find_owning_process(&self, step_id: i64) -> RepositoryResult<Option<Process>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"SELECT p.id, p.name, p.is_remanufactured, p.num_steps, p.part_type_id,
                          p.version, p.previous_version_id, p.created_at
                   FROM step s JOIN process p ON p.id = s.process_id
                   WHERE s.id = ?"#,
                params![step_id],
                |row| {
                    Ok(Process {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        is_remanufactured: row.get::<_, i32>(2)? != 0,
                        num_steps: row.get(3)?,
                        part_type_id: row.get(4)?,
                        version: row.get(5)?,
                        previous_version_id: row.get(6)?,
                        created_at: crate::db::get_ts(row, 7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Step> {
    Ok(Step {
        id: Some(row.get(0)?),
        process_id: row.get(1)?,
        step_number: row.get(2)?,
        expected_duration_min: row.get(3)?,
        description: row.get(4)?,
        is_last_step: row.get::<_, i32>(5)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_with_schema;
    use crate::domain::process::PartType;
    use crate::repository::{PartTypeRepository, ProcessRepository};

    fn setup() -> (StepRepository, i64) {
        let conn = Arc::new(Mutex::new(open_in_memory_with_schema().unwrap()));
        let pt = PartTypeRepository::new(conn.clone())
            .create(&PartType::new("喷油器".to_string(), None))
            .unwrap();
        let process = ProcessRepository::new(conn.clone())
            .create(&Process::new("装配".to_string(), pt.id.unwrap(), 2, false))
            .unwrap();
        (StepRepository::new(conn), process.id.unwrap())
    }

    fn make_steps(process_id: i64) -> Vec<Step> {
        (1..=2)
            .map(|n| Step {
                id: None,
                process_id,
                step_number: n,
                expected_duration_min: Some(30),
                description: format!("工序 {}", n),
                is_last_step: n == 2,
            })
            .collect()
    }

    #[test]
    fn test_insert_all_and_lookup() {
        let (repo, process_id) = setup();
        let saved = repo.insert_all(&make_steps(process_id)).unwrap();
        assert!(saved.iter().all(|s| s.id.is_some()));

        let second = repo.find_by_number(process_id, 2).unwrap().unwrap();
        assert!(second.is_last_step);
        assert!(repo.find_by_number(process_id, 3).unwrap().is_none());

        let owner = repo.find_owning_process(second.id.unwrap()).unwrap().unwrap();
        assert_eq!(owner.id, Some(process_id));
    }

    #[test]
    fn test_duplicate_generation_fails_and_rolls_back() {
        let (repo, process_id) = setup();
        repo.insert_all(&make_steps(process_id)).unwrap();

        let result = repo.insert_all(&make_steps(process_id));
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));
        assert_eq!(repo.list_by_process(process_id).unwrap().len(), 2);
    }
}
