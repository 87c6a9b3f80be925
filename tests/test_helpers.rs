// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、AppState 组装、基础工艺数据
// ==========================================
#![allow(dead_code)]

use part_tracker::app::AppState;
use part_tracker::domain::{PartType, Process, Step};
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = part_tracker::db::open_sqlite_connection(&db_path)?;
    part_tracker::db::ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建基于临时数据库的 AppState
pub fn create_test_state() -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let state = AppState::new(db_path).expect("初始化 AppState 失败");
    (temp_file, state)
}

/// 已生成工序的工艺流程
pub struct ProcessFixture {
    pub part_type: PartType,
    pub process: Process,
    pub steps: Vec<Step>,
}

impl ProcessFixture {
    pub fn part_type_id(&self) -> i64 {
        self.part_type.id.unwrap()
    }

    pub fn process_id(&self) -> i64 {
        self.process.id.unwrap()
    }

    pub fn step_id(&self, step_number: i32) -> i64 {
        self.steps
            .iter()
            .find(|s| s.step_number == step_number)
            .and_then(|s| s.id)
            .unwrap()
    }
}

/// 新建零件类型 + 流程 + 工序
pub fn create_process(
    state: &AppState,
    part_type_name: &str,
    prefix: Option<&str>,
    process_name: &str,
    num_steps: i32,
) -> ProcessFixture {
    let part_type = state
        .process_api
        .create_part_type(part_type_name, prefix)
        .unwrap();
    let process = state
        .process_api
        .create_process(process_name, part_type.id.unwrap(), num_steps, false)
        .unwrap();
    let steps = state
        .process_api
        .generate_steps(process.id.unwrap(), "planner")
        .unwrap();

    ProcessFixture {
        part_type,
        process,
        steps,
    }
}
