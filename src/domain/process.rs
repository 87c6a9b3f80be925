// ==========================================
// 零件制造跟踪系统 - 工艺定义领域模型
// ==========================================
// 实体: PartType (零件类型) / Process (工艺流程) / Step (工序)
// 红线: PartType/Process 创建后不可原地修改，编辑即生成新版本行
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Versioned - 版本化实体
// ==========================================
/// 可版本化实体的公共访问接口
///
/// 版本链: 每次编辑生成新行，`previous_version_id` 指向被编辑的行，
/// 链条终止于 version = 1 (无前驱)。
pub trait Versioned {
    /// 实体名称（用于错误信息与日志）
    const ENTITY: &'static str;

    fn id(&self) -> Option<i64>;
    fn version(&self) -> i32;
    fn previous_version_id(&self) -> Option<i64>;

    /// 清空标识、版本号+1、前驱指向原标识
    fn bump_version(&mut self, now: NaiveDateTime);
}

// ==========================================
// PartType - 零件类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartType {
    pub id: Option<i64>,                  // 未持久化时为 None
    pub name: String,                     // 名称
    pub id_prefix: Option<String>,        // ERP 编号前缀
    pub version: i32,                     // 版本号 (从1开始)
    pub previous_version_id: Option<i64>, // 前一版本
    pub created_at: NaiveDateTime,
}

impl PartType {
    /// 创建首个版本（未持久化）
    pub fn new(name: String, id_prefix: Option<String>) -> Self {
        Self {
            id: None,
            name,
            id_prefix,
            version: 1,
            previous_version_id: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }

    /// ERP 编号前缀（无前缀时使用名称）
    pub fn erp_prefix(&self) -> &str {
        match self.id_prefix.as_deref() {
            Some(p) if !p.trim().is_empty() => p.trim(),
            _ => self.name.trim(),
        }
    }
}

impl Versioned for PartType {
    const ENTITY: &'static str = "PartType";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn previous_version_id(&self) -> Option<i64> {
        self.previous_version_id
    }

    fn bump_version(&mut self, now: NaiveDateTime) {
        self.previous_version_id = self.id.take();
        self.version += 1;
        self.created_at = now;
    }
}

// ==========================================
// Process - 工艺流程
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: Option<i64>,
    pub name: String,
    pub is_remanufactured: bool, // 是否再制造
    pub num_steps: i32,          // 工序数量
    pub part_type_id: i64,       // 所属零件类型（具体版本）
    pub version: i32,
    pub previous_version_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl Process {
    pub fn new(name: String, part_type_id: i64, num_steps: i32, is_remanufactured: bool) -> Self {
        Self {
            id: None,
            name,
            is_remanufactured,
            num_steps,
            part_type_id,
            version: 1,
            previous_version_id: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }
}

impl Versioned for Process {
    const ENTITY: &'static str = "Process";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn previous_version_id(&self) -> Option<i64> {
        self.previous_version_id
    }

    fn bump_version(&mut self, now: NaiveDateTime) {
        self.previous_version_id = self.id.take();
        self.version += 1;
        self.created_at = now;
    }
}

// ==========================================
// Step - 工序
// ==========================================
// 唯一约束: (process_id, step_number)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Option<i64>,
    pub process_id: i64,
    pub step_number: i32,                   // 工序序号 (1..N)
    pub expected_duration_min: Option<i64>, // 预计耗时（分钟）
    pub description: String,
    pub is_last_step: bool,
}

impl Step {
    /// 工序在流程中的展示文本，例如 "2/5"
    pub fn progress_label(&self, num_steps: i32) -> String {
        format!("{}/{}", self.step_number, num_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_version_links_previous() {
        let mut pt = PartType::new("喷油器".to_string(), Some("DI".to_string()));
        pt.id = Some(5);

        let now = chrono::Local::now().naive_local();
        pt.bump_version(now);

        assert_eq!(pt.id, None);
        assert_eq!(pt.version, 2);
        assert_eq!(pt.previous_version_id, Some(5));
    }

    #[test]
    fn test_erp_prefix_falls_back_to_name() {
        let pt = PartType::new("Nozzle".to_string(), Some("  ".to_string()));
        assert_eq!(pt.erp_prefix(), "Nozzle");

        let pt = PartType::new("Nozzle".to_string(), Some("NZ".to_string()));
        assert_eq!(pt.erp_prefix(), "NZ");
    }
}
