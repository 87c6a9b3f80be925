// ==========================================
// 零件制造跟踪系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪（归档、版本升级、工序生成、导入、CRM 同步）
// ==========================================

use crate::domain::types::EntityRef;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID (UUID)
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人

    // ===== 关联实体 =====
    pub entity_kind: Option<String>, // 实体类型 (ORDER/PART/PART_TYPE/PROCESS)
    pub entity_id: Option<i64>,

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Archive,       // 归档
    NewVersion,    // 生成新版本
    GenerateSteps, // 生成工序
    AddLineItem,   // 批量新增零件
    ImportParts,   // CSV 导入
    QualityReport, // 质量报告
    CrmSync,       // CRM 同步
    CrmPush,       // 推送阶段到 CRM
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Archive => "Archive",
            ActionType::NewVersion => "NewVersion",
            ActionType::GenerateSteps => "GenerateSteps",
            ActionType::AddLineItem => "AddLineItem",
            ActionType::ImportParts => "ImportParts",
            ActionType::QualityReport => "QualityReport",
            ActionType::CrmSync => "CrmSync",
            ActionType::CrmPush => "CrmPush",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Archive" => Some(ActionType::Archive),
            "NewVersion" => Some(ActionType::NewVersion),
            "GenerateSteps" => Some(ActionType::GenerateSteps),
            "AddLineItem" => Some(ActionType::AddLineItem),
            "ImportParts" => Some(ActionType::ImportParts),
            "QualityReport" => Some(ActionType::QualityReport),
            "CrmSync" => Some(ActionType::CrmSync),
            "CrmPush" => Some(ActionType::CrmPush),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            entity_kind: None,
            entity_id: None,
            payload_json: None,
            detail: None,
        }
    }

    /// 关联可归档实体
    pub fn with_entity(mut self, target: EntityRef) -> Self {
        self.entity_kind = Some(target.kind.to_db_str().to_string());
        self.entity_id = Some(target.id);
        self
    }

    /// 关联任意实体 (PART_TYPE / PROCESS 等非归档实体)
    pub fn with_entity_raw(mut self, kind: &str, id: i64) -> Self {
        self.entity_kind = Some(kind.to_string());
        self.entity_id = Some(id);
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_parse() {
        assert_eq!(ActionType::parse("Archive"), Some(ActionType::Archive));
        assert_eq!(ActionType::parse("archive"), None);
    }

    #[test]
    fn test_action_log_builder() {
        let log = ActionLog::new(ActionType::Archive, "admin")
            .with_entity(EntityRef::part(3))
            .with_payload(&serde_json::json!({"reason": "OBSOLETE"}))
            .with_detail("归档零件");

        assert_eq!(log.action_type, "Archive");
        assert_eq!(log.entity_kind.as_deref(), Some("PART"));
        assert_eq!(log.entity_id, Some(3));
        assert!(log.payload_json.is_some());
    }
}
