// ==========================================
// 零件制造跟踪系统 - 归档与工序流转记录
// ==========================================
// ArchiveReason: 多态归档原因，(entity_kind, entity_id) 唯一
// StepTransitionLog: 工序推进流水，只追加不修改
// ==========================================

use crate::domain::types::{ArchiveReasonCode, EntityRef};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ArchiveReason - 归档原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveReason {
    pub id: Option<i64>,
    pub target: EntityRef,
    pub reason: ArchiveReasonCode,
    pub notes: Option<String>,
    pub user: String,
    pub archived_at: NaiveDateTime,
}

impl ArchiveReason {
    pub fn new(
        target: EntityRef,
        reason: ArchiveReasonCode,
        notes: Option<String>,
        user: String,
    ) -> Self {
        Self {
            id: None,
            target,
            reason,
            notes,
            user,
            archived_at: chrono::Local::now().naive_local(),
        }
    }
}

// ==========================================
// StepTransitionLog - 工序流转日志
// ==========================================
// 红线: append-only，仓储层不提供 update/delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTransitionLog {
    pub id: Option<i64>,
    pub part_id: i64,
    pub step_id: i64, // 推进后的工序（完工时为最后一道工序）
    pub operator: String,
    pub transitioned_at: NaiveDateTime,
}

impl StepTransitionLog {
    pub fn new(part_id: i64, step_id: i64, operator: String) -> Self {
        Self {
            id: None,
            part_id,
            step_id,
            operator,
            transitioned_at: chrono::Local::now().naive_local(),
        }
    }
}
