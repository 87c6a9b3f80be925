// ==========================================
// 零件制造跟踪系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 实体状态不允许当前操作（缺少工序/零件类型、已归档、挂起等）
    #[error("状态无效: {0}")]
    InvalidState(String),

    /// 流程配置缺失下一道工序
    #[error("工序缺失: process_id={process_id}, step_number={step_number}")]
    MissingStep { process_id: i64, step_number: i32 },

    #[error("{entity}(id={id})不存在")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
