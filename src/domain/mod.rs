// ==========================================
// 零件制造跟踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod archive;
pub mod order;
pub mod process;
pub mod quality;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use archive::{ArchiveReason, StepTransitionLog};
pub use order::{Order, Part};
pub use process::{PartType, Process, Step, Versioned};
pub use quality::{Document, ErrorReport};
pub use types::{ArchiveCascade, ArchiveReasonCode, EntityKind, EntityRef, OrderStatus, PartStatus};
