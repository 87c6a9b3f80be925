// ==========================================
// 零件制造跟踪系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 所有拒绝必须给出原因
// ==========================================

pub mod archival;
pub mod error;
pub mod line_items;
pub mod step_generator;
pub mod step_progression;

// 重导出核心引擎
pub use archival::{ArchiveOutcome, ArchivePlanner, ArchiveRequest};
pub use error::{EngineError, EngineResult};
pub use line_items::LineItemPlanner;
pub use step_generator::StepGenerator;
pub use step_progression::{AdvanceOutcome, StepProgressionEngine};
