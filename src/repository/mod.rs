// ==========================================
// 零件制造跟踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod archive_repo;
pub mod error;
pub mod order_repo;
pub mod part_repo;
pub mod part_type_repo;
pub mod process_repo;
pub mod quality_repo;
pub mod step_repo;
pub mod step_transition_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use archive_repo::ArchiveRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::OrderRepository;
pub use part_repo::PartRepository;
pub use part_type_repo::PartTypeRepository;
pub use process_repo::ProcessRepository;
pub use quality_repo::{DocumentRepository, ErrorReportRepository};
pub use step_repo::StepRepository;
pub use step_transition_repo::StepTransitionRepository;
