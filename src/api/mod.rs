// ==========================================
// 零件制造跟踪系统 - API 层
// ==========================================
// 职责: 编排仓储与引擎，记录操作日志，提供业务接口
// ==========================================

pub(crate) mod audit;
pub mod archive_api;
pub mod error;
pub mod import_api;
pub mod order_api;
pub mod part_api;
pub mod process_api;

// 重导出核心类型
pub use archive_api::{ArchiveApi, OrderArchiveResult};
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse};
pub use order_api::{CustomerReport, LineItemRequest, OrderApi, OrderProgress, PartProgress};
pub use part_api::{AdvanceResult, PartApi, QualityErrorRequest};
pub use process_api::ProcessApi;
