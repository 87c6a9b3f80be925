// ==========================================
// 零件制造跟踪系统 - CRM 集成层
// ==========================================
// 职责: 订单与外部 CRM 交易双向同步
// ==========================================

pub mod client;
pub mod snapshot;
pub mod sync;


pub use client::{CrmClient, CrmError, CrmResult, Deal};
pub use snapshot::{CrmSnapshot, SnapshotCrmClient};
pub use sync::{CrmSyncReport, CrmSyncService, PushOutcome};
