// ==========================================
// 零件制造跟踪系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 工艺流程版本管理 + 零件工序推进 + 归档审计
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - CSV 导入导出
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// CRM 集成 - 商机同步
pub mod crm;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ArchiveCascade, ArchiveReasonCode, EntityKind, EntityRef, OrderStatus, PartStatus,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, ArchiveReason, Document, ErrorReport, Order, Part, PartType, Process,
    Step, StepTransitionLog,
};

// 引擎
pub use engine::{ArchivePlanner, LineItemPlanner, StepGenerator, StepProgressionEngine};

// API
pub use api::{ArchiveApi, ImportApi, OrderApi, PartApi, ProcessApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "零件制造跟踪系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
