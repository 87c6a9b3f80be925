// ==========================================
// 零件制造跟踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ArchiveApi, ImportApi, OrderApi, PartApi, ProcessApi};
use crate::config::ConfigManager;
use crate::crm::{CrmClient, CrmSyncService};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::repository::{
    ActionLogRepository, ArchiveRepository, DocumentRepository, ErrorReportRepository,
    OrderRepository, PartRepository, PartTypeRepository, ProcessRepository, StepRepository,
    StepTransitionRepository,
};

/// 应用状态
///
/// 所有仓储共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 零件类型/工艺流程/工序API
    pub process_api: Arc<ProcessApi>,

    /// 零件API（工序推进、质量报告、文档）
    pub part_api: Arc<PartApi>,

    /// 订单API
    pub order_api: Arc<OrderApi>,

    /// 归档API
    pub archive_api: Arc<ArchiveApi>,

    /// CSV 导入导出API
    pub import_api: Arc<ImportApi>,

    /// 订单仓储（CRM 同步使用）
    pub order_repo: Arc<OrderRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        let part_type_repo = Arc::new(PartTypeRepository::new(conn.clone()));
        let process_repo = Arc::new(ProcessRepository::new(conn.clone()));
        let step_repo = Arc::new(StepRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let part_repo = Arc::new(PartRepository::new(conn.clone()));
        let transition_repo = Arc::new(StepTransitionRepository::new(conn.clone()));
        let archive_repo = Arc::new(ArchiveRepository::new(conn.clone()));
        let error_report_repo = Arc::new(ErrorReportRepository::new(conn.clone()));
        let document_repo = Arc::new(DocumentRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================

        let process_api = Arc::new(ProcessApi::new(
            part_type_repo.clone(),
            process_repo.clone(),
            step_repo.clone(),
            action_log_repo.clone(),
        ));

        let part_api = Arc::new(PartApi::new(
            part_repo.clone(),
            step_repo.clone(),
            transition_repo,
            error_report_repo,
            document_repo,
            action_log_repo.clone(),
        ));

        let order_api = Arc::new(OrderApi::new(
            order_repo.clone(),
            part_repo.clone(),
            part_type_repo.clone(),
            process_repo,
            step_repo.clone(),
            action_log_repo.clone(),
        ));

        let archive_api = Arc::new(ArchiveApi::new(
            archive_repo,
            order_repo.clone(),
            part_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        let import_api = Arc::new(ImportApi::new(
            order_repo.clone(),
            part_repo,
            part_type_repo,
            step_repo,
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            process_api,
            part_api,
            order_api,
            archive_api,
            import_api,
            order_repo,
            action_log_repo,
            config_manager,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// 基于给定 CRM 客户端构建同步服务
    pub fn crm_sync(&self, client: Arc<dyn CrmClient>) -> CrmSyncService {
        CrmSyncService::new(
            client,
            self.order_repo.clone(),
            self.action_log_repo.clone(),
            self.config_manager.clone(),
        )
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 PART_TRACKER_DB_PATH（非空时）
/// - 否则: 用户数据目录/part-tracker/part_tracker.db
/// - 无法获取数据目录时: ./part_tracker.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PART_TRACKER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./part_tracker.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("part-tracker");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("part_tracker.db");
        }
    }

    path.to_string_lossy().to_string()
}
