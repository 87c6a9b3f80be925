// ==========================================
// 零件制造跟踪系统 - 归档 API
// ==========================================
// 规则:
// - 删除即归档；重复归档为 no-op，保留首条归档原因
// - 归档标记与归档原因同一事务写入
// - 订单级联策略: 显式传入，否则读取配置 archive.order_cascade
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::audit::record_action;
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::archive::ArchiveReason;
use crate::domain::types::{ArchiveCascade, EntityKind, EntityRef};
use crate::engine::{ArchiveOutcome, ArchivePlanner, ArchiveRequest};
use crate::repository::{ActionLogRepository, ArchiveRepository, OrderRepository, PartRepository};

/// 订单归档结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderArchiveResult {
    pub order: ArchiveOutcome,
    pub cascade: ArchiveCascade,
    pub parts_archived: usize,
}

// ==========================================
// ArchiveApi
// ==========================================
pub struct ArchiveApi {
    archive_repo: Arc<ArchiveRepository>,
    order_repo: Arc<OrderRepository>,
    part_repo: Arc<PartRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    planner: ArchivePlanner,
}

impl ArchiveApi {
    pub fn new(
        archive_repo: Arc<ArchiveRepository>,
        order_repo: Arc<OrderRepository>,
        part_repo: Arc<PartRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            archive_repo,
            order_repo,
            part_repo,
            action_log_repo,
            config_manager,
            planner: ArchivePlanner::new(),
        }
    }

    /// 归档单个实体（订单不级联）
    #[instrument(skip(self, request), fields(user = %request.user))]
    pub fn archive(&self, target: EntityRef, request: &ArchiveRequest) -> ApiResult<ArchiveOutcome> {
        let reason = self.planner.plan_single(target, request)?;
        let outcome = ArchiveOutcome::from_changed(self.archive_repo.archive(&reason)?);

        self.log_archive(target, request, outcome);
        info!(target = %target, outcome = ?outcome, "实体归档完成");
        Ok(outcome)
    }

    /// 归档零件
    pub fn archive_part(&self, part_id: i64, request: &ArchiveRequest) -> ApiResult<ArchiveOutcome> {
        self.archive(EntityRef::part(part_id), request)
    }

    /// 归档订单
    ///
    /// # 参数
    /// - cascade: None 时使用配置 archive.order_cascade（默认 NONE）
    #[instrument(skip(self, request), fields(user = %request.user))]
    pub fn archive_order(
        &self,
        order_id: i64,
        request: &ArchiveRequest,
        cascade: Option<ArchiveCascade>,
    ) -> ApiResult<OrderArchiveResult> {
        let cascade = match cascade {
            Some(c) => c,
            None => self
                .config_manager
                .archive_cascade()
                .map_err(|e| ApiError::InternalError(format!("读取归档级联配置失败: {}", e)))?,
        };

        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))?;
        // 已归档订单: no-op，不再级联零件
        let parts = match cascade {
            ArchiveCascade::Parts if !order.archived => self.part_repo.list_by_order(order_id, false)?,
            _ => Vec::new(),
        };

        let plan = self.planner.plan_order(&order, &parts, cascade, request)?;
        let changed = self.archive_repo.archive_all(&plan)?;

        let order_outcome = ArchiveOutcome::from_changed(changed.first().copied().unwrap_or(false));
        let parts_archived = plan
            .iter()
            .zip(&changed)
            .filter(|(r, c)| r.target.kind == EntityKind::Part && **c)
            .count();

        self.log_archive(EntityRef::order(order_id), request, order_outcome);
        info!(
            order_id,
            outcome = ?order_outcome,
            cascade = ?cascade,
            parts_archived,
            "订单归档完成"
        );

        Ok(OrderArchiveResult {
            order: order_outcome,
            cascade,
            parts_archived,
        })
    }

    /// 查询实体的归档原因
    pub fn get_archive_reason(&self, target: EntityRef) -> ApiResult<Option<ArchiveReason>> {
        Ok(self.archive_repo.find_reason(target)?)
    }

    pub fn list_archived(&self, kind: EntityKind) -> ApiResult<Vec<ArchiveReason>> {
        Ok(self.archive_repo.list_by_kind(kind)?)
    }

    fn log_archive(&self, target: EntityRef, request: &ArchiveRequest, outcome: ArchiveOutcome) {
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::Archive, &request.user)
                .with_entity(target)
                .with_payload(&serde_json::json!({
                    "reason": request.reason,
                    "notes": request.notes,
                    "outcome": outcome,
                })),
        );
    }
}
