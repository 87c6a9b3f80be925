// ==========================================
// 零件制造跟踪系统 - CRM 同步服务
// ==========================================
// 方向:
// - 拉取: sync_deals（交易 → 订单）
// - 推送: push_order_status（订单状态 → 交易阶段，映射见配置）
// - Webhook: apply_stage_change（交易阶段 → 订单）
// ==========================================

use crate::api::audit::record_action;
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::crm::client::{CrmClient, Deal};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::Order;
use crate::domain::types::EntityRef;
use crate::repository::{ActionLogRepository, OrderRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

const WEBHOOK_ACTOR: &str = "crm-webhook";

/// 同步结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmSyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// 推送结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushOutcome {
    Pushed { stage: String },
    Skipped { reason: String },
}

// ==========================================
// CrmSyncService
// ==========================================
pub struct CrmSyncService {
    client: Arc<dyn CrmClient>,
    order_repo: Arc<OrderRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
}

impl CrmSyncService {
    pub fn new(
        client: Arc<dyn CrmClient>,
        order_repo: Arc<OrderRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            client,
            order_repo,
            action_log_repo,
            config_manager,
        }
    }

    /// 拉取全部交易并同步到订单
    ///
    /// # 规则
    /// - 未知交易: 新建订单（客户取第一个关联公司）
    /// - 已知交易: 刷新名称、阶段与预计完成日期
    /// - 已归档订单: 只读，计入 unchanged
    #[instrument(skip(self))]
    pub async fn sync_deals(&self, actor: &str) -> ApiResult<CrmSyncReport> {
        let deals = self.client.fetch_deals().await?;
        let deal_ids: Vec<String> = deals.iter().map(|d| d.id.clone()).collect();
        let associations = self.client.fetch_associations(&deal_ids).await?;

        let mut report = CrmSyncReport {
            fetched: deals.len(),
            ..Default::default()
        };

        for deal in &deals {
            let customer = associations
                .get(&deal.id)
                .and_then(|companies| companies.first())
                .cloned();

            match self.order_repo.find_by_crm_deal_id(&deal.id)? {
                None => {
                    let order = order_from_deal(deal, customer);
                    let id = self.order_repo.create(&order)?;
                    tracing::info!(order_id = id, deal_id = %deal.id, "CRM 交易已创建订单");
                    report.created += 1;
                }
                Some(order) if order.archived => {
                    tracing::warn!(order_id = ?order.id, deal_id = %deal.id, "订单已归档，跳过 CRM 刷新");
                    report.unchanged += 1;
                }
                Some(mut order) => {
                    if !refresh_from_deal(&mut order, deal, customer) {
                        report.unchanged += 1;
                        continue;
                    }
                    self.order_repo.update(&order)?;
                    report.updated += 1;
                }
            }
        }

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::CrmSync, actor).with_payload(&report),
        );

        tracing::info!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            "CRM 同步完成"
        );
        Ok(report)
    }

    /// 推送订单状态到 CRM
    ///
    /// # 规则
    /// - 订单未关联交易、已归档或状态无阶段映射时跳过
    #[instrument(skip(self))]
    pub async fn push_order_status(&self, order_id: i64, actor: &str) -> ApiResult<PushOutcome> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))?;

        let Some(deal_id) = order.crm_deal_id.as_deref() else {
            return Ok(PushOutcome::Skipped {
                reason: "订单未关联 CRM 交易".to_string(),
            });
        };
        if order.archived {
            return Ok(PushOutcome::Skipped {
                reason: "订单已归档".to_string(),
            });
        }

        let stage = match self
            .config_manager
            .crm_stage_for(order.status)
            .map_err(|e| ApiError::InternalError(format!("读取 CRM 阶段配置失败: {}", e)))?
        {
            Some(stage) => stage,
            None => {
                tracing::warn!(order_id, status = %order.status, "订单状态无 CRM 阶段映射，跳过推送");
                return Ok(PushOutcome::Skipped {
                    reason: format!("状态{}无阶段映射", order.status),
                });
            }
        };

        self.client.update_deal_stage(deal_id, &stage).await?;
        self.order_repo.update_deal_stage(order_id, &stage)?;

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::CrmPush, actor)
                .with_entity(EntityRef::order(order_id))
                .with_payload(&serde_json::json!({ "deal_id": deal_id, "stage": stage })),
        );

        Ok(PushOutcome::Pushed { stage })
    }

    /// Webhook: 交易阶段变更
    #[instrument(skip(self))]
    pub fn apply_stage_change(&self, deal_id: &str, stage: &str) -> ApiResult<Order> {
        let order = self
            .order_repo
            .find_by_crm_deal_id(deal_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CRM 交易{}无对应订单", deal_id)))?;
        let order_id = order
            .id
            .ok_or_else(|| ApiError::InternalError("订单缺少 id".to_string()))?;
        if order.archived {
            return Err(ApiError::InvalidState(format!("订单(id={})已归档，不接受阶段变更", order_id)));
        }

        self.order_repo.update_deal_stage(order_id, stage)?;

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::CrmSync, WEBHOOK_ACTOR)
                .with_entity(EntityRef::order(order_id))
                .with_payload(&serde_json::json!({ "deal_id": deal_id, "stage": stage })),
        );

        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }
}

fn order_from_deal(deal: &Deal, customer: Option<String>) -> Order {
    let mut order = Order::new(deal.name.clone(), customer);
    order.crm_deal_id = Some(deal.id.clone());
    order.deal_stage = Some(deal.stage.clone());
    order.estimated_completion = deal.close_date;
    order
}

/// 用交易数据刷新订单，返回是否有变化
fn refresh_from_deal(order: &mut Order, deal: &Deal, customer: Option<String>) -> bool {
    let mut changed = false;

    if order.name != deal.name {
        order.name = deal.name.clone();
        changed = true;
    }
    if order.deal_stage.as_deref() != Some(deal.stage.as_str()) {
        order.deal_stage = Some(deal.stage.clone());
        changed = true;
    }
    if deal.close_date.is_some() && order.estimated_completion != deal.close_date {
        order.estimated_completion = deal.close_date;
        changed = true;
    }
    if order.customer.is_none() && customer.is_some() {
        order.customer = customer;
        changed = true;
    }

    changed
}
