// ==========================================
// 零件制造跟踪系统 - 订单 API
// ==========================================
// 职责: 订单维护、批量新增零件（行项目）、客户进度报表
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::audit::record_action;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{Order, Part};
use crate::domain::types::{EntityRef, PartStatus};
use crate::engine::LineItemPlanner;
use crate::repository::{
    ActionLogRepository, OrderRepository, PartRepository, PartTypeRepository, ProcessRepository,
    StepRepository,
};

/// 行项目请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub part_type_id: i64,
    pub process_id: i64,
    pub quantity: u32,
    pub enumeration_start: u32,
}

/// 零件进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartProgress {
    pub part_id: i64,
    pub erp_id: String,
    pub status: PartStatus,
    pub step_number: Option<i32>,
    pub num_steps: Option<i32>,
}

/// 订单进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProgress {
    pub order: Order,
    pub parts: Vec<PartProgress>,
}

/// 客户订单报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerReport {
    pub customer: String,
    pub orders: Vec<OrderProgress>,
}

// ==========================================
// OrderApi
// ==========================================
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    part_repo: Arc<PartRepository>,
    part_type_repo: Arc<PartTypeRepository>,
    process_repo: Arc<ProcessRepository>,
    step_repo: Arc<StepRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    planner: LineItemPlanner,
}

impl OrderApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        part_repo: Arc<PartRepository>,
        part_type_repo: Arc<PartTypeRepository>,
        process_repo: Arc<ProcessRepository>,
        step_repo: Arc<StepRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            order_repo,
            part_repo,
            part_type_repo,
            process_repo,
            step_repo,
            action_log_repo,
            planner: LineItemPlanner::new(),
        }
    }

    // ==========================================
    // 订单维护
    // ==========================================

    pub fn create_order(
        &self,
        name: &str,
        customer: Option<&str>,
        estimated_completion: Option<NaiveDate>,
    ) -> ApiResult<Order> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单名称不能为空".to_string()));
        }

        let mut order = Order::new(
            name.trim().to_string(),
            customer.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
        );
        order.estimated_completion = estimated_completion;
        order.id = Some(self.order_repo.create(&order)?);

        info!(order_id = ?order.id, name = %order.name, "订单已创建");
        Ok(order)
    }

    pub fn get_order(&self, order_id: i64) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    pub fn list_active_orders(&self) -> ApiResult<Vec<Order>> {
        Ok(self.order_repo.list_active()?)
    }

    /// 更新订单（调用方持有的 revision 必须为最新）
    ///
    /// # 错误
    /// - OptimisticLockFailure: 订单已被其他操作修改
    /// - InvalidState: 订单已归档
    pub fn update_order(&self, order: &Order) -> ApiResult<Order> {
        let order_id = order
            .id
            .ok_or_else(|| ApiError::InvalidInput("订单未持久化".to_string()))?;
        if self.get_order(order_id)?.archived {
            return Err(ApiError::InvalidState(format!("订单(id={})已归档", order_id)));
        }

        let mut updated = order.clone();
        updated.revision = self.order_repo.update(order)?;
        Ok(updated)
    }

    // ==========================================
    // 行项目
    // ==========================================

    /// 批量新增零件（位于流程第一道工序，单事务）
    #[instrument(skip(self, request), fields(
        part_type_id = request.part_type_id,
        process_id = request.process_id,
        quantity = request.quantity
    ))]
    pub fn add_line_item(&self, order_id: i64, request: &LineItemRequest, actor: &str) -> ApiResult<Vec<Part>> {
        let order = self.get_order(order_id)?;
        if order.archived {
            return Err(ApiError::InvalidState(format!("订单(id={})已归档", order_id)));
        }

        let part_type = self
            .part_type_repo
            .find_by_id(request.part_type_id)?
            .ok_or_else(|| ApiError::NotFound(format!("零件类型(id={})不存在", request.part_type_id)))?;
        let process = self
            .process_repo
            .find_by_id(request.process_id)?
            .ok_or_else(|| ApiError::NotFound(format!("流程(id={})不存在", request.process_id)))?;
        let first_step = self
            .step_repo
            .find_by_number(request.process_id, 1)?
            .ok_or(ApiError::MissingStep {
                process_id: request.process_id,
                step_number: 1,
            })?;

        let mut parts = self.planner.plan(
            order_id,
            &part_type,
            &process,
            &first_step,
            request.quantity,
            request.enumeration_start,
        )?;

        let ids = self.part_repo.batch_create(&parts)?;
        for (part, id) in parts.iter_mut().zip(ids) {
            part.id = Some(id);
        }

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::AddLineItem, actor)
                .with_entity(EntityRef::order(order_id))
                .with_payload(request),
        );
        info!(order_id, count = parts.len(), "行项目零件已创建");
        Ok(parts)
    }

    // ==========================================
    // 报表
    // ==========================================

    /// 客户订单进度报表（不含已归档订单与零件）
    pub fn customer_report(&self, customer: &str) -> ApiResult<CustomerReport> {
        let orders = self.order_repo.list_by_customer(customer, false)?;

        // step_id → (step_number, num_steps)
        let mut step_cache: HashMap<i64, Option<(i32, i32)>> = HashMap::new();
        let mut result = Vec::with_capacity(orders.len());

        for order in orders {
            let Some(order_id) = order.id else { continue };
            let parts = self.part_repo.list_by_order(order_id, false)?;

            let mut progress = Vec::with_capacity(parts.len());
            for part in parts {
                let position = match part.step_id {
                    Some(step_id) => self.step_position(step_id, &mut step_cache)?,
                    None => None,
                };
                progress.push(PartProgress {
                    part_id: part.id.unwrap_or_default(),
                    erp_id: part.erp_id,
                    status: part.status,
                    step_number: position.map(|(n, _)| n),
                    num_steps: position.map(|(_, total)| total),
                });
            }

            result.push(OrderProgress {
                order,
                parts: progress,
            });
        }

        Ok(CustomerReport {
            customer: customer.to_string(),
            orders: result,
        })
    }

    fn step_position(
        &self,
        step_id: i64,
        cache: &mut HashMap<i64, Option<(i32, i32)>>,
    ) -> ApiResult<Option<(i32, i32)>> {
        if let Some(cached) = cache.get(&step_id) {
            return Ok(*cached);
        }

        let step = self.step_repo.find_by_id(step_id)?;
        let process = self.step_repo.find_owning_process(step_id)?;
        let position = step.zip(process).map(|(s, p)| (s.step_number, p.num_steps));

        cache.insert(step_id, position);
        Ok(position)
    }
}
