// ==========================================
// 零件制造跟踪系统 - 归档规划引擎
// ==========================================
// 职责: 根据级联策略生成待写入的 ArchiveReason 列表
// 落库: ArchiveRepository::archive_all（单事务，幂等）
// ==========================================

use crate::domain::archive::ArchiveReason;
use crate::domain::order::{Order, Part};
use crate::domain::types::{ArchiveCascade, ArchiveReasonCode, EntityRef};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// 归档结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveOutcome {
    Archived,
    AlreadyArchived, // 此前已归档，保留首条归档原因
}

impl ArchiveOutcome {
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            ArchiveOutcome::Archived
        } else {
            ArchiveOutcome::AlreadyArchived
        }
    }
}

/// 归档请求（原因、备注、操作人）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub reason: ArchiveReasonCode,
    pub notes: Option<String>,
    pub user: String,
}

impl ArchiveRequest {
    fn reason_for(&self, target: EntityRef) -> ArchiveReason {
        ArchiveReason::new(target, self.reason, self.notes.clone(), self.user.clone())
    }
}

#[derive(Debug, Default)]
pub struct ArchivePlanner;

impl ArchivePlanner {
    pub fn new() -> Self {
        Self
    }

    /// 单个实体归档
    pub fn plan_single(&self, target: EntityRef, request: &ArchiveRequest) -> EngineResult<ArchiveReason> {
        validate_user(request)?;
        Ok(request.reason_for(target))
    }

    /// 订单归档（订单在前，级联零件在后）
    ///
    /// # 说明
    /// - Parts 策略只包含未归档零件，已归档零件保留原有归档原因
    /// - 订单已归档时只包含订单本身（重复归档为 no-op，不再级联）
    /// - parts 必须属于该订单
    pub fn plan_order(
        &self,
        order: &Order,
        parts: &[Part],
        cascade: ArchiveCascade,
        request: &ArchiveRequest,
    ) -> EngineResult<Vec<ArchiveReason>> {
        validate_user(request)?;
        let order_id = order
            .id
            .ok_or_else(|| EngineError::InvalidState("订单未持久化，不能归档".to_string()))?;

        let mut plan = vec![request.reason_for(EntityRef::order(order_id))];

        if cascade == ArchiveCascade::Parts && !order.archived {
            for part in parts.iter().filter(|p| !p.archived) {
                if part.order_id != order_id {
                    return Err(EngineError::InvalidState(format!(
                        "零件{}不属于订单{}",
                        part.erp_id, order_id
                    )));
                }
                let part_id = part.id.ok_or_else(|| {
                    EngineError::InvalidState(format!("零件{}未持久化", part.erp_id))
                })?;
                plan.push(request.reason_for(EntityRef::part(part_id)));
            }
        }

        Ok(plan)
    }
}

fn validate_user(request: &ArchiveRequest) -> EngineResult<()> {
    if request.user.trim().is_empty() {
        return Err(EngineError::InvalidState("归档操作人不能为空".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EntityKind;

    fn request() -> ArchiveRequest {
        ArchiveRequest {
            reason: ArchiveReasonCode::Completed,
            notes: None,
            user: "alice".to_string(),
        }
    }

    fn order_with_parts() -> (Order, Vec<Part>) {
        let mut order = Order::new("批次".to_string(), None);
        order.id = Some(1);
        let parts = (1..=3)
            .map(|i| {
                let mut p = Part::new(format!("DI-{}", i), 1, 1, 1);
                p.id = Some(i);
                p.archived = i == 3;
                p
            })
            .collect();
        (order, parts)
    }

    #[test]
    fn test_plan_order_without_cascade() {
        let (order, parts) = order_with_parts();
        let plan = ArchivePlanner::new()
            .plan_order(&order, &parts, ArchiveCascade::None, &request())
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].target, EntityRef::order(1));
    }

    #[test]
    fn test_plan_order_cascades_to_active_parts() {
        let (order, parts) = order_with_parts();
        let plan = ArchivePlanner::new()
            .plan_order(&order, &parts, ArchiveCascade::Parts, &request())
            .unwrap();

        let part_targets: Vec<i64> = plan
            .iter()
            .filter(|r| r.target.kind == EntityKind::Part)
            .map(|r| r.target.id)
            .collect();
        assert_eq!(plan[0].target.kind, EntityKind::Order);
        assert_eq!(part_targets, vec![1, 2]);
    }

    #[test]
    fn test_plan_archived_order_does_not_cascade() {
        let (mut order, parts) = order_with_parts();
        order.archived = true;
        let plan = ArchivePlanner::new()
            .plan_order(&order, &parts, ArchiveCascade::Parts, &request())
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].target, EntityRef::order(1));
    }

    #[test]
    fn test_blank_user_rejected() {
        let mut req = request();
        req.user = "  ".to_string();
        let result = ArchivePlanner::new().plan_single(EntityRef::part(1), &req);
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }
}
