// ==========================================
// 零件制造跟踪系统 - 订单行项目规划
// ==========================================
// 规则:
// - 流程必须属于零件类型
// - quantity ≥ 1
// - ERP 编号: <前缀>-<n>，n ∈ [start, start + quantity)
// - 新零件均位于流程第 1 道工序，状态 Pending
// ==========================================

use crate::domain::order::Part;
use crate::domain::process::{PartType, Process, Step};
use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct LineItemPlanner;

impl LineItemPlanner {
    pub fn new() -> Self {
        Self
    }

    /// 生成批量零件（未持久化）
    pub fn plan(
        &self,
        order_id: i64,
        part_type: &PartType,
        process: &Process,
        first_step: &Step,
        quantity: u32,
        enumeration_start: u32,
    ) -> EngineResult<Vec<Part>> {
        let part_type_id = part_type
            .id
            .ok_or_else(|| EngineError::InvalidState("零件类型未持久化".to_string()))?;

        if process.part_type_id != part_type_id {
            return Err(EngineError::InvalidState(format!(
                "流程{}不属于零件类型{}",
                process.name, part_type.name
            )));
        }
        if quantity == 0 {
            return Err(EngineError::InvalidState("数量至少为 1".to_string()));
        }
        if Some(first_step.process_id) != process.id || first_step.step_number != 1 {
            return Err(EngineError::InvalidState(format!(
                "工序{}不是流程{}的第一道工序",
                first_step.step_number, process.name
            )));
        }
        let step_id = first_step
            .id
            .ok_or_else(|| EngineError::InvalidState("工序未持久化".to_string()))?;

        let prefix = part_type.erp_prefix();
        let start = u64::from(enumeration_start);
        let parts = (start..start + u64::from(quantity))
            .map(|n| Part::new(format!("{}-{}", prefix, n), order_id, part_type_id, step_id))
            .collect();

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (PartType, Process, Step) {
        let mut pt = PartType::new("喷油器".to_string(), Some("DI".to_string()));
        pt.id = Some(1);
        let mut process = Process::new("装配".to_string(), 1, 2, false);
        process.id = Some(5);
        let step = Step {
            id: Some(50),
            process_id: 5,
            step_number: 1,
            expected_duration_min: None,
            description: "一".to_string(),
            is_last_step: false,
        };
        (pt, process, step)
    }

    #[test]
    fn test_plan_enumerates_erp_ids() {
        let (pt, process, step) = fixture();
        let parts = LineItemPlanner::new()
            .plan(9, &pt, &process, &step, 3, 10)
            .unwrap();

        let ids: Vec<&str> = parts.iter().map(|p| p.erp_id.as_str()).collect();
        assert_eq!(ids, vec!["DI-10", "DI-11", "DI-12"]);
        assert!(parts.iter().all(|p| p.step_id == Some(50) && p.order_id == 9));
    }

    #[test]
    fn test_prefix_falls_back_to_name() {
        let (mut pt, process, step) = fixture();
        pt.id_prefix = None;
        let parts = LineItemPlanner::new()
            .plan(9, &pt, &process, &step, 1, 1)
            .unwrap();
        assert_eq!(parts[0].erp_id, "喷油器-1");
    }

    #[test]
    fn test_rejects_foreign_process_and_zero_quantity() {
        let (pt, mut process, step) = fixture();
        let planner = LineItemPlanner::new();
        assert!(planner.plan(9, &pt, &process, &step, 0, 1).is_err());

        process.part_type_id = 2;
        assert!(matches!(
            planner.plan(9, &pt, &process, &step, 1, 1),
            Err(EngineError::InvalidState(_))
        ));
    }
}
