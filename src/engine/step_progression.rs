// ==========================================
// 零件制造跟踪系统 - 工序推进引擎
// ==========================================
// 红线: Engine 不拼 SQL，当前/下一道工序由调用方加载后传入
// ==========================================
// 规则:
// - 零件必须有 step 与 part_type，否则 InvalidState
// - 已归档、挂起、取消的零件不可推进
// - 当前为最后一道工序 → Completed，工序不变
// - 否则移到同一流程的 step_number + 1，缺失则 MissingStep
// - Pending 零件推进后变为 InProgress
// ==========================================

use crate::domain::order::Part;
use crate::domain::process::{Process, Step};
use crate::domain::types::PartStatus;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// 推进结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvanceOutcome {
    Advanced,  // 已移到下一道工序
    Completed, // 已在最后一道工序，标记完工
}

// ==========================================
// StepProgressionEngine - 工序推进引擎
// ==========================================
#[derive(Debug, Default)]
pub struct StepProgressionEngine;

impl StepProgressionEngine {
    pub fn new() -> Self {
        Self
    }

    /// 前置校验
    ///
    /// # 返回
    /// - `Ok((part_type_id, step_id))`
    pub fn check_preconditions(&self, part: &Part) -> EngineResult<(i64, i64)> {
        let label = part_label(part);

        if part.archived {
            return Err(EngineError::InvalidState(format!("零件{}已归档，不能推进", label)));
        }
        if !part.status.can_advance() {
            return Err(EngineError::InvalidState(format!(
                "零件{}状态为{}，不能推进",
                label, part.status
            )));
        }

        let step_id = part
            .step_id
            .ok_or_else(|| EngineError::InvalidState(format!("零件{}未设置当前工序", label)))?;
        let part_type_id = part
            .part_type_id
            .ok_or_else(|| EngineError::InvalidState(format!("零件{}未设置零件类型", label)))?;

        Ok((part_type_id, step_id))
    }

    /// 校验当前工序所属流程与零件类型一致
    pub fn check_process_matches(&self, part: &Part, process: &Process) -> EngineResult<()> {
        if part.part_type_id != Some(process.part_type_id) {
            return Err(EngineError::InvalidState(format!(
                "零件{}的工序属于零件类型{}的流程，与零件类型{:?}不符",
                part_label(part),
                process.part_type_id,
                part.part_type_id
            )));
        }
        Ok(())
    }

    /// 需要加载的下一道工序序号（最后一道工序返回 None）
    pub fn next_step_number(&self, current: &Step) -> Option<i32> {
        if current.is_last_step {
            None
        } else {
            Some(current.step_number + 1)
        }
    }

    /// 推进零件
    ///
    /// # 参数
    /// - current: 零件当前工序
    /// - next: 同一流程中 step_number + 1 的工序（调用方查询，不存在传 None）
    ///
    /// # 返回
    /// - 更新后的零件（revision 不变，由仓储层递增）与推进结果
    pub fn advance(
        &self,
        part: &Part,
        current: &Step,
        next: Option<&Step>,
    ) -> EngineResult<(Part, AdvanceOutcome)> {
        let (_, step_id) = self.check_preconditions(part)?;
        if current.id != Some(step_id) {
            return Err(EngineError::InvalidState(format!(
                "零件{}当前工序为{}，传入工序为{:?}",
                part_label(part),
                step_id,
                current.id
            )));
        }

        let mut updated = part.clone();

        if current.is_last_step {
            updated.status = PartStatus::Completed;
            return Ok((updated, AdvanceOutcome::Completed));
        }

        let expected_number = current.step_number + 1;
        let next = next
            .filter(|s| s.process_id == current.process_id && s.step_number == expected_number)
            .ok_or(EngineError::MissingStep {
                process_id: current.process_id,
                step_number: expected_number,
            })?;
        let next_id = next.id.ok_or_else(|| {
            EngineError::InvalidState(format!("工序{}未持久化", next.step_number))
        })?;

        updated.step_id = Some(next_id);
        updated.status = PartStatus::InProgress;
        Ok((updated, AdvanceOutcome::Advanced))
    }
}

fn part_label(part: &Part) -> String {
    match part.id {
        Some(id) => format!("{}(id={})", part.erp_id, id),
        None => part.erp_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: i64, number: i32, last: bool) -> Step {
        Step {
            id: Some(id),
            process_id: 1,
            step_number: number,
            expected_duration_min: None,
            description: format!("工序{}", number),
            is_last_step: last,
        }
    }

    fn part_at(step_id: i64) -> Part {
        let mut part = Part::new("DI-1".to_string(), 1, 10, step_id);
        part.id = Some(100);
        part
    }

    #[test]
    fn test_advance_moves_to_next_step() {
        let engine = StepProgressionEngine::new();
        let (s2, s3) = (step(2, 2, false), step(3, 3, true));

        let (part, outcome) = engine.advance(&part_at(2), &s2, Some(&s3)).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced);
        assert_eq!(part.step_id, Some(3));
        assert_eq!(part.status, PartStatus::InProgress);
    }

    #[test]
    fn test_advance_on_last_step_completes() {
        let engine = StepProgressionEngine::new();
        let s3 = step(3, 3, true);

        let (part, outcome) = engine.advance(&part_at(3), &s3, None).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Completed);
        assert_eq!(part.step_id, Some(3));
        assert_eq!(part.status, PartStatus::Completed);

        // 已完工零件再次推进仍为 Completed
        let (again, outcome) = engine.advance(&part, &s3, None).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Completed);
        assert_eq!(again.step_id, Some(3));
    }

    #[test]
    fn test_missing_next_step() {
        let engine = StepProgressionEngine::new();
        let s1 = step(1, 1, false);
        let wrong = step(9, 3, true);

        let err = engine.advance(&part_at(1), &s1, None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingStep { process_id: 1, step_number: 2 }
        ));

        // 序号不连续的工序不能作为下一道工序
        let err = engine.advance(&part_at(1), &s1, Some(&wrong)).unwrap_err();
        assert!(matches!(err, EngineError::MissingStep { .. }));
    }

    #[test]
    fn test_preconditions() {
        let engine = StepProgressionEngine::new();

        let mut no_step = part_at(1);
        no_step.step_id = None;
        assert!(matches!(
            engine.check_preconditions(&no_step),
            Err(EngineError::InvalidState(_))
        ));

        let mut no_type = part_at(1);
        no_type.part_type_id = None;
        assert!(matches!(
            engine.check_preconditions(&no_type),
            Err(EngineError::InvalidState(_))
        ));

        let mut on_hold = part_at(1);
        on_hold.status = PartStatus::OnHold;
        assert!(engine.check_preconditions(&on_hold).is_err());

        let mut archived = part_at(1);
        archived.archived = true;
        assert!(engine.check_preconditions(&archived).is_err());

        assert_eq!(engine.check_preconditions(&part_at(1)).unwrap(), (10, 1));
    }

    #[test]
    fn test_process_must_match_part_type() {
        let engine = StepProgressionEngine::new();
        let mut process = Process::new("装配".to_string(), 10, 3, false);
        assert!(engine.check_process_matches(&part_at(1), &process).is_ok());

        process.part_type_id = 11;
        assert!(matches!(
            engine.check_process_matches(&part_at(1), &process),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_next_step_number() {
        let engine = StepProgressionEngine::new();
        assert_eq!(engine.next_step_number(&step(1, 1, false)), Some(2));
        assert_eq!(engine.next_step_number(&step(3, 3, true)), None);
    }
}
