// ==========================================
// 零件制造跟踪系统 - 工序生成引擎
// ==========================================
// 规则: num_steps = N (N ≥ 1) → 工序 1..N，仅第 N 道为最后一道
// 落库: StepRepository::insert_all（单事务，重复生成触发唯一约束）
// ==========================================

use crate::domain::process::{Process, Step};
use crate::engine::error::{EngineError, EngineResult};
use tracing::instrument;

#[derive(Debug, Default)]
pub struct StepGenerator;

impl StepGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 为已持久化的流程生成工序定义
    #[instrument(skip(self, process), fields(process_id = ?process.id, num_steps = process.num_steps))]
    pub fn generate(&self, process: &Process) -> EngineResult<Vec<Step>> {
        let process_id = process
            .id
            .ok_or_else(|| EngineError::InvalidState("流程未持久化，不能生成工序".to_string()))?;

        if process.num_steps < 1 {
            return Err(EngineError::InvalidState(format!(
                "流程{}的工序数为{}，至少需要 1 道工序",
                process_id, process.num_steps
            )));
        }

        let steps = (1..=process.num_steps)
            .map(|n| Step {
                id: None,
                process_id,
                step_number: n,
                expected_duration_min: None,
                description: format!("{} 第{}道工序", process.name, n),
                is_last_step: n == process.num_steps,
            })
            .collect();

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_contiguous_steps() {
        let mut process = Process::new("Assembly".to_string(), 1, 3, false);
        process.id = Some(7);

        let steps = StepGenerator::new().generate(&process).unwrap();
        let shape: Vec<(i32, bool)> = steps.iter().map(|s| (s.step_number, s.is_last_step)).collect();
        assert_eq!(shape, vec![(1, false), (2, false), (3, true)]);
        assert!(steps.iter().all(|s| s.process_id == 7));
    }

    #[test]
    fn test_single_step_is_last() {
        let mut process = Process::new("单步".to_string(), 1, 1, false);
        process.id = Some(1);

        let steps = StepGenerator::new().generate(&process).unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_last_step);
    }

    #[test]
    fn test_rejects_unpersisted_or_empty() {
        let generator = StepGenerator::new();
        let process = Process::new("未保存".to_string(), 1, 3, false);
        assert!(matches!(generator.generate(&process), Err(EngineError::InvalidState(_))));

        let mut empty = Process::new("空".to_string(), 1, 0, false);
        empty.id = Some(2);
        assert!(matches!(generator.generate(&empty), Err(EngineError::InvalidState(_))));
    }
}
