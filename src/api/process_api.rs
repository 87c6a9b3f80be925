// ==========================================
// 零件制造跟踪系统 - 零件类型与工艺流程 API
// ==========================================
// 职责: 零件类型/流程的创建、版本化编辑、工序生成
// 红线: 已创建的零件类型/流程不可原地修改，编辑即生成新版本
// ==========================================

use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::audit::record_action;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::process::{PartType, Process, Step};
use crate::engine::StepGenerator;
use crate::repository::{ActionLogRepository, PartTypeRepository, ProcessRepository, StepRepository};

// ==========================================
// ProcessApi
// ==========================================
pub struct ProcessApi {
    part_type_repo: Arc<PartTypeRepository>,
    process_repo: Arc<ProcessRepository>,
    step_repo: Arc<StepRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    step_generator: StepGenerator,
}

impl ProcessApi {
    pub fn new(
        part_type_repo: Arc<PartTypeRepository>,
        process_repo: Arc<ProcessRepository>,
        step_repo: Arc<StepRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            part_type_repo,
            process_repo,
            step_repo,
            action_log_repo,
            step_generator: StepGenerator::new(),
        }
    }

    // ==========================================
    // 零件类型
    // ==========================================

    /// 新建零件类型
    pub fn create_part_type(&self, name: &str, id_prefix: Option<&str>) -> ApiResult<PartType> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("零件类型名称不能为空".to_string()));
        }
        let prefix = id_prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let saved = self
            .part_type_repo
            .create(&PartType::new(name.to_string(), prefix))?;
        info!(part_type_id = ?saved.id, name = %saved.name, "零件类型已创建");
        Ok(saved)
    }

    pub fn get_part_type(&self, id: i64) -> ApiResult<PartType> {
        self.part_type_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("零件类型(id={})不存在", id)))
    }

    /// 所有零件类型的最新版本
    pub fn list_part_types(&self) -> ApiResult<Vec<PartType>> {
        Ok(self.part_type_repo.list_latest()?)
    }

    /// 编辑零件类型（保存为新版本）
    #[instrument(skip(self, edited), fields(part_type_id = ?edited.id))]
    pub fn save_part_type_version(&self, edited: &PartType, actor: &str) -> ApiResult<PartType> {
        let saved = self.part_type_repo.save_as_new_version(edited)?;

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::NewVersion, actor)
                .with_entity_raw("PART_TYPE", saved.id.unwrap_or_default())
                .with_payload(&serde_json::json!({
                    "previous_version_id": saved.previous_version_id,
                    "version": saved.version,
                })),
        );
        info!(new_id = ?saved.id, version = saved.version, "零件类型新版本已保存");
        Ok(saved)
    }

    /// 版本历史（最新在前，终止于 version 1）
    pub fn part_type_history(&self, id: i64) -> ApiResult<Vec<PartType>> {
        let history = self.part_type_repo.history(id)?;
        if history.is_empty() {
            return Err(ApiError::NotFound(format!("零件类型(id={})不存在", id)));
        }
        Ok(history)
    }

    /// 同一版本链上的最新版本
    pub fn latest_part_type(&self, id: i64) -> ApiResult<PartType> {
        self.get_part_type(id)?;
        self.part_type_repo
            .find_latest_version(id)?
            .ok_or_else(|| ApiError::NotFound(format!("零件类型(id={})不存在", id)))
    }

    // ==========================================
    // 工艺流程
    // ==========================================

    /// 新建流程（不自动生成工序）
    pub fn create_process(
        &self,
        name: &str,
        part_type_id: i64,
        num_steps: i32,
        is_remanufactured: bool,
    ) -> ApiResult<Process> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("流程名称不能为空".to_string()));
        }
        if num_steps < 1 {
            return Err(ApiError::InvalidInput(format!(
                "工序数必须 ≥ 1，实际为{}",
                num_steps
            )));
        }
        self.get_part_type(part_type_id)?;

        let saved = self.process_repo.create(&Process::new(
            name.trim().to_string(),
            part_type_id,
            num_steps,
            is_remanufactured,
        ))?;
        info!(process_id = ?saved.id, part_type_id, num_steps, "流程已创建");
        Ok(saved)
    }

    pub fn get_process(&self, id: i64) -> ApiResult<Process> {
        self.process_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("流程(id={})不存在", id)))
    }

    pub fn list_processes(&self, part_type_id: i64) -> ApiResult<Vec<Process>> {
        Ok(self.process_repo.list_by_part_type(part_type_id)?)
    }

    /// 编辑流程（保存为新版本，新版本需重新生成工序）
    #[instrument(skip(self, edited), fields(process_id = ?edited.id))]
    pub fn save_process_version(&self, edited: &Process, actor: &str) -> ApiResult<Process> {
        if edited.num_steps < 1 {
            return Err(ApiError::InvalidInput(format!(
                "工序数必须 ≥ 1，实际为{}",
                edited.num_steps
            )));
        }
        let saved = self.process_repo.save_as_new_version(edited)?;

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::NewVersion, actor)
                .with_entity_raw("PROCESS", saved.id.unwrap_or_default())
                .with_payload(&serde_json::json!({
                    "previous_version_id": saved.previous_version_id,
                    "version": saved.version,
                })),
        );
        info!(new_id = ?saved.id, version = saved.version, "流程新版本已保存");
        Ok(saved)
    }

    pub fn process_history(&self, id: i64) -> ApiResult<Vec<Process>> {
        let history = self.process_repo.history(id)?;
        if history.is_empty() {
            return Err(ApiError::NotFound(format!("流程(id={})不存在", id)));
        }
        Ok(history)
    }

    pub fn latest_process(&self, id: i64) -> ApiResult<Process> {
        self.get_process(id)?;
        self.process_repo
            .find_latest_version(id)?
            .ok_or_else(|| ApiError::NotFound(format!("流程(id={})不存在", id)))
    }

    // ==========================================
    // 工序
    // ==========================================

    /// 为流程生成 1..N 道工序（单事务）
    ///
    /// # 错误
    /// - 重复生成: BusinessRuleViolation（唯一约束）
    #[instrument(skip(self))]
    pub fn generate_steps(&self, process_id: i64, actor: &str) -> ApiResult<Vec<Step>> {
        let process = self.get_process(process_id)?;
        let steps = self.step_generator.generate(&process)?;
        let saved = self.step_repo.insert_all(&steps)?;

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::GenerateSteps, actor)
                .with_entity_raw("PROCESS", process_id)
                .with_payload(&serde_json::json!({ "num_steps": saved.len() })),
        );
        info!(process_id, count = saved.len(), "工序已生成");
        Ok(saved)
    }

    pub fn list_steps(&self, process_id: i64) -> ApiResult<Vec<Step>> {
        Ok(self.step_repo.list_by_process(process_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_with_schema;
    use std::sync::Mutex;

    fn setup() -> (ProcessApi, Arc<ActionLogRepository>) {
        let conn = Arc::new(Mutex::new(open_in_memory_with_schema().unwrap()));
        let logs = Arc::new(ActionLogRepository::new(conn.clone()));
        let api = ProcessApi::new(
            Arc::new(PartTypeRepository::new(conn.clone())),
            Arc::new(ProcessRepository::new(conn.clone())),
            Arc::new(StepRepository::new(conn)),
            logs.clone(),
        );
        (api, logs)
    }

    #[test]
    fn test_generate_steps_once() {
        let (api, logs) = setup();
        let pt = api.create_part_type("喷油器", Some("DI")).unwrap();
        let process = api
            .create_process("Assembly", pt.id.unwrap(), 3, false)
            .unwrap();

        let steps = api.generate_steps(process.id.unwrap(), "alice").unwrap();
        let shape: Vec<(i32, bool)> = steps.iter().map(|s| (s.step_number, s.is_last_step)).collect();
        assert_eq!(shape, vec![(1, false), (2, false), (3, true)]);

        let again = api.generate_steps(process.id.unwrap(), "alice");
        assert!(matches!(again, Err(ApiError::BusinessRuleViolation(_))));
        assert_eq!(api.list_steps(process.id.unwrap()).unwrap().len(), 3);
        assert_eq!(logs.find_by_action_type("GenerateSteps", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_create_process_validation() {
        let (api, _) = setup();
        let pt = api.create_part_type("泵", None).unwrap();

        assert!(matches!(
            api.create_process("空", pt.id.unwrap(), 0, false),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.create_process("装配", 999, 2, false),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(api.create_part_type("  ", None), Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_version_edits_are_logged() {
        let (api, logs) = setup();
        let v1 = api.create_part_type("泵", None).unwrap();

        let mut edit = v1.clone();
        edit.name = "高压泵".to_string();
        let v2 = api.save_part_type_version(&edit, "bob").unwrap();
        assert_eq!(v2.version, 2);

        assert!(matches!(
            api.save_part_type_version(&v1, "bob"),
            Err(ApiError::VersionConflict(_))
        ));
        assert_eq!(api.latest_part_type(v1.id.unwrap()).unwrap().id, v2.id);
        assert_eq!(api.part_type_history(v2.id.unwrap()).unwrap().len(), 2);
        assert_eq!(logs.find_by_actor("bob", 10).unwrap().len(), 1);
    }
}
