// ==========================================
// 零件制造跟踪系统 - 零件 API
// ==========================================
// 职责: 工序推进、质检、质量报告、文档元数据
// 红线: 零件更新与流转日志同一事务落库
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::audit::record_action;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::archive::StepTransitionLog;
use crate::domain::order::Part;
use crate::domain::quality::{Document, ErrorReport};
use crate::domain::types::EntityRef;
use crate::engine::{AdvanceOutcome, EngineError, StepProgressionEngine};
use crate::repository::{
    ActionLogRepository, DocumentRepository, ErrorReportRepository, PartRepository,
    StepRepository, StepTransitionRepository,
};

/// 推进结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResult {
    pub part: Part,
    pub outcome: AdvanceOutcome,
    pub transition: StepTransitionLog,
}

/// 质量报告请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityErrorRequest {
    pub step_id: Option<i64>,
    pub machine: Option<String>,
    pub description: String,
    pub errors: Vec<String>,
}

// ==========================================
// PartApi
// ==========================================
pub struct PartApi {
    part_repo: Arc<PartRepository>,
    step_repo: Arc<StepRepository>,
    transition_repo: Arc<StepTransitionRepository>,
    error_report_repo: Arc<ErrorReportRepository>,
    document_repo: Arc<DocumentRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    engine: StepProgressionEngine,
}

impl PartApi {
    pub fn new(
        part_repo: Arc<PartRepository>,
        step_repo: Arc<StepRepository>,
        transition_repo: Arc<StepTransitionRepository>,
        error_report_repo: Arc<ErrorReportRepository>,
        document_repo: Arc<DocumentRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            part_repo,
            step_repo,
            transition_repo,
            error_report_repo,
            document_repo,
            action_log_repo,
            engine: StepProgressionEngine::new(),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_part(&self, part_id: i64) -> ApiResult<Part> {
        self.part_repo
            .find_by_id(part_id)?
            .ok_or_else(|| ApiError::NotFound(format!("零件(id={})不存在", part_id)))
    }

    pub fn list_parts_by_order(&self, order_id: i64, include_archived: bool) -> ApiResult<Vec<Part>> {
        Ok(self.part_repo.list_by_order(order_id, include_archived)?)
    }

    pub fn list_active_parts(&self) -> ApiResult<Vec<Part>> {
        Ok(self.part_repo.list_active()?)
    }

    /// 零件流转记录（按时间升序）
    pub fn list_transitions(&self, part_id: i64) -> ApiResult<Vec<StepTransitionLog>> {
        self.get_part(part_id)?;
        Ok(self.transition_repo.list_by_part(part_id)?)
    }

    // ==========================================
    // 工序推进
    // ==========================================

    /// 推进零件到下一道工序
    ///
    /// # 规则
    /// - 当前为最后一道工序: 标记 Completed，工序不变
    /// - 否则移到同一流程的下一道工序，缺失时返回 MissingStep
    /// - 每次推进追加一条流转日志（与零件更新同一事务）
    ///
    /// # 错误
    /// - InvalidState: 缺少工序/零件类型、已归档、挂起/取消、工序与零件类型不符
    /// - OptimisticLockFailure: 并发推进
    #[instrument(skip(self))]
    pub fn advance(&self, part_id: i64, operator: &str) -> ApiResult<AdvanceResult> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let part = self.get_part(part_id)?;
        let (_, step_id) = self.engine.check_preconditions(&part)?;

        let current = self
            .step_repo
            .find_by_id(step_id)?
            .ok_or_else(|| EngineError::not_found("Step", step_id))?;
        let process = self
            .step_repo
            .find_owning_process(step_id)?
            .ok_or_else(|| EngineError::not_found("Process", current.process_id))?;
        self.engine.check_process_matches(&part, &process)?;

        let next = match self.engine.next_step_number(&current) {
            Some(number) => self.step_repo.find_by_number(current.process_id, number)?,
            None => None,
        };

        let (mut updated, outcome) = match self.engine.advance(&part, &current, next.as_ref()) {
            Ok(result) => result,
            Err(e) => {
                warn!(part_id, error = %e, "工序推进失败");
                return Err(e.into());
            }
        };

        let log_step_id = updated.step_id.unwrap_or(step_id);
        let transition = StepTransitionLog::new(part_id, log_step_id, operator.to_string());
        updated.revision = self.part_repo.save_transition(&updated, &transition)?;

        info!(
            part_id,
            erp_id = %updated.erp_id,
            from_step = step_id,
            to_step = log_step_id,
            outcome = ?outcome,
            "零件工序已推进"
        );

        Ok(AdvanceResult {
            part: updated,
            outcome,
            transition,
        })
    }

    /// 质检通过（推进零件并记录质检人）
    pub fn record_qa_pass(&self, part_id: i64, operator: &str) -> ApiResult<AdvanceResult> {
        self.advance(part_id, operator)
    }

    // ==========================================
    // 质量报告
    // ==========================================

    /// 上报质量问题
    ///
    /// # 规则
    /// - 至少包含一个错误项
    /// - step_id 缺省时使用零件当前工序
    #[instrument(skip(self, request), fields(error_count = request.errors.len()))]
    pub fn report_quality_error(
        &self,
        part_id: i64,
        operator: &str,
        request: QualityErrorRequest,
    ) -> ApiResult<ErrorReport> {
        let errors: Vec<String> = request
            .errors
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if errors.is_empty() {
            return Err(ApiError::InvalidInput("质量报告至少需要一个错误项".to_string()));
        }

        let part = self.get_part(part_id)?;
        let mut report = ErrorReport {
            id: None,
            part_id,
            step_id: request.step_id.or(part.step_id),
            machine: request.machine,
            operator: operator.to_string(),
            description: request.description,
            errors,
            reported_at: chrono::Local::now().naive_local(),
        };
        report.id = Some(self.error_report_repo.insert(&report)?);

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::QualityReport, operator)
                .with_entity(EntityRef::part(part_id))
                .with_payload(&report.errors),
        );
        info!(part_id, report_id = ?report.id, "质量问题已上报");
        Ok(report)
    }

    pub fn list_error_reports(&self, part_id: i64) -> ApiResult<Vec<ErrorReport>> {
        Ok(self.error_report_repo.list_by_part(part_id)?)
    }

    // ==========================================
    // 文档
    // ==========================================

    /// 登记零件文档元数据（文件内容由存储方保存到 storage_path）
    pub fn attach_document(&self, part_id: i64, file_name: &str, uploaded_by: &str) -> ApiResult<Document> {
        if file_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件名不能为空".to_string()));
        }
        self.get_part(part_id)?;

        let mut doc = Document::new(part_id, file_name.trim().to_string(), uploaded_by.to_string());
        doc.id = Some(self.document_repo.insert(&doc)?);
        info!(part_id, path = %doc.storage_path, "零件文档已登记");
        Ok(doc)
    }

    pub fn list_documents(&self, part_id: i64) -> ApiResult<Vec<Document>> {
        Ok(self.document_repo.list_by_part(part_id)?)
    }
}
