// ==========================================
// 零件制造跟踪系统 - 零件 CSV 导入导出 API
// ==========================================
// 导入规则:
// - 目标订单必须存在且未归档
// - 零件类型存在，工序存在且所属流程属于该零件类型
// - 状态为空时使用配置 import.default_status
// - Completed 零件必须位于最后一道工序
// - 合格行单事务写入；不合格行按行号返回
// ==========================================

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::audit::record_action;
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::Part;
use crate::domain::process::Step;
use crate::domain::types::{EntityRef, PartStatus};
use crate::importer::part_csv::{self, ParsedPartCsv, PartCsvRow, RowReject};
use crate::repository::{
    ActionLogRepository, OrderRepository, PartRepository, PartTypeRepository, StepRepository,
};

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 导入的零件数量
    pub imported: usize,
    /// 新零件 id（与合格行顺序一致）
    pub part_ids: Vec<i64>,
    /// 被拒绝的行
    pub rejects: Vec<RowReject>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi {
    order_repo: Arc<OrderRepository>,
    part_repo: Arc<PartRepository>,
    part_type_repo: Arc<PartTypeRepository>,
    step_repo: Arc<StepRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
}

impl ImportApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        part_repo: Arc<PartRepository>,
        part_type_repo: Arc<PartTypeRepository>,
        step_repo: Arc<StepRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            order_repo,
            part_repo,
            part_type_repo,
            step_repo,
            action_log_repo,
            config_manager,
        }
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 从 CSV 文件导入零件到订单
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn import_parts_file(&self, order_id: i64, path: &Path, actor: &str) -> ApiResult<ImportApiResponse> {
        let started = Instant::now();
        let parsed = part_csv::parse_file(path)?;
        self.import_parsed(order_id, parsed, actor, started)
    }

    /// 从输入流导入零件到订单
    pub fn import_parts<R: Read>(&self, order_id: i64, reader: R, actor: &str) -> ApiResult<ImportApiResponse> {
        let started = Instant::now();
        let parsed = part_csv::parse_reader(reader)?;
        self.import_parsed(order_id, parsed, actor, started)
    }

    fn import_parsed(
        &self,
        order_id: i64,
        parsed: ParsedPartCsv,
        actor: &str,
        started: Instant,
    ) -> ApiResult<ImportApiResponse> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))?;
        if order.archived {
            return Err(ApiError::InvalidState(format!("订单(id={})已归档，不能导入零件", order_id)));
        }

        let default_status = self
            .config_manager
            .default_import_status()
            .map_err(|e| ApiError::InternalError(format!("读取导入配置失败: {}", e)))?;

        let mut rejects = parsed.rejects;
        let mut parts = Vec::with_capacity(parsed.rows.len());
        let mut lookups = RowLookups::default();

        for row in parsed.rows {
            match self.validate_row(&row, &mut lookups) {
                Ok(step) => {
                    let status = row.status.unwrap_or(default_status);
                    if status == PartStatus::Completed && !step.is_last_step {
                        rejects.push(RowReject {
                            line: row.line,
                            reason: format!("工序{}不是最后一道工序，不能标记为 COMPLETED", row.step_id),
                        });
                        continue;
                    }

                    let mut part = Part::new(row.erp_id, order_id, row.part_type_id, row.step_id);
                    part.status = status;
                    parts.push(part);
                }
                Err(reason) => rejects.push(RowReject {
                    line: row.line,
                    reason,
                }),
            }
        }
        rejects.sort_by_key(|r| r.line);

        let part_ids = if parts.is_empty() {
            Vec::new()
        } else {
            self.part_repo.batch_create(&parts)?
        };

        if !rejects.is_empty() {
            warn!(order_id, rejected = rejects.len(), "部分 CSV 行被拒绝");
        }

        let response = ImportApiResponse {
            imported: part_ids.len(),
            part_ids,
            rejects,
            elapsed_ms: started.elapsed().as_millis() as i64,
        };

        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::ImportParts, actor)
                .with_entity(EntityRef::order(order_id))
                .with_payload(&serde_json::json!({
                    "imported": response.imported,
                    "rejected": response.rejects.len(),
                })),
        );
        info!(
            order_id,
            imported = response.imported,
            rejected = response.rejects.len(),
            elapsed_ms = response.elapsed_ms,
            "零件 CSV 导入完成"
        );
        Ok(response)
    }

    /// 校验单行，返回零件所在工序
    fn validate_row(&self, row: &PartCsvRow, lookups: &mut RowLookups) -> Result<Step, String> {
        let part_type_exists = match lookups.part_types.get(&row.part_type_id) {
            Some(exists) => *exists,
            None => {
                let exists = self
                    .part_type_repo
                    .find_by_id(row.part_type_id)
                    .map_err(|e| e.to_string())?
                    .is_some();
                lookups.part_types.insert(row.part_type_id, exists);
                exists
            }
        };
        if !part_type_exists {
            return Err(format!("零件类型{}不存在", row.part_type_id));
        }

        if !lookups.steps.contains_key(&row.step_id) {
            let step = self.step_repo.find_by_id(row.step_id).map_err(|e| e.to_string())?;
            let owner = self
                .step_repo
                .find_owning_process(row.step_id)
                .map_err(|e| e.to_string())?
                .map(|p| p.part_type_id);
            lookups.steps.insert(row.step_id, step.zip(owner));
        }

        match lookups.steps.get(&row.step_id) {
            Some(Some((step, owner))) if *owner == row.part_type_id => Ok(step.clone()),
            Some(Some((_, owner))) => Err(format!(
                "工序{}属于零件类型{}，与零件类型{}不符",
                row.step_id, owner, row.part_type_id
            )),
            _ => Err(format!("工序{}不存在", row.step_id)),
        }
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 导出零件（order_id 为空时导出所有未归档零件）
    pub fn export_parts<W: Write>(&self, writer: W, order_id: Option<i64>) -> ApiResult<usize> {
        let parts = self.parts_for_export(order_id)?;
        Ok(part_csv::write_parts(writer, &parts)?)
    }

    pub fn export_parts_file(&self, path: &Path, order_id: Option<i64>) -> ApiResult<usize> {
        let parts = self.parts_for_export(order_id)?;
        let count = part_csv::export_file(path, &parts)?;
        info!(path = %path.display(), count, "零件 CSV 已导出");
        Ok(count)
    }

    fn parts_for_export(&self, order_id: Option<i64>) -> ApiResult<Vec<Part>> {
        match order_id {
            Some(id) => {
                self.order_repo
                    .find_by_id(id)?
                    .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", id)))?;
                Ok(self.part_repo.list_by_order(id, false)?)
            }
            None => Ok(self.part_repo.list_active()?),
        }
    }
}

/// 导入过程中的查询缓存
#[derive(Default)]
struct RowLookups {
    part_types: HashMap<i64, bool>,
    steps: HashMap<i64, Option<(Step, i64)>>, // step_id → (工序, 所属零件类型)
}
