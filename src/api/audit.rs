// ==========================================
// 零件制造跟踪系统 - 操作日志记录
// ==========================================
// 说明: 日志写入失败只告警，不影响业务操作结果
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::ActionLogRepository;
use tracing::warn;

pub(crate) fn record_action(repo: &ActionLogRepository, log: ActionLog) {
    if let Err(e) = repo.insert(&log) {
        warn!(
            error = %e,
            action_type = %log.action_type,
            actor = %log.actor,
            "记录操作日志失败"
        );
    }
}
