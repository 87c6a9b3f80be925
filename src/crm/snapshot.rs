// ==========================================
// 零件制造跟踪系统 - CRM 快照客户端
// ==========================================
// 职责: 以 JSON 快照文件充当 CRM 数据源（离线同步 / 命令行）
// 格式: { "deals": [Deal...], "associations": { deal_id: [公司...] } }
// ==========================================

use super::client::{CrmClient, CrmError, CrmResult, Deal};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 快照文件内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrmSnapshot {
    #[serde(default)]
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub associations: HashMap<String, Vec<String>>,
}

/// 基于快照文件的 CRM 客户端
///
/// 阶段更新写回同一文件
pub struct SnapshotCrmClient {
    path: PathBuf,
    snapshot: Mutex<CrmSnapshot>,
}

impl SnapshotCrmClient {
    /// 读取快照文件
    pub async fn load(path: impl AsRef<Path>) -> CrmResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CrmError::RequestFailed(format!("{}: {}", path.display(), e)))?;
        let snapshot: CrmSnapshot =
            serde_json::from_str(&raw).map_err(|e| CrmError::InvalidResponse(e.to_string()))?;

        tracing::debug!(path = %path.display(), deals = snapshot.deals.len(), "CRM 快照已加载");
        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        })
    }

    fn lock(&self) -> CrmResult<std::sync::MutexGuard<'_, CrmSnapshot>> {
        self.snapshot
            .lock()
            .map_err(|e| CrmError::RequestFailed(format!("快照锁获取失败: {}", e)))
    }
}

#[async_trait]
impl CrmClient for SnapshotCrmClient {
    async fn fetch_deals(&self) -> CrmResult<Vec<Deal>> {
        Ok(self.lock()?.deals.clone())
    }

    async fn fetch_associations(&self, deal_ids: &[String]) -> CrmResult<HashMap<String, Vec<String>>> {
        let snapshot = self.lock()?;
        Ok(deal_ids
            .iter()
            .filter_map(|id| snapshot.associations.get(id).map(|c| (id.clone(), c.clone())))
            .collect())
    }

    async fn update_deal_stage(&self, deal_id: &str, stage: &str) -> CrmResult<()> {
        let serialized = {
            let mut snapshot = self.lock()?;
            let deal = snapshot
                .deals
                .iter_mut()
                .find(|d| d.id == deal_id)
                .ok_or_else(|| CrmError::DealNotFound(deal_id.to_string()))?;
            deal.stage = stage.to_string();
            serde_json::to_string_pretty(&*snapshot).map_err(|e| CrmError::InvalidResponse(e.to_string()))?
        };

        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(|e| CrmError::RequestFailed(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "deals": [
            { "id": "D-1", "name": "喷油器订单", "stage": "qualified", "pipeline": "default", "close_date": "2026-12-01" }
        ],
        "associations": { "D-1": ["Acme"] }
    }"#;

    fn snapshot_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_and_fetch() {
        let file = snapshot_file();
        let client = SnapshotCrmClient::load(file.path()).await.unwrap();

        let deals = client.fetch_deals().await.unwrap();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].close_date, chrono::NaiveDate::from_ymd_opt(2026, 12, 1));

        let associations = client
            .fetch_associations(&["D-1".to_string(), "D-2".to_string()])
            .await
            .unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations["D-1"], vec!["Acme".to_string()]);
    }

    #[tokio::test]
    async fn test_stage_update_is_written_back() {
        let file = snapshot_file();
        let client = SnapshotCrmClient::load(file.path()).await.unwrap();
        client.update_deal_stage("D-1", "closedwon").await.unwrap();

        let reloaded = SnapshotCrmClient::load(file.path()).await.unwrap();
        assert_eq!(reloaded.fetch_deals().await.unwrap()[0].stage, "closedwon");

        let err = client.update_deal_stage("D-404", "x").await.unwrap_err();
        assert!(matches!(err, CrmError::DealNotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let result = SnapshotCrmClient::load(file.path()).await;
        assert!(matches!(result, Err(CrmError::InvalidResponse(_))));
    }
}
