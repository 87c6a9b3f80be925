// ==========================================
// 零件制造跟踪系统 - CRM 协作方接口
// ==========================================
// 职责: 定义外部 CRM 的数据访问接口（HTTP 细节由实现方负责）
// ==========================================

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// CRM 交易
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub stage: String,
    pub pipeline: Option<String>,
    pub close_date: Option<NaiveDate>,
}

/// CRM 协作方错误
#[derive(Error, Debug)]
pub enum CrmError {
    #[error("CRM 请求失败: {0}")]
    RequestFailed(String),

    #[error("CRM 返回数据无法解析: {0}")]
    InvalidResponse(String),

    #[error("CRM 交易不存在: {0}")]
    DealNotFound(String),
}

pub type CrmResult<T> = Result<T, CrmError>;

// ==========================================
// CrmClient Trait
// ==========================================
// 实现者: 外部 HTTP 客户端；测试中使用内存实现
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// 拉取全部交易
    async fn fetch_deals(&self) -> CrmResult<Vec<Deal>>;

    /// 查询交易关联的公司名称
    ///
    /// # 返回
    /// - deal_id → 公司名称列表（无关联的交易可缺省）
    async fn fetch_associations(&self, deal_ids: &[String]) -> CrmResult<HashMap<String, Vec<String>>>;

    /// 更新交易阶段
    async fn update_deal_stage(&self, deal_id: &str, stage: &str) -> CrmResult<()>;
}
