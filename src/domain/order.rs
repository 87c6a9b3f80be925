// ==========================================
// 零件制造跟踪系统 - 订单与零件领域模型
// ==========================================
// 实体: Order (订单) / Part (零件)
// 约束: 可原地修改；删除即归档 (archived = true + ArchiveReason)
// 并发: revision 字段用于乐观锁
// ==========================================

use crate::domain::types::{OrderStatus, PartStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<i64>,
    pub name: String,
    pub customer: Option<String>,                // 客户账号
    pub estimated_completion: Option<NaiveDate>, // 预计完工日期
    pub status: OrderStatus,
    pub archived: bool,

    // ===== CRM 关联 =====
    pub crm_deal_id: Option<String>, // CRM 交易ID
    pub deal_stage: Option<String>,  // CRM 当前阶段

    pub revision: i32, // 乐观锁版本
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Order {
    pub fn new(name: String, customer: Option<String>) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: None,
            name,
            customer,
            estimated_completion: None,
            status: OrderStatus::Pending,
            archived: false,
            crm_deal_id: None,
            deal_stage: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// Part - 零件
// ==========================================
// 不变式: step 所属流程的 part_type_id == part.part_type_id
// 不变式: status == Completed 时 step.is_last_step == true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: Option<i64>,
    pub erp_id: String,            // ERP 编号
    pub part_type_id: Option<i64>, // 零件类型（具体版本）
    pub step_id: Option<i64>,      // 当前工序
    pub order_id: i64,             // 所属订单
    pub status: PartStatus,
    pub archived: bool,
    pub assigned_emp: Option<String>, // 负责员工
    pub estimated_completion: Option<NaiveDate>,
    pub revision: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Part {
    pub fn new(erp_id: String, order_id: i64, part_type_id: i64, step_id: i64) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: None,
            erp_id,
            part_type_id: Some(part_type_id),
            step_id: Some(step_id),
            order_id,
            status: PartStatus::Pending,
            archived: false,
            assigned_emp: None,
            estimated_completion: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
