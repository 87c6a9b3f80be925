// ==========================================
// 零件制造跟踪系统 - 订单数据仓储
// ==========================================
// 并发: update 带 revision 乐观锁检查
// 红线: 不提供物理删除，删除即归档 (见 ArchiveRepository)
// ==========================================

use crate::db::{fmt_date, fmt_ts, get_opt_date, get_ts};
use crate::domain::order::Order;
use crate::domain::types::OrderStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, name, customer, estimated_completion, status, archived, crm_deal_id, deal_stage, revision, created_at, updated_at";

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建订单
    ///
    /// # 返回
    /// - `Ok(id)`: 新订单id
    pub fn create(&self, order: &Order) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO orders (
                name, customer, estimated_completion, status, archived,
                crm_deal_id, deal_stage, revision, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &order.name,
                &order.customer,
                order.estimated_completion.as_ref().map(fmt_date),
                order.status.to_db_str(),
                order.archived,
                &order.crm_deal_id,
                &order.deal_stage,
                &order.revision,
                fmt_ts(&order.created_at),
                fmt_ts(&order.updated_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM orders WHERE id = ?"),
                params![id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 按 CRM 交易ID查询
    pub fn find_by_crm_deal_id(&self, deal_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM orders WHERE crm_deal_id = ?"),
                params![deal_id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询未归档订单
    pub fn list_active(&self) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM orders WHERE archived = 0 ORDER BY updated_at DESC, id DESC"
        ))?;

        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<Order>, _>>()?;

        Ok(rows)
    }

    /// 查询客户的订单
    pub fn list_by_customer(&self, customer: &str, include_archived: bool) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {SELECT_COLUMNS} FROM orders
               WHERE customer = ?1 AND (?2 = 1 OR archived = 0)
               ORDER BY updated_at DESC, id DESC"#
        ))?;

        let rows = stmt
            .query_map(params![customer, include_archived], map_row)?
            .collect::<Result<Vec<Order>, _>>()?;

        Ok(rows)
    }

    /// 更新订单 (带乐观锁检查)
    ///
    /// # 返回
    /// - `Ok(new_revision)`
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: revision 不匹配
    /// - `NotFound`: id 不存在
    pub fn update(&self, order: &Order) -> RepositoryResult<i32> {
        let id = order
            .id
            .ok_or_else(|| RepositoryError::ValidationError("订单未持久化".to_string()))?;
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE orders
               SET name = ?, customer = ?, estimated_completion = ?, status = ?,
                   crm_deal_id = ?, deal_stage = ?,
                   revision = revision + 1, updated_at = ?
               WHERE id = ? AND revision = ?"#,
            params![
                &order.name,
                &order.customer,
                order.estimated_completion.as_ref().map(fmt_date),
                order.status.to_db_str(),
                &order.crm_deal_id,
                &order.deal_stage,
                fmt_ts(&chrono::Local::now().naive_local()),
                id,
                &order.revision,
            ],
        )?;

        if rows_affected == 0 {
            return Err(revision_mismatch(&conn, id, order.revision));
        }

        Ok(order.revision + 1)
    }

    /// 仅更新 CRM 阶段（Webhook 路径，不校验 revision）
    pub fn update_deal_stage(&self, id: i64, stage: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE orders
               SET deal_stage = ?, revision = revision + 1, updated_at = ?
               WHERE id = ?"#,
            params![stage, fmt_ts(&chrono::Local::now().naive_local()), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Order", id));
        }
        Ok(())
    }
}

/// 区分记录不存在与 revision 冲突
fn revision_mismatch(conn: &Connection, id: i64, expected: i32) -> RepositoryError {
    let actual: Result<Option<i32>, _> = conn
        .query_row("SELECT revision FROM orders WHERE id = ?", params![id], |row| row.get(0))
        .optional();

    match actual {
        Ok(Some(actual)) => RepositoryError::OptimisticLockFailure {
            entity: "Order".to_string(),
            id,
            expected,
            actual,
        },
        Ok(None) => RepositoryError::not_found("Order", id),
        Err(e) => e.into(),
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Order> {
    let status_str: String = row.get(4)?;
    let status = OrderStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown order status: {}", status_str).into(),
        )
    })?;
    Ok(Order {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        customer: row.get(2)?,
        estimated_completion: get_opt_date(row, 3)?,
        status,
        archived: row.get::<_, i32>(5)? != 0,
        crm_deal_id: row.get(6)?,
        deal_stage: row.get(7)?,
        revision: row.get(8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}
