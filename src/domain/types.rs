// ==========================================
// 零件制造跟踪系统 - 领域类型定义
// ==========================================
// 状态枚举与多态实体标识
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 零件状态 (Part Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartStatus {
    Pending,    // 待开工
    InProgress, // 生产中
    Completed,  // 已完成
    OnHold,     // 暂停
    Cancelled,  // 已取消
}

impl PartStatus {
    /// 转换为数据库字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PartStatus::Pending => "PENDING",
            PartStatus::InProgress => "IN_PROGRESS",
            PartStatus::Completed => "COMPLETED",
            PartStatus::OnHold => "ON_HOLD",
            PartStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从数据库字符串解析（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(PartStatus::Pending),
            "IN_PROGRESS" => Some(PartStatus::InProgress),
            "COMPLETED" => Some(PartStatus::Completed),
            "ON_HOLD" => Some(PartStatus::OnHold),
            "CANCELLED" => Some(PartStatus::Cancelled),
            _ => None,
        }
    }

    /// 是否允许推进工序
    pub fn can_advance(&self) -> bool {
        matches!(
            self,
            PartStatus::Pending | PartStatus::InProgress | PartStatus::Completed
        )
    }
}

impl fmt::Display for PartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 订单状态 (Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl OrderStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::OnHold => "ON_HOLD",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "IN_PROGRESS" => Some(OrderStatus::InProgress),
            "COMPLETED" => Some(OrderStatus::Completed),
            "ON_HOLD" => Some(OrderStatus::OnHold),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 可归档实体类型 (Entity Kind)
// ==========================================
// 多态引用: (entity_kind, entity_id) 二元组
// 闭集合: 新增可归档实体时必须在此登记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Order,
    Part,
}

impl EntityKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EntityKind::Order => "ORDER",
            EntityKind::Part => "PART",
        }
    }

    /// 按名称解析实体类型（兼容 "orders"/"parts" 等复数写法）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORDER" | "ORDERS" => Some(EntityKind::Order),
            "PART" | "PARTS" => Some(EntityKind::Part),
            _ => None,
        }
    }

    /// 对应的数据表名
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Order => "orders",
            EntityKind::Part => "part",
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("未知实体类型: {}", s))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

/// 多态实体引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn order(id: i64) -> Self {
        Self {
            kind: EntityKind::Order,
            id,
        }
    }

    pub fn part(id: i64) -> Self {
        Self {
            kind: EntityKind::Part,
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

// ==========================================
// 归档原因代码 (Archive Reason Code)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveReasonCode {
    Completed, // 已完成
    UserError, // 录入错误
    Obsolete,  // 已废弃
    Other,     // 其他
}

impl ArchiveReasonCode {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ArchiveReasonCode::Completed => "COMPLETED",
            ArchiveReasonCode::UserError => "USER_ERROR",
            ArchiveReasonCode::Obsolete => "OBSOLETE",
            ArchiveReasonCode::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => Some(ArchiveReasonCode::Completed),
            "USER_ERROR" => Some(ArchiveReasonCode::UserError),
            "OBSOLETE" => Some(ArchiveReasonCode::Obsolete),
            "OTHER" => Some(ArchiveReasonCode::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 订单归档级联策略 (Archive Cascade)
// ==========================================
// None: 仅归档订单本身
// Parts: 同时归档订单下所有未归档零件（同一事务）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveCascade {
    #[default]
    None,
    Parts,
}

impl ArchiveCascade {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ArchiveCascade::None => "NONE",
            ArchiveCascade::Parts => "PARTS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(ArchiveCascade::None),
            "PARTS" => Some(ArchiveCascade::Parts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_status_round_trip_db_str() {
        for status in [
            PartStatus::Pending,
            PartStatus::InProgress,
            PartStatus::Completed,
            PartStatus::OnHold,
            PartStatus::Cancelled,
        ] {
            assert_eq!(PartStatus::parse(status.to_db_str()), Some(status));
        }
        assert_eq!(PartStatus::parse("in_progress"), Some(PartStatus::InProgress));
        assert_eq!(PartStatus::parse("DONE"), None);
    }

    #[test]
    fn test_entity_kind_parse_accepts_plural() {
        assert_eq!(EntityKind::parse("orders"), Some(EntityKind::Order));
        assert_eq!(EntityKind::parse("Part"), Some(EntityKind::Part));
        assert_eq!(EntityKind::parse("deal"), None);
        assert_eq!("parts".parse::<EntityKind>(), Ok(EntityKind::Part));
        assert!("deal".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_archive_cascade_default_is_none() {
        assert_eq!(ArchiveCascade::default(), ArchiveCascade::None);
        assert_eq!(ArchiveCascade::parse("parts"), Some(ArchiveCascade::Parts));
        assert_eq!(ArchiveCascade::parse("ALL"), None);
    }

    #[test]
    fn test_part_status_can_advance() {
        assert!(PartStatus::Pending.can_advance());
        assert!(!PartStatus::OnHold.can_advance());
        assert!(!PartStatus::Cancelled.can_advance());
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::order(7).to_string(), "ORDER#7");
    }
}
