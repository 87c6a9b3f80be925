// ==========================================
// 零件制造跟踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::{fmt_ts, open_sqlite_connection};
use crate::domain::types::{ArchiveCascade, OrderStatus, PartStatus};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
            params![
                GLOBAL_SCOPE,
                key,
                value,
                fmt_ts(&chrono::Local::now().naive_local())
            ],
        )?;

        tracing::debug!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 归档配置 =====

    /// 订单归档时的默认级联策略
    ///
    /// # 返回
    /// - ArchiveCascade: 默认 NONE；无法识别的值记录告警后按 NONE 处理
    pub fn archive_cascade(&self) -> Result<ArchiveCascade, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ARCHIVE_ORDER_CASCADE, "NONE")?;
        Ok(ArchiveCascade::parse(&value).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::ARCHIVE_ORDER_CASCADE,
                raw_value = %value,
                "归档级联配置无法识别，使用 NONE"
            );
            ArchiveCascade::None
        }))
    }

    // ===== CRM 配置 =====

    /// 订单状态对应的 CRM 交易阶段
    ///
    /// # 返回
    /// - None: 未配置映射（推送时跳过）
    pub fn crm_stage_for(&self, status: OrderStatus) -> Result<Option<String>, Box<dyn Error>> {
        let key = config_keys::crm_stage_key(status);
        Ok(self
            .get_global_config_value(&key)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    // ===== 导入配置 =====

    /// CSV 行未填状态时使用的默认零件状态（默认 PENDING）
    pub fn default_import_status(&self) -> Result<PartStatus, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::IMPORT_DEFAULT_STATUS, "PENDING")?;
        Ok(PartStatus::parse(&value).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::IMPORT_DEFAULT_STATUS,
                raw_value = %value,
                "默认导入状态配置无法识别，使用 PENDING"
            );
            PartStatus::Pending
        }))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    use crate::domain::types::OrderStatus;

    // 归档
    pub const ARCHIVE_ORDER_CASCADE: &str = "archive.order_cascade";

    // CRM 阶段映射前缀 (crm.stage.<ORDER_STATUS>)
    pub const CRM_STAGE_PREFIX: &str = "crm.stage.";

    // 导入
    pub const IMPORT_DEFAULT_STATUS: &str = "import.default_status";

    pub fn crm_stage_key(status: OrderStatus) -> String {
        format!("{}{}", CRM_STAGE_PREFIX, status.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_with_schema;

    fn setup() -> ConfigManager {
        let conn = Arc::new(Mutex::new(open_in_memory_with_schema().unwrap()));
        ConfigManager::from_connection(conn).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = setup();
        assert_eq!(config.archive_cascade().unwrap(), ArchiveCascade::None);
        assert_eq!(config.default_import_status().unwrap(), PartStatus::Pending);
        assert_eq!(config.crm_stage_for(OrderStatus::Completed).unwrap(), None);
    }

    #[test]
    fn test_set_and_read_back() {
        let config = setup();
        config
            .set_global_config_value(config_keys::ARCHIVE_ORDER_CASCADE, "parts")
            .unwrap();
        config
            .set_global_config_value(&config_keys::crm_stage_key(OrderStatus::Completed), "closedwon")
            .unwrap();

        assert_eq!(config.archive_cascade().unwrap(), ArchiveCascade::Parts);
        assert_eq!(
            config.crm_stage_for(OrderStatus::Completed).unwrap().as_deref(),
            Some("closedwon")
        );

        // UPSERT 覆盖
        config
            .set_global_config_value(config_keys::ARCHIVE_ORDER_CASCADE, "NONE")
            .unwrap();
        assert_eq!(config.archive_cascade().unwrap(), ArchiveCascade::None);

        let snapshot: HashMap<String, String> =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_unrecognized_value_falls_back() {
        let config = setup();
        config
            .set_global_config_value(config_keys::IMPORT_DEFAULT_STATUS, "SHIPPED")
            .unwrap();
        assert_eq!(config.default_import_status().unwrap(), PartStatus::Pending);
    }
}
