// ==========================================
// 零件制造跟踪系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表入口 ensure_schema（幂等）
// - 统一时间字段的文本格式
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 日期存储格式
pub const DATE_FMT: &str = "%Y-%m-%d";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库并建表（测试/演示用）
pub fn open_in_memory_with_schema() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 说明：
/// - part_type / process 的 previous_version_id 唯一：版本链只能线性延伸
/// - step (process_id, step_number) 唯一：重复生成工序会失败
/// - archive_reason (entity_kind, entity_id) 唯一：每个实体至多一条归档原因
/// - step_transition_log 通过触发器禁止 UPDATE/DELETE
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS part_type (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            id_prefix TEXT,
            version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
            previous_version_id INTEGER UNIQUE REFERENCES part_type(id),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS process (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            is_remanufactured INTEGER NOT NULL DEFAULT 0,
            num_steps INTEGER NOT NULL CHECK (num_steps >= 1),
            part_type_id INTEGER NOT NULL REFERENCES part_type(id),
            version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
            previous_version_id INTEGER UNIQUE REFERENCES process(id),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS step (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            process_id INTEGER NOT NULL REFERENCES process(id),
            step_number INTEGER NOT NULL CHECK (step_number >= 1),
            expected_duration_min INTEGER,
            description TEXT NOT NULL,
            is_last_step INTEGER NOT NULL DEFAULT 0,
            UNIQUE (process_id, step_number)
        );

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            customer TEXT,
            estimated_completion TEXT,
            status TEXT NOT NULL DEFAULT 'PENDING',
            archived INTEGER NOT NULL DEFAULT 0,
            crm_deal_id TEXT UNIQUE,
            deal_stage TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS part (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            erp_id TEXT NOT NULL,
            part_type_id INTEGER REFERENCES part_type(id),
            step_id INTEGER REFERENCES step(id),
            order_id INTEGER NOT NULL REFERENCES orders(id),
            status TEXT NOT NULL DEFAULT 'PENDING',
            archived INTEGER NOT NULL DEFAULT 0,
            assigned_emp TEXT,
            estimated_completion TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_part_order ON part(order_id);

        CREATE TABLE IF NOT EXISTS archive_reason (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_kind TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            reason TEXT NOT NULL,
            notes TEXT,
            archived_by TEXT NOT NULL,
            archived_at TEXT NOT NULL,
            UNIQUE (entity_kind, entity_id)
        );

        CREATE TABLE IF NOT EXISTS step_transition_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_id INTEGER NOT NULL REFERENCES part(id),
            step_id INTEGER NOT NULL REFERENCES step(id),
            operator TEXT NOT NULL,
            transitioned_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_step_transition_part ON step_transition_log(part_id);

        CREATE TRIGGER IF NOT EXISTS trg_step_transition_no_update
        BEFORE UPDATE ON step_transition_log
        BEGIN
            SELECT RAISE(ABORT, 'step_transition_log is append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS trg_step_transition_no_delete
        BEFORE DELETE ON step_transition_log
        BEGIN
            SELECT RAISE(ABORT, 'step_transition_log is append-only');
        END;

        CREATE TABLE IF NOT EXISTS error_report (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_id INTEGER NOT NULL REFERENCES part(id),
            step_id INTEGER REFERENCES step(id),
            machine TEXT,
            operator TEXT NOT NULL,
            description TEXT NOT NULL,
            errors_json TEXT NOT NULL,
            reported_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS document (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_id INTEGER NOT NULL REFERENCES part(id),
            file_name TEXT NOT NULL,
            is_image INTEGER NOT NULL DEFAULT 0,
            storage_path TEXT NOT NULL UNIQUE,
            uploaded_by TEXT NOT NULL,
            uploaded_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            entity_kind TEXT,
            entity_id INTEGER,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_entity ON action_log(entity_kind, entity_id);
        CREATE INDEX IF NOT EXISTS idx_action_log_actor_ts ON action_log(actor, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

// ==========================================
// 时间字段读写辅助
// ==========================================

/// 时间戳 → 存储文本
pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FMT).to_string()
}

/// 日期 → 存储文本
pub fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// 读取时间戳列（格式错误映射为 FromSqlConversionFailure）
pub fn get_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 读取可空日期列（格式错误视为空）
pub fn get_opt_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = open_in_memory_with_schema().unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_read_schema_version_without_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_in_memory_with_schema().unwrap();
        let result = conn.execute(
            "INSERT INTO step (process_id, step_number, description, is_last_step) VALUES (999, 1, 'x', 1)",
            [],
        );
        assert!(result.is_err());
    }
}
