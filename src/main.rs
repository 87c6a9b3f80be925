// ==========================================
// 零件制造跟踪系统 - 命令行入口
// ==========================================
// 用法: part-tracker [--db PATH] [--actor NAME] <COMMAND>
// ==========================================

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use part_tracker::api::LineItemRequest;
use part_tracker::app::{get_default_db_path, AppState};
use part_tracker::crm::SnapshotCrmClient;
use part_tracker::engine::ArchiveRequest;
use part_tracker::{ArchiveCascade, ArchiveReasonCode};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "part-tracker")]
#[command(version, about = "零件制造跟踪系统")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 数据库文件路径（默认: 用户数据目录/part-tracker/part_tracker.db）
    #[arg(long, global = true, env = "PART_TRACKER_DB_PATH")]
    db: Option<String>,

    /// 操作人
    #[arg(long, global = true, env = "PART_TRACKER_ACTOR", default_value = "cli")]
    actor: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化数据库（幂等）
    Init,

    /// 新建零件类型
    PartType {
        name: String,
        /// ERP 编号前缀
        #[arg(long)]
        prefix: Option<String>,
    },

    /// 新建工艺流程并生成工序
    Process {
        part_type_id: i64,
        name: String,
        num_steps: i32,
        #[arg(long)]
        reman: bool,
    },

    /// 新建订单
    Order {
        name: String,
        #[arg(long)]
        customer: Option<String>,
    },

    /// 为订单批量新增零件
    LineItem {
        order_id: i64,
        part_type_id: i64,
        process_id: i64,
        quantity: u32,
        #[arg(long, default_value_t = 1)]
        start: u32,
    },

    /// 从 CSV 导入零件
    Import { order_id: i64, file: PathBuf },

    /// 导出零件到 CSV
    Export {
        file: PathBuf,
        #[arg(long)]
        order: Option<i64>,
    },

    /// 推进零件到下一道工序
    Advance { part_id: i64 },

    /// 归档零件
    ArchivePart {
        part_id: i64,
        #[arg(long, value_parser = parse_reason, default_value = "OTHER")]
        reason: ArchiveReasonCode,
        #[arg(long)]
        notes: Option<String>,
    },

    /// 归档订单
    ArchiveOrder {
        order_id: i64,
        #[arg(long, value_parser = parse_reason, default_value = "OTHER")]
        reason: ArchiveReasonCode,
        #[arg(long)]
        notes: Option<String>,
        /// NONE / PARTS（缺省读取配置 archive.order_cascade）
        #[arg(long, value_parser = parse_cascade)]
        cascade: Option<ArchiveCascade>,
    },

    /// 从 CRM 快照同步交易到订单
    CrmSync {
        /// JSON 快照文件
        snapshot: PathBuf,
    },

    /// 推送订单状态到 CRM 快照
    CrmPush { order_id: i64, snapshot: PathBuf },

    /// 客户订单进度报表
    Report { customer: String },

    /// 最近的操作日志
    Log {
        #[arg(long, default_value_t = 20)]
        limit: i32,
    },
}

fn parse_reason(s: &str) -> Result<ArchiveReasonCode, String> {
    ArchiveReasonCode::parse(s).ok_or_else(|| format!("未知归档原因: {}", s))
}

fn parse_cascade(s: &str) -> Result<ArchiveCascade, String> {
    ArchiveCascade::parse(s).ok_or_else(|| format!("未知级联策略: {}", s))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// CRM 命令使用单线程运行时
fn crm_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

fn main() -> Result<(), Box<dyn Error>> {
    part_tracker::logging::init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!("{} v{}，数据库: {}", part_tracker::APP_NAME, part_tracker::VERSION, db_path);

    let state = AppState::new(db_path)?;
    let actor = cli.actor.as_str();

    match cli.command {
        Commands::Init => {
            println!("数据库已就绪: {}", state.get_db_path());
        }
        Commands::PartType { name, prefix } => {
            print_json(&state.process_api.create_part_type(&name, prefix.as_deref())?)?;
        }
        Commands::Process {
            part_type_id,
            name,
            num_steps,
            reman,
        } => {
            let process = state
                .process_api
                .create_process(&name, part_type_id, num_steps, reman)?;
            let process_id = process
                .id
                .ok_or("工艺流程创建后缺少 id")?;
            let steps = state.process_api.generate_steps(process_id, actor)?;
            print_json(&serde_json::json!({ "process": process, "steps": steps }))?;
        }
        Commands::Order { name, customer } => {
            print_json(&state.order_api.create_order(&name, customer.as_deref(), None)?)?;
        }
        Commands::LineItem {
            order_id,
            part_type_id,
            process_id,
            quantity,
            start,
        } => {
            let request = LineItemRequest {
                part_type_id,
                process_id,
                quantity,
                enumeration_start: start,
            };
            print_json(&state.order_api.add_line_item(order_id, &request, actor)?)?;
        }
        Commands::Import { order_id, file } => {
            print_json(&state.import_api.import_parts_file(order_id, &file, actor)?)?;
        }
        Commands::Export { file, order } => {
            let count = state.import_api.export_parts_file(&file, order)?;
            println!("已导出 {} 个零件到 {}", count, file.display());
        }
        Commands::Advance { part_id } => {
            print_json(&state.part_api.advance(part_id, actor)?)?;
        }
        Commands::ArchivePart {
            part_id,
            reason,
            notes,
        } => {
            let request = ArchiveRequest {
                reason,
                notes,
                user: actor.to_string(),
            };
            print_json(&state.archive_api.archive_part(part_id, &request)?)?;
        }
        Commands::ArchiveOrder {
            order_id,
            reason,
            notes,
            cascade,
        } => {
            let request = ArchiveRequest {
                reason,
                notes,
                user: actor.to_string(),
            };
            print_json(&state.archive_api.archive_order(order_id, &request, cascade)?)?;
        }
        Commands::CrmSync { snapshot } => {
            let runtime = crm_runtime()?;
            let report = runtime.block_on(async {
                let client = SnapshotCrmClient::load(&snapshot).await?;
                state.crm_sync(Arc::new(client)).sync_deals(actor).await
            })?;
            print_json(&report)?;
        }
        Commands::CrmPush { order_id, snapshot } => {
            let runtime = crm_runtime()?;
            let outcome = runtime.block_on(async {
                let client = SnapshotCrmClient::load(&snapshot).await?;
                state.crm_sync(Arc::new(client)).push_order_status(order_id, actor).await
            })?;
            print_json(&outcome)?;
        }
        Commands::Report { customer } => {
            print_json(&state.order_api.customer_report(&customer)?)?;
        }
        Commands::Log { limit } => {
            print_json(&state.action_log_repo.find_recent(limit)?)?;
        }
    }

    Ok(())
}
