// ==========================================
// 零件制造跟踪系统 - 导入层
// ==========================================
// 职责: 零件 CSV 解析与导出
// ==========================================

pub mod error;
pub mod part_csv;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use part_csv::{ParsedPartCsv, PartCsvRow, RowReject};
