// ==========================================
// 零件制造跟踪系统 - 零件 CSV 导入导出
// ==========================================
// 列: erp_id, part_type_id, step_id, status
// 行号: 表头为第 1 行
// 职责: 仅做格式解析；零件类型/工序归属校验在 API 层完成
// ==========================================

use crate::domain::order::Part;
use crate::domain::types::PartStatus;
use crate::importer::error::{ImportError, ImportResult};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const COL_ERP_ID: &str = "erp_id";
pub const COL_PART_TYPE_ID: &str = "part_type_id";
pub const COL_STEP_ID: &str = "step_id";
pub const COL_STATUS: &str = "status";

/// 解析成功的 CSV 行
#[derive(Debug, Clone, PartialEq)]
pub struct PartCsvRow {
    pub line: usize,
    pub erp_id: String,
    pub part_type_id: i64,
    pub step_id: i64,
    pub status: Option<PartStatus>, // 空值由导入方套用默认状态
}

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowReject {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedPartCsv {
    pub rows: Vec<PartCsvRow>,
    pub rejects: Vec<RowReject>,
}

/// 导出行
#[derive(Debug, Serialize)]
struct PartCsvRecord<'a> {
    erp_id: &'a str,
    part_type_id: Option<i64>,
    step_id: Option<i64>,
    status: &'static str,
}

struct ColumnIndex {
    erp_id: usize,
    part_type_id: usize,
    step_id: usize,
    status: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> ImportResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let require = |name: &str| find(name).ok_or_else(|| ImportError::MissingColumn(name.to_string()));

        Ok(Self {
            erp_id: require(COL_ERP_ID)?,
            part_type_id: require(COL_PART_TYPE_ID)?,
            step_id: require(COL_STEP_ID)?,
            status: find(COL_STATUS),
        })
    }
}

// ==========================================
// 导入
// ==========================================

/// 从 CSV 文件解析零件行
pub fn parse_file(path: &Path) -> ImportResult<ParsedPartCsv> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    if let Some(ext) = path.extension() {
        if !ext.eq_ignore_ascii_case("csv") {
            return Err(ImportError::UnsupportedFormat(ext.to_string_lossy().to_string()));
        }
    }

    let file = File::open(path)?;
    parse_reader(file)
}

/// 从任意输入流解析零件行
///
/// # 说明
/// - 表头缺少必需列直接返回错误
/// - 单行格式错误记入 rejects，不中断解析
/// - 完全空白的行跳过
pub fn parse_reader<R: Read>(reader: R) -> ImportResult<ParsedPartCsv> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // 允许行长度不一致
        .from_reader(reader);

    let columns = ColumnIndex::from_headers(reader.headers()?)?;
    let mut parsed = ParsedPartCsv::default();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        match parse_record(&record, &columns, line) {
            Ok(row) => parsed.rows.push(row),
            Err(reason) => parsed.rejects.push(RowReject { line, reason }),
        }
    }

    Ok(parsed)
}

fn parse_record(record: &StringRecord, columns: &ColumnIndex, line: usize) -> Result<PartCsvRow, String> {
    let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

    let erp_id = field(columns.erp_id);
    if erp_id.is_empty() {
        return Err(format!("{} 为空", COL_ERP_ID));
    }

    let part_type_id = parse_id(field(columns.part_type_id), COL_PART_TYPE_ID)?;
    let step_id = parse_id(field(columns.step_id), COL_STEP_ID)?;

    let status = match columns.status.map(field).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(
            PartStatus::parse(raw).ok_or_else(|| format!("无法识别的状态: {}", raw))?,
        ),
    };

    Ok(PartCsvRow {
        line,
        erp_id: erp_id.to_string(),
        part_type_id,
        step_id,
        status,
    })
}

fn parse_id(raw: &str, column: &str) -> Result<i64, String> {
    if raw.is_empty() {
        return Err(format!("{} 为空", column));
    }
    raw.parse::<i64>()
        .map_err(|_| format!("{} 不是整数: {}", column, raw))
}

// ==========================================
// 导出
// ==========================================

/// 将零件写入 CSV，返回写入行数
pub fn write_parts<W: Write>(writer: W, parts: &[Part]) -> ImportResult<usize> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    for part in parts {
        writer.serialize(PartCsvRecord {
            erp_id: &part.erp_id,
            part_type_id: part.part_type_id,
            step_id: part.step_id,
            status: part.status.to_db_str(),
        })?;
    }

    // 无数据时仍输出表头
    if parts.is_empty() {
        writer.write_record([COL_ERP_ID, COL_PART_TYPE_ID, COL_STEP_ID, COL_STATUS])?;
    }

    writer
        .flush()
        .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
    Ok(parts.len())
}

/// 导出零件到 CSV 文件
pub fn export_file(path: &Path, parts: &[Part]) -> ImportResult<usize> {
    let file = File::create(path).map_err(|e| ImportError::FileWriteError(e.to_string()))?;
    write_parts(file, parts)
}
