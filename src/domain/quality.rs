// ==========================================
// 零件制造跟踪系统 - 质量与文档领域模型
// ==========================================
// ErrorReport: 质检不合格记录
// Document: 零件文档元数据（文件本体由外部存储负责）
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ErrorReport - 质量错误报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: Option<i64>,
    pub part_id: i64,
    pub step_id: Option<i64>,    // 报告时零件所在工序
    pub machine: Option<String>, // 设备
    pub operator: String,
    pub description: String,
    pub errors: Vec<String>, // 错误类型列表（至少一项）
    pub reported_at: NaiveDateTime,
}

// ==========================================
// Document - 零件文档
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<i64>,
    pub part_id: i64,
    pub file_name: String,
    pub is_image: bool,
    pub storage_path: String, // parts_docs/<uuid>_<file_name>
    pub uploaded_by: String,
    pub uploaded_at: NaiveDateTime,
}

impl Document {
    /// 构造文档元数据并分配存储路径
    pub fn new(part_id: i64, file_name: String, uploaded_by: String) -> Self {
        let storage_path = Self::storage_path_for(&file_name);
        let is_image = Self::looks_like_image(&file_name);
        Self {
            id: None,
            part_id,
            file_name,
            is_image,
            storage_path,
            uploaded_by,
            uploaded_at: chrono::Local::now().naive_local(),
        }
    }

    /// 存储路径: parts_docs/<uuid>_<file_name>
    pub fn storage_path_for(file_name: &str) -> String {
        let safe_name: String = file_name
            .trim()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!("parts_docs/{}_{}", uuid::Uuid::new_v4(), safe_name)
    }

    /// 按扩展名判断是否图片
    pub fn looks_like_image(file_name: &str) -> bool {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp")
    }
}
