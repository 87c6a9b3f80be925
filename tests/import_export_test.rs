// ==========================================
// CSV 导入导出集成测试
// ==========================================

use part_tracker::api::ApiError;
use part_tracker::config::config_keys;
use part_tracker::engine::ArchiveRequest;
use part_tracker::{ArchiveReasonCode, PartStatus};
use std::io::Write;

mod test_helpers;
use test_helpers::{create_process, create_test_state};

#[test]
fn test_import_csv_with_rejected_rows() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 3);
    let other = create_process(&state, "泵体", Some("PB"), "装配", 1);
    let order = state.order_api.create_order("导入批次", None, None).unwrap();
    let order_id = order.id.unwrap();

    let csv = format!(
        "erp_id,part_type_id,step_id,status\n\
         DI-1,{pt},{s1},\n\
         DI-2,{pt},{s2},IN_PROGRESS\n\
         DI-3,{pt},{s3},COMPLETED\n\
         DI-4,{pt},{s1},COMPLETED\n\
         DI-5,{pt},{foreign},\n\
         DI-6,999,{s1},\n\
         DI-7,{pt},{s1},BROKEN\n",
        pt = fx.part_type_id(),
        s1 = fx.step_id(1),
        s2 = fx.step_id(2),
        s3 = fx.step_id(3),
        foreign = other.step_id(1),
    );

    let response = state
        .import_api
        .import_parts(order_id, csv.as_bytes(), "importer")
        .unwrap();

    assert_eq!(response.imported, 3);
    assert_eq!(response.part_ids.len(), 3);
    let rejected_lines: Vec<usize> = response.rejects.iter().map(|r| r.line).collect();
    assert_eq!(rejected_lines, vec![5, 6, 7, 8]);

    let parts = state.part_api.list_parts_by_order(order_id, false).unwrap();
    let summary: Vec<(&str, PartStatus)> = parts.iter().map(|p| (p.erp_id.as_str(), p.status)).collect();
    assert_eq!(
        summary,
        vec![
            ("DI-1", PartStatus::Pending),
            ("DI-2", PartStatus::InProgress),
            ("DI-3", PartStatus::Completed),
        ]
    );

    let logs = state.action_log_repo.find_by_action_type("ImportParts", 10).unwrap();
    assert_eq!(logs.len(), 1);
}

#[test]
fn test_import_uses_configured_default_status() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 2);
    let order = state.order_api.create_order("导入批次", None, None).unwrap();

    state
        .config_manager
        .set_global_config_value(config_keys::IMPORT_DEFAULT_STATUS, "ON_HOLD")
        .unwrap();

    let csv = format!("erp_id,part_type_id,step_id\nDI-1,{},{}\n", fx.part_type_id(), fx.step_id(1));
    let response = state
        .import_api
        .import_parts(order.id.unwrap(), csv.as_bytes(), "importer")
        .unwrap();

    let part = state.part_api.get_part(response.part_ids[0]).unwrap();
    assert_eq!(part.status, PartStatus::OnHold);
}

#[test]
fn test_import_into_archived_order_is_rejected() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 2);
    let order = state.order_api.create_order("已归档", None, None).unwrap();
    let order_id = order.id.unwrap();
    state
        .archive_api
        .archive_order(
            order_id,
            &ArchiveRequest {
                reason: ArchiveReasonCode::Completed,
                notes: None,
                user: "alice".to_string(),
            },
            None,
        )
        .unwrap();

    let csv = format!("erp_id,part_type_id,step_id\nDI-1,{},{}\n", fx.part_type_id(), fx.step_id(1));
    let result = state.import_api.import_parts(order_id, csv.as_bytes(), "importer");
    assert!(matches!(result, Err(ApiError::InvalidState(_))));
}

#[test]
fn test_import_missing_column_fails_whole_file() {
    let (_temp_file, state) = create_test_state();
    let order = state.order_api.create_order("批次", None, None).unwrap();

    let result = state
        .import_api
        .import_parts(order.id.unwrap(), "erp_id,step_id\nDI-1,1\n".as_bytes(), "importer");
    assert!(matches!(result, Err(ApiError::ImportError(_))));
}

#[test]
fn test_import_file_then_export_file() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 2);
    let order = state.order_api.create_order("批次", None, None).unwrap();
    let order_id = order.id.unwrap();

    let mut input = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    write!(
        input,
        "erp_id,part_type_id,step_id,status\nDI-1,{pt},{s},\nDI-2,{pt},{s},\n",
        pt = fx.part_type_id(),
        s = fx.step_id(1)
    )
    .unwrap();
    input.flush().unwrap();

    let response = state
        .import_api
        .import_parts_file(order_id, input.path(), "importer")
        .unwrap();
    assert_eq!(response.imported, 2);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("parts.csv");
    let count = state.import_api.export_parts_file(&out, Some(order_id)).unwrap();
    assert_eq!(count, 2);

    let exported = std::fs::read_to_string(&out).unwrap();
    let mut lines = exported.lines();
    assert!(lines.next().unwrap().starts_with("erp_id,part_type_id,step_id,status"));
    assert_eq!(lines.filter(|l| l.starts_with("DI-")).count(), 2);

    // 导出的文件可以再次导入
    let second = state.order_api.create_order("复制批次", None, None).unwrap();
    let again = state
        .import_api
        .import_parts_file(second.id.unwrap(), &out, "importer")
        .unwrap();
    assert_eq!(again.imported, 2);
    assert!(again.rejects.is_empty());
}

#[test]
fn test_import_non_csv_file_is_rejected() {
    let (_temp_file, state) = create_test_state();
    let order = state.order_api.create_order("批次", None, None).unwrap();

    let input = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    let result = state
        .import_api
        .import_parts_file(order.id.unwrap(), input.path(), "importer");
    assert!(matches!(result, Err(ApiError::ImportError(_))));
}
