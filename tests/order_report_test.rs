// ==========================================
// 订单/报表/质量集成测试
// ==========================================
// 场景: 行项目批量建零件、客户进度报表、质量报告与文档登记
// ==========================================

use part_tracker::api::{ApiError, LineItemRequest, QualityErrorRequest};
use part_tracker::engine::ArchiveRequest;
use part_tracker::{ArchiveReasonCode, PartStatus};

mod test_helpers;
use test_helpers::{create_process, create_test_state};

#[test]
fn test_line_item_enumerates_erp_ids() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 3);
    let order = state.order_api.create_order("批次", Some("acme"), None).unwrap();

    let parts = state
        .order_api
        .add_line_item(
            order.id.unwrap(),
            &LineItemRequest {
                part_type_id: fx.part_type_id(),
                process_id: fx.process_id(),
                quantity: 3,
                enumeration_start: 10,
            },
            "planner",
        )
        .unwrap();

    let erp_ids: Vec<&str> = parts.iter().map(|p| p.erp_id.as_str()).collect();
    assert_eq!(erp_ids, vec!["DI-10", "DI-11", "DI-12"]);
    assert!(parts.iter().all(|p| p.id.is_some()));
    assert!(parts.iter().all(|p| p.step_id == Some(fx.step_id(1))));
    assert!(parts.iter().all(|p| p.status == PartStatus::Pending));
}

#[test]
fn test_line_item_rejects_process_of_other_part_type() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 2);
    let other = create_process(&state, "泵体", Some("PB"), "装配", 2);
    let order = state.order_api.create_order("批次", None, None).unwrap();

    let result = state.order_api.add_line_item(
        order.id.unwrap(),
        &LineItemRequest {
            part_type_id: fx.part_type_id(),
            process_id: other.process_id(),
            quantity: 1,
            enumeration_start: 1,
        },
        "planner",
    );
    assert!(matches!(result, Err(ApiError::InvalidState(_))));
    assert!(state.part_api.list_parts_by_order(order.id.unwrap(), true).unwrap().is_empty());
}

#[test]
fn test_customer_report_shows_progress() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 3);

    let order = state.order_api.create_order("批次1", Some("acme"), None).unwrap();
    let parts = state
        .order_api
        .add_line_item(
            order.id.unwrap(),
            &LineItemRequest {
                part_type_id: fx.part_type_id(),
                process_id: fx.process_id(),
                quantity: 2,
                enumeration_start: 1,
            },
            "planner",
        )
        .unwrap();
    state.part_api.advance(parts[0].id.unwrap(), "op").unwrap();

    // 其他客户与已归档订单不出现在报表中
    state.order_api.create_order("别家", Some("globex"), None).unwrap();
    let archived = state.order_api.create_order("旧单", Some("acme"), None).unwrap();
    state
        .archive_api
        .archive_order(
            archived.id.unwrap(),
            &ArchiveRequest {
                reason: ArchiveReasonCode::Completed,
                notes: None,
                user: "alice".to_string(),
            },
            None,
        )
        .unwrap();

    let report = state.order_api.customer_report("acme").unwrap();
    assert_eq!(report.customer, "acme");
    assert_eq!(report.orders.len(), 1);

    let progress = &report.orders[0].parts;
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0].erp_id, "DI-1");
    assert_eq!(progress[0].step_number, Some(2));
    assert_eq!(progress[0].num_steps, Some(3));
    assert_eq!(progress[1].step_number, Some(1));
}

#[test]
fn test_update_archived_order_is_rejected() {
    let (_temp_file, state) = create_test_state();
    let order = state.order_api.create_order("批次", None, None).unwrap();

    let mut edit = order.clone();
    edit.customer = Some("acme".to_string());
    let updated = state.order_api.update_order(&edit).unwrap();
    assert_eq!(updated.revision, order.revision + 1);

    // 过期 revision
    assert!(matches!(
        state.order_api.update_order(&edit),
        Err(ApiError::OptimisticLockFailure(_))
    ));

    state
        .archive_api
        .archive_order(
            order.id.unwrap(),
            &ArchiveRequest {
                reason: ArchiveReasonCode::Other,
                notes: None,
                user: "alice".to_string(),
            },
            None,
        )
        .unwrap();
    let latest = state.order_api.get_order(order.id.unwrap()).unwrap();
    assert!(matches!(
        state.order_api.update_order(&latest),
        Err(ApiError::InvalidState(_))
    ));
}

#[test]
fn test_quality_report_and_documents() {
    let (_temp_file, state) = create_test_state();
    let fx = create_process(&state, "喷油器", Some("DI"), "装配", 2);
    let order = state.order_api.create_order("批次", None, None).unwrap();
    let parts = state
        .order_api
        .add_line_item(
            order.id.unwrap(),
            &LineItemRequest {
                part_type_id: fx.part_type_id(),
                process_id: fx.process_id(),
                quantity: 1,
                enumeration_start: 1,
            },
            "planner",
        )
        .unwrap();
    let part_id = parts[0].id.unwrap();

    let empty = state.part_api.report_quality_error(
        part_id,
        "qa",
        QualityErrorRequest {
            description: "无错误项".to_string(),
            errors: vec!["  ".to_string()],
            ..Default::default()
        },
    );
    assert!(matches!(empty, Err(ApiError::InvalidInput(_))));

    let report = state
        .part_api
        .report_quality_error(
            part_id,
            "qa",
            QualityErrorRequest {
                machine: Some("CNC-3".to_string()),
                description: "外径超差".to_string(),
                errors: vec!["尺寸".to_string(), "毛刺".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(report.step_id, Some(fx.step_id(1)));

    let reports = state.part_api.list_error_reports(part_id).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].errors, vec!["尺寸".to_string(), "毛刺".to_string()]);
    assert_eq!(reports[0].machine.as_deref(), Some("CNC-3"));

    let doc = state.part_api.attach_document(part_id, "检验照片.jpg", "qa").unwrap();
    assert!(doc.is_image);
    assert!(doc.storage_path.starts_with("parts_docs/"));
    state.part_api.attach_document(part_id, "报告.pdf", "qa").unwrap();

    let docs = state.part_api.list_documents(part_id).unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().any(|d| !d.is_image && d.file_name == "报告.pdf"));

    assert!(matches!(
        state.part_api.attach_document(404, "a.pdf", "qa"),
        Err(ApiError::NotFound(_))
    ));
}
