// ==========================================
// CRM 快照同步集成测试
// ==========================================
// 场景: 快照文件 → 订单同步、状态推送写回快照
// ==========================================

use std::io::Write;
use std::sync::Arc;

use part_tracker::config::config_keys;
use part_tracker::crm::{CrmClient, PushOutcome, SnapshotCrmClient};
use part_tracker::OrderStatus;

mod test_helpers;
use test_helpers::create_test_state;

fn write_snapshot(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_sync_from_snapshot_then_push_back() {
    let (_temp_db, state) = create_test_state();
    let snapshot = write_snapshot(
        r#"{
            "deals": [
                { "id": "D-1", "name": "喷油器订单", "stage": "qualified", "pipeline": null, "close_date": null }
            ],
            "associations": { "D-1": ["Acme"] }
        }"#,
    );

    let client = SnapshotCrmClient::load(snapshot.path()).await.unwrap();
    let report = state.crm_sync(Arc::new(client)).sync_deals("cli").await.unwrap();
    assert_eq!(report.created, 1);

    let order = state.order_repo.find_by_crm_deal_id("D-1").unwrap().unwrap();
    assert_eq!(order.customer.as_deref(), Some("Acme"));

    state
        .config_manager
        .set_global_config_value(&config_keys::crm_stage_key(OrderStatus::Pending), "contractsent")
        .unwrap();
    let client = SnapshotCrmClient::load(snapshot.path()).await.unwrap();
    let outcome = state
        .crm_sync(Arc::new(client))
        .push_order_status(order.id.unwrap(), "cli")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PushOutcome::Pushed {
            stage: "contractsent".to_string()
        }
    );

    let reloaded = SnapshotCrmClient::load(snapshot.path()).await.unwrap();
    assert_eq!(reloaded.fetch_deals().await.unwrap()[0].stage, "contractsent");
}
