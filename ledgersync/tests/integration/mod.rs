//! End-to-end scenarios wiring the client, runner, writer, and scheduler
//! together over the in-memory backends.

use config::Environment;
use config::shared::EngineConfig;
use serde_json::json;

use ledgersync::client::ApiClient;
use ledgersync::dataset::{
    DatasetParams, Pagination, Schedule, ScheduleFrequency, Target,
};
use ledgersync::grid::{MemorySpreadsheet, Spreadsheet};
use ledgersync::jobs::JobStatus;
use ledgersync::registry::{DatasetRegistry, NewDataset};
use ledgersync::runner::JobRunner;
use ledgersync::scheduler::lock::{MemoryRealmLock, RealmLock};
use ledgersync::scheduler::triggers::{MemoryTriggerHost, TriggerHost};
use ledgersync::scheduler::Scheduler;
use ledgersync::session::{MemorySessionStore, TokenPair};
use ledgersync::store::{MemoryStore, TriggerStore};
use ledgersync::test_utils::{
    ScriptedTransport, StaticRefresher, company_info_body, query_response_body,
};

type Runner = JobRunner<
    ScriptedTransport,
    MemorySessionStore,
    StaticRefresher,
    MemorySpreadsheet,
    MemoryStore,
    MemoryStore,
>;

struct Harness {
    transport: ScriptedTransport,
    grid: MemorySpreadsheet,
    store: MemoryStore,
    registry: DatasetRegistry<MemoryStore>,
    runner: Runner,
    host: MemoryTriggerHost,
    lock: MemoryRealmLock,
    scheduler: Scheduler<MemoryStore, MemoryTriggerHost, MemoryRealmLock, MemorySessionStore, Runner>,
}

fn init_tracing() {
    // Ignore the error when a previous test already installed the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn harness_with(config: EngineConfig) -> Harness {
    init_tracing();

    let transport = ScriptedTransport::new();
    let grid = MemorySpreadsheet::new();
    let store = MemoryStore::new();
    let session = MemorySessionStore::connected("4620816365", TokenPair::new("at", "rt"));

    let client = ApiClient::new(
        transport.clone(),
        session.clone(),
        StaticRefresher::new("at-2", "rt-2"),
        Environment::Sandbox,
        config.client,
    );
    let registry = DatasetRegistry::new(store.clone());
    let runner = JobRunner::new(
        client,
        ledgersync::writer::OutputWriter::new(grid.clone(), config.writer),
        registry.clone(),
        store.clone(),
    );

    let host = MemoryTriggerHost::new(config.scheduler.trigger_cap);
    let lock = MemoryRealmLock::from_millis(config.scheduler.lock_ttl_ms);
    let scheduler = Scheduler::new(
        store.clone(),
        host.clone(),
        lock.clone(),
        session,
        runner.clone(),
    );

    Harness {
        transport,
        grid,
        store,
        registry,
        runner,
        host,
        lock,
        scheduler,
    }
}

fn customer_dataset(schedule: Option<Schedule>) -> NewDataset {
    NewDataset {
        name: "Customers".to_string(),
        params: DatasetParams::Query {
            query: "SELECT * FROM Customer".to_string(),
        },
        target: Target {
            sheet_id: None,
            sheet_name: "Customers".to_string(),
            anchor_cell: "B2".to_string(),
            allow_resize: true,
            named_range: Some("customers_output".to_string()),
        },
        pagination: Pagination::default(),
        schedule,
    }
}

fn daily_schedule(enabled: bool) -> Schedule {
    Schedule {
        enabled,
        frequency: ScheduleFrequency::Daily,
        time_of_day: Some(6),
        day_of_week: None,
        day_of_month: None,
    }
}

fn weekly_schedule() -> Schedule {
    Schedule {
        enabled: true,
        frequency: ScheduleFrequency::Weekly,
        time_of_day: Some(6),
        day_of_week: Some(1),
        day_of_month: None,
    }
}

#[tokio::test]
async fn query_run_writes_at_the_anchor_and_tracks_schema() {
    let h = harness();
    let dataset = h.registry.create(customer_dataset(None)).await.unwrap();

    h.transport.push(200, company_info_body("Acme Corp"));
    h.transport.push(
        200,
        query_response_body(
            "Customer",
            &[
                json!({"Id": "1", "DisplayName": "Acme"}),
                json!({"Id": "2", "DisplayName": "Globex"}),
            ],
        ),
    );

    let job = h.runner.run(&dataset.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result.rows, 2);
    assert_eq!(result.range_a1, "B2:C4");
    assert!(!result.schema_changed);

    let sheet = h.grid.sheet_by_name("Customers").await.unwrap().unwrap();
    assert_eq!(h.grid.cell_text(sheet.id, "B2").await.unwrap(), "Id");
    assert_eq!(h.grid.cell_text(sheet.id, "C4").await.unwrap(), "Globex");

    // The named range follows the write.
    let (range_sheet, range) = h.grid.named_range("customers_output").await.unwrap().unwrap();
    assert_eq!(range_sheet, sheet.id);
    assert_eq!(range.to_a1(), "B2:C4");

    // Second run returns an extra field: same data region cleared and
    // rewritten, schema drift flagged.
    h.transport.push(200, company_info_body("Acme Corp"));
    h.transport.push(
        200,
        query_response_body(
            "Customer",
            &[json!({"Id": "1", "DisplayName": "Acme", "Balance": 12.5})],
        ),
    );

    let second = h.runner.run(&dataset.id).await.unwrap();
    assert!(second.message.contains("schema changed"));
    let second_result = second.result.unwrap();
    assert!(second_result.schema_changed);
    assert_eq!(second_result.range_a1, "B2:D3");

    // Stale rows from the first write are gone.
    assert_eq!(h.grid.cell_text(sheet.id, "B4").await.unwrap(), "");

    let stored = h.registry.get(&dataset.id).await.unwrap().unwrap();
    let last_write = stored.last_write.unwrap();
    assert_eq!(last_write.range_a1, "B2:D3");
}

#[tokio::test(start_paused = true)]
async fn rate_limited_run_retries_and_completes() {
    let h = harness();
    let dataset = h.registry.create(customer_dataset(None)).await.unwrap();

    h.transport.push(200, company_info_body("Acme Corp"));
    h.transport.push(429, "");
    h.transport.push(429, "");
    h.transport.push(429, "");
    h.transport.push(
        200,
        query_response_body("Customer", &[json!({"Id": "1", "DisplayName": "Acme"})]),
    );

    let job = h.runner.run(&dataset.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    // One connection probe, three rate-limited attempts, one success.
    assert_eq!(h.transport.request_count(), 5);
}

#[tokio::test]
async fn failed_fetch_produces_a_failed_job_with_the_fault_message() {
    let h = harness();
    let dataset = h.registry.create(customer_dataset(None)).await.unwrap();

    h.transport.push(200, company_info_body("Acme Corp"));
    h.transport.push(
        400,
        ledgersync::test_utils::fault_body("Invalid query", "Property Foo not found"),
    );

    let job = h.runner.run(&dataset.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let message = job.error.unwrap();
    assert!(message.contains("Property Foo not found"));

    // Nothing was written.
    assert!(h.grid.sheet_by_name("Customers").await.unwrap().is_none());
}

#[tokio::test]
async fn enable_is_idempotent() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();

    h.scheduler.enable(&dataset.id).await.unwrap();
    let second = h.scheduler.enable(&dataset.id).await.unwrap();

    // Exactly one live trigger, mapped to the dataset.
    assert_eq!(h.host.list_triggers().await.unwrap(), vec![second.clone()]);
    assert_eq!(
        h.store.trigger_for_dataset(&dataset.id).await.unwrap(),
        Some(second)
    );
}

#[tokio::test]
async fn enable_replaces_the_trigger_after_a_schedule_change() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    let first = h.scheduler.enable(&dataset.id).await.unwrap();

    h.registry
        .update(
            &dataset.id,
            ledgersync::registry::DatasetUpdate {
                schedule: Some(Some(weekly_schedule())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let second = h.scheduler.enable(&dataset.id).await.unwrap();

    // The old trigger would keep firing daily; it has to go.
    assert_ne!(first, second);
    assert!(!h.host.contains(&first).await);
    assert_eq!(h.host.list_triggers().await.unwrap().len(), 1);

    let shape = h.host.schedule_of(&second).await.unwrap();
    assert_eq!(shape.frequency, ScheduleFrequency::Weekly);
}

#[tokio::test]
async fn fire_with_disabled_schedule_removes_the_trigger() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    let trigger = h.scheduler.enable(&dataset.id).await.unwrap();

    // Turn the schedule off behind the scheduler's back.
    h.registry
        .update(
            &dataset.id,
            ledgersync::registry::DatasetUpdate {
                schedule: Some(Some(daily_schedule(false))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let job = h.scheduler.handle_trigger_fire(&trigger).await;
    assert!(job.is_none());
    assert!(!h.host.contains(&trigger).await);
    assert!(h.store.dataset_for_trigger(&trigger).await.unwrap().is_none());
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn orphan_trigger_fire_is_cleaned_up() {
    let h = harness();
    h.host.insert_raw("ghost").await;

    let job = h.scheduler.handle_trigger_fire("ghost").await;
    assert!(job.is_none());
    assert!(!h.host.contains("ghost").await);
}

#[tokio::test]
async fn fire_while_realm_lock_is_held_skips_the_run() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    let trigger = h.scheduler.enable(&dataset.id).await.unwrap();

    let token = h.lock.acquire("4620816365").await.unwrap().unwrap();

    let job = h.scheduler.handle_trigger_fire(&trigger).await;
    assert!(job.is_none());
    // No fetch, no write.
    assert_eq!(h.transport.request_count(), 0);
    assert!(h.grid.sheet_by_name("Customers").await.unwrap().is_none());

    // After release the same fire runs.
    h.lock.release(token).await.unwrap();
    h.transport.push(200, company_info_body("Acme Corp"));
    h.transport.push(
        200,
        query_response_body("Customer", &[json!({"Id": "1", "DisplayName": "Acme"})]),
    );

    let job = h.scheduler.handle_trigger_fire(&trigger).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn reconcile_repairs_drift_and_is_a_no_op_when_clean() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    let trigger = h.scheduler.enable(&dataset.id).await.unwrap();

    let clean = h.scheduler.reconcile().await.unwrap();
    assert!(clean.is_clean());

    // The host loses our trigger and leaks an unrelated one.
    h.host.delete_trigger(&trigger).await.unwrap();
    h.host.insert_raw("leaked").await;

    let report = h.scheduler.reconcile().await.unwrap();
    assert_eq!(report.stale_mappings_removed, 1);
    assert_eq!(report.triggers_recreated, 1);
    assert_eq!(report.orphan_triggers_removed, 1);

    // The dataset is mapped to a live trigger again.
    let remapped = h.store.trigger_for_dataset(&dataset.id).await.unwrap().unwrap();
    assert!(h.host.contains(&remapped).await);
    assert!(!h.host.contains("leaked").await);

    let clean_again = h.scheduler.reconcile().await.unwrap();
    assert!(clean_again.is_clean());
}

#[tokio::test]
async fn reconcile_removes_the_trigger_of_a_deleted_dataset() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    let trigger = h.scheduler.enable(&dataset.id).await.unwrap();

    // The dataset vanishes without going through `disable`; the trigger is
    // still live and still mapped.
    h.registry.delete(&dataset.id).await.unwrap();

    let report = h.scheduler.reconcile().await.unwrap();
    assert_eq!(report.orphan_triggers_removed, 1);
    assert!(!h.host.contains(&trigger).await);
    assert!(h.store.dataset_for_trigger(&trigger).await.unwrap().is_none());
}

#[tokio::test]
async fn reconcile_removes_the_trigger_of_a_disabled_schedule() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    let trigger = h.scheduler.enable(&dataset.id).await.unwrap();

    h.registry
        .update(
            &dataset.id,
            ledgersync::registry::DatasetUpdate {
                schedule: Some(Some(daily_schedule(false))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let report = h.scheduler.reconcile().await.unwrap();
    assert_eq!(report.orphan_triggers_removed, 1);
    assert!(!h.host.contains(&trigger).await);
}

#[tokio::test]
async fn headroom_reflects_trigger_usage() {
    let h = harness();
    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    h.scheduler.enable(&dataset.id).await.unwrap();

    let headroom = h.scheduler.headroom().await.unwrap();
    assert_eq!(headroom.cap, 20);
    assert_eq!(headroom.used, 1);
    assert_eq!(headroom.remaining, 19);
    assert!(!headroom.limit_exceeded);
}

#[tokio::test]
async fn headroom_flags_an_exhausted_trigger_cap() {
    let mut config = EngineConfig::default();
    config.scheduler.trigger_cap = 1;
    let h = harness_with(config);

    let dataset = h
        .registry
        .create(customer_dataset(Some(daily_schedule(true))))
        .await
        .unwrap();
    h.scheduler.enable(&dataset.id).await.unwrap();

    let headroom = h.scheduler.headroom().await.unwrap();
    assert_eq!(headroom.remaining, 0);
    assert!(headroom.limit_exceeded);
}
