
use std::time::Duration;

use harness::{
    config_for, heartbeat, subscribed, subscribed_with_heartbeat, StreamingMaster, STREAM_ID,
};
use mesos_solr_scheduler::{Scheduler, SchedulerError, SchedulerState};
use serde_json::json;
use tokio::time::{sleep, timeout};

const SETTLE: Duration = Duration::from_millis(300);

#[tokio::test]
async fn teardown_interrupts_a_pending_read() {
    let master = StreamingMaster::spawn(vec![subscribed("fw-123"), heartbeat()], true)
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(config_for(vec![master.host()])).unwrap();
    let handle = scheduler.handle();

    let (result, _) = timeout(Duration::from_secs(5), async {
        tokio::join!(scheduler.run(), async {
            sleep(SETTLE).await;
            assert!(handle.teardown());
        })
    })
    .await
    .expect("run should return after teardown");

    result.unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(scheduler.is_shutdown_requested());
    assert!(!scheduler.is_subscribed());
    assert_eq!(scheduler.heartbeats(), 1);

    let teardowns = master.calls_of("TEARDOWN");
    assert_eq!(teardowns.len(), 1);
    assert_eq!(teardowns[0].body["framework_id"]["value"], "fw-123");
    assert_eq!(teardowns[0].stream_id.as_deref(), Some(STREAM_ID));
}

#[tokio::test]
async fn stop_leaves_without_teardown() {
    let master = StreamingMaster::spawn(vec![subscribed("fw-123")], true)
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(config_for(vec![master.host()])).unwrap();
    let handle = scheduler.handle();

    let (result, _) = timeout(Duration::from_secs(5), async {
        tokio::join!(scheduler.run(), async {
            sleep(SETTLE).await;
            handle.stop();
        })
    })
    .await
    .expect("run should return after stop");

    result.unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(master.calls_of("TEARDOWN").is_empty());
    assert_eq!(master.calls_of("SUBSCRIBE").len(), 1);
}

#[tokio::test]
async fn reconcile_sends_an_empty_task_list() {
    let master = StreamingMaster::spawn(vec![subscribed("fw-123")], true)
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(config_for(vec![master.host()])).unwrap();
    let handle = scheduler.handle();

    let (result, _) = timeout(Duration::from_secs(5), async {
        tokio::join!(scheduler.run(), async {
            sleep(SETTLE).await;
            handle.reconcile();
            sleep(SETTLE).await;
            handle.stop();
        })
    })
    .await
    .expect("run should return after stop");

    result.unwrap();

    let reconciles = master.calls_of("RECONCILE");
    assert_eq!(reconciles.len(), 1);
    assert_eq!(reconciles[0].body["framework_id"]["value"], "fw-123");
    assert_eq!(reconciles[0].body["reconcile"], json!({ "tasks": [] }));
}

#[tokio::test]
async fn silent_stream_trips_the_heartbeat_watchdog() {
    let master = StreamingMaster::spawn(vec![subscribed_with_heartbeat("fw-123", 0.05)], true)
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(config_for(vec![master.host()])).unwrap();

    let result = timeout(Duration::from_secs(5), scheduler.run())
        .await
        .expect("watchdog should fire");

    assert!(matches!(result, Err(SchedulerError::HeartbeatTimeout(_))));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert!(scheduler.heartbeat_interval().is_some());
}

#[tokio::test]
async fn teardown_before_subscription_only_stops() {
    let host = harness::unreachable_host().await;
    let mut scheduler = Scheduler::new(config_for(vec![host])).unwrap();

    scheduler.teardown().await.unwrap();

    assert!(scheduler.is_shutdown_requested());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}
