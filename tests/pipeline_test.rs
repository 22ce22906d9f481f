mod common;

use chrono::Utc;
use common::{TestEnv, jpeg, png, test_config};
use image_resize_service::config::{AckOrder, FailureMode, ServiceConfig, WaitPolicy};
use image_resize_service::error::{Dependency, ErrorKind, ProcessingError};
use image_resize_service::models::record::{
    ORG_HEIGHT, ORG_WIDTH, PROCESSED, PROCESSED_HEIGHT, PROCESSED_NAME, PROCESSED_WIDTH,
};
use image_resize_service::models::{BatchOutcome, BatchResult, ImageRecord, ItemStatus, Stage};
use image_resize_service::services::metrics::PROCESSED_FILES;
use image_resize_service::services::storage::ObjectAcl;
use std::sync::atomic::Ordering;

/// Stores an original with its upload record and queues it, as a submission would.
fn seed(env: &TestEnv, key: &str, data: Vec<u8>, width: u32, height: u32) {
    env.storage().insert(key, data, "image/png");
    env.metadata().insert(
        key,
        ImageRecord::new_upload(key, Utc::now(), width, height).to_attributes(),
    );
    env.queue().push(key);
}

async fn run_batch(env: &TestEnv) -> BatchResult {
    match env
        .state
        .pipeline
        .process_batch(10, WaitPolicy::Immediate)
        .await
        .unwrap()
    {
        BatchOutcome::Processed(result) => result,
        BatchOutcome::NothingToDo => panic!("expected a processed batch"),
    }
}

fn env_with(update: impl FnOnce(&mut ServiceConfig)) -> TestEnv {
    let mut config = test_config();
    update(&mut config);
    TestEnv::with_config(config)
}

#[tokio::test]
async fn test_processes_single_item() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(400, 300), 400, 300);

    let result = run_batch(&env).await;

    assert_eq!(result.received, 1);
    assert_eq!(result.completed(), 1);
    assert!(result.aborted.is_none());
    assert!(result.metrics_error.is_none());

    let item = &result.items[0];
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.stage, Stage::Acknowledged);
    let derivative = item.derivative.as_ref().unwrap();
    assert_eq!(derivative.name, "a_thumb.png");
    assert_eq!((derivative.width, derivative.height), (200, 150));
    assert_eq!(derivative.content_type, "image/png");

    let stored = env.storage().get("a_thumb.png").unwrap();
    assert_eq!(stored.acl, ObjectAcl::PublicRead);
    assert_eq!(stored.content_type, "image/png");

    let record = env.metadata().record("a.png").unwrap();
    assert_eq!(record[PROCESSED], "y");
    assert_eq!(record[PROCESSED_NAME], "a_thumb.png");
    assert_eq!(record[PROCESSED_WIDTH], "200");
    assert_eq!(record[PROCESSED_HEIGHT], "150");
    assert_eq!(record[ORG_WIDTH], "400");
    assert_eq!(record[ORG_HEIGHT], "300");

    assert_eq!(*env.queue().deleted.lock().unwrap(), vec!["a.png".to_string()]);
    assert!(env.queue().in_flight().is_empty());
    assert_eq!(env.metrics().total(PROCESSED_FILES), 1);
}

#[tokio::test]
async fn test_empty_queue_is_nothing_to_do() {
    let env = TestEnv::new();

    let outcome = env
        .state
        .pipeline
        .process_batch(10, WaitPolicy::Immediate)
        .await
        .unwrap();

    assert_eq!(outcome, BatchOutcome::NothingToDo);
    assert_eq!(env.queue().receives.load(Ordering::SeqCst), 1);
    assert_eq!(env.metrics().count(), 0);
    assert_eq!(env.fake.connections_to(Dependency::ObjectStore), 0);
    assert_eq!(env.fake.connections_to(Dependency::MetadataStore), 0);
    assert_eq!(env.fake.connections_to(Dependency::Metrics), 0);
}

#[tokio::test]
async fn test_wait_policy_selects_poll_duration() {
    let env = TestEnv::new();
    let config = test_config();

    env.state
        .pipeline
        .process_batch(10, WaitPolicy::Immediate)
        .await
        .unwrap();
    assert_eq!(
        *env.queue().last_wait_seconds.lock().unwrap(),
        Some(config.short_poll_seconds)
    );

    env.state
        .pipeline
        .process_batch(10, WaitPolicy::LongPoll)
        .await
        .unwrap();
    assert_eq!(
        *env.queue().last_wait_seconds.lock().unwrap(),
        Some(config.long_poll_seconds)
    );
}

#[tokio::test]
async fn test_receive_is_capped_at_ten() {
    let env = TestEnv::new();
    for i in 0..12 {
        seed(&env, &format!("img{:02}.png", i), png(8, 8), 8, 8);
    }

    let outcome = env
        .state
        .pipeline
        .process_batch(50, WaitPolicy::Immediate)
        .await
        .unwrap();
    let BatchOutcome::Processed(result) = outcome else {
        panic!("expected a processed batch");
    };

    assert_eq!(result.received, 10);
    assert_eq!(result.completed(), 10);
    assert_eq!(env.queue().visible().len(), 2);
    assert_eq!(env.metrics().total(PROCESSED_FILES), 10);
}

#[tokio::test]
async fn test_fetch_failure_aborts_batch() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(300, 300), 300, 300);
    env.queue().push("missing.png");
    seed(&env, "c.png", png(300, 300), 300, 300);

    let result = run_batch(&env).await;

    assert_eq!(result.received, 3);
    let abort = result.aborted.as_ref().unwrap();
    assert_eq!(abort.index, 1);
    assert_eq!(abort.kind, ErrorKind::FetchError);

    assert_eq!(result.items[0].status, ItemStatus::Completed);
    assert_eq!(result.items[1].status, ItemStatus::Failed);
    assert_eq!(result.items[1].stage, Stage::Received);
    assert_eq!(result.items[2].status, ItemStatus::Untouched);
    assert_eq!(result.items[2].stage, Stage::Received);

    // Earlier items keep their results, later ones were never attempted
    assert!(env.storage().get("a_thumb.png").is_some());
    assert!(env.storage().get("c_thumb.png").is_none());
    assert_eq!(env.metadata().record("c.png").unwrap()[PROCESSED], "n");
    assert_eq!(*env.queue().deleted.lock().unwrap(), vec!["a.png".to_string()]);
    assert_eq!(env.queue().in_flight(), vec!["c.png".to_string(), "missing.png".to_string()]);

    // Counter reflects everything received
    assert_eq!(env.metrics().total(PROCESSED_FILES), 3);
}

#[tokio::test]
async fn test_decode_failure_aborts_batch() {
    let env = TestEnv::new();
    seed(&env, "bad.png", b"not really a png".to_vec(), 10, 10);
    seed(&env, "b.png", png(50, 50), 50, 50);

    let result = run_batch(&env).await;

    let abort = result.aborted.as_ref().unwrap();
    assert_eq!((abort.index, abort.kind), (0, ErrorKind::DecodeError));
    assert_eq!(result.items[0].stage, Stage::Fetched);
    assert_eq!(result.untouched(), 1);
    assert!(env.queue().deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_failure_aborts_batch() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(300, 300), 300, 300);
    env.storage()
        .fail_put
        .lock()
        .unwrap()
        .insert("a_thumb.png".to_string());

    let result = run_batch(&env).await;

    let abort = result.aborted.as_ref().unwrap();
    assert_eq!(abort.kind, ErrorKind::PublishError);
    assert_eq!(result.items[0].stage, Stage::Transformed);
    assert_eq!(env.metadata().record("a.png").unwrap()[PROCESSED], "n");
    assert_eq!(env.queue().in_flight(), vec!["a.png".to_string()]);
}

#[tokio::test]
async fn test_isolate_mode_continues_after_failure() {
    let env = env_with(|c| c.failure_mode = FailureMode::Isolate);
    seed(&env, "a.png", png(300, 300), 300, 300);
    env.queue().push("missing.png");
    seed(&env, "c.png", png(300, 300), 300, 300);

    let result = run_batch(&env).await;

    assert!(result.aborted.is_none());
    assert_eq!(result.completed(), 2);
    assert_eq!(result.failed(), 1);
    assert_eq!(result.untouched(), 0);
    assert_eq!(
        result.items[1].error.as_ref().unwrap().kind,
        ErrorKind::FetchError
    );
    assert_eq!(
        *env.queue().deleted.lock().unwrap(),
        vec!["a.png".to_string(), "c.png".to_string()]
    );
    assert_eq!(env.queue().in_flight(), vec!["missing.png".to_string()]);
}

#[tokio::test]
async fn test_record_failure_leaves_message_for_redelivery() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(300, 300), 300, 300);
    env.metadata()
        .fail_put
        .lock()
        .unwrap()
        .insert("a.png".to_string());

    let result = run_batch(&env).await;

    let abort = result.aborted.as_ref().unwrap();
    assert_eq!(abort.kind, ErrorKind::RecordError);
    assert_eq!(result.items[0].stage, Stage::Published);
    assert!(env.queue().deleted.lock().unwrap().is_empty());

    // Once the store recovers, the redelivered item completes
    env.metadata().fail_put.lock().unwrap().clear();
    env.queue().expire_visibility();
    let retry = run_batch(&env).await;
    assert_eq!(retry.completed(), 1);
    assert_eq!(env.metadata().record("a.png").unwrap()[PROCESSED], "y");
}

#[tokio::test]
async fn test_ack_then_record_ordering() {
    let env = env_with(|c| c.ack_order = AckOrder::AckThenRecord);
    seed(&env, "a.png", png(300, 300), 300, 300);
    seed(&env, "b.png", png(300, 300), 300, 300);

    let result = run_batch(&env).await;
    assert_eq!(result.completed(), 2);
    assert_eq!(result.items[0].stage, Stage::Recorded);

    // A record failure after the acknowledgement leaves nothing to redeliver
    let env = env_with(|c| c.ack_order = AckOrder::AckThenRecord);
    seed(&env, "a.png", png(300, 300), 300, 300);
    env.metadata()
        .fail_put
        .lock()
        .unwrap()
        .insert("a.png".to_string());

    let result = run_batch(&env).await;
    assert_eq!(result.aborted.as_ref().unwrap().kind, ErrorKind::RecordError);
    assert_eq!(result.items[0].stage, Stage::Acknowledged);
    assert_eq!(*env.queue().deleted.lock().unwrap(), vec!["a.png".to_string()]);
    assert_eq!(env.metadata().record("a.png").unwrap()[PROCESSED], "n");
}

#[tokio::test]
async fn test_ack_failure_after_record() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(300, 300), 300, 300);
    seed(&env, "b.png", png(300, 300), 300, 300);
    env.queue()
        .fail_delete
        .lock()
        .unwrap()
        .insert("a.png".to_string());

    let result = run_batch(&env).await;

    let abort = result.aborted.as_ref().unwrap();
    assert_eq!((abort.index, abort.kind), (0, ErrorKind::AckError));
    assert_eq!(result.items[0].stage, Stage::Recorded);
    assert_eq!(result.items[1].status, ItemStatus::Untouched);
    assert_eq!(env.metadata().record("a.png").unwrap()[PROCESSED], "y");
}

#[tokio::test]
async fn test_ack_or_record_failure_mid_batch_keeps_earlier_items() {
    for order in [AckOrder::RecordThenAck, AckOrder::AckThenRecord] {
        for failing in [ErrorKind::AckError, ErrorKind::RecordError] {
            let env = env_with(|c| c.ack_order = order);
            seed(&env, "a.png", png(300, 300), 300, 300);
            seed(&env, "b.png", png(300, 300), 300, 300);
            seed(&env, "c.png", png(300, 300), 300, 300);
            let failures = match failing {
                ErrorKind::AckError => &env.queue().fail_delete,
                _ => &env.metadata().fail_put,
            };
            failures.lock().unwrap().insert("b.png".to_string());

            let result = run_batch(&env).await;
            let context = format!("{:?} failing with {:?}", order, failing);

            let abort = result.aborted.as_ref().unwrap();
            assert_eq!((abort.index, abort.kind), (1, failing), "{}", context);
            assert_eq!(result.items[0].status, ItemStatus::Completed, "{}", context);
            assert_eq!(result.items[1].status, ItemStatus::Failed, "{}", context);
            assert_eq!(result.items[2].status, ItemStatus::Untouched, "{}", context);

            // First item acknowledged and recorded
            assert_eq!(env.metadata().record("a.png").unwrap()[PROCESSED], "y", "{}", context);
            let deleted = env.queue().deleted.lock().unwrap().clone();
            assert_eq!(deleted[0], "a.png", "{}", context);
            assert!(!deleted.contains(&"c.png".to_string()), "{}", context);

            // Third item never attempted
            assert!(env.queue().in_flight().contains(&"c.png".to_string()), "{}", context);
            assert_eq!(env.metadata().record("c.png").unwrap()[PROCESSED], "n", "{}", context);
            assert!(env.storage().get("c_thumb.png").is_none(), "{}", context);

            assert_eq!(env.metrics().total(PROCESSED_FILES), 3, "{}", context);
        }
    }
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(640, 480), 640, 480);
    env.queue()
        .fail_delete
        .lock()
        .unwrap()
        .insert("a.png".to_string());

    run_batch(&env).await;
    let first_thumb = env.storage().get("a_thumb.png").unwrap().data;
    let first_record = env.metadata().record("a.png").unwrap();

    // Visibility lapses before the acknowledgement went through
    env.queue().fail_delete.lock().unwrap().clear();
    env.queue().expire_visibility();
    let retry = run_batch(&env).await;

    assert_eq!(retry.completed(), 1);
    assert_eq!(env.storage().get("a_thumb.png").unwrap().data, first_thumb);
    assert_eq!(env.metadata().record("a.png").unwrap(), first_record);
    assert_eq!(env.storage().keys(), vec!["a.png".to_string(), "a_thumb.png".to_string()]);
}

#[tokio::test]
async fn test_metrics_failure_is_reported_not_fatal() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(300, 300), 300, 300);
    env.metrics().fail.store(true, Ordering::SeqCst);

    let result = run_batch(&env).await;

    assert_eq!(result.completed(), 1);
    assert!(result.metrics_error.as_ref().unwrap().contains("metric"));
    assert_eq!(env.metadata().record("a.png").unwrap()[PROCESSED], "y");
}

#[tokio::test]
async fn test_queue_connect_failure() {
    let env = TestEnv::new();
    env.fake.fail_connect(Dependency::WorkQueue);

    let err = env
        .state
        .pipeline
        .process_batch(10, WaitPolicy::Immediate)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProcessingError::Connect {
            dependency: Dependency::WorkQueue,
            ..
        }
    ));
    assert_eq!(env.metrics().count(), 0);
}

#[tokio::test]
async fn test_receive_failure() {
    let env = TestEnv::new();
    env.queue().fail_receive.store(true, Ordering::SeqCst);

    let err = env
        .state
        .pipeline
        .process_batch(10, WaitPolicy::Immediate)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueueError);
}

#[tokio::test]
async fn test_store_connect_failure_leaves_items_untouched() {
    let env = env_with(|c| c.failure_mode = FailureMode::Isolate);
    seed(&env, "a.png", png(300, 300), 300, 300);
    seed(&env, "b.png", png(300, 300), 300, 300);
    env.fake.fail_connect(Dependency::ObjectStore);

    let result = run_batch(&env).await;

    let abort = result.aborted.as_ref().unwrap();
    assert_eq!((abort.index, abort.kind), (0, ErrorKind::ConnectError));
    assert!(abort.detail.contains("object store"));
    assert_eq!(result.untouched(), 2);
    assert_eq!(env.queue().in_flight().len(), 2);
    assert_eq!(env.metrics().total(PROCESSED_FILES), 2);
}

#[tokio::test]
async fn test_collaborators_acquired_per_invocation() {
    let env = TestEnv::new();
    seed(&env, "a.png", png(30, 30), 30, 30);
    run_batch(&env).await;
    seed(&env, "b.png", png(30, 30), 30, 30);
    run_batch(&env).await;

    assert_eq!(env.fake.connections_to(Dependency::WorkQueue), 2);
    assert_eq!(env.fake.connections_to(Dependency::ObjectStore), 2);
    assert_eq!(env.fake.connections_to(Dependency::MetadataStore), 2);
}

#[tokio::test]
async fn test_small_jpeg_is_not_upscaled() {
    let env = TestEnv::new();
    env.storage().insert("small.jpg", jpeg(120, 90), "image/jpeg");
    env.queue().push("small.jpg");

    let result = run_batch(&env).await;

    let derivative = result.items[0].derivative.as_ref().unwrap();
    assert_eq!(derivative.name, "small_thumb.jpg");
    assert_eq!((derivative.width, derivative.height), (120, 90));
    assert_eq!(derivative.content_type, "image/jpeg");
}
