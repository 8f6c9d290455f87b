//! Integration tests for the invocation executor

mod common;

use common::{CountingCapability, count, executor, executor_with, single};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toolgate_core::prelude::*;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test]
async fn test_validation_precedes_execution() {
    let (executor, calls) = single(CountingCapability::new("read_file").requiring("path"));

    let result = executor
        .execute("read_file", json!({"encoding": "utf-8"}), ExecutionOptions::new().with_retries(3))
        .await;

    assert_eq!(result.code(), Some(ErrorCode::ValidationFailed));
    assert_eq!(
        result.error().unwrap().details,
        Some(json!({"missing": ["path"]}))
    );
    assert_eq!(count(&calls), 0);
}

#[tokio::test]
async fn test_unknown_capability_is_not_retried() {
    let executor = executor(vec![]);
    let retried = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&retried);

    let result = executor
        .execute(
            "nope",
            json!({}),
            ExecutionOptions::new()
                .with_retries(5)
                .on_retry(move |_, _, _| *counter.lock().unwrap() += 1),
        )
        .await;

    assert_eq!(result.code(), Some(ErrorCode::ToolNotFound));
    assert_eq!(*retried.lock().unwrap(), 0);
    assert_eq!(executor.get_history(None).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_block_caller() {
    let (executor, calls) =
        single(CountingCapability::new("slow").with_delay(Duration::from_secs(10)));

    let started_at = Instant::now();
    let result = executor
        .execute(
            "slow",
            json!({}),
            ExecutionOptions::new().with_timeout(ms(50)).with_cache(true),
        )
        .await;
    let elapsed = started_at.elapsed();

    assert_eq!(result.code(), Some(ErrorCode::Timeout));
    assert!(result.error().unwrap().message.contains("50ms"));
    assert!(elapsed >= ms(50) && elapsed < ms(60), "elapsed {:?}", elapsed);

    // Let the abandoned call finish; its result must not leak into bookkeeping
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(count(&calls), 1);
    assert_eq!(executor.get_history(None).await.len(), 1);
    assert!(executor.cache().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_retry_until_success() {
    let (executor, calls) = single(CountingCapability::new("flaky").failing_first(2));

    let result = executor
        .execute(
            "flaky",
            json!({}),
            ExecutionOptions::new().with_retries(2).with_retry_delay(ms(10)),
        )
        .await;

    assert!(result.is_success());
    assert_eq!(result.data().unwrap()["call"], json!(3));
    assert_eq!(result.report.unwrap().attempts, 3);
    assert_eq!(count(&calls), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_surfaces_last_error() {
    let (executor, calls) = single(CountingCapability::new("broken").always_failing());

    let result = executor
        .execute(
            "broken",
            json!({}),
            ExecutionOptions::new().with_retries(3).with_retry_delay(ms(10)),
        )
        .await;

    assert_eq!(result.code(), Some(ErrorCode::ExecutionError));
    assert_eq!(result.error().unwrap().message, "call 4 failed");
    assert_eq!(count(&calls), 4);
    assert_eq!(executor.get_history(None).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule() {
    let (executor, _calls) = single(CountingCapability::new("broken").always_failing());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);

    let started_at = Instant::now();
    let result = executor
        .execute(
            "broken",
            json!({}),
            ExecutionOptions::new()
                .with_retries(3)
                .with_retry_delay(ms(100))
                .with_backoff_multiplier(2.0)
                .on_retry(move |attempt, error, delay| {
                    assert_eq!(error.code, ErrorCode::ExecutionError);
                    sink.lock().unwrap().push((attempt, delay));
                }),
        )
        .await;

    assert!(result.is_failure());
    assert_eq!(
        *observed.lock().unwrap(),
        vec![(1, ms(100)), (2, ms(200)), (3, ms(400))]
    );
    let elapsed = started_at.elapsed();
    assert!(elapsed >= ms(700) && elapsed < ms(710), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_respects_cap() {
    let (executor, _calls) = single(CountingCapability::new("broken").always_failing());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);

    executor
        .execute(
            "broken",
            json!({}),
            ExecutionOptions::new()
                .with_retries(5)
                .with_retry_delay(ms(100))
                .with_backoff_multiplier(2.0)
                .with_max_retry_delay(ms(500))
                .on_retry(move |_, _, delay| sink.lock().unwrap().push(delay)),
        )
        .await;

    let delays = observed.lock().unwrap().clone();
    assert_eq!(delays, vec![ms(100), ms(200), ms(400), ms(500), ms(500)]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_only_retry_skips_execution_errors() {
    let (executor, calls) = single(CountingCapability::new("broken").always_failing());

    let result = executor
        .execute(
            "broken",
            json!({}),
            ExecutionOptions::new()
                .with_retries(3)
                .with_retry_delay(ms(10))
                .with_retry_on("timeout".parse().unwrap()),
        )
        .await;

    assert_eq!(result.code(), Some(ErrorCode::ExecutionError));
    assert_eq!(count(&calls), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_only_retry_retries_timeouts() {
    let (executor, calls) =
        single(CountingCapability::new("slow").with_delay(Duration::from_secs(1)));

    let result = executor
        .execute(
            "slow",
            json!({}),
            ExecutionOptions::new()
                .with_timeout(ms(10))
                .with_retries(2)
                .with_retry_delay(ms(10))
                .with_retry_on(RetryCondition::Timeout),
        )
        .await;

    assert_eq!(result.code(), Some(ErrorCode::Timeout));
    assert_eq!(result.report.unwrap().attempts, 3);
    assert_eq!(count(&calls), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_predicate() {
    let (executor, calls) = single(CountingCapability::new("broken").always_failing());

    executor
        .execute(
            "broken",
            json!({}),
            ExecutionOptions::new()
                .with_retries(5)
                .with_retry_delay(ms(10))
                .with_retry_on(RetryCondition::predicate(|e| e.message != "call 2 failed")),
        )
        .await;

    assert_eq!(count(&calls), 2);
}

#[tokio::test]
async fn test_cache_is_idempotent_and_order_independent() {
    let (executor, calls) = single(CountingCapability::new("search"));
    let options = ExecutionOptions::new().with_cache(true);

    let first = executor
        .execute("search", json!({"q": "fn", "limit": 5}), options.clone())
        .await;
    let second = executor
        .execute("search", json!({"limit": 5, "q": "fn"}), options)
        .await;

    assert_eq!(count(&calls), 1);
    assert_eq!(first.data(), second.data());
    assert!(!first.report.as_ref().unwrap().cached);

    let report = second.report.unwrap();
    assert!(report.cached);
    assert_eq!(report.attempts, 0);

    // Cache hits are not recorded by default
    assert_eq!(executor.get_history(None).await.len(), 1);
}

#[tokio::test]
async fn test_cache_hits_recorded_when_configured() {
    let capability = CountingCapability::new("search");
    let executor = executor_with(
        vec![Arc::new(capability)],
        ExecutorConfig {
            record_cache_hits: true,
            ..ExecutorConfig::default()
        },
    );
    let options = ExecutionOptions::new().with_cache(true);

    executor.execute("search", json!({}), options.clone()).await;
    executor.execute("search", json!({}), options).await;

    let history = executor.get_history(None).await;
    assert_eq!(history.len(), 2);
    assert!(history[1].result.report.as_ref().unwrap().cached);
}

#[tokio::test(start_paused = true)]
async fn test_cache_expiry() {
    let (executor, calls) = single(CountingCapability::new("search"));
    let options = ExecutionOptions::new().with_cache_ttl(Duration::from_secs(1));

    executor.execute("search", json!({"q": "x"}), options.clone()).await;
    executor.execute("search", json!({"q": "x"}), options.clone()).await;
    assert_eq!(count(&calls), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    executor.execute("search", json!({"q": "x"}), options).await;
    assert_eq!(count(&calls), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_not_cached() {
    let (executor, calls) = single(CountingCapability::new("flaky").failing_first(1));
    let options = ExecutionOptions::new().with_cache(true);

    let first = executor.execute("flaky", json!({}), options.clone()).await;
    let second = executor.execute("flaky", json!({}), options.clone()).await;
    let third = executor.execute("flaky", json!({}), options).await;

    assert!(first.is_failure());
    assert!(second.is_success());
    assert!(third.report.unwrap().cached);
    assert_eq!(count(&calls), 2);
}

#[tokio::test]
async fn test_cache_maintenance() {
    let search = CountingCapability::new("search");
    let calls = search.calls();
    let executor = executor(vec![Arc::new(search), Arc::new(CountingCapability::new("list"))]);
    let options = ExecutionOptions::new().with_cache(true);

    executor.execute("search", json!({"q": 1}), options.clone()).await;
    executor.execute("search", json!({"q": 2}), options.clone()).await;
    executor.execute("list", json!({}), options.clone()).await;
    assert_eq!(executor.cache().len().await, 3);

    assert_eq!(executor.invalidate_cache("search").await, 2);
    executor.execute("search", json!({"q": 1}), options).await;
    assert_eq!(count(&calls), 3);

    executor.clear_cache().await;
    assert!(executor.cache().is_empty().await);
}

#[tokio::test]
async fn test_sequence_stops_at_first_failure() {
    let third = CountingCapability::new("third");
    let third_calls = third.calls();
    let executor = executor(vec![
        Arc::new(CountingCapability::new("first")),
        Arc::new(CountingCapability::new("second").always_failing()),
        Arc::new(third),
    ]);

    let results = executor
        .execute_sequence(vec![
            InvocationRequest::new("first", json!({})),
            InvocationRequest::new("second", json!({})),
            InvocationRequest::new("third", json!({})),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_success());
    assert_eq!(results[1].code(), Some(ErrorCode::ExecutionError));
    assert_eq!(count(&third_calls), 0);
}

#[tokio::test]
async fn test_sequence_runs_everything_on_success() {
    let executor = executor(vec![Arc::new(CountingCapability::new("step"))]);

    let results = executor
        .execute_sequence((0..4).map(|i| InvocationRequest::new("step", json!({"i": i}))).collect())
        .await;

    assert_eq!(results.len(), 4);
    let calls: Vec<_> = results.iter().map(|r| r.data().unwrap()["call"].clone()).collect();
    assert_eq!(calls, vec![json!(1), json!(2), json!(3), json!(4)]);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_collects_all_in_input_order() {
    let executor = executor(vec![
        Arc::new(CountingCapability::new("a").with_delay(ms(300))),
        Arc::new(CountingCapability::new("b").always_failing()),
        Arc::new(CountingCapability::new("c").with_delay(ms(100))),
    ]);

    let started_at = Instant::now();
    let results = executor
        .execute_parallel(vec![
            InvocationRequest::new("a", json!({"n": "a"})),
            InvocationRequest::new("b", json!({})),
            InvocationRequest::new("c", json!({"n": "c"})),
        ])
        .await;
    let elapsed = started_at.elapsed();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].data().unwrap()["params"], json!({"n": "a"}));
    assert!(results[1].is_failure());
    assert_eq!(results[2].data().unwrap()["params"], json!({"n": "c"}));

    // Concurrent, not summed
    assert!(elapsed >= ms(300) && elapsed < ms(400), "elapsed {:?}", elapsed);

    // History is in completion order
    let history: Vec<_> = executor
        .get_history(None)
        .await
        .into_iter()
        .map(|r| r.capability)
        .collect();
    assert_eq!(history, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn test_dry_run_never_executes() {
    let (executor, calls) = single(CountingCapability::new("write_file").requiring("path"));

    let result = executor
        .execute(
            "write_file",
            json!({"path": "/tmp/out"}),
            ExecutionOptions::new().dry_run().with_cache(true),
        )
        .await;

    assert!(result.is_success());
    assert_eq!(result.data().unwrap()["dry_run"], json!(true));
    assert!(result.report.as_ref().unwrap().dry_run);
    assert_eq!(count(&calls), 0);
    assert!(executor.cache().is_empty().await);

    let invalid = executor
        .execute("write_file", json!({}), ExecutionOptions::new().dry_run())
        .await;
    assert_eq!(invalid.code(), Some(ErrorCode::ValidationFailed));
    assert_eq!(count(&calls), 0);
}

#[tokio::test]
async fn test_history_bound_and_limit() {
    let executor = executor_with(
        vec![Arc::new(CountingCapability::new("step"))],
        ExecutorConfig {
            history_capacity: Some(3),
            ..ExecutorConfig::default()
        },
    );

    for i in 0..5 {
        executor
            .execute("step", json!({"i": i}), ExecutionOptions::default())
            .await;
    }

    let history = executor.get_history(None).await;
    assert_eq!(history.len(), 3);
    let order: Vec<_> = history.iter().map(|r| r.params["i"].clone()).collect();
    assert_eq!(order, vec![json!(2), json!(3), json!(4)]);

    let last = executor.get_history(Some(1)).await;
    assert_eq!(last[0].params, json!({"i": 4}));

    executor.clear_history().await;
    assert!(executor.get_history(None).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_observers_see_lifecycle() {
    let (executor, _calls) = single(CountingCapability::new("flaky").failing_first(1));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    executor.subscribe_fn(|_| panic!("broken observer"));
    let id = executor.subscribe_fn(move |event| {
        let label = match event {
            InvocationEvent::Started { .. } => "started",
            InvocationEvent::CacheHit { .. } => "cache_hit",
            InvocationEvent::Retrying { .. } => "retrying",
            InvocationEvent::Completed { .. } => "completed",
        };
        sink.lock().unwrap().push(label);
    });

    let result = executor
        .execute(
            "flaky",
            json!({}),
            ExecutionOptions::new()
                .with_retries(1)
                .with_retry_delay(ms(10))
                .with_cache(true)
                .on_retry(|_, _, _| panic!("broken callback")),
        )
        .await;
    assert!(result.is_success());

    executor
        .execute("flaky", json!({}), ExecutionOptions::new().with_cache(true))
        .await;

    assert_eq!(
        *events.lock().unwrap(),
        vec!["started", "retrying", "completed", "started", "cache_hit", "completed"]
    );

    assert!(executor.unsubscribe(id));
    executor.execute("flaky", json!({}), ExecutionOptions::default()).await;
    assert_eq!(events.lock().unwrap().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff() {
    let (executor, calls) = single(CountingCapability::new("broken").always_failing());
    let token = CancellationToken::new();
    let canceller = token.clone();

    tokio::spawn(async move {
        tokio::time::sleep(ms(150)).await;
        canceller.cancel();
    });

    let result = executor
        .execute(
            "broken",
            json!({}),
            ExecutionOptions::new()
                .with_retries(10)
                .with_retry_delay(ms(100))
                .with_backoff_multiplier(1.0)
                .with_cancellation(token),
        )
        .await;

    assert_eq!(result.code(), Some(ErrorCode::Cancelled));
    assert_eq!(count(&calls), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_executor_shared_across_tasks() {
    let (executor, calls) = single(CountingCapability::new("shared"));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .execute("shared", json!({"i": i}), ExecutionOptions::default())
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_success());
    }
    assert_eq!(count(&calls), 16);
    assert_eq!(executor.get_history(None).await.len(), 16);
}
