#![allow(clippy::unwrap_used)]
// Session and request queue behaviour against a scripted backend.
//
// Timing assertions run on Tokio's paused clock, so latencies are exact.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use fritzgate_api::Procedure;
use fritzgate_core::{CoreError, GatewayConfig, RequestQueue, SessionManager};

use common::{Login, MockBackend, Outcome};

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    backend: Arc<MockBackend>,
    session: SessionManager,
    queue: RequestQueue,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

fn setup(backend: MockBackend, config: &GatewayConfig) -> Harness {
    let backend = Arc::new(backend);
    let session = SessionManager::new(backend.clone(), config.credentials.clone());
    let cancel = CancellationToken::new();
    let (queue, task) = RequestQueue::spawn(
        backend.clone(),
        session.clone(),
        config.dispatch,
        config.retry,
        cancel.clone(),
    );
    Harness {
        backend,
        session,
        queue,
        cancel,
        task,
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn switch_state(ain: &str) -> (Procedure, Vec<serde_json::Value>) {
    (Procedure::GetSwitchState, vec![json!(ain)])
}

// ── Session reuse and renewal ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_calls_share_one_session() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let (procedure, args) = switch_state(&format!("1000{i}"));
            h.queue.invoke(procedure, args)
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), json!(true));
    }

    assert_eq!(h.backend.logins(), 1);
    let sids: BTreeSet<String> = h.backend.started().into_iter().map(|c| c.sid).collect();
    assert_eq!(sids.len(), 1);
    assert_eq!(h.session.current().unwrap().generation, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_first_calls_log_in_once() {
    let h = setup(
        MockBackend::new()
            .with_latency(ms(100))
            .with_login_latency(ms(50))
            .answer(Procedure::GetSwitchState, json!(false)),
        &common::concurrent(4),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let (procedure, args) = switch_state(&format!("2000{i}"));
            h.queue.invoke(procedure, args)
        })
        .collect();
    let results = join_all(handles).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.backend.logins(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_renews_once_for_a_burst() {
    let h = setup(
        MockBackend::new()
            .with_latency(ms(100))
            .with_login_latency(ms(50))
            .answer(Procedure::GetSwitchState, json!(true)),
        &common::concurrent(8),
    );
    let (procedure, args) = switch_state("11630");
    h.queue.invoke(procedure, args).await.unwrap();
    assert_eq!(h.backend.logins(), 1);

    h.backend.expire_session();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let (procedure, args) = switch_state(&format!("3000{i}"));
            h.queue.invoke(procedure, args)
        })
        .collect();
    let results = join_all(handles).await;

    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert_eq!(h.backend.logins(), 2);
    assert_eq!(h.session.current().unwrap().generation, 2);
}

#[tokio::test(start_paused = true)]
async fn test_serialized_expiry_renews_once() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );
    let (procedure, args) = switch_state("11630");
    h.queue.invoke(procedure, args).await.unwrap();

    h.backend.expire_session();
    let handles: Vec<_> = (0..3)
        .map(|i| {
            let (procedure, args) = switch_state(&format!("4000{i}"));
            h.queue.invoke(procedure, args)
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.backend.logins(), 2);
    // first call after expiry retried with the new id, the rest used it directly
    let sids: Vec<String> = h.backend.started().into_iter().map(|c| c.sid).collect();
    assert_eq!(sids.len(), 5);
    assert_eq!(sids[0], sids[1]);
    assert!(sids[2..].iter().all(|sid| *sid == sids[2]));
    assert_ne!(sids[0], sids[2]);
}

#[tokio::test(start_paused = true)]
async fn test_second_expiry_is_authentication_failure() {
    let h = setup(MockBackend::new(), &common::config());
    h.backend.always(Procedure::GetSwitchState, Outcome::Expired);

    let (procedure, args) = switch_state("11630");
    let result = h.queue.invoke(procedure, args).await;

    assert!(matches!(result, Err(CoreError::AuthenticationFailed { .. })));
    assert_eq!(h.backend.logins(), 2);
    assert_eq!(h.backend.calls_to(Procedure::GetSwitchState).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_login_fails_call_and_next_call_retries() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );
    h.backend.fail_logins(true);

    let (procedure, args) = switch_state("11630");
    let result = h.queue.invoke(procedure, args.clone()).await;
    assert!(result.as_ref().is_err_and(CoreError::is_authentication_failed));
    assert!(h.session.current().is_none());
    assert!(h.backend.started().is_empty());

    h.backend.fail_logins(false);
    assert_eq!(h.queue.invoke(procedure, args).await.unwrap(), json!(true));
    assert_eq!(h.backend.logins(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_box_at_login_is_authentication_failure() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchState, json!(true)),
        &common::retry(common::config(), 3, Duration::from_secs(3)),
    );
    h.backend.script_logins([Login::TimedOut]);

    let (procedure, args) = switch_state("1");
    let result = h.queue.invoke(procedure, args.clone()).await;

    let err = result.unwrap_err();
    assert!(err.is_authentication_failed(), "{err:?}");
    assert!(err.is_backend_unreachable());
    assert!(err.to_string().contains("timed out"), "{err}");
    assert_eq!(h.backend.logins(), 1);
    assert!(h.backend.started().is_empty());

    // next call logs in again
    assert_eq!(h.queue.invoke(procedure, args).await.unwrap(), json!(true));
    assert_eq!(h.backend.logins(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_sid_during_renewal_is_authentication_failure() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );
    let (procedure, args) = switch_state("11630");
    h.queue.invoke(procedure, args.clone()).await.unwrap();

    h.backend.expire_session();
    h.backend.script_logins([Login::ZeroSid]);
    let result = h.queue.invoke(procedure, args).await;

    let err = result.unwrap_err();
    assert!(err.is_authentication_failed(), "{err:?}");
    assert!(!err.is_backend_unreachable());
    assert!(h.session.current().is_none());
    assert_eq!(h.backend.logins(), 2);
    assert_eq!(h.backend.calls_to(Procedure::GetSwitchState).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_holder_does_not_disturb_renewed_session() {
    let h = setup(MockBackend::new(), &common::config());

    let first = h.session.token().await.unwrap();
    h.backend.expire_session();
    let renewed = h.session.renew(&first).await.unwrap();
    assert_eq!(renewed.generation, 2);

    h.session.invalidate(&first);
    assert_eq!(h.session.current().unwrap().generation, 2);
    let again = h.session.renew(&first).await.unwrap();
    assert_eq!(again.generation, 2);
    assert_eq!(h.backend.logins(), 2);
    assert_eq!(h.session.renewal_count(), 2);
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_after_delay() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchPower, json!(1500)),
        &common::retry(common::config(), 3, Duration::from_secs(3)),
    );
    h.backend.script(
        Procedure::GetSwitchPower,
        [Outcome::Unavailable, Outcome::Unavailable],
    );

    let start = Instant::now();
    let value = h
        .queue
        .invoke(Procedure::GetSwitchPower, vec![json!("11630")])
        .await
        .unwrap();

    assert_eq!(value, json!(1500));
    assert_eq!(h.backend.calls_to(Procedure::GetSwitchPower).len(), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "took {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_are_backend_unavailable() {
    let h = setup(
        MockBackend::new(),
        &common::retry(common::config(), 3, Duration::from_secs(3)),
    );
    h.backend
        .always(Procedure::GetSwitchPower, Outcome::Unavailable);

    let result = h
        .queue
        .invoke(Procedure::GetSwitchPower, vec![json!("11630")])
        .await;

    assert!(matches!(result, Err(CoreError::BackendUnavailable { .. })));
    assert_eq!(h.backend.calls_to(Procedure::GetSwitchPower).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rejection_is_not_retried() {
    let h = setup(MockBackend::new(), &common::config());
    h.backend
        .script(Procedure::SetTempTarget, [Outcome::Rejected]);

    let result = h
        .queue
        .invoke(Procedure::SetTempTarget, vec![json!("11630"), json!(99)])
        .await;

    assert!(matches!(result, Err(CoreError::Rejected { .. })));
    assert_eq!(h.backend.calls_to(Procedure::SetTempTarget).len(), 1);
}

// ── Dispatch ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_serialized_calls_run_in_enqueue_order() {
    let h = setup(
        MockBackend::new()
            .with_latency(ms(100))
            .answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );
    let ains: Vec<String> = (0..10).map(|i| format!("5000{i}")).collect();

    let start = Instant::now();
    let handles: Vec<_> = ains
        .iter()
        .map(|ain| {
            let (procedure, args) = switch_state(ain);
            h.queue.invoke(procedure, args)
        })
        .collect();
    join_all(handles).await;
    let elapsed = start.elapsed();

    let finished: Vec<String> = h
        .backend
        .finished()
        .into_iter()
        .map(|c| c.args[0].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(finished, ains);
    assert_eq!(h.backend.max_in_flight(), 1);
    assert!(elapsed >= ms(1000), "took {elapsed:?}");
    assert!(elapsed < ms(1100), "took {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_dispatch_is_bounded() {
    let h = setup(
        MockBackend::new()
            .with_latency(ms(100))
            .answer(Procedure::GetSwitchState, json!(true)),
        &common::concurrent(3),
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let (procedure, args) = switch_state(&format!("6000{i}"));
            h.queue.invoke(procedure, args)
        })
        .collect();
    let results = join_all(handles).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.backend.max_in_flight(), 3);
    assert!(elapsed >= ms(400), "took {elapsed:?}");
    assert!(elapsed < ms(1000), "took {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_still_runs_in_order() {
    let h = setup(
        MockBackend::new().answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );

    drop(h.queue.invoke(Procedure::SetSwitchOn, vec![json!("11630")]));
    let (procedure, args) = switch_state("11630");
    h.queue.invoke(procedure, args).await.unwrap();

    let procedures: Vec<Procedure> = h.backend.started().into_iter().map(|c| c.procedure).collect();
    assert_eq!(
        procedures,
        vec![Procedure::SetSwitchOn, Procedure::GetSwitchState]
    );
    assert_eq!(h.queue.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_queue_resolves_queue_closed() {
    let h = setup(MockBackend::new(), &common::config());
    h.cancel.cancel();
    h.task.await.unwrap();

    let (procedure, args) = switch_state("11630");
    let result = h.queue.invoke(procedure, args).await;

    assert!(matches!(result, Err(CoreError::QueueClosed)));
    assert!(h.backend.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_pending_for_unstarted_calls() {
    let h = setup(
        MockBackend::new()
            .with_latency(ms(100))
            .answer(Procedure::GetSwitchState, json!(true)),
        &common::config(),
    );
    let (procedure, args) = switch_state("11630");
    let handles: Vec<_> = (0..3)
        .map(|_| h.queue.invoke(procedure, args.clone()))
        .collect();
    assert_eq!(h.queue.pending(), 3);

    tokio::time::sleep(ms(50)).await;
    h.cancel.cancel();
    h.task.await.unwrap();

    let results = join_all(handles).await;
    assert!(results[0].is_ok(), "{:?}", results[0]);
    assert!(
        results[1..]
            .iter()
            .all(|r| matches!(r, Err(CoreError::QueueClosed)))
    );
    assert_eq!(h.queue.pending(), 0);
    assert_eq!(h.backend.calls_to(Procedure::GetSwitchState).len(), 1);
}
