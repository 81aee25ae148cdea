//! Session driver tests against an in-memory backend.
//!
//! Run with:
//!   cargo test --test test_session

mod common;

use common::{rows_frame, start_session, start_session_with, status_frame, EventStream};
use serde_json::json;
use shell_link::{
    CloseReason, EngineConfig, ExecutionRequest, LoadingState, ResultKey, ResultStatus,
    SessionHandlers, ShellLinkError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test]
async fn test_submit_round_trip() {
    let (session, mut backend, bus) = start_session(EngineConfig::default());
    let mut finalized = EventStream::subscribe(&bus, "resultFinalized");

    let ctx = session
        .create_context("SELECT id FROM t", None)
        .await
        .unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT id FROM t"))
        .await
        .unwrap();

    let request = backend.next_request().await;
    assert_eq!(request.request_id, id);
    assert_eq!(request.command, "execute");
    assert_eq!(request.args["sql"], "SELECT id FROM t");

    backend
        .send(json!({
            "requestId": id,
            "isFinal": false,
            "payload": {
                "kind": "rows",
                "columns": [{ "name": "id", "dataType": "int", "flags": ["pk"] }],
                "rows": [{ "id": 1 }, { "id": 2 }]
            }
        }))
        .await;
    backend
        .send(rows_frame(&id, true, json!([{ "id": 3 }])))
        .await;

    let event = finalized.next().await;
    assert_eq!(event["key"]["requestId"], id.as_str());
    assert_eq!(event["status"]["state"], "ok");

    let result = session
        .result_snapshot(&ResultKey::primary(id.clone()))
        .await
        .unwrap()
        .expect("result should be held");
    assert_eq!(result.row_count(), 3);
    assert!(result.updatable);
    assert_eq!(result.table_name.as_deref(), Some("t"));
    assert_eq!(session.context_state(&ctx).await.unwrap(), Some(LoadingState::Idle));

    session.shutdown().await;
}

#[tokio::test]
async fn test_state_changes_are_published_in_order() {
    let (session, mut backend, bus) = start_session(EngineConfig::default());
    let mut states = EventStream::subscribe(&bus, "editorContextStateChanged");

    let ctx = session.create_context("SELECT 1", None).await.unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT 1"))
        .await
        .unwrap();
    backend.next_request().await;

    let pending = states.next().await;
    assert_eq!(pending["context"], ctx.as_str());
    assert_eq!(pending["state"], "pending");

    backend.send(rows_frame(&id, true, json!([[1]]))).await;

    states.until_state("loading").await;
    states.until_state("idle").await;

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lag_timer_moves_pending_to_waiting() {
    let (session, mut backend, bus) = start_session(EngineConfig::default());
    let mut states = EventStream::subscribe(&bus, "editorContextStateChanged");

    let ctx = session.create_context("SELECT sleep(10)", None).await.unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT sleep(10)"))
        .await
        .unwrap();
    backend.next_request().await;

    assert_eq!(states.next().await["state"], "pending");
    assert_eq!(states.next().await["state"], "waiting");
    assert_eq!(
        session.context_state(&ctx).await.unwrap(),
        Some(LoadingState::Waiting)
    );

    backend.send(rows_frame(&id, false, json!([[0]]))).await;
    assert_eq!(states.next().await["state"], "loading");

    backend.send(status_frame(&id, "done", false)).await;
    assert_eq!(states.next().await["state"], "idle");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_early_data_skips_waiting() {
    let (session, mut backend, bus) = start_session(EngineConfig::default());
    let mut states = EventStream::subscribe(&bus, "editorContextStateChanged");

    let ctx = session.create_context("SELECT 1", None).await.unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT 1"))
        .await
        .unwrap();
    backend.next_request().await;
    backend.send(rows_frame(&id, false, json!([[1]]))).await;

    assert_eq!(states.next().await["state"], "pending");
    assert_eq!(states.next().await["state"], "loading");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        session.context_state(&ctx).await.unwrap(),
        Some(LoadingState::Loading)
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_stop_sends_cancel_and_drops_late_frames() {
    let (session, mut backend, bus) = start_session(EngineConfig::default());
    let mut finalized = EventStream::subscribe(&bus, "resultFinalized");

    let ctx = session.create_context("SELECT * FROM big", None).await.unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT * FROM big"))
        .await
        .unwrap();
    backend.next_request().await;

    backend.send(rows_frame(&id, false, json!([[1], [2]]))).await;
    let key = ResultKey::primary(id.clone());
    // wait until the first chunk opened the result
    loop {
        if session.result_snapshot(&key).await.unwrap().is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }

    session.stop(&ctx).await.unwrap();
    let cancel = backend.next_request().await;
    assert!(cancel.is_cancel());
    assert_eq!(cancel.request_id, id);

    let event = finalized.next().await;
    assert_eq!(event["status"]["state"], "error");
    assert_eq!(event["status"]["message"], "Execution stopped");
    assert_eq!(session.context_state(&ctx).await.unwrap(), Some(LoadingState::Idle));

    backend.send(rows_frame(&id, true, json!([[3]]))).await;
    let result = session.result_snapshot(&key).await.unwrap().unwrap();
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.status, ResultStatus::error("Execution stopped"));

    session.shutdown().await;
}

#[tokio::test]
async fn test_busy_context_rejects_second_submit() {
    let (session, mut backend, _bus) = start_session(EngineConfig::default());

    let ctx = session.create_context("SELECT 1", None).await.unwrap();
    session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT 1"))
        .await
        .unwrap();
    backend.next_request().await;

    let err = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShellLinkError::ContextBusy { .. }));
    assert!(backend.try_next_request().is_none());

    session.shutdown().await;
}

#[tokio::test]
async fn test_backend_error_is_published() {
    let (session, mut backend, bus) = start_session(EngineConfig::default());
    let mut errors = EventStream::subscribe(&bus, "showError");

    let ctx = session.create_context("SELEC 1", None).await.unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELEC 1"))
        .await
        .unwrap();
    backend.next_request().await;
    backend
        .send(status_frame(&id, "You have an error in your SQL syntax", true))
        .await;

    let event = errors.next().await;
    assert_eq!(event["context"], ctx.as_str());
    assert_eq!(event["message"], "You have an error in your SQL syntax");

    let results = session.results_for(&ctx).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].status.is_error());

    session.shutdown().await;
}

#[tokio::test]
async fn test_fetch_more_appends_next_page() {
    let config = EngineConfig::default();
    let mut options = config.options.clone();
    options.page_size = 2;
    let (session, mut backend, bus) =
        start_session(EngineConfig::new(options, config.timeouts));
    let mut finalized = EventStream::subscribe(&bus, "resultFinalized");

    let id = session
        .issue(ExecutionRequest::query("SELECT id FROM t"))
        .await
        .unwrap();
    backend.next_request().await;
    backend
        .send(rows_frame(&id, true, json!([{ "id": 1 }, { "id": 2 }])))
        .await;
    finalized.next().await;

    let key = ResultKey::primary(id.clone());
    let page_id = session.fetch_more(&key).await.unwrap();
    let request = backend.next_request().await;
    assert_eq!(request.request_id, page_id);
    assert_eq!(request.args["sql"], "SELECT id FROM t");
    assert_eq!(request.args["offset"], 2);
    assert_eq!(request.args["rowCount"], 3);

    backend
        .send(rows_frame(
            &page_id,
            true,
            json!([{ "id": 3 }, { "id": 4 }, { "id": 5 }]),
        ))
        .await;
    finalized.next().await;

    let result = session.result_snapshot(&key).await.unwrap().unwrap();
    assert_eq!(result.row_count(), 4);
    assert_eq!(result.current_page, 1);
    assert!(result.has_more_rows);

    session.shutdown().await;
}

#[tokio::test]
async fn test_inbound_close_ends_session() {
    let closed = Arc::new(Notify::new());
    let signal = closed.clone();
    let handlers = SessionHandlers::new().on_close(move |reason| {
        assert_eq!(reason, CloseReason::InboundClosed);
        signal.notify_one();
    });
    let (session, mut backend, _bus) = start_session_with(EngineConfig::default(), handlers);

    backend.close();
    tokio::time::timeout(common::WAIT, closed.notified())
        .await
        .expect("session should close");

    let err = session.create_context("SELECT 1", None).await.unwrap_err();
    assert_eq!(err, ShellLinkError::SessionClosed);
}

#[tokio::test]
async fn test_shutdown_cancels_running_requests() {
    let (session, mut backend, _bus) = start_session(EngineConfig::default());

    let ctx = session.create_context("SELECT 1", None).await.unwrap();
    let id = session
        .submit_execution(&ctx, ExecutionRequest::query("SELECT 1"))
        .await
        .unwrap();
    backend.next_request().await;

    let observer = session.clone();
    session.shutdown().await;

    let cancel = backend.next_request().await;
    assert!(cancel.is_cancel());
    assert_eq!(cancel.request_id, id);
    assert!(observer.is_closed());
}
