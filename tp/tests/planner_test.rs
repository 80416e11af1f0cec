//! Integration tests for tripdaemon
//!
//! These run the real stage providers with no API credentials
//! configured, so every external stage degrades to synthetic data and
//! sessions must still complete.

use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use tripdaemon::config::{FlightApiConfig, OrchestratorConfig, PlacesApiConfig, ProvidersConfig};
use tripdaemon::domain::{DataSource, SessionStatus, Stage};
use tripdaemon::ipc::{self, PlannerClient};
use tripdaemon::normalizer::{RawPreferences, RawTripRequest};
use tripdaemon::orchestrator::PlanManager;
use tripdaemon::service::PlannerService;
use tripdaemon::stages::ProviderSet;
use tripdaemon::state::SessionStore;

/// Providers pointing at environment variables that are never set, so
/// every live call degrades immediately without touching the network
fn offline_providers() -> ProviderSet {
    let config = ProvidersConfig {
        flight: FlightApiConfig {
            client_id_env: "TRIPDAEMON_ITEST_UNSET_ID".to_string(),
            client_secret_env: "TRIPDAEMON_ITEST_UNSET_SECRET".to_string(),
            ..Default::default()
        },
        places: PlacesApiConfig {
            api_key_env: "TRIPDAEMON_ITEST_UNSET_KEY".to_string(),
            ..Default::default()
        },
    };
    ProviderSet::from_config(&config).unwrap()
}

fn orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_concurrent_sessions: 8,
        session_deadline_secs: 30,
        reap_interval_secs: 1,
        shutdown_timeout_secs: 5,
    }
}

fn paris_request() -> RawTripRequest {
    RawTripRequest {
        destination: Some("Paris".to_string()),
        origin: None,
        start_date: Some("2024-06-01".to_string()),
        end_date: Some("2024-06-04".to_string()),
        budget: Some(1500.0),
        travelers: Some(2),
        preferences: Some(RawPreferences {
            activities: Some(vec!["culture".to_string(), "food".to_string()]),
            pace: Some("moderate".to_string()),
            ..Default::default()
        }),
    }
}

struct Daemon {
    store: SessionStore,
    service: PlannerService,
    shutdown_tx: mpsc::Sender<()>,
    manager_task: tokio::task::JoinHandle<()>,
}

fn spawn_daemon() -> Daemon {
    let store = SessionStore::new();
    let (manager, handle) = PlanManager::new(orchestrator_config(), store.clone(), offline_providers());
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let manager_task = tokio::spawn(manager.run(shutdown_rx));
    let service = PlannerService::new(store.clone(), handle);
    Daemon {
        store,
        service,
        shutdown_tx,
        manager_task,
    }
}

impl Daemon {
    async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.manager_task.await;
    }
}

async fn poll_until_terminal(service: &PlannerService, session_id: Uuid) -> SessionStatus {
    for _ in 0..300 {
        let view = service.status(&session_id).unwrap();
        if matches!(view.status, SessionStatus::Completed | SessionStatus::Failed) {
            return view.status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session {session_id} never became terminal");
}

#[tokio::test]
async fn test_degraded_session_still_completes_with_full_plan() {
    let daemon = spawn_daemon();

    let receipt = daemon.service.submit(&paris_request()).await.unwrap();
    let status = poll_until_terminal(&daemon.service, receipt.session_id).await;
    assert_eq!(status, SessionStatus::Completed);

    let session = daemon.store.get(&receipt.session_id).unwrap();
    let plan = session.plan.expect("completed session must carry a plan");

    assert_eq!(plan.duration, 3);
    assert!(plan.total_cost >= 0.0);
    assert_eq!(plan.stage_results.len(), 5);
    for stage in Stage::PIPELINE {
        assert!(
            plan.stage_results.iter().any(|r| r.stage == stage),
            "missing {stage} result"
        );
    }

    // Every external stage degraded, yet payloads keep the live shape
    for result in &plan.stage_results {
        match result.stage {
            Stage::Recommendation => {
                assert_eq!(result.source, DataSource::Synthetic);
                assert!(result.payload.get("activity_recommendations").is_some());
            }
            Stage::Flight => {
                assert_eq!(result.source, DataSource::Synthetic);
                assert!(result.payload.get("flight_options").is_some());
            }
            Stage::Hotel => {
                assert_eq!(result.source, DataSource::Synthetic);
                assert!(result.payload.get("hotel_options").is_some());
            }
            Stage::Itinerary => {
                assert!(result.payload.get("daily_plans").is_some());
            }
            Stage::Budget => {
                assert!(result.payload.get("summary").is_some());
            }
        }
    }

    daemon.stop().await;
}

#[tokio::test]
async fn test_stage_execution_order() {
    let daemon = spawn_daemon();

    let receipt = daemon.service.submit(&paris_request()).await.unwrap();
    poll_until_terminal(&daemon.service, receipt.session_id).await;

    let session = daemon.store.get(&receipt.session_id).unwrap();
    let order: Vec<Stage> = session.stage_results.iter().map(|r| r.stage).collect();

    // Recommendation first, flight/hotel in either order, then
    // itinerary, then budget
    assert_eq!(order[0], Stage::Recommendation);
    assert!(order[1..3].contains(&Stage::Flight));
    assert!(order[1..3].contains(&Stage::Hotel));
    assert_eq!(order[3], Stage::Itinerary);
    assert_eq!(order[4], Stage::Budget);

    for pair in session.stage_results.windows(2) {
        assert!(pair[0].completed_at <= pair[1].completed_at);
    }

    daemon.stop().await;
}

#[tokio::test]
async fn test_status_immediately_after_submission() {
    let daemon = spawn_daemon();

    let receipt = daemon.service.submit(&paris_request()).await.unwrap();
    let view = daemon.service.status(&receipt.session_id).unwrap();

    assert!(matches!(
        view.status,
        SessionStatus::Queued | SessionStatus::Running | SessionStatus::Completed
    ));
    if view.status != SessionStatus::Completed {
        assert!(view.trip_plan.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("trip_plan").is_none());
    }

    daemon.stop().await;
}

#[tokio::test]
async fn test_invalid_submission_lists_fields_and_creates_nothing() {
    let daemon = spawn_daemon();

    let raw = RawTripRequest {
        start_date: Some("2024-06-01".to_string()),
        end_date: Some("2024-06-04".to_string()),
        preferences: Some(RawPreferences::default()),
        ..Default::default()
    };

    let err = daemon.service.submit(&raw).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("destination"));
    assert!(message.contains("budget"));

    assert_eq!(daemon.service.metrics().total_sessions, 0);
    assert!(daemon.service.status(&Uuid::now_v7()).is_err());

    daemon.stop().await;
}

#[tokio::test]
async fn test_concurrent_sessions_never_interleave() {
    let daemon = spawn_daemon();

    let mut tokyo = paris_request();
    tokyo.destination = Some("Tokyo".to_string());
    let mut lima = paris_request();
    lima.destination = Some("Lima".to_string());

    let a = daemon.service.submit(&tokyo).await.unwrap();
    let b = daemon.service.submit(&lima).await.unwrap();

    assert_eq!(
        poll_until_terminal(&daemon.service, a.session_id).await,
        SessionStatus::Completed
    );
    assert_eq!(
        poll_until_terminal(&daemon.service, b.session_id).await,
        SessionStatus::Completed
    );

    for (id, destination) in [(a.session_id, "Tokyo"), (b.session_id, "Lima")] {
        let session = daemon.store.get(&id).unwrap();
        for result in &session.stage_results {
            if let Some(criteria) = result.payload.get("search_criteria") {
                assert_eq!(criteria["destination"], destination);
            }
            if let Some(d) = result.payload.get("destination") {
                assert_eq!(d, destination);
            }
        }
    }

    daemon.stop().await;
}

#[tokio::test]
async fn test_ipc_round_trip() {
    let daemon = spawn_daemon();

    let temp = TempDir::new().unwrap();
    let socket_path = temp.path().join("tripdaemon-test.sock");
    let (listener, socket_path) = ipc::create_listener_at(&socket_path).unwrap();

    // The sender stays alive for the whole test; dropping it would close
    // the serve loop's shutdown channel and stop it early.
    let (_serve_shutdown_tx, serve_shutdown_rx) = mpsc::channel::<()>(1);
    let serve_task = tokio::spawn(ipc::serve(listener, daemon.service.clone(), serve_shutdown_rx));

    let client = PlannerClient::with_socket_path(socket_path.clone());

    // Ping
    let version = client.ping().await.unwrap();
    assert_eq!(version, tripdaemon::VERSION);

    // Submit and poll over the socket
    let receipt = client.submit(&paris_request()).await.unwrap();
    assert_eq!(receipt.status, SessionStatus::Queued);

    let mut completed = false;
    for _ in 0..300 {
        let view = client.status(receipt.session_id).await.unwrap();
        if view.status == SessionStatus::Completed {
            assert!(view.trip_plan.is_some());
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(completed, "session never completed over IPC");

    // Invalid request comes back as a field listing, not a session
    let invalid = RawTripRequest::default();
    let err = client.submit(&invalid).await.unwrap_err();
    assert!(err.to_string().contains("destination"));

    // Unknown session id is a not-found, never a crash
    let phantom = Uuid::now_v7();
    let err = client.status(phantom).await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    // Metrics count the one real session
    let metrics = client.metrics().await.unwrap();
    assert_eq!(metrics.total_sessions, 1);
    assert_eq!(metrics.completed, 1);

    // Graceful shutdown ends the serve loop
    client.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), serve_task)
        .await
        .expect("serve loop did not stop")
        .unwrap()
        .unwrap();

    ipc::cleanup_socket(&socket_path);
    daemon.stop().await;
}
