#![allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity

//! Tests for health endpoints

use super::*;
use std::time::Duration;

/// Wait for server to be ready with exponential backoff
async fn wait_for_server(port: u16, max_retries: u32) -> Result<(), String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let mut delay = Duration::from_millis(10);
    for attempt in 0..max_retries {
        match client
            .get(format!("http://127.0.0.1:{}/healthz", port))
            .send()
            .await
        {
            Ok(_) => return Ok(()),
            Err(_) => {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_millis(500));
                if attempt == max_retries - 1 {
                    return Err(format!("Server not ready after {} attempts", max_retries));
                }
            }
        }
    }
    Err("Server not ready".to_string())
}

#[tokio::test]
async fn test_healthz_returns_200() {
    let readiness = ReadinessState::new();
    let (_shutdown_controller, shutdown_signal) = shutdown_channel();
    let port = 18090; // Use high port for tests

    let server_readiness = readiness.clone();
    let server_handle = tokio::spawn(async move {
        run_health_server(port, server_readiness, shutdown_signal).await
    });

    wait_for_server(port, 10).await.expect("Server should start");

    let response = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{}/healthz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to health server");

    assert_eq!(response.status(), 200, "Liveness probe should return 200");

    server_handle.abort();
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let readiness = ReadinessState::new();
    assert!(!readiness.is_ready(), "Should start as not ready");
    let (_shutdown_controller, shutdown_signal) = shutdown_channel();
    let port = 18091;

    let server_readiness = readiness.clone();
    let server_handle = tokio::spawn(async move {
        run_health_server(port, server_readiness, shutdown_signal).await
    });

    wait_for_server(port, 10).await.expect("Server should start");

    let response = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{}/readyz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to health server");

    assert_eq!(
        response.status(),
        503,
        "Readiness probe should return 503 when not ready"
    );

    server_handle.abort();
}

#[tokio::test]
async fn test_readyz_returns_200_when_ready() {
    let readiness = ReadinessState::new();
    readiness.set_ready();
    let (_shutdown_controller, shutdown_signal) = shutdown_channel();
    let port = 18092;

    let server_readiness = readiness.clone();
    let server_handle = tokio::spawn(async move {
        run_health_server(port, server_readiness, shutdown_signal).await
    });

    wait_for_server(port, 10).await.expect("Server should start");

    let response = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{}/readyz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to health server");

    assert_eq!(
        response.status(),
        200,
        "Readiness probe should return 200 when ready"
    );

    server_handle.abort();
}

#[tokio::test]
async fn test_server_stops_on_shutdown_signal() {
    let readiness = ReadinessState::new();
    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let port = 18093;

    let server_readiness = readiness.clone();
    let server_handle = tokio::spawn(async move {
        run_health_server(port, server_readiness, shutdown_signal).await
    });

    wait_for_server(port, 10).await.expect("Server should start");

    shutdown_controller.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("Server should stop after shutdown signal")
        .expect("Server task should not panic");
    assert!(result.is_ok(), "Graceful shutdown is not an error");
}

#[test]
fn test_readiness_state_transitions() {
    let state = ReadinessState::new();

    assert!(!state.is_ready());
    state.set_ready();
    assert!(state.is_ready());
    state.set_not_ready();
    assert!(!state.is_ready());

    // Clone shares state
    state.set_ready();
    let cloned = state.clone();
    assert!(cloned.is_ready());
}
