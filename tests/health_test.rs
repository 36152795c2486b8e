//! Integration tests for the health orchestrator: aggregation across
//! independently failing services, probe throttling, and timeout handling
//! through the public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use upstream_core::{
    HealthOrchestrator, HealthSettings, HealthState, ProbeFn, ServiceCheck, ServiceProbe,
    UpstreamError,
};

fn orchestrator(probe_timeout_ms: u64, slow_threshold_ms: u64) -> HealthOrchestrator {
    HealthOrchestrator::new(&HealthSettings {
        probe_timeout_ms,
        slow_threshold_ms,
    })
}

fn ok_probe() -> Arc<dyn ServiceProbe> {
    Arc::new(ProbeFn::new(|| async { Ok::<(), UpstreamError>(()) }))
}

#[tokio::test]
async fn all_healthy_reports_healthy() {
    let orchestrator = orchestrator(1_000, 500);

    let checks = vec![
        ServiceCheck::new("tmdb", Duration::ZERO, ok_probe()),
        ServiceCheck::new("sonarr", Duration::ZERO, ok_probe()),
    ];

    let overall = orchestrator.check_all(&checks).await;
    assert_eq!(overall.state, HealthState::Healthy);
    assert_eq!(overall.services.len(), 2);
    assert!(overall
        .services
        .iter()
        .all(|s| s.state == HealthState::Healthy));
}

#[tokio::test]
async fn one_unhealthy_service_fails_the_report() {
    let orchestrator = orchestrator(1_000, 500);

    let checks = vec![
        ServiceCheck::new("tmdb", Duration::ZERO, ok_probe()),
        ServiceCheck::new(
            "radarr",
            Duration::ZERO,
            Arc::new(ProbeFn::new(|| async {
                Err::<(), _>(UpstreamError::Status { code: 503 })
            })),
        ),
    ];

    let overall = orchestrator.check_all(&checks).await;
    assert_eq!(overall.state, HealthState::Unhealthy);
    assert_eq!(overall.services[1].state, HealthState::Unhealthy);
}

#[tokio::test]
async fn degraded_service_downgrades_unhealthy_to_degraded() {
    // Slow threshold of zero-ish makes any successful probe degraded
    let orchestrator = orchestrator(5_000, 1);

    let checks = vec![
        ServiceCheck::new(
            "slow",
            Duration::ZERO,
            Arc::new(ProbeFn::new(|| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<(), UpstreamError>(())
            })),
        ),
        ServiceCheck::new(
            "down",
            Duration::ZERO,
            Arc::new(ProbeFn::new(|| async {
                Err::<(), _>(UpstreamError::Network("unreachable".into()))
            })),
        ),
    ];

    let overall = orchestrator.check_all(&checks).await;
    assert_eq!(overall.services[0].state, HealthState::Degraded);
    assert_eq!(overall.services[1].state, HealthState::Unhealthy);
    assert_eq!(overall.state, HealthState::Degraded);
}

#[tokio::test]
async fn probe_timeout_is_a_status_not_an_error() {
    let orchestrator = orchestrator(40, 10);

    let probe = ProbeFn::new(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<(), UpstreamError>(())
    });

    let status = orchestrator
        .check_service("stuck", &probe, Duration::ZERO)
        .await;

    assert_eq!(status.state, HealthState::Unhealthy);
    assert!(status.message.contains("timed out"));
    assert_eq!(status.response_time_ms, None);
}

#[tokio::test]
async fn checks_within_cache_ttl_do_not_reprobe() {
    let orchestrator = orchestrator(1_000, 500);
    let probes = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&probes);
    let probe = Arc::new(ProbeFn::new(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), UpstreamError>(())
        }
    }));

    let checks = vec![ServiceCheck::new(
        "tmdb",
        Duration::from_secs(60),
        probe,
    )];

    for _ in 0..5 {
        let overall = orchestrator.check_all(&checks).await;
        assert_eq!(overall.state, HealthState::Healthy);
    }

    assert_eq!(probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_cache_entry_triggers_a_fresh_probe() {
    let orchestrator = orchestrator(1_000, 500);
    let probes = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&probes);
    let probe = ProbeFn::new(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), UpstreamError>(())
        }
    });

    let ttl = Duration::from_millis(30);
    let _ = orchestrator.check_service("tmdb", &probe, ttl).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    let _ = orchestrator.check_service("tmdb", &probe, ttl).await;

    assert_eq!(probes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unhealthy_results_are_cached_like_any_other() {
    let orchestrator = orchestrator(1_000, 500);
    let probes = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&probes);
    let probe = ProbeFn::new(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(UpstreamError::Status { code: 500 })
        }
    });

    let ttl = Duration::from_secs(60);
    let first = orchestrator.check_service("radarr", &probe, ttl).await;
    let second = orchestrator.check_service("radarr", &probe, ttl).await;

    assert_eq!(first.state, HealthState::Unhealthy);
    assert_eq!(second.state, HealthState::Unhealthy);
    assert_eq!(probes.load(Ordering::SeqCst), 1);
}
