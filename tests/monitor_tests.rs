
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use reservoir::config::MonitorConfig;
use reservoir::fleet::{WorkerHandle, WorkerIdentity, WorkerRegistry, WorkerState};
use reservoir::monitor::HealthMonitor;
use reservoir::scheduler::SchedulerBridge;
use test_harness::{fast_monitor_config, wait_for, Outcome, RecordingEngine, ScriptedProber};

struct Fixture {
    registry: Arc<WorkerRegistry>,
    engine: Arc<RecordingEngine>,
    prober: Arc<ScriptedProber>,
    bridge: SchedulerBridge,
    cancel: CancellationToken,
}

impl Fixture {
    async fn new(workers: &[(&str, u32)], prober: ScriptedProber) -> Self {
        let registry = Arc::new(WorkerRegistry::new());
        for (name, count) in workers {
            for i in 0..*count {
                registry
                    .insert(WorkerHandle::new(WorkerIdentity::new(*name, i), "10.0.0.1"))
                    .unwrap();
            }
        }
        let engine = Arc::new(RecordingEngine::new());
        let bridge = SchedulerBridge::new(engine.clone());
        bridge.start().await.unwrap();
        Self {
            registry,
            engine,
            prober: Arc::new(prober),
            bridge,
            cancel: CancellationToken::new(),
        }
    }

    fn monitor(&self, config: MonitorConfig) -> HealthMonitor {
        HealthMonitor::new(
            config,
            self.registry.clone(),
            self.prober.clone(),
            self.bridge.reporter(),
            self.cancel.clone(),
        )
    }
}

#[tokio::test]
async fn test_transitions_reach_engine_in_order() {
    let id = WorkerIdentity::new("alpha", 0);
    let prober = ScriptedProber::always(Outcome::Up).with_script(
        id.clone(),
        &[Outcome::Up, Outcome::Down, Outcome::Up],
    );
    let fx = Fixture::new(&[("alpha", 1)], prober).await;
    let monitor = fx.monitor(fast_monitor_config());

    for _ in 0..3 {
        monitor.probe_all().await;
    }
    fx.bridge.shutdown().await;

    let states: Vec<(WorkerState, WorkerState)> = fx
        .engine
        .transitions_for(&id)
        .into_iter()
        .map(|t| (t.old, t.new))
        .collect();
    assert_eq!(
        states,
        vec![
            (WorkerState::Unknown, WorkerState::Healthy),
            (WorkerState::Healthy, WorkerState::Unreachable),
            (WorkerState::Unreachable, WorkerState::Healthy),
        ]
    );
}

#[tokio::test]
async fn test_repeated_same_result_reports_once() {
    let fx = Fixture::new(&[("alpha", 2)], ScriptedProber::always(Outcome::Up)).await;
    let monitor = fx.monitor(fast_monitor_config());

    for _ in 0..4 {
        monitor.probe_all().await;
    }
    fx.bridge.shutdown().await;

    assert_eq!(fx.engine.transitions().len(), 2);
    assert_eq!(fx.registry.count_in(WorkerState::Healthy), 2);
}

#[tokio::test]
async fn test_timeout_resolves_to_unreachable() {
    let fx = Fixture::new(&[("alpha", 1)], ScriptedProber::always(Outcome::Hang)).await;
    let monitor = fx.monitor(fast_monitor_config());

    monitor.probe_all().await;

    let worker = fx.registry.get(&WorkerIdentity::new("alpha", 0)).unwrap();
    assert_eq!(worker.state, WorkerState::Unreachable);
    assert!(worker.handle.status.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_disabled_workers_are_not_probed() {
    let fx = Fixture::new(&[("alpha", 2)], ScriptedProber::always(Outcome::Up)).await;
    fx.registry.disable_all();
    let monitor = fx.monitor(fast_monitor_config());

    monitor.probe_all().await;

    assert_eq!(fx.prober.calls(), 0);
    assert_eq!(fx.registry.count_in(WorkerState::Disabled), 2);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let fx = Fixture::new(
        &[("alpha", 6)],
        ScriptedProber::always(Outcome::Slow(Duration::from_millis(40))),
    )
    .await;
    let config = MonitorConfig {
        max_concurrent_probes: 2,
        probe_timeout_ms: 1000,
        ..fast_monitor_config()
    };
    let monitor = fx.monitor(config);

    monitor.probe_all().await;

    assert_eq!(fx.prober.calls(), 6);
    assert!(fx.prober.max_in_flight() <= 2);
    assert_eq!(fx.registry.count_in(WorkerState::Healthy), 6);
}

#[tokio::test]
async fn test_slow_host_does_not_delay_healthy_hosts() {
    let prober = ScriptedProber::always(Outcome::Up).with_default_for("stuck", Outcome::Hang);
    let fx = Fixture::new(&[("fast", 2), ("stuck", 1)], prober).await;
    let config = MonitorConfig {
        probe_timeout_ms: 1000,
        ..fast_monitor_config()
    };
    let handle = tokio::spawn(fx.monitor(config).run());

    let registry = fx.registry.clone();
    let fast_healthy = wait_for(Duration::from_millis(500), || {
        let registry = registry.clone();
        async move { registry.count_in(WorkerState::Healthy) == 2 }
    })
    .await;
    assert!(fast_healthy, "fast workers should be healthy long before the stuck probe times out");
    assert_eq!(
        fx.registry.state(&WorkerIdentity::new("stuck", 0)),
        Some(WorkerState::Unknown)
    );

    fx.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("monitor should stop within one probe timeout")
        .unwrap();

    // The in-flight probe was allowed to run into its timeout.
    assert_eq!(
        fx.registry.state(&WorkerIdentity::new("stuck", 0)),
        Some(WorkerState::Unreachable)
    );
}

#[tokio::test]
async fn test_worker_never_has_overlapping_probes() {
    let fx = Fixture::new(
        &[("alpha", 1)],
        ScriptedProber::always(Outcome::Slow(Duration::from_millis(120))),
    )
    .await;
    let config = MonitorConfig {
        probe_interval_ms: 10,
        probe_timeout_ms: 1000,
        ..fast_monitor_config()
    };
    let handle = tokio::spawn(fx.monitor(config).run());

    tokio::time::sleep(Duration::from_millis(400)).await;
    fx.cancel.cancel();
    handle.await.unwrap();

    assert!(fx.prober.calls() >= 2);
    assert_eq!(fx.prober.max_in_flight(), 1);
}

#[tokio::test]
async fn test_no_probes_after_stop() {
    let fx = Fixture::new(&[("alpha", 3)], ScriptedProber::always(Outcome::Up)).await;
    let handle = tokio::spawn(fx.monitor(fast_monitor_config()).run());

    let prober = fx.prober.clone();
    assert!(
        wait_for(Duration::from_secs(1), || {
            let prober = prober.clone();
            async move { prober.calls() >= 6 }
        })
        .await
    );

    fx.cancel.cancel();
    handle.await.unwrap();
    let calls_at_stop = fx.prober.calls();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fx.prober.calls(), calls_at_stop);
}

#[tokio::test]
async fn test_monitor_keeps_probing_until_recovery() {
    let id = WorkerIdentity::new("alpha", 0);
    let prober = ScriptedProber::always(Outcome::Up)
        .with_script(id.clone(), &[Outcome::Down, Outcome::Down, Outcome::Down]);
    let fx = Fixture::new(&[("alpha", 1)], prober).await;
    let handle = tokio::spawn(fx.monitor(fast_monitor_config()).run());

    let registry = fx.registry.clone();
    let probe_id = id.clone();
    assert!(
        wait_for(Duration::from_secs(1), || {
            let registry = registry.clone();
            let id = probe_id.clone();
            async move { registry.state(&id) == Some(WorkerState::Healthy) }
        })
        .await
    );

    fx.cancel.cancel();
    handle.await.unwrap();
    fx.bridge.shutdown().await;

    let states: Vec<WorkerState> = fx
        .engine
        .transitions_for(&id)
        .into_iter()
        .map(|t| t.new)
        .collect();
    assert_eq!(states, vec![WorkerState::Unreachable, WorkerState::Healthy]);
}
