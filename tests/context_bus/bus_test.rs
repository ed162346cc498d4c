/*!
 * Observation Bus Tests
 * Dispatch loop completeness, metrics flushing and self-latency recording
 */

use crate::common::{context, quiet, submit, RecordingSink};
use context_bus::configure::{AttributeRule, MetricKind, MetricsRule};
use context_bus::event::Path;
use context_bus::observation::LogTracer;
use context_bus::{
    BusConfig, ContextBus, ObservationConfigure, ObservationType, ProfileSource, RawConfigure,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn counted(kind: ObservationType, metric: &str) -> ObservationConfigure {
    ObservationConfigure {
        metrics: vec![MetricsRule {
            kind: MetricKind::Counter,
            name: metric.into(),
            attrs: vec![AttributeRule::new("message", Path::app_message())],
            prev_name: None,
            value: None,
        }],
        ..quiet(kind)
    }
}

fn recording_bus(config: BusConfig, raw: &RawConfigure) -> (ContextBus, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let bus = ContextBus::with_backends(config, Arc::new(LogTracer::new()), sink.clone());
    bus.store().set_default(raw).unwrap();
    (bus, sink)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_drained_exactly_once() {
    let raw = RawConfigure::new().with_observation("Tick", counted(ObservationType::Single, "ticks"));
    let config = BusConfig::bus_only().with_drain_interval(Duration::from_millis(5));
    let (bus, sink) = recording_bus(config, &raw);
    let bus = Arc::new(bus);
    let background = bus.start().unwrap();

    let submitters: Vec<_> = (0..8u64)
        .map(|request_id| {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let mut ctx = context(&bus, request_id);
                for _ in 0..250 {
                    submit(&bus, &mut ctx, "Tick").await;
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.await.unwrap();
    }

    for _ in 0..200 {
        if bus.bus().pending() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    background.shutdown().await;

    let stats = bus.bus().queue_stats();
    assert_eq!(stats.produced, 2_000);
    assert_eq!(stats.consumed, 2_000);

    let snapshot = bus.bus().metrics().snapshot();
    assert_eq!(snapshot.counters.get("ticks{message=\"Tick happened\"}"), Some(&2_000.0));
    assert!(sink.pushes.load(Ordering::Relaxed) >= 1);
}

#[tokio::test]
async fn test_histogram_measures_chain_latency() {
    let latency = ObservationConfigure {
        metrics: vec![MetricsRule {
            kind: MetricKind::Histogram,
            name: "checkout_ms".into(),
            attrs: vec![],
            prev_name: Some("CartOpened".into()),
            value: None,
        }],
        ..quiet(ObservationType::End)
    };
    let raw = RawConfigure::new()
        .with_observation("CartOpened", quiet(ObservationType::Start))
        .with_observation("CartPaid", latency);
    let (bus, sink) = recording_bus(BusConfig::bus_only(), &raw);

    let mut ctx = context(&bus, 1);
    submit(&bus, &mut ctx, "CartOpened").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    submit(&bus, &mut ctx, "CartPaid").await;

    let stats = bus.bus().drain();
    assert_eq!(stats.counts.metrics, 1);
    assert_eq!(sink.pushes.load(Ordering::Relaxed), 1);

    let pushed = sink.last.lock().clone().unwrap();
    let histogram = &pushed.histograms["checkout_ms"];
    assert_eq!(histogram.count, 1);
    assert!(histogram.sum >= 20.0);
}

#[tokio::test]
async fn test_perf_recorder_enabled_by_config() {
    let raw = RawConfigure::new().with_observation("Tick", counted(ObservationType::Single, "ticks"));
    let (bus, _) = recording_bus(BusConfig::bus_only().with_perf_metrics(64), &raw);

    let mut ctx = context(&bus, 1);
    for _ in 0..3 {
        submit(&bus, &mut ctx, "Tick").await;
    }
    bus.bus().drain();

    let perf = bus.bus().perf().unwrap().calculate();
    let stats = perf.values().next().unwrap();
    assert_eq!(stats.count, 3);
    assert!(stats.channel.max >= stats.channel.min);
}

#[tokio::test]
async fn test_start_stop_restart() {
    let (bus, _) = recording_bus(BusConfig::bus_only(), &RawConfigure::new());

    let first = bus.start().unwrap();
    assert!(bus.start().is_err());
    first.shutdown().await;

    let second = bus.start().unwrap();
    assert!(second.bus().is_some());
    second.shutdown().await;
}

#[tokio::test]
async fn test_profiler_task_publishes_profiles() {
    let config = BusConfig::default()
        .with_observation_bus(false)
        .with_profile_interval(Duration::from_secs(3600));
    let bus = ContextBus::new(config);
    let background = bus.start().unwrap();
    assert!(background.bus().is_none());

    for _ in 0..200 {
        if bus.profiler().retained() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    background.shutdown().await;

    let latest = bus.profiler().latest();
    assert!(latest.timestamp > 0);
    assert!(bus.profiler().by_id(latest.timestamp).is_some());
}
