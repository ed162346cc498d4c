/*!
 * Configuration Store Tests
 * Tenant routing, hot swap under load and compile errors
 */

use crate::common::{quiet, submit};
use context_bus::{
    BusConfig, ConfigureError, ConfigureId, ContextBus, ObservationType, RawConfigure, RequestContext,
};
use miette::Diagnostic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn crash_on(event: &str) -> RawConfigure {
    RawConfigure::from_json(&format!(
        r#"{{"reactions": {{"crash": {{"type": "fault_crash",
            "tree": {{"nodes": [{{"id": 0, "type": "message", "name": "{event}"}}]}}}}}}}}"#
    ))
    .unwrap()
}

#[tokio::test]
async fn test_tenant_routing_and_removal() {
    let bus = ContextBus::new(BusConfig::bus_only());
    bus.store().set_default(&crash_on("DefaultEvent")).unwrap();
    bus.store().set_configure(ConfigureId(5), &crash_on("TenantEvent")).unwrap();

    let tenant = || bus.context(RequestContext::new("rest", 1, ConfigureId(5))).unwrap();

    let mut ctx = tenant();
    assert_eq!(submit(&bus, &mut ctx, "TenantEvent").await.fired.len(), 1);
    assert!(submit(&bus, &mut ctx, "DefaultEvent").await.fired.is_empty());

    assert!(bus.store().remove_configure(ConfigureId(5)));
    let mut ctx = tenant();
    assert!(submit(&bus, &mut ctx, "TenantEvent").await.fired.is_empty());
    assert_eq!(submit(&bus, &mut ctx, "DefaultEvent").await.fired.len(), 1);
}

#[tokio::test]
async fn test_swap_applies_to_running_request() {
    let bus = ContextBus::new(BusConfig::bus_only());
    let mut ctx = bus
        .context(RequestContext::new("rest", 1, ConfigureId::DEFAULT))
        .unwrap();

    assert!(submit(&bus, &mut ctx, "Late").await.fired.is_empty());

    // snapshots for the new reaction are created on first use
    bus.store().set_default(&crash_on("Late")).unwrap();
    assert_eq!(submit(&bus, &mut ctx, "Late").await.fired.len(), 1);
}

#[test]
fn test_readers_never_see_mixed_configuration() {
    let bus = Arc::new(ContextBus::new(BusConfig::bus_only()));
    let a = crash_on("A").with_observation("A", quiet(ObservationType::Start));
    let b = crash_on("B").with_observation("B", quiet(ObservationType::End));
    bus.store().set_default(&a).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let bus = Arc::clone(&bus);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut reads = 0u64;
                while !stop.load(Ordering::Relaxed) || reads == 0 {
                    let cfg = bus.store().get_configure(ConfigureId::DEFAULT);
                    let is_a = !cfg.dependents("A").is_empty() && cfg.observation("A").is_some();
                    let is_b = !cfg.dependents("B").is_empty() && cfg.observation("B").is_some();
                    assert!(is_a ^ is_b, "mixed configuration observed");
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 0..500 {
        let next = if i % 2 == 0 { &b } else { &a };
        bus.store().set_default(next).unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn test_compile_errors_carry_diagnostics() {
    let raw = RawConfigure::from_json(
        r#"{"reactions": {"broken": {"type": "fault_crash", "tree": {"nodes": [
            {"id": 0, "type": "logic", "op": "and", "children": [1]},
            {"id": 1, "parent": 0, "type": "message", "name": "A"},
            {"id": 2, "type": "message", "name": "B"}
        ]}}}}"#,
    )
    .unwrap();

    let bus = ContextBus::new(BusConfig::bus_only());
    let err = bus.store().set_configure(ConfigureId(2), &raw).unwrap_err();
    assert!(matches!(err, ConfigureError::RootCount { found: 2, .. }));
    assert!(err.code().unwrap().to_string().contains("root_count"));
    assert!(!bus.store().contains(ConfigureId(2)));

    assert!(matches!(
        RawConfigure::from_json(r#"{"reactions": {"x": {"type": "explode"}}}"#),
        Err(ConfigureError::Decode(_))
    ));
}
