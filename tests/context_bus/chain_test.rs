/*!
 * Event Chain Tests
 * Start / Inter / End linking, span closing and payload propagation
 */

use crate::common::{bus_with, context, quiet, submit, RecordingTracer};
use context_bus::configure::TracingRule;
use context_bus::event::{EventHandle, SpanMetadata};
use context_bus::reaction::PrerequisiteSnapshots;
use context_bus::{
    BusConfig, ConfigureId, ContextBus, ObservationConfigure, ObservationType, Payload, RawConfigure,
    RequestContext,
};
use proptest::prelude::*;
use std::sync::Arc;

fn chain_config() -> RawConfigure {
    RawConfigure::new()
        .with_observation("single", quiet(ObservationType::Single))
        .with_observation("start", quiet(ObservationType::Start))
        .with_observation("inter", quiet(ObservationType::Inter))
        .with_observation("end", quiet(ObservationType::End))
}

#[tokio::test]
async fn test_inter_links_to_immediate_opener() {
    let bus = bus_with(&chain_config());
    let mut ctx = context(&bus, 1);

    for name in ["start", "single", "inter", "inter", "end"] {
        submit(&bus, &mut ctx, name).await;
    }

    let chain = ctx.chain();
    assert_eq!(chain.len(), 3);
    let last = chain.get(ctx.event().prev_event().unwrap()).unwrap();
    assert_eq!(last.name(), "inter");

    let walked: Vec<_> = chain.ancestors(&last).map(|e| e.name().to_string()).collect();
    assert_eq!(walked, ["inter", "start"]);
}

#[tokio::test]
async fn test_end_closes_span_opened_by_previous_event() {
    let tracer = Arc::new(RecordingTracer::default());
    let bus = ContextBus::with_backends(
        BusConfig::bus_only(),
        tracer.clone(),
        Arc::new(context_bus::observation::LogSink),
    );
    let opener = ObservationConfigure {
        tracing: Some(TracingRule {
            name: "checkout".into(),
            ..Default::default()
        }),
        ..quiet(ObservationType::Start)
    };
    let closer = ObservationConfigure {
        tracing: Some(TracingRule {
            name: "checkout".into(),
            prev_name: Some("CartOpened".into()),
            ..Default::default()
        }),
        ..quiet(ObservationType::End)
    };
    bus.store()
        .set_default(
            &RawConfigure::new()
                .with_observation("CartOpened", opener)
                .with_observation("CartPaid", closer),
        )
        .unwrap();

    let parent = SpanMetadata {
        sampled: true,
        trace_id_low: 9,
        span_id: 1,
        ..Default::default()
    };
    let mut ctx = bus
        .context(RequestContext::new("rest", 3, ConfigureId::DEFAULT).with_span(Some(parent)))
        .unwrap();

    submit(&bus, &mut ctx, "CartOpened").await;
    let allocated = *ctx.span().unwrap();
    submit(&bus, &mut ctx, "CartPaid").await;

    let stats = bus.bus().drain();
    assert_eq!(stats.counts.spans, 1);

    let spans = tracer.spans.lock();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].span_id, allocated.span_id);
    assert_eq!(spans[0].parent_id, 1);
    assert_eq!(spans[0].trace_id_low, 9);
    assert_eq!((spans[0].from.as_str(), spans[0].to.as_str()), ("CartOpened", "CartPaid"));
    assert!(spans[0].finish >= spans[0].start);
}

#[tokio::test]
async fn test_payload_carries_snapshots_downstream() {
    let raw = RawConfigure::from_json(
        r#"{
            "reactions": {
                "slow": {"type": "fault_crash", "tree": {"nodes": [
                    {"id": 0, "type": "logic", "op": "and", "children": [1, 2]},
                    {"id": 1, "parent": 0, "type": "message", "name": "Upstream"},
                    {"id": 2, "parent": 0, "type": "message", "name": "Downstream"}
                ]}}
            }
        }"#,
    )
    .unwrap();

    let upstream = bus_with(&raw);
    let mut ctx = context(&upstream, 77);
    assert!(submit(&upstream, &mut ctx, "Upstream").await.fired.is_empty());

    let bytes = ctx.payload().to_bytes().unwrap();

    let downstream = bus_with(&raw);
    let payload = Payload::from_bytes(&bytes).unwrap();
    let mut resumed = downstream.from_payload(&payload).unwrap();
    assert_eq!(resumed.request_id(), 77);

    let fired = submit(&downstream, &mut resumed, "Downstream").await.fired;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].name(), "slow");

    // a fresh request on the same service does not inherit anything
    let mut fresh = context(&downstream, 78);
    assert!(submit(&downstream, &mut fresh, "Downstream").await.fired.is_empty());
}

#[tokio::test]
async fn test_offset_counts_separately_and_follows_new_links() {
    let raw = RawConfigure::from_json(
        r#"{
            "reactions": {
                "r": {"type": "fault_crash", "tree": {"nodes": [
                    {"id": 0, "type": "logic", "op": "and", "children": [1, 2]},
                    {"id": 1, "parent": 0, "type": "message", "name": "start"},
                    {"id": 2, "parent": 0, "type": "message", "name": "inter"}
                ]}}
            }
        }"#,
    )
    .unwrap()
    .with_observation("start", quiet(ObservationType::Start))
    .with_observation("inter", quiet(ObservationType::Inter));

    let upstream = bus_with(&raw);
    let mut ctx = context(&upstream, 9);
    submit(&upstream, &mut ctx, "start").await;

    // resume downstream with a fresh offset next to the propagated counts
    let downstream = bus_with(&raw);
    let mut resumed = downstream.from_payload(&ctx.payload()).unwrap();
    let seeded = resumed.event().clone().with_offset(PrerequisiteSnapshots::new());
    *resumed.event_mut() = seeded;

    let counters = |snapshots: Option<&PrerequisiteSnapshots>| {
        snapshots
            .and_then(|s| s.get("r"))
            .map(|s| (s.counter(1), s.counter(2)))
    };

    submit(&downstream, &mut resumed, "start").await;
    assert_eq!(resumed.event().depth(), 1);
    assert_eq!(counters(Some(resumed.event().snapshots())), Some((2, 0)));
    assert_eq!(counters(resumed.event().offset()), Some((1, 0)));

    let fired = submit(&downstream, &mut resumed, "inter").await.fired;
    assert_eq!(fired.len(), 1);

    let link = resumed.event();
    assert_eq!(link.depth(), 2);
    assert_eq!(counters(Some(link.snapshots())), Some((2, 1)));
    assert_eq!(counters(link.offset()), Some((1, 1)));

    // the context the chain was resumed on keeps the counts from before the inter event
    let mut root = link;
    while let Some(prev) = root.prev() {
        root = prev.context.as_ref();
    }
    assert_eq!(counters(Some(root.snapshots())), Some((2, 0)));
    assert_eq!(counters(root.offset()), Some((1, 0)));
}

#[test]
fn test_bypass_payload_is_not_resumed() {
    let bus = ContextBus::new(BusConfig::bus_only());
    let payload = Payload::new(5, ConfigureId::BYPASS);
    assert!(bus.from_payload(&payload).is_none());
}

fn kind_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("single"), Just("start"), Just("inter"), Just("end")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_openers_link_to_previous_opener(names in prop::collection::vec(kind_name(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let bus = bus_with(&chain_config());
        let mut ctx = context(&bus, 1);

        runtime.block_on(async {
            for name in &names {
                submit(&bus, &mut ctx, name).await;
            }
        });

        let chain = ctx.chain();
        let openers: Vec<_> = names.iter().filter(|n| **n == "start" || **n == "inter").collect();
        prop_assert_eq!(chain.len(), openers.len());

        for (slot, name) in openers.iter().enumerate() {
            let data = chain.get(handle_at(&ctx, slot)).unwrap();
            prop_assert_eq!(data.name(), **name);

            let expected = if **name == "inter" && slot > 0 { Some(slot - 1) } else { None };
            prop_assert_eq!(data.metadata.prev_event.map(|h| h.index()), expected);
            prop_assert!(chain.ancestors(&data).count() <= slot);
        }
    }
}

/// Handle of the `slot`-th opener, found by walking the active context
fn handle_at(ctx: &context_bus::Context, slot: usize) -> EventHandle {
    let mut current = ctx.event();
    loop {
        let prev = current.prev().expect("slot beyond chain");
        if prev.event.index() == slot {
            return prev.event;
        }
        current = prev.context.as_ref();
    }
}
