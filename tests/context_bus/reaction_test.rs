/*!
 * Reaction Tests
 * Prerequisite trees driven through the submission path
 */

use crate::common::{bus_with, context, submit};
use context_bus::RawConfigure;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn two_leaf(op: &str, action: &str) -> RawConfigure {
    RawConfigure::from_json(&format!(
        r#"{{
            "reactions": {{
                "r": {{{action}, "tree": {{"nodes": [
                    {{"id": 0, "type": "logic", "op": "{op}", "children": [1, 2]}},
                    {{"id": 1, "parent": 0, "type": "message", "name": "EventA"}},
                    {{"id": 2, "parent": 0, "type": "message", "name": "EventB"}}
                ]}}}}
            }}
        }}"#
    ))
    .unwrap()
}

const CRASH: &str = r#""type": "fault_crash""#;

#[tokio::test]
async fn test_and_tree_needs_both_events() {
    let bus = bus_with(&two_leaf("and", CRASH));

    let mut ctx = context(&bus, 1);
    assert!(submit(&bus, &mut ctx, "EventA").await.fired.is_empty());
    assert!(submit(&bus, &mut ctx, "EventA").await.fired.is_empty());
    assert_eq!(submit(&bus, &mut ctx, "EventB").await.fired.len(), 1);

    // still satisfied: fires again on the next watched event
    assert_eq!(submit(&bus, &mut ctx, "EventA").await.fired.len(), 1);
    // unwatched names never fire
    assert!(submit(&bus, &mut ctx, "EventC").await.fired.is_empty());
}

#[tokio::test]
async fn test_or_tree_needs_either_event() {
    let bus = bus_with(&two_leaf("or", CRASH));

    let mut first = context(&bus, 1);
    assert_eq!(submit(&bus, &mut first, "EventA").await.fired.len(), 1);

    let mut second = context(&bus, 2);
    assert_eq!(submit(&bus, &mut second, "EventB").await.fired.len(), 1);
}

#[tokio::test]
async fn test_occurrence_window() {
    // fires while 1 < count(EventC) < 4
    let raw = RawConfigure::from_json(
        r#"{
            "reactions": {
                "burst": {"type": "fault_crash", "tree": {"nodes": [
                    {"id": 0, "type": "message", "name": "EventC",
                     "occurrences": [{"op": "gt", "value": 1}, {"op": "lt", "value": 4}]}
                ]}}
            }
        }"#,
    )
    .unwrap();
    let bus = bus_with(&raw);
    let mut ctx = context(&bus, 1);

    let mut fired = Vec::new();
    for _ in 0..5 {
        fired.push(submit(&bus, &mut ctx, "EventC").await.fired.len());
    }
    assert_eq!(fired, vec![0, 1, 1, 0, 0]);
}

#[tokio::test]
async fn test_condition_filters_events() {
    let raw = RawConfigure::from_json(
        r#"{
            "reactions": {
                "big_order": {"type": "fault_crash", "tree": {"nodes": [
                    {"id": 0, "type": "message", "name": "Ordered",
                     "condition": {"kind": "compare", "path": "app.message", "op": "eq",
                                   "value": "Ordered happened"}}
                ]}}
            }
        }"#,
    )
    .unwrap();
    let bus = bus_with(&raw);
    let mut ctx = context(&bus, 1);
    assert_eq!(submit(&bus, &mut ctx, "Ordered").await.fired.len(), 1);
}

#[tokio::test]
async fn test_fault_delay_blocks_triggering_submission() {
    let bus = bus_with(&two_leaf("and", r#""type": "fault_delay", "ms": 200"#));
    let mut ctx = context(&bus, 1);

    let started = Instant::now();
    submit(&bus, &mut ctx, "EventA").await;
    assert!(started.elapsed() < Duration::from_millis(200));

    let triggering = Instant::now();
    let fired = submit(&bus, &mut ctx, "EventB").await.fired;
    assert_eq!(fired.len(), 1);
    assert!(triggering.elapsed() >= Duration::from_millis(200));

    // delays never reach the bus as deferred work
    assert_eq!(bus.bus().drain().crashes, 0);
}

#[tokio::test]
async fn test_fault_crash_reported_by_running_bus() {
    let bus = bus_with(&two_leaf("or", CRASH));
    let background = bus.start().unwrap();

    let mut ctx = context(&bus, 1);
    submit(&bus, &mut ctx, "EventA").await;
    background.shutdown().await;

    assert_eq!(bus.bus().queue_stats().consumed, 1);
    assert_eq!(bus.bus().pending(), 0);
}
