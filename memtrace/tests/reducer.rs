// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use memtrace::event::{EventKind, MemorySpace, TraceEvent};
use memtrace::reducer::{MemoryTrace, compute_memory_trace};
use memtrace::test_helpers::{TraceBuilder, synthetic_trace, totals};

fn record_for(trace: &MemoryTrace, event_id: u64) -> &memtrace::AllocationRecord {
    trace
        .records
        .iter()
        .find(|r| r.event_id == event_id)
        .unwrap()
}

#[test]
fn empty_input() {
    let trace = compute_memory_trace(&[]);
    assert!(trace.records.is_empty());
    assert_eq!(trace.peak, 0);
}

#[test]
fn single_event() {
    let events = vec![TraceEvent::buffer_allocate(0, MemorySpace::L1, 512)];
    let trace = compute_memory_trace(&events);
    assert!(trace.records.is_empty());
    assert_eq!(trace.peak, 0);
}

#[test]
fn first_event_is_skipped() {
    let events = vec![
        TraceEvent::function_start(0, "skipped"),
        TraceEvent::buffer_allocate(1, MemorySpace::L1, 64),
    ];
    let trace = compute_memory_trace(&events);
    assert!(trace.records.is_empty());
    assert_eq!(trace.peak, 64);
}

#[test]
fn idempotent() {
    let events = synthetic_trace(50);
    let first = compute_memory_trace(&events);
    let second = compute_memory_trace(&events);
    assert_eq!(first, second);
}

#[test]
fn well_formed_trace_returns_to_zero() {
    let mut builder = TraceBuilder::new();
    builder.function_start("outer");
    for size in [128, 256, 512] {
        builder.function_start("inner");
        let a = builder.allocate(MemorySpace::L1, size);
        builder.circular_buffer_allocate(size / 2);
        let b = builder.allocate(MemorySpace::L1, size * 2);
        builder.circular_buffer_deallocate_all();
        builder.deallocate(b);
        builder.deallocate(a);
        builder.function_end();
    }
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert!(!trace.has_negative_totals());
    assert_eq!(totals(&trace.records).last(), Some(&(0, 0)));
    assert_eq!(trace.peak, 512 + 256 + 1024);
}

#[test]
fn circular_buffer_reset() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let first = builder.circular_buffer_allocate(100);
    builder.circular_buffer_allocate(50);
    builder.circular_buffer_deallocate_all();
    let last = builder.circular_buffer_allocate(20);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    let cb_totals: Vec<i64> = trace
        .records
        .iter()
        .filter(|r| (first..=last).contains(&r.event_id))
        .map(|r| r.circular_buffer_total)
        .collect();
    assert_eq!(cb_totals, vec![100, 150, 0, 20]);
    assert_eq!(trace.peak, 150);
}

#[test]
fn deallocate_all_resets_negative_total() {
    let events = vec![
        TraceEvent::marker(0, "capture_start"),
        TraceEvent::function_start(1, "op"),
        TraceEvent::circular_buffer_deallocate_all(2),
        TraceEvent::circular_buffer_allocate(3, 8),
    ];
    let trace = compute_memory_trace(&events);
    assert_eq!(totals(&trace.records), vec![(0, 0), (0, 0), (8, 0)]);
}

#[test]
fn scope_attribution() {
    let mut builder = TraceBuilder::new();
    builder.function_start("opA");
    let alloc_a = builder.allocate(MemorySpace::L1, 10);
    builder.function_end();
    builder.function_start("opB");
    let alloc_b = builder.allocate(MemorySpace::L1, 5);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    let record_a = record_for(&trace, alloc_a);
    assert_eq!(record_a.operation_name.as_deref(), Some("opA"));
    assert_eq!(record_a.persistent_buffer_total, 10);

    let record_b = record_for(&trace, alloc_b);
    assert_eq!(record_b.operation_name.as_deref(), Some("opB"));
    assert_eq!(record_b.persistent_buffer_total, 15);

    for record in &trace.records {
        match record.operation_name.as_deref() {
            Some("opA") => assert!(record.persistent_buffer_total <= 10),
            Some("opB") => assert!(record.persistent_buffer_total >= 10),
            other => panic!("unexpected operation {other:?}"),
        }
    }
}

#[test]
fn no_records_outside_scopes() {
    let mut builder = TraceBuilder::new();
    builder.allocate(MemorySpace::L1, 10);
    let start = builder.function_start("op");
    let end = builder.function_end();
    builder.allocate(MemorySpace::L1, 10);
    let trace = compute_memory_trace(&builder.build());

    let ids: Vec<u64> = trace.records.iter().map(|r| r.event_id).collect();
    assert_eq!(ids, vec![start]);
    assert!(!ids.contains(&end));
    assert_eq!(trace.peak, 20);
}

#[test]
fn combined_total_is_sum() {
    let trace = compute_memory_trace(&synthetic_trace(20));
    for record in &trace.records {
        assert_eq!(
            record.combined_total,
            record.circular_buffer_total + record.persistent_buffer_total
        );
    }
}

#[test]
fn peak_before_deallocation() {
    let mut builder = TraceBuilder::new();
    let first = builder.allocate(MemorySpace::L1, 100);
    builder.allocate(MemorySpace::L1, 200);
    builder.deallocate(first);
    builder.allocate(MemorySpace::L1, 50);
    let trace = compute_memory_trace(&builder.build());

    // Running totals are 100, 300, 200, 250. The peak is the 300 reached
    // before the deallocation, not the final 250.
    assert_eq!(trace.peak, 300);
    assert!(trace.records.is_empty());
}

#[test]
fn peak_event_ids_in_order() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let a = builder.allocate(MemorySpace::L1, 100);
    let b = builder.tensor();
    builder.deallocate(a);
    let c = builder.allocate(MemorySpace::L1, 100);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(trace.peak, 100);
    assert_eq!(trace.peak_event_ids(), vec![a, b, c]);
}

#[test]
fn dram_isolation() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let dram = builder.allocate(MemorySpace::Dram, 1000);
    builder.deallocate(dram);
    builder.buffer(MemorySpace::Dram, 1000);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(trace.peak, 0);
    assert!(totals(&trace.records).iter().all(|t| *t == (0, 0)));
}

#[test]
fn nested_scopes_use_innermost_name() {
    let mut builder = TraceBuilder::new();
    builder.function_start("outer");
    builder.function_start("inner");
    let alloc = builder.allocate(MemorySpace::L1, 32);
    let inner_end = builder.function_end();
    let outer_alloc = builder.allocate(MemorySpace::L1, 32);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(
        record_for(&trace, alloc).operation_name.as_deref(),
        Some("inner")
    );
    assert_eq!(
        record_for(&trace, inner_end).operation_name.as_deref(),
        Some("outer")
    );
    assert_eq!(
        record_for(&trace, outer_alloc).operation_name.as_deref(),
        Some("outer")
    );
}

#[test]
fn leading_buffers_attributed_to_first_scope() {
    let mut builder = TraceBuilder::new();
    let start = builder.function_start("op");
    let l1 = builder.buffer(MemorySpace::L1, 256);
    let dram = builder.buffer(MemorySpace::Dram, 4096);
    builder.buffer(MemorySpace::L1, 128);
    let alloc = builder.allocate(MemorySpace::L1, 64);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, start).persistent_buffer_total, 384);
    assert_eq!(record_for(&trace, alloc).persistent_buffer_total, 448);
    // The consumed buffers produce no records of their own
    assert!(trace.records.iter().all(|r| r.event_id != l1));
    assert!(trace.records.iter().all(|r| r.event_id != dram));
}

#[test]
fn leading_buffers_only_for_outermost_scope() {
    let mut builder = TraceBuilder::new();
    builder.function_start("outer");
    builder.function_start("inner");
    let nested_buffer = builder.buffer(MemorySpace::L1, 256);
    builder.function_end();
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    let record = record_for(&trace, nested_buffer);
    assert_eq!(record.persistent_buffer_total, 0);
    assert_eq!(trace.peak, 0);
}

#[test]
fn leading_buffers_apply_again_after_scopes_close() {
    let mut builder = TraceBuilder::new();
    builder.function_start("first");
    builder.function_end();
    let second = builder.function_start("second");
    builder.buffer(MemorySpace::L1, 100);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, second).persistent_buffer_total, 100);
}

#[test]
fn deallocate_without_connections_is_noop() {
    let mut events = TraceBuilder::new();
    events.function_start("op");
    events.allocate(MemorySpace::L1, 10);
    let mut events = events.build();
    events.push(TraceEvent::new(
        3,
        EventKind::BufferDeallocate {
            connections: Vec::new(),
        },
    ));
    let trace = compute_memory_trace(&events);
    assert_eq!(record_for(&trace, 3).persistent_buffer_total, 10);
}

#[test]
fn deallocate_unknown_id_is_noop() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    builder.allocate(MemorySpace::L1, 10);
    let dealloc = builder.deallocate(999);
    let tensor = builder.tensor();
    let dealloc_tensor = builder.deallocate(tensor);
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, dealloc).persistent_buffer_total, 10);
    assert_eq!(record_for(&trace, dealloc_tensor).persistent_buffer_total, 10);
}

#[test]
fn deallocate_uses_allocation_size() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    builder.allocate(MemorySpace::L1, 10);
    let big = builder.allocate(MemorySpace::L1, 300);
    let dealloc = builder.deallocate(big);
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, dealloc).persistent_buffer_total, 10);
}

#[test]
fn unmatched_deallocation_goes_negative() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let alloc = builder.allocate(MemorySpace::L1, 10);
    builder.deallocate(alloc);
    let second = builder.deallocate(alloc);
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, second).persistent_buffer_total, -10);
    assert!(trace.has_negative_totals());
    assert_eq!(trace.first_negative_event_id, Some(second));
    assert_eq!(trace.peak, 10);
}

#[test]
fn unmatched_function_end_is_ignored() {
    let mut builder = TraceBuilder::new();
    builder.function_end();
    let start = builder.function_start("op");
    let alloc = builder.allocate(MemorySpace::L1, 10);
    let trace = compute_memory_trace(&builder.build());

    let ids: Vec<u64> = trace.records.iter().map(|r| r.event_id).collect();
    assert_eq!(ids, vec![start, alloc]);
}

#[test]
fn negative_total_outside_scope() {
    let mut builder = TraceBuilder::new();
    let alloc = builder.allocate(MemorySpace::L1, 10);
    builder.deallocate(alloc);
    let second = builder.deallocate(alloc);
    builder.allocate(MemorySpace::L1, 10);
    builder.function_start("op");
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert!(trace.records.iter().all(|r| r.persistent_buffer_total >= 0));
    assert!(trace.has_negative_totals());
    assert_eq!(trace.first_negative_event_id, Some(second));
}

#[test]
fn well_formed_trace_has_no_negative_event() {
    let trace = compute_memory_trace(&synthetic_trace(5));
    assert_eq!(trace.first_negative_event_id, None);
}

#[test]
fn large_allocations_saturate() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    builder.allocate(MemorySpace::L1, 1 << 62);
    let second = builder.allocate(MemorySpace::L1, 1 << 62);
    let cb = builder.circular_buffer_allocate(u64::MAX);
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, second).persistent_buffer_total, i64::MAX);
    let record = record_for(&trace, cb);
    assert_eq!(record.circular_buffer_total, i64::MAX);
    assert_eq!(record.combined_total, i64::MAX);
    assert_eq!(trace.peak, i64::MAX);
}

#[test]
fn large_deallocation_saturates() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let alloc = builder.allocate(MemorySpace::L1, u64::MAX);
    builder.deallocate(alloc);
    builder.deallocate(alloc);
    let last = builder.deallocate(alloc);
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, last).persistent_buffer_total, i64::MIN);
}

#[test]
fn large_leading_buffers_saturate() {
    let mut builder = TraceBuilder::new();
    let start = builder.function_start("op");
    builder.buffer(MemorySpace::L1, u64::MAX);
    builder.buffer(MemorySpace::L1, 1);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(record_for(&trace, start).persistent_buffer_total, i64::MAX);
    assert_eq!(trace.peak, i64::MAX);
}

#[test]
fn only_l1_space_is_counted() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let small = builder.allocate(MemorySpace::L1Small, 4096);
    let host = builder.allocate(MemorySpace::Other("SYSTEM_MEMORY".to_string()), 512);
    builder.deallocate(small);
    builder.deallocate(host);
    builder.function_end();
    let trace = compute_memory_trace(&builder.build());

    assert_eq!(trace.peak, 0);
    assert!(totals(&trace.records).iter().all(|t| *t == (0, 0)));
}
