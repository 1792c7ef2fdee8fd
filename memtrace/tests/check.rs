// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use memtrace::check::{TraceIssue, check_trace};
use memtrace::event::{EventKind, MemorySpace, TraceEvent};
use memtrace::test_helpers::{TraceBuilder, synthetic_trace};

#[test]
fn clean_trace() {
    assert!(check_trace(&synthetic_trace(10)).is_empty());
}

#[test]
fn empty_trace() {
    assert!(check_trace(&[]).is_empty());
}

#[test]
fn duplicate_id() {
    let events = vec![
        TraceEvent::marker(0, "capture_start"),
        TraceEvent::tensor(1, None),
        TraceEvent::tensor(1, None),
    ];
    assert_eq!(check_trace(&events), vec![TraceIssue::DuplicateId { id: 1 }]);
}

#[test]
fn deallocation_issues() {
    let mut builder = TraceBuilder::new();
    builder.function_start("op");
    let alloc = builder.allocate(MemorySpace::L1, 10);
    let first = builder.deallocate(alloc);
    let second = builder.deallocate(alloc);
    let unknown = builder.deallocate(77);
    builder.function_end();
    let mut events = builder.build();
    let empty_id = events.len() as u64;
    events.push(TraceEvent::new(
        empty_id,
        EventKind::BufferDeallocate {
            connections: Vec::new(),
        },
    ));

    let issues = check_trace(&events);
    assert_eq!(
        issues,
        vec![
            TraceIssue::DoubleDeallocation {
                id: second,
                allocation_id: alloc,
                first_deallocation_id: first,
            },
            TraceIssue::UnknownAllocation {
                id: unknown,
                allocation_id: 77,
            },
            TraceIssue::DeallocationWithoutConnections { id: empty_id },
            TraceIssue::NegativeTotal { id: second },
        ]
    );
}

#[test]
fn unbalanced_scopes() {
    let mut builder = TraceBuilder::new();
    let stray_end = builder.function_end();
    let open = builder.function_start("never_closed");
    builder.tensor();
    let issues = check_trace(&builder.build());
    assert_eq!(
        issues,
        vec![
            TraceIssue::UnmatchedFunctionEnd { id: stray_end },
            TraceIssue::UnclosedScope {
                id: open,
                operation_name: "never_closed".to_string(),
            },
        ]
    );
}

#[test]
fn issue_display() {
    let issue = TraceIssue::DoubleDeallocation {
        id: 9,
        allocation_id: 3,
        first_deallocation_id: 5,
    };
    assert_eq!(format!("{issue}"), "9: buffer 3 already deallocated by 5");
}

#[test]
fn negative_total_outside_scope() {
    let mut builder = TraceBuilder::new();
    let alloc = builder.allocate(MemorySpace::L1, 10);
    builder.deallocate(alloc);
    let second = builder.deallocate(alloc);
    let issues = check_trace(&builder.build());
    assert_eq!(
        issues,
        vec![
            TraceIssue::DoubleDeallocation {
                id: second,
                allocation_id: alloc,
                first_deallocation_id: second - 1,
            },
            TraceIssue::NegativeTotal { id: second },
        ]
    );
}
