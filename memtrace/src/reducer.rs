// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The memory trace reducer.
//!
//! Walks a trace once from left to right keeping two running totals:
//!
//!   - the _circular buffer_ total, grown by each circular buffer allocation
//!     and reset to zero whenever all circular buffers are released.
//!   - the _persistent buffer_ total, tracking L1 buffer allocations and
//!     deallocations. DRAM buffers are never counted.
//!
//! Every event processed while an operation scope is open produces an
//! [`AllocationRecord`] attributed to the innermost open scope. The peak of
//! the combined total is tracked over every event, whether or not a scope is
//! open.
//!
//! Malformed traces are tolerated: unmatched deallocations are ignored or
//! drive the totals negative, and unbalanced scopes are simply left open or
//! ignored. Use [`crate::check`] to find out what is wrong with a trace.
//!
//! Totals saturate at the `i64` bounds rather than overflow.

use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, trace};
use serde::Serialize;

use crate::event::{BufferParams, EventKind, MemorySpace, TraceEvent};

/// Running memory totals after one event of a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    /// Id of the event this record follows.
    pub event_id: u64,

    /// Name of the innermost open operation scope.
    pub operation_name: Option<String>,

    /// Bytes held by circular buffers.
    pub circular_buffer_total: i64,

    /// Bytes held by L1 buffers.
    pub persistent_buffer_total: i64,

    /// Sum of the two totals.
    pub combined_total: i64,
}

/// The peak memory usage seen within one run of an operation scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OperationPeak {
    /// Name of the operation.
    pub operation_name: Option<String>,

    /// First event attributed to this run of the operation.
    pub first_event_id: u64,

    /// Last event attributed to this run of the operation.
    pub last_event_id: u64,

    /// Highest combined total within the run.
    pub peak_combined_total: i64,
}

/// The output of [`compute_memory_trace`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryTrace {
    /// One record per event processed inside an operation scope.
    pub records: Vec<AllocationRecord>,

    /// Highest combined total over the whole trace.
    pub peak: i64,

    /// The first event after which a running total was below zero, whether
    /// or not a scope was open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_negative_event_id: Option<u64>,
}

impl MemoryTrace {
    /// Ids of the records whose combined total equals the peak, in trace
    /// order.
    #[must_use]
    pub fn peak_event_ids(&self) -> Vec<u64> {
        self.records
            .iter()
            .filter(|r| r.combined_total == self.peak)
            .map(|r| r.event_id)
            .collect()
    }

    /// The peak of each contiguous run of records attributed to the same
    /// operation.
    #[must_use]
    pub fn operation_peaks(&self) -> Vec<OperationPeak> {
        let mut peaks = Vec::new();
        let runs = self
            .records
            .iter()
            .group_by(|record| record.operation_name.clone());
        for (operation_name, mut run) in &runs {
            // A group always holds at least one record
            let Some(first) = run.next() else {
                continue;
            };
            let mut peak = OperationPeak {
                operation_name,
                first_event_id: first.event_id,
                last_event_id: first.event_id,
                peak_combined_total: first.combined_total,
            };
            for record in run {
                peak.last_event_id = record.event_id;
                peak.peak_combined_total = peak.peak_combined_total.max(record.combined_total);
            }
            peaks.push(peak);
        }
        peaks
    }

    /// Whether a running total ever went below zero. This only happens for
    /// malformed traces.
    #[must_use]
    pub fn has_negative_totals(&self) -> bool {
        self.first_negative_event_id.is_some()
    }
}

/// Sum the L1 sizes of the `Buffer` events that immediately follow
/// `start_index`.
///
/// Returns the number of bytes added and the index of the first event that
/// is not a `Buffer`.
#[must_use]
pub fn consume_leading_buffers(events: &[TraceEvent], start_index: usize) -> (u64, usize) {
    let mut total_added: u64 = 0;
    let mut next_index = start_index;
    while let Some(TraceEvent {
        kind: EventKind::Buffer(params),
        ..
    }) = events.get(next_index)
    {
        if params.memory_space == MemorySpace::L1 {
            total_added = total_added.saturating_add(params.size_bytes);
        }
        next_index += 1;
    }
    (total_added, next_index)
}

fn to_signed(num_bytes: u64) -> i64 {
    i64::try_from(num_bytes).unwrap_or(i64::MAX)
}

struct OpenScope<'a> {
    name: &'a str,
    id: u64,
}

struct Accumulator<'a> {
    /// Buffer-carrying events keyed by id so deallocations can find the size
    /// they release.
    buffers_by_id: HashMap<u64, &'a BufferParams>,
    circular_buffer_total: i64,
    persistent_buffer_total: i64,
    open_scopes: Vec<OpenScope<'a>>,
}

impl<'a> Accumulator<'a> {
    fn new(events: &'a [TraceEvent]) -> Self {
        let mut buffers_by_id = HashMap::new();
        for event in events {
            if let Some(params) = event.buffer_params() {
                buffers_by_id.entry(event.id).or_insert(params);
            }
        }
        Self {
            buffers_by_id,
            circular_buffer_total: 0,
            persistent_buffer_total: 0,
            open_scopes: Vec::new(),
        }
    }

    fn combined_total(&self) -> i64 {
        self.circular_buffer_total
            .saturating_add(self.persistent_buffer_total)
    }

    fn is_negative(&self) -> bool {
        self.circular_buffer_total < 0 || self.persistent_buffer_total < 0
    }

    fn add_persistent(&mut self, num_bytes: u64) {
        self.persistent_buffer_total = self
            .persistent_buffer_total
            .saturating_add(to_signed(num_bytes));
    }

    fn deallocate(&mut self, event_id: u64, connections: &[u64]) {
        let Some(allocation_id) = connections.first() else {
            debug!("{event_id}: deallocation without connections ignored");
            return;
        };
        match self.buffers_by_id.get(allocation_id) {
            Some(params) => {
                if params.memory_space == MemorySpace::L1 {
                    self.persistent_buffer_total = self
                        .persistent_buffer_total
                        .saturating_sub(to_signed(params.size_bytes));
                }
            }
            None => {
                debug!("{event_id}: deallocation of unknown buffer {allocation_id} ignored");
            }
        }
    }

    fn record(&self, event_id: u64) -> Option<AllocationRecord> {
        let scope = self.open_scopes.last()?;
        Some(AllocationRecord {
            event_id,
            operation_name: Some(scope.name.to_owned()),
            circular_buffer_total: self.circular_buffer_total,
            persistent_buffer_total: self.persistent_buffer_total,
            combined_total: self.combined_total(),
        })
    }
}

/// Compute the per-event memory totals and peak usage of a trace.
///
/// The first event is a capture marker by convention and is skipped. When a
/// `FunctionStart` opens the outermost scope, any `Buffer` events directly
/// after it are buffers allocated before the operation began: their L1 sizes
/// are attributed to that scope and the events themselves are consumed.
#[must_use]
pub fn compute_memory_trace(events: &[TraceEvent]) -> MemoryTrace {
    let mut acc = Accumulator::new(events);
    let mut memory_trace = MemoryTrace::default();

    let mut index = 1;
    while let Some(event) = events.get(index) {
        let mut next_index = index + 1;
        match &event.kind {
            EventKind::FunctionStart { operation_name } => {
                if acc.open_scopes.is_empty() {
                    let (added, after_buffers) = consume_leading_buffers(events, index + 1);
                    acc.add_persistent(added);
                    next_index = after_buffers;
                }
                acc.open_scopes.push(OpenScope {
                    name: operation_name,
                    id: event.id,
                });
            }
            EventKind::FunctionEnd => {
                if let Some(scope) = acc.open_scopes.pop() {
                    trace!("{}: closed scope {} opened at {}", event.id, scope.name, scope.id);
                }
            }
            EventKind::CircularBufferAllocate { size_bytes, .. } => {
                acc.circular_buffer_total = acc
                    .circular_buffer_total
                    .saturating_add(to_signed(*size_bytes));
            }
            EventKind::CircularBufferDeallocateAll => {
                acc.circular_buffer_total = 0;
            }
            EventKind::BufferAllocate(params) => {
                if params.memory_space == MemorySpace::L1 {
                    acc.add_persistent(params.size_bytes);
                }
            }
            EventKind::BufferDeallocate { connections } => {
                acc.deallocate(event.id, connections);
            }
            EventKind::Buffer(_) | EventKind::Tensor { .. } | EventKind::Marker { .. } => {}
        }

        if let Some(record) = acc.record(event.id) {
            trace!(
                "{event}: CBs {} / Buffers {} / Total {}",
                record.circular_buffer_total,
                record.persistent_buffer_total,
                record.combined_total
            );
            memory_trace.records.push(record);
        }
        memory_trace.peak = memory_trace.peak.max(acc.combined_total());
        if memory_trace.first_negative_event_id.is_none() && acc.is_negative() {
            debug!("{event}: running total below zero");
            memory_trace.first_negative_event_id = Some(event.id);
        }

        index = next_index;
    }

    memory_trace
}
