// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Helpers for building traces in tests and benchmarks.
//!
//! The [`TraceBuilder`] assigns ids in order and always begins the trace
//! with a `capture_start` marker, which the reducer skips.

use crate::event::{MemorySpace, TraceEvent};
use crate::reducer::AllocationRecord;

/// Builds a trace one event at a time.
pub struct TraceBuilder {
    events: Vec<TraceEvent>,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    /// Start a trace with its `capture_start` marker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: vec![TraceEvent::marker(0, "capture_start")],
        }
    }

    fn next_id(&self) -> u64 {
        self.events.len() as u64
    }

    fn push(&mut self, event: TraceEvent) -> u64 {
        let id = event.id;
        self.events.push(event);
        id
    }

    /// Open an operation scope.
    pub fn function_start(&mut self, operation_name: &str) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::function_start(id, operation_name))
    }

    /// Close the innermost scope.
    pub fn function_end(&mut self) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::function_end(id))
    }

    /// Add a `Buffer` node.
    pub fn buffer(&mut self, memory_space: MemorySpace, size_bytes: u64) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::buffer(id, memory_space, size_bytes))
    }

    /// Allocate a buffer, returning the allocation id.
    pub fn allocate(&mut self, memory_space: MemorySpace, size_bytes: u64) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::buffer_allocate(id, memory_space, size_bytes))
    }

    /// Allocate a buffer at `address`, returning the allocation id.
    pub fn allocate_at(&mut self, memory_space: MemorySpace, size_bytes: u64, address: u64) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::buffer_allocate_at(
            id,
            memory_space,
            size_bytes,
            address,
        ))
    }

    /// Deallocate the allocation `allocation_id`.
    pub fn deallocate(&mut self, allocation_id: u64) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::buffer_deallocate(id, allocation_id))
    }

    /// Allocate a circular buffer.
    pub fn circular_buffer_allocate(&mut self, size_bytes: u64) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::circular_buffer_allocate(id, size_bytes))
    }

    /// Release all circular buffers.
    pub fn circular_buffer_deallocate_all(&mut self) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::circular_buffer_deallocate_all(id))
    }

    /// Add a tensor node.
    pub fn tensor(&mut self) -> u64 {
        let id = self.next_id();
        self.push(TraceEvent::tensor(id, Some(id)))
    }

    /// Finish the trace.
    #[must_use]
    pub fn build(self) -> Vec<TraceEvent> {
        self.events
    }
}

/// A trace of `num_ops` operations, each allocating and releasing L1
/// buffers and circular buffers, wrapped in one outer scope.
#[must_use]
pub fn synthetic_trace(num_ops: usize) -> Vec<TraceEvent> {
    let mut builder = TraceBuilder::new();
    builder.function_start("model");
    builder.buffer(MemorySpace::L1, 4096);
    for i in 0..num_ops {
        builder.function_start(&format!("op{i}"));
        let input = builder.allocate(MemorySpace::L1, 2048 + (i as u64 % 7) * 256);
        let dram = builder.allocate(MemorySpace::Dram, 1 << 20);
        builder.circular_buffer_allocate(1024);
        builder.circular_buffer_allocate(512);
        builder.tensor();
        builder.circular_buffer_deallocate_all();
        builder.deallocate(dram);
        builder.deallocate(input);
        builder.function_end();
    }
    builder.function_end();
    builder.build()
}

/// The `(circular, persistent)` totals of each record.
#[must_use]
pub fn totals(records: &[AllocationRecord]) -> Vec<(i64, i64)> {
    records
        .iter()
        .map(|r| (r.circular_buffer_total, r.persistent_buffer_total))
        .collect()
}
