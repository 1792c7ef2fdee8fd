// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Visit the events of a trace one at a time.

use crate::event::{BufferParams, EventKind, TraceEvent};

/// The `TraceVisitor` trait is the interface that allows a user to see all
/// the events of a trace in order.
///
/// Every method has an empty default so implementations only override the
/// events they care about.
pub trait TraceVisitor {
    /// An operation scope opens.
    fn function_start(&mut self, id: u64, operation_name: &str) {
        let _ = id;
        let _ = operation_name;
    }

    /// The innermost operation scope closes.
    fn function_end(&mut self, id: u64) {
        let _ = id;
    }

    /// A buffer node without an explicit allocation.
    fn buffer(&mut self, id: u64, params: &BufferParams) {
        let _ = id;
        let _ = params;
    }

    /// A buffer is allocated.
    fn buffer_allocate(&mut self, id: u64, params: &BufferParams) {
        let _ = id;
        let _ = params;
    }

    /// A buffer is deallocated.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the deallocation event.
    /// * `connections` - The events released, allocation first.
    fn buffer_deallocate(&mut self, id: u64, connections: &[u64]) {
        let _ = id;
        let _ = connections;
    }

    /// A circular buffer is allocated.
    fn circular_buffer_allocate(&mut self, id: u64, size_bytes: u64, address: Option<u64>) {
        let _ = id;
        let _ = size_bytes;
        let _ = address;
    }

    /// All circular buffers are released.
    fn circular_buffer_deallocate_all(&mut self, id: u64) {
        let _ = id;
    }

    /// A tensor node.
    fn tensor(&mut self, id: u64, tensor_id: Option<u64>) {
        let _ = id;
        let _ = tensor_id;
    }

    /// Any other node.
    fn marker(&mut self, id: u64, label: &str) {
        let _ = id;
        let _ = label;
    }
}

/// Call the visitor for each event of `events` in order.
///
/// # Examples
///
/// A simple visitor that counts L1 allocations.
/// ```rust
/// use memtrace::event::{BufferParams, MemorySpace, TraceEvent};
/// use memtrace::visitor::{TraceVisitor, visit_events};
///
/// #[derive(Default)]
/// struct L1Counter {
///     count: usize,
/// }
///
/// impl TraceVisitor for L1Counter {
///     fn buffer_allocate(&mut self, _id: u64, params: &BufferParams) {
///         if params.memory_space == MemorySpace::L1 {
///             self.count += 1;
///         }
///     }
/// }
///
/// let events = vec![
///     TraceEvent::buffer_allocate(0, MemorySpace::L1, 32),
///     TraceEvent::buffer_allocate(1, MemorySpace::Dram, 32),
/// ];
/// let mut counter = L1Counter::default();
/// visit_events(&events, &mut counter);
/// assert_eq!(counter.count, 1);
/// ```
pub fn visit_events(events: &[TraceEvent], visitor: &mut dyn TraceVisitor) {
    for event in events {
        let id = event.id;
        match &event.kind {
            EventKind::FunctionStart { operation_name } => {
                visitor.function_start(id, operation_name);
            }
            EventKind::FunctionEnd => visitor.function_end(id),
            EventKind::Buffer(params) => visitor.buffer(id, params),
            EventKind::BufferAllocate(params) => visitor.buffer_allocate(id, params),
            EventKind::BufferDeallocate { connections } => {
                visitor.buffer_deallocate(id, connections);
            }
            EventKind::CircularBufferAllocate {
                size_bytes,
                address,
            } => visitor.circular_buffer_allocate(id, *size_bytes, *address),
            EventKind::CircularBufferDeallocateAll => visitor.circular_buffer_deallocate_all(id),
            EventKind::Tensor { tensor_id } => visitor.tensor(id, *tensor_id),
            EventKind::Marker { label } => visitor.marker(id, label),
        }
    }
}
