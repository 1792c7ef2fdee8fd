// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Memory accounting for accelerator device-operation traces.
//!
//! A device-operation trace is a linear stream of events captured while an
//! operation ran on the device: function scopes opening and closing, buffers
//! being allocated and released, and circular buffers being set up for a
//! kernel and torn down again. This crate turns such a stream into a running
//! account of L1 memory:
//!
//!   - [`event`] holds the canonical [`TraceEvent`] form.
//!   - [`wire`] normalises the backend's JSON payload into that form.
//!   - [`reducer`] computes per-event totals and the peak combined usage.
//!   - [`check`] reports inconsistencies in a trace without altering the
//!     reducer's output.
//!   - [`address_ranges`] and [`colors`] support buffer layout summaries.
//!
//! # Example
//!
//! ```rust
//! use memtrace::event::{MemorySpace, TraceEvent};
//! use memtrace::reducer::compute_memory_trace;
//!
//! let events = vec![
//!     TraceEvent::marker(0, "capture_start"),
//!     TraceEvent::function_start(1, "ttnn::add"),
//!     TraceEvent::buffer_allocate(2, MemorySpace::L1, 2048),
//!     TraceEvent::circular_buffer_allocate(3, 1024),
//!     TraceEvent::function_end(4),
//! ];
//! let trace = compute_memory_trace(&events);
//! assert_eq!(trace.peak, 3072);
//! ```

// Enable warnings for missing documentation
#![warn(missing_docs)]

use std::error::Error;
use std::fmt;

pub mod address_ranges;
pub mod check;
pub mod colors;
pub mod event;
pub mod reducer;
pub mod test_helpers;
pub mod visitor;
pub mod wire;

pub use event::{EventKind, MemorySpace, TraceEvent};
pub use reducer::{AllocationRecord, MemoryTrace, compute_memory_trace};

#[macro_export]
/// Build an `Err` holding a [TraceError] from `format!`-style arguments
macro_rules! trace_error {
    ($($arg:tt)+) => {
        Err($crate::TraceError(format!($($arg)+)))
    };
}

/// The `TraceError` is returned when a trace cannot be loaded or normalised.
///
/// The reducer itself never fails; only turning external data into
/// [`TraceEvent`]s can.
#[derive(Debug)]
pub struct TraceError(pub String);

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl Error for TraceError {}

/// The return type for functions that load or normalise traces.
pub type TraceResult<T> = Result<T, TraceError>;
