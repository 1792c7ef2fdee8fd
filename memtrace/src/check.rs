// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Check a trace for inconsistencies.
//!
//! Checks:
//!  - every event id is unique
//!  - every deallocation names an allocation seen earlier in the trace
//!  - no allocation is deallocated twice
//!  - every `FunctionEnd` closes an open scope and no scope is left open
//!  - the running totals never go negative
//!
//! The reducer tolerates all of these, so this is how callers decide whether
//! its output can be trusted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::event::{BufferParams, TraceEvent};
use crate::reducer::compute_memory_trace;
use crate::visitor::{TraceVisitor, visit_events};

/// A problem found in a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TraceIssue {
    /// More than one event uses the same id.
    DuplicateId {
        /// The repeated id.
        id: u64,
    },

    /// A deallocation with an empty connection list.
    DeallocationWithoutConnections {
        /// The deallocation event.
        id: u64,
    },

    /// A deallocation naming an event that is not an earlier buffer.
    UnknownAllocation {
        /// The deallocation event.
        id: u64,
        /// The id it names.
        allocation_id: u64,
    },

    /// An allocation released more than once.
    DoubleDeallocation {
        /// The second deallocation event.
        id: u64,
        /// The allocation released.
        allocation_id: u64,
        /// The first deallocation event.
        first_deallocation_id: u64,
    },

    /// A `FunctionEnd` with no scope open.
    UnmatchedFunctionEnd {
        /// The `FunctionEnd` event.
        id: u64,
    },

    /// A scope still open at the end of the trace.
    UnclosedScope {
        /// The `FunctionStart` event.
        id: u64,
        /// Name of the operation.
        operation_name: String,
    },

    /// The first event at which a running total went below zero.
    NegativeTotal {
        /// The event.
        id: u64,
    },
}

impl fmt::Display for TraceIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TraceIssue::DuplicateId { id } => write!(f, "{id}: duplicate event id"),
            TraceIssue::DeallocationWithoutConnections { id } => {
                write!(f, "{id}: deallocation without connections")
            }
            TraceIssue::UnknownAllocation { id, allocation_id } => {
                write!(f, "{id}: deallocation of unknown buffer {allocation_id}")
            }
            TraceIssue::DoubleDeallocation {
                id,
                allocation_id,
                first_deallocation_id,
            } => write!(
                f,
                "{id}: buffer {allocation_id} already deallocated by {first_deallocation_id}"
            ),
            TraceIssue::UnmatchedFunctionEnd { id } => {
                write!(f, "{id}: function end without an open scope")
            }
            TraceIssue::UnclosedScope { id, operation_name } => {
                write!(f, "{id}: scope '{operation_name}' never closed")
            }
            TraceIssue::NegativeTotal { id } => write!(f, "{id}: memory total below zero"),
        }
    }
}

#[derive(Default)]
struct Checker {
    buffer_ids: HashSet<u64>,
    deallocated_by: HashMap<u64, u64>,
    open_scopes: Vec<(u64, String)>,
    issues: Vec<TraceIssue>,
}

impl Checker {
    fn add_buffer(&mut self, id: u64) {
        self.buffer_ids.insert(id);
    }

    fn end_checks(&mut self) {
        for (id, operation_name) in self.open_scopes.drain(..) {
            self.issues.push(TraceIssue::UnclosedScope { id, operation_name });
        }
    }
}

impl TraceVisitor for Checker {
    fn function_start(&mut self, id: u64, operation_name: &str) {
        self.open_scopes.push((id, operation_name.to_owned()));
    }

    fn function_end(&mut self, id: u64) {
        if self.open_scopes.pop().is_none() {
            self.issues.push(TraceIssue::UnmatchedFunctionEnd { id });
        }
    }

    fn buffer(&mut self, id: u64, _params: &BufferParams) {
        self.add_buffer(id);
    }

    fn buffer_allocate(&mut self, id: u64, _params: &BufferParams) {
        self.add_buffer(id);
    }

    fn buffer_deallocate(&mut self, id: u64, connections: &[u64]) {
        let Some(&allocation_id) = connections.first() else {
            self.issues
                .push(TraceIssue::DeallocationWithoutConnections { id });
            return;
        };

        if !self.buffer_ids.contains(&allocation_id) {
            self.issues.push(TraceIssue::UnknownAllocation { id, allocation_id });
            return;
        }

        if let Some(&first_deallocation_id) = self.deallocated_by.get(&allocation_id) {
            self.issues.push(TraceIssue::DoubleDeallocation {
                id,
                allocation_id,
                first_deallocation_id,
            });
        } else {
            self.deallocated_by.insert(allocation_id, id);
        }
    }
}

/// Return every issue found in `events`, in trace order per check.
#[must_use]
pub fn check_trace(events: &[TraceEvent]) -> Vec<TraceIssue> {
    let mut issues = Vec::new();

    let mut seen_ids = HashSet::new();
    for event in events {
        if !seen_ids.insert(event.id) {
            issues.push(TraceIssue::DuplicateId { id: event.id });
        }
    }

    let mut checker = Checker::default();
    visit_events(events, &mut checker);
    checker.end_checks();
    issues.append(&mut checker.issues);

    if let Some(id) = compute_memory_trace(events).first_negative_event_id {
        issues.push(TraceIssue::NegativeTotal { id });
    }

    issues
}
