// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The canonical form of a device-operation trace event.
//!
//! Events are produced from the backend payload by [`crate::wire`] and are
//! consumed by the [`crate::reducer`] and [`crate::check`] modules. Each event
//! has a unique `id` giving its position in the trace and an [`EventKind`]
//! carrying the kind-dependent parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Memory space a buffer lives in.
///
/// Only [`MemorySpace::L1`] is accounted by the reducer. Spaces the trace
/// names but this crate does not know are kept as [`MemorySpace::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemorySpace {
    /// Per-core SRAM.
    L1,
    /// The small-buffer region of L1, allocated separately from it.
    #[serde(rename = "L1_SMALL")]
    L1Small,
    /// Device DRAM.
    #[serde(rename = "DRAM")]
    Dram,
    /// Any other space, such as host system memory.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemorySpace::L1 => write!(f, "L1"),
            MemorySpace::L1Small => write!(f, "L1_SMALL"),
            MemorySpace::Dram => write!(f, "DRAM"),
            MemorySpace::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Parameters shared by buffer-carrying events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferParams {
    /// Where the buffer lives.
    pub memory_space: MemorySpace,

    /// Size of the buffer in bytes.
    pub size_bytes: u64,

    /// Device address of the buffer, when the trace recorded one.
    pub address: Option<u64>,
}

/// The kind of a [`TraceEvent`] along with its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Opens an operation scope.
    FunctionStart {
        /// Name of the operation, e.g. `ttnn::matmul`.
        operation_name: String,
    },

    /// Closes the innermost open operation scope.
    FunctionEnd,

    /// A buffer that exists in the trace without an explicit allocation.
    Buffer(BufferParams),

    /// A buffer allocation.
    BufferAllocate(BufferParams),

    /// A buffer deallocation. By convention the first connection is the id
    /// of the matching allocation.
    BufferDeallocate {
        /// Ids of the events released by this deallocation.
        connections: Vec<u64>,
    },

    /// A circular buffer allocation (always L1).
    CircularBufferAllocate {
        /// Size of the circular buffer in bytes.
        size_bytes: u64,

        /// Device address of the circular buffer, if recorded.
        address: Option<u64>,
    },

    /// Releases every circular buffer allocated so far.
    CircularBufferDeallocateAll,

    /// A tensor node. Informational only.
    Tensor {
        /// Identifier of the tensor, if recorded.
        tensor_id: Option<u64>,
    },

    /// Any other node the trace records (capture start/end and so on).
    /// Informational only.
    Marker {
        /// The node type as it appeared in the trace.
        label: String,
    },
}

impl EventKind {
    /// The snake_case name used for this kind in serialized traces.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            EventKind::FunctionStart { .. } => "function_start",
            EventKind::FunctionEnd => "function_end",
            EventKind::Buffer(_) => "buffer",
            EventKind::BufferAllocate(_) => "buffer_allocate",
            EventKind::BufferDeallocate { .. } => "buffer_deallocate",
            EventKind::CircularBufferAllocate { .. } => "circular_buffer_allocate",
            EventKind::CircularBufferDeallocateAll => "circular_buffer_deallocate_all",
            EventKind::Tensor { .. } => "tensor",
            EventKind::Marker { label } => label,
        }
    }
}

/// One element of a device-operation trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    /// Unique, monotonic position of the event in the trace.
    pub id: u64,

    /// What happened, with its parameters.
    pub kind: EventKind,
}

impl TraceEvent {
    /// Create an event from an id and a kind.
    #[must_use]
    pub fn new(id: u64, kind: EventKind) -> Self {
        Self { id, kind }
    }

    /// A `FunctionStart` for `operation_name`.
    #[must_use]
    pub fn function_start(id: u64, operation_name: &str) -> Self {
        Self::new(
            id,
            EventKind::FunctionStart {
                operation_name: operation_name.to_owned(),
            },
        )
    }

    /// A `FunctionEnd`.
    #[must_use]
    pub fn function_end(id: u64) -> Self {
        Self::new(id, EventKind::FunctionEnd)
    }

    /// A `Buffer` node without an address.
    #[must_use]
    pub fn buffer(id: u64, memory_space: MemorySpace, size_bytes: u64) -> Self {
        Self::new(
            id,
            EventKind::Buffer(BufferParams {
                memory_space,
                size_bytes,
                address: None,
            }),
        )
    }

    /// A `BufferAllocate` without an address.
    #[must_use]
    pub fn buffer_allocate(id: u64, memory_space: MemorySpace, size_bytes: u64) -> Self {
        Self::new(
            id,
            EventKind::BufferAllocate(BufferParams {
                memory_space,
                size_bytes,
                address: None,
            }),
        )
    }

    /// A `BufferAllocate` at a given device address.
    #[must_use]
    pub fn buffer_allocate_at(
        id: u64,
        memory_space: MemorySpace,
        size_bytes: u64,
        address: u64,
    ) -> Self {
        Self::new(
            id,
            EventKind::BufferAllocate(BufferParams {
                memory_space,
                size_bytes,
                address: Some(address),
            }),
        )
    }

    /// A `BufferDeallocate` releasing the allocation with id `allocation_id`.
    #[must_use]
    pub fn buffer_deallocate(id: u64, allocation_id: u64) -> Self {
        Self::new(
            id,
            EventKind::BufferDeallocate {
                connections: vec![allocation_id],
            },
        )
    }

    /// A `CircularBufferAllocate` without an address.
    #[must_use]
    pub fn circular_buffer_allocate(id: u64, size_bytes: u64) -> Self {
        Self::new(
            id,
            EventKind::CircularBufferAllocate {
                size_bytes,
                address: None,
            },
        )
    }

    /// A `CircularBufferDeallocateAll`.
    #[must_use]
    pub fn circular_buffer_deallocate_all(id: u64) -> Self {
        Self::new(id, EventKind::CircularBufferDeallocateAll)
    }

    /// A `Tensor` node.
    #[must_use]
    pub fn tensor(id: u64, tensor_id: Option<u64>) -> Self {
        Self::new(id, EventKind::Tensor { tensor_id })
    }

    /// An informational marker such as `capture_start`.
    #[must_use]
    pub fn marker(id: u64, label: &str) -> Self {
        Self::new(
            id,
            EventKind::Marker {
                label: label.to_owned(),
            },
        )
    }

    /// The buffer parameters for events that carry them (`Buffer` and
    /// `BufferAllocate`).
    #[must_use]
    pub fn buffer_params(&self) -> Option<&BufferParams> {
        match &self.kind {
            EventKind::Buffer(params) | EventKind::BufferAllocate(params) => Some(params),
            _ => None,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.kind.name())
    }
}
