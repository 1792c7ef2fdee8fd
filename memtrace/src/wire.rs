// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Types that map directly to the backend JSON payload, and their
//! normalisation into [`TraceEvent`]s.
//!
//! The backend serves the trace of an operation either as part of an
//! operation-details object:
//!
//! ```json
//! { "id": 7, "name": "ttnn.add", "device_operations": [ ... ] }
//! ```
//!
//! or as a bare list of nodes. Each node looks like:
//!
//! ```json
//! { "id": 3, "node_type": "buffer_allocate",
//!   "params": { "type": "L1", "size": "2048", "address": "0x1a000" },
//!   "connections": [] }
//! ```
//!
//! Numeric parameters are frequently serialized as strings, so they are
//! parsed and validated here. The reducer never sees an unparsed value.

use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::event::{BufferParams, EventKind, MemorySpace, TraceEvent};
use crate::{TraceError, TraceResult, trace_error};

/// One node of a serialized device-operation trace.
#[derive(Clone, Debug, Deserialize)]
pub struct WireNode {
    /// Position of the node in the trace.
    #[serde(alias = "counter")]
    pub id: u64,

    /// Snake-case kind name such as `buffer_allocate`.
    pub node_type: String,

    /// Kind-dependent parameters.
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Ids of related nodes.
    #[serde(default)]
    pub connections: Vec<u64>,
}

/// The operation-details object that wraps a trace.
#[derive(Clone, Debug, Deserialize)]
pub struct OperationDetails {
    /// Operation id assigned by the backend.
    #[serde(default)]
    pub id: Option<u64>,

    /// Operation name.
    #[serde(default)]
    pub name: Option<String>,

    /// The trace itself.
    pub device_operations: Vec<WireNode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Details(OperationDetails),
    Nodes(Vec<WireNode>),
}

/// A normalised trace together with the operation it belongs to.
#[derive(Clone, Debug)]
pub struct OperationTrace {
    /// Operation id, if the payload gave one.
    pub id: Option<u64>,

    /// Operation name, if the payload gave one.
    pub name: Option<String>,

    /// Normalised events in trace order.
    pub events: Vec<TraceEvent>,
}

/// Parse a value which could be an integer or a string and return the u64
/// value.
///
/// Strings may be decimal or `0x`-prefixed hexadecimal, with optional `_`
/// separators in the hexadecimal form:
///  4096
///  "4096"
///  "0x1000"
///  "0x0001_0000"
pub fn parse_u64(value: &Value) -> Result<u64, String> {
    if let Some(number) = value.as_u64() {
        return Ok(number);
    }

    let Some(s) = value.as_str() else {
        return Err(format!(
            "'{value}': unsupported type (should be an unsigned integer or a string)"
        ));
    };

    let trimmed = s.trim();
    let lowercase = trimmed.to_lowercase();
    if let Some(without_0x) = lowercase.strip_prefix("0x") {
        let without_underscore = without_0x.replace('_', "");
        u64::from_str_radix(&without_underscore, 16)
            .map_err(|e| format!("unable to parse '{s}' as a hex string: {e}"))
    } else {
        trimmed
            .parse::<u64>()
            .map_err(|e| format!("unable to parse '{s}' as an unsigned integer: {e}"))
    }
}

fn parse_memory_space(s: &str) -> MemorySpace {
    match s.to_uppercase().as_str() {
        "L1" => MemorySpace::L1,
        "L1_SMALL" => MemorySpace::L1Small,
        "DRAM" => MemorySpace::Dram,
        _ => MemorySpace::Other(s.to_owned()),
    }
}

impl WireNode {
    fn required_u64(&self, field: &str) -> TraceResult<u64> {
        match self.params.get(field) {
            Some(value) => parse_u64(value).map_err(|e| self.error(field, &e)),
            None => trace_error!("Node {} ({}): missing '{field}'", self.id, self.node_type),
        }
    }

    fn optional_u64(&self, field: &str) -> TraceResult<Option<u64>> {
        match self.params.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse_u64(value)
                .map(Some)
                .map_err(|e| self.error(field, &e)),
        }
    }

    fn required_str(&self, field: &str) -> TraceResult<&str> {
        match self.params.get(field).and_then(Value::as_str) {
            Some(s) => Ok(s),
            None => trace_error!(
                "Node {} ({}): missing string '{field}'",
                self.id,
                self.node_type
            ),
        }
    }

    fn error(&self, field: &str, msg: &str) -> TraceError {
        TraceError(format!(
            "Node {} ({}): invalid '{field}': {msg}",
            self.id, self.node_type
        ))
    }

    fn buffer_params(&self) -> TraceResult<BufferParams> {
        let memory_space = parse_memory_space(self.required_str("type")?);
        if let MemorySpace::Other(name) = &memory_space {
            debug!("Node {}: memory space '{name}' is not accounted", self.id);
        }
        Ok(BufferParams {
            memory_space,
            size_bytes: self.required_u64("size")?,
            address: self.optional_u64("address")?,
        })
    }

    /// Convert this node into its canonical [`TraceEvent`].
    pub fn to_event(&self) -> TraceResult<TraceEvent> {
        let kind = match self.node_type.as_str() {
            "function_start" => EventKind::FunctionStart {
                operation_name: self.required_str("name")?.to_owned(),
            },
            "function_end" => EventKind::FunctionEnd,
            "buffer" => EventKind::Buffer(self.buffer_params()?),
            "buffer_allocate" => EventKind::BufferAllocate(self.buffer_params()?),
            "buffer_deallocate" => EventKind::BufferDeallocate {
                connections: self.connections.clone(),
            },
            "circular_buffer_allocate" => EventKind::CircularBufferAllocate {
                size_bytes: self.required_u64("size")?,
                address: self.optional_u64("address")?,
            },
            "circular_buffer_deallocate_all" => EventKind::CircularBufferDeallocateAll,
            "tensor" => EventKind::Tensor {
                tensor_id: self.optional_u64("tensor_id")?,
            },
            other => EventKind::Marker {
                label: other.to_owned(),
            },
        };
        Ok(TraceEvent::new(self.id, kind))
    }
}

/// Normalise a list of nodes, failing on the first invalid one.
pub fn normalize(nodes: &[WireNode]) -> TraceResult<Vec<TraceEvent>> {
    nodes.iter().map(WireNode::to_event).collect()
}

/// Parse and normalise an operation payload (or a bare node list).
pub fn parse_operation_str(payload: &str) -> TraceResult<OperationTrace> {
    let payload: Payload = serde_json::from_str(payload)
        .map_err(|e| TraceError(format!("serde_json::from_str failed: {e}")))?;
    match payload {
        Payload::Details(details) => Ok(OperationTrace {
            id: details.id,
            name: details.name,
            events: normalize(&details.device_operations)?,
        }),
        Payload::Nodes(nodes) => Ok(OperationTrace {
            id: None,
            name: None,
            events: normalize(&nodes)?,
        }),
    }
}

/// Parse and normalise a trace, discarding any operation metadata.
pub fn parse_trace_str(payload: &str) -> TraceResult<Vec<TraceEvent>> {
    Ok(parse_operation_str(payload)?.events)
}

/// Read, parse and normalise a trace file.
pub fn load_operation_file(path: &Path) -> TraceResult<OperationTrace> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| TraceError(format!("Unable to read {}: {e}", path.display())))?;
    parse_operation_str(&s)
}
