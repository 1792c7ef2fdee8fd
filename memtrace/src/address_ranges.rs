// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Helpers for summarising where buffers sit in a memory space.
//!
//! Buffers are described as [`MemoryChunk`]s. Chunks can be merged into the
//! set of occupied [`AddressRange`]s, the gaps between them found, and the
//! occupied ranges grouped into [`AddressSegment`]s so that a sparsely used
//! address space (typically DRAM) can be shown as a few dense segments.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::event::{EventKind, MemorySpace, TraceEvent};

/// A buffer at `address` occupying `size` bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MemoryChunk {
    /// Start address.
    pub address: u64,

    /// Size in bytes.
    pub size: u64,
}

impl MemoryChunk {
    /// Create a chunk.
    #[must_use]
    pub fn new(address: u64, size: u64) -> Self {
        Self { address, size }
    }

    /// The address range covered by the chunk.
    #[must_use]
    pub fn range(&self) -> AddressRange {
        AddressRange::new(self.address, self.address.saturating_add(self.size))
    }
}

/// The half-open range of addresses `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AddressRange {
    /// First address in the range.
    pub start: u64,

    /// One past the last address in the range.
    pub end: u64,
}

impl AddressRange {
    /// Create a range.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `addr` lies in the range.
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}..{:#010x}", self.start, self.end)
    }
}

/// A group of occupied ranges that are close enough to be shown together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddressSegment {
    /// From the start of the first chunk to the end of the last.
    pub range: AddressRange,

    /// The chunks in the segment, sorted by address.
    pub chunks: Vec<MemoryChunk>,
}

/// Merge chunks into sorted, non-overlapping ranges.
///
/// Overlapping and touching chunks are combined. Zero-sized chunks are
/// ignored.
#[must_use]
pub fn merge_chunks(chunks: &[MemoryChunk]) -> Vec<AddressRange> {
    let mut merged: Vec<AddressRange> = Vec::new();
    for range in chunks
        .iter()
        .map(MemoryChunk::range)
        .filter(|r| !r.is_empty())
        .sorted_by_key(|r| r.start)
    {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Return the parts of `region` not covered by `used`.
///
/// `used` must be sorted and non-overlapping, as returned by
/// [`merge_chunks`].
#[must_use]
pub fn free_ranges(used: &[AddressRange], region: AddressRange) -> Vec<AddressRange> {
    let mut free = Vec::new();
    let mut cursor = region.start;
    for range in used {
        if range.end <= cursor {
            continue;
        }
        if range.start >= region.end {
            break;
        }
        if range.start > cursor {
            free.push(AddressRange::new(cursor, range.start));
        }
        cursor = cursor.max(range.end);
    }
    if cursor < region.end {
        free.push(AddressRange::new(cursor, region.end));
    }
    free
}

/// Group chunks into segments, starting a new segment whenever the gap
/// between neighbouring occupied ranges is larger than `split_gap` bytes.
#[must_use]
pub fn split_segments(chunks: &[MemoryChunk], split_gap: u64) -> Vec<AddressSegment> {
    let mut segments: Vec<AddressSegment> = Vec::new();
    for range in merge_chunks(chunks) {
        match segments.last_mut() {
            Some(last) if range.start - last.range.end <= split_gap => {
                last.range.end = range.end;
            }
            _ => segments.push(AddressSegment {
                range,
                chunks: Vec::new(),
            }),
        }
    }

    let sorted_chunks = chunks
        .iter()
        .filter(|c| c.size > 0)
        .sorted_by_key(|c| (c.address, c.size));
    let mut segment_iter = segments.iter_mut().peekable();
    for chunk in sorted_chunks {
        while let Some(segment) = segment_iter.peek_mut() {
            if segment.range.contains(chunk.address) {
                segment.chunks.push(*chunk);
                break;
            }
            segment_iter.next();
        }
    }
    segments
}

/// The buffers in `memory_space` that are still allocated at the end of the
/// trace and whose address was recorded, sorted by address.
#[must_use]
pub fn live_chunks(events: &[TraceEvent], memory_space: &MemorySpace) -> Vec<MemoryChunk> {
    let mut live = HashMap::new();
    for event in events {
        match &event.kind {
            EventKind::BufferAllocate(params) if &params.memory_space == memory_space => {
                if let Some(address) = params.address {
                    live.insert(event.id, MemoryChunk::new(address, params.size_bytes));
                }
            }
            EventKind::BufferDeallocate { connections } => {
                if let Some(allocation_id) = connections.first() {
                    live.remove(allocation_id);
                }
            }
            _ => {}
        }
    }
    live.into_values()
        .sorted_by_key(|c| (c.address, c.size))
        .collect()
}
