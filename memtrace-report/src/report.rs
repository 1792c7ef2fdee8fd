// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Write the reduced trace as text or JSON.

use std::io::{self, Write};

use memtrace::address_ranges::{AddressSegment, live_chunks, split_segments};
use memtrace::check::TraceIssue;
use memtrace::colors::{Color, ColorAllocator};
use memtrace::event::{MemorySpace, TraceEvent};
use memtrace::reducer::{AllocationRecord, MemoryTrace, OperationPeak};
use memtrace::wire::OperationTrace;
use regex::Regex;
use serde::Serialize;

/// Build the operation filter. An empty expression matches everything.
pub fn build_filter(filter_regex: &str) -> Result<Option<Regex>, regex::Error> {
    if filter_regex.is_empty() {
        Ok(None)
    } else {
        Regex::new(filter_regex).map(Some)
    }
}

fn selected<'a>(
    memory_trace: &'a MemoryTrace,
    filter: Option<&'a Regex>,
) -> impl Iterator<Item = &'a AllocationRecord> {
    memory_trace.records.iter().filter(move |r| match filter {
        None => true,
        Some(re) => r
            .operation_name
            .as_deref()
            .is_some_and(|name| re.is_match(name)),
    })
}

fn operation_label(operation: &OperationTrace) -> String {
    match (&operation.id, &operation.name) {
        (Some(id), Some(name)) => format!("operation {id} ({name})"),
        (Some(id), None) => format!("operation {id}"),
        (None, Some(name)) => format!("operation {name}"),
        (None, None) => "trace".to_string(),
    }
}

/// Write one annotation line per record followed by the peak.
pub fn write_records(
    out: &mut dyn Write,
    operation: &OperationTrace,
    memory_trace: &MemoryTrace,
    filter: Option<&Regex>,
) -> io::Result<()> {
    writeln!(
        out,
        "{}: {} events, {} records",
        operation_label(operation),
        operation.events.len(),
        memory_trace.records.len()
    )?;
    for record in selected(memory_trace, filter) {
        let marker = if record.combined_total == memory_trace.peak {
            " <- peak"
        } else {
            ""
        };
        writeln!(
            out,
            "{:>6} {:<40} CBs: {} / Buffers: {} / Total: {}{marker}",
            record.event_id,
            record.operation_name.as_deref().unwrap_or("-"),
            record.circular_buffer_total,
            record.persistent_buffer_total,
            record.combined_total
        )?;
    }
    writeln!(out, "Peak: {}", memory_trace.peak)
}

fn write_segments(
    out: &mut dyn Write,
    memory_space: &MemorySpace,
    segments: &[AddressSegment],
    colors: &mut ColorAllocator<u64>,
) -> io::Result<()> {
    let num_buffers: usize = segments.iter().map(|s| s.chunks.len()).sum();
    writeln!(
        out,
        "Live {memory_space} buffers: {num_buffers} in {} segment(s)",
        segments.len()
    )?;
    for segment in segments {
        writeln!(
            out,
            "  {} ({} bytes, {} buffers)",
            segment.range,
            segment.range.len(),
            segment.chunks.len()
        )?;
        for chunk in &segment.chunks {
            writeln!(
                out,
                "    {:#010x} {:>10} bytes {}",
                chunk.address,
                chunk.size,
                colors.get_or_assign(chunk.address)
            )?;
        }
    }
    Ok(())
}

/// Write per-operation peaks and the live buffer layout of each memory
/// space.
pub fn write_summary(
    out: &mut dyn Write,
    events: &[TraceEvent],
    memory_trace: &MemoryTrace,
    split_gap: u64,
) -> io::Result<()> {
    writeln!(out, "Operation peaks:")?;
    for peak in memory_trace.operation_peaks() {
        writeln!(
            out,
            "  {:<40} events {}..={} peak {}",
            peak.operation_name.as_deref().unwrap_or("-"),
            peak.first_event_id,
            peak.last_event_id,
            peak.peak_combined_total
        )?;
    }

    let mut colors = ColorAllocator::new();
    for memory_space in [MemorySpace::L1, MemorySpace::Dram] {
        let segments = split_segments(&live_chunks(events, &memory_space), split_gap);
        write_segments(out, &memory_space, &segments, &mut colors)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonChunk {
    address: u64,
    size: u64,
    color: Color,
}

#[derive(Serialize)]
struct JsonSegment {
    start: u64,
    end: u64,
    chunks: Vec<JsonChunk>,
}

#[derive(Serialize)]
struct JsonSummary {
    operation_peaks: Vec<OperationPeak>,
    l1_segments: Vec<JsonSegment>,
    dram_segments: Vec<JsonSegment>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    operation_id: Option<u64>,
    operation_name: Option<&'a str>,
    peak: i64,
    peak_event_ids: Vec<u64>,
    records: Vec<&'a AllocationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<JsonSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<&'a [TraceIssue]>,
}

fn json_segments(
    events: &[TraceEvent],
    memory_space: &MemorySpace,
    split_gap: u64,
    colors: &mut ColorAllocator<u64>,
) -> Vec<JsonSegment> {
    split_segments(&live_chunks(events, memory_space), split_gap)
        .into_iter()
        .map(|segment| JsonSegment {
            start: segment.range.start,
            end: segment.range.end,
            chunks: segment
                .chunks
                .iter()
                .map(|c| JsonChunk {
                    address: c.address,
                    size: c.size,
                    color: colors.get_or_assign(c.address),
                })
                .collect(),
        })
        .collect()
}

/// Options for [`write_json`].
pub struct JsonOptions<'a> {
    /// Only include records whose operation matches.
    pub filter: Option<&'a Regex>,

    /// Include the summary, with this split gap.
    pub summary_split_gap: Option<u64>,

    /// Include these issues.
    pub issues: Option<&'a [TraceIssue]>,
}

/// Write the reduced trace as a single JSON document.
pub fn write_json(
    out: &mut dyn Write,
    operation: &OperationTrace,
    memory_trace: &MemoryTrace,
    options: &JsonOptions,
) -> serde_json::Result<()> {
    let summary = options.summary_split_gap.map(|split_gap| {
        let mut colors = ColorAllocator::new();
        JsonSummary {
            operation_peaks: memory_trace.operation_peaks(),
            l1_segments: json_segments(&operation.events, &MemorySpace::L1, split_gap, &mut colors),
            dram_segments: json_segments(
                &operation.events,
                &MemorySpace::Dram,
                split_gap,
                &mut colors,
            ),
        }
    });

    let report = JsonReport {
        operation_id: operation.id,
        operation_name: operation.name.as_deref(),
        peak: memory_trace.peak,
        peak_event_ids: memory_trace.peak_event_ids(),
        records: selected(memory_trace, options.filter).collect(),
        summary,
        issues: options.issues,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out).map_err(serde_json::Error::io)
}
