// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Library half of the `memtrace-report` command: settings and output.

pub mod config;
pub mod report;
