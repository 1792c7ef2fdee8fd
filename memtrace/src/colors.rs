// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Stable colour assignment for buffers and tensors.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Serialize, Serializer};

/// An RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Color {
    /// Create a colour from its components.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Palette used when none is given.
pub const DEFAULT_PALETTE: [Color; 12] = [
    Color::rgb(0x1f, 0x77, 0xb4),
    Color::rgb(0xff, 0x7f, 0x0e),
    Color::rgb(0x2c, 0xa0, 0x2c),
    Color::rgb(0xd6, 0x27, 0x28),
    Color::rgb(0x94, 0x67, 0xbd),
    Color::rgb(0x8c, 0x56, 0x4b),
    Color::rgb(0xe3, 0x77, 0xc2),
    Color::rgb(0x7f, 0x7f, 0x7f),
    Color::rgb(0xbc, 0xbd, 0x22),
    Color::rgb(0x17, 0xbe, 0xcf),
    Color::rgb(0x39, 0x3b, 0x79),
    Color::rgb(0xad, 0x49, 0x4a),
];

/// Hands out a stable colour per key, cycling through a palette in the
/// order keys are first seen.
///
/// Create one per session; two allocators never share assignments.
pub struct ColorAllocator<K> {
    palette: Vec<Color>,
    assigned: HashMap<K, Color>,
}

impl<K: Eq + Hash> Default for ColorAllocator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> ColorAllocator<K> {
    /// Create an allocator using [`DEFAULT_PALETTE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_palette(DEFAULT_PALETTE.to_vec())
    }

    /// Create an allocator using a custom palette.
    ///
    /// An empty palette falls back to [`DEFAULT_PALETTE`].
    #[must_use]
    pub fn with_palette(palette: Vec<Color>) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            palette
        };
        Self {
            palette,
            assigned: HashMap::new(),
        }
    }

    /// Return the colour for `key`, assigning the next palette entry if the
    /// key has not been seen before.
    pub fn get_or_assign(&mut self, key: K) -> Color {
        let next = self.palette[self.assigned.len() % self.palette.len()];
        *self.assigned.entry(key).or_insert(next)
    }

    /// The colour already assigned to `key`, if any.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Color> {
        self.assigned.get(key).copied()
    }

    /// Number of keys assigned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Whether no key has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
