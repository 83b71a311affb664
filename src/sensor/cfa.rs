//! Color filter array patterns.
//!
//! A pattern is a small square tile of channel labels validated once at
//! construction and replicated across the pixel grid, never re-parsed.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A spectral channel class a CFA site can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfaChannel {
    Red,
    Green,
    Blue,
    /// Unfiltered (panchromatic) site.
    Clear,
}

impl fmt::Display for CfaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            CfaChannel::Red => 'r',
            CfaChannel::Green => 'g',
            CfaChannel::Blue => 'b',
            CfaChannel::Clear => 'c',
        };
        write!(f, "{letter}")
    }
}

/// Errors raised when constructing a [`CfaPattern`].
#[derive(Debug, Error)]
pub enum CfaError {
    #[error("CFA tile must be square, got {rows} rows with a row of length {row_len}")]
    NotSquare { rows: usize, row_len: usize },

    #[error("CFA tile must not be empty")]
    Empty,
}

/// A validated square tile of CFA channel labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaPattern {
    size: usize,
    tile: Vec<CfaChannel>,
}

impl CfaPattern {
    /// Build a pattern from tile rows; every row must have the same length
    /// as the number of rows.
    pub fn new(rows: &[&[CfaChannel]]) -> Result<Self, CfaError> {
        if rows.is_empty() {
            return Err(CfaError::Empty);
        }
        let size = rows.len();
        let mut tile = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(CfaError::NotSquare {
                    rows: size,
                    row_len: row.len(),
                });
            }
            tile.extend_from_slice(row);
        }
        Ok(Self { size, tile })
    }

    /// The standard Bayer RGGB tile.
    pub fn rggb() -> Self {
        use CfaChannel::{Blue, Green, Red};
        Self::new(&[&[Red, Green], &[Green, Blue]]).expect("rggb tile is square")
    }

    /// Tile side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Channel at an absolute pixel position, replicating the tile.
    pub fn channel_at(&self, row: usize, col: usize) -> CfaChannel {
        self.tile[(row % self.size) * self.size + col % self.size]
    }

    /// Channel at a position inside the tile itself.
    pub fn tile_channel(&self, tile_row: usize, tile_col: usize) -> CfaChannel {
        self.tile[tile_row * self.size + tile_col]
    }

    /// The distinct channels present in the tile, in first-seen order.
    pub fn channels(&self) -> Vec<CfaChannel> {
        let mut seen = Vec::new();
        for &ch in &self.tile {
            if !seen.contains(&ch) {
                seen.push(ch);
            }
        }
        seen
    }

    /// True when the tile evenly divides an `rows x cols` pixel array.
    pub fn tiles_evenly(&self, rows: usize, cols: usize) -> bool {
        rows % self.size == 0 && cols % self.size == 0
    }

    /// True for a 2x2 tile holding one red, one blue and two greens — the
    /// geometry the neighbor-based demosaic methods assume.
    pub fn is_bayer(&self) -> bool {
        if self.size != 2 {
            return false;
        }
        let count = |target: CfaChannel| self.tile.iter().filter(|&&c| c == target).count();
        count(CfaChannel::Red) == 1
            && count(CfaChannel::Blue) == 1
            && count(CfaChannel::Green) == 2
    }
}
