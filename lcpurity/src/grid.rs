//! The fixed m/z axis every MS scan is binned onto
use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::numeric::round_to;

pub const DEFAULT_MZ_START: f64 = 100.0;
pub const DEFAULT_MZ_END: f64 = 1000.0;
pub const DEFAULT_MZ_STEP: f64 = 0.05;
pub const DEFAULT_MZ_DECIMALS: u32 = 2;
const MAX_DECIMALS: u32 = 6;
/// Upper bound on the bins of one grid, each scan allocates a full row
pub const MAX_GRID_BINS: usize = 2_000_000;

/// An evenly spaced, inclusive m/z axis. Values are compared after rounding to
/// `decimals` places, so an m/z read from a file belongs to the grid only if it
/// rounds to exactly one of the grid's bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzGrid {
    pub start: f64,
    pub end: f64,
    pub step: f64,
    pub decimals: u32,
}

impl Default for MzGrid {
    fn default() -> Self {
        Self {
            start: DEFAULT_MZ_START,
            end: DEFAULT_MZ_END,
            step: DEFAULT_MZ_STEP,
            decimals: DEFAULT_MZ_DECIMALS,
        }
    }
}

impl MzGrid {
    pub fn new(start: f64, end: f64, step: f64, decimals: u32) -> Result<Self, GridError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(GridError::InvalidDefinition(format!(
                "step must be positive, got {step}"
            )));
        }
        if !start.is_finite() || !end.is_finite() {
            return Err(GridError::InvalidDefinition(format!(
                "bounds must be finite, got {start}-{end}"
            )));
        }
        if end < start {
            return Err(GridError::InvalidDefinition(format!(
                "end {end} is below start {start}"
            )));
        }
        let bins = ((end - start) / step).round();
        if bins >= MAX_GRID_BINS as f64 {
            return Err(GridError::InvalidDefinition(format!(
                "{start}-{end} in steps of {step} exceeds {MAX_GRID_BINS} bins"
            )));
        }
        Ok(Self {
            start,
            end,
            step,
            decimals,
        })
    }

    /// A grid whose precision is the fewest decimal places that represent `step` exactly
    pub fn from_step(start: f64, end: f64, step: f64) -> Result<Self, GridError> {
        let decimals = (0..=MAX_DECIMALS)
            .find(|d| {
                let scaled = step * 10f64.powi(*d as i32);
                (scaled - scaled.round()).abs() < 1e-6
            })
            .unwrap_or(MAX_DECIMALS);
        Self::new(start, end, step, decimals)
    }

    /// The number of bins, both ends included
    pub fn len(&self) -> usize {
        ((self.end - self.start) / self.step).round() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The m/z value of bin `index`, rounded to the grid's precision
    pub fn mz_at(&self, index: usize) -> f64 {
        round_to(self.start + index as f64 * self.step, self.decimals)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(|i| self.mz_at(i))
    }

    fn scaled(&self, mz: f64) -> i64 {
        (mz * 10f64.powi(self.decimals as i32)).round() as i64
    }

    /// Locate the bin holding `mz`.
    ///
    /// An m/z that rounds onto a different value than its nearest bin is an error,
    /// since that means the grid does not describe the acquisition.
    pub fn bin_index(&self, mz: f64) -> Result<usize, GridError> {
        let position = ((mz - self.start) / self.step).round();
        if !position.is_finite() || position < 0.0 || position as usize >= self.len() {
            return Err(GridError::OutOfRange {
                mz,
                start: self.start,
                end: self.end,
            });
        }
        let index = position as usize;
        let nearest = self.mz_at(index);
        if self.scaled(nearest) == self.scaled(mz) {
            Ok(index)
        } else {
            Err(GridError::OffGrid { mz, nearest })
        }
    }
}
