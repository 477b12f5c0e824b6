//! Dense retention time × axis matrices for UV and MS data
use std::ops::RangeInclusive;

use itertools::Itertools;

use crate::grid::MzGrid;

/// How to reduce a UV matrix to a single absorbance trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WavelengthSelector {
    /// Sum the intensities over every recorded wavelength
    All,
    /// Use the recorded wavelength closest to the requested one (nm)
    Nearest(f64),
}

/// Absorbance by retention time (minutes, rows) and wavelength (nm, columns)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UvMatrix {
    pub retention_times: Vec<f64>,
    pub wavelengths: Vec<f64>,
    intensities: Vec<f64>,
}

impl UvMatrix {
    /// Build a matrix from row-major intensities.
    ///
    /// # Panics
    /// If `intensities` is not `retention_times.len() * wavelengths.len()` long.
    pub fn new(retention_times: Vec<f64>, wavelengths: Vec<f64>, intensities: Vec<f64>) -> Self {
        assert_eq!(
            retention_times.len() * wavelengths.len(),
            intensities.len(),
            "UV matrix shape does not match its axes"
        );
        Self {
            retention_times,
            wavelengths,
            intensities,
        }
    }

    pub fn rows(&self) -> usize {
        self.retention_times.len()
    }

    pub fn columns(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.columns();
        &self.intensities[index * width..(index + 1) * width]
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.intensities[row * self.columns() + column]
    }

    /// The column whose wavelength is closest to `wavelength`, ties going to the first
    pub fn nearest_wavelength_index(&self, wavelength: f64) -> Option<usize> {
        self.wavelengths
            .iter()
            .position_min_by(|a, b| (*a - wavelength).abs().total_cmp(&(*b - wavelength).abs()))
    }

    /// Reduce the matrix to one intensity per retention time
    pub fn trace(&self, selector: WavelengthSelector) -> Vec<f64> {
        match selector {
            WavelengthSelector::All => (0..self.rows()).map(|i| self.row(i).iter().sum()).collect(),
            WavelengthSelector::Nearest(wavelength) => {
                match self.nearest_wavelength_index(wavelength) {
                    Some(column) => (0..self.rows()).map(|i| self.get(i, column)).collect(),
                    None => vec![0.0; self.rows()],
                }
            }
        }
    }
}

/// Ion intensity by retention time (seconds, rows) and m/z bin (columns)
#[derive(Debug, Clone, PartialEq)]
pub struct MsMatrix {
    pub retention_times: Vec<f64>,
    pub grid: MzGrid,
    intensities: Vec<f64>,
}

impl MsMatrix {
    /// Allocate a zero-filled matrix with one row per scan
    pub fn zeros(retention_times: Vec<f64>, grid: MzGrid) -> Self {
        let size = retention_times.len() * grid.len();
        Self {
            retention_times,
            grid,
            intensities: vec![0.0; size],
        }
    }

    pub fn scan_count(&self) -> usize {
        self.retention_times.len()
    }

    pub fn width(&self) -> usize {
        self.grid.len()
    }

    pub fn set(&mut self, scan: usize, bin: usize, intensity: f64) {
        let width = self.width();
        self.intensities[scan * width + bin] = intensity;
    }

    pub fn get(&self, scan: usize, bin: usize) -> f64 {
        self.intensities[scan * self.width() + bin]
    }

    pub fn scan(&self, index: usize) -> &[f64] {
        let width = self.width();
        &self.intensities[index * width..(index + 1) * width]
    }

    /// A copy of this matrix without its first `n` scans
    pub fn drop_leading_scans(&self, n: usize) -> Self {
        let n = n.min(self.scan_count());
        let width = self.width();
        Self {
            retention_times: self.retention_times[n..].to_vec(),
            grid: self.grid,
            intensities: self.intensities[n * width..].to_vec(),
        }
    }

    /// The scan recorded closest to `time` (seconds), ties going to the earlier scan
    pub fn nearest_scan_index(&self, time: f64) -> Option<usize> {
        self.retention_times
            .iter()
            .position_min_by(|a, b| (*a - time).abs().total_cmp(&(*b - time).abs()))
    }

    /// Sum every m/z column over an inclusive range of scans
    pub fn summed_spectrum(&self, scans: RangeInclusive<usize>) -> Vec<f64> {
        let mut acc = vec![0.0; self.width()];
        let last = self.scan_count().saturating_sub(1);
        let (start, end) = (*scans.start(), (*scans.end()).min(last));
        if self.scan_count() == 0 || start > end {
            return acc;
        }
        for i in start..=end {
            for (total, value) in acc.iter_mut().zip(self.scan(i)) {
                *total += *value;
            }
        }
        acc
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_uv() -> UvMatrix {
        UvMatrix::new(
            vec![0.0, 0.1, 0.2],
            vec![210.0, 254.0, 280.0],
            vec![
                1.0, 2.0, 3.0, //
                4.0, 5.0, 6.0, //
                7.0, 8.0, 9.0,
            ],
        )
    }

    #[test]
    fn test_uv_traces() {
        let uv = make_uv();
        assert_eq!(uv.trace(WavelengthSelector::All), vec![6.0, 15.0, 24.0]);
        assert_eq!(uv.trace(WavelengthSelector::Nearest(250.0)), vec![2.0, 5.0, 8.0]);
        assert_eq!(uv.trace(WavelengthSelector::Nearest(1000.0)), vec![3.0, 6.0, 9.0]);
        assert_eq!(uv.nearest_wavelength_index(232.0), Some(0));
    }

    #[test]
    fn test_ms_window_sum() {
        let grid = MzGrid::new(100.0, 101.0, 0.5, 1).unwrap();
        let mut ms = MsMatrix::zeros(vec![1.0, 2.0, 3.0, 4.0], grid);
        ms.set(0, 0, 5.0);
        ms.set(1, 1, 10.0);
        ms.set(2, 1, 20.0);
        ms.set(3, 2, 40.0);
        assert_eq!(ms.summed_spectrum(1..=2), vec![0.0, 30.0, 0.0]);
        assert_eq!(ms.summed_spectrum(0..=10), vec![5.0, 30.0, 40.0]);
        assert_eq!(ms.nearest_scan_index(2.4), Some(1));
        assert_eq!(ms.nearest_scan_index(2.5), Some(1));
        assert_eq!(ms.nearest_scan_index(100.0), Some(3));

        let trimmed = ms.drop_leading_scans(1);
        assert_eq!(trimmed.scan_count(), 3);
        assert_eq!(trimmed.retention_times, vec![2.0, 3.0, 4.0]);
        assert_eq!(trimmed.get(0, 1), 10.0);
    }
}
