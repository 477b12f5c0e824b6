//! Searching the MS scans under each UV peak for the target's adducts.
use std::ops::RangeInclusive;

use itertools::Itertools;
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType, Tolerance};
use serde::Serialize;
use tracing::{debug, trace};

use crate::adducts::AdductTable;
use crate::integration::{PeakTable, UvPeak};
use crate::matrix::MsMatrix;
use crate::sample::Polarity;

/// The MS detector sits downstream of the UV detector, so ions arrive this many
/// seconds after their UV signal
pub const DEFAULT_MS_LAG_SECONDS: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassSearchParams {
    /// Half width of the m/z match window, in Daltons
    pub delta: f64,
    /// Summed intensity an m/z column must exceed to be considered
    pub intensity_threshold: f64,
    /// Extension of each peak's window end, in seconds
    pub ms_lag_seconds: f64,
}

impl MassSearchParams {
    pub fn new(delta: f64, intensity_threshold: f64) -> Self {
        Self {
            delta,
            intensity_threshold,
            ms_lag_seconds: DEFAULT_MS_LAG_SECONDS,
        }
    }

    pub fn with_ms_lag(mut self, ms_lag_seconds: f64) -> Self {
        self.ms_lag_seconds = ms_lag_seconds;
        self
    }
}

/// One adduct observed under a peak
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdductHit {
    pub adduct: String,
    pub mz: f64,
}

/// The adducts observed under one UV peak, at most one per adduct
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakMatch {
    pub peak_index: usize,
    pub hits: Vec<AdductHit>,
}

/// The scans recorded during `peak`, its end extended by `lag` seconds
pub fn scan_window(peak: &UvPeak, ms: &MsMatrix, lag: f64) -> Option<RangeInclusive<usize>> {
    let (start, end) = peak.window_seconds();
    let first = ms.nearest_scan_index(start)?;
    let last = ms.nearest_scan_index(end + lag)?;
    Some(first..=last)
}

/// Every m/z column of `spectrum` whose intensity exceeds `threshold`, as a peak set
pub fn peaks_above_threshold(
    spectrum: &[f64],
    ms: &MsMatrix,
    threshold: f64,
) -> MZPeakSetType<CentroidPeak> {
    let peaks = spectrum
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > threshold)
        .map(|(bin, v)| CentroidPeak::new(ms.grid.mz_at(bin), *v as f32, 0))
        .collect();
    MZPeakSetType::new(peaks)
}

/// Match the adducts of `polarity` against the summed spectrum of every peak.
///
/// Peaks where nothing matched are left out of the result.
pub fn mass_search(
    sample_id: &str,
    target_mass: f64,
    polarity: Polarity,
    peak_table: &PeakTable,
    ms: &MsMatrix,
    adducts: &AdductTable,
    params: &MassSearchParams,
) -> Vec<PeakMatch> {
    let mut matches = Vec::new();
    for peak in peak_table.peaks() {
        let Some(window) = scan_window(peak, ms, params.ms_lag_seconds) else {
            debug!("{sample_id}: no MS scans to search");
            break;
        };
        trace!("{sample_id}: peak {} covers scans {window:?}", peak.index);
        let spectrum = ms.summed_spectrum(window);
        if !spectrum.iter().any(|v| *v > params.intensity_threshold) {
            continue;
        }
        let candidates = peaks_above_threshold(&spectrum, ms, params.intensity_threshold);

        let hits: Vec<AdductHit> = adducts
            .for_polarity(polarity)
            .filter_map(|rule| {
                let expected = rule.expected_mz(target_mass);
                candidates
                    .all_peaks_for(expected, Tolerance::Da(params.delta))
                    .iter()
                    .filter(|p| rule.matches(target_mass, p.mz, params.delta))
                    .min_by(|a, b| {
                        (a.mz - expected)
                            .abs()
                            .total_cmp(&(b.mz - expected).abs())
                    })
                    .map(|p| AdductHit {
                        adduct: rule.name.clone(),
                        mz: p.mz,
                    })
            })
            .collect();

        if !hits.is_empty() {
            debug!(
                "{sample_id}: peak {} matched {}",
                peak.index,
                hits.iter().map(|h| h.adduct.as_str()).join(", ")
            );
            matches.push(PeakMatch {
                peak_index: peak.index,
                hits,
            });
        }
    }
    matches
}
