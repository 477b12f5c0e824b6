//! Slope-based UV peak detection and trapezoidal integration.
//!
//! A trace is segmented by the least-squares slope of a short sliding window:
//! the slope rising through `+threshold` opens a peak and falling through
//! `-threshold` closes it. Each closed peak past the solvent front is then
//! integrated and weighted against the total area of all peaks.
use serde::Serialize;
use tracing::{debug, trace};

use crate::matrix::{UvMatrix, WavelengthSelector};
use crate::numeric::round_to;

pub const DEFAULT_SLOPE_WINDOW: usize = 5;
const SECONDS_PER_MINUTE: f64 = 60.0;

/// Thresholds controlling peak segmentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationParams {
    /// Slope magnitude, in intensity per second, that opens or closes a peak
    pub slope_threshold: f64,
    /// Peaks starting at or before this time (minutes) are the solvent front
    pub solvent_cutoff_minutes: f64,
    /// Number of points in each slope regression
    pub slope_window: usize,
}

impl IntegrationParams {
    pub fn new(slope_threshold: f64, solvent_cutoff_minutes: f64) -> Self {
        Self {
            slope_threshold,
            solvent_cutoff_minutes,
            slope_window: DEFAULT_SLOPE_WINDOW,
        }
    }

    pub fn with_slope_window(mut self, slope_window: usize) -> Self {
        self.slope_window = slope_window;
        self
    }
}

/// One integrated elution peak
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UvPeak {
    /// 1-based, in retention time order
    pub index: usize,
    /// Minutes, rounded to 3 decimals
    pub start_time: f64,
    /// Minutes, rounded to 3 decimals
    pub end_time: f64,
    pub area: f64,
    /// Percentage of the summed area of every peak in the trace
    pub purity: f64,
    #[serde(skip)]
    pub start_index: usize,
    #[serde(skip)]
    pub end_index: usize,
}

impl UvPeak {
    /// The peak's retention time window in seconds
    pub fn window_seconds(&self) -> (f64, f64) {
        (
            self.start_time * SECONDS_PER_MINUTE,
            self.end_time * SECONDS_PER_MINUTE,
        )
    }
}

/// The peaks of one trace. An empty result is reported as its own state, so a
/// consumer cannot mistake it for a table it forgot to fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "peaks", rename_all = "snake_case")]
pub enum PeakTable {
    Detected(Vec<UvPeak>),
    NoPeaksDetected,
}

impl PeakTable {
    pub fn peaks(&self) -> &[UvPeak] {
        match self {
            PeakTable::Detected(peaks) => peaks,
            PeakTable::NoPeaksDetected => &[],
        }
    }

    pub fn get(&self, index: usize) -> Option<&UvPeak> {
        self.peaks().iter().find(|p| p.index == index)
    }

    pub fn len(&self) -> usize {
        self.peaks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn least_squares_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let (num, den) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(num, den), (xi, yi)| {
            let dx = xi - x_mean;
            (num + dx * (yi - y_mean), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// The regression slope of every `window`-point run of `(times, values)`.
///
/// The slope of the run starting at `i` is paired with sample index `i + window`,
/// the first point after the run, so the result has `len - window` entries.
pub fn local_slopes(times: &[f64], values: &[f64], window: usize) -> Vec<(usize, f64)> {
    let len = times.len().min(values.len());
    if window < 2 || len <= window {
        return Vec::new();
    }
    (0..len - window)
        .map(|i| {
            let slope = least_squares_slope(&times[i..i + window], &values[i..i + window]);
            (i + window, slope)
        })
        .collect()
}

/// Walk the slopes with a two state machine, returning the sample indices of
/// each closed peak. A peak still open at the end of the trace is dropped.
pub fn segment_peaks(slopes: &[(usize, f64)], threshold: f64) -> Vec<(usize, usize)> {
    let mut peaks = Vec::new();
    let mut open: Option<usize> = None;
    for pair in slopes.windows(2) {
        let (prev, (index, cur)) = (pair[0].1, pair[1]);
        match open {
            None if prev <= threshold && cur > threshold => {
                trace!("Peak opens at index {index} (slope {cur:.3})");
                open = Some(index);
            }
            Some(start) if prev >= -threshold && cur < -threshold => {
                trace!("Peak closes at index {index} (slope {cur:.3})");
                peaks.push((start, index));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        debug!("Dropping a peak opened at index {start} that never closed");
    }
    peaks
}

/// Composite trapezoid rule over `values[start..=end]` with a uniform step
/// `(b - a) / n`, `n` being the number of intervals between the end points
pub fn trapezoid_area(times: &[f64], values: &[f64], start: usize, end: usize) -> f64 {
    if end <= start {
        return 0.0;
    }
    let n = (end - start) as f64;
    let h = (times[end] - times[start]) / n;
    let interior: f64 = values[start + 1..end].iter().sum();
    h * ((values[start] + values[end]) / 2.0 + interior)
}

/// Detect and integrate the peaks of one trace.
///
/// `times` are in minutes. Slopes and areas are computed against seconds.
pub fn integrate_trace(times: &[f64], values: &[f64], params: &IntegrationParams) -> PeakTable {
    let seconds: Vec<f64> = times.iter().map(|t| t * SECONDS_PER_MINUTE).collect();
    let slopes = local_slopes(&seconds, values, params.slope_window);
    let bounds: Vec<(usize, usize)> = segment_peaks(&slopes, params.slope_threshold)
        .into_iter()
        .filter(|(start, _)| {
            let keep = times[*start] > params.solvent_cutoff_minutes;
            if !keep {
                debug!(
                    "Excluding the solvent front peak starting at {:.3} min",
                    times[*start]
                );
            }
            keep
        })
        .collect();

    if bounds.is_empty() {
        return PeakTable::NoPeaksDetected;
    }

    let areas: Vec<f64> = bounds
        .iter()
        .map(|(start, end)| trapezoid_area(&seconds, values, *start, *end).round())
        .collect();
    let total: f64 = areas.iter().sum();

    let peaks = bounds
        .iter()
        .zip(areas)
        .enumerate()
        .map(|(i, ((start, end), area))| {
            let purity = if total == 0.0 {
                0.0
            } else {
                round_to(area / total * 100.0, 3)
            };
            UvPeak {
                index: i + 1,
                start_time: round_to(times[*start], 3),
                end_time: round_to(times[*end], 3),
                area,
                purity,
                start_index: *start,
                end_index: *end,
            }
        })
        .collect::<Vec<_>>();
    debug!("Integrated {} peaks, total area {total}", peaks.len());
    PeakTable::Detected(peaks)
}

/// Reduce `matrix` to one trace with `selector`, then detect and integrate its peaks
pub fn calculate_uv_integrals(
    matrix: &UvMatrix,
    selector: WavelengthSelector,
    params: &IntegrationParams,
) -> PeakTable {
    let trace = matrix.trace(selector);
    integrate_trace(&matrix.retention_times, &trace, params)
}

#[cfg(test)]
mod test {
    use super::*;

    fn gaussian(t: f64, center: f64, width: f64, height: f64) -> f64 {
        height * (-(t - center).powi(2) / (2.0 * width * width)).exp()
    }

    /// 0.01 minute sampling over `duration` minutes
    fn make_trace(duration: f64, peaks: &[(f64, f64, f64)]) -> (Vec<f64>, Vec<f64>) {
        let n = (duration / 0.01).round() as usize + 1;
        let times: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        let values = times
            .iter()
            .map(|t| {
                peaks
                    .iter()
                    .map(|(c, w, h)| gaussian(*t, *c, *w, *h))
                    .sum()
            })
            .collect();
        (times, values)
    }

    #[test]
    fn test_triangle_area_is_exact() {
        let times: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let values = [0.0, 2.5, 5.0, 7.5, 10.0, 7.5, 5.0, 2.5, 0.0];
        assert_eq!(trapezoid_area(&times, &values, 0, 8), 40.0);
        assert_eq!(trapezoid_area(&times, &values, 0, 4), 20.0);
        assert_eq!(trapezoid_area(&times, &values, 3, 3), 0.0);
    }

    #[test]
    fn test_local_slopes() {
        let times: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let values: Vec<f64> = times.iter().map(|t| 3.0 * t + 1.0).collect();
        let slopes = local_slopes(&times, &values, 5);
        assert_eq!(slopes.len(), 3);
        assert_eq!(slopes[0].0, 5);
        for (_, s) in slopes {
            assert!((s - 3.0).abs() < 1e-9);
        }
        assert!(local_slopes(&times[..5], &values[..5], 5).is_empty());
    }

    #[test]
    fn test_segment_state_machine() {
        let slopes: Vec<(usize, f64)> = [0.0, 2.0, 3.0, 0.5, -2.0, -3.0, 0.0, 2.0, 1.0]
            .into_iter()
            .enumerate()
            .collect();
        // The second rise never falls again, so it is dropped
        assert_eq!(segment_peaks(&slopes, 1.0), vec![(1, 4)]);
        assert!(segment_peaks(&slopes, 5.0).is_empty());
    }

    #[test_log::test]
    fn test_peaks_are_ordered_and_sum_to_100() {
        let (times, values) = make_trace(
            3.0,
            &[(0.8, 0.04, 800.0), (1.5, 0.05, 1000.0), (2.3, 0.06, 400.0)],
        );
        let params = IntegrationParams::new(5.0, 0.2);
        let table = integrate_trace(&times, &values, &params);
        let peaks = table.peaks();
        assert_eq!(peaks.len(), 3);
        for (i, p) in peaks.iter().enumerate() {
            assert_eq!(p.index, i + 1);
            assert!(p.start_time < p.end_time);
            assert!(p.area > 0.0);
        }
        for pair in peaks.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
        }
        let total: f64 = peaks.iter().map(|p| p.purity).sum();
        assert!((total - 100.0).abs() < 0.01, "{total}");
        // Taller peaks take a larger share
        assert!(peaks[1].purity > peaks[2].purity);
    }

    #[test_log::test]
    fn test_solvent_front_excluded() {
        let (times, values) = make_trace(1.5, &[(0.6, 0.04, 800.0)]);
        let slopes = local_slopes(
            &times.iter().map(|t| t * 60.0).collect::<Vec<_>>(),
            &values,
            DEFAULT_SLOPE_WINDOW,
        );
        assert_eq!(segment_peaks(&slopes, 5.0).len(), 1);

        let params = IntegrationParams::new(5.0, 1.0);
        assert_eq!(
            integrate_trace(&times, &values, &params),
            PeakTable::NoPeaksDetected
        );
    }

    #[test]
    fn test_flat_and_short_traces() {
        let params = IntegrationParams::new(1.0, 0.0);
        let (times, _) = make_trace(1.0, &[]);
        let flat = vec![10.0; times.len()];
        assert_eq!(integrate_trace(&times, &flat, &params), PeakTable::NoPeaksDetected);
        assert_eq!(
            integrate_trace(&times[..3], &flat[..3], &params),
            PeakTable::NoPeaksDetected
        );
        assert!(PeakTable::NoPeaksDetected.peaks().is_empty());
        assert!(PeakTable::NoPeaksDetected.is_empty());
        assert!(PeakTable::Detected(Vec::new()).is_empty());
        assert_eq!(PeakTable::Detected(Vec::new()).len(), 0);
    }

    #[test]
    fn test_matrix_selectors() {
        let (times, values) = make_trace(2.0, &[(1.0, 0.05, 1000.0)]);
        let intensities: Vec<f64> = values.iter().flat_map(|v| [*v, 0.0]).collect();
        let matrix = UvMatrix::new(times, vec![254.0, 280.0], intensities);
        let params = IntegrationParams::new(5.0, 0.1);

        let all = calculate_uv_integrals(&matrix, WavelengthSelector::All, &params);
        let at_254 = calculate_uv_integrals(&matrix, WavelengthSelector::Nearest(250.0), &params);
        assert_eq!(all.len(), 1);
        assert_eq!(all, at_254);
        assert_eq!(all.peaks()[0].purity, 100.0);
        assert_eq!(
            calculate_uv_integrals(&matrix, WavelengthSelector::Nearest(280.0), &params),
            PeakTable::NoPeaksDetected
        );
    }
}
