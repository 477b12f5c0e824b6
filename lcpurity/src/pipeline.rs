//! Running the whole purity analysis over a batch of raw files.
//!
//! Paths are grouped into samples first, then each sample is loaded, integrated,
//! searched and released before the next one is read, so only one sample's
//! matrices are held in memory at a time.
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adducts::AdductTable;
use crate::grid::MzGrid;
use crate::integration::{calculate_uv_integrals, IntegrationParams, DEFAULT_SLOPE_WINDOW};
use crate::mass_search::{mass_search, MassSearchParams, DEFAULT_MS_LAG_SECONDS};
use crate::matrix::WavelengthSelector;
use crate::purity::{assign_hits, PurityRecord};
use crate::sample::{AssemblyReport, Polarity, RawSample, SampleAssembler};

/// Wavelength used for compounds without one of their own
pub const FALLBACK_WAVELENGTH: f64 = 254.0;

/// Which UV trace to integrate for each sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WavelengthMode {
    /// Sum every recorded wavelength
    #[default]
    All,
    /// The same wavelength (nm) for every sample
    Fixed(f64),
    /// The compound's own wavelength, or [`FALLBACK_WAVELENGTH`]
    PerCompound,
}

impl WavelengthMode {
    pub fn selector_for(&self, target: Option<&CompoundTarget>) -> WavelengthSelector {
        match self {
            WavelengthMode::All => WavelengthSelector::All,
            WavelengthMode::Fixed(nm) => WavelengthSelector::Nearest(*nm),
            WavelengthMode::PerCompound => WavelengthSelector::Nearest(
                target
                    .and_then(|t| t.wavelength)
                    .unwrap_or(FALLBACK_WAVELENGTH),
            ),
        }
    }
}

impl Display for WavelengthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WavelengthMode::All => write!(f, "all"),
            WavelengthMode::Fixed(nm) => write!(f, "{nm}"),
            WavelengthMode::PerCompound => write!(f, "per-compound"),
        }
    }
}

impl FromStr for WavelengthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "per-compound" | "compound" => Ok(Self::PerCompound),
            other => other
                .trim_end_matches("nm")
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|nm| *nm > 0.0)
                .map(Self::Fixed)
                .ok_or_else(|| {
                    format!("`{s}` is not a wavelength mode, expected all, per-compound or a wavelength in nm")
                }),
        }
    }
}

impl TryFrom<String> for WavelengthMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WavelengthMode> for String {
    fn from(value: WavelengthMode) -> Self {
        value.to_string()
    }
}

/// What is known about the compound a sample should contain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundTarget {
    /// Monoisotopic neutral mass
    pub mass: f64,
    /// Preferred UV wavelength (nm)
    #[serde(default)]
    pub wavelength: Option<f64>,
}

impl CompoundTarget {
    pub fn new(mass: f64, wavelength: Option<f64>) -> Self {
        Self { mass, wavelength }
    }
}

/// Looks up the expected compound of a sample
pub trait CompoundSource {
    fn target_for(&self, sample_id: &str) -> Option<CompoundTarget>;
}

impl<S: BuildHasher> CompoundSource for HashMap<String, CompoundTarget, S> {
    fn target_for(&self, sample_id: &str) -> Option<CompoundTarget> {
        self.get(sample_id).copied()
    }
}

impl CompoundSource for BTreeMap<String, CompoundTarget> {
    fn target_for(&self, sample_id: &str) -> Option<CompoundTarget> {
        self.get(sample_id).copied()
    }
}

impl<T: CompoundSource + ?Sized> CompoundSource for &T {
    fn target_for(&self, sample_id: &str) -> Option<CompoundTarget> {
        (**self).target_for(sample_id)
    }
}

/// Every numeric parameter of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurityParams {
    pub slope_threshold: f64,
    pub solvent_cutoff_minutes: f64,
    pub mass_delta: f64,
    pub intensity_threshold: f64,
    pub polarity: Polarity,
    pub wavelength: WavelengthMode,
    pub slope_window: usize,
    pub ms_lag_seconds: f64,
    pub mz_grid: MzGrid,
}

impl PurityParams {
    pub fn new(
        slope_threshold: f64,
        solvent_cutoff_minutes: f64,
        mass_delta: f64,
        intensity_threshold: f64,
        polarity: Polarity,
    ) -> Self {
        Self {
            slope_threshold,
            solvent_cutoff_minutes,
            mass_delta,
            intensity_threshold,
            polarity,
            wavelength: WavelengthMode::default(),
            slope_window: DEFAULT_SLOPE_WINDOW,
            ms_lag_seconds: DEFAULT_MS_LAG_SECONDS,
            mz_grid: MzGrid::default(),
        }
    }

    pub fn with_wavelength(mut self, wavelength: WavelengthMode) -> Self {
        self.wavelength = wavelength;
        self
    }

    pub fn with_slope_window(mut self, slope_window: usize) -> Self {
        self.slope_window = slope_window;
        self
    }

    pub fn with_ms_lag(mut self, ms_lag_seconds: f64) -> Self {
        self.ms_lag_seconds = ms_lag_seconds;
        self
    }

    pub fn with_mz_grid(mut self, mz_grid: MzGrid) -> Self {
        self.mz_grid = mz_grid;
        self
    }

    pub fn integration_params(&self) -> IntegrationParams {
        IntegrationParams::new(self.slope_threshold, self.solvent_cutoff_minutes)
            .with_slope_window(self.slope_window)
    }

    pub fn mass_search_params(&self) -> MassSearchParams {
        MassSearchParams::new(self.mass_delta, self.intensity_threshold)
            .with_ms_lag(self.ms_lag_seconds)
    }
}

/// The records of a batch along with everything that was skipped
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub records: Vec<PurityRecord>,
    pub report: AssemblyReport,
    /// Samples that failed to load, by UV file, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl PipelineOutput {
    /// The records grouped by batch id, keeping run order within each batch
    pub fn by_batch(&self) -> BTreeMap<&str, Vec<&PurityRecord>> {
        let mut batches: BTreeMap<&str, Vec<&PurityRecord>> = BTreeMap::new();
        for record in self.records.iter() {
            batches
                .entry(record.metadata.batch_id.as_str())
                .or_default()
                .push(record);
        }
        batches
    }
}

#[derive(Debug, Clone)]
pub struct PurityPipeline<C: CompoundSource> {
    pub params: PurityParams,
    pub adducts: AdductTable,
    pub compounds: C,
}

impl<C: CompoundSource> PurityPipeline<C> {
    pub fn new(params: PurityParams, adducts: AdductTable, compounds: C) -> Self {
        Self {
            params,
            adducts,
            compounds,
        }
    }

    /// Integrate one sample's UV trace and search its MS scans for the target.
    ///
    /// The sample is unscored when its compound mass is unknown or when it
    /// lacks MS data for the searched polarity.
    pub fn process_sample(&self, sample: &RawSample) -> PurityRecord {
        let sample_id = sample.metadata.sample_id.as_str();
        let polarity = self.params.polarity;
        let target = self.compounds.target_for(sample_id);
        let selector = self.params.wavelength.selector_for(target.as_ref());

        let peaks = calculate_uv_integrals(&sample.uv, selector, &self.params.integration_params());
        debug!("{sample_id}: {} UV peaks using {selector:?}", peaks.len());

        let Some(target) = target else {
            info!("{sample_id}: no known compound mass, not scored");
            return PurityRecord::unscored(sample.metadata.clone(), None, polarity, peaks);
        };
        let Some(ms) = sample.ms(polarity) else {
            info!("{sample_id}: no {polarity} MS data, not scored");
            return PurityRecord::unscored(
                sample.metadata.clone(),
                Some(target.mass),
                polarity,
                peaks,
            );
        };

        let matches = mass_search(
            sample_id,
            target.mass,
            polarity,
            &peaks,
            ms,
            &self.adducts,
            &self.params.mass_search_params(),
        );
        let assignment = assign_hits(&peaks, &matches);
        info!("{sample_id}: {assignment}");
        PurityRecord::new(
            sample.metadata.clone(),
            Some(target.mass),
            polarity,
            peaks,
            assignment,
        )
    }

    /// Group `paths` into samples and process each in turn. A sample that fails
    /// to load is recorded in [`PipelineOutput::failures`] and skipped.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> PipelineOutput {
        let (samples, report) = SampleAssembler::new().group(paths);
        info!(
            "Found {} samples ({} unmatched MS files, {} UV files without MS, {} other files)",
            samples.len(),
            report.unmatched_ms_files.len(),
            report.uv_without_ms,
            report.unrecognized_files
        );

        let mut output = PipelineOutput {
            records: Vec::with_capacity(samples.len()),
            report,
            failures: Vec::new(),
        };
        for files in samples {
            match files.load(&self.params.mz_grid) {
                Ok(sample) => output.records.push(self.process_sample(&sample)),
                Err(e) => {
                    warn!("Skipping {}: {e}", files.file_stem);
                    output.failures.push((files.uv, e.to_string()));
                }
            }
        }
        output
    }
}
