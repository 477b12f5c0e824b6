use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use tracing::{debug, info, warn};

use lcpurity::adducts::AdductTableSpec;
use lcpurity::error::{AdductConfigError, GridError};
use lcpurity::grid::DEFAULT_MZ_STEP;
use lcpurity::integration::DEFAULT_SLOPE_WINDOW;
use lcpurity::mass_search::DEFAULT_MS_LAG_SECONDS;
use lcpurity::{
    AdductTable, CompoundTarget, MzGrid, Polarity, PurityParams, PurityPipeline, WavelengthMode,
};
use mzpeaks::coordinate::Span1D;

use crate::mz_range::MzRange;
use crate::progress::ProgressRecord;
use crate::write::write_records;

fn non_negative_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

#[derive(Debug, Error)]
pub enum LcPurityRunnerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input folder {0} does not exist or is not a directory")]
    InputFolderMissing(PathBuf),
    #[error("Failed to read the configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        Box<figment::Error>,
    ),
    #[error("The required parameter `{0}` was not given on the command line or in any configuration")]
    MissingParameter(&'static str),
    #[error("The m/z grid is invalid: {0}")]
    GridError(
        #[source]
        #[from]
        GridError,
    ),
    #[error("The adduct table is invalid: {0}")]
    AdductError(
        #[source]
        #[from]
        AdductConfigError,
    ),
}

impl From<figment::Error> for LcPurityRunnerError {
    fn from(value: figment::Error) -> Self {
        Self::ConfigError(Box::new(value))
    }
}

fn default_output_file() -> PathBuf {
    PathBuf::from("-")
}

fn default_mz_step() -> f64 {
    DEFAULT_MZ_STEP
}

fn default_slope_window() -> usize {
    DEFAULT_SLOPE_WINDOW
}

fn default_ms_lag_seconds() -> f64 {
    DEFAULT_MS_LAG_SECONDS
}

/// Purity determination for a folder of LC/MS raw exports.
///
/// Every UV export in the folder is paired with its positive and negative mode
/// MS exports, its chromatogram peaks are integrated, and the mass spectra under
/// each peak are searched for the adducts of the sample's expected compound.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct LcPurityRunner {
    /// The folder to read raw exports from. Sub-folders are searched too.
    #[arg()]
    pub input_folder: PathBuf,

    /// The path to write the JSON results to, or if '-' is passed, write to STDOUT.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `lcpurity.toml` in the working directory.
    /// Environment variables prefixed with `LCPURITY_` will be read too.
    #[arg(long = "config-file")]
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// The minimum UV slope (absorbance per second) that opens or closes a peak
    #[arg(short = 's', long = "slope-threshold", value_parser = non_negative_float_f64)]
    #[serde(default)]
    pub slope_threshold: Option<f64>,

    /// Peaks starting at or before this retention time (minutes) are solvent
    #[arg(short = 'c', long = "solvent-cutoff", value_parser = non_negative_float_f64)]
    #[serde(default)]
    pub solvent_cutoff: Option<f64>,

    /// The largest m/z difference between an expected and observed adduct
    #[arg(short = 'd', long = "mass-delta", value_parser = non_negative_float_f64)]
    #[serde(default)]
    pub mass_delta: Option<f64>,

    /// The summed MS intensity an m/z must exceed within a peak to be considered
    #[arg(short = 'i', long = "intensity-threshold", value_parser = non_negative_float_f64)]
    #[serde(default)]
    pub intensity_threshold: Option<f64>,

    /// The ionization mode to search, positive or negative
    #[arg(
        short = 'p',
        long = "polarity",
        default_value = "positive",
        value_parser = Polarity::from_str,
    )]
    #[serde(default)]
    pub polarity: Polarity,

    /// The UV trace to integrate: all, per-compound, or a wavelength in nm
    #[arg(
        short = 'w',
        long = "wavelength",
        default_value = "all",
        value_parser = WavelengthMode::from_str,
    )]
    #[serde(default)]
    pub wavelength: WavelengthMode,

    /// The m/z range of the spectrum grid, denoted [start?]-[end?]
    #[arg(
        short = 'r',
        long = "mz-range",
        value_parser = MzRange::from_str,
        value_name = "START-END",
        default_value_t = MzRange::default(),
    )]
    #[serde(default)]
    pub mz_range: MzRange,

    /// The spacing of the spectrum grid. Its decimal places set the m/z precision.
    #[arg(long = "mz-step", default_value_t = DEFAULT_MZ_STEP, value_parser = non_negative_float_f64)]
    #[serde(default = "default_mz_step")]
    pub mz_step: f64,

    /// The number of UV samples each local slope is fit over
    #[arg(long = "slope-window", default_value_t = DEFAULT_SLOPE_WINDOW)]
    #[serde(default = "default_slope_window")]
    pub slope_window: usize,

    /// The delay (seconds) between the UV detector and the mass spectrometer
    #[arg(long = "ms-lag", default_value_t = DEFAULT_MS_LAG_SECONDS, value_parser = non_negative_float_f64)]
    #[serde(default = "default_ms_lag_seconds")]
    pub ms_lag_seconds: f64,

    #[arg(skip)]
    #[serde(default)]
    pub adducts: Option<AdductTableSpec>,

    #[arg(skip)]
    #[serde(default)]
    pub compounds: BTreeMap<String, CompoundTarget>,
}

/// Every regular file below `root`, in a stable order. Symbolic links are not followed.
pub fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

impl LcPurityRunner {
    /// Layer the configuration files and environment over the command line arguments
    pub fn configure(self) -> Result<Self, LcPurityRunnerError> {
        let mut config = Figment::from(Serialized::defaults(&self))
            .merge(Toml::file("lcpurity.toml"));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        config = config.merge(Env::prefixed("LCPURITY_"));
        let configured: Self = config.extract()?;
        Ok(configured)
    }

    pub fn mz_grid(&self) -> Result<MzGrid, LcPurityRunnerError> {
        Ok(MzGrid::from_step(
            self.mz_range.start(),
            self.mz_range.end(),
            self.mz_step,
        )?)
    }

    pub fn purity_params(&self) -> Result<PurityParams, LcPurityRunnerError> {
        let slope_threshold = self
            .slope_threshold
            .ok_or(LcPurityRunnerError::MissingParameter("slope_threshold"))?;
        let solvent_cutoff = self
            .solvent_cutoff
            .ok_or(LcPurityRunnerError::MissingParameter("solvent_cutoff"))?;
        let mass_delta = self
            .mass_delta
            .ok_or(LcPurityRunnerError::MissingParameter("mass_delta"))?;
        let intensity_threshold = self
            .intensity_threshold
            .ok_or(LcPurityRunnerError::MissingParameter("intensity_threshold"))?;

        let params = PurityParams::new(
            slope_threshold,
            solvent_cutoff,
            mass_delta,
            intensity_threshold,
            self.polarity,
        )
        .with_wavelength(self.wavelength)
        .with_slope_window(self.slope_window)
        .with_ms_lag(self.ms_lag_seconds)
        .with_mz_grid(self.mz_grid()?);
        Ok(params)
    }

    pub fn adduct_table(&self) -> Result<AdductTable, LcPurityRunnerError> {
        match self.adducts.as_ref() {
            Some(spec) => Ok(AdductTable::from_spec(spec)?),
            None => Ok(AdductTable::default()),
        }
    }

    pub fn main(&self) -> Result<(), LcPurityRunnerError> {
        info!("lcpurity v{}", env!("CARGO_PKG_VERSION"));
        info!("Input: {}", self.input_folder.display());
        info!("Output: {}", self.output_file.display());

        let params = self.purity_params()?;
        let adducts = self.adduct_table()?;
        debug!("{params:?}");
        debug!("{} adduct rules", adducts.len());
        if self.compounds.is_empty() {
            warn!("No compound targets are configured, every sample will be unscored");
        }

        if !self.input_folder.is_dir() {
            return Err(LcPurityRunnerError::InputFolderMissing(
                self.input_folder.clone(),
            ));
        }

        let start = Instant::now();
        let paths = collect_files(&self.input_folder)?;
        debug!("Found {} files", paths.len());

        let pipeline = PurityPipeline::new(params, adducts, &self.compounds);
        let output = pipeline.run(&paths);
        for (path, reason) in output.failures.iter() {
            warn!("Failed to process {}: {reason}", path.display());
        }

        let prog = ProgressRecord::from_output(&output);
        prog.log();
        for (batch_id, records) in output.by_batch() {
            info!("Batch {batch_id}: {} samples", records.len());
        }

        write_records(&self.output_file, &output.records)?;
        info!("Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(extra: &[&str]) -> LcPurityRunner {
        let mut argv = vec!["lcpurity-runner", "./folder"];
        argv.extend(extra);
        LcPurityRunner::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let runner = args(&[]);
        assert_eq!(runner.output_file, PathBuf::from("-"));
        assert_eq!(runner.polarity, Polarity::Positive);
        assert_eq!(runner.wavelength, WavelengthMode::All);
        assert_eq!(runner.mz_range, MzRange::default());
        assert_eq!(runner.slope_window, DEFAULT_SLOPE_WINDOW);
        assert!(runner.adducts.is_none());
        assert!(runner.compounds.is_empty());
    }

    #[test]
    fn test_missing_parameter() {
        let runner = args(&["-s", "5", "-c", "1.0", "-d", "0.01"]);
        assert!(matches!(
            runner.purity_params(),
            Err(LcPurityRunnerError::MissingParameter("intensity_threshold"))
        ));
    }

    #[test]
    fn test_purity_params() -> Result<(), LcPurityRunnerError> {
        let runner = args(&[
            "-s", "5", "-c", "1.0", "-d", "0.01", "-i", "500", "-p", "neg", "-w", "280nm", "-r",
            "150-900", "--mz-step", "0.1",
        ]);
        let params = runner.purity_params()?;
        assert_eq!(params.slope_threshold, 5.0);
        assert_eq!(params.polarity, Polarity::Negative);
        assert_eq!(params.wavelength, WavelengthMode::Fixed(280.0));
        assert_eq!(params.mz_grid, MzGrid::from_step(150.0, 900.0, 0.1)?);
        Ok(())
    }

    #[test]
    fn test_adduct_table() -> Result<(), LcPurityRunnerError> {
        let mut runner = args(&[]);
        assert_eq!(runner.adduct_table()?, AdductTable::default());

        let mut spec = AdductTableSpec::default();
        spec.positive
            .insert("M+H".to_string(), "1.007276, 1".to_string());
        runner.adducts = Some(spec.clone());
        assert_eq!(runner.adduct_table()?.len(), 1);

        spec.negative
            .insert("M-H".to_string(), "-1.007276, 1/0".to_string());
        runner.adducts = Some(spec);
        assert!(matches!(
            runner.adduct_table(),
            Err(LcPurityRunnerError::AdductError(_))
        ));
        Ok(())
    }

    #[test]
    fn test_collect_files() -> io::Result<()> {
        let files = collect_files(Path::new("../lcpurity/tests/data"))?;
        assert!(files.iter().any(|p| p.ends_with("batch/CMP-0042_01.txt")));
        assert!(files.iter().any(|p| p.ends_with("extra/plate_layout.csv")));
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_files_symlink_loop() -> io::Result<()> {
        let root = tempfile::tempdir()?;
        let nested = root.path().join("a");
        std::fs::create_dir(&nested)?;
        std::fs::write(nested.join("S_01.txt"), "")?;
        std::os::unix::fs::symlink(root.path(), nested.join("loop"))?;

        let files = collect_files(root.path())?;
        assert_eq!(files, vec![nested.join("S_01.txt")]);
        Ok(())
    }
}
