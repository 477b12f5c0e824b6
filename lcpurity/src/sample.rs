//! Grouping raw files into samples and loading them.
//!
//! One injection produces a UV export (`<name>[_<run>].txt`) and two scan
//! exports, `<name>_Seg1Ev1.JDX` (positive) and `<name>_Seg1Ev2.JDX` (negative).
//! Files are matched on the shared base name.
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SampleError;
use crate::grid::MzGrid;
use crate::matrix::{MsMatrix, UvMatrix};
use crate::parser::{parse_ms, parse_uv, reconcile_scan_counts, UvFile};

pub const UV_SUFFIX: &str = ".txt";
pub const POSITIVE_MS_SUFFIX: &str = "_Seg1Ev1.JDX";
pub const NEGATIVE_MS_SUFFIX: &str = "_Seg1Ev2.JDX";

/// The ion detection mode of a mass spectrometer scan
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    /// The file name suffix of this polarity's scan export
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Polarity::Positive => POSITIVE_MS_SUFFIX,
            Polarity::Negative => NEGATIVE_MS_SUFFIX,
        }
    }
}

impl Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pos" | "positive" | "+" => Ok(Self::Positive),
            "neg" | "negative" | "-" => Ok(Self::Negative),
            _ => Err(format!("`{s}` is not a polarity, expected positive or negative")),
        }
    }
}

/// Identity of one injection, read from its UV export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// The compound or tube id
    pub sample_id: String,
    /// The batch (plate) the run belongs to
    pub batch_id: String,
    /// The instrument's own data file name, without extension
    pub source_name: String,
    /// The acquisition method name
    pub method: String,
    pub run_date: NaiveDate,
    pub run_time: Option<NaiveTime>,
}

/// All the data of one injection. The MS matrices are absent when their
/// files were not found, in which case the sample cannot be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// The normalized base name shared by the sample's files
    pub file_stem: String,
    pub metadata: SampleMetadata,
    pub uv: UvMatrix,
    pub ms_positive: Option<MsMatrix>,
    pub ms_negative: Option<MsMatrix>,
}

impl RawSample {
    /// Combine parsed parts, aligning the two MS matrices when both are present
    pub fn new(
        file_stem: String,
        uv: UvFile,
        ms_positive: Option<MsMatrix>,
        ms_negative: Option<MsMatrix>,
    ) -> Self {
        let (ms_positive, ms_negative) = match (ms_positive, ms_negative) {
            (Some(pos), Some(neg)) => {
                let (pos, neg) = reconcile_scan_counts(pos, neg);
                (Some(pos), Some(neg))
            }
            pair => pair,
        };
        Self {
            file_stem,
            metadata: uv.metadata,
            uv: uv.matrix,
            ms_positive,
            ms_negative,
        }
    }

    pub fn ms(&self, polarity: Polarity) -> Option<&MsMatrix> {
        match polarity {
            Polarity::Positive => self.ms_positive.as_ref(),
            Polarity::Negative => self.ms_negative.as_ref(),
        }
    }
}

/// What kind of raw export a path is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFileKind {
    Uv,
    Ms(Polarity),
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Recognize a raw export from its file name
pub fn classify(path: &Path) -> Option<RawFileKind> {
    let name = file_name(path)?;
    if name.ends_with(POSITIVE_MS_SUFFIX) {
        Some(RawFileKind::Ms(Polarity::Positive))
    } else if name.ends_with(NEGATIVE_MS_SUFFIX) {
        Some(RawFileKind::Ms(Polarity::Negative))
    } else if name.ends_with(UV_SUFFIX) {
        Some(RawFileKind::Uv)
    } else {
        None
    }
}

/// The base name used to pair a sample's files.
///
/// MS exports lose their polarity suffix. UV exports lose their extension and a
/// trailing `_<digits>` run counter, if any.
pub fn base_name(path: &Path, kind: RawFileKind) -> Option<String> {
    let name = file_name(path)?;
    match kind {
        RawFileKind::Ms(polarity) => name
            .strip_suffix(polarity.file_suffix())
            .map(|s| s.to_string()),
        RawFileKind::Uv => {
            let stem = name.strip_suffix(UV_SUFFIX)?;
            match stem.rsplit_once('_') {
                Some((head, tail))
                    if !head.is_empty() && !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) =>
                {
                    Some(head.to_string())
                }
                _ => Some(stem.to_string()),
            }
        }
    }
}

/// The files making up one sample, before any of them is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFiles {
    pub file_stem: String,
    pub uv: PathBuf,
    pub ms_positive: Option<PathBuf>,
    pub ms_negative: Option<PathBuf>,
}

fn read_text(path: &Path) -> Result<String, SampleError> {
    let bytes = fs::read(path).map_err(|source| SampleError::IO {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn load_ms(path: &Path, grid: &MzGrid) -> Result<MsMatrix, SampleError> {
    let text = read_text(path)?;
    parse_ms(&text, grid).map_err(|source| SampleError::Ms {
        path: path.to_path_buf(),
        source,
    })
}

impl SampleFiles {
    pub fn has_ms(&self) -> bool {
        self.ms_positive.is_some() || self.ms_negative.is_some()
    }

    /// Read and parse every file of the sample
    pub fn load(&self, grid: &MzGrid) -> Result<RawSample, SampleError> {
        debug!("Loading {}", self.uv.display());
        let text = read_text(&self.uv)?;
        let uv = parse_uv(&text).map_err(|source| SampleError::Uv {
            path: self.uv.clone(),
            source,
        })?;
        let ms_positive = self
            .ms_positive
            .as_deref()
            .map(|p| load_ms(p, grid))
            .transpose()?;
        let ms_negative = self
            .ms_negative
            .as_deref()
            .map(|p| load_ms(p, grid))
            .transpose()?;
        Ok(RawSample::new(
            self.file_stem.clone(),
            uv,
            ms_positive,
            ms_negative,
        ))
    }
}

/// Counts of what happened to each input path while grouping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub uv_files: usize,
    pub positive_ms_files: usize,
    pub negative_ms_files: usize,
    /// UV exports with neither MS export
    pub uv_without_ms: usize,
    /// MS exports whose base name matched no UV export
    pub unmatched_ms_files: Vec<PathBuf>,
    /// Paths that are not raw exports at all
    pub unrecognized_files: usize,
}

/// Groups raw file paths into [`SampleFiles`], one per UV export
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleAssembler;

impl SampleAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Pair every MS export with the UV export sharing its base name.
    ///
    /// Unmatched MS exports and unrecognized paths are skipped and counted in the
    /// report rather than failing the batch. If several UV exports share a base
    /// name, each MS export goes to the first of them still missing that polarity.
    pub fn group<P: AsRef<Path>>(&self, paths: &[P]) -> (Vec<SampleFiles>, AssemblyReport) {
        let mut report = AssemblyReport::default();
        let mut samples: Vec<SampleFiles> = Vec::new();
        let mut ms_files = Vec::new();

        for path in paths.iter().map(|p| p.as_ref()) {
            match classify(path) {
                Some(RawFileKind::Uv) => {
                    if let Some(file_stem) = base_name(path, RawFileKind::Uv) {
                        report.uv_files += 1;
                        samples.push(SampleFiles {
                            file_stem,
                            uv: path.to_path_buf(),
                            ms_positive: None,
                            ms_negative: None,
                        });
                    }
                }
                Some(RawFileKind::Ms(polarity)) => ms_files.push((path, polarity)),
                None => {
                    debug!("Ignoring {}", path.display());
                    report.unrecognized_files += 1;
                }
            }
        }

        for (path, polarity) in ms_files {
            let Some(stem) = base_name(path, RawFileKind::Ms(polarity)) else {
                continue;
            };
            let slot = samples
                .iter_mut()
                .filter(|s| s.file_stem == stem)
                .map(|s| match polarity {
                    Polarity::Positive => &mut s.ms_positive,
                    Polarity::Negative => &mut s.ms_negative,
                })
                .find(|slot| slot.is_none());
            match slot {
                Some(slot) => {
                    *slot = Some(path.to_path_buf());
                    match polarity {
                        Polarity::Positive => report.positive_ms_files += 1,
                        Polarity::Negative => report.negative_ms_files += 1,
                    }
                }
                None => {
                    warn!("No UV export for {} MS file {}", polarity, path.display());
                    report.unmatched_ms_files.push(path.to_path_buf());
                }
            }
        }

        report.uv_without_ms = samples.iter().filter(|s| !s.has_ms()).count();
        (samples, report)
    }
}
