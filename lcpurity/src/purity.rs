//! Joining mass search results back onto the UV peak table
use std::fmt::Display;

use serde::Serialize;
use tracing::warn;

use crate::integration::PeakTable;
use crate::mass_search::PeakMatch;
use crate::sample::{Polarity, SampleMetadata};

/// An adduct found under a UV peak, carrying that peak's area purity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassHit {
    pub peak_index: usize,
    pub adduct: String,
    pub mz: f64,
    pub purity: f64,
}

impl Display for MassHit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "peak {}: {} at m/z {:.2} ({:.3}%)",
            self.peak_index, self.adduct, self.mz, self.purity
        )
    }
}

/// The outcome of scoring a sample.
///
/// `Unscored` means no search happened, `NoHits` means one happened and found
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "hits", rename_all = "snake_case")]
pub enum PeakAssignment {
    Unscored,
    NoHits,
    Hits(Vec<MassHit>),
}

impl PeakAssignment {
    pub fn hits(&self) -> &[MassHit] {
        match self {
            PeakAssignment::Hits(hits) => hits,
            _ => &[],
        }
    }

    pub fn is_scored(&self) -> bool {
        !matches!(self, PeakAssignment::Unscored)
    }
}

impl Display for PeakAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeakAssignment::Unscored => write!(f, "Unscored"),
            PeakAssignment::NoHits => write!(f, "No Hits"),
            PeakAssignment::Hits(hits) => {
                for (i, hit) in hits.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{hit}")?;
                }
                Ok(())
            }
        }
    }
}

/// Attach each matched adduct to the purity of its peak
pub fn assign_hits(peaks: &PeakTable, matches: &[PeakMatch]) -> PeakAssignment {
    let hits: Vec<MassHit> = matches
        .iter()
        .filter_map(|m| match peaks.get(m.peak_index) {
            Some(peak) => Some((m, peak.purity)),
            None => {
                warn!("Mass search matched unknown peak {}", m.peak_index);
                None
            }
        })
        .flat_map(|(m, purity)| {
            m.hits.iter().map(move |hit| MassHit {
                peak_index: m.peak_index,
                adduct: hit.adduct.clone(),
                mz: hit.mz,
                purity,
            })
        })
        .collect();
    if hits.is_empty() {
        PeakAssignment::NoHits
    } else {
        PeakAssignment::Hits(hits)
    }
}

/// The final result for one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurityRecord {
    #[serde(flatten)]
    pub metadata: SampleMetadata,
    pub target_mass: Option<f64>,
    pub polarity: Polarity,
    pub assignment: PeakAssignment,
    /// The hit on the peak with the largest share of the UV area
    pub best_hit: Option<MassHit>,
    pub peaks: PeakTable,
}

impl PurityRecord {
    pub fn new(
        metadata: SampleMetadata,
        target_mass: Option<f64>,
        polarity: Polarity,
        peaks: PeakTable,
        assignment: PeakAssignment,
    ) -> Self {
        // Ties go to the earliest hit
        let best_hit = assignment
            .hits()
            .iter()
            .fold(None, |best: Option<&MassHit>, hit| match best {
                Some(b) if b.purity >= hit.purity => Some(b),
                _ => Some(hit),
            })
            .cloned();
        Self {
            metadata,
            target_mass,
            polarity,
            assignment,
            best_hit,
            peaks,
        }
    }

    /// A record for a sample that could not be searched
    pub fn unscored(
        metadata: SampleMetadata,
        target_mass: Option<f64>,
        polarity: Polarity,
        peaks: PeakTable,
    ) -> Self {
        Self::new(metadata, target_mass, polarity, peaks, PeakAssignment::Unscored)
    }

    pub fn sample_id(&self) -> &str {
        &self.metadata.sample_id
    }

    pub fn source_file(&self) -> &str {
        &self.metadata.source_name
    }

    pub fn hits(&self) -> &[MassHit] {
        self.assignment.hits()
    }
}
