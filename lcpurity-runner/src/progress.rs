use std::iter::Sum;
use std::ops::{Add, AddAssign};

use lcpurity::pipeline::PipelineOutput;
use lcpurity::{PeakAssignment, PurityRecord};
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub samples: usize,
    pub samples_with_hits: usize,
    pub samples_without_hits: usize,
    pub samples_unscored: usize,
    pub samples_failed: usize,
    pub mass_hits: usize,
    pub uv_peaks: usize,
    pub unmatched_ms_files: usize,
    pub uv_without_ms: usize,
    pub unrecognized_files: usize,
}

impl ProgressRecord {
    pub fn from_output(output: &PipelineOutput) -> Self {
        let mut prog: ProgressRecord = output.records.iter().map(Self::from).sum();
        prog.samples_failed = output.failures.len();
        prog.samples += output.failures.len();
        prog.unmatched_ms_files = output.report.unmatched_ms_files.len();
        prog.uv_without_ms = output.report.uv_without_ms;
        prog.unrecognized_files = output.report.unrecognized_files;
        prog
    }

    pub fn log(&self) {
        info!(
            "Samples: {} | With Hits: {} | No Hits: {} | Unscored: {} | Failed: {}",
            self.samples,
            self.samples_with_hits,
            self.samples_without_hits,
            self.samples_unscored,
            self.samples_failed
        );
        info!("UV Peaks: {}", self.uv_peaks);
        info!("Mass Hits: {}", self.mass_hits);
        info!(
            "Unmatched MS Files: {} | UV Files Without MS: {} | Other Files: {}",
            self.unmatched_ms_files, self.uv_without_ms, self.unrecognized_files
        );
    }
}

impl From<&PurityRecord> for ProgressRecord {
    fn from(record: &PurityRecord) -> Self {
        let mut prog = ProgressRecord {
            samples: 1,
            uv_peaks: record.peaks.len(),
            ..Default::default()
        };
        match &record.assignment {
            PeakAssignment::Unscored => prog.samples_unscored = 1,
            PeakAssignment::NoHits => prog.samples_without_hits = 1,
            PeakAssignment::Hits(hits) => {
                prog.samples_with_hits = 1;
                prog.mass_hits = hits.len();
            }
        }
        prog
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.samples += rhs.samples;
        self.samples_with_hits += rhs.samples_with_hits;
        self.samples_without_hits += rhs.samples_without_hits;
        self.samples_unscored += rhs.samples_unscored;
        self.samples_failed += rhs.samples_failed;
        self.mass_hits += rhs.mass_hits;
        self.uv_peaks += rhs.uv_peaks;
        self.unmatched_ms_files += rhs.unmatched_ms_files;
        self.uv_without_ms += rhs.uv_without_ms;
        self.unrecognized_files += rhs.unrecognized_files;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ProgressRecord::default(), Add::add)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sum() {
        let a = ProgressRecord {
            samples: 1,
            samples_with_hits: 1,
            mass_hits: 2,
            uv_peaks: 3,
            ..Default::default()
        };
        let b = ProgressRecord {
            samples: 1,
            samples_unscored: 1,
            uv_peaks: 1,
            ..Default::default()
        };
        let total: ProgressRecord = [a, b, ProgressRecord::default()].into_iter().sum();
        assert_eq!(total.samples, 2);
        assert_eq!(total.samples_with_hits, 1);
        assert_eq!(total.samples_unscored, 1);
        assert_eq!(total.mass_hits, 2);
        assert_eq!(total.uv_peaks, 4);
        assert_eq!(a + b, total);
    }

    #[test]
    fn test_from_empty_output() {
        let prog = ProgressRecord::from_output(&PipelineOutput::default());
        assert_eq!(prog, ProgressRecord::default());
    }
}
