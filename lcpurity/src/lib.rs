//! Purity determination for LC/MS runs.
//!
//! UV detector exports are segmented into peaks and integrated, then the mass
//! spectra recorded under each peak are searched for the expected compound's
//! adducts. A peak's share of the total UV area is its purity.
pub mod error;
pub mod numeric;
pub mod grid;
pub mod matrix;
pub mod parser;
pub mod sample;

pub mod integration;
pub mod adducts;
pub mod mass_search;
pub mod purity;
pub mod pipeline;

#[cfg(test)]
mod testing_tools;

pub use crate::adducts::{AdductRule, AdductTable};
pub use crate::grid::MzGrid;
pub use crate::integration::{calculate_uv_integrals, PeakTable, UvPeak};
pub use crate::mass_search::mass_search;
pub use crate::matrix::{MsMatrix, UvMatrix, WavelengthSelector};
pub use crate::pipeline::{
    CompoundSource, CompoundTarget, PipelineOutput, PurityParams, PurityPipeline, WavelengthMode,
};
pub use crate::purity::{MassHit, PeakAssignment, PurityRecord};
pub use crate::sample::{Polarity, RawSample, SampleAssembler, SampleMetadata};
