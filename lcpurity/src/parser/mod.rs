//! Raw file parsers for the UV and MS exports of one injection
pub mod ms;
pub mod uv;

pub use ms::parse_ms;
pub use uv::{parse_uv, UvFile};

use tracing::{debug, warn};

use crate::matrix::MsMatrix;

/// Align the scan counts of a positive/negative MS pair.
///
/// Positive mode acquisitions sometimes record an extra leading scan with no
/// negative counterpart. When the positive matrix has exactly one scan more than
/// the negative matrix, that first positive scan is dropped. Any other mismatch
/// is left alone and reported.
pub fn reconcile_scan_counts(positive: MsMatrix, negative: MsMatrix) -> (MsMatrix, MsMatrix) {
    let (n_pos, n_neg) = (positive.scan_count(), negative.scan_count());
    if n_pos == n_neg + 1 {
        debug!("Dropping the leading positive scan ({n_pos} positive vs {n_neg} negative)");
        (positive.drop_leading_scans(1), negative)
    } else {
        if n_pos != n_neg {
            warn!("Positive and negative scan counts differ: {n_pos} vs {n_neg}");
        }
        (positive, negative)
    }
}
