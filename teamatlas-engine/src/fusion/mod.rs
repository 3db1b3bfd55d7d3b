// Fusion Module - Raw source records → ranked canonical team list
//
// Three stages: align cities across sources, standardize (per record, may
// reject), then fuse (group by merge key, merge each group, rank, cap).

pub mod merge;
pub mod standardize;

pub use merge::{align_cities, fuse, fuse_group, merge_key};
pub use standardize::{standardize, TransformContext};

use crate::types::{RawRecord, TeamRecord};
use tracing::debug;

/// Standardize every raw record and fuse the survivors
///
/// Rejected records never reach grouping; no survivors → empty list.
pub fn transform(raws: &[RawRecord], ctx: &TransformContext) -> Vec<TeamRecord> {
    let mut raws = raws.to_vec();
    align_cities(&mut raws);

    let standardized: Vec<TeamRecord> = raws.iter().filter_map(|r| standardize(r, ctx)).collect();

    let rejected = raws.len() - standardized.len();
    if rejected > 0 {
        debug!(
            country = %ctx.country_code,
            rejected,
            accepted = standardized.len(),
            "Rejected raw records with missing or placeholder identity"
        );
    }

    fuse(standardized)
}
