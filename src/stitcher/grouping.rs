//! Break grouping: bucket descriptors by timeline position and resolve
//! plain / asset-list / hybrid ambiguity within each bucket.

use crate::model::BreakDescriptor;
use std::collections::BTreeMap;

/// Resolved breaks keyed by position; iteration is ascending by `pos`.
pub type BreakGroups = BTreeMap<u64, Vec<BreakDescriptor>>;

/// Which resolution policy applies to a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingMode {
    /// No interstitial handling; buckets are only filtered
    Plain,
    /// Interstitials replace spliced content: an asset-list-only item wins
    /// its position outright
    InterstitialOnly,
    /// Content is spliced and also described by an interstitial
    Combine,
}

/// Group `breaks` by position and resolve each bucket according to `mode`.
///
/// Running this again on its own flattened output yields the same groups.
pub fn group_breaks(breaks: &[BreakDescriptor], mode: GroupingMode) -> BreakGroups {
    let mut groups = BreakGroups::new();
    for b in breaks {
        groups.entry(b.pos).or_default().push(b.clone());
    }

    for bucket in groups.values_mut() {
        resolve_bucket(bucket, mode);
        bucket.retain(BreakDescriptor::is_actionable);
    }

    groups.retain(|_, bucket| !bucket.is_empty());
    groups
}

fn resolve_bucket(bucket: &mut Vec<BreakDescriptor>, mode: GroupingMode) {
    let has_asset_list_only = bucket.iter().any(BreakDescriptor::is_asset_list_only);

    if mode == GroupingMode::InterstitialOnly && has_asset_list_only {
        bucket.retain(BreakDescriptor::is_asset_list_only);
        return;
    }

    if let Some(shared) = bucket
        .iter()
        .find(|b| b.is_hybrid())
        .and_then(|b| b.asset_list_url.clone())
    {
        for b in bucket.iter_mut() {
            b.asset_list_url = Some(shared.clone());
        }
        return;
    }

    if mode == GroupingMode::Combine && has_asset_list_only {
        let Some(donor) = bucket
            .iter()
            .find(|b| b.is_asset_list_only())
            .and_then(|b| b.asset_list_url.clone())
        else {
            return;
        };
        if !bucket.iter().any(|b| b.url.is_some()) {
            return;
        }
        bucket.retain(|b| b.url.is_some());
        for b in bucket.iter_mut() {
            b.asset_list_url = Some(donor.clone());
        }
    }
}
