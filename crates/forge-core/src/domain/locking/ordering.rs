//! Deadlock-avoidance ordering
//!
//! Every multi-resource request is put into one fixed total order before any
//! conflict check: category priority first, then resource name. Two tasks
//! contending for overlapping sets therefore always contend on the lowest
//! shared resource first, so no circular wait can form.

use std::collections::BTreeMap;

use super::types::{LockMode, LockRequest};

/// Sort requests into acquisition order, collapsing duplicates
///
/// A resource requested more than once keeps the strongest mode (write wins).
pub fn sort_requests(requests: impl IntoIterator<Item = LockRequest>) -> Vec<LockRequest> {
    let mut merged = BTreeMap::new();
    for request in requests {
        merged
            .entry(request.resource)
            .and_modify(|mode: &mut LockMode| {
                if request.mode == LockMode::Write {
                    *mode = LockMode::Write;
                }
            })
            .or_insert(request.mode);
    }

    merged
        .into_iter()
        .map(|(resource, mode)| LockRequest { resource, mode })
        .collect()
}
