// Entry ordering within one container level.
//
// Canonical: ascending numeric key, text keys last.
// Device: the top level sorts by absolute SID. Nested levels put delta keys
// first in declared child order (delta value when a node has no declared
// position), then absolute keys by SID, then text keys in input order.

use std::cmp::Ordering;

use crate::cbor::ContainerMode;
use crate::schema::SchemaIndex;

use super::DeltaEntry;
use super::key::SidKey;

pub fn order_entries(
    entries: &mut [DeltaEntry],
    index: &SchemaIndex,
    parent: Option<u64>,
    mode: ContainerMode,
) {
    match mode {
        ContainerMode::Canonical => entries.sort_by(canonical_cmp),
        ContainerMode::Device if parent.is_none() => entries.sort_by(canonical_cmp),
        ContainerMode::Device => entries.sort_by(|a, b| device_cmp(a, b, index)),
    }
}

fn canonical_cmp(a: &DeltaEntry, b: &DeltaEntry) -> Ordering {
    match (a.key.numeric(), b.key.numeric()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `(group, rank, value)`; text keys share one group and keep input order.
fn device_rank(entry: &DeltaEntry, index: &SchemaIndex) -> (u8, usize, i128) {
    match &entry.key {
        SidKey::Delta(d) => {
            let rank = entry
                .sid
                .and_then(|s| index.child_rank(s))
                .unwrap_or(usize::MAX);
            (0, rank, i128::from(*d))
        }
        SidKey::Absolute(s) => (1, 0, i128::from(*s)),
        SidKey::Text(_) => (2, 0, 0),
    }
}

fn device_cmp(a: &DeltaEntry, b: &DeltaEntry, index: &SchemaIndex) -> Ordering {
    device_rank(a, index).cmp(&device_rank(b, index))
}
