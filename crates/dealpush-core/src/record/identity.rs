//! Stable numeric identifiers for records that arrive without one.

use std::collections::BTreeMap;

use super::Record;

// Offset basis used by the ingest pipeline since its first release. It is not
// the canonical FNV-1a basis, but changing it would re-key every stored record.
const OFFSET: u64 = 1_469_598_103_934_665_603;
const PRIME: u64 = 1_099_511_628_211;

/// Derive an identifier from the SKU (when present and non-empty) or the name.
///
/// FNV-1a over the key's bytes, masked to 31 bits so it is always positive.
/// Collisions are possible and tolerated.
pub fn derive_id(sku: Option<&str>, name: &str) -> i64 {
    let key = match sku {
        Some(s) if !s.is_empty() => s,
        _ => name,
    };
    let mut h = OFFSET;
    for b in key.bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(PRIME);
    }
    (h & 0x7FFF_FFFF) as i64
}

/// Fill in `id` for every record where it is `0`. Returns how many were assigned.
pub fn assign_missing_ids(records: &mut [Record]) -> usize {
    let mut assigned = 0;
    for r in records.iter_mut().filter(|r| r.id == 0) {
        r.id = derive_id(r.sku.as_deref(), &r.name);
        assigned += 1;
    }
    assigned
}

/// Identifiers that appear more than once, ascending.
pub fn duplicate_ids(records: &[Record]) -> Vec<i64> {
    let mut seen: BTreeMap<i64, usize> = BTreeMap::new();
    for r in records {
        *seen.entry(r.id).or_default() += 1;
    }
    seen.into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(id, _)| id)
        .collect()
}
