//! Batch generation of candidate identifiers.

use rand::Rng;

use super::WorkItem;

/// Fixed identifier prefix the target site expects.
pub const DEFAULT_PREFIX: &str = "76770";

/// Width of the random numeric suffix.
const SUFFIX_DIGITS: usize = 5;

/// Generate `count` pending work items.
///
/// Each identifier is the prefix plus a zero-padded 5-digit draw uniform over
/// [0, 99999]. Draws are independent, so one batch can contain duplicates;
/// callers must not assume uniqueness.
pub fn generate_batch(count: usize, prefix: &str) -> Vec<WorkItem> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let suffix: u32 = rng.gen_range(0..100_000);
            WorkItem::pending(format!("{}{:0width$}", prefix, suffix, width = SUFFIX_DIGITS))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Status;

    #[test]
    fn batch_has_requested_size_and_shape() {
        let items = generate_batch(200, DEFAULT_PREFIX);
        assert_eq!(items.len(), 200);

        for item in &items {
            assert_eq!(item.status, Status::Pending);
            assert_eq!(item.identifier.len(), DEFAULT_PREFIX.len() + SUFFIX_DIGITS);
            assert!(item.identifier.starts_with(DEFAULT_PREFIX));
            let suffix = &item.identifier[DEFAULT_PREFIX.len()..];
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn empty_batch_is_allowed() {
        assert!(generate_batch(0, DEFAULT_PREFIX).is_empty());
    }
}
