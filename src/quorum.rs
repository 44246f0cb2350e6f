// Shared quorum-reduction primitive.
//
// The same reduction is used at both levels of the two-level protocol:
// drive outcomes reduce to a per-peer outcome, peer outcomes reduce to
// a per-pool outcome. Only the quorum threshold and the input slice
// differ, so there is exactly one reduce function.

use std::collections::HashMap;

use crate::error::PeerError;

/// `floor(n / 2) + 1` — strict majority, used for writes and the
/// stricter reads.
pub fn write_quorum(n: usize) -> usize {
    n / 2 + 1
}

/// `floor(n / 2)` — the weaker threshold deliberately used for heal
/// and listing reduction.
pub fn heal_quorum(n: usize) -> usize {
    n / 2
}

/// Reduce a vector of per-participant outcomes (one slot per drive or
/// per peer, `None` meaning success) to a single pool/peer-level
/// outcome.
///
/// Succeeds (`None`) iff at least `quorum` participants succeeded.
/// Otherwise, ignored errors (the `DiskNotFound`/`PeerOffline`
/// whitelist) are filtered out and the most frequent remaining
/// concrete error is returned. If no concrete error remains (every
/// failure was an absent vote), `PeerError::Internal` reports the lost
/// quorum with no dominant cause.
pub fn reduce_quorum_errs(outcomes: &[Option<PeerError>], quorum: usize) -> Option<PeerError> {
    let success_count = outcomes.iter().filter(|o| o.is_none()).count();
    if success_count >= quorum {
        return None;
    }

    let mut tally: HashMap<String, (PeerError, usize)> = HashMap::new();
    for outcome in outcomes.iter().flatten() {
        if outcome.is_ignored_for_quorum() {
            continue;
        }
        let key = tally_key(outcome);
        let entry = tally.entry(key).or_insert_with(|| (outcome.clone(), 0));
        entry.1 += 1;
    }

    tally
        .into_values()
        .max_by_key(|(_, count)| *count)
        .map(|(err, _)| err)
        .or(Some(PeerError::Internal(format!(
            "quorum lost: {success_count}/{quorum} succeeded, no dominant error"
        ))))
}

/// Discriminant-only key so errors with different payload strings but
/// the same kind still tally together where that's the intent (e.g.
/// two different `VolumeNotFound(bucket)` for the same bucket always
/// share a key; differing bucket names never occur within one
/// reduction since every call is scoped to a single bucket).
fn tally_key(err: &PeerError) -> String {
    match err {
        PeerError::DiskNotFound => "disk_not_found".into(),
        PeerError::VolumeNotFound(_) => "volume_not_found".into(),
        PeerError::VolumeExists(_) => "volume_exists".into(),
        PeerError::VolumeNotEmpty(_) => "volume_not_empty".into(),
        PeerError::PeerOffline => "peer_offline".into(),
        PeerError::ServerNotInitialized => "server_not_initialized".into(),
        PeerError::InvalidArgument(_) => "invalid_argument".into(),
        PeerError::Transport(_) => "transport".into(),
        PeerError::Cancelled => "cancelled".into(),
        PeerError::Internal(_) => "internal".into(),
    }
}

/// Whether every outcome in the slice is `VolumeNotFound` (or a
/// success coerced to absent) — used to derive heal intent, "every
/// pool reports the bucket absent everywhere".
pub fn all_not_found(outcomes: &[Option<PeerError>]) -> bool {
    outcomes
        .iter()
        .all(|o| matches!(o, Some(PeerError::VolumeNotFound(_))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_quorum_is_strict_majority() {
        assert_eq!(write_quorum(4), 3);
        assert_eq!(write_quorum(5), 3);
        assert_eq!(write_quorum(1), 1);
    }

    #[test]
    fn heal_quorum_is_half_without_plus_one() {
        assert_eq!(heal_quorum(4), 2);
        assert_eq!(heal_quorum(5), 2);
    }

    #[test]
    fn reduce_succeeds_when_quorum_met() {
        let outcomes = vec![None, None, Some(PeerError::VolumeNotFound("b".into())), None];
        assert_eq!(reduce_quorum_errs(&outcomes, 3), None);
    }

    #[test]
    fn reduce_ignores_disk_not_found_as_absent_vote() {
        let outcomes = vec![
            Some(PeerError::DiskNotFound),
            Some(PeerError::DiskNotFound),
            None,
        ];
        // Only 1 success, quorum 2 not met; all concrete failures are
        // ignored so this lands on the dominant-cause-free fallback.
        let reduced = reduce_quorum_errs(&outcomes, 2);
        assert!(matches!(reduced, Some(PeerError::Internal(_))));
    }

    #[test]
    fn reduce_returns_most_common_concrete_error() {
        let outcomes = vec![
            Some(PeerError::VolumeNotEmpty("b".into())),
            Some(PeerError::VolumeNotEmpty("b".into())),
            Some(PeerError::VolumeNotFound("b".into())),
        ];
        let reduced = reduce_quorum_errs(&outcomes, 2);
        assert!(matches!(reduced, Some(PeerError::VolumeNotEmpty(_))));
    }

    #[test]
    fn all_not_found_detects_universal_absence() {
        let outcomes = vec![
            Some(PeerError::VolumeNotFound("b".into())),
            Some(PeerError::VolumeNotFound("b".into())),
        ];
        assert!(all_not_found(&outcomes));
        let outcomes2 = vec![Some(PeerError::VolumeNotFound("b".into())), None];
        assert!(!all_not_found(&outcomes2));
    }
}
