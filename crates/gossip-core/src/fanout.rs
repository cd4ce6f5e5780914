//! Fan-out target selection.
//!
//! Each gossip tick announces the local node to exactly one randomly chosen
//! active peer. Keeping the fan-out at one message per tick bounds network load
//! regardless of group size.

use crate::MemberAddress;
use rand::Rng;
use rand::seq::IndexedRandom;

/// Maximum random draws per tick before giving up on finding a peer other than ourselves.
pub const MAX_DRAWS: usize = 10;

/// Pick a random heartbeat target from `candidates`, never `local`.
///
/// Returns None when there are no candidates or when every draw landed on
/// the local address (e.g., the only active member is ourselves).
pub fn select_target<R: Rng + ?Sized>(
    candidates: &[MemberAddress],
    local: &MemberAddress,
    rng: &mut R,
) -> Option<MemberAddress> {
    for _ in 0..MAX_DRAWS {
        let drawn = candidates.choose(rng)?;
        if drawn != local {
            return Some(drawn.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn addr(s: &str) -> MemberAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_no_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select_target(&[], &addr("self:1"), &mut rng), None);
    }

    #[test]
    fn test_only_self_never_selected() {
        let mut rng = StdRng::seed_from_u64(2);
        let local = addr("self:1");
        let candidates = vec![local.clone()];

        for _ in 0..100 {
            assert_eq!(select_target(&candidates, &local, &mut rng), None);
        }
    }

    #[test]
    fn test_single_peer_always_selected() {
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = vec![addr("a:1")];

        for _ in 0..100 {
            assert_eq!(
                select_target(&candidates, &addr("self:1"), &mut rng),
                Some(addr("a:1"))
            );
        }
    }

    #[test]
    fn test_excludes_self_and_spreads_across_peers() {
        let mut rng = StdRng::seed_from_u64(4);
        let local = addr("self:1");
        let candidates = vec![addr("a:1"), addr("b:1"), local.clone()];

        let trials = 3000;
        let mut picked_a = 0;
        let mut picked_b = 0;
        for _ in 0..trials {
            match select_target(&candidates, &local, &mut rng) {
                Some(target) if target == addr("a:1") => picked_a += 1,
                Some(target) if target == addr("b:1") => picked_b += 1,
                Some(target) => panic!("selected unexpected target {}", target),
                // 10 consecutive self draws: (1/3)^10, practically never
                None => {}
            }
        }

        assert!(picked_a + picked_b >= trials - 1);
        // Roughly uniform between the two peers
        assert!(picked_a > trials * 2 / 5, "a picked {} times", picked_a);
        assert!(picked_b > trials * 2 / 5, "b picked {} times", picked_b);
    }
}
