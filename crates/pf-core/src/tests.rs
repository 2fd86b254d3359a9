//! Unit tests for pf-core.

use crate::{Road, SimClock, SimRng, Tick, VehicleId};

// ── Ids ───────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod id_tests {
    use super::*;

    #[test]
    fn invalid_sentinel_is_max() {
        assert_eq!(VehicleId::INVALID.0, u32::MAX);
        assert_eq!(VehicleId::default(), VehicleId::INVALID);
    }

    #[test]
    fn ids_order_by_value() {
        assert!(VehicleId(3) < VehicleId(7));
        assert!(VehicleId(7) < VehicleId::INVALID);
    }

    #[test]
    fn index_round_trip() {
        let id = VehicleId::try_from(42usize).unwrap();
        assert_eq!(id.index(), 42);
    }
}

// ── Rng ───────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimRng::new(1337);
        let mut b = SimRng::new(1337);
        for _ in 0..100 {
            assert_eq!(a.gen_range(0u32..1_000_000), b.gen_range(0u32..1_000_000));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SimRng::new(1);
        let mut b = SimRng::new(2);
        let xs: Vec<u32> = (0..32).map(|_| a.gen_range(0..u32::MAX)).collect();
        let ys: Vec<u32> = (0..32).map(|_| b.gen_range(0..u32::MAX)).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn child_streams_are_deterministic() {
        let mut a = SimRng::new(9);
        let mut b = SimRng::new(9);
        let mut ca = a.child(1);
        let mut cb = b.child(1);
        assert_eq!(ca.gen_range(0u64..u64::MAX), cb.gen_range(0u64..u64::MAX));
    }

    #[test]
    fn normal_degenerate_returns_mean() {
        let mut rng = SimRng::new(0);
        assert_eq!(rng.normal(36.0, 0.0), 36.0);
    }

    #[test]
    fn poisson_zero_rate_is_zero() {
        let mut rng = SimRng::new(0);
        assert_eq!(rng.poisson(0.0), 0);
        assert_eq!(rng.poisson(-1.0), 0);
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod clock_tests {
    use super::*;

    #[test]
    fn advance_and_now() {
        let mut clock = SimClock::new(0.5);
        assert_eq!(clock.now_secs(), 0.0);
        clock.advance();
        clock.advance();
        clock.advance();
        assert_eq!(clock.current_tick, Tick(3));
        assert!((clock.now_secs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn ticks_for_secs_rounds_up() {
        let clock = SimClock::new(1.0);
        assert_eq!(clock.ticks_for_secs(30.0), 30);
        let clock = SimClock::new(0.4);
        // 1.0 s / 0.4 s = 2.5 → 3 ticks so the boundary is never undershot
        assert_eq!(clock.ticks_for_secs(1.0), 3);
    }

    #[test]
    fn tick_arithmetic() {
        assert_eq!(Tick(5) + 3, Tick(8));
        assert_eq!(Tick(8) - Tick(5), 3);
        assert_eq!(Tick(8).since(Tick(2)), 6);
    }
}

// ── Road ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod road_tests {
    use super::*;

    fn road() -> Road {
        Road::new(100_000.0, 4, 1_000.0, 55.0).unwrap()
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(Road::new(0.0, 4, 1_000.0, 55.0).is_err());
        assert!(Road::new(100.0, 0, 1_000.0, 55.0).is_err());
        assert!(Road::new(100.0, 1, 0.0, 55.0).is_err());
        assert!(Road::new(100.0, 1, 10.0, 0.0).is_err());
    }

    #[test]
    fn ramp_at_or_after_snaps_up() {
        let r = road();
        assert_eq!(r.ramp_at_or_after(0.0), 0.0);
        assert_eq!(r.ramp_at_or_after(1.0), 1_000.0);
        assert_eq!(r.ramp_at_or_after(1_000.0), 1_000.0);
        assert_eq!(r.ramp_at_or_after(1_000.5), 2_000.0);
    }

    #[test]
    fn ramp_at_or_after_clamps_to_end() {
        let r = Road::new(2_500.0, 2, 1_000.0, 55.0).unwrap();
        assert_eq!(r.ramp_at_or_after(2_400.0), 2_500.0);
    }

    #[test]
    fn ramp_count_includes_origin() {
        let r = Road::new(5_000.0, 2, 1_000.0, 55.0).unwrap();
        assert_eq!(r.ramp_count(), 6); // 0, 1k, 2k, 3k, 4k, 5k
    }

    #[test]
    fn leftmost_lane() {
        assert_eq!(road().leftmost_lane(), 3);
    }
}
