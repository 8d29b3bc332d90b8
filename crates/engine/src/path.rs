//! Cursor path planning.
//!
//! Paths are planned up front (all randomness drawn synchronously) and then
//! replayed step by step with sleeps, so a navigation or deadline can
//! cancel the replay at any suspension point.

use rand::Rng;

use hb_page::distance;

/// Cursor origins closer than this to the target first drift away, so the
/// click doesn't look teleported.
const MIN_APPROACH_DISTANCE: f64 = 80.0;
/// Paths longer than this overshoot the target and come back.
const OVERSHOOT_THRESHOLD: f64 = 200.0;
/// Probability of a doubled frame (hesitation) per step.
const DOUBLE_FRAME_CHANCE: f64 = 0.08;

#[derive(Debug, Clone, Copy)]
pub struct PathStep {
    pub x: f64,
    pub y: f64,
    /// Hold this position for an extra frame.
    pub double_frame: bool,
}

/// Plan the full approach from the cursor's last position to the target.
pub fn plan_approach(from: (f64, f64), to: (f64, f64), rng: &mut impl Rng) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut origin = from;

    // Anti-teleport drift: wander off before coming back in.
    if distance(from.0, from.1, to.0, to.1) < MIN_APPROACH_DISTANCE {
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        let radius = rng.random_range(80.0..200.0);
        let drift = (from.0 + radius * angle.cos(), from.1 + radius * angle.sin());
        steps.extend(bezier_segment(origin, drift, rng));
        origin = drift;
    }

    let d = distance(origin.0, origin.1, to.0, to.1);
    if d > OVERSHOOT_THRESHOLD {
        let magnitude = (d * 0.06).min(20.0) * (0.4 + 0.6 * rng.random_range(0.0..1.0));
        let ux = (to.0 - origin.0) / d;
        let uy = (to.1 - origin.1) / d;
        let past = (to.0 + ux * magnitude, to.1 + uy * magnitude);
        steps.extend(bezier_segment(origin, past, rng));
        steps.extend(bezier_segment(past, to, rng));
    } else {
        steps.extend(bezier_segment(origin, to, rng));
    }
    steps
}

/// One cubic Bézier leg with asymmetric perpendicular control points,
/// ease-in-out pacing, and per-step jitter.
fn bezier_segment(from: (f64, f64), to: (f64, f64), rng: &mut impl Rng) -> Vec<PathStep> {
    let d = distance(from.0, from.1, to.0, to.1);
    if d < 1.0 {
        return vec![PathStep {
            x: to.0,
            y: to.1,
            double_frame: false,
        }];
    }

    let count = ((d / 4.0) as usize).clamp(15, 100);
    let bow = (d * 0.35).min(120.0);
    // Perpendicular unit vector.
    let (px, py) = (-(to.1 - from.1) / d, (to.0 - from.0) / d);
    let bow1 = rng.random_range(-bow..=bow);
    let bow2 = rng.random_range(-bow..=bow) * 0.6;
    let c1 = (
        from.0 + (to.0 - from.0) * 0.30 + px * bow1,
        from.1 + (to.1 - from.1) * 0.30 + py * bow1,
    );
    let c2 = (
        from.0 + (to.0 - from.0) * 0.70 + px * bow2,
        from.1 + (to.1 - from.1) * 0.70 + py * bow2,
    );

    let jitter_amp = (d * 0.003).min(1.5);
    let mut steps = Vec::with_capacity(count);
    for i in 1..=count {
        let t = i as f64 / count as f64;
        let eased = t * t * (3.0 - 2.0 * t);
        let (mut x, mut y) = cubic_point(from, c1, c2, to, eased);
        if i < count {
            let amp = (std::f64::consts::PI * eased).sin() * jitter_amp;
            x += rng.random_range(-1.0..=1.0) * amp;
            y += rng.random_range(-1.0..=1.0) * amp;
        }
        steps.push(PathStep {
            x,
            y,
            double_frame: rng.random_bool(DOUBLE_FRAME_CHANCE),
        });
    }
    steps
}

fn cubic_point(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    t: f64,
) -> (f64, f64) {
    let u = 1.0 - t;
    let x = u.powi(3) * p0.0
        + 3.0 * u.powi(2) * t * p1.0
        + 3.0 * u * t.powi(2) * p2.0
        + t.powi(3) * p3.0;
    let y = u.powi(3) * p0.1
        + 3.0 * u.powi(2) * t * p1.1
        + 3.0 * u * t.powi(2) * p2.1
        + t.powi(3) * p3.1;
    (x, y)
}

/// A random point inside the centre 60% of a box.
pub fn target_point(rect: hb_page::Rect, rng: &mut impl Rng) -> (f64, f64) {
    let (cx, cy) = rect.center();
    let dx = rect.width * 0.3 * rng.random_range(-1.0..=1.0);
    let dy = rect.height * 0.3 * rng.random_range(-1.0..=1.0);
    (cx + dx, cy + dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_page::Rect;

    fn rng() -> impl Rng {
        rand::rng()
    }

    #[test]
    fn path_lands_exactly_on_target() {
        let mut rng = rng();
        for _ in 0..20 {
            let steps = plan_approach((10.0, 10.0), (700.0, 400.0), &mut rng);
            let last = steps.last().unwrap();
            assert!((last.x - 700.0).abs() < 1e-9);
            assert!((last.y - 400.0).abs() < 1e-9);
        }
    }

    #[test]
    fn step_count_respects_bounds() {
        let mut rng = rng();
        // Long leg: capped at 100 per segment (overshoot adds a return leg).
        let long = plan_approach((0.0, 0.0), (4000.0, 0.0), &mut rng);
        assert!(long.len() <= 200, "got {}", long.len());
        // Short leg above the drift threshold: at least 15.
        let short = plan_approach((0.0, 0.0), (0.0, 120.0), &mut rng);
        assert!(short.len() >= 15);
    }

    #[test]
    fn close_targets_drift_away_first() {
        let mut rng = rng();
        for _ in 0..10 {
            let steps = plan_approach((100.0, 100.0), (110.0, 100.0), &mut rng);
            let max_distance = steps
                .iter()
                .map(|s| distance(100.0, 100.0, s.x, s.y))
                .fold(0.0f64, f64::max);
            assert!(
                max_distance >= 40.0,
                "no drift observed, max excursion {max_distance}"
            );
        }
    }

    #[test]
    fn long_paths_overshoot_and_return() {
        let mut rng = rng();
        let mut seen_overshoot = false;
        for _ in 0..10 {
            let steps = plan_approach((0.0, 300.0), (900.0, 300.0), &mut rng);
            if steps.iter().any(|s| s.x > 900.5) {
                seen_overshoot = true;
            }
        }
        assert!(seen_overshoot);
    }

    #[test]
    fn no_step_is_nan() {
        let mut rng = rng();
        for _ in 0..50 {
            for step in plan_approach((5.0, 5.0), (6.0, 5.0), &mut rng) {
                assert!(step.x.is_finite() && step.y.is_finite());
            }
        }
    }

    #[test]
    fn target_point_stays_in_centre_band() {
        let mut rng = rng();
        let rect = Rect::new(100.0, 200.0, 100.0, 50.0);
        for _ in 0..100 {
            let (x, y) = target_point(rect, &mut rng);
            assert!((120.0..=180.0).contains(&x));
            assert!((210.0..=240.0).contains(&y));
        }
    }
}
