//! Mappings between user-facing quality scales and perceptual distance.
//!
//! Three scales are in play: the legacy 1-100 quality knob, the libjpeg
//! linear scale factor (0-5000), and the perceptual distance used
//! internally. All conversions are pure.

/// Converts a 1-100 quality value to perceptual distance.
///
/// Lower distance means higher quality; distance 1.0 corresponds roughly
/// to "visually lossless".
#[must_use]
pub fn quality_to_distance(quality: i32) -> f32 {
    if quality >= 100 {
        0.01
    } else if quality >= 30 {
        0.1 + (100 - quality) as f32 * 0.09
    } else {
        let q = quality as f32;
        53.0 / 3000.0 * q * q - 23.0 / 20.0 * q + 25.0
    }
}

/// Converts a libjpeg linear scale factor to perceptual distance.
#[must_use]
pub fn linear_quality_to_distance(scale_factor: i32) -> f32 {
    let scale_factor = scale_factor.clamp(0, 5000);
    let quality = if scale_factor < 100 {
        100 - scale_factor / 2
    } else {
        5000 / scale_factor
    };
    quality_to_distance(quality)
}

/// Converts perceptual distance back to the libjpeg linear scale factor.
#[must_use]
pub fn distance_to_linear_quality(distance: f32) -> f32 {
    if distance <= 0.1 {
        1.0
    } else if distance <= 4.6 {
        (200.0 / 9.0) * (distance - 0.1)
    } else if distance <= 6.4 {
        5000.0 / (100.0 - (distance - 0.1) / 0.09)
    } else if distance < 25.0 {
        530_000.0 / (3450.0 - 300.0 * ((848.0 * distance - 5330.0) / 120.0).sqrt())
    } else {
        5000.0
    }
}

/// The libjpeg quality scaling curve: percentage scale factor for a 1-100
/// quality value.
#[must_use]
pub fn quality_scaling(quality: i32) -> i32 {
    let quality = quality.clamp(1, 100);
    if quality < 50 {
        5000 / quality
    } else {
        200 - 2 * quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_breakpoints() {
        assert_eq!(quality_to_distance(100), 0.01);
        assert_eq!(quality_to_distance(150), 0.01);
        // Just below 100 uses the linear branch.
        let d99 = quality_to_distance(99);
        assert!((d99 - 0.19).abs() < 1e-6);
        // The quadratic branch takes over below 30.
        let d30 = quality_to_distance(30);
        let d29 = quality_to_distance(29);
        assert!(d29 > d30);
    }

    #[test]
    fn quality_to_distance_is_monotone() {
        let mut prev = quality_to_distance(1);
        for q in 2..=100 {
            let d = quality_to_distance(q);
            assert!(d <= prev, "not monotone at q={q}: {d} > {prev}");
            prev = d;
        }
    }

    #[test]
    fn linear_quality_clamps_and_divides() {
        // Below 100 the scale factor maps as 100 - s/2.
        assert_eq!(
            linear_quality_to_distance(0),
            quality_to_distance(100)
        );
        assert_eq!(
            linear_quality_to_distance(20),
            quality_to_distance(90)
        );
        // At and above 100 it maps as 5000/s with integer division.
        assert_eq!(
            linear_quality_to_distance(100),
            quality_to_distance(50)
        );
        assert_eq!(
            linear_quality_to_distance(5000),
            quality_to_distance(1)
        );
        // Out-of-range values clamp.
        assert_eq!(
            linear_quality_to_distance(9999),
            linear_quality_to_distance(5000)
        );
        assert_eq!(
            linear_quality_to_distance(-5),
            linear_quality_to_distance(0)
        );
    }

    #[test]
    fn distance_to_linear_quality_branches() {
        assert_eq!(distance_to_linear_quality(0.05), 1.0);
        assert_eq!(distance_to_linear_quality(0.1), 1.0);
        // Linear branch.
        let v = distance_to_linear_quality(1.0);
        assert!((v - 20.0).abs() < 1e-4);
        // Large distances saturate.
        assert_eq!(distance_to_linear_quality(25.0), 5000.0);
        assert_eq!(distance_to_linear_quality(100.0), 5000.0);
    }

    #[test]
    fn distance_to_linear_quality_is_monotone_and_stable_at_breakpoints() {
        let mut prev = distance_to_linear_quality(0.1);
        let mut d = 0.1f32;
        while d < 20.0 {
            let v = distance_to_linear_quality(d);
            assert!(
                v + 1e-3 >= prev,
                "not monotone at d={d}: {v} < {prev}"
            );
            prev = v;
            d += 0.05;
        }
        // The interior breakpoints are continuous to within a small
        // tolerance; 25.0 caps to 5000.
        for bp in [0.1f32, 4.6, 6.4] {
            let below = distance_to_linear_quality(bp - 1e-4);
            let above = distance_to_linear_quality(bp + 1e-4);
            assert!(
                (below - above).abs() < 1.0,
                "discontinuity at {bp}: {below} vs {above}"
            );
        }
        assert_eq!(distance_to_linear_quality(25.0), 5000.0);
        assert_eq!(distance_to_linear_quality(30.0), 5000.0);
    }

    #[test]
    fn round_trip_through_linear_scale() {
        // distance -> linear -> distance is stable away from the flat ends.
        for q in (40..=95).step_by(5) {
            let d = quality_to_distance(q);
            let s = distance_to_linear_quality(d);
            let d2 = linear_quality_to_distance(s.round() as i32);
            assert!(
                (d - d2).abs() < 0.15,
                "round trip drifted at q={q}: {d} -> {s} -> {d2}"
            );
        }
    }

    #[test]
    fn quality_scaling_matches_libjpeg() {
        assert_eq!(quality_scaling(50), 100);
        assert_eq!(quality_scaling(100), 0);
        assert_eq!(quality_scaling(25), 200);
        assert_eq!(quality_scaling(1), 5000);
        assert_eq!(quality_scaling(0), 5000);
        assert_eq!(quality_scaling(120), 0);
        // Stable around the branch point.
        assert_eq!(quality_scaling(49), 5000 / 49);
        assert_eq!(quality_scaling(51), 98);
    }
}
