//! Mapping between decoded frame indices and the caller's simulated time axis.

/// Simulated time (seconds) represented by `frame_index`.
///
/// Each frame covers an equal slice of `total_secs`, regardless of its
/// playback delay. Returns 0 when there are no frames.
pub fn simulated_time(frame_index: usize, frame_count: usize, total_secs: f64) -> f64 {
    if frame_count == 0 {
        return 0.0;
    }
    (frame_index as f64 * total_secs) / frame_count as f64
}

/// Frame index for a seek-bar fraction. Out-of-range and NaN fractions clamp.
pub fn frame_for_fraction(fraction: f64, frame_count: usize) -> usize {
    if frame_count == 0 {
        return 0;
    }
    let f = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    let index = (f * frame_count as f64).floor() as usize;
    index.min(frame_count - 1)
}

/// Seek-bar position of `frame_index`: 0 at the first frame, 1 at the last.
pub fn progress(frame_index: usize, frame_count: usize) -> f64 {
    frame_index as f64 / frame_count.saturating_sub(1).max(1) as f64
}

pub fn time_label(secs: f64) -> String {
    format!("{:.2}s", secs)
}

pub fn total_label(total_secs: f64) -> String {
    format!("{}s", total_secs)
}

/// One-based frame counter, e.g. "Frame 3/40".
pub fn frame_label(frame_index: usize, frame_count: usize) -> String {
    if frame_count == 0 {
        return "Frame 0/0".to_string();
    }
    format!("Frame {}/{}", frame_index + 1, frame_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_frames_maps_to_zero() {
        assert_eq!(simulated_time(0, 0, 12.0), 0.0);
        assert_eq!(time_label(simulated_time(5, 0, 12.0)), "0.00s");
    }

    #[test]
    fn simulated_time_is_linear_in_index() {
        assert_eq!(simulated_time(0, 4, 10.0), 0.0);
        assert_eq!(simulated_time(1, 4, 10.0), 2.5);
        assert_eq!(simulated_time(3, 4, 10.0), 7.5);
    }

    #[test]
    fn simulated_time_is_monotonic() {
        let n = 37;
        let mut prev = f64::MIN;
        for i in 0..n {
            let t = simulated_time(i, n, 93.5);
            assert!(t >= prev);
            prev = t;
        }
    }

    #[test]
    fn fraction_endpoints() {
        for n in 1..20 {
            assert_eq!(frame_for_fraction(0.0, n), 0);
            assert_eq!(frame_for_fraction(1.0, n), n - 1);
        }
    }

    #[test]
    fn fraction_clamps() {
        assert_eq!(frame_for_fraction(-3.0, 10), 0);
        assert_eq!(frame_for_fraction(7.5, 10), 9);
        assert_eq!(frame_for_fraction(f64::NAN, 10), 0);
        assert_eq!(frame_for_fraction(0.55, 10), 5);
        assert_eq!(frame_for_fraction(0.5, 0), 0);
    }

    #[test]
    fn progress_spans_first_to_last() {
        assert_eq!(progress(0, 5), 0.0);
        assert_eq!(progress(4, 5), 1.0);
        assert_eq!(progress(0, 1), 0.0);
        assert_eq!(progress(0, 0), 0.0);
    }

    #[test]
    fn labels() {
        assert_eq!(time_label(2.5), "2.50s");
        assert_eq!(total_label(12.0), "12s");
        assert_eq!(total_label(7.25), "7.25s");
        assert_eq!(frame_label(2, 40), "Frame 3/40");
        assert_eq!(frame_label(0, 0), "Frame 0/0");
    }
}
