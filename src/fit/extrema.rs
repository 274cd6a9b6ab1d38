//! Dominant extrema detection.
//!
//! The detector seeds bump placement. It scans the series once:
//!
//! 1. The first extremum is the earliest point that dominates every later
//!    point (`≥` for peaks, `≤` for valleys). The last point dominates
//!    vacuously, so a non-empty series always yields at least one extremum.
//! 2. Every later point qualifies if it strictly dominates the look-back
//!    window `[i-W, i)` and weakly dominates the look-forward window
//!    `(i, i+W]`, both clipped at the series bounds.
//!
//! Strict look-back with weak look-forward lets the first element of a plateau
//! win against a following slight rise while rejecting points inside a rising
//! plateau that was already claimed. Accepted points are never revisited.

use crate::domain::{Extremum, ExtremumKind};

/// Default look-back / look-forward window (periods).
pub const DEFAULT_WINDOW: usize = 8;

/// Detect peaks (or valleys) with the default window.
pub fn detect_extrema(values: &[f64], kind: ExtremumKind) -> Vec<Extremum> {
    detect_extrema_with_window(values, kind, DEFAULT_WINDOW)
}

/// Detect peaks (or valleys) with an explicit window size.
pub fn detect_extrema_with_window(values: &[f64], kind: ExtremumKind, window: usize) -> Vec<Extremum> {
    let n = values.len();
    let mut out = Vec::new();

    let Some(first) = (0..n).find(|&i| values[i + 1..].iter().all(|&v| weakly(values[i], v, kind))) else {
        return out;
    };
    out.push(Extremum {
        index: first,
        value: values[first],
        kind,
    });

    for i in first + 1..n {
        let back = &values[i.saturating_sub(window)..i];
        let fwd = &values[i + 1..(i + 1 + window).min(n)];
        let y = values[i];
        if back.iter().all(|&v| strictly(y, v, kind)) && fwd.iter().all(|&v| weakly(y, v, kind)) {
            out.push(Extremum { index: i, value: y, kind });
        }
    }

    out
}

fn weakly(y: f64, other: f64, kind: ExtremumKind) -> bool {
    match kind {
        ExtremumKind::Peak => y >= other,
        ExtremumKind::Valley => y <= other,
    }
}

fn strictly(y: f64, other: f64, kind: ExtremumKind) -> bool {
    match kind {
        ExtremumKind::Peak => y > other,
        ExtremumKind::Valley => y < other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(e: &[Extremum]) -> Vec<usize> {
        e.iter().map(|x| x.index).collect()
    }

    #[test]
    fn single_dominant_peak() {
        let peaks = detect_extrema(&[10.0, 12.0, 30.0, 14.0, 11.0], ExtremumKind::Peak);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 2);
        assert_eq!(peaks[0].value, 30.0);
        assert_eq!(peaks[0].kind, ExtremumKind::Peak);
    }

    #[test]
    fn maximum_at_last_index() {
        let values = [1.0, 3.0, 2.0, 5.0, 4.0, 9.0];
        let peaks = detect_extrema(&values, ExtremumKind::Peak);
        assert_eq!(indices(&peaks), vec![5]);

        let rising: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(indices(&detect_extrema(&rising, ExtremumKind::Peak)), vec![19]);
    }

    #[test]
    fn constant_series_yields_first_index_in_both_modes() {
        let values = [4.0; 12];
        for kind in [ExtremumKind::Peak, ExtremumKind::Valley] {
            let e = detect_extrema(&values, kind);
            assert_eq!(indices(&e), vec![0]);
        }
    }

    #[test]
    fn empty_series_yields_nothing() {
        assert!(detect_extrema(&[], ExtremumKind::Peak).is_empty());
    }

    #[test]
    fn later_peaks_need_strict_lookback() {
        // Global peak first, then a second bump separated by more than the window.
        let mut values = vec![50.0, 40.0, 30.0, 20.0, 10.0, 5.0, 5.0, 5.0, 5.0, 5.0];
        values.extend([6.0, 8.0, 12.0, 8.0, 6.0, 5.0]);
        let peaks = detect_extrema(&values, ExtremumKind::Peak);
        assert_eq!(indices(&peaks), vec![0, 12]);
    }

    #[test]
    fn plateau_first_element_wins() {
        // After the first peak, a plateau [9, 9]: only its first element is accepted.
        let values = [20.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 2.0, 1.0];
        let peaks = detect_extrema_with_window(&values, ExtremumKind::Peak, 3);
        // Index 10 strictly beats [7,10) and weakly beats (10, 13]; index 11 fails strict look-back.
        assert_eq!(indices(&peaks), vec![0, 10]);
    }

    #[test]
    fn valleys_mirror_peaks() {
        let values = [5.0, 3.0, 1.0, 3.0, 6.0];
        let valleys = detect_extrema(&values, ExtremumKind::Valley);
        assert_eq!(indices(&valleys), vec![2]);
        assert_eq!(valleys[0].kind, ExtremumKind::Valley);
    }
}
