//! Threshold asserts for floating point tests.
//!
//! The thresholds we want are much bigger than epsilon, so this is simpler than pulling in a crate.

#[track_caller]
pub(crate) fn close_floats32(a: f32, b: f32, threshold: f32) {
    let diff = (a - b).abs();
    assert!(
        diff < threshold,
        "{} vs {}, difference {} is greater than threshold {}",
        a,
        b,
        diff,
        threshold
    );
}

#[track_caller]
pub(crate) fn close_floats64(a: f64, b: f64, threshold: f64) {
    let diff = (a - b).abs();
    assert!(
        diff < threshold,
        "{} vs {}, difference {} is greater than threshold {}",
        a,
        b,
        diff,
        threshold
    );
}

/// Assert that two slices match sample by sample.
#[track_caller]
pub(crate) fn close_slices32(a: &[f32], b: &[f32], threshold: f32) {
    assert_eq!(a.len(), b.len(), "Slices differ in length");
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        assert!(
            diff < threshold,
            "At index {i}: {x} vs {y}, difference {diff} is greater than threshold {threshold}"
        );
    }
}
