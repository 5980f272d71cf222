//! Per-sample silence classification.

/// Classify one signed 16-bit sample against a full-scale threshold
/// fraction in (0, 1].
///
/// The boundary is `threshold * 32768` (half the signed 16-bit range); a
/// sample is silent iff it lies strictly between `-boundary` and
/// `boundary`. A sample exactly at the boundary is not silent. Channels are
/// classified independently; this operates on individual channel samples,
/// not frames.
pub fn is_silent(sample: i16, threshold: f64) -> bool {
    let boundary = threshold * 32768.0;
    let value = f64::from(sample);
    value > -boundary && value < boundary
}
