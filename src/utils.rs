use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Relative tolerance used when comparing probability sums
pub const REL_TOL: f64 = 1e-9;
/// Absolute tolerance used when comparing probability sums
pub const ABS_TOL: f64 = 1e-9;

/// Checks if two floats are equal within `REL_TOL` (scaled by the larger
/// magnitude) or `ABS_TOL`, whichever is looser.
///
/// ```
/// use pcky::utils::is_close;
///
/// assert!(is_close(0.1 + 0.2, 0.3));
/// assert!(is_close(1.0, 1.0 + 1e-12));
/// assert!(!is_close(0.9, 1.0));
/// ```
pub fn is_close(a: f64, b: f64) -> bool {
  if a == b {
    return true;
  }
  if !a.is_finite() || !b.is_finite() {
    return false;
  }
  let diff = (a - b).abs();
  diff <= (REL_TOL * a.abs().max(b.abs())).max(ABS_TOL)
}
