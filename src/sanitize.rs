//! Floors empty and negative MC bins so the likelihood fit never sees a zero
//! or negative expectation.

use statrs::distribution::{ContinuousCDF, Gamma};

use crate::error::{Error, Result};
use crate::histogram::Histogram;

/// Bins below this content (or error) are rewritten.
pub const MIN_CONTENT: f64 = 1e-4;
/// Content given to rewritten bins.
pub const FLOOR_CONTENT: f64 = 1e-3;
/// Error given to rewritten bins without a usable average weight.
pub const FLOOR_ERROR: f64 = 1e-4;
/// Two-sided 1 sigma coverage.
pub const CONFIDENCE_LEVEL: f64 = 0.6827;

/// Complementary quantile of the gamma distribution: the `x` for which
/// `P(X > x) = p` with `X ~ Gamma(shape, scale)`.
pub fn gamma_quantile_c(p: f64, shape: f64, scale: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) || !(scale.is_finite() && scale > 0.0) {
        return Err(Error::InvalidArgument(format!(
            "gamma quantile needs 0 < p < 1 and a positive scale, got p={p}, scale={scale}"
        )));
    }
    let dist = Gamma::new(shape, 1.0 / scale).map_err(|e| {
        Error::InvalidArgument(format!("gamma(shape={shape}, scale={scale}): {e}"))
    })?;
    Ok(dist.inverse_cdf(1.0 - p))
}

/// Upper error on zero observed events at [`CONFIDENCE_LEVEL`], in units of
/// one event (about 1.841).
pub fn zero_count_upper_error() -> Result<f64> {
    let alpha = 1.0 - CONFIDENCE_LEVEL;
    gamma_quantile_c(alpha / 2.0, 1.0, 1.0)
}

/// Rewrites visible bins with content below [`MIN_CONTENT`].
///
/// A rewritten bin gets [`FLOOR_CONTENT`]. Its error becomes the zero-count
/// upper error scaled by the histogram's average event weight when the bin
/// was genuinely empty, and [`FLOOR_ERROR`] otherwise (negative yields, or a
/// histogram without entries).
pub fn remove_neg_entries(hist: &mut Histogram) -> Result<()> {
    let up_err = zero_count_upper_error()?;
    let avg_weight = if hist.entries > 0.0 {
        hist.integral() / hist.entries
    } else {
        -1.0
    };
    for bin in 1..=hist.n_bins {
        let content = hist.bin_content(bin);
        if content >= MIN_CONTENT {
            continue;
        }
        let error = hist.bin_error(bin);
        hist.set_bin_content(bin, FLOOR_CONTENT)?;
        if error < MIN_CONTENT && avg_weight > 0.0 {
            hist.set_bin_error(bin, up_err * avg_weight)?;
        } else {
            hist.set_bin_error(bin, FLOOR_ERROR)?;
        }
        tracing::debug!(
            histogram = %hist.name,
            bin,
            content,
            error = hist.bin_error(bin),
            "floored bin"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Shape 1 is the exponential distribution, so the quantile is `-ln(alpha/2)`.
    fn expected_up_err() -> f64 {
        -((1.0 - CONFIDENCE_LEVEL) / 2.0f64).ln()
    }

    #[test]
    fn zero_count_error_matches_the_gamma_quantile() {
        assert_abs_diff_eq!(zero_count_upper_error().unwrap(), expected_up_err(), epsilon = 1e-8);
        assert_abs_diff_eq!(zero_count_upper_error().unwrap(), 1.841, epsilon = 1e-3);
        assert_abs_diff_eq!(
            gamma_quantile_c(0.1, 1.0, 2.0).unwrap(),
            -2.0 * 0.1f64.ln(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn gamma_quantile_rejects_bad_arguments() {
        assert!(gamma_quantile_c(0.0, 1.0, 1.0).is_err());
        assert!(gamma_quantile_c(0.5, -1.0, 1.0).is_err());
        assert!(gamma_quantile_c(0.5, 1.0, 0.0).is_err());
        assert!(gamma_quantile_c(0.5, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn empty_histogram_gets_fixed_floor() {
        let mut h = Histogram::new("h", "h", 1, 0.0, 1.0).unwrap();
        remove_neg_entries(&mut h).unwrap();
        assert_eq!(h.bin_content(1), FLOOR_CONTENT);
        assert_abs_diff_eq!(h.bin_error(1), FLOOR_ERROR, epsilon = 1e-15);
    }

    #[test]
    fn empty_bin_error_scales_with_average_weight() {
        let mut h = Histogram::new("h", "h", 2, 0.0, 2.0).unwrap();
        h.content[1] = 50.0;
        h.sumw2[1] = 25.0;
        h.entries = 100.0;
        remove_neg_entries(&mut h).unwrap();
        assert_eq!(h.bin_content(1), 50.0);
        assert_eq!(h.bin_content(2), FLOOR_CONTENT);
        assert_abs_diff_eq!(h.bin_error(2), 0.5 * expected_up_err(), epsilon = 1e-8);
    }

    #[test]
    fn negative_bins_keep_a_small_error() {
        let mut h = Histogram::new("h", "h", 2, 0.0, 2.0).unwrap();
        h.fill(0.5, 4.0);
        h.fill(1.5, -1.0);
        remove_neg_entries(&mut h).unwrap();
        assert_eq!(h.bin_content(2), FLOOR_CONTENT);
        assert_abs_diff_eq!(h.bin_error(2), FLOOR_ERROR, epsilon = 1e-15);
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let mut h = Histogram::new("h", "h", 3, 0.0, 3.0).unwrap();
        h.fill(0.5, 2.0);
        h.fill(1.5, -0.5);
        h.fill(0.5, 3.0);
        remove_neg_entries(&mut h).unwrap();
        let once = h.clone();
        remove_neg_entries(&mut h).unwrap();
        assert_eq!(h, once);
    }
}
