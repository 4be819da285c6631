//! Fixed-degree polynomial regression over a date axis
//!
//! Least squares via the normal equations with partial-pivot Gaussian
//! elimination. The x axis is centered and scaled to [-1, 1] before the
//! Vandermonde products are built; degree-5 powers of raw day numbers
//! would make the system hopelessly ill-conditioned.

use chrono::{Datelike, NaiveDate};

use crate::error::FitError;

/// Smoothing degree for every trend curve in the system. Fixed, not
/// configurable per call.
pub const TREND_DEGREE: usize = 5;

/// Fit the trend polynomial through a date-indexed series and evaluate it
/// back at the input dates.
pub fn fit_series(dates: &[NaiveDate], values: &[f64]) -> Result<Vec<f64>, FitError> {
    let xs: Vec<f64> = dates
        .iter()
        .map(|date| f64::from(date.num_days_from_ce()))
        .collect();
    fit_values(&xs, values)
}

/// Fit the trend polynomial over arbitrary x values and evaluate it back
/// at the same positions. Requires at least `TREND_DEGREE + 1` points.
pub fn fit_values(xs: &[f64], ys: &[f64]) -> Result<Vec<f64>, FitError> {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.len() < TREND_DEGREE + 1 {
        return Err(FitError::TooFewPoints {
            needed: TREND_DEGREE + 1,
            got: xs.len(),
        });
    }

    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    if span == 0.0 {
        return Err(FitError::Singular);
    }

    let normalized: Vec<f64> = xs.iter().map(|&x| 2.0 * (x - lo) / span - 1.0).collect();
    let coefficients = polyfit(&normalized, ys, TREND_DEGREE)?;
    Ok(normalized
        .iter()
        .map(|&x| polyval(&coefficients, x))
        .collect())
}

/// Least-squares polynomial coefficients, lowest degree first.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Vec<f64>, FitError> {
    let n = degree + 1;
    let mut ata = vec![vec![0.0; n]; n];
    let mut aty = vec![0.0; n];

    for (&x, &y) in xs.iter().zip(ys) {
        let mut powers = vec![1.0; 2 * degree + 1];
        for k in 1..powers.len() {
            powers[k] = powers[k - 1] * x;
        }
        for i in 0..n {
            aty[i] += powers[i] * y;
            for j in 0..n {
                ata[i][j] += powers[i + j];
            }
        }
    }

    solve(ata, aty)
}

/// Evaluate a polynomial given coefficients lowest degree first.
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, &coefficient| acc * x + coefficient)
}

fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, FitError> {
    let n = b.len();

    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-12 {
            return Err(FitError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            b[row] -= factor * b[col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Days::new(7 * i as u64))
            .collect()
    }

    #[test]
    fn recovers_low_degree_polynomial_exactly() {
        // y = 0.3 + 0.01 x - 0.002 x^2 sampled at 12 points; a degree-5
        // least-squares fit must pass through every sample.
        let xs: Vec<f64> = (0..12).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 0.3 + 0.01 * x - 0.002 * x * x).collect();
        let fitted = fit_values(&xs, &ys).unwrap();
        for (fit, y) in fitted.iter().zip(&ys) {
            assert!((fit - y).abs() < 1e-9, "fit {fit} vs {y}");
        }
    }

    #[test]
    fn constant_series_stays_constant() {
        let ds = dates(10);
        let ys = vec![0.5; 10];
        let fitted = fit_series(&ds, &ys).unwrap();
        for fit in fitted {
            assert!((fit - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn interpolates_minimum_point_count() {
        let xs: Vec<f64> = (0..6).map(f64::from).collect();
        let ys = vec![0.1, 0.4, 0.2, 0.8, 0.6, 0.3];
        let fitted = fit_values(&xs, &ys).unwrap();
        for (fit, y) in fitted.iter().zip(&ys) {
            assert!((fit - y).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_too_few_points() {
        let xs: Vec<f64> = (0..5).map(f64::from).collect();
        let ys = vec![0.2; 5];
        assert!(matches!(
            fit_values(&xs, &ys),
            Err(FitError::TooFewPoints { needed: 6, got: 5 })
        ));
    }

    #[test]
    fn rejects_degenerate_axis() {
        let xs = vec![3.0; 8];
        let ys = vec![0.2; 8];
        assert!(matches!(fit_values(&xs, &ys), Err(FitError::Singular)));
    }

    #[test]
    fn polyval_matches_horner_expansion() {
        // 1 + 2x + 3x^2 at x = 2 -> 17
        assert_eq!(polyval(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }
}
