//! Two-stage feature normalization: min-max range scaling, then z-score
//! standardization of the range-scaled values.
//!
//! Parameters are fitted once over the catalog and then applied unchanged to
//! catalog rows and query vectors alike. A constant column (zero range or zero
//! standard deviation) maps to 0 instead of dividing by zero.

use thiserror::Error;

use crate::features::{FEATURE_DIM, Feature, FeatureVector};

/// Ranges and deviations below this are treated as zero.
const DEGENERATE_EPS: f64 = 1e-12;

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("cannot fit normalizer on zero rows")]
    Empty,
    #[error("non-finite value in column {column}")]
    NonFinite { column: &'static str },
}

/// Fitted normalization parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    min: FeatureVector,
    max: FeatureVector,
    /// Mean of each range-normalized column
    mean: FeatureVector,
    /// Population std of each range-normalized column
    std: FeatureVector,
}

impl Normalizer {
    /// Fit min/max over `rows`, then mean/std over the range-normalized rows.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, NormalizeError> {
        if rows.is_empty() {
            return Err(NormalizeError::Empty);
        }

        let mut min = [f64::INFINITY; FEATURE_DIM];
        let mut max = [f64::NEG_INFINITY; FEATURE_DIM];
        for row in rows {
            for (d, &val) in row.iter().enumerate() {
                if !val.is_finite() {
                    return Err(NormalizeError::NonFinite {
                        column: Feature::ALL[d].column(),
                    });
                }
                min[d] = min[d].min(val);
                max[d] = max[d].max(val);
            }
        }
        let range: FeatureVector = std::array::from_fn(|d| max[d] - min[d]);
        check_finite(&range)?;

        let mut normalizer = Self {
            min,
            max,
            mean: [0.0; FEATURE_DIM],
            std: [0.0; FEATURE_DIM],
        };

        // Standardization statistics come from the range-normalized catalog
        let n = rows.len() as f64;
        let ranged: Vec<FeatureVector> = rows.iter().map(|r| normalizer.range_normalize(r)).collect();

        let mut mean = [0.0_f64; FEATURE_DIM];
        for row in &ranged {
            for (d, &val) in row.iter().enumerate() {
                mean[d] += val;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = [0.0_f64; FEATURE_DIM];
        for row in &ranged {
            for (d, &val) in row.iter().enumerate() {
                let diff = val - mean[d];
                var[d] += diff * diff;
            }
        }
        let std = var.map(|v| (v / n).sqrt());

        check_finite(&mean)?;
        check_finite(&std)?;

        normalizer.mean = mean;
        normalizer.std = std;

        let degenerate = normalizer.degenerate_columns();
        if !degenerate.is_empty() {
            log::debug!(
                "Constant feature columns normalize to 0: {}",
                degenerate.iter().map(|f| f.column()).collect::<Vec<_>>().join(", ")
            );
        }

        Ok(normalizer)
    }

    /// `(v - min) / (max - min)` per column. Values outside the fitted range
    /// land outside [0, 1]; they are not clamped.
    pub fn range_normalize(&self, v: &FeatureVector) -> FeatureVector {
        std::array::from_fn(|d| {
            let range = self.max[d] - self.min[d];
            if range.abs() < DEGENERATE_EPS {
                0.0
            } else {
                (v[d] - self.min[d]) / range
            }
        })
    }

    /// `(v - mean) / std` per column, on already range-normalized input.
    pub fn standardize(&self, v: &FeatureVector) -> FeatureVector {
        std::array::from_fn(|d| {
            if self.std[d].abs() < DEGENERATE_EPS {
                0.0
            } else {
                (v[d] - self.mean[d]) / self.std[d]
            }
        })
    }

    /// Both stages, in order.
    pub fn transform(&self, v: &FeatureVector) -> FeatureVector {
        self.standardize(&self.range_normalize(v))
    }

    pub fn transform_all(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Columns whose range or deviation collapsed to zero.
    pub fn degenerate_columns(&self) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| {
                let d = f.index();
                (self.max[d] - self.min[d]).abs() < DEGENERATE_EPS
                    || self.std[d].abs() < DEGENERATE_EPS
            })
            .collect()
    }

    pub fn min(&self) -> &FeatureVector {
        &self.min
    }

    pub fn max(&self) -> &FeatureVector {
        &self.max
    }

    pub fn mean(&self) -> &FeatureVector {
        &self.mean
    }

    pub fn std(&self) -> &FeatureVector {
        &self.std
    }
}

fn check_finite(values: &[f64]) -> Result<(), NormalizeError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(d) => Err(NormalizeError::NonFinite {
            column: Feature::ALL[d].column(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fill: f64) -> FeatureVector {
        [fill; FEATURE_DIM]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fit_empty() {
        assert_eq!(Normalizer::fit(&[]), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_fit_rejects_nan() {
        let mut bad = row(1.0);
        bad[Feature::Energy.index()] = f64::NAN;
        assert_eq!(
            Normalizer::fit(&[row(0.0), bad]),
            Err(NormalizeError::NonFinite { column: "energy" })
        );
    }

    #[test]
    fn test_fit_rejects_overflowing_range() {
        let mut lo = row(0.0);
        let mut hi = row(1.0);
        lo[Feature::Tempo.index()] = -f64::MAX;
        hi[Feature::Tempo.index()] = f64::MAX;
        assert_eq!(
            Normalizer::fit(&[lo, hi]),
            Err(NormalizeError::NonFinite { column: "tempo" })
        );
    }

    #[test]
    fn test_range_normalize_bounds() {
        let n = Normalizer::fit(&[row(10.0), row(20.0), row(30.0)]).unwrap();
        let lo = n.range_normalize(&row(10.0));
        let mid = n.range_normalize(&row(20.0));
        let hi = n.range_normalize(&row(30.0));
        assert!(lo.iter().all(|&v| close(v, 0.0)));
        assert!(mid.iter().all(|&v| close(v, 0.5)));
        assert!(hi.iter().all(|&v| close(v, 1.0)));
    }

    #[test]
    fn test_out_of_range_query_not_clamped() {
        let n = Normalizer::fit(&[row(10.0), row(20.0)]).unwrap();
        let above = n.range_normalize(&row(40.0));
        let below = n.range_normalize(&row(0.0));
        assert!(close(above[0], 3.0));
        assert!(close(below[0], -1.0));
    }

    #[test]
    fn test_standardized_catalog_has_zero_mean_unit_std() {
        let rows = vec![row(1.0), row(4.0), row(7.0), row(100.0)];
        let n = Normalizer::fit(&rows).unwrap();
        let normed = n.transform_all(&rows);

        for d in 0..FEATURE_DIM {
            let mean: f64 = normed.iter().map(|v| v[d]).sum::<f64>() / 4.0;
            let var: f64 = normed.iter().map(|v| (v[d] - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(close(mean, 0.0));
            assert!(close(var.sqrt(), 1.0));
        }
    }

    #[test]
    fn test_scale_invariance_across_columns() {
        // A column in milliseconds and one in [0, 1] normalize identically
        let mut a = row(0.0);
        let mut b = row(0.0);
        let mut c = row(0.0);
        a[Feature::DurationMs.index()] = 100_000.0;
        b[Feature::DurationMs.index()] = 200_000.0;
        c[Feature::DurationMs.index()] = 400_000.0;
        a[Feature::Energy.index()] = 0.1;
        b[Feature::Energy.index()] = 0.2;
        c[Feature::Energy.index()] = 0.4;

        let n = Normalizer::fit(&[a, b, c]).unwrap();
        for r in [a, b, c] {
            let t = n.transform(&r);
            assert!(close(t[Feature::DurationMs.index()], t[Feature::Energy.index()]));
        }
    }

    #[test]
    fn test_transform_reproduces_catalog_matrix() {
        let rows: Vec<FeatureVector> = (0..20)
            .map(|i| std::array::from_fn(|d| ((i * 7 + d * 3) % 11) as f64 * 0.37 - d as f64))
            .collect();
        let n = Normalizer::fit(&rows).unwrap();
        let matrix = n.transform_all(&rows);
        for (r, m) in rows.iter().zip(&matrix) {
            let again = n.standardize(&n.range_normalize(r));
            for d in 0..FEATURE_DIM {
                assert!(close(again[d], m[d]));
            }
        }
    }

    #[test]
    fn test_constant_column_is_zero_not_nan() {
        let mut rows = vec![row(0.1), row(0.5), row(0.9)];
        for r in &mut rows {
            r[Feature::Mode.index()] = 1.0;
        }
        let n = Normalizer::fit(&rows).unwrap();
        assert_eq!(n.degenerate_columns(), vec![Feature::Mode]);

        for t in n.transform_all(&rows) {
            assert!(t.iter().all(|v| v.is_finite()));
            assert_eq!(t[Feature::Mode.index()], 0.0);
        }

        // Query values off the constant still map to 0
        let mut query = row(0.3);
        query[Feature::Mode.index()] = 0.0;
        let t = n.transform(&query);
        assert!(t.iter().all(|v| v.is_finite()));
        assert_eq!(t[Feature::Mode.index()], 0.0);
    }

    #[test]
    fn test_single_row_catalog_all_degenerate() {
        let n = Normalizer::fit(&[row(3.0)]).unwrap();
        assert_eq!(n.degenerate_columns().len(), FEATURE_DIM);
        assert!(n.transform(&row(3.0)).iter().all(|&v| v == 0.0));
        assert!(n.transform(&row(9.0)).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let rows = vec![row(2.0), row(3.0), row(5.0)];
        assert_eq!(Normalizer::fit(&rows).unwrap(), Normalizer::fit(&rows).unwrap());
    }
}
