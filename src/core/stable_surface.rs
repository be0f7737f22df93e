use crate::types::{MaskRaster, Raster};
use ndarray::{Array1, Zip};

/// Robust statistics over the stable-surface reference set
///
/// Values are drawn from pixels where the mask is set, the field is finite and
/// the magnitude is strictly below the outlier cutoff.
pub struct StableSurface<'a> {
    mask: &'a MaskRaster,
    outlier_cutoff: f64,
}

impl<'a> StableSurface<'a> {
    pub fn new(mask: &'a MaskRaster, outlier_cutoff: f64) -> Self {
        Self {
            mask,
            outlier_cutoff,
        }
    }

    /// Number of stable pixels where `field` is defined
    pub fn count_defined(&self, field: &Raster) -> usize {
        Zip::from(self.mask)
            .and(field)
            .fold(0usize, |acc, &stable, &value| {
                if stable && !value.is_nan() {
                    acc + 1
                } else {
                    acc
                }
            })
    }

    /// In-range stable values of `field`, in raster order
    pub fn values(&self, field: &Raster) -> Vec<f64> {
        let cutoff = self.outlier_cutoff;
        let mut values = Vec::new();
        Zip::from(self.mask).and(field).for_each(|&stable, &value| {
            let value = value as f64;
            if stable && value > -cutoff && value < cutoff {
                values.push(value);
            }
        });
        values
    }

    /// Median of the in-range stable values, `None` if there are none
    pub fn median(&self, field: &Raster) -> Option<f64> {
        median(self.values(field))
    }

    /// Population standard deviation of the in-range stable values
    pub fn std_dev(&self, field: &Raster) -> Option<f64> {
        std_dev(&self.values(field))
    }
}

pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Population standard deviation, `None` for an empty set
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(Array1::from(values.to_vec()).std(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(Vec::new()), None);
    }

    #[test]
    fn test_std_dev_is_population() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(sd, 2.0, epsilon = 1e-12);
        assert_eq!(std_dev(&[7.5]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_outlier_rejected_from_median() {
        let mask = Array2::from_elem((4, 4), true);
        let mut field = Array2::<f32>::zeros((4, 4));
        field[[2, 1]] = 1000.0;

        let stable = StableSurface::new(&mask, 500.0);
        assert_eq!(stable.values(&field).len(), 15);
        assert_eq!(stable.median(&field), Some(0.0));
        assert_eq!(stable.count_defined(&field), 16);
    }

    #[test]
    fn test_mask_and_nan_excluded() {
        let mask = array![[true, false], [true, true]];
        let field = array![[1.0f32, 100.0], [f32::NAN, 3.0]];

        let stable = StableSurface::new(&mask, 500.0);
        assert_eq!(stable.count_defined(&field), 2);
        assert_eq!(stable.values(&field), vec![1.0, 3.0]);
        assert_eq!(stable.median(&field), Some(2.0));
        assert_relative_eq!(stable.std_dev(&field).unwrap(), 1.0);
    }

    #[test]
    fn test_cutoff_is_strict() {
        let mask = Array2::from_elem((1, 3), true);
        let field = array![[500.0f32, -500.0, 499.5]];

        let stable = StableSurface::new(&mask, 500.0);
        assert_eq!(stable.values(&field), vec![499.5]);
    }
}
