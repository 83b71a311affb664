//! Linear interpolation over 1-D samples and regular 2-D grids.

use ndarray::Array2;
use thiserror::Error;

/// Errors raised when constructing or querying interpolators.
#[derive(Debug, Error)]
pub enum InterpError {
    #[error("axis lengths ({x_len} x {y_len}) do not match data shape {data_shape:?}")]
    DimensionMismatch {
        x_len: usize,
        y_len: usize,
        data_shape: (usize, usize),
    },

    #[error("axis must be strictly increasing")]
    NotAscending,

    #[error("axis needs at least two samples, got {0}")]
    TooFewSamples(usize),
}

fn check_ascending(axis: &[f64]) -> Result<(), InterpError> {
    if axis.len() < 2 {
        return Err(InterpError::TooFewSamples(axis.len()));
    }
    for pair in axis.windows(2) {
        if pair[1] <= pair[0] {
            return Err(InterpError::NotAscending);
        }
    }
    Ok(())
}

/// Locate the segment of a sorted axis containing `x`, clamped to the ends.
fn segment(axis: &[f64], x: f64) -> usize {
    if x <= axis[0] {
        return 0;
    }
    if x >= axis[axis.len() - 1] {
        return axis.len() - 2;
    }
    // Binary search for the left endpoint
    let mut lo = 0;
    let mut hi = axis.len() - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if axis[mid] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Linearly interpolate `(xs, ys)` samples at each point of `targets`.
///
/// Queries outside the sampled range are clamped to the nearest endpoint
/// value, the behavior wanted when resampling spectral curves onto a wider
/// wavelength grid.
pub fn interp_linear(xs: &[f64], ys: &[f64], targets: &[f64]) -> Result<Vec<f64>, InterpError> {
    check_ascending(xs)?;
    if xs.len() != ys.len() {
        return Err(InterpError::DimensionMismatch {
            x_len: xs.len(),
            y_len: ys.len(),
            data_shape: (ys.len(), 1),
        });
    }

    let out = targets
        .iter()
        .map(|&x| {
            if x <= xs[0] {
                ys[0]
            } else if x >= xs[xs.len() - 1] {
                ys[ys.len() - 1]
            } else {
                let i = segment(xs, x);
                let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
                ys[i] * (1.0 - t) + ys[i + 1] * t
            }
        })
        .collect();
    Ok(out)
}

/// Bilinear interpolator over a regular (but possibly unevenly spaced) grid.
///
/// Data is indexed `[y_index, x_index]`; queries outside the grid clamp to
/// the border, which suits optical transfer data where the support edge is
/// already at or past the optical cutoff.
#[derive(Debug, Clone)]
pub struct GridInterpolator {
    x_coords: Vec<f64>,
    y_coords: Vec<f64>,
    data: Array2<f64>,
}

impl GridInterpolator {
    pub fn new(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        data: Array2<f64>,
    ) -> Result<Self, InterpError> {
        let (ny, nx) = data.dim();
        if nx != x_coords.len() || ny != y_coords.len() {
            return Err(InterpError::DimensionMismatch {
                x_len: x_coords.len(),
                y_len: y_coords.len(),
                data_shape: (ny, nx),
            });
        }
        check_ascending(&x_coords)?;
        check_ascending(&y_coords)?;
        Ok(Self {
            x_coords,
            y_coords,
            data,
        })
    }

    /// Interpolated value at `(x, y)`, clamped to the grid border.
    pub fn at(&self, x: f64, y: f64) -> f64 {
        let xc = x.clamp(self.x_coords[0], self.x_coords[self.x_coords.len() - 1]);
        let yc = y.clamp(self.y_coords[0], self.y_coords[self.y_coords.len() - 1]);

        let i = segment(&self.y_coords, yc);
        let j = segment(&self.x_coords, xc);

        let ty = (yc - self.y_coords[i]) / (self.y_coords[i + 1] - self.y_coords[i]);
        let tx = (xc - self.x_coords[j]) / (self.x_coords[j + 1] - self.x_coords[j]);

        let v00 = self.data[[i, j]];
        let v01 = self.data[[i, j + 1]];
        let v10 = self.data[[i + 1, j]];
        let v11 = self.data[[i + 1, j + 1]];

        v00 * (1.0 - ty) * (1.0 - tx)
            + v01 * (1.0 - ty) * tx
            + v10 * ty * (1.0 - tx)
            + v11 * ty * tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn interp_linear_hits_samples_and_midpoints() {
        let xs = [400.0, 500.0, 600.0];
        let ys = [0.0, 1.0, 0.5];
        let out = interp_linear(&xs, &ys, &[400.0, 450.0, 550.0, 600.0]).unwrap();
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[1], 0.5);
        assert_relative_eq!(out[2], 0.75);
        assert_relative_eq!(out[3], 0.5);
    }

    #[test]
    fn interp_linear_clamps_outside() {
        let xs = [400.0, 500.0];
        let ys = [0.2, 0.8];
        let out = interp_linear(&xs, &ys, &[300.0, 700.0]).unwrap();
        assert_relative_eq!(out[0], 0.2);
        assert_relative_eq!(out[1], 0.8);
    }

    #[test]
    fn interp_linear_rejects_unsorted() {
        let xs = [500.0, 400.0];
        let ys = [0.0, 1.0];
        assert!(interp_linear(&xs, &ys, &[450.0]).is_err());
    }

    #[test]
    fn grid_interpolator_bilinear_center() {
        let data = array![[0.0, 1.0], [2.0, 3.0]];
        let interp = GridInterpolator::new(vec![0.0, 1.0], vec![0.0, 1.0], data).unwrap();
        assert_relative_eq!(interp.at(0.5, 0.5), 1.5);
        assert_relative_eq!(interp.at(0.0, 0.0), 0.0);
        assert_relative_eq!(interp.at(1.0, 1.0), 3.0);
    }

    #[test]
    fn grid_interpolator_clamps_at_border() {
        let data = array![[0.0, 1.0], [2.0, 3.0]];
        let interp = GridInterpolator::new(vec![0.0, 1.0], vec![0.0, 1.0], data).unwrap();
        assert_relative_eq!(interp.at(-5.0, -5.0), 0.0);
        assert_relative_eq!(interp.at(5.0, 5.0), 3.0);
    }

    #[test]
    fn grid_interpolator_shape_mismatch() {
        let data = array![[0.0, 1.0, 2.0]];
        assert!(GridInterpolator::new(vec![0.0, 1.0], vec![0.0], data).is_err());
    }
}
