//! Display transfer functions: scalar exponent or monotone lookup table.

use log::warn;

use crate::math::interp::interp_linear;

use super::RenderError;

/// A gamma lookup table mapping linear values in [0, 1] to encoded values.
///
/// The raw table may come from imperfect calibration data; non-monotone
/// entries are pruned with a warning rather than rejected, then both
/// directions interpolate linearly over the surviving samples.
#[derive(Debug, Clone)]
pub struct GammaTable {
    /// Linear-domain positions of the surviving samples, in [0, 1].
    xs: Vec<f64>,
    /// Encoded values, strictly increasing after repair.
    ys: Vec<f64>,
}

impl GammaTable {
    /// Build a table from uniformly spaced samples over [0, 1].
    pub fn new(values: Vec<f64>) -> Result<Self, RenderError> {
        if values.len() < 2 {
            return Err(RenderError::GammaTableTooSmall(values.len()));
        }

        let n = values.len();
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        let mut pruned = 0usize;
        for (i, &v) in values.iter().enumerate() {
            if ys.last().map_or(true, |&last| v > last) {
                xs.push(i as f64 / (n - 1) as f64);
                ys.push(v);
            } else {
                pruned += 1;
            }
        }
        if pruned > 0 {
            warn!("gamma table repaired: pruned {pruned} non-increasing of {n} entries");
        }
        if ys.len() < 2 {
            return Err(RenderError::GammaTableTooSmall(ys.len()));
        }
        Ok(Self { xs, ys })
    }

    /// Encode a linear value through the table.
    pub fn encode(&self, x: f64) -> f64 {
        interp_linear(&self.xs, &self.ys, &[x]).expect("table axes validated")[0]
    }

    /// Invert the table: encoded value back to linear.
    pub fn decode(&self, y: f64) -> f64 {
        interp_linear(&self.ys, &self.xs, &[y]).expect("table values strictly increasing")[0]
    }
}

/// Display transfer function.
#[derive(Debug, Clone)]
pub enum GammaCurve {
    /// `encode(x) = x^(1/gamma)`.
    Exponent(f64),
    Table(GammaTable),
}

impl GammaCurve {
    pub fn encode(&self, x: f64) -> f64 {
        match self {
            GammaCurve::Exponent(gamma) => x.max(0.0).powf(1.0 / gamma),
            GammaCurve::Table(table) => table.encode(x),
        }
    }

    pub fn decode(&self, y: f64) -> f64 {
        match self {
            GammaCurve::Exponent(gamma) => y.max(0.0).powf(*gamma),
            GammaCurve::Table(table) => table.decode(y),
        }
    }
}
