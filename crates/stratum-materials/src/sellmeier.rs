//! Closed-form Sellmeier dispersion for transparent dielectrics.
//!
//! $$n^2(\lambda) = A + \sum_i \frac{B_i \lambda^2}{\lambda^2 - C_i}$$
//!
//! with $\lambda$ in micrometres and $C_i$ in µm². These are the default
//! `SiO2` and `TiO2` entries of the registry: they are lossless, smooth and
//! valid over the full visible and near-infrared.

use num_complex::Complex64;

use crate::provider::{MaterialError, MaterialProvider};

/// A Sellmeier medium. The returned index is purely real.
#[derive(Debug, Clone)]
pub struct SellmeierMaterial {
    name: String,
    constant: f64,
    /// `(B_i, C_i)` pairs.
    terms: Vec<(f64, f64)>,
    range_nm: (f64, f64),
}

impl SellmeierMaterial {
    pub fn new(
        name: impl Into<String>,
        constant: f64,
        terms: Vec<(f64, f64)>,
        range_nm: (f64, f64),
    ) -> Self {
        Self {
            name: name.into(),
            constant,
            terms,
            range_nm,
        }
    }

    /// Fused silica, I. H. Malitson, *J. Opt. Soc. Am.* **55**, 1205 (1965).
    pub fn fused_silica() -> Self {
        Self::new(
            "SiO2",
            1.0,
            vec![
                (0.696_166_3, 0.068_404_3_f64.powi(2)),
                (0.407_942_6, 0.116_241_4_f64.powi(2)),
                (0.897_479_4, 9.896_161_f64.powi(2)),
            ],
            (210.0, 6700.0),
        )
    }

    /// Rutile TiO₂ ordinary ray, J. R. DeVore, *J. Opt. Soc. Am.* **41**, 416 (1951).
    ///
    /// DeVore's $5.913 + 0.2441/(\lambda^2 - 0.0803)$ rewritten in the
    /// single-term Sellmeier form.
    pub fn rutile() -> Self {
        let c = 0.0803;
        let b = 0.2441 / c;
        Self::new("TiO2", 5.913 - b, vec![(b, c)], (430.0, 1530.0))
    }
}

impl MaterialProvider for SellmeierMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        self.range_nm
    }

    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        self.check_range(wavelength_nm)?;
        let lam2 = (wavelength_nm * 1e-3).powi(2);
        let n_sq = self
            .terms
            .iter()
            .fold(self.constant, |acc, &(b, c)| acc + b * lam2 / (lam2 - c));
        Ok(Complex64::new(n_sq.sqrt(), 0.0))
    }
}
