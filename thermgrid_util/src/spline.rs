//! Tensor-product spline upsampling.
//!
//! Knots sit at the integer row and column indices of the source grid, and
//! each axis has its own degree: `kx` along the rows, `ky` along the columns.
//! Without a penalty every axis is a clamped B-spline interpolant whose
//! interior knots follow FITPACK: on data points for odd degrees (not-a-knot
//! for cubics), between them for even ones. Polynomials up to the axis degree
//! are reproduced exactly, at and between the knots.
//!
//! A positive `penalty` switches both axes to Reinsch's natural cubic
//! smoothing spline, minimising `sum (y - g)^2 + penalty * integral g''^2`.
//! It is a weight on curvature, not a bound on the residual sum of squares.

use crate::{Error, Grid, Result, Stats, Unit};

pub const MAX_DEGREE: u8 = 5;

const MAX_ORDER: usize = MAX_DEGREE as usize + 1;

/// Spline degree of one axis, `1..=MAX_DEGREE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Degree(u8);

impl Degree {
    pub const LINEAR: Degree = Degree(1);
    pub const CUBIC: Degree = Degree(3);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Degree {
    fn default() -> Self {
        Degree::CUBIC
    }
}

impl TryFrom<u8> for Degree {
    type Error = Error;

    fn try_from(degree: u8) -> Result<Self> {
        match degree {
            1..=MAX_DEGREE => Ok(Degree(degree)),
            other => Err(Error::UnsupportedDegree(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplineConfig {
    /// Degree along the row index.
    pub kx: Degree,
    /// Degree along the column index.
    pub ky: Degree,
    /// Reinsch curvature weight. Zero interpolates.
    pub penalty: f64,
}

impl SplineConfig {
    pub fn new(kx: u8, ky: u8, penalty: f64) -> Result<Self> {
        let config = Self {
            kx: Degree::try_from(kx)?,
            ky: Degree::try_from(ky)?,
            penalty,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.penalty.is_finite() && self.penalty >= 0.0) {
            return Err(Error::InvalidPenalty(self.penalty));
        }
        // Smoothing splines are cubic on both axes.
        if self.penalty > 0.0 && (self.kx != Degree::CUBIC || self.ky != Degree::CUBIC) {
            return Err(Error::InvalidPenalty(self.penalty));
        }
        Ok(())
    }

    fn check_axes(&self, rows: usize, cols: usize) -> Result<()> {
        for (degree, points) in [(self.kx, rows), (self.ky, cols)] {
            if usize::from(degree.get()) >= points {
                return Err(Error::DegreeExceedsGrid {
                    degree: degree.get(),
                    points,
                });
            }
        }
        Ok(())
    }
}

/// One-axis fit over knots 0, 1, .., K-1.
enum AxisFit<const K: usize> {
    Interpolant(Interpolant<K>),
    Smoother(Smoother<K>),
}

impl<const K: usize> AxisFit<K> {
    fn fit(y: &[f64; K], degree: Degree, penalty: f64) -> Self {
        if penalty > 0.0 {
            AxisFit::Smoother(Smoother::fit(y, penalty))
        } else {
            AxisFit::Interpolant(Interpolant::fit(y, usize::from(degree.get())))
        }
    }

    fn eval(&self, x: f64) -> f64 {
        match self {
            AxisFit::Interpolant(s) => s.eval(x),
            AxisFit::Smoother(s) => s.eval(x),
        }
    }
}

/// Clamped B-spline of degree `k < K` through every data point.
struct Interpolant<const K: usize> {
    degree: usize,
    /// The `K - k - 1` interior knots; the rest are unused.
    interior: [f64; K],
    coeffs: [f64; K],
}

impl<const K: usize> Interpolant<K> {
    fn fit(y: &[f64; K], degree: usize) -> Self {
        let mut interior = [0.0; K];
        for (j, t) in interior[..K - degree - 1].iter_mut().enumerate() {
            *t = if degree % 2 == 1 {
                (j + (degree + 1) / 2) as f64
            } else {
                (j + degree / 2) as f64 + 0.5
            };
        }
        let mut spline = Self {
            degree,
            interior,
            coeffs: [0.0; K],
        };

        let mut a = [[0.0; K]; K];
        for (i, row) in a.iter_mut().enumerate() {
            let (first, basis) = spline.basis(i as f64);
            row[first..=first + degree].copy_from_slice(&basis[..=degree]);
        }
        let mut b = *y;
        spline.coeffs = solve(&mut a, &mut b, K);
        spline
    }

    /// Full knot vector: `k + 1` copies of each end around the interior knots.
    fn knot(&self, i: usize) -> f64 {
        if i <= self.degree {
            0.0
        } else if i >= K {
            (K - 1) as f64
        } else {
            self.interior[i - self.degree - 1]
        }
    }

    /// Index of the first basis function that is nonzero at `x`, and the
    /// `k + 1` nonzero values (Cox-de Boor).
    fn basis(&self, x: f64) -> (usize, [f64; MAX_ORDER]) {
        let k = self.degree;
        let mut span = k;
        while span + 1 < K && self.knot(span + 1) <= x {
            span += 1;
        }

        let mut n = [0.0; MAX_ORDER];
        let mut left = [0.0; MAX_ORDER];
        let mut right = [0.0; MAX_ORDER];
        n[0] = 1.0;
        for j in 1..=k {
            left[j] = x - self.knot(span + 1 - j);
            right[j] = self.knot(span + j) - x;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = n[r] / (right[r + 1] + left[j - r]);
                n[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            n[j] = saved;
        }
        (span - k, n)
    }

    fn eval(&self, x: f64) -> f64 {
        let (first, n) = self.basis(x);
        n[..=self.degree]
            .iter()
            .zip(&self.coeffs[first..])
            .map(|(b, c)| b * c)
            .sum()
    }
}

/// Natural cubic smoothing spline, as knot values plus second derivatives.
struct Smoother<const K: usize> {
    values: [f64; K],
    second: [f64; K],
}

impl<const K: usize> Smoother<K> {
    fn fit(y: &[f64; K], lambda: f64) -> Self {
        // Unknowns are the second derivatives at the K-2 interior knots; the
        // natural end conditions pin both boundary ones to zero.
        let m = K - 2;
        let mut a = [[0.0; K]; K];
        let mut rhs = [0.0; K];
        for i in 0..m {
            a[i][i] = 2.0 / 3.0 + 6.0 * lambda;
            if i + 1 < m {
                a[i][i + 1] = 1.0 / 6.0 - 4.0 * lambda;
                a[i + 1][i] = a[i][i + 1];
            }
            if i + 2 < m {
                a[i][i + 2] = lambda;
                a[i + 2][i] = lambda;
            }
            rhs[i] = y[i] - 2.0 * y[i + 1] + y[i + 2];
        }

        let gamma = solve(&mut a, &mut rhs, m);
        let mut second = [0.0; K];
        second[1..=m].copy_from_slice(&gamma[..m]);

        let mut values = [0.0; K];
        for (i, v) in values.iter_mut().enumerate() {
            let prev = if i > 0 { second[i - 1] } else { 0.0 };
            let next = if i + 1 < K { second[i + 1] } else { 0.0 };
            *v = y[i] - lambda * (prev - 2.0 * second[i] + next);
        }
        Self { values, second }
    }

    fn eval(&self, x: f64) -> f64 {
        let i = (x as usize).min(K - 2);
        let t = x - i as f64;
        let u = 1.0 - t;
        u * self.values[i]
            + t * self.values[i + 1]
            + ((u * u * u - u) * self.second[i] + (t * t * t - t) * self.second[i + 1]) / 6.0
    }
}

fn magnitude(v: f64) -> f64 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}

/// Gaussian elimination with partial pivoting on the leading `n` x `n` block.
fn solve<const K: usize>(a: &mut [[f64; K]; K], b: &mut [f64; K], n: usize) -> [f64; K] {
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if magnitude(a[row][col]) > magnitude(a[pivot][col]) {
                pivot = row;
            }
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; K];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x
}

/// `N` evenly spaced points covering `[0, last]`, both ends included.
fn sample_points<const N: usize>(last: f64) -> [f64; N] {
    let mut points = [0.0; N];
    if N > 1 {
        for (k, p) in points.iter_mut().enumerate() {
            *p = last * k as f64 / (N - 1) as f64;
        }
        points[N - 1] = last;
    }
    points
}

/// Resamples an `H` x `W` grid onto `N` x `N` points spanning the source indices.
pub fn interpolate<const H: usize, const W: usize, const N: usize>(
    values: &[[f64; W]; H],
    config: &SplineConfig,
) -> Result<[[f64; N]; N]> {
    config.validate()?;
    if H == 0 || W == 0 || N == 0 {
        return Err(Error::EmptyGrid);
    }
    config.check_axes(H, W)?;

    let cols = sample_points::<N>((W - 1) as f64);
    let rows = sample_points::<N>((H - 1) as f64);

    let mut along_cols = [[0.0; N]; H];
    for (src, dst) in values.iter().zip(along_cols.iter_mut()) {
        let spline = AxisFit::fit(src, config.ky, config.penalty);
        for (v, &x) in dst.iter_mut().zip(&cols) {
            *v = spline.eval(x);
        }
    }

    let mut out = [[0.0; N]; N];
    for k in 0..N {
        let mut column = [0.0; H];
        for (v, row) in column.iter_mut().zip(&along_cols) {
            *v = row[k];
        }
        let spline = AxisFit::fit(&column, config.kx, config.penalty);
        for (out_row, &y) in out.iter_mut().zip(&rows) {
            out_row[k] = spline.eval(y);
        }
    }
    Ok(out)
}

/// Upsampled grid, in the unit of the grid it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedGrid<const N: usize> {
    values: [[f64; N]; N],
    unit: Unit,
}

impl<const N: usize> InterpolatedGrid<N> {
    pub fn resample<const H: usize, const W: usize>(
        values: &[[f64; W]; H],
        unit: Unit,
        config: &SplineConfig,
    ) -> Result<Self> {
        Ok(Self {
            values: interpolate(values, config)?,
            unit,
        })
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn values(&self) -> &[[f64; N]; N] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn stats(&self) -> Stats {
        Stats::from_values(self.values.iter().flat_map(|row| row.iter().copied()))
    }

    /// Celsius grid re-expressed in Fahrenheit on the exact 1.8 scale.
    pub fn to_fahrenheit(&self) -> Option<Self> {
        if self.unit != Unit::Celsius {
            return None;
        }
        let mut values = self.values;
        for v in values.iter_mut().flat_map(|row| row.iter_mut()) {
            *v = crate::deg_c_to_f(*v);
        }
        Some(Self {
            values,
            unit: Unit::Fahrenheit,
        })
    }
}

impl<const H: usize, const W: usize> Grid<H, W> {
    pub fn interpolate<const N: usize>(
        &self,
        unit: Unit,
        config: &SplineConfig,
    ) -> Result<InterpolatedGrid<N>> {
        InterpolatedGrid::resample(&self.view(unit).to_array(), unit, config)
    }
}
