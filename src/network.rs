use ndarray::{Array2, ArrayView2, s};

use crate::{MlpError, Result};

/// Numerically stable logistic sigmoid.
///
/// Branches on the sign of the pre-activation so that large magnitudes
/// saturate toward 0/1 instead of overflowing `exp`.
pub fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

/// Prepends a ones column to `m`, the bias input of a layer.
fn with_bias_column(m: ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::ones((m.nrows(), m.ncols() + 1));
    out.slice_mut(s![.., 1..]).assign(&m);
    out
}

pub(crate) fn check(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(MlpError::ShapeMismatch {
            what,
            got,
            expected,
        })
    }
}

/// Validates the structural contract between the samples and both weight
/// matrices: `A` is H×(ne+1), `B` is ns×(H+1), column 0 being the bias.
fn check_net_shapes(
    x: ArrayView2<f64>,
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
) -> Result<()> {
    check("hidden weight columns", a.ncols(), x.ncols() + 1)?;
    check("output weight columns", b.ncols(), a.nrows() + 1)
}

/// Hidden and output activations for a batch. Shapes must already be checked.
fn activations(
    x: ArrayView2<f64>,
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
) -> (Array2<f64>, Array2<f64>) {
    let z = with_bias_column(x).dot(&a.t()).mapv(sigmoid);
    let y = with_bias_column(z.view()).dot(&b.t()).mapv(sigmoid);
    (z, y)
}

/// Computes the network output for a batch of samples.
///
/// Both layers apply the logistic sigmoid: the hidden activations are
/// `sigmoid([1 | X] · Aᵀ)` and the output is `sigmoid([1 | Z] · Bᵀ)`.
///
/// # Arguments
/// * `x` - Sample matrix, one row per example.
/// * `a` - Hidden weight matrix, H×(ne+1).
/// * `b` - Output weight matrix, ns×(H+1).
///
/// # Returns
/// The N×ns output matrix, every entry in the open interval (0, 1).
///
/// # Errors
/// Returns `MlpError::ShapeMismatch` if the weight shapes are inconsistent
/// with the samples or with each other.
pub fn forward(
    x: ArrayView2<f64>,
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
) -> Result<Array2<f64>> {
    check_net_shapes(x, a, b)?;
    Ok(activations(x, a, b).1)
}

/// Computes the loss gradient with respect to both weight matrices.
///
/// The forward pass is recomputed internally so callers can evaluate the
/// gradient at arbitrary trial weights. The returned pair is the exact
/// gradient of `(1/2N)·Σ (Y − D)²` and has the same shapes as `(a, b)`.
///
/// # Errors
/// Returns `MlpError::ShapeMismatch` if `d` does not match `x`'s row count or
/// `b`'s output dimensionality, or if the weight shapes are inconsistent.
pub fn gradient(
    x: ArrayView2<f64>,
    d: ArrayView2<f64>,
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
) -> Result<(Array2<f64>, Array2<f64>)> {
    check_net_shapes(x, a, b)?;
    check("target rows", d.nrows(), x.nrows())?;
    check("target columns", d.ncols(), b.nrows())?;

    let n = x.nrows() as f64;
    let (z, y) = activations(x, a, b);

    let err = &y - &d;
    let delta_out = err * y.mapv(|v| v * (1.0 - v));
    let grad_b = delta_out.t().dot(&with_bias_column(z.view())) / n;

    // Backpropagate the output delta, dropping the bias column: the bias has
    // no upstream hidden unit.
    let back = delta_out.dot(&b);
    let delta_hidden = &back.slice(s![.., 1..]) * &z.mapv(|v| v * (1.0 - v));
    let grad_a = delta_hidden.t().dot(&with_bias_column(x)) / n;

    Ok((grad_a, grad_b))
}

/// Mean of the squared per-entry errors over all examples and output units.
pub fn mean_squared_error(y: ArrayView2<f64>, d: ArrayView2<f64>) -> f64 {
    (&y - &d).mapv(|e| e.powi(2)).mean().unwrap_or_default()
}
