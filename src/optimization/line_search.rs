use log::debug;
use ndarray::ArrayView2;
use rand::Rng;

use crate::{MlpError, Result, network::gradient};

/// Bisection stops once the directional derivative magnitude drops below this.
pub const DERIVATIVE_TOLERANCE: f64 = 1e-5;

/// Bracketing gives up after this many doublings of the upper bound. The
/// derivative can stay negative indefinitely when the sigmoids saturate and
/// the gradient vanishes along the ray.
const MAX_DOUBLINGS: u32 = 60;

/// Directional derivative of the loss at the trial point `(a − α·dA, b − α·dB)`
/// along the descent direction `−(dA, dB)`.
///
/// The gradient is re-evaluated at fresh trial copies; the caller's weight
/// matrices are never touched. The dot product is taken per matrix and
/// summed, which equals the dot product of the stacked flattened vectors.
fn derivative_along(
    alpha: f64,
    x: ArrayView2<f64>,
    d: ArrayView2<f64>,
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    grad_a: ArrayView2<f64>,
    grad_b: ArrayView2<f64>,
) -> Result<f64> {
    let trial_a = &a - &(&grad_a * alpha);
    let trial_b = &b - &(&grad_b * alpha);
    let (ga, gb) = gradient(x, d, trial_a.view(), trial_b.view())?;
    Ok(-((&ga * &grad_a).sum() + (&gb * &grad_b).sum()))
}

/// Finds the step size that zeroes the directional derivative of the loss
/// along `−(grad_a, grad_b)`, by bracketing the sign change and bisecting it.
///
/// Bracketing starts from a random upper bound in (0, 1) and doubles it while
/// the derivative is still negative there (the minimizer lies further out).
/// Bisection then halves the bracket for at most `ceil(ln(width/tolerance))`
/// steps, or until the derivative magnitude is within tolerance.
///
/// # Returns
/// The step size, valid only for the `(x, d, a, b)` snapshot that produced
/// `(grad_a, grad_b)`.
///
/// # Errors
/// `MlpError::BracketingFailed` if no sign change appears within the doubling
/// budget; shape errors propagate from the gradient evaluations.
pub fn line_search<R: Rng>(
    x: ArrayView2<f64>,
    d: ArrayView2<f64>,
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    grad_a: ArrayView2<f64>,
    grad_b: ArrayView2<f64>,
    rng: &mut R,
) -> Result<f64> {
    let mut lower = 0.0;
    let mut upper = rng.random_range(f64::EPSILON..1.0);
    let mut doublings = 0;

    while derivative_along(upper, x, d, a, b, grad_a, grad_b)? < 0.0 {
        doublings += 1;
        if doublings > MAX_DOUBLINGS {
            return Err(MlpError::BracketingFailed { upper, doublings });
        }
        upper *= 2.0;
    }

    let budget = ((upper - lower) / DERIVATIVE_TOLERANCE).ln().ceil() as u32;
    let mut mid = (lower + upper) / 2.0;
    let mut h_mid = derivative_along(mid, x, d, a, b, grad_a, grad_b)?;
    let mut steps = 0;

    while steps < budget && h_mid.abs() > DERIVATIVE_TOLERANCE {
        steps += 1;
        if h_mid > 0.0 {
            upper = mid;
        } else {
            lower = mid;
        }
        mid = (lower + upper) / 2.0;
        h_mid = derivative_along(mid, x, d, a, b, grad_a, grad_b)?;
    }

    debug!("line search: step={mid:.6} derivative={h_mid:.3e} bisections={steps}");
    Ok(mid)
}
