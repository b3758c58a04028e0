use log::debug;
use ndarray::{Array2, ArrayView2};
use ndarray_rand::RandomExt;
use rand::{Rng, distr::StandardUniform};

use crate::{
    Result,
    network::{check, forward, gradient, mean_squared_error},
    optimization::line_search,
};

/// Training stops once the mean squared error drops to this.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-5;

/// Why a training run stopped. Both are successful terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The error dropped below the convergence threshold.
    Converged,
    /// The iteration budget ran out first.
    IterationBudget,
}

/// Outcome of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub termination: Termination,
    pub iterations: usize,
    /// Network output for the training samples at the final weights.
    pub output: Array2<f64>,
}

/// A single training run.
///
/// The session owns the samples, the targets, both weight matrices, the
/// random number generator and the error history; nothing about a run lives
/// outside it. The line search only ever sees read-only views of the weights
/// and works on trial copies.
pub struct TrainingSession<R: Rng> {
    x: Array2<f64>,
    d: Array2<f64>,
    a: Array2<f64>,
    b: Array2<f64>,
    iter_max: usize,
    history: Vec<f64>,
    rng: R,
}

impl<R: Rng> TrainingSession<R> {
    /// Creates a session over one batch of samples and targets.
    ///
    /// # Arguments
    /// * `x` - Sample matrix, one row per example.
    /// * `d` - Target matrix, one row per example.
    /// * `hidden_units` - Number of hidden units (H).
    /// * `iter_max` - Iteration budget for `run`.
    /// * `initial_weights` - Pinned `(A, B)` matrices, or `None` to draw them
    ///   uniformly from [0, 1) with the shapes H×(ne+1) and ns×(H+1).
    /// * `rng` - Source of randomness for the weight draw and the line search.
    ///
    /// # Errors
    /// Returns a shape error if `d`'s row count differs from `x`'s, or if
    /// pinned initial weights do not match the dimensions above.
    pub fn new(
        x: Array2<f64>,
        d: Array2<f64>,
        hidden_units: usize,
        iter_max: usize,
        initial_weights: Option<(Array2<f64>, Array2<f64>)>,
        mut rng: R,
    ) -> Result<Self> {
        check("target rows", d.nrows(), x.nrows())?;

        let (a, b) = match initial_weights {
            Some((a, b)) => {
                check("hidden weight rows", a.nrows(), hidden_units)?;
                check("hidden weight columns", a.ncols(), x.ncols() + 1)?;
                check("output weight rows", b.nrows(), d.ncols())?;
                check("output weight columns", b.ncols(), hidden_units + 1)?;
                (a, b)
            }
            None => (
                Array2::random_using((hidden_units, x.ncols() + 1), StandardUniform, &mut rng),
                Array2::random_using((d.ncols(), hidden_units + 1), StandardUniform, &mut rng),
            ),
        };

        let y = forward(x.view(), a.view(), b.view())?;
        let history = vec![mean_squared_error(y.view(), d.view())];

        Ok(Self {
            x,
            d,
            a,
            b,
            iter_max,
            history,
            rng,
        })
    }

    /// Runs gradient descent until the error converges or the iteration
    /// budget is spent.
    ///
    /// Each iteration computes the gradient at the current weights, finds the
    /// step size by line search, applies the step and re-evaluates the error,
    /// appending it to the history.
    ///
    /// # Errors
    /// Propagates a line-search bracketing failure; shape errors cannot occur
    /// past construction.
    pub fn run(&mut self) -> Result<TrainReport> {
        let mut error = self.history[self.history.len() - 1];
        let mut iterations = 0;

        while error > CONVERGENCE_THRESHOLD && iterations < self.iter_max {
            iterations += 1;

            let (grad_a, grad_b) =
                gradient(self.x.view(), self.d.view(), self.a.view(), self.b.view())?;
            let alpha = line_search(
                self.x.view(),
                self.d.view(),
                self.a.view(),
                self.b.view(),
                grad_a.view(),
                grad_b.view(),
                &mut self.rng,
            )?;

            self.a.scaled_add(-alpha, &grad_a);
            self.b.scaled_add(-alpha, &grad_b);

            let y = forward(self.x.view(), self.a.view(), self.b.view())?;
            error = mean_squared_error(y.view(), self.d.view());
            self.history.push(error);
            debug!("iteration {iterations}: error={error:.3e} step={alpha:.6}");
        }

        let termination = if error <= CONVERGENCE_THRESHOLD {
            Termination::Converged
        } else {
            Termination::IterationBudget
        };
        let output = forward(self.x.view(), self.a.view(), self.b.view())?;

        Ok(TrainReport {
            termination,
            iterations,
            output,
        })
    }

    /// Views of the current weight matrices.
    pub fn weights(&self) -> (ArrayView2<'_, f64>, ArrayView2<'_, f64>) {
        (self.a.view(), self.b.view())
    }

    /// Error history, one entry per iteration including iteration 0.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Most recent mean squared error.
    pub fn final_error(&self) -> f64 {
        self.history[self.history.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::MlpError;

    fn xor_data() -> (Array2<f64>, Array2<f64>) {
        let x = Array2::from_shape_vec(
            (4, 2),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        let d = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        (x, d)
    }

    #[test]
    fn history_has_one_entry_per_iteration_plus_start() {
        let (x, d) = xor_data();
        let mut session =
            TrainingSession::new(x, d, 3, 5, None, StdRng::seed_from_u64(5)).unwrap();
        let report = session.run().unwrap();
        assert_eq!(session.history().len(), report.iterations + 1);
    }

    #[test]
    fn history_is_monotone_non_increasing() {
        let (x, d) = xor_data();
        let mut session =
            TrainingSession::new(x, d, 3, 30, None, StdRng::seed_from_u64(6)).unwrap();
        session.run().unwrap();
        for pair in session.history().windows(2) {
            assert!(pair[1] <= pair[0], "error rose from {} to {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn budget_exhaustion_is_reported_as_such() {
        let (x, d) = xor_data();
        let mut session =
            TrainingSession::new(x, d, 3, 2, None, StdRng::seed_from_u64(7)).unwrap();
        let report = session.run().unwrap();
        assert_eq!(report.termination, Termination::IterationBudget);
        assert_eq!(report.iterations, 2);
    }

    #[test]
    fn already_converged_session_stops_immediately() {
        let (x, _) = xor_data();
        let a = Array2::from_elem((3, 3), 0.3);
        let b = Array2::from_elem((1, 4), 0.7);
        // Using the initial output as the target makes the starting error zero.
        let d = crate::network::forward(x.view(), a.view(), b.view()).unwrap();
        let mut session =
            TrainingSession::new(x, d, 3, 10, Some((a, b)), StdRng::seed_from_u64(8)).unwrap();
        let report = session.run().unwrap();
        assert_eq!(report.termination, Termination::Converged);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn random_init_takes_the_documented_shapes() {
        let (x, d) = xor_data();
        let session =
            TrainingSession::new(x, d, 4, 0, None, StdRng::seed_from_u64(9)).unwrap();
        let (a, b) = session.weights();
        assert_eq!(a.dim(), (4, 3));
        assert_eq!(b.dim(), (1, 5));
    }

    #[test]
    fn pinned_weights_are_shape_checked() {
        let (x, d) = xor_data();
        let a = Array2::zeros((3, 3));
        let b = Array2::zeros((1, 3));
        let err = match TrainingSession::new(x, d, 3, 0, Some((a, b)), StdRng::seed_from_u64(10)) {
            Ok(_) => panic!("mismatched output weights were accepted"),
            Err(e) => e,
        };
        assert_eq!(
            err,
            MlpError::ShapeMismatch {
                what: "output weight columns",
                got: 3,
                expected: 4,
            }
        );
    }
}
