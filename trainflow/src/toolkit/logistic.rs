//! Binary logistic regression with L1 or L2 regularization.
//!
//! The objective follows the usual `C`-weighted convention: minimize
//! `mean_log_loss + penalty(w) / (C * n)` where the intercept is never
//! penalized. It is solved with accelerated proximal gradient descent
//! (FISTA) using a fixed step of `1 / L`.

use crate::data::{read_json, write_json};
use crate::errors::{PipelineError, ToolkitError};
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Regularization penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    /// Lasso, `||w||_1`.
    L1,
    /// Ridge, `0.5 * ||w||_2^2`.
    L2,
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1 => write!(f, "l1"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

/// Optimization routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    /// Accelerated proximal gradient; supports both penalties.
    #[default]
    ProximalGradient,
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProximalGradient => write!(f, "proximal_gradient"),
        }
    }
}

/// One point of the hyperparameter grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength.
    #[serde(rename = "C")]
    pub c: f64,
    /// Penalty kind.
    pub penalty: Penalty,
    /// Solver.
    pub solver: Solver,
}

impl LogisticParams {
    /// Creates a parameter set.
    #[must_use]
    pub fn new(c: f64, penalty: Penalty, solver: Solver) -> Self {
        Self { c, penalty, solver }
    }
}

impl fmt::Display for LogisticParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C={}, penalty={}, solver={}", self.c, self.penalty, self.solver)
    }
}

/// Unfitted estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticRegression {
    params: LogisticParams,
    max_iter: usize,
    tol: f64,
}

impl LogisticRegression {
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITER: usize = 1000;
    /// Default convergence tolerance on the largest coefficient change.
    pub const DEFAULT_TOL: f64 = 1e-6;

    /// Creates an estimator with default iteration settings.
    #[must_use]
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            max_iter: Self::DEFAULT_MAX_ITER,
            tol: Self::DEFAULT_TOL,
        }
    }

    /// Sets the iteration cap.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the convergence tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// The hyperparameters.
    #[must_use]
    pub fn params(&self) -> LogisticParams {
        self.params
    }

    /// Fits the model on `x` and binary labels `y`.
    ///
    /// A training set containing a single class is accepted; the model then
    /// predicts that class everywhere.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError` on empty input, mismatched shapes, labels other
    /// than 0/1, or a non-positive `C`.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<u8>) -> Result<LogisticModel, ToolkitError> {
        let n = x.nrows();
        if n == 0 {
            return Err(ToolkitError::EmptyInput("cannot fit on zero rows".into()));
        }
        if y.len() != n {
            return Err(ToolkitError::ShapeMismatch(format!(
                "{n} feature rows but {} labels",
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&v| v > 1) {
            return Err(ToolkitError::InvalidParameter(format!("label {bad} is not 0 or 1")));
        }
        if !(self.params.c.is_finite() && self.params.c > 0.0) {
            return Err(ToolkitError::InvalidParameter(format!(
                "C must be positive and finite, got {}",
                self.params.c
            )));
        }

        #[allow(clippy::cast_precision_loss)]
        let n_f = n as f64;
        let targets = y.mapv(f64::from);
        let lambda = 1.0 / (self.params.c * n_f);

        let row_norms: f64 = x.iter().map(|v| v * v).sum::<f64>() / n_f;
        let mut lipschitz = 0.25 * (row_norms + 1.0);
        if self.params.penalty == Penalty::L2 {
            lipschitz += lambda;
        }
        let step = 1.0 / lipschitz;

        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;
        let mut v = w.clone();
        let mut vb = b;
        let mut t = 1.0_f64;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter {
            iterations += 1;

            let residual = (x.dot(&v) + vb).mapv(sigmoid) - &targets;
            let mut grad_w = x.t().dot(&residual) / n_f;
            let grad_b = residual.sum() / n_f;
            if self.params.penalty == Penalty::L2 {
                grad_w.scaled_add(lambda, &v);
            }

            let mut w_next = &v - &(grad_w * step);
            let b_next = vb - step * grad_b;
            if self.params.penalty == Penalty::L1 {
                let threshold = step * lambda;
                w_next.mapv_inplace(|value| soft_threshold(value, threshold));
            }

            let t_next = (1.0 + 4.0f64.mul_add(t * t, 1.0).sqrt()) / 2.0;
            let momentum = (t - 1.0) / t_next;

            let mut delta = (b_next - b).abs();
            Zip::from(&w_next).and(&w).for_each(|new, old| {
                delta = delta.max((new - old).abs());
            });

            v = &w_next + &((&w_next - &w) * momentum);
            vb = b_next + (b_next - b) * momentum;
            w = w_next;
            b = b_next;
            t = t_next;

            if delta < self.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::debug!(
                params = %self.params,
                max_iter = self.max_iter,
                "Logistic regression stopped at the iteration cap"
            );
        }

        Ok(LogisticModel {
            params: self.params,
            coefficients: w,
            intercept: b,
            iterations,
            converged,
        })
    }
}

/// A fitted logistic regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// Hyperparameters it was fitted with.
    pub params: LogisticParams,
    /// One weight per feature.
    pub coefficients: Array1<f64>,
    /// Bias term.
    pub intercept: f64,
    /// Iterations used.
    pub iterations: usize,
    /// Whether the tolerance was reached before the cap.
    pub converged: bool,
}

impl LogisticModel {
    /// Positive-class probability of every row.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::ShapeMismatch` if the feature count differs.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ToolkitError> {
        if x.ncols() != self.coefficients.len() {
            return Err(ToolkitError::ShapeMismatch(format!(
                "model has {} coefficients, input has {} features",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        Ok((x.dot(&self.coefficients) + self.intercept).mapv(sigmoid))
    }

    /// Predicted labels, positive when the probability is at least 0.5.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::ShapeMismatch` if the feature count differs.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>, ToolkitError> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p >= 0.5)))
    }

    /// Writes the model as JSON.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        write_json(path, self)
    }

    /// Reads a model written by [`LogisticModel::save`].
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file is unreadable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        read_json(path)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    value.signum() * (value.abs() - threshold).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn separable() -> (Array2<f64>, Array1<u8>) {
        (
            array![[-2.0, 0.1], [-1.5, -0.2], [-1.0, 0.0], [1.0, 0.1], [1.5, -0.1], [2.0, 0.2]],
            array![0, 0, 0, 1, 1, 1],
        )
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }

    #[test]
    fn test_fit_separates_classes() {
        let (x, y) = separable();
        for penalty in [Penalty::L1, Penalty::L2] {
            let model = LogisticRegression::new(LogisticParams::new(1.0, penalty, Solver::ProximalGradient))
                .fit(&x, &y)
                .unwrap();

            assert_eq!(model.predict(&x).unwrap(), y);
            assert!(model.coefficients[0] > 0.0);
        }
    }

    #[test]
    fn test_strong_l1_zeroes_weights() {
        let (x, y) = separable();
        let model = LogisticRegression::new(LogisticParams::new(0.001, Penalty::L1, Solver::ProximalGradient))
            .fit(&x, &y)
            .unwrap();

        assert!(model.coefficients.iter().all(|&w| w == 0.0));
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (p - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let est = LogisticRegression::new(LogisticParams::new(10.0, Penalty::L2, Solver::ProximalGradient));
        assert_eq!(est.fit(&x, &y).unwrap(), est.fit(&x, &y).unwrap());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let (x, y) = separable();
        let est = LogisticRegression::new(LogisticParams::new(1.0, Penalty::L2, Solver::ProximalGradient));

        assert!(matches!(
            est.fit(&x, &array![0, 1]),
            Err(ToolkitError::ShapeMismatch(_))
        ));
        assert!(matches!(
            est.fit(&x, &array![0, 0, 0, 1, 1, 2]),
            Err(ToolkitError::InvalidParameter(_))
        ));

        let zero_c = LogisticRegression::new(LogisticParams::new(0.0, Penalty::L2, Solver::ProximalGradient));
        assert!(zero_c.fit(&x, &y).is_err());
    }

    #[test]
    fn test_params_json_uses_capital_c() {
        let params = LogisticParams::new(0.1, Penalty::L1, Solver::ProximalGradient);
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"C": 0.1, "penalty": "l1", "solver": "proximal_gradient"})
        );
    }

    #[test]
    fn test_model_save_load() {
        let (x, y) = separable();
        let model = LogisticRegression::new(LogisticParams::new(1.0, Penalty::L2, Solver::ProximalGradient))
            .fit(&x, &y)
            .unwrap();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("models").join("model.json");

        model.save(&path).unwrap();
        let loaded = LogisticModel::load(&path).unwrap();

        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
        assert_eq!(loaded.params, model.params);
    }
}
