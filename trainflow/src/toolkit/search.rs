//! Exhaustive hyperparameter search scored by stratified k-fold accuracy.

use super::logistic::{LogisticModel, LogisticParams, LogisticRegression, Penalty, Solver};
use super::metrics::accuracy;
use crate::errors::ToolkitError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Candidate values for every hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    /// Inverse regularization strengths.
    #[serde(rename = "C", default = "default_c_values")]
    pub c_values: Vec<f64>,
    /// Penalties.
    #[serde(default = "default_penalties")]
    pub penalties: Vec<Penalty>,
    /// Solvers.
    #[serde(default = "default_solvers")]
    pub solvers: Vec<Solver>,
}

fn default_c_values() -> Vec<f64> {
    vec![0.001, 0.01, 0.1, 1.0, 10.0, 100.0]
}

fn default_penalties() -> Vec<Penalty> {
    vec![Penalty::L1, Penalty::L2]
}

fn default_solvers() -> Vec<Solver> {
    vec![Solver::ProximalGradient]
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            c_values: default_c_values(),
            penalties: default_penalties(),
            solvers: default_solvers(),
        }
    }
}

impl ParamGrid {
    /// Every combination, `C` varying slowest and solver fastest.
    #[must_use]
    pub fn candidates(&self) -> Vec<LogisticParams> {
        let mut out = Vec::with_capacity(self.len());
        for &c in &self.c_values {
            for &penalty in &self.penalties {
                for &solver in &self.solvers {
                    out.push(LogisticParams::new(c, penalty, solver));
                }
            }
        }
        out
    }

    /// Number of combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.c_values.len() * self.penalties.len() * self.solvers.len()
    }

    /// Returns true if any axis is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits row indices into `k` folds that preserve class proportions.
///
/// Rows are grouped by class (negatives first, each group in row order) and
/// dealt round-robin across the folds.
///
/// # Errors
///
/// Returns `ToolkitError::InvalidParameter` if `k < 2` or `k` exceeds the
/// number of rows.
pub fn stratified_folds(y: &Array1<u8>, k: usize) -> Result<Vec<Vec<usize>>, ToolkitError> {
    if k < 2 {
        return Err(ToolkitError::InvalidParameter(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if k > y.len() {
        return Err(ToolkitError::InvalidParameter(format!(
            "cannot make {k} folds from {} rows",
            y.len()
        )));
    }

    let mut folds = vec![Vec::new(); k];
    let ordered = (0..=1u8).flat_map(|class| {
        y.iter()
            .enumerate()
            .filter(move |&(_, &label)| label == class)
            .map(|(i, _)| i)
    });
    for (position, row) in ordered.enumerate() {
        folds[position % k].push(row);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Mean held-out accuracy of `estimator` over `folds`.
///
/// # Errors
///
/// Propagates fitting errors.
pub fn cross_val_score(
    estimator: &LogisticRegression,
    x: &Array2<f64>,
    y: &Array1<u8>,
    folds: &[Vec<usize>],
) -> Result<f64, ToolkitError> {
    let mut total = 0.0;
    for held_out in folds {
        let train: Vec<usize> = (0..y.len()).filter(|i| held_out.binary_search(i).is_err()).collect();

        let model = estimator.fit(&x.select(Axis(0), &train), &y.select(Axis(0), &train))?;
        let predicted = model.predict(&x.select(Axis(0), held_out))?;
        total += accuracy(&y.select(Axis(0), held_out), &predicted)?;
    }
    #[allow(clippy::cast_precision_loss)]
    Ok(total / folds.len() as f64)
}

/// Score of one grid candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// The candidate.
    pub params: LogisticParams,
    /// Mean cross-validated accuracy.
    pub mean_score: f64,
}

/// Outcome of a grid search.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchResult {
    /// Winning parameters.
    pub best_params: LogisticParams,
    /// Winning mean accuracy.
    pub best_score: f64,
    /// Every candidate in grid order.
    pub scores: Vec<CandidateScore>,
    /// Winner refitted on all rows.
    pub model: LogisticModel,
}

/// Grid search over logistic regression hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSearch {
    grid: ParamGrid,
    folds: usize,
    max_iter: usize,
}

impl GridSearch {
    /// Creates a search with the given fold count.
    #[must_use]
    pub fn new(grid: ParamGrid, folds: usize) -> Self {
        Self {
            grid,
            folds,
            max_iter: LogisticRegression::DEFAULT_MAX_ITER,
        }
    }

    /// Sets the iteration cap of every fit.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Scores every candidate on the same folds and refits the best.
    ///
    /// Ties go to the earliest candidate in grid order.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError` for an empty grid, bad fold count or a failed fit.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<u8>) -> Result<GridSearchResult, ToolkitError> {
        if self.grid.is_empty() {
            return Err(ToolkitError::InvalidParameter("hyperparameter grid is empty".into()));
        }
        let folds = stratified_folds(y, self.folds)?;

        let mut scores = Vec::with_capacity(self.grid.len());
        let mut best: Option<CandidateScore> = None;
        for params in self.grid.candidates() {
            let estimator = LogisticRegression::new(params).with_max_iter(self.max_iter);
            let mean_score = cross_val_score(&estimator, x, y, &folds)?;
            debug!(params = %params, mean_score, "Scored candidate");

            let candidate = CandidateScore { params, mean_score };
            if best.map_or(true, |b| mean_score > b.mean_score) {
                best = Some(candidate);
            }
            scores.push(candidate);
        }

        let best = best.ok_or_else(|| ToolkitError::InvalidParameter("hyperparameter grid is empty".into()))?;
        let model = LogisticRegression::new(best.params)
            .with_max_iter(self.max_iter)
            .fit(x, y)?;

        Ok(GridSearchResult {
            best_params: best.params,
            best_score: best.mean_score,
            scores,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<u8>) {
        let x = array![
            [-2.0, 0.3],
            [-1.8, -0.1],
            [-1.2, 0.4],
            [-0.9, -0.5],
            [-0.3, 0.2],
            [0.4, -0.3],
            [0.8, 0.1],
            [1.1, -0.2],
            [1.7, 0.5],
            [2.2, 0.0]
        ];
        let y = array![0, 0, 0, 0, 1, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_default_grid_order() {
        let grid = ParamGrid::default();
        let candidates = grid.candidates();

        assert_eq!(candidates.len(), 12);
        assert_eq!(candidates[0], LogisticParams::new(0.001, Penalty::L1, Solver::ProximalGradient));
        assert_eq!(candidates[1], LogisticParams::new(0.001, Penalty::L2, Solver::ProximalGradient));
        assert_eq!(candidates[11], LogisticParams::new(100.0, Penalty::L2, Solver::ProximalGradient));
    }

    #[test]
    fn test_stratified_folds_balance_classes() {
        let y = array![0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
        let folds = stratified_folds(&y, 5).unwrap();

        assert_eq!(folds.len(), 5);
        assert!(folds.iter().all(|f| f.len() == 2));
        let positive_folds = folds.iter().filter(|f| f.iter().any(|&i| y[i] == 1)).count();
        assert_eq!(positive_folds, 2);

        let mut all: Vec<usize> = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_folds_reject_bad_k() {
        let y = array![0, 1, 0];
        assert!(stratified_folds(&y, 1).is_err());
        assert!(stratified_folds(&y, 4).is_err());
    }

    #[test]
    fn test_best_score_dominates_every_candidate() {
        let (x, y) = data();
        let result = GridSearch::new(ParamGrid::default(), 5).fit(&x, &y).unwrap();

        assert_eq!(result.scores.len(), 12);
        assert!(result.scores.iter().all(|s| result.best_score >= s.mean_score));

        let first_best = result
            .scores
            .iter()
            .find(|s| s.mean_score == result.best_score)
            .unwrap();
        assert_eq!(first_best.params, result.best_params);
        assert_eq!(result.model.params, result.best_params);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let (x, y) = data();
        let grid = ParamGrid {
            c_values: vec![],
            ..ParamGrid::default()
        };
        assert!(GridSearch::new(grid, 5).fit(&x, &y).is_err());
    }

    #[test]
    fn test_grid_json_defaults() {
        let grid: ParamGrid = serde_json::from_str(r#"{"C": [1.0]}"#).unwrap();
        assert_eq!(grid.c_values, vec![1.0]);
        assert_eq!(grid.penalties, vec![Penalty::L1, Penalty::L2]);
        assert_eq!(grid.len(), 2);
    }
}
