//! Statistical routines used by the transform, train and evaluate stages.
//!
//! Everything here is deterministic for a given input and seed, and works on
//! `ndarray` matrices with one row per sample.

mod logistic;
mod metrics;
mod scaler;
mod search;
mod split;

pub use logistic::{LogisticModel, LogisticParams, LogisticRegression, Penalty, Solver};
pub use metrics::{accuracy, roc_auc, ClassificationMetrics, ConfusionMatrix};
pub use scaler::StandardScaler;
pub use search::{cross_val_score, stratified_folds, CandidateScore, GridSearch, GridSearchResult, ParamGrid};
pub use split::{train_test_split, Split};
