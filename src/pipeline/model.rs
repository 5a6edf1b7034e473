//! Per-question multinomial logistic regression
//!
//! Each opinion question gets its own softmax classifier mapping the encoded
//! demographic vector to a distribution over that question's observed answer
//! labels. Fitting minimises the L2-penalised negative log-likelihood
//!
//! ```text
//! sum_i -log p(y_i | x_i)  +  1 / (2C) * sum_k ||w_k||^2
//! ```
//!
//! with a damped Newton method. Intercepts are not penalised. The softmax
//! parameterisation is redundant along "add the same constant to every
//! intercept", so a tiny ridge keeps the Hessian invertible there; the
//! gradient has no component along that direction, so the fit is unaffected.

use faer::prelude::*;
use faer::Mat;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::encoder::FeatureMatrix;
use super::error::{PostStratError, Result};

/// Ridge added to intercept diagonals of the Hessian
const INTERCEPT_RIDGE: f64 = 1e-8;

/// Armijo sufficient-decrease constant for the line search
const ARMIJO: f64 = 1e-4;

/// Maximum step halvings per Newton iteration
const MAX_HALVINGS: usize = 40;

/// Fitting parameters shared by every question model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Inverse L2 regularisation strength (larger = weaker penalty)
    pub regularization: f64,
    pub max_iterations: usize,
    /// Convergence tolerance on the gradient max-norm and relative objective change
    pub tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            regularization: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

/// Coefficients of one answer class, for reporting
#[derive(Debug, Clone, Serialize)]
pub struct ClassCoefficients {
    pub class: String,
    pub intercept: f64,
    pub weights: Vec<(String, f64)>,
}

/// A fitted classifier for one question. Immutable once fitted.
#[derive(Debug, Clone)]
pub struct QuestionModel {
    question: String,
    classes: Vec<String>,
    feature_names: Vec<String>,
    intercepts: Vec<f64>,
    /// classes x features
    weights: Mat<f64>,
    training_rows: usize,
    iterations: usize,
    converged: bool,
}

impl QuestionModel {
    /// Fit a model on encoded features and one label per row.
    ///
    /// Classes are the distinct labels, sorted lexicographically.
    pub fn fit(
        question: &str,
        features: &FeatureMatrix,
        labels: &[String],
        config: &ModelConfig,
    ) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(PostStratError::ShapeMismatch(format!(
                "question '{}': {} feature rows but {} labels",
                question,
                features.nrows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(PostStratError::InsufficientData(format!(
                "question '{}' has no labelled rows to fit on",
                question
            )));
        }
        if !(config.regularization > 0.0 && config.regularization.is_finite()) {
            return Err(PostStratError::Config(format!(
                "regularization must be a positive finite number, got {}",
                config.regularization
            )));
        }
        if let Some((row, feature)) = features.first_non_finite() {
            return Err(PostStratError::NonFiniteFeature {
                row,
                feature: feature.to_string(),
            });
        }

        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();

        let targets: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or(0))
            .collect();

        let design: Vec<Vec<f64>> = (0..features.nrows())
            .map(|i| {
                let mut row = Vec::with_capacity(features.ncols() + 1);
                row.push(1.0);
                row.extend(features.row(i));
                row
            })
            .collect();

        let problem = SoftmaxProblem {
            design: &design,
            targets: &targets,
            n_classes: classes.len(),
            dim: features.ncols() + 1,
            penalty: 1.0 / config.regularization,
        };

        let (theta, iterations, converged) = problem.minimize(config);
        if !converged {
            warn!(
                "Model for '{}' did not converge within {} iterations",
                question, config.max_iterations
            );
        }

        let p = features.ncols();
        let mut intercepts = vec![0.0; classes.len()];
        let mut weights = Mat::<f64>::zeros(classes.len(), p);
        for k in 0..classes.len() {
            intercepts[k] = theta[k * (p + 1)];
            for j in 0..p {
                weights[(k, j)] = theta[k * (p + 1) + 1 + j];
            }
        }

        debug!(
            "Fitted '{}' on {} rows, {} classes, {} iterations",
            question,
            labels.len(),
            classes.len(),
            iterations
        );

        Ok(Self {
            question: question.to_string(),
            classes,
            feature_names: features.feature_names().to_vec(),
            intercepts,
            weights,
            training_rows: labels.len(),
            iterations,
            converged,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Answer labels in model order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn class_index(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Probability of each class for one feature vector, in class order.
    ///
    /// Any finite vector is accepted, including ones far outside the
    /// training data; that is extrapolation, not an error.
    pub fn predict_distribution(&self, features: &[f64]) -> Result<Vec<(String, f64)>> {
        if features.len() != self.feature_names.len() {
            return Err(PostStratError::ShapeMismatch(format!(
                "model for '{}' expects {} features, got {}",
                self.question,
                self.feature_names.len(),
                features.len()
            )));
        }
        if let Some(j) = features.iter().position(|v| !v.is_finite()) {
            return Err(PostStratError::NonFiniteFeature {
                row: 0,
                feature: self.feature_names[j].clone(),
            });
        }
        let probs = self.class_probabilities(features);
        Ok(self.classes.iter().cloned().zip(probs).collect())
    }

    /// Probability matrix (rows x classes) for a batch of encoded rows.
    ///
    /// The batch must use the same feature layout the model was fitted on.
    pub fn predict_proba(&self, features: &FeatureMatrix) -> Result<Mat<f64>> {
        if features.feature_names() != self.feature_names.as_slice() {
            return Err(PostStratError::ShapeMismatch(format!(
                "feature layout {:?} does not match the layout {:?} the model for '{}' was fitted on",
                features.feature_names(),
                self.feature_names,
                self.question
            )));
        }
        if let Some((row, feature)) = features.first_non_finite() {
            return Err(PostStratError::NonFiniteFeature {
                row,
                feature: feature.to_string(),
            });
        }

        let mut out = Mat::<f64>::zeros(features.nrows(), self.classes.len());
        for i in 0..features.nrows() {
            let probs = self.class_probabilities(&features.row(i));
            for (k, p) in probs.into_iter().enumerate() {
                out[(i, k)] = p;
            }
        }
        Ok(out)
    }

    /// Per-class intercept and feature weights
    pub fn coefficients(&self) -> Vec<ClassCoefficients> {
        self.classes
            .iter()
            .enumerate()
            .map(|(k, class)| ClassCoefficients {
                class: class.clone(),
                intercept: self.intercepts[k],
                weights: self
                    .feature_names
                    .iter()
                    .enumerate()
                    .map(|(j, name)| (name.clone(), self.weights[(k, j)]))
                    .collect(),
            })
            .collect()
    }

    fn class_probabilities(&self, x: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = (0..self.classes.len())
            .map(|k| {
                self.intercepts[k]
                    + x.iter()
                        .enumerate()
                        .map(|(j, v)| self.weights[(k, j)] * v)
                        .sum::<f64>()
            })
            .collect();
        softmax(&scores)
    }
}

/// Numerically stable softmax
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn log_sum_exp(scores: &[f64]) -> f64 {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    max + scores.iter().map(|s| (s - max).exp()).sum::<f64>().ln()
}

/// Penalised softmax regression objective over an intercept-augmented design
struct SoftmaxProblem<'a> {
    design: &'a [Vec<f64>],
    targets: &'a [usize],
    n_classes: usize,
    /// Parameters per class, intercept included
    dim: usize,
    penalty: f64,
}

impl SoftmaxProblem<'_> {
    fn scores(&self, theta: &[f64], x: &[f64]) -> Vec<f64> {
        (0..self.n_classes)
            .map(|k| {
                let block = &theta[k * self.dim..(k + 1) * self.dim];
                block.iter().zip(x).map(|(b, v)| b * v).sum()
            })
            .collect()
    }

    fn objective(&self, theta: &[f64]) -> f64 {
        let nll: f64 = self
            .design
            .iter()
            .zip(self.targets)
            .map(|(x, &y)| {
                let s = self.scores(theta, x);
                log_sum_exp(&s) - s[y]
            })
            .sum();

        let ridge: f64 = (0..self.n_classes)
            .flat_map(|k| (1..self.dim).map(move |j| k * self.dim + j))
            .map(|idx| theta[idx] * theta[idx])
            .sum();

        nll + 0.5 * self.penalty * ridge
    }

    fn gradient_and_hessian(&self, theta: &[f64]) -> (Vec<f64>, Mat<f64>) {
        let size = self.n_classes * self.dim;
        let mut gradient = vec![0.0; size];
        let mut hessian = Mat::<f64>::zeros(size, size);

        for (x, &y) in self.design.iter().zip(self.targets) {
            let p = softmax(&self.scores(theta, x));

            for k in 0..self.n_classes {
                let residual = p[k] - if k == y { 1.0 } else { 0.0 };
                for j in 0..self.dim {
                    gradient[k * self.dim + j] += residual * x[j];
                }

                for l in 0..self.n_classes {
                    let a = p[k] * (if k == l { 1.0 } else { 0.0 } - p[l]);
                    if a == 0.0 {
                        continue;
                    }
                    for j in 0..self.dim {
                        let ax = a * x[j];
                        if ax == 0.0 {
                            continue;
                        }
                        for m in 0..self.dim {
                            hessian[(k * self.dim + j, l * self.dim + m)] += ax * x[m];
                        }
                    }
                }
            }
        }

        for k in 0..self.n_classes {
            let base = k * self.dim;
            hessian[(base, base)] += INTERCEPT_RIDGE;
            for j in 1..self.dim {
                gradient[base + j] += self.penalty * theta[base + j];
                hessian[(base + j, base + j)] += self.penalty;
            }
        }

        (gradient, hessian)
    }

    /// Damped Newton minimisation; returns (theta, iterations, converged)
    fn minimize(&self, config: &ModelConfig) -> (Vec<f64>, usize, bool) {
        let size = self.n_classes * self.dim;
        let mut theta = vec![0.0; size];
        let mut current = self.objective(&theta);

        for iteration in 0..config.max_iterations {
            let (gradient, hessian) = self.gradient_and_hessian(&theta);

            let grad_norm = gradient.iter().fold(0.0f64, |acc, g| acc.max(g.abs()));
            if grad_norm < config.tolerance {
                return (theta, iteration, true);
            }

            let mut rhs = Mat::<f64>::zeros(size, 1);
            for (i, g) in gradient.iter().enumerate() {
                rhs[(i, 0)] = *g;
            }
            let lu = hessian.partial_piv_lu();
            let solution = lu.solve(&rhs);
            let step: Vec<f64> = (0..size).map(|i| solution[(i, 0)]).collect();

            if step.iter().any(|s| !s.is_finite()) {
                warn!("Newton step is not finite; stopping at iteration {}", iteration);
                return (theta, iteration, false);
            }

            let slope: f64 = gradient.iter().zip(&step).map(|(g, s)| g * s).sum();
            let mut t = 1.0;
            let mut candidate: Vec<f64> = theta.iter().zip(&step).map(|(a, s)| a - s).collect();
            let mut value = self.objective(&candidate);
            let mut halvings = 0;
            while !(value <= current - ARMIJO * t * slope) && halvings < MAX_HALVINGS {
                t *= 0.5;
                candidate = theta.iter().zip(&step).map(|(a, s)| a - t * s).collect();
                value = self.objective(&candidate);
                halvings += 1;
            }

            if !(value <= current) {
                // No descent along the Newton direction: already at the optimum
                // to machine precision.
                return (theta, iteration + 1, grad_norm < config.tolerance.sqrt());
            }

            let change = current - value;
            theta = candidate;
            current = value;

            if change <= config.tolerance * current.abs().max(1.0) {
                return (theta, iteration + 1, true);
            }
        }

        (theta, config.max_iterations, false)
    }
}
