//! Linear projection: the cold, deterministic baseline predictor.
//!
//! A dense `output_size x input_size` weight matrix trained by mini-batch
//! gradient descent with L2 regularization. No activation — pure linear
//! regression by design. Sample order is shuffled with an explicitly seeded
//! PRNG so training runs are reproducible.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    InvalidDimension {
        expected: usize,
        got: usize,
    },
    InvalidShape {
        rows: usize,
        cols: usize,
        data_len: usize,
    },
    InputMismatch {
        cols: usize,
        input_len: usize,
    },
    SampleCountMismatch {
        inputs: usize,
        targets: usize,
    },
    EmptyTrainingSet,
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::InvalidDimension { expected, got } => {
                write!(f, "invalid dimension: expected {}, got {}", expected, got)
            }
            ProjectionError::InvalidShape {
                rows,
                cols,
                data_len,
            } => write!(
                f,
                "invalid matrix shape: rows={} cols={} data_len={}",
                rows, cols, data_len
            ),
            ProjectionError::InputMismatch { cols, input_len } => {
                write!(
                    f,
                    "matrix input mismatch: matrix cols={} input len={}",
                    cols, input_len
                )
            }
            ProjectionError::SampleCountMismatch { inputs, targets } => {
                write!(
                    f,
                    "sample count mismatch: {} inputs vs {} targets",
                    inputs, targets
                )
            }
            ProjectionError::EmptyTrainingSet => write!(f, "empty training set"),
        }
    }
}

impl std::error::Error for ProjectionError {}

/// Knobs for one training run. All fields have working defaults; the seed
/// makes shuffling reproducible run to run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    pub l2_lambda: f32,
    /// Per-epoch decay: effective rate is `lr / (1 + lr_decay * epoch)`.
    pub lr_decay: f32,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            l2_lambda: 0.0,
            lr_decay: 0.0,
            seed: 0,
        }
    }
}

/// Dense weight matrix, row-major: `rows = output_size`, `cols = input_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProjection {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl LinearProjection {
    pub fn new(input_size: usize, output_size: usize, data: Vec<f32>) -> Result<Self, ProjectionError> {
        if input_size == 0 || output_size == 0 {
            return Err(ProjectionError::InvalidDimension {
                expected: 1,
                got: 0,
            });
        }
        if data.len() != input_size * output_size {
            return Err(ProjectionError::InvalidShape {
                rows: output_size,
                cols: input_size,
                data_len: data.len(),
            });
        }
        Ok(Self {
            rows: output_size,
            cols: input_size,
            data,
        })
    }

    /// All-zero weights: the cold state.
    pub fn zeros(input_size: usize, output_size: usize) -> Result<Self, ProjectionError> {
        Self::new(input_size, output_size, vec![0.0; input_size * output_size])
    }

    /// Small symmetric random initialization from a seeded PRNG. Identical
    /// seeds yield identical matrices.
    pub fn seeded(input_size: usize, output_size: usize, seed: u64) -> Result<Self, ProjectionError> {
        let mut this = Self::zeros(input_size, output_size)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for w in this.data.iter_mut() {
            *w = rng.gen_range(-0.05f32..0.05f32);
        }
        Ok(this)
    }

    pub fn input_size(&self) -> usize {
        self.cols
    }

    pub fn output_size(&self) -> usize {
        self.rows
    }

    /// Row-major weight slice.
    pub fn weights(&self) -> &[f32] {
        &self.data
    }

    /// Forward pass `W * x` with f64 accumulation.
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>, ProjectionError> {
        if input.len() != self.cols {
            return Err(ProjectionError::InputMismatch {
                cols: self.cols,
                input_len: input.len(),
            });
        }
        let mut out = vec![0.0f32; self.rows];
        for (row, out_cell) in out.iter_mut().enumerate() {
            let mut acc = 0.0f64;
            let row_start = row * self.cols;
            for (col, x) in input.iter().enumerate() {
                acc += self.data[row_start + col] as f64 * *x as f64;
            }
            *out_cell = acc as f32;
        }
        Ok(out)
    }

    /// Mini-batch gradient descent.
    ///
    /// Per epoch: shuffle sample order (seeded), decay the learning rate to
    /// `lr / (1 + lr_decay * epoch)`, and for each sample apply
    /// `W[j][i] -= lr_e * ((yhat_j - y_j) * x_i + l2_lambda * W[j][i])`.
    ///
    /// Inputs are used as given — no NaN screening; callers sanitize
    /// magnitudes.
    pub fn train(
        &mut self,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        opts: &TrainOptions,
    ) -> Result<(), ProjectionError> {
        if inputs.is_empty() {
            return Err(ProjectionError::EmptyTrainingSet);
        }
        if inputs.len() != targets.len() {
            return Err(ProjectionError::SampleCountMismatch {
                inputs: inputs.len(),
                targets: targets.len(),
            });
        }
        for x in inputs {
            if x.len() != self.cols {
                return Err(ProjectionError::InputMismatch {
                    cols: self.cols,
                    input_len: x.len(),
                });
            }
        }
        for y in targets {
            if y.len() != self.rows {
                return Err(ProjectionError::InvalidDimension {
                    expected: self.rows,
                    got: y.len(),
                });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);
        let mut order: Vec<usize> = (0..inputs.len()).collect();

        for epoch in 0..opts.epochs {
            order.shuffle(&mut rng);
            let lr = opts.learning_rate / (1.0 + opts.lr_decay * epoch as f32);

            for &n in &order {
                let x = &inputs[n];
                let y = &targets[n];
                let yhat = self.predict(x)?;

                for j in 0..self.rows {
                    let err = yhat[j] - y[j];
                    let row_start = j * self.cols;
                    for i in 0..self.cols {
                        let w = &mut self.data[row_start + i];
                        *w -= lr * (err * x[i] + opts.l2_lambda * *w);
                    }
                }
            }
        }

        debug!(
            epochs = opts.epochs,
            samples = inputs.len(),
            seed = opts.seed,
            "training pass complete"
        );
        Ok(())
    }
}
