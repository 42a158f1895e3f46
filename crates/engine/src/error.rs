use mnemo_memory::math::MathError;
use mnemo_memory::StoreError;
use mnemo_projection::ProjectionError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad model file format: {0}")]
    BadFormat(&'static str),
    #[error("truncated model file: {0}")]
    Truncated(&'static str),
    #[error("integrity violation: stored digest does not match file contents")]
    IntegrityViolation,
    #[error("empty training set")]
    EmptyTrainingSet,
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("model already exists: {0}")]
    DuplicateModel(String),
    #[error("ledger: {0}")]
    Ledger(#[from] mnemo_ledger::LedgerError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidArgument(what) => EngineError::InvalidArgument(what),
            StoreError::DimensionMismatch { expected, got } => {
                EngineError::DimensionMismatch { expected, got }
            }
        }
    }
}

impl From<MathError> for EngineError {
    fn from(e: MathError) -> Self {
        match e {
            MathError::NonFinite => EngineError::InvalidArgument("non-finite vector"),
            MathError::DimensionMismatch { expected, got } => {
                EngineError::DimensionMismatch { expected, got }
            }
        }
    }
}

impl From<ProjectionError> for EngineError {
    fn from(e: ProjectionError) -> Self {
        match e {
            ProjectionError::EmptyTrainingSet => EngineError::EmptyTrainingSet,
            ProjectionError::InvalidDimension { expected, got } => {
                EngineError::DimensionMismatch { expected, got }
            }
            ProjectionError::InputMismatch { cols, input_len } => EngineError::DimensionMismatch {
                expected: cols,
                got: input_len,
            },
            ProjectionError::SampleCountMismatch { inputs, targets } => {
                EngineError::DimensionMismatch {
                    expected: inputs,
                    got: targets,
                }
            }
            ProjectionError::InvalidShape { .. } => {
                EngineError::InvalidArgument("invalid weight matrix shape")
            }
        }
    }
}
