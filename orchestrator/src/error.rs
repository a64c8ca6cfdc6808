use std::{fmt, io, path::PathBuf};

/// The orchestrator's result type.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// A job description that can't be handed to an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyTree,
    /// The main path must be fed by the dataset input, not by a branch point.
    MainPathStartsAtBranch {
        name: String,
    },
    /// A subordinate path doesn't start with a branch point reference.
    MissingRoot {
        path: usize,
    },
    UndeclaredBranchPoint {
        path: usize,
        name: String,
    },
    DuplicateBranchPoint {
        name: String,
    },
    DuplicateLayerName {
        name: String,
    },
    /// The path doesn't end with a fully connected layer.
    MissingTerminal {
        path: usize,
    },
    ZeroWidthLayer {
        name: String,
    },
    OutputSizeMismatch {
        path: usize,
        got: usize,
        expected: usize,
    },
    CostCountMismatch {
        got: usize,
        expected: usize,
    },
    InvalidLearningRate(f32),
    InvalidMomentum(f32),
    MissingCheckpointPath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTree => write!(f, "the model must have at least one path"),
            Self::MainPathStartsAtBranch { name } => {
                write!(f, "the main path can't start at branch point {name:?}")
            }
            Self::MissingRoot { path } => {
                write!(f, "path {path} must start with a branch point reference")
            }
            Self::UndeclaredBranchPoint { path, name } => write!(
                f,
                "path {path} references branch point {name:?} which is not declared by an earlier path"
            ),
            Self::DuplicateBranchPoint { name } => {
                write!(f, "branch point {name:?} is declared more than once")
            }
            Self::DuplicateLayerName { name } => {
                write!(f, "layer name {name:?} is used more than once")
            }
            Self::MissingTerminal { path } => {
                write!(f, "path {path} must end with a fully connected layer")
            }
            Self::ZeroWidthLayer { name } => write!(f, "layer {name:?} has no outputs"),
            Self::OutputSizeMismatch { path, got, expected } => write!(
                f,
                "path {path} outputs {got} values but the dataset has {expected} classes"
            ),
            Self::CostCountMismatch { got, expected } => write!(
                f,
                "got {got} cost weights but the model has {expected} paths"
            ),
            Self::InvalidLearningRate(lr) => {
                write!(f, "learning rate must be a positive number, got {lr}")
            }
            Self::InvalidMomentum(mu) => write!(f, "momentum must be in [0, 1), got {mu}"),
            Self::MissingCheckpointPath => {
                write!(f, "checkpointing is enabled but no save path was given")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before reaching the engine.
    InvalidConfig(ConfigError),
    /// The initial weights file doesn't exist.
    MissingFile(PathBuf),
    /// Failed to connect to the training engine.
    ConnectionFailed { addr: String, source: io::Error },
    /// The engine reported a failure or broke the protocol.
    Engine(String),
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(e) => write!(f, "invalid config: {e}"),
            Self::MissingFile(path) => write!(f, "{} not found", path.display()),
            Self::ConnectionFailed { addr, source } => {
                write!(f, "connection failed to {addr}: {source}")
            }
            Self::Engine(msg) => write!(f, "engine error: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(e) => Some(e),
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for OrchestratorError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig(e)
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
