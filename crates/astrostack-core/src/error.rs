use thiserror::Error;

/// Shape of a planar buffer, used to report operand mismatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    pub planes: usize,
    pub width: usize,
    pub height: usize,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.planes)
    }
}

/// Transform direction a spectral buffer can be prepared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Direct,
    Inverse,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Inverse => write!(f, "inverse"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StackError {
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    #[error("Buffer is not in spectrum state")]
    NotASpectrum,

    #[error("Buffer is already in spectrum state")]
    AlreadySpectrum,

    #[error("Buffer was not prepared for the {0} transform")]
    TransformNotPrepared(Direction),

    #[error("Invalid rectangle: {0}")]
    InvalidRect(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Empty image sequence")]
    EmptySequence,

    #[error("Processing cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, StackError>;
