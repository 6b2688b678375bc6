use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Failure of a spatial database or time history query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The point lies outside the domain of support of the database.
    NotFound { db: String, point: Vec<f64> },
    /// The database does not provide a value with the requested name.
    UnknownValue { db: String, name: String },
    /// The number of output slots does not match the number of requested names.
    SizeMismatch { expected: usize, actual: usize },
    /// The data used to construct a database or table is inconsistent.
    InvalidData { db: String, message: String },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::NotFound { db, point } => {
                write!(f, "point {:?} is outside the domain of spatial database '{}'", point, db)
            }
            QueryError::UnknownValue { db, name } => {
                write!(f, "spatial database '{}' has no value named '{}'", db, name)
            }
            QueryError::SizeMismatch { expected, actual } => {
                write!(f, "expected {} output values, got buffer of length {}", expected, actual)
            }
            QueryError::InvalidData { db, message } => write!(f, "invalid data in '{}': {}", db, message),
        }
    }
}

impl Error for QueryError {}

/// Failure to parse one of the ASCII formats (SimpleDB or time history).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// One-based line number, or zero if the error concerns the file as a whole.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "parse error: {}", self.message)
        } else {
            write!(f, "parse error on line {}: {}", self.line, self.message)
        }
    }
}

impl Error for ParseError {}
