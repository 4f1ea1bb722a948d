use crate::position::Position;
use std::fmt::{self, Display, Formatter};

/// A structural problem discovered while building or finalizing a grammar:
/// an unresolved forward declaration, a nullable [`Regexp`](crate::symbol::Symbol),
/// a non-empty constraint applied to a marker, or left recursion found during
/// parsing.
#[derive(Debug, Clone)]
pub struct ImplementationError {
    pub what: &'static str,
    pub message: String,
}

impl ImplementationError {
    pub fn new(what: &'static str, message: String) -> Self {
        Self { what, message }
    }

    pub fn left_recursion(rule: &str) -> Self {
        Self::new(
            "LeftRecursion",
            format!("'{}' is left recursive.", rule),
        )
    }
}

impl Display for ImplementationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidGrammar: {} - {}", self.what, self.message)
    }
}

impl std::error::Error for ImplementationError {}

/// The internal, backtrackable failure raised while a symbol is evaluating.
/// Unlike [`ParseError`], this never escapes the engine: `OneOf`, `Optional`
/// and `Repeat` catch it, and whatever reaches the bottom of the stack
/// unhandled is turned into a [`ParseError`] by the driver.
#[derive(Debug, Clone)]
pub(crate) enum ProductionError {
    /// A symbol simply failed to match at the current offset.
    Unparsed { offset: usize, message: String },
    /// A terminal mismatch: `expected X, found Y`.
    UnexpectedToken {
        offset: usize,
        expected: String,
        found: String,
    },
}

impl ProductionError {
    pub fn offset(&self) -> usize {
        match self {
            ProductionError::Unparsed { offset, .. } => *offset,
            ProductionError::UnexpectedToken { offset, .. } => *offset,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ProductionError::Unparsed { message, .. } => message.clone(),
            ProductionError::UnexpectedToken {
                expected, found, ..
            } => format!("expected {}, found {}", expected, found),
        }
    }
}

/// The final, user-facing parse failure: a message and the source position it
/// occurred at.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(position: Position, message: String) -> Self {
        Self { position, message }
    }

    /// Build a user-facing error from an internal one, given the source
    /// position of the token it was raised at. `ProductionError::offset` is a
    /// token-stream index, not a byte offset, so the caller resolves it
    /// against the stream before this point.
    pub(crate) fn from_production(position: Position, err: &ProductionError) -> Self {
        ParseError::new(position, err.message())
    }

    pub fn tokenize(position: Position, sample: &str) -> Self {
        ParseError::new(
            position,
            format!("unexpected input near '{}'", sample),
        )
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ParseError: {} at {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}
