use logos::Span;
use std::fmt;

//===----------------------------------------------------------------------===//
// Error
//
// The evaluation-core taxonomy. None of these are recovered inside the core:
// every one is routed to the nearest enclosing error continuation, and an
// uncaught error reaches the root and terminates the evaluation with the
// error value in hand.
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A symbol lookup walked the whole environment chain without a hit.
    UnboundSymbol { name: String },
    /// A non-combiner value ended up in operator position.
    NotACombiner { found: String },
    /// The operand tree of an applicative combination was not a list, or a
    /// parameter tree failed to match its operand tree.
    BadOperandList { reason: String },
    /// A primitive operative rejected the shape or type of its operands.
    ArityOrTypeMismatch { who: &'static str, reason: String },
    /// `$if`/`$cond`/`$and?`/`$or?` received a non-boolean test value.
    NonBooleanTest { found: String },
    /// A parameter tree contained a repeated symbol, a cycle, or a
    /// non-bindable leaf. Raised at closure-construction time.
    PatternError { reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnboundSymbol { name } => {
                write!(f, "Unbound symbol: {}", name)
            }
            Error::NotACombiner { found } => {
                write!(f, "Not a combiner in operator position: {}", found)
            }
            Error::BadOperandList { reason } => {
                write!(f, "Bad operand list: {}", reason)
            }
            Error::ArityOrTypeMismatch { who, reason } => {
                write!(f, "{}: {}", who, reason)
            }
            Error::NonBooleanTest { found } => {
                write!(f, "Test did not evaluate to a boolean: {}", found)
            }
            Error::PatternError { reason } => {
                write!(f, "Bad parameter tree: {}", reason)
            }
        }
    }
}

//===----------------------------------------------------------------------===//
// SyntaxError
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxError {
    UnexpectedEOF { expected: Option<String> },
    UnexpectedToken { found: String, expected: String },
    InvalidNumber { value: String },
    InvalidHashForm { value: String },
    MisplacedDot,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyntaxError::UnexpectedEOF { expected } => {
                write!(
                    f,
                    "Unexpected EOF: {}",
                    expected.clone().unwrap_or("None".to_string())
                )
            }
            SyntaxError::UnexpectedToken { found, expected } => {
                write!(f, "Unexpected token: {} (expected: {})", found, expected)
            }
            SyntaxError::InvalidNumber { value } => {
                write!(f, "Invalid number: {}", value)
            }
            SyntaxError::InvalidHashForm { value } => {
                write!(f, "Invalid # form: {}", value)
            }
            SyntaxError::MisplacedDot => write!(f, "Misplaced dot in list"),
        }
    }
}

//===----------------------------------------------------------------------===//
// ReadError
//===----------------------------------------------------------------------===//

/// A syntax error together with the span and the source text it came from,
/// so the REPL can underline the offending slice.
#[derive(Debug, Clone)]
pub struct ReadError {
    pub error: SyntaxError,
    pub span: Span,
    pub source: String,
}

impl ReadError {
    pub fn format_error(&self) -> String {
        let line_start =
            self.source[..self.span.start].rfind('\n').map(|pos| pos + 1).unwrap_or(0);

        let line_end = self.source[self.span.start..]
            .find('\n')
            .map(|pos| self.span.start + pos)
            .unwrap_or(self.source.len());

        let line_number = self.source[..self.span.start].matches('\n').count() + 1;
        let column = self.span.start - line_start + 1;

        let line_content = &self.source[line_start..line_end];
        let underline = " ".repeat(column - 1) + &"^".repeat(self.span.len().max(1));

        format!(
            "Syntax error at {}:{}\n{}\n{}\n{}",
            line_number, column, line_content, underline, self.error
        )
    }
}

//===----------------------------------------------------------------------===//
// Diagnostic
//===----------------------------------------------------------------------===//

/// Everything `Runtime::rep` can report: a reader failure or an evaluation
/// error that reached the root continuation.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Syntax(ReadError),
    Eval(Error),
}

impl Diagnostic {
    pub fn format_error(&self) -> String {
        match self {
            Diagnostic::Syntax(err) => err.format_error(),
            Diagnostic::Eval(err) => format!("Error: {}", err),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_error())
    }
}
