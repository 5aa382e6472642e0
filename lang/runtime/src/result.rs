use miette::{Diagnostic, SourceSpan};
use reflet_lang_miette_util::{Span, ToMiette};
use reflet_lang_nucleus::NucleusError;
use thiserror::Error;

/// Errors raised by the evaluator and the equality engine.
///
/// Most variants are recoverable: they propagate to the nearest `fail` item
/// or abort the current top-level item. The `Invalid*` variants fire when a
/// user handler answered an equality or coercion question with a proof of
/// the wrong proposition; they are fatal and cannot be discharged by `fail`.
#[derive(Error, Diagnostic, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Nucleus(#[from] NucleusError),
    #[error("No pattern matched the value {value}")]
    #[diagnostic(code("R-001"))]
    MatchFail {
        value: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Unknown operation {op}")]
    #[diagnostic(code("R-002"))]
    UnknownOperation {
        op: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Operation {op} was not handled")]
    #[diagnostic(code("R-003"))]
    UnhandledOperation {
        op: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Cannot apply {got}")]
    #[diagnostic(code("R-004"))]
    CannotApply {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Expected a judgement, got {got}")]
    #[diagnostic(code("R-005"))]
    ExpectedJudgement {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Expected a term judgement, got {got}")]
    #[diagnostic(code("R-006"))]
    ExpectedTermJudgement {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Expected a type judgement, got {got}")]
    #[diagnostic(code("R-007"))]
    ExpectedTypeJudgement {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Expected a handler, got {got}")]
    #[diagnostic(code("R-008"))]
    ExpectedHandler {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Expected a reference, got {got}")]
    #[diagnostic(code("R-009"))]
    ExpectedReference {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Expected an abstracted judgement, got {got}")]
    #[diagnostic(code("R-010"))]
    ExpectedAbstraction {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Unknown dynamic {name}")]
    #[diagnostic(code("R-011"))]
    UnknownDynamic {
        name: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("There is nothing to yield to here")]
    #[diagnostic(code("R-012"))]
    NothingToYield {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("This continuation was already resumed")]
    #[diagnostic(code("R-013"))]
    ContinuationResumed {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Wrong number of arguments to {name} provided: got {actual}, expected {expected}")]
    #[diagnostic(code("R-017"))]
    ArgLenMismatch {
        name: String,
        expected: usize,
        actual: usize,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Cannot coerce {term} to type {ty}")]
    #[diagnostic(code("R-014"))]
    NotCoercible {
        term: String,
        ty: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Cannot infer a type annotation for this binder")]
    #[diagnostic(code("R-015"))]
    CannotInferBinder {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("The computation was expected to fail but succeeded")]
    #[diagnostic(code("R-016"))]
    ExpectedFailure {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("The handler returned an equality between the wrong terms")]
    #[diagnostic(code("R-101"), help("equality reflection accepts arbitrary proofs, but only of the proposition that was asked"))]
    InvalidEqualTerm {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("The handler returned an equality between the wrong types")]
    #[diagnostic(code("R-102"))]
    InvalidEqualType {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("The handler returned a coercion to the wrong type")]
    #[diagnostic(code("R-103"))]
    InvalidCoerce {
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("An unexpected internal error occurred: {message}")]
    #[diagnostic(code("R-XXX"))]
    /// This error should not occur.
    /// Some internal invariant of the evaluator has been violated.
    Impossible {
        message: String,
        #[label]
        span: Option<SourceSpan>,
    },
}

impl RuntimeError {
    /// Fatal errors abort the session: wrong-proposition answers from user
    /// handlers and broken internal invariants. A `fail` item does not
    /// discharge them.
    pub fn is_fatal(&self) -> bool {
        match self {
            RuntimeError::Nucleus(e) => e.is_fatal(),
            RuntimeError::InvalidEqualTerm { .. }
            | RuntimeError::InvalidEqualType { .. }
            | RuntimeError::InvalidCoerce { .. }
            | RuntimeError::Impossible { .. } => true,
            _ => false,
        }
    }

    pub fn impossible(message: impl Into<String>, span: Option<Span>) -> Self {
        RuntimeError::Impossible { message: message.into(), span: span.to_miette() }
    }
}
