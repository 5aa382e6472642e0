use miette::{Diagnostic, SourceSpan};
use reflet_lang_miette_util::{HasSpan, ToMiette};
use reflet_lang_printer::Print;
use thiserror::Error;

use crate::{Atom, Ident, Ty};

/// Errors raised by the judgement kernel.
///
/// Everything except [`NucleusError::Impossible`] reports a construction the
/// theory rejects and is recoverable by user code; `Impossible` signals a
/// broken kernel invariant and aborts the session.
#[derive(Error, Diagnostic, Debug, Clone)]
pub enum NucleusError {
    #[error("Unknown identifier {name}")]
    #[diagnostic(code("N-001"))]
    UnknownIdent {
        name: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("{name} is already declared")]
    #[diagnostic(code("N-002"))]
    Redeclaration {
        name: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("{got} is not a product type")]
    #[diagnostic(code("N-003"))]
    ExpectedProduct {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("{got} is not an equality type")]
    #[diagnostic(code("N-004"))]
    ExpectedEquality {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("{got} is not a signature type")]
    #[diagnostic(code("N-005"))]
    ExpectedSignature {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("{got} is not the universe")]
    #[diagnostic(code("N-006"))]
    ExpectedUniverse {
        got: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("The types do not agree:\n  expected: {expected}\n  actual:   {actual}\n")]
    #[diagnostic(code("N-007"))]
    TypeMismatch {
        expected: String,
        actual: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("The terms are not equal:\n  1: {lhs}\n  2: {rhs}\n")]
    #[diagnostic(code("N-008"))]
    NotAlphaEqual {
        lhs: String,
        rhs: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Signature has no field {label}")]
    #[diagnostic(code("N-009"))]
    UnknownField {
        label: String,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("Wrong number of fields: got {actual}, expected {expected}")]
    #[diagnostic(code("N-010"))]
    FieldCountMismatch {
        expected: usize,
        actual: usize,
        #[label]
        span: Option<SourceSpan>,
    },
    #[error("An invalid derivation was attempted: {message}")]
    #[diagnostic(code("N-XXX"))]
    /// This error should not occur.
    /// Some internal invariant of the kernel has been violated.
    Impossible {
        message: String,
        #[label]
        span: Option<SourceSpan>,
    },
}

impl NucleusError {
    /// Fatal errors abort the session; they are never visible to user
    /// handlers and a `fail` block does not discharge them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NucleusError::Impossible { .. })
    }

    pub fn unknown_ident(name: &Ident) -> Self {
        NucleusError::UnknownIdent { name: name.id.clone(), span: name.span().to_miette() }
    }

    pub fn expected_product(got: &Ty) -> Self {
        NucleusError::ExpectedProduct {
            got: got.print_to_string(None),
            span: got.span().to_miette(),
        }
    }

    pub fn expected_equality(got: &Ty) -> Self {
        NucleusError::ExpectedEquality {
            got: got.print_to_string(None),
            span: got.span().to_miette(),
        }
    }

    pub fn expected_signature(got: &Ty) -> Self {
        NucleusError::ExpectedSignature {
            got: got.print_to_string(None),
            span: got.span().to_miette(),
        }
    }

    pub fn expected_universe(got: &Ty) -> Self {
        NucleusError::ExpectedUniverse {
            got: got.print_to_string(None),
            span: got.span().to_miette(),
        }
    }

    pub fn type_mismatch(expected: &Ty, actual: &Ty) -> Self {
        NucleusError::TypeMismatch {
            expected: expected.print_to_string(None),
            actual: actual.print_to_string(None),
            span: actual.span().to_miette(),
        }
    }

    pub fn unknown_atom(atom: &Atom) -> Self {
        NucleusError::Impossible { message: format!("unknown atom {atom}"), span: None }
    }

    pub fn impossible(message: impl Into<String>) -> Self {
        NucleusError::Impossible { message: message.into(), span: None }
    }
}
