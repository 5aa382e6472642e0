//! Validation of equality and coercion answers.
//!
//! The protocol lives in the evaluator: an undecided question is raised as
//! an operation and the handler's answer is delivered back to a checking
//! frame, which calls into this module. Equality reflection accepts
//! arbitrary proofs as definitional, so the one check that remains — and
//! the one that keeps the kernel sound — is that the proof is of exactly
//! the proposition that was asked.

use log::trace;
use miette::SourceSpan;
use reflet_lang_miette_util::{Span, ToMiette};
use reflet_lang_nucleus::{AlphaEq, JdgIsTerm, JdgIsType};
use reflet_lang_printer::Print;

use crate::operations::{TAG_COERCIBLE, TAG_CONVERTIBLE, TAG_NONE, TAG_NOT_COERCIBLE, TAG_SOME};
use crate::{RuntimeError, Value};

fn label(span: Option<Span>) -> Option<SourceSpan> {
    span.to_miette()
}

/// Validate a handler's answer to `equal_term lhs rhs`.
///
/// `None` is passed through: the caller simply has no proof. A `Some eq`
/// must have exactly the requested endpoints at the requested type;
/// anything else is a proof of the wrong proposition and fatal.
pub(crate) fn check_equal_term_answer(
    answer: Value,
    lhs: &JdgIsTerm,
    rhs: &JdgIsTerm,
    span: Option<Span>,
) -> Result<Value, RuntimeError> {
    match &answer {
        Value::Tag(tag, args) if tag.id == TAG_NONE && args.is_empty() => Ok(answer),
        Value::Tag(tag, args) if tag.id == TAG_SOME && args.len() == 1 => {
            let eq = args[0].as_eq_term(span)?;
            let (_, lhs_got, rhs_got, ty_got) = eq.invert();
            if !lhs_got.alpha_equal(lhs.term())
                || !rhs_got.alpha_equal(rhs.term())
                || !ty_got.alpha_equal(lhs.ty())
            {
                return Err(RuntimeError::InvalidEqualTerm { span: label(span) });
            }
            trace!("equality witness accepted: {}", args[0].print_to_string(None));
            Ok(answer)
        }
        _ => Err(RuntimeError::ExpectedJudgement {
            got: answer.print_to_string(None),
            span: label(span),
        }),
    }
}

/// Validate a handler's answer to `equal_type lhs rhs`.
pub(crate) fn check_equal_type_answer(
    answer: Value,
    lhs: &JdgIsType,
    rhs: &JdgIsType,
    span: Option<Span>,
) -> Result<Value, RuntimeError> {
    match &answer {
        Value::Tag(tag, args) if tag.id == TAG_NONE && args.is_empty() => Ok(answer),
        Value::Tag(tag, args) if tag.id == TAG_SOME && args.len() == 1 => {
            let eq = args[0].as_eq_type(span)?;
            let (_, lhs_got, rhs_got) = eq.invert();
            if !lhs_got.alpha_equal(lhs.ty()) || !rhs_got.alpha_equal(rhs.ty()) {
                return Err(RuntimeError::InvalidEqualType { span: label(span) });
            }
            Ok(answer)
        }
        _ => Err(RuntimeError::ExpectedJudgement {
            got: answer.print_to_string(None),
            span: label(span),
        }),
    }
}

/// Validate a handler's answer to `coerce term target` and carry out the
/// accepted coercion on the kernel side.
pub(crate) fn check_coerce_answer(
    answer: Value,
    term: &JdgIsTerm,
    target: &JdgIsType,
    span: Option<Span>,
) -> Result<Value, RuntimeError> {
    match &answer {
        Value::Tag(tag, args) if tag.id == TAG_NOT_COERCIBLE && args.is_empty() => {
            Err(RuntimeError::NotCoercible {
                term: term.term().print_to_string(None),
                ty: target.ty().print_to_string(None),
                span: label(span),
            })
        }
        Value::Tag(tag, args) if tag.id == TAG_CONVERTIBLE && args.len() == 1 => {
            let eq = args[0].as_eq_type(span)?;
            let (_, lhs_got, rhs_got) = eq.invert();
            if !lhs_got.alpha_equal(term.ty()) || !rhs_got.alpha_equal(target.ty()) {
                return Err(RuntimeError::InvalidCoerce { span: label(span) });
            }
            let converted = term.convert(&eq)?;
            trace!("convertible: {}", converted.ty().print_to_string(None));
            Ok(Value::from(converted))
        }
        Value::Tag(tag, args) if tag.id == TAG_COERCIBLE && args.len() == 1 => {
            let coerced = args[0].as_is_term(span)?;
            if !coerced.ty().alpha_equal(target.ty()) {
                return Err(RuntimeError::InvalidCoerce { span: label(span) });
            }
            Ok(Value::from(coerced))
        }
        _ => Err(RuntimeError::ExpectedJudgement {
            got: answer.print_to_string(None),
            span: label(span),
        }),
    }
}

/// Validate a handler's answer to `as_prod ty`: an equation from `ty` to a
/// product type along which the head of an application can be converted.
pub(crate) fn check_as_prod_answer(
    answer: Value,
    head: &JdgIsTerm,
    span: Option<Span>,
) -> Result<JdgIsTerm, RuntimeError> {
    match &answer {
        Value::Tag(tag, args) if tag.id == TAG_NONE && args.is_empty() => {
            Err(reflet_lang_nucleus::NucleusError::expected_product(head.ty()).into())
        }
        Value::Tag(tag, args) if tag.id == TAG_SOME && args.len() == 1 => {
            let eq = args[0].as_eq_type(span)?;
            let (_, lhs_got, _) = eq.invert();
            if !lhs_got.alpha_equal(head.ty()) {
                return Err(RuntimeError::InvalidEqualType { span: label(span) });
            }
            let converted = head.convert(&eq)?;
            if converted.type_of().domain().is_none() {
                return Err(RuntimeError::InvalidEqualType { span: label(span) });
            }
            Ok(converted)
        }
        _ => Err(RuntimeError::ExpectedJudgement {
            got: answer.print_to_string(None),
            span: label(span),
        }),
    }
}
