//! The predefined operations and ML types of a session.
//!
//! These are registered before any user item runs, so user handlers always
//! have something to override. An operation which reaches the bottom of the
//! handler stack is answered by its default, which keeps the equality
//! engine pure α-equality until the user extends it.

use reflet_lang_nucleus::{Decl, Ident, MLTy, NucleusError, Signature};

use crate::Value;

pub const OP_EQUAL_TERM: &str = "equal_term";
pub const OP_EQUAL_TYPE: &str = "equal_type";
pub const OP_COERCE: &str = "coerce";
pub const OP_AS_PROD: &str = "as_prod";
pub const OP_AS_EQ: &str = "as_eq";

pub const TAG_SOME: &str = "Some";
pub const TAG_NONE: &str = "None";
pub const TAG_NOT_COERCIBLE: &str = "NotCoercible";
pub const TAG_CONVERTIBLE: &str = "Convertible";
pub const TAG_COERCIBLE: &str = "Coercible";

fn jdg() -> MLTy {
    MLTy::Judgement
}

fn option(ty: MLTy) -> MLTy {
    MLTy::Named(Ident::from_string("option"), vec![ty])
}

/// Register the standard ML types and operations.
pub fn register(sgn: &mut Signature) -> Result<(), NucleusError> {
    sgn.declare(
        Ident::from_string("option"),
        Decl::MLType {
            constructors: vec![
                (Ident::from_string(TAG_NONE), 0),
                (Ident::from_string(TAG_SOME), 1),
            ],
        },
    )?;
    sgn.declare(
        Ident::from_string("coercible"),
        Decl::MLType {
            constructors: vec![
                (Ident::from_string(TAG_NOT_COERCIBLE), 0),
                (Ident::from_string(TAG_CONVERTIBLE), 1),
                (Ident::from_string(TAG_COERCIBLE), 1),
            ],
        },
    )?;
    sgn.declare(
        Ident::from_string(OP_EQUAL_TERM),
        Decl::MLOperation { arg_tys: vec![jdg(), jdg()], result_ty: option(jdg()) },
    )?;
    sgn.declare(
        Ident::from_string(OP_EQUAL_TYPE),
        Decl::MLOperation { arg_tys: vec![jdg(), jdg()], result_ty: option(jdg()) },
    )?;
    sgn.declare(
        Ident::from_string(OP_COERCE),
        Decl::MLOperation {
            arg_tys: vec![jdg(), jdg()],
            result_ty: MLTy::Named(Ident::from_string("coercible"), vec![]),
        },
    )?;
    sgn.declare(
        Ident::from_string(OP_AS_PROD),
        Decl::MLOperation { arg_tys: vec![jdg()], result_ty: option(jdg()) },
    )?;
    sgn.declare(
        Ident::from_string(OP_AS_EQ),
        Decl::MLOperation { arg_tys: vec![jdg()], result_ty: option(jdg()) },
    )?;
    Ok(())
}

/// The answer an operation receives when no installed handler covers it.
pub fn default_result(op: &Ident) -> Option<Value> {
    match op.id.as_str() {
        OP_EQUAL_TERM | OP_EQUAL_TYPE | OP_AS_PROD | OP_AS_EQ => {
            Some(Value::Tag(Ident::from_string(TAG_NONE), Vec::new()))
        }
        OP_COERCE => Some(Value::Tag(Ident::from_string(TAG_NOT_COERCIBLE), Vec::new())),
        _ => None,
    }
}

pub fn some_value(inner: Value) -> Value {
    Value::Tag(Ident::from_string(TAG_SOME), vec![inner])
}
