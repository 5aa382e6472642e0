use reflet_lang_miette_util::HasSpan;
use reflet_lang_nucleus::{
    Abstraction, JdgIsTerm, JdgIsType, Judgement, TermKind, invert_abstraction,
};
use reflet_lang_syntax::{Pattern, TTPattern};

use crate::{JdgValue, Runtime, RuntimeError, Value};

/// Try to match a value against an ML pattern.
///
/// On success the bound values have been appended to `out` in binding
/// order; on failure `Ok(false)` is returned and the caller must discard
/// whatever was appended.
pub fn match_value(
    rt: &mut Runtime,
    pattern: &Pattern,
    value: &Value,
    out: &mut Vec<Value>,
) -> Result<bool, RuntimeError> {
    match pattern {
        Pattern::Anonymous { .. } => Ok(true),
        Pattern::Var { .. } => {
            out.push(value.clone());
            Ok(true)
        }
        Pattern::As { pattern, .. } => {
            if !match_value(rt, pattern, value, out)? {
                return Ok(false);
            }
            out.push(value.clone());
            Ok(true)
        }
        Pattern::Tag { tag, args, .. } => match value {
            Value::Tag(vtag, vargs) if vtag == tag && vargs.len() == args.len() => {
                for (arg, varg) in args.iter().zip(vargs) {
                    if !match_value(rt, arg, varg, out)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        },
        Pattern::Tuple { elems, .. } => match value {
            Value::Tuple(velems) if velems.len() == elems.len() => {
                for (elem, velem) in elems.iter().zip(velems) {
                    if !match_value(rt, elem, velem, out)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        },
        Pattern::ListNil { .. } => match value {
            Value::List(velems) => Ok(velems.is_empty()),
            _ => Ok(false),
        },
        Pattern::ListCons { head, tail, .. } => match value {
            Value::List(velems) => match velems.split_first() {
                Some((vhead, vtail)) => {
                    if !match_value(rt, head, vhead, out)? {
                        return Ok(false);
                    }
                    match_value(rt, tail, &Value::List(vtail.to_vec()), out)
                }
                None => Ok(false),
            },
            _ => Ok(false),
        },
        Pattern::Str { value: expected, .. } => match value {
            Value::Str(s) => Ok(s == expected),
            _ => Ok(false),
        },
        Pattern::Judgement { pattern, .. } => match value {
            Value::Judgement(jdg) => match_judgement(rt, pattern, jdg, out),
            _ => Ok(false),
        },
    }
}

/// Match a (possibly abstracted) judgement value against a TT pattern.
fn match_judgement(
    rt: &mut Runtime,
    pattern: &TTPattern,
    jdg: &JdgValue,
    out: &mut Vec<Value>,
) -> Result<bool, RuntimeError> {
    match pattern {
        TTPattern::Abstraction { name, body, .. } => {
            match invert_abstraction(&mut rt.signature, jdg) {
                Some((atom, opened)) => {
                    if name.is_some() {
                        let atom_jdg = JdgIsTerm::atom(&rt.signature, &atom, None)?;
                        out.push(Value::from(atom_jdg));
                    }
                    match_judgement(rt, body, &opened, out)
                }
                None => Ok(false),
            }
        }
        TTPattern::Anonymous { .. } => Ok(true),
        TTPattern::Var { .. } => {
            out.push(Value::Judgement(jdg.clone()));
            Ok(true)
        }
        TTPattern::As { pattern, .. } => {
            if !match_judgement(rt, pattern, jdg, out)? {
                return Ok(false);
            }
            out.push(Value::Judgement(jdg.clone()));
            Ok(true)
        }
        _ => match jdg {
            Abstraction::NotAbstract(judgement) => {
                match_plain_judgement(rt, pattern, judgement, out)
            }
            Abstraction::Abstract { .. } => Ok(false),
        },
    }
}

fn match_plain_judgement(
    rt: &mut Runtime,
    pattern: &TTPattern,
    jdg: &Judgement,
    out: &mut Vec<Value>,
) -> Result<bool, RuntimeError> {
    match (pattern, jdg) {
        (TTPattern::IsType { ty, .. }, Judgement::IsType(j)) => match_is_type(rt, ty, j, out),
        (TTPattern::IsTerm { term, ty, .. }, Judgement::IsTerm(j)) => {
            if !match_is_term(rt, term, j, out)? {
                return Ok(false);
            }
            match_is_type(rt, ty, &j.type_of(), out)
        }
        (TTPattern::EqType { lhs, rhs, .. }, Judgement::EqType(j)) => {
            if !match_is_type(rt, lhs, &j.lhs_judgement(), out)? {
                return Ok(false);
            }
            match_is_type(rt, rhs, &j.rhs_judgement(), out)
        }
        (TTPattern::EqTerm { lhs, rhs, ty, .. }, Judgement::EqTerm(j)) => {
            if !match_is_term(rt, lhs, &j.lhs_judgement(), out)? {
                return Ok(false);
            }
            if !match_is_term(rt, rhs, &j.rhs_judgement(), out)? {
                return Ok(false);
            }
            match_is_type(rt, ty, &j.ty_judgement(), out)
        }
        // Bare term patterns also apply to term judgements directly.
        (TTPattern::Constant { .. } | TTPattern::Spine { .. }, Judgement::IsTerm(j)) => {
            match_is_term(rt, pattern, j, out)
        }
        (TTPattern::Constant { .. } | TTPattern::Spine { .. }, Judgement::IsType(j)) => {
            match_is_type(rt, pattern, j, out)
        }
        _ => Ok(false),
    }
}

/// Match a term judgement structurally. A metavariable binds the subterm
/// together with its type, which is exactly what a term judgement carries.
fn match_is_term(
    rt: &mut Runtime,
    pattern: &TTPattern,
    jdg: &JdgIsTerm,
    out: &mut Vec<Value>,
) -> Result<bool, RuntimeError> {
    match pattern {
        TTPattern::Anonymous { .. } => Ok(true),
        TTPattern::Var { .. } => {
            out.push(Value::from(jdg.clone()));
            Ok(true)
        }
        TTPattern::As { pattern, .. } => {
            if !match_is_term(rt, pattern, jdg, out)? {
                return Ok(false);
            }
            out.push(Value::from(jdg.clone()));
            Ok(true)
        }
        TTPattern::Constant { name, .. } => match jdg.term().kind() {
            TermKind::Constant(c) => Ok(c == name),
            _ => Ok(false),
        },
        TTPattern::Spine { head, args, .. } => {
            // Peel the application spine from the outside in.
            let mut cursor = jdg.clone();
            let mut arg_jdgs = Vec::with_capacity(args.len());
            for _ in 0..args.len() {
                match cursor.invert_apply() {
                    Some((h, a)) => {
                        arg_jdgs.push(a);
                        cursor = h;
                    }
                    None => return Ok(false),
                }
            }
            arg_jdgs.reverse();
            if !match_is_term(rt, head, &cursor, out)? {
                return Ok(false);
            }
            for (arg, arg_jdg) in args.iter().zip(&arg_jdgs) {
                if !match_is_term(rt, arg, arg_jdg, out)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        TTPattern::IsTerm { term, ty, .. } => {
            if !match_is_term(rt, term, jdg, out)? {
                return Ok(false);
            }
            match_is_type(rt, ty, &jdg.type_of(), out)
        }
        _ => Err(RuntimeError::impossible(
            "judgement pattern in term position",
            pattern.span(),
        )),
    }
}

/// Match a type judgement; structural patterns go through the type's term
/// of sort `Type`.
fn match_is_type(
    rt: &mut Runtime,
    pattern: &TTPattern,
    jdg: &JdgIsType,
    out: &mut Vec<Value>,
) -> Result<bool, RuntimeError> {
    match pattern {
        TTPattern::Anonymous { .. } => Ok(true),
        TTPattern::Var { .. } => {
            out.push(Value::from(jdg.clone()));
            Ok(true)
        }
        TTPattern::As { pattern, .. } => {
            if !match_is_type(rt, pattern, jdg, out)? {
                return Ok(false);
            }
            out.push(Value::from(jdg.clone()));
            Ok(true)
        }
        TTPattern::Constant { .. } | TTPattern::Spine { .. } => {
            match_is_term(rt, pattern, &jdg.to_is_term(), out)
        }
        _ => Err(RuntimeError::impossible(
            "judgement pattern in type position",
            pattern.span(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflet_lang_nucleus::{Decl, Ident, Ty, mk_type};

    fn constant_jdg(rt: &mut Runtime, name: &str) -> JdgIsTerm {
        let ident = Ident::from_string(name);
        rt.signature.declare(ident.clone(), Decl::Constant(Ty::from(mk_type(None)))).unwrap();
        JdgIsTerm::constant(&rt.signature, &ident, None).unwrap()
    }

    #[test]
    fn metavariable_binds_judgement() {
        let mut rt = Runtime::new();
        let jdg = constant_jdg(&mut rt, "A");
        let pattern = Pattern::Judgement {
            span: None,
            pattern: TTPattern::Var { span: None, name: Ident::from_string("X") },
        };
        let mut out = Vec::new();
        assert!(match_value(&mut rt, &pattern, &Value::from(jdg), &mut out).unwrap());
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Value::Judgement(_)));
    }

    #[test]
    fn constant_pattern_discriminates() {
        let mut rt = Runtime::new();
        let a = constant_jdg(&mut rt, "A");
        let pattern = Pattern::Judgement {
            span: None,
            pattern: TTPattern::IsTerm {
                span: None,
                term: Box::new(TTPattern::Constant {
                    span: None,
                    name: Ident::from_string("A"),
                }),
                ty: Box::new(TTPattern::Anonymous { span: None }),
            },
        };
        let mut out = Vec::new();
        assert!(match_value(&mut rt, &pattern, &Value::from(a.clone()), &mut out).unwrap());

        let b = constant_jdg(&mut rt, "B");
        let mut out = Vec::new();
        assert!(!match_value(&mut rt, &pattern, &Value::from(b), &mut out).unwrap());
        let _ = a;
    }

    #[test]
    fn tuple_pattern_binds_in_order() {
        let mut rt = Runtime::new();
        let pattern = Pattern::Tuple {
            span: None,
            elems: vec![
                Pattern::Var { span: None, name: Ident::from_string("x") },
                Pattern::Str { span: None, value: "hi".to_owned() },
            ],
        };
        let value = Value::Tuple(vec![Value::Str("first".into()), Value::Str("hi".into())]);
        let mut out = Vec::new();
        assert!(match_value(&mut rt, &pattern, &value, &mut out).unwrap());
        assert_eq!(out.len(), 1);
        let value = Value::Tuple(vec![Value::Str("first".into()), Value::Str("no".into())]);
        let mut out = Vec::new();
        assert!(!match_value(&mut rt, &pattern, &value, &mut out).unwrap());
    }
}
