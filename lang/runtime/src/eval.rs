//! The cooperative evaluator.
//!
//! Evaluation is a small-step machine over an explicit control stack of
//! [`Frame`]s. Raising an operation searches the stack for the innermost
//! handler with a clause for it; the frames in between, including the
//! handler's own frame, become the captured continuation. Because the
//! handler frame travels with the continuation, resumed computations stay
//! handled: handlers are deep. Errors unwind the whole stack, popping
//! dynamics on the way out.

use std::rc::Rc;

use log::trace;
use reflet_lang_miette_util::{Span, ToMiette};
use reflet_lang_nucleus::{
    AlphaEq, Atom, Decl, Ident, JdgEqTerm, JdgEqType, JdgIsTerm, JdgIsType, NucleusError,
    abstract_judgement, instantiate_abstraction,
};
use reflet_lang_printer::Print;
use reflet_lang_syntax::{Comp, Expr, LetBinding, MatchCase, Pattern};

use crate::equality;
use crate::matching::match_value;
use crate::operations::{self, OP_AS_PROD, OP_COERCE, OP_EQUAL_TERM, OP_EQUAL_TYPE};
use crate::{
    Closure, Continuation, Env, HandlerValue, JdgValue, RecGroup, Runtime, RuntimeError, Value,
};

/// A resumption state of the machine: what remains to be done with the
/// value of the sub-computation currently running above it.
#[derive(Debug)]
pub(crate) enum Frame {
    /// Receive a `let` binding, then run the remaining bindings and body
    Let {
        env: Env,
        pattern: Pattern,
        remaining: Vec<LetBinding>,
        body: Comp,
        span: Option<Span>,
    },
    /// Discard the first computation's value, run the second
    Sequence { env: Env, second: Comp },
    /// The dynamic extent of a `with … handle`
    Handle { handler: Rc<HandlerValue> },
    /// Run the handler's `finally` clauses on the final value
    Finally { handler: Rc<HandlerValue> },
    /// Pop a dynamic on the way out of a `now`. While the frame sits inside
    /// a captured continuation the pushed value is parked in `saved`: the
    /// handler clause runs outside the `now`, and a dropped continuation
    /// must not leave the cell pushed.
    NowPop { cell: usize, saved: Option<Value> },
    /// Receive the ascribed type, then check the body against it
    AscribeBody { env: Env, comp: Comp, span: Option<Span> },
    /// Receive a term judgement and coerce it to the target type
    CoerceTo { target: JdgIsType, span: Option<Span> },
    /// Validate a handler's answer to `coerce`
    CoerceCheck { term: JdgIsTerm, target: JdgIsType, span: Option<Span> },
    /// Validate a handler's answer to `equal_term`
    EqualTermCheck { lhs: JdgIsTerm, rhs: JdgIsTerm, span: Option<Span> },
    /// Validate a handler's answer to `equal_type`
    EqualTypeCheck { lhs: JdgIsType, rhs: JdgIsType, span: Option<Span> },
    /// Validate a handler's answer to `as_prod`, then retry the application
    AsProdCheck { head: JdgIsTerm, arg: Value, span: Option<Span> },
    /// Apply a term judgement to the coerced argument
    ApplyTo { head: JdgIsTerm, span: Option<Span> },
    /// Receive one evaluated rule argument, coerce it to the premise
    RuleArg {
        env: Env,
        head: JdgIsTerm,
        remaining: Vec<Comp>,
        forms_type: bool,
        span: Option<Span>,
    },
    /// Apply the rule head to the coerced argument, continue with the rest
    RuleApply {
        env: Env,
        head: JdgIsTerm,
        remaining: Vec<Comp>,
        forms_type: bool,
        span: Option<Span>,
    },
    /// Receive a lambda's annotation, open the binder, run the body
    TTLambdaBody { env: Env, name: Ident, body: Comp, span: Option<Span> },
    /// Close a lambda over its opened atom
    TTLambdaClose { name: Ident, atom: Atom, span: Option<Span> },
    /// Receive a product's domain, open the binder, run the codomain
    TTProdCod { env: Env, name: Ident, cod: Comp, span: Option<Span> },
    /// Close a product over its opened atom
    TTProdClose { name: Ident, atom: Atom, span: Option<Span> },
    /// Receive the left endpoint of an equality type, run the right one
    TTEqRhs { env: Env, rhs: Comp, span: Option<Span> },
    /// Form the equality type from both endpoints
    TTEqClose { lhs: JdgIsTerm, span: Option<Span> },
    /// Form the reflexivity witness
    TTReflClose { span: Option<Span> },
    /// Reflect a proof of an equality type into an equality judgement
    ReflectClose { span: Option<Span> },
    /// Receive one signature field type, open its atom, run the next field
    SigField {
        env: Env,
        label: Ident,
        done: Vec<(Ident, Atom)>,
        remaining: Vec<(Ident, Comp)>,
        span: Option<Span>,
    },
    /// Receive the signature of a structure literal, run the field values
    StructSig { env: Env, values: Vec<Comp>, span: Option<Span> },
    /// Receive one evaluated field value, coerce it to the field type
    StructValue {
        env: Env,
        sig: JdgIsType,
        done: Vec<JdgIsTerm>,
        remaining: Vec<Comp>,
        span: Option<Span>,
    },
    /// Collect the coerced field value, continue with the rest
    StructCollect {
        env: Env,
        sig: JdgIsType,
        done: Vec<JdgIsTerm>,
        remaining: Vec<Comp>,
        span: Option<Span>,
    },
    /// Form the projection
    ProjClose { label: Ident, span: Option<Span> },
    /// Receive one binder type of an `abstract`, open its atom
    AbstractBinder {
        env: Env,
        name: Ident,
        done: Vec<(Ident, Atom)>,
        remaining: Vec<(Ident, Comp)>,
        body: Comp,
        span: Option<Span>,
    },
    /// Close the abstracted judgement over all opened atoms
    AbstractClose { binders: Vec<(Ident, Atom)>, span: Option<Span> },
    /// Receive the target of a `substitute`, then run the arguments
    SubstArgs { env: Env, remaining: Vec<Comp>, span: Option<Span> },
    /// Receive one evaluated substitution argument, coerce it
    SubstArg { env: Env, target: JdgValue, remaining: Vec<Comp>, span: Option<Span> },
    /// Instantiate the abstraction with the coerced argument
    SubstInst { env: Env, target: JdgValue, remaining: Vec<Comp>, span: Option<Span> },
}

enum Control {
    Eval(Comp, Env),
    Deliver(Value),
}

/// Run a computation to completion in the given environment.
///
/// Operations which reach the bottom of the stack unhandled are answered by
/// the predefined defaults; recoverable errors unwind the stack (popping
/// dynamics) and surface to the caller.
pub fn run(rt: &mut Runtime, env: Env, comp: &Comp) -> Result<Value, RuntimeError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut control = Control::Eval(comp.clone(), env);
    loop {
        let stepped = match control {
            Control::Eval(comp, env) => step(rt, &mut stack, comp, env),
            Control::Deliver(value) => match stack.pop() {
                None => return Ok(value),
                Some(frame) => resume_frame(rt, &mut stack, frame, value),
            },
        };
        match stepped {
            Ok(next) => control = next,
            Err(err) => {
                unwind(rt, &mut stack);
                return Err(err);
            }
        }
    }
}

fn unwind(rt: &mut Runtime, stack: &mut Vec<Frame>) {
    while let Some(frame) = stack.pop() {
        if let Frame::NowPop { cell, saved: None } = frame {
            rt.pop_dynamic(cell);
        }
    }
}

/// Park the dynamics of the frames being captured into a continuation. The
/// suspended `now`s are not in effect while the handler clause runs.
fn capture_dynamics(rt: &mut Runtime, frames: &mut [Frame]) {
    for frame in frames.iter_mut().rev() {
        if let Frame::NowPop { cell, saved } = frame {
            *saved = Some(rt.take_dynamic(*cell));
        }
    }
}

/// Reinstate the parked dynamics of a resumed continuation and splice its
/// frames back onto the stack.
fn reinstall_frames(rt: &mut Runtime, mut frames: Vec<Frame>, stack: &mut Vec<Frame>) {
    for frame in frames.iter_mut() {
        if let Frame::NowPop { cell, saved } = frame {
            if let Some(value) = saved.take() {
                rt.push_dynamic(*cell, value);
            }
        }
    }
    stack.extend(frames);
}

fn match_fail(value: &Value, span: Option<Span>) -> RuntimeError {
    RuntimeError::MatchFail { value: value.print_to_string(None), span: span.to_miette() }
}

/// Evaluate a pure expression in the current environment.
fn eval_expr(env: &Env, expr: &Expr) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Var { span, idx, .. } => env.lookup(*idx, *span),
        Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
        Expr::Tag { tag, args, .. } => {
            let args = args.iter().map(|a| eval_expr(env, a)).collect::<Result<_, _>>()?;
            Ok(Value::Tag(tag.clone(), args))
        }
        Expr::Tuple { elems, .. } => {
            let elems = elems.iter().map(|e| eval_expr(env, e)).collect::<Result<_, _>>()?;
            Ok(Value::Tuple(elems))
        }
        Expr::List { elems, .. } => {
            let elems = elems.iter().map(|e| eval_expr(env, e)).collect::<Result<_, _>>()?;
            Ok(Value::List(elems))
        }
        Expr::Function { pattern, body, .. } => Ok(Value::Closure(Rc::new(Closure {
            env: env.values().clone(),
            pattern: pattern.clone(),
            body: (**body).clone(),
        }))),
        Expr::Handler { handler, .. } => Ok(Value::Handler(Rc::new(HandlerValue {
            env: env.values().clone(),
            clauses: (**handler).clone(),
        }))),
    }
}

fn select_case(
    rt: &mut Runtime,
    cases: &[MatchCase],
    value: &Value,
) -> Result<Option<(Comp, Vec<Value>)>, RuntimeError> {
    for case in cases {
        let mut bindings = Vec::new();
        if match_value(rt, &case.pattern, value, &mut bindings)? {
            return Ok(Some((case.body.clone(), bindings)));
        }
    }
    Ok(None)
}

fn package_args(mut args: Vec<Value>) -> Value {
    if args.len() == 1 { args.pop().expect("length checked") } else { Value::Tuple(args) }
}

/// Raise an operation: find the innermost handler with a clause for it,
/// capture everything in between as the continuation, and enter the clause.
/// Without a handler the predefined default answers.
fn raise_operation(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    op: &Ident,
    args: Vec<Value>,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    trace!("operation {op} raised");
    let position = stack.iter().rposition(|frame| match frame {
        Frame::Handle { handler } => handler.clauses.ops.iter().any(|(name, _)| name == op),
        _ => false,
    });
    match position {
        Some(i) => {
            let mut cont_frames: Vec<Frame> = stack.drain(i..).collect();
            capture_dynamics(rt, &mut cont_frames);
            let handler = match cont_frames.first() {
                Some(Frame::Handle { handler }) => handler.clone(),
                _ => return Err(RuntimeError::impossible("handler frame vanished", span)),
            };
            let continuation = Continuation::new(cont_frames);
            let cases: Vec<MatchCase> = handler
                .clauses
                .ops
                .iter()
                .find(|(name, _)| name == op)
                .map(|(_, cases)| cases.clone())
                .ok_or_else(|| RuntimeError::impossible("handler clause vanished", span))?;
            let packaged = package_args(args);
            match select_case(rt, &cases, &packaged)? {
                Some((body, bindings)) => {
                    let mut env = Env::from_values_and_continuation(
                        handler.env.clone(),
                        continuation.clone(),
                    );
                    env.extend(bindings);
                    // the continuation is also in scope as a value
                    env.push(Value::Continuation(continuation));
                    Ok(Control::Eval(body, env))
                }
                None => Err(match_fail(&packaged, span)),
            }
        }
        None => match operations::default_result(op) {
            Some(value) => Ok(Control::Deliver(value)),
            None => Err(RuntimeError::UnhandledOperation {
                op: op.id.clone(),
                span: span.to_miette(),
            }),
        },
    }
}

/// Dispatch a raised operation, routing the engine's operations through
/// their fast paths and validation frames.
fn begin_operation(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    op: &Ident,
    mut values: Vec<Value>,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    match op.id.as_str() {
        OP_EQUAL_TERM if values.len() == 2 => {
            let rhs = values.pop().expect("length checked").as_is_term(span)?;
            let lhs = values.pop().expect("length checked").as_is_term(span)?;
            if let Some(eq) = JdgEqTerm::alpha(&lhs, &rhs) {
                return Ok(Control::Deliver(operations::some_value(Value::from(
                    reflet_lang_nucleus::Judgement::EqTerm(eq),
                ))));
            }
            stack.push(Frame::EqualTermCheck { lhs: lhs.clone(), rhs: rhs.clone(), span });
            raise_operation(rt, stack, op, vec![Value::from(lhs), Value::from(rhs)], span)
        }
        OP_EQUAL_TYPE if values.len() == 2 => {
            let rhs = values.pop().expect("length checked").as_is_type(span)?;
            let lhs = values.pop().expect("length checked").as_is_type(span)?;
            if let Some(eq) = JdgEqType::alpha(&lhs, &rhs) {
                return Ok(Control::Deliver(operations::some_value(Value::from(
                    reflet_lang_nucleus::Judgement::EqType(eq),
                ))));
            }
            stack.push(Frame::EqualTypeCheck { lhs: lhs.clone(), rhs: rhs.clone(), span });
            raise_operation(rt, stack, op, vec![Value::from(lhs), Value::from(rhs)], span)
        }
        OP_COERCE if values.len() == 2 => {
            let target = values.pop().expect("length checked").as_is_type(span)?;
            let term = values.pop().expect("length checked").as_is_term(span)?;
            coerce_value(rt, stack, term, target, span)
        }
        _ => raise_operation(rt, stack, op, values, span),
    }
}

/// The coercion protocol: α-convertible types succeed immediately, anything
/// else is delegated to the `coerce` operation and the answer is validated.
fn coerce_value(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    term: JdgIsTerm,
    target: JdgIsType,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    if term.ty().alpha_equal(target.ty()) {
        return Ok(Control::Deliver(Value::from(term)));
    }
    stack.push(Frame::CoerceCheck { term: term.clone(), target: target.clone(), span });
    raise_operation(
        rt,
        stack,
        &Ident::from_string(OP_COERCE),
        vec![Value::from(term), Value::from(target)],
        span,
    )
}

/// Apply a value to an argument: closures and continuations on the ML side,
/// term judgements and abstractions on the theory side.
fn apply_value(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    head: Value,
    arg: Value,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    match head {
        Value::Closure(closure) => {
            let mut bindings = Vec::new();
            if !match_value(rt, &closure.pattern, &arg, &mut bindings)? {
                return Err(match_fail(&arg, span));
            }
            let mut env = Env::new(closure.env.clone());
            env.extend(bindings);
            Ok(Control::Eval(closure.body.clone(), env))
        }
        Value::RecClosure { group, index } => {
            let mut env = Env::new(group.env.clone());
            for i in 0..group.clauses.len() {
                env.push(Value::RecClosure { group: group.clone(), index: i });
            }
            let clause = &group.clauses[index];
            let mut bindings = Vec::new();
            if !match_value(rt, &clause.arg, &arg, &mut bindings)? {
                return Err(match_fail(&arg, span));
            }
            env.extend(bindings);
            Ok(Control::Eval(clause.body.clone(), env))
        }
        Value::Continuation(k) => {
            let frames = k.resume_frames(span)?;
            reinstall_frames(rt, frames, stack);
            Ok(Control::Deliver(arg))
        }
        Value::Judgement(JdgValue::NotAbstract(reflet_lang_nucleus::Judgement::IsTerm(
            head_jdg,
        ))) => {
            let head_ty = head_jdg.type_of();
            match head_ty.domain() {
                Some(dom) => {
                    let arg_jdg = arg.as_is_term(span)?;
                    stack.push(Frame::ApplyTo { head: head_jdg, span });
                    stack.push(Frame::CoerceTo { target: dom, span });
                    Ok(Control::Deliver(Value::from(arg_jdg)))
                }
                None => {
                    stack.push(Frame::AsProdCheck { head: head_jdg, arg, span });
                    raise_operation(
                        rt,
                        stack,
                        &Ident::from_string(OP_AS_PROD),
                        vec![Value::from(head_ty)],
                        span,
                    )
                }
            }
        }
        Value::Judgement(target @ JdgValue::Abstract { .. }) => {
            let binder_ty = target.binder_ty().ok_or_else(|| {
                RuntimeError::impossible("abstraction without binder", span)
            })?;
            let arg_jdg = arg.as_is_term(span)?;
            stack.push(Frame::SubstInst {
                env: Env::default(),
                target,
                remaining: Vec::new(),
                span,
            });
            stack.push(Frame::CoerceTo { target: binder_ty, span });
            Ok(Control::Deliver(Value::from(arg_jdg)))
        }
        other => Err(RuntimeError::CannotApply {
            got: other.kind_name().to_owned(),
            span: span.to_miette(),
        }),
    }
}

/// Continue a rule application with the remaining argument computations.
fn rule_continue(
    stack: &mut Vec<Frame>,
    env: Env,
    head: JdgIsTerm,
    mut remaining: Vec<Comp>,
    forms_type: bool,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    if remaining.is_empty() {
        if forms_type {
            return Ok(Control::Deliver(Value::from(head.to_is_type()?)));
        }
        return Ok(Control::Deliver(Value::from(head)));
    }
    let first = remaining.remove(0);
    stack.push(Frame::RuleArg { env: env.clone(), head, remaining, forms_type, span });
    Ok(Control::Eval(first, env))
}

/// Continue a substitution with the remaining argument computations.
fn substitute_continue(
    stack: &mut Vec<Frame>,
    env: Env,
    target: JdgValue,
    mut remaining: Vec<Comp>,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    if remaining.is_empty() {
        return Ok(Control::Deliver(Value::Judgement(target)));
    }
    if target.binder_ty().is_none() {
        return Err(RuntimeError::ExpectedAbstraction {
            got: target.print_to_string(None),
            span: span.to_miette(),
        });
    }
    let first = remaining.remove(0);
    stack.push(Frame::SubstArg { env: env.clone(), target, remaining, span });
    Ok(Control::Eval(first, env))
}

/// Check a computation against a known type. Un-annotated lambdas are
/// pushed through the product structure of the type; everything else is
/// evaluated and coerced.
fn check_comp(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    comp: Comp,
    env: Env,
    target: JdgIsType,
    span: Option<Span>,
) -> Result<Control, RuntimeError> {
    match comp {
        Comp::TTLambda { span: lspan, name, annotation: None, body } => {
            match target.invert_prod(&mut rt.signature) {
                Some((atom, cod)) => {
                    let atom_jdg = JdgIsTerm::atom(&rt.signature, &atom, None)?;
                    let mut env = env;
                    env.push(Value::from(atom_jdg));
                    stack.push(Frame::TTLambdaClose { name, atom, span: lspan });
                    check_comp(rt, stack, *body, env, cod, lspan)
                }
                None => Err(RuntimeError::CannotInferBinder { span: lspan.to_miette() }),
            }
        }
        _ => {
            stack.push(Frame::CoerceTo { target, span });
            Ok(Control::Eval(comp, env))
        }
    }
}

/// One evaluation step of a computation.
fn step(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    comp: Comp,
    env: Env,
) -> Result<Control, RuntimeError> {
    trace!("⊳ {}", comp.head());
    match comp {
        Comp::Return { expr, .. } => Ok(Control::Deliver(eval_expr(&env, &expr)?)),
        Comp::Apply { span, head, arg } => {
            let head = eval_expr(&env, &head)?;
            let arg = eval_expr(&env, &arg)?;
            apply_value(rt, stack, head, arg, span)
        }
        Comp::Let { span, mut bindings, body } => {
            if bindings.is_empty() {
                return Ok(Control::Eval(*body, env));
            }
            let first = bindings.remove(0);
            stack.push(Frame::Let {
                env: env.clone(),
                pattern: first.pattern,
                remaining: bindings,
                body: *body,
                span,
            });
            Ok(Control::Eval(first.comp, env))
        }
        Comp::LetRec { clauses, body, .. } => {
            let group = Rc::new(RecGroup { env: env.values().clone(), clauses });
            let mut env = env;
            for index in 0..group.clauses.len() {
                env.push(Value::RecClosure { group: group.clone(), index });
            }
            Ok(Control::Eval(*body, env))
        }
        Comp::Match { span, scrutinee, cases } => {
            let value = eval_expr(&env, &scrutinee)?;
            match select_case(rt, &cases, &value)? {
                Some((body, bindings)) => {
                    let mut env = env;
                    env.extend(bindings);
                    Ok(Control::Eval(body, env))
                }
                None => Err(match_fail(&value, span)),
            }
        }
        Comp::Operation { span, op, args } => {
            let values =
                args.iter().map(|a| eval_expr(&env, a)).collect::<Result<Vec<_>, _>>()?;
            match rt.signature.lookup(&op) {
                Some(Decl::MLOperation { .. }) => {}
                _ => {
                    return Err(RuntimeError::UnknownOperation {
                        op: op.id.clone(),
                        span: span.to_miette(),
                    });
                }
            }
            begin_operation(rt, stack, &op, values, span)
        }
        Comp::With { span, handler, body } => {
            let handler = match eval_expr(&env, &handler)? {
                Value::Handler(h) => h,
                other => {
                    return Err(RuntimeError::ExpectedHandler {
                        got: other.kind_name().to_owned(),
                        span: span.to_miette(),
                    });
                }
            };
            stack.push(Frame::Handle { handler });
            Ok(Control::Eval(*body, env))
        }
        Comp::Yield { span, expr } => {
            let value = eval_expr(&env, &expr)?;
            let k = env
                .continuation()
                .cloned()
                .ok_or(RuntimeError::NothingToYield { span: span.to_miette() })?;
            let frames = k.resume_frames(span)?;
            reinstall_frames(rt, frames, stack);
            Ok(Control::Deliver(value))
        }
        Comp::RefAlloc { init, .. } => {
            let value = eval_expr(&env, &init)?;
            let cell = rt.alloc_ref(value);
            Ok(Control::Deliver(Value::Ref(cell)))
        }
        Comp::RefLookup { span, reference } => match eval_expr(&env, &reference)? {
            Value::Ref(cell) => Ok(Control::Deliver(rt.lookup_ref(cell))),
            other => Err(RuntimeError::ExpectedReference {
                got: other.print_to_string(None),
                span: span.to_miette(),
            }),
        },
        Comp::RefUpdate { span, reference, value } => {
            let cell = match eval_expr(&env, &reference)? {
                Value::Ref(cell) => cell,
                other => {
                    return Err(RuntimeError::ExpectedReference {
                        got: other.print_to_string(None),
                        span: span.to_miette(),
                    });
                }
            };
            let value = eval_expr(&env, &value)?;
            rt.update_ref(cell, value);
            Ok(Control::Deliver(Value::Tuple(Vec::new())))
        }
        Comp::Now { span, dynamic, value, body } => {
            let cell = rt.dynamic_cell(&dynamic, span)?;
            let value = eval_expr(&env, &value)?;
            rt.push_dynamic(cell, value);
            stack.push(Frame::NowPop { cell, saved: None });
            Ok(Control::Eval(*body, env))
        }
        Comp::Current { span, dynamic } => {
            let cell = rt.dynamic_cell(&dynamic, span)?;
            Ok(Control::Deliver(rt.current_dynamic(cell)))
        }
        Comp::Ascribe { span, comp, ty } => {
            stack.push(Frame::AscribeBody { env: env.clone(), comp: *comp, span });
            Ok(Control::Eval(*ty, env))
        }
        Comp::Abstract { span, mut binders, body } => {
            if binders.is_empty() {
                return Ok(Control::Eval(*body, env));
            }
            let (name, comp) = binders.remove(0);
            stack.push(Frame::AbstractBinder {
                env: env.clone(),
                name,
                done: Vec::new(),
                remaining: binders,
                body: *body,
                span,
            });
            Ok(Control::Eval(comp, env))
        }
        Comp::Substitute { span, comp, args } => {
            stack.push(Frame::SubstArgs { env: env.clone(), remaining: args, span });
            Ok(Control::Eval(*comp, env))
        }
        Comp::Sequence { first, second, .. } => {
            stack.push(Frame::Sequence { env: env.clone(), second: *second });
            Ok(Control::Eval(*first, env))
        }
        Comp::TTUniverse { span } => {
            Ok(Control::Deliver(Value::from(JdgIsType::universe(span))))
        }
        Comp::TTConstant { span, name } => match rt.signature.lookup(&name) {
            Some(Decl::Constant(_)) => Ok(Control::Deliver(Value::from(
                JdgIsTerm::constant(&rt.signature, &name, span)?,
            ))),
            Some(Decl::Rule(rule)) => {
                let forms_type = rule.forms_type() && rule.arity() == 0;
                let head = JdgIsTerm::constant(&rt.signature, &name, span)?;
                if forms_type {
                    Ok(Control::Deliver(Value::from(head.to_is_type()?)))
                } else {
                    Ok(Control::Deliver(Value::from(head)))
                }
            }
            _ => Err(NucleusError::unknown_ident(&name).into()),
        },
        Comp::TTRule { span, name, args } => {
            let (arity, forms_type) = match rt.signature.lookup(&name) {
                Some(Decl::Rule(rule)) => (rule.arity(), rule.forms_type()),
                Some(Decl::Constant(_)) => (args.len(), false),
                _ => return Err(NucleusError::unknown_ident(&name).into()),
            };
            if args.len() != arity {
                return Err(RuntimeError::ArgLenMismatch {
                    name: name.id.clone(),
                    expected: arity,
                    actual: args.len(),
                    span: span.to_miette(),
                });
            }
            let head = JdgIsTerm::constant(&rt.signature, &name, span)?;
            rule_continue(stack, env, head, args, forms_type, span)
        }
        Comp::TTLambda { span, name, annotation, body } => match annotation {
            Some(annotation) => {
                stack.push(Frame::TTLambdaBody { env: env.clone(), name, body: *body, span });
                Ok(Control::Eval(*annotation, env))
            }
            None => Err(RuntimeError::CannotInferBinder { span: span.to_miette() }),
        },
        Comp::TTProd { span, name, dom, cod } => {
            stack.push(Frame::TTProdCod { env: env.clone(), name, cod: *cod, span });
            Ok(Control::Eval(*dom, env))
        }
        Comp::TTEq { span, lhs, rhs } => {
            stack.push(Frame::TTEqRhs { env: env.clone(), rhs: *rhs, span });
            Ok(Control::Eval(*lhs, env))
        }
        Comp::TTRefl { span, term } => {
            stack.push(Frame::TTReflClose { span });
            Ok(Control::Eval(*term, env))
        }
        Comp::TTReflect { span, term } => {
            stack.push(Frame::ReflectClose { span });
            Ok(Control::Eval(*term, env))
        }
        Comp::TTSignature { span, mut fields } => {
            if fields.is_empty() {
                return Ok(Control::Deliver(Value::from(JdgIsType::signature_ty(
                    &rt.signature,
                    &[],
                    span,
                )?)));
            }
            let (label, comp) = fields.remove(0);
            stack.push(Frame::SigField {
                env: env.clone(),
                label,
                done: Vec::new(),
                remaining: fields,
                span,
            });
            Ok(Control::Eval(comp, env))
        }
        Comp::TTStructure { span, sig, values } => {
            stack.push(Frame::StructSig { env: env.clone(), values, span });
            Ok(Control::Eval(*sig, env))
        }
        Comp::TTProjection { span, term, label } => {
            stack.push(Frame::ProjClose { label, span });
            Ok(Control::Eval(*term, env))
        }
    }
}

/// Resume the topmost frame with the value of the computation above it.
fn resume_frame(
    rt: &mut Runtime,
    stack: &mut Vec<Frame>,
    frame: Frame,
    value: Value,
) -> Result<Control, RuntimeError> {
    match frame {
        Frame::Let { env, pattern, mut remaining, body, span } => {
            let mut bindings = Vec::new();
            if !match_value(rt, &pattern, &value, &mut bindings)? {
                return Err(match_fail(&value, span));
            }
            let mut env = env;
            env.extend(bindings);
            if remaining.is_empty() {
                return Ok(Control::Eval(body, env));
            }
            let next = remaining.remove(0);
            stack.push(Frame::Let {
                env: env.clone(),
                pattern: next.pattern,
                remaining,
                body,
                span,
            });
            Ok(Control::Eval(next.comp, env))
        }
        Frame::Sequence { env, second } => Ok(Control::Eval(second, env)),
        Frame::Handle { handler } => {
            if handler.clauses.finally.is_some() {
                stack.push(Frame::Finally { handler: handler.clone() });
            }
            match &handler.clauses.value {
                Some(cases) => match select_case(rt, cases, &value)? {
                    Some((body, bindings)) => {
                        let mut env = Env::new(handler.env.clone());
                        env.extend(bindings);
                        Ok(Control::Eval(body, env))
                    }
                    None => Err(match_fail(&value, None)),
                },
                None => Ok(Control::Deliver(value)),
            }
        }
        Frame::Finally { handler } => {
            let cases = handler
                .clauses
                .finally
                .as_ref()
                .ok_or_else(|| RuntimeError::impossible("finally clause vanished", None))?;
            match select_case(rt, cases, &value)? {
                Some((body, bindings)) => {
                    let mut env = Env::new(handler.env.clone());
                    env.extend(bindings);
                    Ok(Control::Eval(body, env))
                }
                None => Err(match_fail(&value, None)),
            }
        }
        Frame::NowPop { cell, .. } => {
            rt.pop_dynamic(cell);
            Ok(Control::Deliver(value))
        }
        Frame::AscribeBody { env, comp, span } => {
            let target = value.as_is_type(span)?;
            check_comp(rt, stack, comp, env, target, span)
        }
        Frame::CoerceTo { target, span } => {
            let term = value.as_is_term(span)?;
            coerce_value(rt, stack, term, target, span)
        }
        Frame::CoerceCheck { term, target, span } => {
            equality::check_coerce_answer(value, &term, &target, span).map(Control::Deliver)
        }
        Frame::EqualTermCheck { lhs, rhs, span } => {
            equality::check_equal_term_answer(value, &lhs, &rhs, span).map(Control::Deliver)
        }
        Frame::EqualTypeCheck { lhs, rhs, span } => {
            equality::check_equal_type_answer(value, &lhs, &rhs, span).map(Control::Deliver)
        }
        Frame::AsProdCheck { head, arg, span } => {
            let converted = equality::check_as_prod_answer(value, &head, span)?;
            let dom = converted
                .type_of()
                .domain()
                .ok_or_else(|| RuntimeError::impossible("converted head lost its product", span))?;
            let arg_jdg = arg.as_is_term(span)?;
            stack.push(Frame::ApplyTo { head: converted, span });
            stack.push(Frame::CoerceTo { target: dom, span });
            Ok(Control::Deliver(Value::from(arg_jdg)))
        }
        Frame::ApplyTo { head, span } => {
            let coerced = value.as_is_term(span)?;
            Ok(Control::Deliver(Value::from(JdgIsTerm::apply(&head, &coerced, span)?)))
        }
        Frame::RuleArg { env, head, remaining, forms_type, span } => {
            let arg = value.as_is_term(span)?;
            let dom = head
                .type_of()
                .domain()
                .ok_or_else(|| NucleusError::expected_product(head.ty()))?;
            stack.push(Frame::RuleApply { env, head, remaining, forms_type, span });
            stack.push(Frame::CoerceTo { target: dom, span });
            Ok(Control::Deliver(Value::from(arg)))
        }
        Frame::RuleApply { env, head, remaining, forms_type, span } => {
            let coerced = value.as_is_term(span)?;
            let head = JdgIsTerm::apply(&head, &coerced, span)?;
            rule_continue(stack, env, head, remaining, forms_type, span)
        }
        Frame::TTLambdaBody { env, name, body, span } => {
            let annotation = value.as_is_type(span)?;
            let atom = rt.signature.fresh_atom(&name.id, &annotation);
            let mut env = env;
            env.push(Value::from(JdgIsTerm::atom(&rt.signature, &atom, None)?));
            stack.push(Frame::TTLambdaClose { name, atom, span });
            Ok(Control::Eval(body, env))
        }
        Frame::TTLambdaClose { name, atom, span } => {
            let body = value.as_is_term(span)?;
            Ok(Control::Deliver(Value::from(JdgIsTerm::lambda(
                &rt.signature,
                name,
                &atom,
                &body,
                span,
            )?)))
        }
        Frame::TTProdCod { env, name, cod, span } => {
            let dom = value.as_is_type(span)?;
            let atom = rt.signature.fresh_atom(&name.id, &dom);
            let mut env = env;
            env.push(Value::from(JdgIsTerm::atom(&rt.signature, &atom, None)?));
            stack.push(Frame::TTProdClose { name, atom, span });
            Ok(Control::Eval(cod, env))
        }
        Frame::TTProdClose { name, atom, span } => {
            let cod = value.as_is_type(span)?;
            Ok(Control::Deliver(Value::from(JdgIsType::prod(
                &rt.signature,
                name,
                &atom,
                &cod,
            )?)))
        }
        Frame::TTEqRhs { env, rhs, span } => {
            let lhs = value.as_is_term(span)?;
            stack.push(Frame::TTEqClose { lhs: lhs.clone(), span });
            stack.push(Frame::CoerceTo { target: lhs.type_of(), span });
            Ok(Control::Eval(rhs, env))
        }
        Frame::TTEqClose { lhs, span } => {
            let rhs = value.as_is_term(span)?;
            Ok(Control::Deliver(Value::from(JdgIsType::eq(&lhs, &rhs, span)?)))
        }
        Frame::TTReflClose { span } => {
            let term = value.as_is_term(span)?;
            Ok(Control::Deliver(Value::from(JdgIsTerm::refl(&term, span))))
        }
        Frame::ReflectClose { span } => {
            let proof = value.as_is_term(span)?;
            let eq = JdgEqTerm::reflect(&proof)?;
            Ok(Control::Deliver(Value::from(reflet_lang_nucleus::Judgement::EqTerm(eq))))
        }
        Frame::SigField { env, label, mut done, mut remaining, span } => {
            let ty = value.as_is_type(span)?;
            let atom = rt.signature.fresh_atom(&label.id, &ty);
            done.push((label, atom.clone()));
            let mut env = env;
            env.push(Value::from(JdgIsTerm::atom(&rt.signature, &atom, None)?));
            if remaining.is_empty() {
                return Ok(Control::Deliver(Value::from(JdgIsType::signature_ty(
                    &rt.signature,
                    &done,
                    span,
                )?)));
            }
            let (label, comp) = remaining.remove(0);
            stack.push(Frame::SigField { env: env.clone(), label, done, remaining, span });
            Ok(Control::Eval(comp, env))
        }
        Frame::StructSig { env, mut values, span } => {
            let sig = value.as_is_type(span)?;
            let field_count = sig
                .invert_signature()
                .ok_or_else(|| NucleusError::expected_signature(sig.ty()))?
                .len();
            if field_count != values.len() {
                return Err(NucleusError::FieldCountMismatch {
                    expected: field_count,
                    actual: values.len(),
                    span: span.to_miette(),
                }
                .into());
            }
            if values.is_empty() {
                return Ok(Control::Deliver(Value::from(JdgIsTerm::structure(
                    &sig,
                    &[],
                    span,
                )?)));
            }
            let first = values.remove(0);
            stack.push(Frame::StructValue {
                env: env.clone(),
                sig,
                done: Vec::new(),
                remaining: values,
                span,
            });
            Ok(Control::Eval(first, env))
        }
        Frame::StructValue { env, sig, done, remaining, span } => {
            let field = value.as_is_term(span)?;
            let expected = sig.signature_field_ty(done.len(), &done)?;
            stack.push(Frame::StructCollect { env, sig, done, remaining, span });
            stack.push(Frame::CoerceTo { target: expected, span });
            Ok(Control::Deliver(Value::from(field)))
        }
        Frame::StructCollect { env, sig, mut done, mut remaining, span } => {
            done.push(value.as_is_term(span)?);
            if remaining.is_empty() {
                return Ok(Control::Deliver(Value::from(JdgIsTerm::structure(
                    &sig,
                    &done,
                    span,
                )?)));
            }
            let next = remaining.remove(0);
            stack.push(Frame::StructValue { env: env.clone(), sig, done, remaining, span });
            Ok(Control::Eval(next, env))
        }
        Frame::ProjClose { label, span } => {
            let term = value.as_is_term(span)?;
            Ok(Control::Deliver(Value::from(JdgIsTerm::projection(&term, &label, span)?)))
        }
        Frame::AbstractBinder { env, name, mut done, mut remaining, body, span } => {
            let ty = value.as_is_type(span)?;
            let atom = rt.signature.fresh_atom(&name.id, &ty);
            done.push((name, atom.clone()));
            let mut env = env;
            env.push(Value::from(JdgIsTerm::atom(&rt.signature, &atom, None)?));
            if remaining.is_empty() {
                stack.push(Frame::AbstractClose { binders: done, span });
                return Ok(Control::Eval(body, env));
            }
            let (name, comp) = remaining.remove(0);
            stack.push(Frame::AbstractBinder {
                env: env.clone(),
                name,
                done,
                remaining,
                body,
                span,
            });
            Ok(Control::Eval(comp, env))
        }
        Frame::AbstractClose { binders, span } => {
            let mut abstr = value.as_judgement(span)?.clone();
            for (name, atom) in binders.iter().rev() {
                abstr = abstract_judgement(&rt.signature, name.clone(), atom, abstr)?;
            }
            Ok(Control::Deliver(Value::Judgement(abstr)))
        }
        Frame::SubstArgs { env, remaining, span } => {
            let target = value.as_judgement(span)?.clone();
            substitute_continue(stack, env, target, remaining, span)
        }
        Frame::SubstArg { env, target, remaining, span } => {
            let arg = value.as_is_term(span)?;
            let binder_ty = target.binder_ty().ok_or_else(|| {
                RuntimeError::impossible("abstraction without binder", span)
            })?;
            stack.push(Frame::SubstInst { env, target, remaining, span });
            stack.push(Frame::CoerceTo { target: binder_ty, span });
            Ok(Control::Deliver(Value::from(arg)))
        }
        Frame::SubstInst { env, target, remaining, span } => {
            let coerced = value.as_is_term(span)?;
            let target = instantiate_abstraction(&target, &coerced)?;
            substitute_continue(stack, env, target, remaining, span)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflet_lang_nucleus::MLTy;
    use reflet_lang_syntax::HandlerExpr;

    fn ident(name: &str) -> Ident {
        Ident::from_string(name)
    }

    fn ret(expr: Expr) -> Comp {
        Comp::Return { span: None, expr }
    }

    fn str_expr(s: &str) -> Expr {
        Expr::Str { span: None, value: s.to_owned() }
    }

    fn var(idx: usize) -> Expr {
        Expr::Var { span: None, idx: reflet_lang_syntax::Idx(idx), name: ident("_") }
    }

    fn let_one(pattern: Pattern, comp: Comp, body: Comp) -> Comp {
        Comp::Let {
            span: None,
            bindings: vec![LetBinding { span: None, pattern, comp }],
            body: Box::new(body),
        }
    }

    fn var_pattern(name: &str) -> Pattern {
        Pattern::Var { span: None, name: ident(name) }
    }

    #[test]
    fn let_bindings_scope_sequentially() {
        let mut rt = Runtime::new();
        let comp = Comp::Let {
            span: None,
            bindings: vec![
                LetBinding {
                    span: None,
                    pattern: var_pattern("x"),
                    comp: ret(str_expr("a")),
                },
                LetBinding {
                    span: None,
                    pattern: var_pattern("y"),
                    // y sees x
                    comp: ret(var(0)),
                },
            ],
            body: Box::new(ret(Expr::Tuple { span: None, elems: vec![var(1), var(0)] })),
        };
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        match value {
            Value::Tuple(elems) => {
                assert!(matches!(&elems[0], Value::Str(s) if s == "a"));
                assert!(matches!(&elems[1], Value::Str(s) if s == "a"));
            }
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    fn ping_handler(clause_body: Comp) -> Expr {
        Expr::Handler {
            span: None,
            handler: Box::new(HandlerExpr {
                value: None,
                ops: vec![(
                    ident("ping"),
                    vec![MatchCase { span: None, pattern: var_pattern("x"), body: clause_body }],
                )],
                finally: None,
            }),
        }
    }

    fn declare_ping(rt: &mut Runtime) {
        rt.signature
            .declare(
                ident("ping"),
                Decl::MLOperation { arg_tys: vec![MLTy::Str], result_ty: MLTy::Str },
            )
            .unwrap();
    }

    #[test]
    fn deep_handler_resumes_the_continuation() {
        let mut rt = Runtime::new();
        declare_ping(&mut rt);
        // with (handler | ping x => yield "pong")
        // handle (let x = ping "hi" in (x, x))
        let body = let_one(
            var_pattern("x"),
            Comp::Operation { span: None, op: ident("ping"), args: vec![str_expr("hi")] },
            ret(Expr::Tuple { span: None, elems: vec![var(0), var(0)] }),
        );
        let comp = Comp::With {
            span: None,
            handler: ping_handler(Comp::Yield { span: None, expr: str_expr("pong") }),
            body: Box::new(body),
        };
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        match value {
            Value::Tuple(elems) => {
                assert!(matches!(&elems[0], Value::Str(s) if s == "pong"));
                assert!(matches!(&elems[1], Value::Str(s) if s == "pong"));
            }
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    #[test]
    fn dropping_the_continuation_discards_the_body() {
        let mut rt = Runtime::new();
        declare_ping(&mut rt);
        // the clause never yields, so the handle's value is the clause's
        let comp = Comp::With {
            span: None,
            handler: ping_handler(ret(str_expr("cut"))),
            body: Box::new(let_one(
                var_pattern("x"),
                Comp::Operation { span: None, op: ident("ping"), args: vec![str_expr("hi")] },
                ret(str_expr("unreachable")),
            )),
        };
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        assert!(matches!(value, Value::Str(s) if s == "cut"));
    }

    #[test]
    fn continuations_are_one_shot() {
        let mut rt = Runtime::new();
        declare_ping(&mut rt);
        let clause = Comp::Sequence {
            span: None,
            first: Box::new(Comp::Yield { span: None, expr: str_expr("a") }),
            second: Box::new(Comp::Yield { span: None, expr: str_expr("b") }),
        };
        let comp = Comp::With {
            span: None,
            handler: ping_handler(clause),
            body: Box::new(Comp::Operation {
                span: None,
                op: ident("ping"),
                args: vec![str_expr("hi")],
            }),
        };
        let err = run(&mut rt, Env::default(), &comp).unwrap_err();
        assert!(matches!(err, RuntimeError::ContinuationResumed { .. }));
    }

    #[test]
    fn unhandled_operations_get_the_default_answer() {
        let mut rt = Runtime::new();
        operations::register(&mut rt.signature).unwrap();
        rt.signature
            .declare(
                ident("A"),
                Decl::Constant(reflet_lang_nucleus::Ty::from(reflet_lang_nucleus::mk_type(
                    None,
                ))),
            )
            .unwrap();
        let a = Comp::TTConstant { span: None, name: ident("A") };
        // α-equal arguments succeed without any handler
        let comp = let_one(
            var_pattern("x"),
            a.clone(),
            let_one(
                var_pattern("y"),
                a,
                Comp::Operation {
                    span: None,
                    op: ident(OP_EQUAL_TERM),
                    args: vec![var(1), var(0)],
                },
            ),
        );
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        assert!(matches!(&value, Value::Tag(tag, _) if tag.id == operations::TAG_SOME));

        // distinct constants fall through to the default None
        rt.signature
            .declare(
                ident("B"),
                Decl::Constant(reflet_lang_nucleus::Ty::from(reflet_lang_nucleus::mk_type(
                    None,
                ))),
            )
            .unwrap();
        let comp = let_one(
            var_pattern("x"),
            Comp::TTConstant { span: None, name: ident("A") },
            let_one(
                var_pattern("y"),
                Comp::TTConstant { span: None, name: ident("B") },
                Comp::Operation {
                    span: None,
                    op: ident(OP_EQUAL_TERM),
                    args: vec![var(1), var(0)],
                },
            ),
        );
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        assert!(matches!(&value, Value::Tag(tag, args) if tag.id == operations::TAG_NONE && args.is_empty()));
    }

    #[test]
    fn letrec_closures_can_call_themselves() {
        use reflet_lang_syntax::RecClause;
        let mut rt = Runtime::new();
        // let rec drain l = match l with [] -> "done" | _ :: rest -> drain rest
        // in drain ["a"; "b"]
        let clause = RecClause {
            span: None,
            name: ident("drain"),
            arg: var_pattern("l"),
            body: Comp::Match {
                span: None,
                scrutinee: var(0),
                cases: vec![
                    MatchCase {
                        span: None,
                        pattern: Pattern::ListNil { span: None },
                        body: ret(str_expr("done")),
                    },
                    MatchCase {
                        span: None,
                        pattern: Pattern::ListCons {
                            span: None,
                            head: Box::new(Pattern::Anonymous { span: None }),
                            tail: Box::new(var_pattern("rest")),
                        },
                        // env: [drain, l, rest]
                        body: Comp::Apply { span: None, head: var(2), arg: var(0) },
                    },
                ],
            },
        };
        let comp = Comp::LetRec {
            span: None,
            clauses: vec![clause],
            body: Box::new(Comp::Apply {
                span: None,
                head: var(0),
                arg: Expr::List { span: None, elems: vec![str_expr("a"), str_expr("b")] },
            }),
        };
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        assert!(matches!(value, Value::Str(s) if s == "done"));
    }

    #[test]
    fn now_scopes_dynamics_and_pops_on_exit() {
        let mut rt = Runtime::new();
        let cell = rt.alloc_dynamic(Value::Str("outer".into()));
        rt.signature.declare(ident("d"), Decl::Dynamic(cell)).unwrap();
        let comp = Comp::Now {
            span: None,
            dynamic: ident("d"),
            value: str_expr("inner"),
            body: Box::new(Comp::Current { span: None, dynamic: ident("d") }),
        };
        let value = run(&mut rt, Env::default(), &comp).unwrap();
        assert!(matches!(value, Value::Str(s) if s == "inner"));
        // after the body the previous value is visible again
        let value =
            run(&mut rt, Env::default(), &Comp::Current { span: None, dynamic: ident("d") })
                .unwrap();
        assert!(matches!(value, Value::Str(s) if s == "outer"));
    }
}
