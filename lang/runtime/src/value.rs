use std::cell::RefCell;
use std::rc::Rc;

use pretty::DocAllocator;
use reflet_lang_miette_util::{Span, ToMiette};
use reflet_lang_printer::theme::ThemeExt;
use reflet_lang_nucleus::{
    Abstraction, CellId, Ident, JdgIsTerm, JdgIsType, Judgement,
};
use reflet_lang_printer::{Alloc, Builder, Precedence, Print, PrintCfg};
use reflet_lang_syntax::{Comp, HandlerExpr, Pattern, RecClause};

use crate::RuntimeError;

/// A judgement value: a judgement possibly under a spine of binders.
pub type JdgValue = Abstraction<Judgement>;

/// A runtime value of the ML language.
#[derive(Debug, Clone)]
pub enum Value {
    Judgement(JdgValue),
    Closure(Rc<Closure>),
    /// One member of a mutually recursive closure group; the back-edges to
    /// the siblings go through the shared group, not through cyclic
    /// environments
    RecClosure { group: Rc<RecGroup>, index: usize },
    Handler(Rc<HandlerValue>),
    Tag(Ident, Vec<Value>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Str(String),
    Ref(CellId),
    Dyn(CellId),
    Continuation(Continuation),
}

/// A closure: the captured environment, the argument pattern, and the body.
#[derive(Debug)]
pub struct Closure {
    pub env: Vec<Value>,
    pub pattern: Pattern,
    pub body: Comp,
}

/// A group of mutually recursive closures sharing one captured environment.
#[derive(Debug)]
pub struct RecGroup {
    pub env: Vec<Value>,
    pub clauses: Vec<RecClause>,
}

/// A handler value: the clauses together with the environment they were
/// written in.
#[derive(Debug)]
pub struct HandlerValue {
    pub env: Vec<Value>,
    pub clauses: HandlerExpr,
}

/// A one-shot continuation captured when an operation suspended the caller.
///
/// Resuming takes the captured frames out of the cell; a second resume finds
/// the cell empty and fails.
#[derive(Debug, Clone)]
pub struct Continuation {
    frames: Rc<RefCell<Option<Vec<crate::eval::Frame>>>>,
}

impl Continuation {
    pub(crate) fn new(frames: Vec<crate::eval::Frame>) -> Self {
        Continuation { frames: Rc::new(RefCell::new(Some(frames))) }
    }

    pub(crate) fn resume_frames(
        &self,
        span: Option<Span>,
    ) -> Result<Vec<crate::eval::Frame>, RuntimeError> {
        self.frames
            .borrow_mut()
            .take()
            .ok_or(RuntimeError::ContinuationResumed { span: span.to_miette() })
    }
}

impl Value {
    /// Short description of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Judgement(_) => "a judgement",
            Value::Closure(_) | Value::RecClosure { .. } => "a function",
            Value::Handler(_) => "a handler",
            Value::Tag(..) => "a tag",
            Value::Tuple(_) => "a tuple",
            Value::List(_) => "a list",
            Value::Str(_) => "a string",
            Value::Ref(_) => "a reference",
            Value::Dyn(_) => "a dynamic",
            Value::Continuation(_) => "a continuation",
        }
    }

    /// Unwrap a term judgement, converting a type judgement to its term of
    /// sort `Type`.
    pub fn as_is_term(&self, span: Option<Span>) -> Result<JdgIsTerm, RuntimeError> {
        match self {
            Value::Judgement(Abstraction::NotAbstract(Judgement::IsTerm(j))) => Ok(j.clone()),
            Value::Judgement(Abstraction::NotAbstract(Judgement::IsType(j))) => {
                Ok(j.to_is_term())
            }
            _ => Err(RuntimeError::ExpectedTermJudgement {
                got: self.print_to_string(None),
                span: span.to_miette(),
            }),
        }
    }

    /// Unwrap a type judgement, converting a term judgement of sort `Type`.
    pub fn as_is_type(&self, span: Option<Span>) -> Result<JdgIsType, RuntimeError> {
        match self {
            Value::Judgement(Abstraction::NotAbstract(Judgement::IsType(j))) => Ok(j.clone()),
            Value::Judgement(Abstraction::NotAbstract(Judgement::IsTerm(j))) => {
                j.to_is_type().map_err(RuntimeError::from)
            }
            _ => Err(RuntimeError::ExpectedTypeJudgement {
                got: self.print_to_string(None),
                span: span.to_miette(),
            }),
        }
    }

    /// Unwrap an equality judgement between terms.
    pub fn as_eq_term(
        &self,
        span: Option<Span>,
    ) -> Result<reflet_lang_nucleus::JdgEqTerm, RuntimeError> {
        match self {
            Value::Judgement(Abstraction::NotAbstract(Judgement::EqTerm(j))) => Ok(j.clone()),
            _ => Err(RuntimeError::ExpectedJudgement {
                got: self.print_to_string(None),
                span: span.to_miette(),
            }),
        }
    }

    /// Unwrap an equality judgement between types.
    pub fn as_eq_type(
        &self,
        span: Option<Span>,
    ) -> Result<reflet_lang_nucleus::JdgEqType, RuntimeError> {
        match self {
            Value::Judgement(Abstraction::NotAbstract(Judgement::EqType(j))) => Ok(j.clone()),
            _ => Err(RuntimeError::ExpectedJudgement {
                got: self.print_to_string(None),
                span: span.to_miette(),
            }),
        }
    }

    pub fn as_judgement(&self, span: Option<Span>) -> Result<&JdgValue, RuntimeError> {
        match self {
            Value::Judgement(j) => Ok(j),
            _ => Err(RuntimeError::ExpectedJudgement {
                got: self.print_to_string(None),
                span: span.to_miette(),
            }),
        }
    }
}

impl From<JdgIsTerm> for Value {
    fn from(j: JdgIsTerm) -> Self {
        Value::Judgement(Abstraction::NotAbstract(Judgement::IsTerm(j)))
    }
}

impl From<JdgIsType> for Value {
    fn from(j: JdgIsType) -> Self {
        Value::Judgement(Abstraction::NotAbstract(Judgement::IsType(j)))
    }
}

impl From<Judgement> for Value {
    fn from(j: Judgement) -> Self {
        Value::Judgement(Abstraction::NotAbstract(j))
    }
}

impl Print for Value {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        match self {
            Value::Judgement(j) => j.print_prec(cfg, alloc, prec),
            Value::Closure(_) | Value::RecClosure { .. } => alloc.text("<function>"),
            Value::Handler(_) => alloc.text("<handler>"),
            Value::Tag(tag, args) => {
                if args.is_empty() {
                    alloc.tag(&tag.id)
                } else {
                    alloc
                        .tag(&tag.id)
                        .append(alloc.space())
                        .append(alloc.intersperse(
                            args.iter().map(|v| v.print_prec(cfg, alloc, Precedence::Atom)),
                            alloc.space(),
                        ))
                }
            }
            Value::Tuple(elems) => alloc
                .intersperse(elems.iter().map(|v| v.print(cfg, alloc)), alloc.text(", "))
                .enclose("(", ")"),
            Value::List(elems) => alloc
                .intersperse(elems.iter().map(|v| v.print(cfg, alloc)), alloc.text("; "))
                .enclose("[", "]"),
            Value::Str(s) => alloc.text(format!("{s:?}")),
            Value::Ref(id) => alloc.text(format!("<ref {id}>")),
            Value::Dyn(id) => alloc.text(format!("<dynamic {id}>")),
            Value::Continuation(_) => alloc.text("<continuation>"),
        }
    }
}
