use std::fmt;

use reflet_lang_miette_util::{HasSpan, Span};
use reflet_lang_nucleus::Ident;

use crate::{Comp, MatchCase, Pattern};

/// A de Bruijn index into the runtime environment; 0 is the innermost
/// binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Idx(pub usize);

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A pure expression. Evaluating an expression never performs an effect and
/// never fails except through ill-formed runtime shapes.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A variable resolved to its environment slot. The name is kept for
    /// diagnostics only.
    Var { span: Option<Span>, idx: Idx, name: Ident },
    /// A string literal
    Str { span: Option<Span>, value: String },
    /// A tag constructor fully applied to its arguments
    Tag { span: Option<Span>, tag: Ident, args: Vec<Expr> },
    Tuple { span: Option<Span>, elems: Vec<Expr> },
    List { span: Option<Span>, elems: Vec<Expr> },
    /// An anonymous function; applying it matches the argument against the
    /// pattern and runs the body
    Function { span: Option<Span>, pattern: Pattern, body: Box<Comp> },
    /// A handler literal
    Handler { span: Option<Span>, handler: Box<HandlerExpr> },
}

/// The clauses of a handler.
///
/// `ops` maps each handled operation to its match cases over the operation's
/// argument tuple; the continuation is delivered through the environment and
/// resumed with `yield`.
#[derive(Debug, Clone)]
pub struct HandlerExpr {
    pub value: Option<Vec<MatchCase>>,
    pub ops: Vec<(Ident, Vec<MatchCase>)>,
    pub finally: Option<Vec<MatchCase>>,
}

impl HasSpan for Expr {
    fn span(&self) -> Option<Span> {
        match self {
            Expr::Var { span, .. }
            | Expr::Str { span, .. }
            | Expr::Tag { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::List { span, .. }
            | Expr::Function { span, .. }
            | Expr::Handler { span, .. } => *span,
        }
    }
}

impl Expr {
    /// Short description used in trace output.
    pub fn head(&self) -> &'static str {
        match self {
            Expr::Var { .. } => "var",
            Expr::Str { .. } => "string",
            Expr::Tag { .. } => "tag",
            Expr::Tuple { .. } => "tuple",
            Expr::List { .. } => "list",
            Expr::Function { .. } => "function",
            Expr::Handler { .. } => "handler",
        }
    }
}
