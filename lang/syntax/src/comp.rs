use reflet_lang_miette_util::{HasSpan, Span};
use reflet_lang_nucleus::Ident;

use crate::{Expr, Pattern};

/// An effectful computation.
///
/// Sub-computations are sequenced explicitly with `Let` and `Sequence`;
/// every other argument position is a pure [`Expr`]. Evaluation order is
/// strictly left to right as written.
#[derive(Debug, Clone)]
pub enum Comp {
    /// Lift a pure expression
    Return { span: Option<Span>, expr: Expr },
    /// Apply a closure, a continuation, or a term judgement
    Apply { span: Option<Span>, head: Expr, arg: Expr },
    /// Sequential bindings followed by a body
    Let { span: Option<Span>, bindings: Vec<LetBinding>, body: Box<Comp> },
    /// Mutually recursive closures
    LetRec { span: Option<Span>, clauses: Vec<RecClause>, body: Box<Comp> },
    /// First-match case analysis; no matching case raises a match failure
    Match { span: Option<Span>, scrutinee: Expr, cases: Vec<MatchCase> },
    /// Raise an effect to the innermost handler with a matching clause
    Operation { span: Option<Span>, op: Ident, args: Vec<Expr> },
    /// Install a handler for the dynamic extent of the body
    With { span: Option<Span>, handler: Expr, body: Box<Comp> },
    /// Resume the suspended caller from inside a handler clause
    Yield { span: Option<Span>, expr: Expr },
    /// Allocate a fresh mutable reference cell
    RefAlloc { span: Option<Span>, init: Expr },
    /// Read a reference cell
    RefLookup { span: Option<Span>, reference: Expr },
    /// Overwrite a reference cell
    RefUpdate { span: Option<Span>, reference: Expr, value: Expr },
    /// Push a value onto a dynamic for the extent of the body
    Now { span: Option<Span>, dynamic: Ident, value: Expr, body: Box<Comp> },
    /// Read the current value of a dynamic
    Current { span: Option<Span>, dynamic: Ident },
    /// Check a computation against an ascribed type, coercing if necessary
    Ascribe { span: Option<Span>, comp: Box<Comp>, ty: Box<Comp> },
    /// Abstract the judgement computed by the body over fresh atoms, one per
    /// binder, each annotated with its type computation
    Abstract { span: Option<Span>, binders: Vec<(Ident, Comp)>, body: Box<Comp> },
    /// Instantiate an abstracted judgement with term judgements
    Substitute { span: Option<Span>, comp: Box<Comp>, args: Vec<Comp> },
    /// Evaluate the first computation for its effects, discard its value
    Sequence { span: Option<Span>, first: Box<Comp>, second: Box<Comp> },

    // Term formers. These drive the kernel's smart constructors and yield
    // judgement values.
    /// The universe `Type`
    TTUniverse { span: Option<Span> },
    /// A declared constant or parameterless rule
    TTConstant { span: Option<Span>, name: Ident },
    /// A rule applied to judgement arguments
    TTRule { span: Option<Span>, name: Ident, args: Vec<Comp> },
    /// `λ (x : A) => body`; the annotation may be omitted when ascription
    /// provides it
    TTLambda {
        span: Option<Span>,
        name: Ident,
        annotation: Option<Box<Comp>>,
        body: Box<Comp>,
    },
    /// `Π (x : A) => B`
    TTProd { span: Option<Span>, name: Ident, dom: Box<Comp>, cod: Box<Comp> },
    /// The equality type of two term judgements
    TTEq { span: Option<Span>, lhs: Box<Comp>, rhs: Box<Comp> },
    /// The reflexivity witness of a term judgement
    TTRefl { span: Option<Span>, term: Box<Comp> },
    /// Equality reflection: turn a proof of an equality type into the
    /// corresponding equality judgement
    TTReflect { span: Option<Span>, term: Box<Comp> },
    /// A signature type with labelled, dependent fields
    TTSignature { span: Option<Span>, fields: Vec<(Ident, Comp)> },
    /// A structure against an explicitly computed signature
    TTStructure { span: Option<Span>, sig: Box<Comp>, values: Vec<Comp> },
    /// Projection of a field out of a term of signature type
    TTProjection { span: Option<Span>, term: Box<Comp>, label: Ident },
}

/// One binding of a `let`; later bindings see the values of earlier ones.
#[derive(Debug, Clone)]
pub struct LetBinding {
    pub span: Option<Span>,
    pub pattern: Pattern,
    pub comp: Comp,
}

/// One clause of a `let rec`. All clause names are in scope in every body.
#[derive(Debug, Clone)]
pub struct RecClause {
    pub span: Option<Span>,
    pub name: Ident,
    pub arg: Pattern,
    pub body: Comp,
}

/// One case of a `match` or of a handler clause.
#[derive(Debug, Clone)]
pub struct MatchCase {
    pub span: Option<Span>,
    pub pattern: Pattern,
    pub body: Comp,
}

impl HasSpan for Comp {
    fn span(&self) -> Option<Span> {
        match self {
            Comp::Return { span, .. }
            | Comp::Apply { span, .. }
            | Comp::Let { span, .. }
            | Comp::LetRec { span, .. }
            | Comp::Match { span, .. }
            | Comp::Operation { span, .. }
            | Comp::With { span, .. }
            | Comp::Yield { span, .. }
            | Comp::RefAlloc { span, .. }
            | Comp::RefLookup { span, .. }
            | Comp::RefUpdate { span, .. }
            | Comp::Now { span, .. }
            | Comp::Current { span, .. }
            | Comp::Ascribe { span, .. }
            | Comp::Abstract { span, .. }
            | Comp::Substitute { span, .. }
            | Comp::Sequence { span, .. }
            | Comp::TTUniverse { span }
            | Comp::TTConstant { span, .. }
            | Comp::TTRule { span, .. }
            | Comp::TTLambda { span, .. }
            | Comp::TTProd { span, .. }
            | Comp::TTEq { span, .. }
            | Comp::TTRefl { span, .. }
            | Comp::TTReflect { span, .. }
            | Comp::TTSignature { span, .. }
            | Comp::TTStructure { span, .. }
            | Comp::TTProjection { span, .. } => *span,
        }
    }
}

impl Comp {
    /// Short description used in trace output.
    pub fn head(&self) -> &'static str {
        match self {
            Comp::Return { .. } => "return",
            Comp::Apply { .. } => "apply",
            Comp::Let { .. } => "let",
            Comp::LetRec { .. } => "let rec",
            Comp::Match { .. } => "match",
            Comp::Operation { .. } => "operation",
            Comp::With { .. } => "with",
            Comp::Yield { .. } => "yield",
            Comp::RefAlloc { .. } => "ref",
            Comp::RefLookup { .. } => "lookup",
            Comp::RefUpdate { .. } => "update",
            Comp::Now { .. } => "now",
            Comp::Current { .. } => "current",
            Comp::Ascribe { .. } => "ascribe",
            Comp::Abstract { .. } => "abstract",
            Comp::Substitute { .. } => "substitute",
            Comp::Sequence { .. } => "sequence",
            Comp::TTUniverse { .. } => "tt universe",
            Comp::TTConstant { .. } => "tt constant",
            Comp::TTRule { .. } => "tt rule",
            Comp::TTLambda { .. } => "tt lambda",
            Comp::TTProd { .. } => "tt prod",
            Comp::TTEq { .. } => "tt eq",
            Comp::TTRefl { .. } => "tt refl",
            Comp::TTReflect { .. } => "tt reflect",
            Comp::TTSignature { .. } => "tt signature",
            Comp::TTStructure { .. } => "tt structure",
            Comp::TTProjection { .. } => "tt projection",
        }
    }
}
