use reflet_lang_miette_util::{HasSpan, Span};
use reflet_lang_nucleus::{Ident, MLTy};

use crate::{Comp, LetBinding, RecClause};

/// A desugared top-level item, executed by the driver in order.
#[derive(Debug, Clone)]
pub enum TopItem {
    /// Bind values into the persistent global environment
    TopLet { span: Option<Span>, bindings: Vec<LetBinding> },
    /// Bind mutually recursive closures into the global environment
    TopLetRec { span: Option<Span>, clauses: Vec<RecClause> },
    /// Run a computation for its value and effects
    TopDo { span: Option<Span>, comp: Comp },
    /// Run a computation which is expected to fail with a recoverable error
    TopFail { span: Option<Span>, comp: Comp },
    /// Declare a dynamic variable with its default value
    TopDynamic { span: Option<Span>, name: Ident, init: Comp },
    /// Replace the default value of a dynamic for subsequent items
    TopNow { span: Option<Span>, name: Ident, value: Comp },
    /// Declare an operation with its argument and result types
    DeclOperation {
        span: Option<Span>,
        name: Ident,
        arg_tys: Vec<MLTy>,
        result_ty: MLTy,
    },
    /// Declare a primitive constant; the computation produces its type
    DeclConstant { span: Option<Span>, name: Ident, ty: Comp },
    /// Declare a derivation rule. Premises without a type computation range
    /// over types; a missing conclusion declares a type-forming rule.
    DeclRule {
        span: Option<Span>,
        name: Ident,
        premises: Vec<RulePremise>,
        conclusion: Option<Comp>,
    },
    /// Declare an ML sum type by its constructors and arities
    DeclMLType {
        span: Option<Span>,
        name: Ident,
        constructors: Vec<(Ident, usize)>,
    },
}

/// One premise of a rule declaration. The type computation is evaluated with
/// the earlier premises in scope as fresh atoms; `None` makes the premise
/// range over types.
#[derive(Debug, Clone)]
pub struct RulePremise {
    pub span: Option<Span>,
    pub name: Ident,
    pub ty: Option<Comp>,
}

impl HasSpan for TopItem {
    fn span(&self) -> Option<Span> {
        match self {
            TopItem::TopLet { span, .. }
            | TopItem::TopLetRec { span, .. }
            | TopItem::TopDo { span, .. }
            | TopItem::TopFail { span, .. }
            | TopItem::TopDynamic { span, .. }
            | TopItem::TopNow { span, .. }
            | TopItem::DeclOperation { span, .. }
            | TopItem::DeclConstant { span, .. }
            | TopItem::DeclRule { span, .. }
            | TopItem::DeclMLType { span, .. } => *span,
        }
    }
}
