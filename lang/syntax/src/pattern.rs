use reflet_lang_miette_util::{HasSpan, Span};
use reflet_lang_nucleus::Ident;

/// An ML pattern.
///
/// Variables bind in traversal order; the desugarer numbers the
/// corresponding environment slots accordingly.
#[derive(Debug, Clone)]
pub enum Pattern {
    Anonymous { span: Option<Span> },
    Var { span: Option<Span>, name: Ident },
    As { span: Option<Span>, pattern: Box<Pattern>, name: Ident },
    Tag { span: Option<Span>, tag: Ident, args: Vec<Pattern> },
    Tuple { span: Option<Span>, elems: Vec<Pattern> },
    ListNil { span: Option<Span> },
    ListCons { span: Option<Span>, head: Box<Pattern>, tail: Box<Pattern> },
    Str { span: Option<Span>, value: String },
    /// Match a judgement value against a TT pattern
    Judgement { span: Option<Span>, pattern: TTPattern },
}

/// A pattern over judgements and terms of the theory.
///
/// A variable here is a metavariable: it binds the matched subterm as a
/// judgement, carrying its type along.
#[derive(Debug, Clone)]
pub enum TTPattern {
    Anonymous { span: Option<Span> },
    Var { span: Option<Span>, name: Ident },
    As { span: Option<Span>, pattern: Box<TTPattern>, name: Ident },
    /// A declared constant head
    Constant { span: Option<Span>, name: Ident },
    /// An application spine `c p1 … pn`
    Spine { span: Option<Span>, head: Box<TTPattern>, args: Vec<TTPattern> },
    IsType { span: Option<Span>, ty: Box<TTPattern> },
    IsTerm { span: Option<Span>, term: Box<TTPattern>, ty: Box<TTPattern> },
    EqType { span: Option<Span>, lhs: Box<TTPattern>, rhs: Box<TTPattern> },
    EqTerm {
        span: Option<Span>,
        lhs: Box<TTPattern>,
        rhs: Box<TTPattern>,
        ty: Box<TTPattern>,
    },
    /// Match an abstracted judgement: binds the opened atom (as a term
    /// judgement) when a name is given, then matches the body.
    Abstraction {
        span: Option<Span>,
        name: Option<Ident>,
        body: Box<TTPattern>,
    },
}

impl HasSpan for Pattern {
    fn span(&self) -> Option<Span> {
        match self {
            Pattern::Anonymous { span }
            | Pattern::Var { span, .. }
            | Pattern::As { span, .. }
            | Pattern::Tag { span, .. }
            | Pattern::Tuple { span, .. }
            | Pattern::ListNil { span }
            | Pattern::ListCons { span, .. }
            | Pattern::Str { span, .. }
            | Pattern::Judgement { span, .. } => *span,
        }
    }
}

impl HasSpan for TTPattern {
    fn span(&self) -> Option<Span> {
        match self {
            TTPattern::Anonymous { span }
            | TTPattern::Var { span, .. }
            | TTPattern::As { span, .. }
            | TTPattern::Constant { span, .. }
            | TTPattern::Spine { span, .. }
            | TTPattern::IsType { span, .. }
            | TTPattern::IsTerm { span, .. }
            | TTPattern::EqType { span, .. }
            | TTPattern::EqTerm { span, .. }
            | TTPattern::Abstraction { span, .. } => *span,
        }
    }
}

impl Pattern {
    /// The names this pattern binds, in binding order. Used by the driver to
    /// register top-level values.
    pub fn binders(&self) -> Vec<Ident> {
        let mut out = Vec::new();
        self.collect_binders(&mut out);
        out
    }

    fn collect_binders(&self, out: &mut Vec<Ident>) {
        match self {
            Pattern::Anonymous { .. } | Pattern::ListNil { .. } | Pattern::Str { .. } => {}
            Pattern::Var { name, .. } => out.push(name.clone()),
            Pattern::As { pattern, name, .. } => {
                pattern.collect_binders(out);
                out.push(name.clone());
            }
            Pattern::Tag { args, .. } => {
                for arg in args {
                    arg.collect_binders(out);
                }
            }
            Pattern::Tuple { elems, .. } => {
                for elem in elems {
                    elem.collect_binders(out);
                }
            }
            Pattern::ListCons { head, tail, .. } => {
                head.collect_binders(out);
                tail.collect_binders(out);
            }
            Pattern::Judgement { pattern, .. } => pattern.collect_binders(out),
        }
    }
}

impl TTPattern {
    fn collect_binders(&self, out: &mut Vec<Ident>) {
        match self {
            TTPattern::Anonymous { .. } | TTPattern::Constant { .. } => {}
            TTPattern::Var { name, .. } => out.push(name.clone()),
            TTPattern::As { pattern, name, .. } => {
                pattern.collect_binders(out);
                out.push(name.clone());
            }
            TTPattern::Spine { head, args, .. } => {
                head.collect_binders(out);
                for arg in args {
                    arg.collect_binders(out);
                }
            }
            TTPattern::IsType { ty, .. } => ty.collect_binders(out),
            TTPattern::IsTerm { term, ty, .. } => {
                term.collect_binders(out);
                ty.collect_binders(out);
            }
            TTPattern::EqType { lhs, rhs, .. } => {
                lhs.collect_binders(out);
                rhs.collect_binders(out);
            }
            TTPattern::EqTerm { lhs, rhs, ty, .. } => {
                lhs.collect_binders(out);
                rhs.collect_binders(out);
                ty.collect_binders(out);
            }
            TTPattern::Abstraction { name, body, .. } => {
                if let Some(name) = name {
                    out.push(name.clone());
                }
                body.collect_binders(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binders_are_collected_in_traversal_order() {
        let pattern = Pattern::Tuple {
            span: None,
            elems: vec![
                Pattern::Var { span: None, name: Ident::from_string("x") },
                Pattern::As {
                    span: None,
                    pattern: Box::new(Pattern::Var {
                        span: None,
                        name: Ident::from_string("y"),
                    }),
                    name: Ident::from_string("z"),
                },
            ],
        };
        let names: Vec<String> = pattern.binders().into_iter().map(|n| n.id).collect();
        assert_eq!(names, ["x", "y", "z"]);
    }
}
