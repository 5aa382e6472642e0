//! The desugared ML language.
//!
//! This crate defines the syntax the evaluator consumes. It is produced by
//! the external parser/desugarer: variables are already resolved to de
//! Bruijn indices counting into the runtime environment, pattern binders are
//! numbered in traversal order, and all surface sugar is gone.
//!
//! Expressions are pure and evaluate to a value in the current environment;
//! computations may perform effects and are sequenced explicitly.

mod comp;
mod expr;
mod pattern;
mod toplevel;

pub use comp::*;
pub use expr::*;
pub use pattern::*;
pub use toplevel::*;

pub use reflet_lang_miette_util::{HasSpan, Span};
