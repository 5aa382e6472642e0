//! The trusted judgement kernel.
//!
//! This crate is the sole authority on what counts as a valid judgement of
//! the type theory. Terms are built through smart constructors which maintain
//! the assumption-set invariant, and judgements can only be produced by the
//! rule constructors in [`judgement`]. Everything downstream (the evaluator,
//! the equality engine) receives judgements as opaque values and can inspect
//! but never forge them.
//!
//! The equality judgement of the theory admits reflection: a proof of
//! `Eq T e1 e2` can be used to treat `e1` and `e2` as interchangeable at `T`.
//! Type checking is therefore undecidable and the kernel never attempts it on
//! its own; undecided questions are raised as operations by the runtime and
//! the answers are validated here.

mod abstraction;
mod assumptions;
mod ident;
mod judgement;
mod result;
mod signature;
mod term;

pub use abstraction::*;
pub use assumptions::*;
pub use ident::*;
pub use judgement::*;
pub use result::*;
pub use signature::*;
pub use term::*;

pub use reflet_lang_miette_util::{HasSpan, Span};
