use reflet_lang_miette_util::{Span, ToMiette};
use reflet_lang_nucleus::{CellId, Decl, Ident, Signature};
use reflet_lang_syntax::Idx;

use crate::{Continuation, RuntimeError, Value};

/// The process-wide mutable state of a session: the signature, the
/// reference store, and the dynamic store.
///
/// Everything here is touched only from the single-threaded evaluator, so no
/// locking is involved. Each dynamic cell is a stack: `now` pushes for the
/// extent of its body and pops on every exit, normal or not.
#[derive(Debug, Default)]
pub struct Runtime {
    pub signature: Signature,
    refs: Vec<Value>,
    dynamics: Vec<Vec<Value>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_ref(&mut self, value: Value) -> CellId {
        self.refs.push(value);
        self.refs.len() - 1
    }

    pub fn lookup_ref(&self, cell: CellId) -> Value {
        self.refs[cell].clone()
    }

    pub fn update_ref(&mut self, cell: CellId, value: Value) {
        self.refs[cell] = value;
    }

    /// Allocate a dynamic cell with its default value.
    pub fn alloc_dynamic(&mut self, default: Value) -> CellId {
        self.dynamics.push(vec![default]);
        self.dynamics.len() - 1
    }

    pub fn current_dynamic(&self, cell: CellId) -> Value {
        self.dynamics[cell].last().expect("dynamic cell is never empty").clone()
    }

    pub fn push_dynamic(&mut self, cell: CellId, value: Value) {
        self.dynamics[cell].push(value);
    }

    pub fn pop_dynamic(&mut self, cell: CellId) {
        self.dynamics[cell].pop();
    }

    /// Pop a dynamic and hand its value back, so a captured continuation can
    /// reinstate it on resume.
    pub fn take_dynamic(&mut self, cell: CellId) -> Value {
        self.dynamics[cell].pop().expect("dynamic cell is never empty")
    }

    /// Overwrite the default (bottom) value of a dynamic, as a top-level
    /// `now` does for the items that follow.
    pub fn set_dynamic_default(&mut self, cell: CellId, value: Value) {
        self.dynamics[cell][0] = value;
    }

    /// Resolve a declared dynamic name to its cell.
    pub fn dynamic_cell(&self, name: &Ident, span: Option<Span>) -> Result<CellId, RuntimeError> {
        match self.signature.lookup(name) {
            Some(Decl::Dynamic(cell)) => Ok(*cell),
            _ => Err(RuntimeError::UnknownDynamic {
                name: name.id.clone(),
                span: span.to_miette(),
            }),
        }
    }
}

/// The lexical part of the evaluator state: the value stack and, inside a
/// handler clause, the continuation `yield` resumes.
#[derive(Debug, Clone, Default)]
pub struct Env {
    values: Vec<Value>,
    continuation: Option<Continuation>,
}

impl Env {
    pub fn new(values: Vec<Value>) -> Self {
        Env { values, continuation: None }
    }

    pub fn from_values_and_continuation(
        values: Vec<Value>,
        continuation: Continuation,
    ) -> Self {
        Env { values, continuation: Some(continuation) }
    }

    pub fn lookup(&self, idx: Idx, span: Option<Span>) -> Result<Value, RuntimeError> {
        let len = self.values.len();
        if idx.0 < len {
            Ok(self.values[len - 1 - idx.0].clone())
        } else {
            Err(RuntimeError::impossible(format!("unbound variable {idx}"), span))
        }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    /// Snapshot of the value stack, as captured by closures and frames.
    pub fn values(&self) -> &Vec<Value> {
        &self.values
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }
}
