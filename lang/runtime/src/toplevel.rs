//! The top-level driver.
//!
//! Consumes a stream of desugared top-level items against one persistent
//! session: the global environment, the signature, and the mutable stores
//! survive from item to item. Each item runs in a fresh evaluation whose
//! initial environment is the global one.

use std::rc::Rc;

use log::{debug, info};
use reflet_lang_miette_util::ToMiette;
use reflet_lang_nucleus::{
    Atom, Decl, Ident, JdgIsTerm, JdgIsType, MLSchema, MLTy, Rule,
};
use reflet_lang_printer::Print;
use reflet_lang_syntax::{Comp, Idx, TopItem};

use crate::matching::match_value;
use crate::{Env, RecGroup, Runtime, RuntimeError, Value, operations, run};

/// Session configuration. The verbosity level only affects diagnostic
/// output.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub verbosity: u8,
}

/// A running session: the process-wide state plus the persistent global
/// environment.
#[derive(Debug)]
pub struct Driver {
    rt: Runtime,
    globals: Vec<Value>,
    config: Config,
}

impl Driver {
    /// Start a session with the predefined operations registered.
    pub fn new(config: Config) -> Result<Driver, RuntimeError> {
        let mut rt = Runtime::new();
        operations::register(&mut rt.signature)?;
        Ok(Driver { rt, globals: Vec::new(), config })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    /// Resolve a top-level name to the de Bruijn index it has at the start
    /// of the next item. This is the lookup the external desugarer performs
    /// when numbering variables.
    pub fn resolve(&self, name: &Ident) -> Option<Idx> {
        match self.rt.signature.lookup(name)? {
            Decl::MLValue { slot, .. } => Some(Idx(self.globals.len() - 1 - slot)),
            _ => None,
        }
    }

    /// Run a computation in the global environment.
    pub fn run_comp(&mut self, comp: &Comp) -> Result<Value, RuntimeError> {
        run(&mut self.rt, Env::new(self.globals.clone()), comp)
    }

    /// Execute a stream of items, stopping at the first error.
    pub fn execute(&mut self, items: &[TopItem]) -> Result<(), RuntimeError> {
        for item in items {
            self.use_item(item)?;
        }
        Ok(())
    }

    pub fn use_item(&mut self, item: &TopItem) -> Result<(), RuntimeError> {
        match item {
            TopItem::TopLet { bindings, .. } => {
                for binding in bindings {
                    let value = self.run_comp(&binding.comp)?;
                    let mut bound = Vec::new();
                    if !match_value(&mut self.rt, &binding.pattern, &value, &mut bound)? {
                        return Err(RuntimeError::MatchFail {
                            value: value.print_to_string(None),
                            span: binding.span.to_miette(),
                        });
                    }
                    for (name, value) in binding.pattern.binders().into_iter().zip(bound) {
                        self.declare_value(name, value)?;
                    }
                }
                Ok(())
            }
            TopItem::TopLetRec { clauses, .. } => {
                let group =
                    Rc::new(RecGroup { env: self.globals.clone(), clauses: clauses.clone() });
                for (index, clause) in clauses.iter().enumerate() {
                    self.declare_value(
                        clause.name.clone(),
                        Value::RecClosure { group: group.clone(), index },
                    )?;
                }
                Ok(())
            }
            TopItem::TopDo { comp, .. } => {
                let value = self.run_comp(comp)?;
                if self.config.verbosity > 0 {
                    info!("{}", value.print_to_string(None));
                }
                Ok(())
            }
            TopItem::TopFail { comp, span } => match self.run_comp(comp) {
                Ok(value) => {
                    debug!("unexpected success: {}", value.print_to_string(None));
                    Err(RuntimeError::ExpectedFailure { span: span.to_miette() })
                }
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    if self.config.verbosity > 0 {
                        info!("failed as expected: {err}");
                    }
                    Ok(())
                }
            },
            TopItem::TopDynamic { name, init, .. } => {
                let value = self.run_comp(init)?;
                let cell = self.rt.alloc_dynamic(value);
                self.rt.signature.declare(name.clone(), Decl::Dynamic(cell))?;
                // the dynamic is also in scope as a first-class value
                self.globals.push(Value::Dyn(cell));
                Ok(())
            }
            TopItem::TopNow { name, value, span } => {
                let value = self.run_comp(value)?;
                let cell = self.rt.dynamic_cell(name, *span)?;
                self.rt.set_dynamic_default(cell, value);
                Ok(())
            }
            TopItem::DeclOperation { name, arg_tys, result_ty, .. } => {
                self.rt.signature.declare(
                    name.clone(),
                    Decl::MLOperation {
                        arg_tys: arg_tys.clone(),
                        result_ty: result_ty.clone(),
                    },
                )?;
                Ok(())
            }
            TopItem::DeclConstant { name, ty, span } => {
                let ty = self.run_comp(ty)?.as_is_type(*span)?;
                self.rt.signature.declare(name.clone(), Decl::Constant(ty.ty().clone()))?;
                debug!("constant {name} declared");
                Ok(())
            }
            TopItem::DeclRule { name, premises, conclusion, span } => {
                let mut env_values = self.globals.clone();
                let mut atoms: Vec<(Ident, Atom)> = Vec::with_capacity(premises.len());
                for premise in premises {
                    let ty = match &premise.ty {
                        None => JdgIsType::universe(None),
                        Some(comp) => {
                            let env = Env::new(env_values.clone());
                            run(&mut self.rt, env, comp)?.as_is_type(premise.span)?
                        }
                    };
                    let atom = self.rt.signature.fresh_atom(&premise.name.id, &ty);
                    env_values
                        .push(Value::from(JdgIsTerm::atom(&self.rt.signature, &atom, None)?));
                    atoms.push((premise.name.clone(), atom));
                }
                let conclusion = match conclusion {
                    None => None,
                    Some(comp) => {
                        let env = Env::new(env_values.clone());
                        Some(run(&mut self.rt, env, comp)?.as_is_type(*span)?)
                    }
                };
                let rule = Rule::from_atoms(&self.rt.signature, &atoms, conclusion.as_ref())?;
                self.rt.signature.declare(name.clone(), Decl::Rule(rule))?;
                debug!("rule {name} declared");
                Ok(())
            }
            TopItem::DeclMLType { name, constructors, .. } => {
                self.rt.signature.declare(
                    name.clone(),
                    Decl::MLType { constructors: constructors.clone() },
                )?;
                Ok(())
            }
        }
    }

    fn declare_value(&mut self, name: Ident, value: Value) -> Result<(), RuntimeError> {
        let slot = self.globals.len();
        self.globals.push(value);
        let scheme = MLSchema { params: 1, ty: MLTy::Param(0) };
        self.rt.signature.declare_ml_value(name, scheme, slot)?;
        Ok(())
    }
}
