//! Scope and binding core for an ECMAScript engine: activation records,
//! block-scoped declaration lowering, and module environment records, all
//! built on a single ordered-slot scope object.
//!
//! Ground truth:
//! 1. A scope's slots preserve insertion order; enumeration order is
//!    observable through `for-in` and the arguments iterator.
//! 2. A `TDZ` read/write is a reference/type error distinct from reading an
//!    undeclared name.
//! 3. A `CONST_BINDING` slot accepts exactly one store; every later store
//!    raises `ASSIGN_CONST`, strict mode or not.
//! 4. An activation is a scope; its caller link is non-owning and may
//!    dangle once the caller frame returns.
//! 5. The node transformer never raises for structurally valid input; only
//!    `eval`/`arguments` assignment under strict mode produces a
//!    diagnostic. Everything else that goes wrong there is this crate's own
//!    bug.
//! 6. A module scope's imported names are live-through reads and rejected
//!    writes; only the module's own locals are ordinary scope slots.

pub mod activation;
pub mod bits;
pub mod diagnostics;
pub mod frontend;
pub mod ir;
pub mod module_scope;
pub mod scope;
pub mod transformer;
pub mod value;

pub use activation::{Activation, ArgumentsMode, ArgumentsObject, FunctionDescriptor, FunctionFlags, LocalBinding, LocalKind};
pub use diagnostics::{CollectingDiagnostics, DiagnosticSink, EngineError, EngineResult, ErrorCategory, ErrorKind};
pub use ir::{IrKind, IrNode, LoopShape};
pub use module_scope::{ImportEntry, ModuleLoader, ModuleRecord, ModuleScope};
pub use scope::{GetResult, Scope, SlotAttributes, SlotValue};
pub use transformer::{transform, TransformContext};
pub use value::{JsObject, JsValue, PropertyKey};

#[cfg(test)]
mod end_to_end_tests;
