//! Module environment records (C4): a scope whose `get`/`has`/`put` are
//! overridden so that import-bound names resolve live-through to an
//! exporting module's bindings, per base spec §4.4.

use crate::diagnostics::{EngineError, ErrorKind};
use crate::scope::{GetResult, Scope, SlotAttributes};
use crate::value::{JsValue, PropertyKey};
use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::OnceLock;

/// A single `import` binding: either a named import or a namespace import
/// (`import * as ns from '...'`).
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub module_request: Rc<str>,
    /// `None` marks a namespace import (`import * as ns`).
    pub import_name: Option<Rc<str>>,
    pub local_name: Rc<str>,
}

/// The external interface a module loader/linker exposes for a single
/// loaded module. Implemented by the (out-of-scope) host; this crate only
/// consumes it.
pub trait ModuleRecord {
    fn get_export_binding(&self, export_name: &str) -> Result<JsValue, EngineError>;
    fn namespace_object(&self) -> JsValue;
}

/// Resolves a module request relative to the referencing module to a stable
/// module key, and returns the cached record if already loaded. Implemented
/// by the (out-of-scope) host loader.
pub trait ModuleLoader {
    fn resolve(&self, module_request: &str, referencing_module: &str) -> Option<Rc<str>>;
    fn get_cached(&self, module_key: &str) -> Option<Rc<dyn ModuleRecord>>;
}

type ImportEntryMap = IndexMap<Rc<str>, ImportEntry>;

struct ModuleScopeInner {
    scope: Scope,
    own_key: Rc<str>,
    import_entries: Vec<ImportEntry>,
    /// Lazily materialized name -> entry map (spec §4.4: "consult the
    /// import-entry table, lazily materialized once").
    import_entry_map: OnceLock<ImportEntryMap>,
    /// Lazily populated, thread-safe-publish cache of resolved source
    /// modules, keyed by local import name (spec §5: "publication-safe
    /// assignment... `std::sync::OnceLock`"). Bindings themselves are never
    /// cached — only the module resolution — since they must stay live.
    resolved_sources: std::cell::RefCell<IndexMap<Rc<str>, OnceLock<Rc<dyn ModuleRecord>>>>,
}

/// A module's top-level scope (C4). Wraps a plain `Scope` (for ordinary
/// local `let`/`const`/`var`/function bindings) and intercepts lookups for
/// names that are import bindings.
#[derive(Clone)]
pub struct ModuleScope(Rc<ModuleScopeInner>);

impl ModuleScope {
    pub fn new(own_key: impl Into<Rc<str>>, import_entries: Vec<ImportEntry>) -> Self {
        ModuleScope(Rc::new(ModuleScopeInner {
            scope: Scope::new(None),
            own_key: own_key.into(),
            import_entries,
            import_entry_map: OnceLock::new(),
            resolved_sources: std::cell::RefCell::new(IndexMap::new()),
        }))
    }

    /// Grants access to the plain scope for defining the module's own
    /// `let`/`const`/`var`/function bindings (export or not).
    pub fn own_scope(&self) -> &Scope {
        &self.0.scope
    }

    fn import_entry_map(&self) -> &ImportEntryMap {
        self.0.import_entry_map.get_or_init(|| {
            self.0
                .import_entries
                .iter()
                .map(|e| (e.local_name.clone(), e.clone()))
                .collect()
        })
    }

    fn resolve_source(
        &self,
        entry: &ImportEntry,
        loader: &dyn ModuleLoader,
    ) -> Result<Rc<dyn ModuleRecord>, EngineError> {
        let mut sources = self.0.resolved_sources.borrow_mut();
        let cell = sources
            .entry(entry.local_name.clone())
            .or_insert_with(OnceLock::new);

        if let Some(existing) = cell.get() {
            return Ok(existing.clone());
        }

        let module_key = loader
            .resolve(&entry.module_request, &self.0.own_key)
            .ok_or_else(|| {
                EngineError::new(
                    ErrorKind::ImportUnresolved,
                    format!("cannot resolve module '{}'", entry.module_request),
                )
            })?;
        let record = loader.get_cached(&module_key).ok_or_else(|| {
            EngineError::new(
                ErrorKind::ImportUnresolved,
                format!("module '{module_key}' is not yet loaded"),
            )
        })?;

        Ok(cell.get_or_init(|| record).clone())
    }

    /// `get(name)`, overridden per base spec §4.4.
    pub fn get(&self, key: &PropertyKey, loader: &dyn ModuleLoader) -> Result<GetResult, EngineError> {
        if let PropertyKey::Name(name) = key {
            if let Some(entry) = self.import_entry_map().get(name.as_ref()).cloned() {
                let source = self.resolve_source(&entry, loader)?;
                return match &entry.import_name {
                    None => Ok(GetResult::Found(source.namespace_object())),
                    Some(export_name) => {
                        Ok(GetResult::Found(source.get_export_binding(export_name)?))
                    }
                };
            }
        }
        Ok(self.0.scope.get_own(key))
    }

    /// `has(name)`: any import name is reported present (base spec §4.4).
    pub fn has(&self, key: &PropertyKey) -> bool {
        if let PropertyKey::Name(name) = key {
            if self.import_entry_map().contains_key(name.as_ref()) {
                return true;
            }
        }
        self.0.scope.has_own(key)
    }

    /// `put(name, value)`: writes to an import name always fail (base spec
    /// §4.4, `ASSIGN_READONLY_IMPORT`).
    pub fn put(&self, key: &PropertyKey, value: JsValue, is_init: bool, strict: bool) -> Result<(), EngineError> {
        if let PropertyKey::Name(name) = key {
            if self.import_entry_map().contains_key(name.as_ref()) {
                return Err(EngineError::new(
                    ErrorKind::AssignReadonlyImport,
                    format!("assignment to imported binding '{name}'"),
                ));
            }
        }
        self.0.scope.put_own(key, value, is_init, strict)
    }

    pub fn define_local(
        &self,
        key: PropertyKey,
        value: JsValue,
        attributes: SlotAttributes,
    ) -> Result<(), String> {
        self.0.scope.define_slot(key, value, attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeModule {
        exports: RefCell<HashMap<String, JsValue>>,
    }

    impl ModuleRecord for FakeModule {
        fn get_export_binding(&self, export_name: &str) -> Result<JsValue, EngineError> {
            self.exports
                .borrow()
                .get(export_name)
                .cloned()
                .ok_or_else(|| EngineError::new(ErrorKind::ImportUnresolved, "no such export"))
        }

        fn namespace_object(&self) -> JsValue {
            JsValue::Undefined
        }
    }

    struct FakeLoader {
        modules: HashMap<String, Rc<dyn ModuleRecord>>,
    }

    impl ModuleLoader for FakeLoader {
        fn resolve(&self, module_request: &str, _referencing_module: &str) -> Option<Rc<str>> {
            Some(Rc::from(module_request))
        }

        fn get_cached(&self, module_key: &str) -> Option<Rc<dyn ModuleRecord>> {
            self.modules.get(module_key).cloned()
        }
    }

    #[test]
    fn import_liveness_reflects_exporter_mutation() {
        let exporter = Rc::new(FakeModule {
            exports: RefCell::new(HashMap::from([("x".to_string(), JsValue::Number(1.0))])),
        });
        let loader = FakeLoader {
            modules: HashMap::from([("./a.js".to_string(), exporter.clone() as Rc<dyn ModuleRecord>)]),
        };

        let importer = ModuleScope::new(
            "./b.js",
            vec![ImportEntry {
                module_request: Rc::from("./a.js"),
                import_name: Some(Rc::from("x")),
                local_name: Rc::from("x"),
            }],
        );

        let key = PropertyKey::name("x");
        assert_eq!(
            importer.get(&key, &loader).unwrap(),
            GetResult::Found(JsValue::Number(1.0))
        );

        exporter
            .exports
            .borrow_mut()
            .insert("x".to_string(), JsValue::Number(2.0));
        assert_eq!(
            importer.get(&key, &loader).unwrap(),
            GetResult::Found(JsValue::Number(2.0))
        );
    }

    #[test]
    fn writing_to_import_name_is_rejected() {
        let loader = FakeLoader {
            modules: HashMap::new(),
        };
        let importer = ModuleScope::new(
            "./b.js",
            vec![ImportEntry {
                module_request: Rc::from("./a.js"),
                import_name: Some(Rc::from("x")),
                local_name: Rc::from("x"),
            }],
        );
        let err = importer
            .put(&PropertyKey::name("x"), JsValue::Number(5.0), false, false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AssignReadonlyImport);
        assert!(importer.has(&PropertyKey::name("x")));
    }

    #[test]
    fn unresolvable_module_request_raises_import_unresolved() {
        struct DeadLoader;
        impl ModuleLoader for DeadLoader {
            fn resolve(&self, _: &str, _: &str) -> Option<Rc<str>> {
                None
            }
            fn get_cached(&self, _: &str) -> Option<Rc<dyn ModuleRecord>> {
                None
            }
        }
        let importer = ModuleScope::new(
            "./b.js",
            vec![ImportEntry {
                module_request: Rc::from("./missing.js"),
                import_name: Some(Rc::from("x")),
                local_name: Rc::from("x"),
            }],
        );
        let err = importer.get(&PropertyKey::name("x"), &DeadLoader).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ImportUnresolved);
    }
}
