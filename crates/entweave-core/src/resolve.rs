//! Cross-module class resolution
//!
//! Base classes may live in other, already-woven modules. The extractor only
//! needs a minimal stub for them: that the class exists, that it is weavable,
//! and the storage it occupies.

use std::collections::HashMap;

use crate::decl::{ClassDecl, MethodKind, Module, SlotDecl, SynthesizedBody};

/// Minimal description of a class woven in another module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubClass {
    /// Qualified class name
    pub name: String,
    /// Module the class was woven in
    pub module: String,
    /// Flattened storage, root-to-leaf
    pub slots: Vec<SlotDecl>,
    /// Synthesized identity equality the class has or inherits
    pub equality: Option<SynthesizedBody>,
}

/// Resolves class names that are not declared in the module being woven
pub trait ModuleResolver {
    /// Stub for a weavable class, or `None` if no referenced module has it
    fn resolve(&self, class: &str) -> Option<StubClass>;
}

/// Resolver for modules without references
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ModuleResolver for NoReferences {
    fn resolve(&self, _class: &str) -> Option<StubClass> {
        None
    }
}

/// Referenced module that has not been woven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwovenModule(pub String);

/// In-memory index of stubs collected from referenced modules
#[derive(Debug, Default, Clone)]
pub struct StubIndex {
    classes: HashMap<String, StubClass>,
}

impl StubIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stub
    pub fn insert(&mut self, stub: StubClass) {
        self.classes.insert(stub.name.clone(), stub);
    }

    /// Index every woven entity class of a module; returns how many were added
    pub fn index_module(&mut self, module: &Module) -> Result<usize, UnwovenModule> {
        if module.woven.is_none() {
            return Err(UnwovenModule(module.module.clone()));
        }

        let mut added = 0;
        for class in module.classes.iter().filter(|class| class.entity) {
            if let Some(storage) = &class.storage {
                self.insert(StubClass {
                    name: class.name.clone(),
                    module: module.module.clone(),
                    slots: storage.slots.clone(),
                    equality: synthesized_equality(module, class),
                });
                added += 1;
            }
        }
        Ok(added)
    }

    /// Number of indexed classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// Equality of the class or its nearest base that declares one. A user-written
// method hides any synthesized one further up.
fn synthesized_equality(module: &Module, class: &ClassDecl) -> Option<SynthesizedBody> {
    let mut current = class;
    for _ in 0..=module.classes.len() {
        if let Some(method) = current.method(MethodKind::Equality) {
            return method.synthesized;
        }
        current = module.class(current.extends.as_deref()?)?;
    }
    None
}

impl ModuleResolver for StubIndex {
    fn resolve(&self, class: &str) -> Option<StubClass> {
        self.classes.get(class).cloned()
    }
}
