//! Schema model
//!
//! Passive description of the entity classes of one module, built by the
//! extractor and annotated by the implicit column deriver. The model is owned
//! by a single run and discarded once weaving completes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decl::{SlotDecl, StorageLayout, SynthesizedBody};

/// Reserved column names. User members may never use them.
pub mod reserved {
    /// Identity column
    pub const IDENTITY: &str = "__id";
    /// Type-reference column
    pub const TYPE: &str = "__type";
    /// Type-name column
    pub const TYPE_NAME: &str = "__type_name";
    /// Inherits column
    pub const INHERITS: &str = "__inherits";
}

/// Role an attribute plays in the schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Ordinary user attribute
    #[default]
    #[serde(rename = "user_defined")]
    UserDefined,
    /// Identity column
    #[serde(rename = "identity")]
    IdentityColumn,
    /// Reference to the instance's Type entity
    #[serde(rename = "type")]
    TypeColumn,
    /// Name of the instance's concrete class
    #[serde(rename = "type_name")]
    TypeNameColumn,
    /// Inheritance chain of the instance's class
    #[serde(rename = "inherits")]
    InheritsColumn,
}

impl Role {
    /// The four reserved roles, in the order they are synthesized
    pub const RESERVED: [Role; 4] = [
        Role::IdentityColumn,
        Role::TypeColumn,
        Role::TypeNameColumn,
        Role::InheritsColumn,
    ];

    /// Reserved column name of this role
    pub fn reserved_name(self) -> Option<&'static str> {
        match self {
            Role::UserDefined => None,
            Role::IdentityColumn => Some(reserved::IDENTITY),
            Role::TypeColumn => Some(reserved::TYPE),
            Role::TypeNameColumn => Some(reserved::TYPE_NAME),
            Role::InheritsColumn => Some(reserved::INHERITS),
        }
    }

    /// Reserved role whose column has this name
    pub fn for_reserved_name(name: &str) -> Option<Role> {
        Role::RESERVED
            .into_iter()
            .find(|role| role.reserved_name() == Some(name))
    }

    /// Value type of a synthesized column for this role
    pub fn column_type(self) -> &'static str {
        match self {
            Role::IdentityColumn => "i64",
            Role::TypeColumn => "ref",
            Role::TypeNameColumn | Role::InheritsColumn => "String",
            Role::UserDefined => "",
        }
    }

    /// Whether this is [`Role::UserDefined`]
    pub fn is_user_defined(&self) -> bool {
        matches!(self, Role::UserDefined)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::UserDefined => "user-defined",
            Role::IdentityColumn => "identity",
            Role::TypeColumn => "type",
            Role::TypeNameColumn => "type-name",
            Role::InheritsColumn => "inherits",
        };
        f.write_str(name)
    }
}

/// Whether an attribute is a field or a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Field
    Field,
    /// Property with a backing field
    Property,
}

/// One field/property participating in the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Field or property
    pub kind: AttributeKind,
    /// Backing field (properties only)
    pub backing_field: Option<String>,
    /// Declared value type
    pub value_type: String,
    /// Schema role
    pub role: Role,
    /// Added by the implicit column deriver
    pub synthesized: bool,
}

impl Attribute {
    /// Synthesized reserved column for `role`
    pub fn reserved(role: Role) -> Self {
        Self {
            name: role.reserved_name().unwrap_or_default().to_string(),
            kind: AttributeKind::Field,
            backing_field: None,
            value_type: role.column_type().to_string(),
            role,
            synthesized: true,
        }
    }
}

/// Index of a class in the [`SchemaModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

/// Where an entity class was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Declared in the module being woven, at this index of `Module::classes`
    Local {
        /// Declaration index
        decl: usize,
    },
    /// Minimal stub for a class of an already-woven module
    External {
        /// Module the class was woven in
        module: String,
        /// Flattened storage of the class, root-to-leaf
        slots: Vec<SlotDecl>,
        /// Synthesized equality the class has or inherits
        equality: Option<SynthesizedBody>,
    },
}

/// One weavable class
#[derive(Debug, Clone)]
pub struct EntityClass {
    /// Qualified name
    pub name: String,
    /// Nearest weavable ancestor
    pub base: Option<ClassId>,
    /// Attributes in declaration order
    pub attributes: Vec<Attribute>,
    /// No ancestor is weavable
    pub is_root: bool,
    /// The declaration already defines equality or hashing
    pub has_user_equality: bool,
    /// Type-tower edge
    pub kind: Option<String>,
    /// Declaration site
    pub origin: Origin,
    /// A schema or transform error was reported for this class
    pub failed: bool,
}

impl EntityClass {
    /// Entity declared in the module being woven
    pub fn local(name: impl Into<String>, decl: usize) -> Self {
        Self {
            name: name.into(),
            base: None,
            attributes: Vec::new(),
            is_root: true,
            has_user_equality: false,
            kind: None,
            origin: Origin::Local { decl },
            failed: false,
        }
    }

    /// Declaration index, for local classes
    pub fn decl_index(&self) -> Option<usize> {
        match self.origin {
            Origin::Local { decl } => Some(decl),
            Origin::External { .. } => None,
        }
    }

    /// Whether this is a stub for a class woven elsewhere
    pub fn is_external(&self) -> bool {
        matches!(self.origin, Origin::External { .. })
    }
}

/// The assembly being woven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    /// Module name
    pub name: String,
    /// Content fingerprint of the module bytes
    pub fingerprint: String,
}

/// All entity classes of one module plus stubs for external bases
#[derive(Debug, Clone)]
pub struct SchemaModel {
    /// Assembly being woven
    pub assembly: Assembly,
    classes: Vec<EntityClass>,
    by_name: HashMap<String, ClassId>,
}

impl SchemaModel {
    /// Create an empty model
    pub fn new(assembly: Assembly) -> Self {
        Self {
            assembly,
            classes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Add a class. Names are unique; adding an existing name returns its id.
    pub fn insert(&mut self, class: EntityClass) -> ClassId {
        if let Some(id) = self.by_name.get(&class.name) {
            return *id;
        }
        let id = ClassId(self.classes.len());
        self.by_name.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }

    /// Class by id
    pub fn get(&self, id: ClassId) -> &EntityClass {
        &self.classes[id.0]
    }

    /// Mutable class by id
    pub fn get_mut(&mut self, id: ClassId) -> &mut EntityClass {
        &mut self.classes[id.0]
    }

    /// Class id by qualified name
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// All ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = ClassId> + use<> {
        (0..self.classes.len()).map(ClassId)
    }

    /// Ids of classes declared in this module, in declaration order
    pub fn local_ids(&self) -> Vec<ClassId> {
        self.ids()
            .filter(|id| !self.get(*id).is_external())
            .collect()
    }

    /// Number of classes, stubs included
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the model has no classes
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class and its weavable ancestors, root first
    pub fn lineage(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = vec![id];
        let mut current = self.get(id).base;
        while let Some(base) = current {
            if chain.contains(&base) {
                break;
            }
            chain.push(base);
            current = self.get(base).base;
        }
        chain.reverse();
        chain
    }

    /// Root of the class's hierarchy
    pub fn root_of(&self, id: ClassId) -> ClassId {
        self.lineage(id)[0]
    }

    /// Whether the class or any ancestor has failed
    pub fn is_blocked(&self, id: ClassId) -> bool {
        self.lineage(id).iter().any(|id| self.get(*id).failed)
    }

    /// Mark a class as failed
    pub fn mark_failed(&mut self, id: ClassId) {
        self.get_mut(id).failed = true;
    }

    /// Whether any local class has failed
    pub fn has_failures(&self) -> bool {
        self.classes.iter().any(|class| class.failed)
    }

    /// Flattened root-to-leaf storage of a class
    pub fn layout(&self, id: ClassId) -> StorageLayout {
        let mut slots: Vec<SlotDecl> = Vec::new();
        let mut inherited = 0;
        for ancestor in self.lineage(id) {
            if ancestor == id {
                inherited = slots.len();
            }
            match &self.get(ancestor).origin {
                Origin::External { slots: stub, .. } => slots.extend(stub.iter().cloned()),
                Origin::Local { .. } => {
                    for attribute in &self.get(ancestor).attributes {
                        slots.push(SlotDecl {
                            index: slots.len(),
                            name: attribute.name.clone(),
                            ty: attribute.value_type.clone(),
                            role: attribute.role,
                        });
                    }
                }
            }
        }
        StorageLayout { inherited, slots }
    }

    /// Synthesized equality carried by the class's base when that base was
    /// woven in another module
    pub fn external_equality(&self, id: ClassId) -> Option<SynthesizedBody> {
        let base = self.get(id).base?;
        match &self.get(base).origin {
            Origin::External { equality, .. } => *equality,
            Origin::Local { .. } => None,
        }
    }

    /// Slot of the identity column of the class's hierarchy
    pub fn identity_slot(&self, id: ClassId) -> Option<usize> {
        self.layout(id).identity_slot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SchemaModel {
        SchemaModel::new(Assembly {
            name: "test".to_string(),
            fingerprint: "abc".to_string(),
        })
    }

    fn user(name: &str) -> Attribute {
        Attribute {
            name: name.to_string(),
            kind: AttributeKind::Field,
            backing_field: None,
            value_type: "i32".to_string(),
            role: Role::UserDefined,
            synthesized: false,
        }
    }

    #[test]
    fn test_reserved_names_round_trip() {
        for role in Role::RESERVED {
            let name = role.reserved_name().unwrap();
            assert_eq!(Role::for_reserved_name(name), Some(role));
        }
        assert_eq!(Role::for_reserved_name("id"), None);
        assert_eq!(Role::UserDefined.reserved_name(), None);
    }

    #[test]
    fn test_insert_is_unique_by_name() {
        let mut model = model();
        let a = model.insert(EntityClass::local("m.A", 0));
        let again = model.insert(EntityClass::local("m.A", 3));
        assert_eq!(a, again);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_lineage_is_root_first() {
        let mut model = model();
        let c = model.insert(EntityClass::local("m.C", 0));
        let b = model.insert(EntityClass::local("m.B", 1));
        let a = model.insert(EntityClass::local("m.A", 2));
        model.get_mut(b).base = Some(c);
        model.get_mut(a).base = Some(b);

        assert_eq!(model.lineage(a), vec![c, b, a]);
        assert_eq!(model.root_of(a), c);
    }

    #[test]
    fn test_layout_flattens_root_to_leaf() {
        let mut model = model();
        let root = model.insert(EntityClass::local("m.Root", 0));
        let leaf = model.insert(EntityClass::local("m.Leaf", 1));
        model.get_mut(leaf).base = Some(root);
        model.get_mut(root).attributes = vec![Attribute::reserved(Role::IdentityColumn), user("a")];
        model.get_mut(leaf).attributes = vec![user("b")];

        let layout = model.layout(leaf);
        assert_eq!(layout.inherited, 2);
        let names: Vec<_> = layout.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["__id", "a", "b"]);
        assert_eq!(model.identity_slot(leaf), Some(0));
    }

    #[test]
    fn test_layout_continues_after_external_stub() {
        let mut model = model();
        let stub = model.insert(EntityClass {
            origin: Origin::External {
                module: "core".to_string(),
                slots: vec![SlotDecl {
                    index: 0,
                    name: "__id".to_string(),
                    ty: "i64".to_string(),
                    role: Role::IdentityColumn,
                }],
                equality: None,
            },
            ..EntityClass::local("core.Asset", 0)
        });
        let local = model.insert(EntityClass::local("m.Car", 0));
        model.get_mut(local).base = Some(stub);
        model.get_mut(local).attributes = vec![user("wheels")];

        let layout = model.layout(local);
        assert_eq!(layout.inherited, 1);
        assert_eq!(layout.slot_of("wheels"), Some(1));
        assert_eq!(model.local_ids(), vec![local]);
    }

    #[test]
    fn test_blocked_by_failed_ancestor() {
        let mut model = model();
        let root = model.insert(EntityClass::local("m.Root", 0));
        let leaf = model.insert(EntityClass::local("m.Leaf", 1));
        model.get_mut(leaf).base = Some(root);
        assert!(!model.is_blocked(leaf));
        model.mark_failed(root);
        assert!(model.is_blocked(leaf));
        assert!(model.has_failures());
    }
}
