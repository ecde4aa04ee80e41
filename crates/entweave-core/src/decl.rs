//! Module declarations
//!
//! The declaration tree is the mutable syntax tree of one module file. The
//! parser produces it, the transform engine rewrites it in place, and the
//! emitters serialize it back out. Woven modules use the same shape, so a
//! woven module can be read back as a reference by later weaves.
//!
//! # Example
//!
//! ```yaml
//! module: fleet
//! classes:
//!   - name: fleet.Vehicle
//!     entity: true
//!     members:
//!       - field: { name: wheels, type: i32 }
//!       - field: { name: _color, type: String }
//!       - property: { name: color, type: String, backing: _color }
//! ```

use serde::{Deserialize, Serialize};

use crate::schema::Role;

/// A module file: the unit of weaving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module identity
    pub module: String,

    /// Paths of already-woven modules whose classes may be used as bases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Present once the module has been woven
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub woven: Option<WovenStamp>,

    /// Class declarations in source order
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
}

/// Stamp recording which weaver produced a woven module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WovenStamp {
    /// Weaver version
    pub weaver: String,
}

/// One class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Qualified class name
    pub name: String,

    /// Candidate marker: the class is a database entity
    #[serde(default, skip_serializing_if = "is_false")]
    pub entity: bool,

    /// Base class name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Type-tower edge: the class whose instances type this class's instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<Member>,

    /// Storage layout, synthesized by weaving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageLayout>,
}

/// A class member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Member {
    /// Plain field
    Field {
        /// Field declaration
        field: FieldDecl,
    },

    /// Property with accessors
    Property {
        /// Property declaration
        property: PropertyDecl,
    },

    /// Method
    Method {
        /// Method declaration
        method: MethodDecl,
    },
}

/// Field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name
    pub name: String,

    /// Declared value type
    #[serde(rename = "type")]
    pub ty: String,

    /// Reserved role this field fills, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Inserted by the weaver
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthesized: bool,
}

/// Property declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    /// Property name
    pub name: String,

    /// Declared value type
    #[serde(rename = "type")]
    pub ty: String,

    /// Backing field the accessors read and write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<String>,

    /// Reserved role this property fills, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Storage slot the accessors are routed through once woven
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,

    /// No setter
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Method name
    pub name: String,

    /// What the method implements
    #[serde(default, skip_serializing_if = "MethodKind::is_plain")]
    pub kind: MethodKind,

    /// User source text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Weaver-synthesized body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesized: Option<SynthesizedBody>,
}

/// What a method implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Ordinary method
    #[default]
    Plain,
    /// Equality
    Equality,
    /// Hash code
    Hash,
}

impl MethodKind {
    fn is_plain(&self) -> bool {
        matches!(self, MethodKind::Plain)
    }
}

/// Body of a synthesized equality or hash method
///
/// Both bodies work on the identity column: equality compares the scalar
/// value in `identity_slot` after a reference short-circuit, hashing hashes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedBody {
    /// Storage slot of the identity column
    pub identity_slot: usize,
}

/// Flattened storage of a woven class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    /// Number of leading slots owned by ancestors
    pub inherited: usize,

    /// All slots, root-to-leaf
    pub slots: Vec<SlotDecl>,
}

/// One storage slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDecl {
    /// Slot index
    pub index: usize,

    /// Attribute stored in the slot
    pub name: String,

    /// Declared value type
    #[serde(rename = "type")]
    pub ty: String,

    /// Role of the attribute
    #[serde(default, skip_serializing_if = "Role::is_user_defined")]
    pub role: Role,
}

impl StorageLayout {
    /// Slot holding the identity column
    pub fn identity_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.role == Role::IdentityColumn)
            .map(|slot| slot.index)
    }

    /// Slot storing the named attribute
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| slot.index)
    }

    /// Slot storing the named attribute among the class's own slots
    pub fn own_slot_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .skip(self.inherited)
            .find(|slot| slot.name == name)
            .map(|slot| slot.index)
    }
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: name.into(),
            references: Vec::new(),
            woven: None,
            classes: Vec::new(),
        }
    }

    /// Find a class declaration by qualified name
    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|class| class.name == name)
    }
}

impl ClassDecl {
    /// Create a class declaration with no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: false,
            extends: None,
            kind: None,
            members: Vec::new(),
            storage: None,
        }
    }

    /// Unqualified name (last path segment)
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Find a method of the given kind
    pub fn method(&self, kind: MethodKind) -> Option<&MethodDecl> {
        self.members.iter().find_map(|member| match member {
            Member::Method { method } if method.kind == kind => Some(method),
            _ => None,
        })
    }
}

impl Member {
    /// Member name
    pub fn name(&self) -> &str {
        match self {
            Member::Field { field } => &field.name,
            Member::Property { property } => &property.name,
            Member::Method { method } => &method.name,
        }
    }

    /// Build a field member
    pub fn field(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Member::Field {
            field: FieldDecl {
                name: name.into(),
                ty: ty.into(),
                role: None,
                synthesized: false,
            },
        }
    }

    /// Build a property member backed by `backing`
    pub fn property(
        name: impl Into<String>,
        ty: impl Into<String>,
        backing: Option<&str>,
    ) -> Self {
        Member::Property {
            property: PropertyDecl {
                name: name.into(),
                ty: ty.into(),
                backing: backing.map(str::to_string),
                role: None,
                slot: None,
                read_only: false,
            },
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
