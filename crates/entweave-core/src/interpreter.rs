//! Woven member interpreter
//!
//! Evaluates the members the weaver synthesizes directly on a woven module:
//! slot-routed accessors and identity-based equality and hashing. User-written
//! bodies are source text and cannot be evaluated.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::decl::{ClassDecl, Member, MethodDecl, MethodKind, Module};
use crate::error::{Error, Result};

/// An object of a woven class
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    object: u64,
    class: String,
    slots: Vec<Value>,
}

impl Instance {
    /// Object reference; unique per instantiation
    pub fn object(&self) -> u64 {
        self.object
    }

    /// Qualified class name
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Storage slots
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }
}

/// Interpreter over one woven module
pub struct Interpreter<'m> {
    module: &'m Module,
    next_object: u64,
}

impl<'m> Interpreter<'m> {
    /// Create an interpreter for `module`
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            next_object: 1,
        }
    }

    fn class(&self, name: &str) -> Result<&'m ClassDecl> {
        self.module
            .class(name)
            .ok_or_else(|| Error::UnknownClass(name.to_string()))
    }

    /// New object with every slot null
    pub fn instantiate(&mut self, class: &str) -> Result<Instance> {
        let decl = self.class(class)?;
        let slots = decl.storage.as_ref().map_or(0, |storage| storage.slots.len());
        let object = self.next_object;
        self.next_object += 1;
        Ok(Instance {
            object,
            class: decl.name.clone(),
            slots: vec![Value::Null; slots],
        })
    }

    fn slot_of(&self, instance: &Instance, member: &str) -> Result<usize> {
        let decl = self.class(&instance.class)?;
        let rerouted = decl.members.iter().find_map(|m| match m {
            Member::Property { property } if property.name == member => property.slot,
            _ => None,
        });
        rerouted
            .or_else(|| decl.storage.as_ref().and_then(|s| s.slot_of(member)))
            .ok_or_else(|| unknown_member(instance, member))
    }

    /// Read a stored member
    ///
    /// A member routed to a slot the instance does not have is unknown.
    pub fn get<'i>(&self, instance: &'i Instance, member: &str) -> Result<&'i Value> {
        let slot = self.slot_of(instance, member)?;
        instance
            .slots
            .get(slot)
            .ok_or_else(|| unknown_member(instance, member))
    }

    /// Write a stored member
    pub fn set(&self, instance: &mut Instance, member: &str, value: Value) -> Result<()> {
        let slot = self.slot_of(instance, member)?;
        let Some(stored) = instance.slots.get_mut(slot) else {
            return Err(unknown_member(instance, member));
        };
        *stored = value;
        Ok(())
    }

    // The class's own method of `kind`, else the nearest ancestor's.
    fn method_of(&self, class: &str, kind: MethodKind) -> Result<Option<&'m MethodDecl>> {
        let mut decl = self.class(class)?;
        for _ in 0..=self.module.classes.len() {
            if let Some(method) = decl.method(kind) {
                return Ok(Some(method));
            }
            match decl.extends.as_deref().and_then(|base| self.module.class(base)) {
                Some(base) => decl = base,
                None => break,
            }
        }
        Ok(None)
    }

    fn identity_slot(&self, class: &str) -> Option<usize> {
        self.module
            .class(class)?
            .storage
            .as_ref()?
            .identity_slot()
    }

    /// Evaluate `a.equals(b)`
    ///
    /// Classes without any equality method compare by reference.
    pub fn equals(&self, a: &Instance, b: &Instance) -> Result<bool> {
        let Some(method) = self.method_of(&a.class, MethodKind::Equality)? else {
            return Ok(a.object == b.object);
        };
        let Some(body) = method.synthesized else {
            return Err(Error::OpaqueBody {
                class: a.class.clone(),
                method: method.name.clone(),
            });
        };

        let Some(other_slot) = self.identity_slot(&b.class) else {
            return Ok(false);
        };
        if a.object == b.object {
            return Ok(true);
        }
        Ok(a.slots.get(body.identity_slot) == b.slots.get(other_slot))
    }

    /// Evaluate `a.hash_code()`
    pub fn hash_code(&self, a: &Instance) -> Result<u64> {
        let mut hasher = DefaultHasher::new();
        match self.method_of(&a.class, MethodKind::Hash)? {
            None => a.object.hash(&mut hasher),
            Some(method) => {
                let body = method.synthesized.ok_or_else(|| Error::OpaqueBody {
                    class: a.class.clone(),
                    method: method.name.clone(),
                })?;
                let identity = a.slots.get(body.identity_slot).unwrap_or(&Value::Null);
                serde_json::to_string(identity)?.hash(&mut hasher);
            }
        }
        Ok(hasher.finish())
    }
}

fn unknown_member(instance: &Instance, member: &str) -> Error {
    Error::UnknownMember {
        class: instance.class.clone(),
        member: member.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeaverSetup;
    use crate::parser::Parser;
    use crate::pipeline::weave_module;
    use crate::resolve::NoReferences;
    use crate::schema::reserved;
    use proptest::prelude::*;
    use serde_json::json;

    const FLEET: &str = r#"
module: fleet
classes:
  - name: fleet.Vehicle
    entity: true
    members:
      - field: { name: _color, type: String }
      - property: { name: color, type: String, backing: _color }
  - name: fleet.Car
    entity: true
    extends: fleet.Vehicle
    members:
      - field: { name: doors, type: i32 }
  - name: fleet.Money
    entity: true
    members:
      - method: { name: equals, kind: equality, body: "self.amount == other.amount" }
  - name: fleet.Note
"#;

    fn woven() -> Module {
        let mut module = Parser::new().parse_yaml(FLEET).unwrap();
        weave_module(
            &mut module,
            "fp",
            &NoReferences,
            &WeaverSetup::new("fleet.yaml"),
            &mut Vec::new(),
        )
        .unwrap();
        assert!(module.woven.is_some());
        module
    }

    #[test]
    fn test_accessors_go_through_slots() {
        let module = woven();
        let mut interpreter = Interpreter::new(&module);
        let mut car = interpreter.instantiate("fleet.Car").unwrap();

        interpreter.set(&mut car, "color", json!("red")).unwrap();
        interpreter.set(&mut car, "doors", json!(4)).unwrap();

        assert_eq!(interpreter.get(&car, "color").unwrap(), &json!("red"));
        assert_eq!(car.slots()[4], json!("red"));
        assert_eq!(car.slots()[5], json!(4));
        assert!(matches!(
            interpreter.get(&car, "_color"),
            Err(Error::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_reference_short_circuit_before_identity() {
        let module = woven();
        let mut interpreter = Interpreter::new(&module);
        let a = interpreter.instantiate("fleet.Vehicle").unwrap();
        assert!(interpreter.get(&a, reserved::IDENTITY).unwrap().is_null());
        assert!(interpreter.equals(&a, &a).unwrap());
    }

    #[test]
    fn test_other_without_identity_is_never_equal() {
        let module = woven();
        let mut interpreter = Interpreter::new(&module);
        let a = interpreter.instantiate("fleet.Vehicle").unwrap();
        let note = interpreter.instantiate("fleet.Note").unwrap();
        assert!(!interpreter.equals(&a, &note).unwrap());
    }

    #[test]
    fn test_derived_class_inherits_equality() {
        let module = woven();
        let mut interpreter = Interpreter::new(&module);
        let mut vehicle = interpreter.instantiate("fleet.Vehicle").unwrap();
        let mut car = interpreter.instantiate("fleet.Car").unwrap();
        interpreter.set(&mut vehicle, reserved::IDENTITY, json!(7)).unwrap();
        interpreter.set(&mut car, reserved::IDENTITY, json!(7)).unwrap();

        assert!(interpreter.equals(&car, &vehicle).unwrap());
        assert_eq!(
            interpreter.hash_code(&car).unwrap(),
            interpreter.hash_code(&vehicle).unwrap()
        );
    }

    #[test]
    fn test_user_body_is_opaque() {
        let module = woven();
        let mut interpreter = Interpreter::new(&module);
        let money = interpreter.instantiate("fleet.Money").unwrap();
        assert!(matches!(
            interpreter.equals(&money, &money),
            Err(Error::OpaqueBody { .. })
        ));
    }

    #[test]
    fn test_slot_outside_storage_is_unknown_member() {
        let yaml = r#"
module: hand
classes:
  - name: hand.Tag
    entity: true
    members:
      - property: { name: label, type: String, slot: 3 }
"#;
        let module = Parser::new().parse_yaml(yaml).unwrap();
        let mut interpreter = Interpreter::new(&module);
        let mut tag = interpreter.instantiate("hand.Tag").unwrap();
        assert!(tag.slots().is_empty());

        assert!(matches!(
            interpreter.get(&tag, "label"),
            Err(Error::UnknownMember { .. })
        ));
        assert!(matches!(
            interpreter.set(&mut tag, "label", json!("x")),
            Err(Error::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_unknown_class() {
        let module = woven();
        let mut interpreter = Interpreter::new(&module);
        assert!(matches!(
            interpreter.instantiate("fleet.Plane"),
            Err(Error::UnknownClass(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_equality_follows_identity(a_id in any::<i64>(), b_id in any::<i64>()) {
            let module = woven();
            let mut interpreter = Interpreter::new(&module);
            let mut a = interpreter.instantiate("fleet.Vehicle").unwrap();
            let mut b = interpreter.instantiate("fleet.Vehicle").unwrap();
            interpreter.set(&mut a, reserved::IDENTITY, json!(a_id)).unwrap();
            interpreter.set(&mut b, reserved::IDENTITY, json!(b_id)).unwrap();

            prop_assert_eq!(interpreter.equals(&a, &b).unwrap(), a_id == b_id);
            prop_assert!(interpreter.equals(&a, &a).unwrap());
        }

        #[test]
        fn prop_equal_objects_hash_alike(id in any::<i64>(), shared in any::<bool>(), other in any::<i64>()) {
            let module = woven();
            let mut interpreter = Interpreter::new(&module);
            let mut a = interpreter.instantiate("fleet.Vehicle").unwrap();
            let mut b = interpreter.instantiate("fleet.Car").unwrap();
            interpreter.set(&mut a, reserved::IDENTITY, json!(id)).unwrap();
            interpreter.set(&mut b, reserved::IDENTITY, json!(if shared { id } else { other })).unwrap();

            if interpreter.equals(&a, &b).unwrap() {
                prop_assert_eq!(interpreter.hash_code(&a).unwrap(), interpreter.hash_code(&b).unwrap());
            }
        }
    }
}
