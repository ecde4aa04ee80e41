//! Schema extraction
//!
//! Walks the class declarations of a module and builds the [`SchemaModel`]:
//! one entity class per candidate, attributes in declaration order, base
//! links resolved transitively (through plain local classes and into
//! referenced modules). Read-only with respect to the declarations.

use std::collections::{HashMap, HashSet};

use crate::decl::{ClassDecl, Member, MethodKind, Module};
use crate::diagnostic::{Code, Diagnostic, DiagnosticSink, Halted};
use crate::resolve::{ModuleResolver, StubClass};
use crate::schema::{
    Assembly, Attribute, AttributeKind, ClassId, EntityClass, Origin, Role, SchemaModel,
};

/// Outcome of following a class's `extends` chain
enum Base<'m> {
    /// No weavable ancestor
    None,
    /// Nearest weavable ancestor is declared in this module
    Local(&'m str),
    /// Nearest weavable ancestor lives in a referenced module
    External(StubClass),
    /// A base name cannot be found anywhere
    Unresolved(&'m str),
    /// The chain of plain classes loops
    Cycle,
}

/// Build the schema model of `module`
///
/// An unresolvable base aborts the whole module. Other problems fail only the
/// class they are found on; extraction continues with the next class.
pub fn extract(
    module: &Module,
    fingerprint: &str,
    resolver: &dyn ModuleResolver,
    sink: &mut dyn DiagnosticSink,
) -> Result<SchemaModel, Halted> {
    let mut model = SchemaModel::new(Assembly {
        name: module.module.clone(),
        fingerprint: fingerprint.to_string(),
    });

    if module.woven.is_some() {
        sink.emit(Diagnostic::error(
            Code::AlreadyWoven,
            format!("module '{}' has already been woven", module.module),
        ))?;
        return Err(Halted);
    }

    let decls = index_declarations(module, &mut model, sink)?;
    link_bases(module, &decls, resolver, &mut model, sink)?;
    reject_inheritance_cycles(&mut model, sink)?;

    for id in model.local_ids() {
        let Some(decl) = model.get(id).decl_index().map(|i| &module.classes[i]) else {
            continue;
        };
        collect_attributes(decl, id, &mut model, sink)?;
    }
    reject_redeclared_attributes(&mut model, sink)?;

    tracing::debug!(
        "extracted {} entity classes from module '{}'",
        model.local_ids().len(),
        module.module
    );
    Ok(model)
}

fn index_declarations<'m>(
    module: &'m Module,
    model: &mut SchemaModel,
    sink: &mut dyn DiagnosticSink,
) -> Result<HashMap<&'m str, usize>, Halted> {
    let mut decls: HashMap<&str, usize> = HashMap::new();

    for (i, class) in module.classes.iter().enumerate() {
        if decls.contains_key(class.name.as_str()) {
            sink.emit(
                Diagnostic::error(
                    Code::DuplicateClass,
                    format!("class '{}' is declared more than once", class.name),
                )
                .with_class(&class.name),
            )?;
            if let Some(id) = model.lookup(&class.name) {
                model.mark_failed(id);
            }
            continue;
        }

        decls.insert(class.name.as_str(), i);
        if class.entity {
            model.insert(EntityClass {
                kind: class.kind.clone(),
                ..EntityClass::local(&class.name, i)
            });
        }
    }

    Ok(decls)
}

fn link_bases(
    module: &Module,
    decls: &HashMap<&str, usize>,
    resolver: &dyn ModuleResolver,
    model: &mut SchemaModel,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Halted> {
    for id in model.local_ids() {
        let Some(decl) = model.get(id).decl_index().map(|i| &module.classes[i]) else {
            continue;
        };

        let base = match resolve_base(module, decls, decl, resolver) {
            Base::None => None,
            Base::Local(name) => model.lookup(name),
            Base::External(stub) => Some(model.insert(EntityClass {
                is_root: false,
                origin: Origin::External {
                    module: stub.module,
                    slots: stub.slots,
                    equality: stub.equality,
                },
                ..EntityClass::local(stub.name, 0)
            })),
            Base::Unresolved(name) => {
                sink.emit(
                    Diagnostic::error(
                        Code::UnresolvedBase,
                        format!("base class '{name}' cannot be found in this or any referenced module"),
                    )
                    .with_class(&decl.name),
                )?;
                return Err(Halted);
            }
            Base::Cycle => {
                sink.emit(
                    Diagnostic::error(
                        Code::InheritanceCycle,
                        format!("class '{}' inherits from itself", decl.name),
                    )
                    .with_class(&decl.name),
                )?;
                model.mark_failed(id);
                None
            }
        };

        let class = model.get_mut(id);
        class.base = base;
        class.is_root = base.is_none();
    }

    Ok(())
}

fn resolve_base<'m>(
    module: &'m Module,
    decls: &HashMap<&str, usize>,
    class: &'m ClassDecl,
    resolver: &dyn ModuleResolver,
) -> Base<'m> {
    let mut visited = vec![class.name.as_str()];
    let mut next = class.extends.as_deref();

    while let Some(name) = next {
        if visited.contains(&name) {
            return Base::Cycle;
        }
        visited.push(name);

        match decls.get(name) {
            Some(&i) => {
                let decl = &module.classes[i];
                if decl.entity {
                    return Base::Local(decl.name.as_str());
                }
                next = decl.extends.as_deref();
            }
            None => {
                return match resolver.resolve(name) {
                    Some(stub) => Base::External(stub),
                    None => Base::Unresolved(name),
                };
            }
        }
    }

    Base::None
}

// Entity-to-entity links can loop even when every single hop resolves.
fn reject_inheritance_cycles(
    model: &mut SchemaModel,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Halted> {
    let mut cyclic = Vec::new();
    for id in model.local_ids() {
        let mut seen = HashSet::new();
        let mut current = model.get(id).base;
        while let Some(base) = current {
            if base == id {
                cyclic.push(id);
                break;
            }
            if !seen.insert(base) {
                break;
            }
            current = model.get(base).base;
        }
    }

    for id in cyclic {
        if model.get(id).failed {
            continue;
        }
        let name = model.get(id).name.clone();
        sink.emit(
            Diagnostic::error(
                Code::InheritanceCycle,
                format!("class '{name}' inherits from itself"),
            )
            .with_class(&name),
        )?;
        model.mark_failed(id);
    }

    Ok(())
}

fn collect_attributes(
    decl: &ClassDecl,
    id: ClassId,
    model: &mut SchemaModel,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Halted> {
    let backed: HashSet<&str> = decl
        .members
        .iter()
        .filter_map(|member| match member {
            Member::Property { property } => property.backing.as_deref(),
            _ => None,
        })
        .collect();
    let backing_roles: HashMap<&str, Role> = decl
        .members
        .iter()
        .filter_map(|member| match member {
            Member::Field { field } if backed.contains(field.name.as_str()) => field
                .role
                .filter(|role| !role.is_user_defined())
                .map(|role| (field.name.as_str(), role)),
            _ => None,
        })
        .collect();

    let mut attributes = Vec::new();
    let mut has_user_equality = false;
    let mut failed = false;

    for member in &decl.members {
        match member {
            Member::Field { field } if !backed.contains(field.name.as_str()) => {
                attributes.push(Attribute {
                    name: field.name.clone(),
                    kind: AttributeKind::Field,
                    backing_field: None,
                    value_type: field.ty.clone(),
                    role: field.role.unwrap_or_default(),
                    synthesized: field.synthesized,
                });
            }
            Member::Field { .. } => {}
            Member::Property { property } => {
                // Properties without storage are computed and not persisted.
                if let Some(backing) = &property.backing {
                    let own = property.role.filter(|role| !role.is_user_defined());
                    let inherited = backing_roles.get(backing.as_str()).copied();
                    match (own, inherited) {
                        (Some(own), Some(field_role)) if own != field_role => {
                            sink.emit(
                                Diagnostic::error(
                                    Code::AmbiguousRole,
                                    format!(
                                        "property '{}' claims the {} role, but its backing field '{}' claims the {} role",
                                        property.name, own, backing, field_role
                                    ),
                                )
                                .with_class(&decl.name)
                                .with_attribute(&property.name),
                            )?;
                            failed = true;
                        }
                        _ => {}
                    }
                    attributes.push(Attribute {
                        name: property.name.clone(),
                        kind: AttributeKind::Property,
                        backing_field: Some(backing.clone()),
                        value_type: property.ty.clone(),
                        role: own.or(inherited).unwrap_or_default(),
                        synthesized: false,
                    });
                }
            }
            Member::Method { method } => {
                if matches!(method.kind, MethodKind::Equality | MethodKind::Hash)
                    && method.synthesized.is_none()
                {
                    has_user_equality = true;
                }
            }
        }
    }

    let is_root = model.get(id).is_root;
    let mut claimed: HashMap<Role, &str> = HashMap::new();
    for attribute in attributes.iter().filter(|a| !a.role.is_user_defined()) {
        if !is_root {
            sink.emit(
                Diagnostic::error(
                    Code::RoleOverrideOnDerived,
                    format!(
                        "member '{}' claims the {} role, but reserved roles belong to the root of the hierarchy",
                        attribute.name, attribute.role
                    ),
                )
                .with_class(&decl.name)
                .with_attribute(&attribute.name),
            )?;
            failed = true;
        } else if let Some(previous) = claimed.insert(attribute.role, &attribute.name) {
            sink.emit(
                Diagnostic::error(
                    Code::AmbiguousRole,
                    format!(
                        "members '{}' and '{}' both claim the {} role",
                        previous, attribute.name, attribute.role
                    ),
                )
                .with_class(&decl.name)
                .with_attribute(&attribute.name),
            )?;
            failed = true;
        }
    }

    let class = model.get_mut(id);
    class.attributes = attributes;
    class.has_user_equality = has_user_equality;
    if failed {
        class.failed = true;
    }
    Ok(())
}

// Attribute names are unique along a hierarchy, so every name maps to one slot.
// Reserved names are left to the implicit column pass.
fn reject_redeclared_attributes(
    model: &mut SchemaModel,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Halted> {
    for id in model.local_ids() {
        if model.is_blocked(id) {
            continue;
        }

        let mut taken: HashSet<String> = HashSet::new();
        for ancestor in model.lineage(id).into_iter().filter(|a| *a != id) {
            let class = model.get(ancestor);
            match &class.origin {
                Origin::External { slots, .. } => {
                    taken.extend(slots.iter().map(|slot| slot.name.clone()));
                }
                Origin::Local { .. } => {
                    taken.extend(class.attributes.iter().map(|a| a.name.clone()));
                }
            }
        }

        let class = model.get(id);
        let mut own: HashSet<&str> = HashSet::new();
        let mut duplicates: Vec<(String, &str)> = Vec::new();
        for attribute in &class.attributes {
            if Role::for_reserved_name(&attribute.name).is_some() {
                continue;
            }
            if !own.insert(attribute.name.as_str()) {
                duplicates.push((attribute.name.clone(), "is declared more than once"));
            } else if taken.contains(&attribute.name) {
                duplicates.push((attribute.name.clone(), "redeclares an inherited attribute"));
            }
        }
        if duplicates.is_empty() {
            continue;
        }

        let class_name = class.name.clone();
        for (name, problem) in duplicates {
            sink.emit(
                Diagnostic::error(
                    Code::DuplicateAttribute,
                    format!("attribute '{name}' {problem}"),
                )
                .with_class(&class_name)
                .with_attribute(&name),
            )?;
        }
        model.mark_failed(id);
    }

    Ok(())
}
