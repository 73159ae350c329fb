//! Class hierarchy resolution.
//!
//! [`resolve`] links every class to its superclass and superinterfaces, computes vtables
//! and binds field and method references in method bodies to the class that declares the
//! member. Classes are processed in dependency order with an explicit work stack; a class
//! whose superclass or an interface is missing (or itself in error) is marked with
//! [`HierarchyState::Error`] and excluded from later phases, without affecting unrelated
//! classes.
//!
//! # Key Components
//!
//! - [`resolve`] - Process the whole class map
//! - [`vtable`] - Vtable construction and the `java/lang/Object` method set
//! - [`find_method_owner`] / [`find_field_owner`] - Member lookup through the hierarchy

pub mod vtable;

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::{
    diagnostics::{DiagnosticCategory, Diagnostics},
    ir::{Instruction, Node},
    model::{naming::sanitize_name, ClassId, ClassMap, HierarchyState, OBJECT},
};

/// Resolve the hierarchy of every class in `classes`.
///
/// Missing superclasses and interfaces are reported to `diagnostics` as warnings; the
/// affected classes end up in [`HierarchyState::Error`].
pub fn resolve(classes: &mut ClassMap, diagnostics: &Diagnostics) {
    for id in classes.ids().collect::<Vec<_>>() {
        process(classes, id, diagnostics);
    }

    let ids: Vec<ClassId> = classes
        .iter()
        .filter(|(_, class)| class.state == HierarchyState::Done)
        .map(|(id, _)| id)
        .collect();
    for id in ids {
        bind_members(classes, id);
        merge_annotation_defaults(classes, id);
    }
}

fn fail(classes: &mut ClassMap, id: ClassId, diagnostics: &Diagnostics, message: String) {
    log::warn!("{}", message);
    diagnostics.warning_for(DiagnosticCategory::Hierarchy, classes[id].original_name.clone(), message);
    classes[id].state = HierarchyState::Error;
}

/// Link the superclass and interfaces of `id`, `false` if one is missing.
fn link(classes: &mut ClassMap, id: ClassId, diagnostics: &Diagnostics) -> bool {
    let name = classes[id].name.clone();
    let super_name = classes[id].super_name.clone();
    let interfaces = classes[id].interfaces.clone();

    let super_class = if super_name == OBJECT {
        None
    } else if let Some(super_id) = classes.lookup(&super_name) {
        Some(super_id)
    } else {
        let message = format!("Failed to find parent class: {} for {}", super_name, name);
        fail(classes, id, diagnostics, message);
        return false;
    };

    let mut interface_classes = Vec::with_capacity(interfaces.len());
    for interface in &interfaces {
        let Some(interface_id) = classes.lookup(interface) else {
            let message = format!("Failed to find interface class: {} for {}", interface, name);
            fail(classes, id, diagnostics, message);
            return false;
        };
        interface_classes.push(interface_id);
    }

    let class = &mut classes[id];
    class.super_class = super_class;
    class.interface_classes = interface_classes;
    true
}

fn process(classes: &mut ClassMap, root: ClassId, diagnostics: &Diagnostics) {
    let mut stack = vec![root];
    while let Some(&id) = stack.last() {
        match classes[id].state {
            HierarchyState::Done | HierarchyState::Error => {
                stack.pop();
                continue;
            }
            HierarchyState::Unvisited => {
                if !link(classes, id, diagnostics) {
                    stack.pop();
                    continue;
                }
                classes[id].state = HierarchyState::InProgress;
            }
            HierarchyState::InProgress => {}
        }

        let class = &classes[id];
        let parents: Vec<ClassId> = class
            .super_class
            .into_iter()
            .chain(class.interface_classes.iter().copied())
            .collect();

        if let Some(&failed) = parents
            .iter()
            .find(|parent| classes[**parent].state == HierarchyState::Error)
        {
            let message = format!(
                "Class {} depends on {} which has hierarchy errors",
                classes[id].name, classes[failed].name
            );
            fail(classes, id, diagnostics, message);
            stack.pop();
            continue;
        }

        let pending: Vec<ClassId> = parents
            .iter()
            .copied()
            .filter(|parent| classes[*parent].state != HierarchyState::Done)
            .collect();
        if pending
            .iter()
            .any(|parent| classes[*parent].state == HierarchyState::InProgress)
        {
            let message = format!("Cyclic class hierarchy at {}", classes[id].name);
            fail(classes, id, diagnostics, message);
            stack.pop();
            continue;
        }
        if !pending.is_empty() {
            stack.extend(pending);
            continue;
        }

        let class = &classes[id];
        let inherited = match class.super_class {
            Some(super_id) => classes[super_id].vtable.clone(),
            None => vtable::object_vtable(),
        };
        let interface_vtables: Vec<&[_]> = class
            .interface_classes
            .iter()
            .map(|interface| classes[*interface].vtable.as_slice())
            .collect();
        let vtable = vtable::build(class, inherited, &interface_vtables);

        let class = &mut classes[id];
        log::debug!("Resolved hierarchy of {} ({} vtable slots)", class.name, vtable.len());
        class.vtable = vtable;
        class.state = HierarchyState::Done;
        stack.pop();
    }
}

/// The class declaring method `name`/`desc` as seen from `owner`.
///
/// Searches the superclass chain first, then `java/lang/Object` (which is not in the map),
/// then every superinterface breadth first, preferring a default method over an abstract
/// declaration.
#[must_use]
pub fn find_method_owner(classes: &ClassMap, owner: &str, name: &str, desc: &str) -> Option<String> {
    let mut interfaces = VecDeque::new();
    let mut current = classes.by_name(owner);
    while let Some(class) = current {
        if class.find_method(name, desc).is_some() {
            return Some(class.name.clone());
        }
        interfaces.extend(class.interfaces.iter().cloned());
        current = classes.by_name(&class.super_name);
    }
    if vtable::is_object_method(name, desc) {
        return Some(OBJECT.to_string());
    }

    let mut seen = FxHashSet::default();
    let mut declared = None;
    while let Some(interface) = interfaces.pop_front() {
        if !seen.insert(interface.clone()) {
            continue;
        }
        let Some(class) = classes.by_name(&interface) else {
            continue;
        };
        if let Some(method) = class.find_method(name, desc) {
            if !method.is_abstract() {
                return Some(class.name.clone());
            }
            declared.get_or_insert_with(|| class.name.clone());
        }
        interfaces.extend(class.interfaces.iter().cloned());
    }
    declared
}

/// The class declaring field `name`/`desc` as seen from `owner`.
///
/// Follows the lookup order of field resolution: the class itself, its superinterfaces,
/// then the superclass.
#[must_use]
pub fn find_field_owner(classes: &ClassMap, owner: &str, name: &str, desc: &str) -> Option<String> {
    let mut queue = VecDeque::from([owner.to_string()]);
    let mut seen = FxHashSet::default();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let Some(class) = classes.by_name(&current) else {
            continue;
        };
        if class.find_field(name, desc).is_some() {
            return Some(class.name.clone());
        }
        queue.extend(class.interfaces.iter().cloned());
        queue.push_back(class.super_name.clone());
    }
    None
}

fn walk_mut(nodes: &mut [Node], visit: &mut impl FnMut(&mut Instruction)) {
    for node in nodes {
        match &mut node.insn {
            Instruction::Group(members) => walk_mut(members, visit),
            insn => visit(insn),
        }
    }
}

fn lookup(classes: &ClassMap, insn: &Instruction) -> Option<String> {
    match insn {
        Instruction::Invoke { method, .. } => {
            find_method_owner(classes, &method.owner, &method.name, &method.desc)
        }
        Instruction::Field { field, kind, .. } => {
            let owner = find_field_owner(classes, &field.owner, &field.name, &field.desc);
            // Instance fields always live in a class, never in an interface.
            if kind.is_static() {
                owner
            } else {
                owner.filter(|owner| classes.by_name(owner).is_some_and(|class| !class.is_interface()))
            }
        }
        _ => None,
    }
}

/// Record the declaring class of every member referenced in the bodies of `id`.
fn bind_members(classes: &mut ClassMap, id: ClassId) {
    let mut resolved = Vec::new();
    for method in &classes[id].methods {
        if let Some(body) = &method.body {
            body.for_each_instruction(|insn| {
                if matches!(insn, Instruction::Invoke { .. } | Instruction::Field { .. }) {
                    resolved.push(lookup(classes, insn));
                }
            });
        }
    }

    let mut resolved = resolved.into_iter();
    for method in &mut classes[id].methods {
        if let Some(body) = &mut method.body {
            walk_mut(&mut body.nodes, &mut |insn| match insn {
                Instruction::Invoke { resolved: slot, .. } | Instruction::Field { resolved: slot, .. } => {
                    *slot = resolved.next().flatten();
                }
                _ => {}
            });
        }
    }
}

fn merge_annotation_defaults(classes: &mut ClassMap, id: ClassId) {
    let class = &classes[id];
    let mut types = FxHashSet::default();
    for annotation in class
        .annotations
        .iter()
        .chain(class.fields.iter().flat_map(|field| field.annotations.iter()))
        .chain(class.methods.iter().flat_map(|method| method.annotations.iter()))
    {
        types.insert(sanitize_name(&annotation.type_name));
    }

    let defaults: Vec<_> = types
        .into_iter()
        .filter_map(|name| {
            classes
                .by_name(&name)
                .and_then(|annotation_class| annotation_class.default_annotation.clone())
                .map(|defaults| (name, defaults))
        })
        .collect();
    if defaults.is_empty() {
        return;
    }

    let class = &mut classes[id];
    let annotations = class
        .annotations
        .iter_mut()
        .chain(class.fields.iter_mut().flat_map(|field| field.annotations.iter_mut()))
        .chain(class.methods.iter_mut().flat_map(|method| method.annotations.iter_mut()));
    for annotation in annotations {
        let name = sanitize_name(&annotation.type_name);
        if let Some((_, defaults)) = defaults.iter().find(|(type_name, _)| *type_name == name) {
            annotation.merge_defaults(defaults);
        }
    }
}
