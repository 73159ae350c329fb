//! Vtable construction.

use crate::model::{Class, Method, VtableSlot, OBJECT};

/// Virtual methods of `java/lang/Object`, in dispatch order.
pub const OBJECT_METHODS: [(&str, &str); 11] = [
    ("hashCode", "()I"),
    ("equals", "(Ljava/lang/Object;)Z"),
    ("clone", "()Ljava/lang/Object;"),
    ("getClass", "()Ljava/lang/Class;"),
    ("toString", "()Ljava/lang/String;"),
    ("finalize", "()V"),
    ("notify", "()V"),
    ("notifyAll", "()V"),
    ("wait", "()V"),
    ("wait", "(J)V"),
    ("wait", "(JI)V"),
];

/// The vtable of a direct subclass of `java/lang/Object`.
#[must_use]
pub fn object_vtable() -> Vec<VtableSlot> {
    OBJECT_METHODS
        .iter()
        .map(|(name, desc)| VtableSlot {
            owner: OBJECT.to_string(),
            name: (*name).to_string(),
            desc: (*desc).to_string(),
            is_abstract: false,
        })
        .collect()
}

/// Whether `java/lang/Object` declares `name` and `desc`.
#[must_use]
pub fn is_object_method(name: &str, desc: &str) -> bool {
    name == "<init>" && desc == "()V"
        || OBJECT_METHODS
            .iter()
            .any(|(object_name, object_desc)| *object_name == name && *object_desc == desc)
}

/// Compute the vtable of `class`.
///
/// `inherited` is the superclass vtable and `interfaces` the vtables of the direct
/// superinterfaces in declaration order. Interface slots are appended when new and only
/// replace abstract slots with concrete defaults. Methods declared by `class` replace the
/// slot they override unless they are abstract; the `annotationType()` accessor of an
/// annotation implementation always does.
#[must_use]
pub fn build(class: &Class, inherited: Vec<VtableSlot>, interfaces: &[&[VtableSlot]]) -> Vec<VtableSlot> {
    let mut vtable = inherited;

    for slots in interfaces {
        for slot in *slots {
            match vtable.iter().position(|existing| existing.matches(&slot.name, &slot.desc)) {
                None => vtable.push(slot.clone()),
                Some(index) if vtable[index].is_abstract && !slot.is_abstract => {
                    vtable[index] = slot.clone();
                }
                Some(_) => {}
            }
        }
    }

    for method in class.methods.iter().filter(|method| method.is_virtual()) {
        let slot = VtableSlot::of(&class.name, method);
        match vtable.iter().position(|existing| existing.matches(&method.name, &method.descriptor)) {
            None => vtable.push(slot),
            Some(index) if overrides(method) => vtable[index] = slot,
            Some(_) => {}
        }
    }

    vtable
}

fn overrides(method: &Method) -> bool {
    !method.is_abstract() || method.is_annotation_type()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::flags::AccessFlags;

    fn class(name: &str, methods: &[(&str, &str, AccessFlags)]) -> Class {
        let mut class = Class::new(name, Some(OBJECT), &[], AccessFlags::PUBLIC);
        for (method, desc, access) in methods {
            class
                .methods
                .push(Method::new(*method, *desc, *access).unwrap());
        }
        class
    }

    #[test]
    fn test_override_keeps_single_slot() {
        let base = class("a/B", &[("foo", "()V", AccessFlags::PUBLIC)]);
        let base_vtable = build(&base, object_vtable(), &[]);
        assert_eq!(base_vtable.len(), OBJECT_METHODS.len() + 1);

        let derived = class("a/A", &[("foo", "()V", AccessFlags::PUBLIC)]);
        let derived_vtable = build(&derived, base_vtable.clone(), &[]);
        assert_eq!(derived_vtable.len(), base_vtable.len());

        let slots: Vec<_> = derived_vtable.iter().filter(|slot| slot.matches("foo", "()V")).collect();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].owner, "a/A");
        assert_eq!(base_vtable.last().unwrap().owner, "a/B");
    }

    #[test]
    fn test_interface_default_fills_abstract_slot() {
        let abstract_slot = VtableSlot {
            owner: "a/Base".to_string(),
            name: "run".to_string(),
            desc: "()V".to_string(),
            is_abstract: true,
        };
        let default_slot = VtableSlot {
            owner: "a/Task".to_string(),
            is_abstract: false,
            ..abstract_slot.clone()
        };
        let extra = VtableSlot {
            name: "stop".to_string(),
            ..default_slot.clone()
        };

        let implementor = class("a/Impl", &[]);
        let interface_slots = [default_slot.clone(), extra];
        let vtable = build(&implementor, vec![abstract_slot], &[&interface_slots]);
        assert_eq!(vtable.len(), 2);
        assert_eq!(vtable[0], default_slot);
        assert_eq!(vtable[1].name, "stop");
    }

    #[test]
    fn test_statics_and_constructors_skipped() {
        let class = class(
            "a/C",
            &[
                ("<init>", "()V", AccessFlags::PUBLIC),
                ("<clinit>", "()V", AccessFlags::STATIC),
                ("helper", "()V", AccessFlags::STATIC),
            ],
        );
        assert_eq!(build(&class, object_vtable(), &[]).len(), OBJECT_METHODS.len());
    }

    #[test]
    fn test_abstract_redeclaration_keeps_implementation() {
        let class = class(
            "a/D",
            &[("toString", "()Ljava/lang/String;", AccessFlags::PUBLIC | AccessFlags::ABSTRACT)],
        );
        let vtable = build(&class, object_vtable(), &[]);
        let index = vtable
            .iter()
            .position(|slot| slot.name == "toString")
            .unwrap();
        assert_eq!(vtable[index].owner, OBJECT);
    }

    #[test]
    fn test_object_methods() {
        assert!(is_object_method("hashCode", "()I"));
        assert!(is_object_method("<init>", "()V"));
        assert!(!is_object_method("hashCode", "()J"));
    }
}
