//! Removal of methods unreachable from the seed set.
//!
//! The analysis is a call graph fixed point over resolved call targets. Virtual dispatch is
//! approximated by name and descriptor: once any non-static method with a given key is
//! used, every required class keeps its method with that key. Classes reached through
//! reflection or other unmodeled dispatch must be listed as keep patterns; every method of
//! a kept class is a seed and none of them is removed.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    hierarchy::{find_method_owner, vtable::OBJECT_METHODS},
    model::{ClassId, ClassMap, Method, MethodKey},
};

type MethodId = (ClassId, usize);

fn is_seed(class_is_annotation_impl: bool, is_main_class: bool, method: &Method) -> bool {
    method.is_static_initializer()
        || method.is_finalizer()
        || method.is_native()
        || method.is_constructor()
        || method.intrinsic
        || (is_main_class && method.is_main())
        || (class_is_annotation_impl && method.is_public())
}

struct Reachability<'a> {
    classes: &'a ClassMap,
    by_key: FxHashMap<MethodKey, Vec<MethodId>>,
    used: FxHashSet<MethodId>,
    used_keys: FxHashSet<MethodKey>,
    worklist: Vec<MethodId>,
}

impl<'a> Reachability<'a> {
    fn new(classes: &'a ClassMap, required: &[ClassId]) -> Self {
        let mut by_key: FxHashMap<MethodKey, Vec<MethodId>> = FxHashMap::default();
        for &id in required {
            for (index, method) in classes[id].methods.iter().enumerate() {
                if !method.is_static() {
                    by_key.entry(method.key()).or_default().push((id, index));
                }
            }
        }
        Reachability {
            classes,
            by_key,
            used: FxHashSet::default(),
            used_keys: FxHashSet::default(),
            worklist: Vec::new(),
        }
    }

    fn mark(&mut self, method: MethodId) {
        if self.used.insert(method) {
            self.worklist.push(method);
        }
    }

    fn mark_key(&mut self, key: MethodKey) {
        if self.used_keys.contains(&key) {
            return;
        }
        let targets = self.by_key.get(&key).cloned().unwrap_or_default();
        self.used_keys.insert(key);
        for target in targets {
            self.mark(target);
        }
    }

    fn mark_call(&mut self, owner: &str, name: &str, desc: &str) {
        let declaring = find_method_owner(self.classes, owner, name, desc).unwrap_or_else(|| owner.to_string());
        if let Some(id) = self.classes.lookup(&declaring) {
            if let Some(index) = self.classes[id]
                .methods
                .iter()
                .position(|method| method.matches(name, desc))
            {
                self.mark((id, index));
            }
        }
    }

    fn run(&mut self) {
        while let Some((id, index)) = self.worklist.pop() {
            let method = &self.classes[id].methods[index];
            if !method.is_static() {
                self.mark_key(method.key());
            }

            let mut calls = Vec::new();
            if let Some(body) = &method.body {
                body.for_each_instruction(|insn| {
                    if let Some((owner, target)) = insn.call_target() {
                        calls.push((owner.to_string(), target.name.clone(), target.desc.clone()));
                    }
                });
            }
            for (owner, name, desc) in calls {
                self.mark_call(&owner, &name, &desc);
                if name != "<init>" {
                    self.mark_key(MethodKey::new(name, desc));
                }
            }
        }
    }
}

/// Remove every method of the `required` classes that is unreachable from the seeds.
///
/// Seeds are static initializers, finalizers, constructors, native and intrinsic methods,
/// the entry point of `main`, the public methods of annotation implementations and
/// everything overriding a `java/lang/Object` method, plus every method of the `kept`
/// classes. Constructors, abstract methods and kept classes are never trimmed. Returns the
/// number of removed methods.
pub fn trim_unused_methods(
    classes: &mut ClassMap,
    required: &[ClassId],
    kept: &[ClassId],
    main: Option<ClassId>,
) -> usize {
    let used = {
        let mut reachability = Reachability::new(classes, required);
        for (name, desc) in OBJECT_METHODS {
            reachability.mark_key(MethodKey::new(name, desc));
        }
        for &id in required {
            let class = &classes[id];
            let annotation_impl = class.is_annotation_impl();
            let is_main_class = main == Some(id);
            let is_kept = kept.contains(&id);
            for (index, method) in class.methods.iter().enumerate() {
                if is_kept || is_seed(annotation_impl, is_main_class, method) {
                    reachability.mark((id, index));
                }
            }
        }
        reachability.run();
        reachability.used
    };

    let mut removed = 0;
    let mut touched = 0;
    for &id in required.iter().filter(|id| !kept.contains(id)) {
        let before = classes[id].methods.len();
        let mut index = 0;
        classes[id].methods.retain(|method| {
            let keep = used.contains(&(id, index)) || method.is_constructor() || method.is_abstract();
            index += 1;
            keep
        });
        let dropped = before - classes[id].methods.len();
        if dropped > 0 {
            log::debug!("Trimmed {} methods from {}", dropped, classes[id].name);
            removed += dropped;
            touched += 1;
        }
    }

    log::info!("Removed {} unused methods from {} classes", removed, touched);
    removed
}
