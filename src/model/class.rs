//! Class declarations and the class arena.

use std::ops::{Index, IndexMut};

use rustc_hash::FxHashMap;

use crate::{
    classfile::flags::AccessFlags,
    model::{
        annotation::Annotation,
        field::Field,
        method::{Method, MethodKey},
        naming::{qualified_name, sanitize_name, simple_name},
        ANNOTATION, OBJECT,
    },
};

/// Index of a class in a [`ClassMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    /// The position in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Progress of hierarchy resolution for one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HierarchyState {
    /// Not visited yet
    #[default]
    Unvisited,
    /// Currently being resolved further up the call chain
    InProgress,
    /// Vtable computed and members resolved
    Done,
    /// A superclass or interface is missing; the class is excluded from output
    Error,
}

/// One virtual dispatch slot.
///
/// Slots are identified by name and descriptor; `owner` names the class whose
/// implementation currently fills the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableSlot {
    /// Class providing the implementation
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
    /// Whether the slot has no implementation
    pub is_abstract: bool,
}

impl VtableSlot {
    /// A slot filled by `method` of class `owner`.
    #[must_use]
    pub fn of(owner: &str, method: &Method) -> Self {
        VtableSlot {
            owner: owner.to_string(),
            name: method.name.clone(),
            desc: method.descriptor.clone(),
            is_abstract: method.is_abstract(),
        }
    }

    /// Whether the slot dispatches `name` and `desc`.
    #[must_use]
    pub fn matches(&self, name: &str, desc: &str) -> bool {
        self.name == name && self.desc == desc
    }

    /// The name and descriptor of the slot.
    #[must_use]
    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.name.clone(), self.desc.clone())
    }
}

/// A class, interface, annotation or synthesized proxy.
#[derive(Debug, Clone)]
pub struct Class {
    /// Sanitized internal name (`a/b/Outer$Inner`)
    pub name: String,
    /// Name as found in the class file
    pub original_name: String,
    /// Access flags, including flags implied by nesting
    pub access: AccessFlags,
    /// Sanitized superclass name, `java/lang/Object` when absent
    pub super_name: String,
    /// Sanitized direct superinterface names
    pub interfaces: Vec<String>,
    /// Generic signature
    pub signature: Option<String>,
    /// Fields in declaration order
    pub fields: Vec<Field>,
    /// Methods in declaration order
    pub methods: Vec<Method>,
    /// Visible annotations
    pub annotations: Vec<Annotation>,
    /// Default element values, for annotation interfaces
    pub default_annotation: Option<Annotation>,
    /// Classes declared inside this one
    pub inner_classes: Vec<String>,
    /// Enclosing class of a member class
    pub outer_class: Option<String>,
    /// Whether the class is nested in another
    pub nested: bool,
    /// Whether the class has no source name
    pub anonymous: bool,
    /// Native methods are bound through JNI
    pub jni: bool,
    /// Resolved superclass, `None` for classes extending the root
    pub super_class: Option<ClassId>,
    /// Resolved superinterfaces
    pub interface_classes: Vec<ClassId>,
    /// Virtual dispatch table
    pub vtable: Vec<VtableSlot>,
    /// Hierarchy resolution progress
    pub state: HierarchyState,
}

impl Class {
    /// Create a class from its header.
    ///
    /// Annotation interfaces get an empty default annotation and an abstract
    /// `annotationType()` accessor so they can be instantiated as implementations.
    #[must_use]
    pub fn new(name: &str, super_name: Option<&str>, interfaces: &[String], access: AccessFlags) -> Self {
        let mut class = Class {
            name: sanitize_name(name),
            original_name: name.to_string(),
            access,
            super_name: super_name.map_or_else(|| OBJECT.to_string(), sanitize_name),
            interfaces: interfaces.iter().map(|name| sanitize_name(name)).collect(),
            signature: None,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            default_annotation: None,
            inner_classes: Vec::new(),
            outer_class: None,
            nested: false,
            anonymous: false,
            jni: false,
            super_class: None,
            interface_classes: Vec::new(),
            vtable: Vec::new(),
            state: HierarchyState::Unvisited,
        };

        if class.is_annotation() {
            class.default_annotation = Some(Annotation::new(class.name.clone()));
        }
        if class.is_annotation_impl() {
            if let Ok(method) = Method::new(
                "annotationType",
                "()Ljava/lang/Class;",
                AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
            ) {
                class.methods.push(method);
            }
        }
        class
    }

    /// C++ identifier of the class, also the output file stem.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.name)
    }

    /// Qualified name of the superclass.
    #[must_use]
    pub fn qualified_super_name(&self) -> String {
        qualified_name(&self.super_name)
    }

    /// Name without the package.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Record that this class is nested in `outer` (`None` for local and anonymous classes).
    pub fn mark_inner(&mut self, outer: Option<&str>) {
        self.nested = true;
        if let Some(outer) = outer {
            self.outer_class = Some(sanitize_name(outer));
        }
        if self.is_interface() || self.is_annotation() || self.is_enum() {
            self.access |= AccessFlags::STATIC;
        }
    }

    /// Record a class declared inside this one.
    pub fn add_inner_class(&mut self, inner: &str) {
        let inner = sanitize_name(inner);
        if !self.inner_classes.contains(&inner) {
            self.inner_classes.push(inner);
        }
    }

    /// Bind native methods through JNI.
    pub fn mark_jni(&mut self) {
        self.access |= AccessFlags::NATIVE;
        self.jni = true;
    }

    /// Whether this is the root class.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.name == OBJECT
    }

    /// Whether the class is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    /// Whether the class is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.access.contains(AccessFlags::ABSTRACT)
    }

    /// Whether the class is an annotation interface.
    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.access.contains(AccessFlags::ANNOTATION)
    }

    /// Whether the class is an annotation interface that gets a generated implementation.
    #[must_use]
    pub fn is_annotation_impl(&self) -> bool {
        self.is_annotation() && self.original_name != ANNOTATION
    }

    /// Whether the class is an enum.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.access.contains(AccessFlags::ENUM)
    }

    /// Whether the class is compiler generated.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.access.contains(AccessFlags::SYNTHETIC)
    }

    /// Whether instances of the class can exist.
    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract() && !self.is_interface() && !self.is_annotation()
    }

    /// Whether the class gets a vtable (interfaces only get dispatch indices).
    #[must_use]
    pub fn has_vtable(&self) -> bool {
        !self.is_interface() || self.is_annotation_impl()
    }

    /// Whether the hierarchy resolver rejected the class.
    #[must_use]
    pub fn has_hierarchy_error(&self) -> bool {
        self.state == HierarchyState::Error
    }

    /// Whether any method overrides `finalize()`.
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.methods.iter().any(Method::is_finalizer)
    }

    /// The `<clinit>` method, if declared.
    #[must_use]
    pub fn static_initializer(&self) -> Option<&Method> {
        self.methods.iter().find(|method| method.is_static_initializer())
    }

    /// Whether the class, any member or the annotation defaults carry annotation data.
    #[must_use]
    pub fn has_annotations(&self) -> bool {
        !self.annotations.is_empty()
            || self.fields.iter().any(|field| !field.annotations.is_empty())
            || self.methods.iter().any(|method| !method.annotations.is_empty())
    }

    /// Find a declared method.
    #[must_use]
    pub fn find_method(&self, name: &str, desc: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.matches(name, desc))
    }

    /// Find a declared method for modification.
    pub fn find_method_mut(&mut self, name: &str, desc: &str) -> Option<&mut Method> {
        self.methods.iter_mut().find(|method| method.matches(name, desc))
    }

    /// Find a declared field.
    #[must_use]
    pub fn find_field(&self, name: &str, desc: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name == name && field.descriptor == desc)
    }

    /// Position of the vtable slot dispatching `name` and `desc`.
    #[must_use]
    pub fn vtable_index(&self, name: &str, desc: &str) -> Option<usize> {
        self.vtable.iter().position(|slot| slot.matches(name, desc))
    }

    /// Position among the non-static methods, the dispatch index of an interface method.
    #[must_use]
    pub fn interface_index(&self, name: &str, desc: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|method| method.matches(name, desc))
            .filter(|index| !self.methods[*index].is_static())
    }
}

/// Arena of every class in a run, indexed by sanitized name.
#[derive(Debug, Default)]
pub struct ClassMap {
    classes: Vec<Class>,
    index: FxHashMap<String, ClassId>,
}

impl ClassMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class; a class with the same name is replaced in place.
    pub fn insert(&mut self, class: Class) -> ClassId {
        if let Some(&id) = self.index.get(&class.name) {
            self.classes[id.index()] = class;
            return id;
        }

        let id = ClassId(self.classes.len() as u32);
        self.index.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }

    /// The id of the class named `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.index.get(name).copied()
    }

    /// The class named `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Class> {
        self.lookup(name).map(|id| &self.classes[id.index()])
    }

    /// Whether a class named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The class with id `id`.
    #[must_use]
    pub fn get(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id.index())
    }

    /// The class with id `id`, for modification.
    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut Class> {
        self.classes.get_mut(id.index())
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the map holds no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Every id in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len() as u32).map(ClassId)
    }

    /// Every class with its id, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(index, class)| (ClassId(index as u32), class))
    }

    /// Every class, for modification.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Class> {
        self.classes.iter_mut()
    }
}

impl Index<ClassId> for ClassMap {
    type Output = Class;

    fn index(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }
}

impl IndexMut<ClassId> for ClassMap {
    fn index_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_class_defaults() {
        let class = Class::new("a/b/Foo$Bar", None, &[], AccessFlags::PUBLIC);
        assert_eq!(class.super_name, OBJECT);
        assert_eq!(class.qualified_name(), "a_b_Foo_Bar");
        assert_eq!(class.qualified_super_name(), "java_lang_Object");
        assert_eq!(class.simple_name(), "Foo$Bar");
        assert!(class.methods.is_empty());
        assert!(class.has_vtable());
    }

    #[test]
    fn test_annotation_impl() {
        let access = AccessFlags::INTERFACE | AccessFlags::ANNOTATION | AccessFlags::ABSTRACT;
        let class = Class::new("a/Marker", None, &[ANNOTATION.to_string()], access);
        assert!(class.is_annotation_impl());
        assert!(class.has_vtable());
        assert!(class.default_annotation.is_some());
        assert!(class.find_method("annotationType", "()Ljava/lang/Class;").is_some());

        let root = Class::new(ANNOTATION, None, &[], AccessFlags::INTERFACE | AccessFlags::ANNOTATION);
        assert!(!root.is_annotation_impl());
        assert!(root.methods.is_empty());
    }

    #[test]
    fn test_mark_inner() {
        let mut class = Class::new("a/Outer$Kind", Some("java/lang/Enum"), &[], AccessFlags::ENUM);
        class.mark_inner(Some("a/Outer"));
        assert!(class.nested);
        assert_eq!(class.outer_class.as_deref(), Some("a/Outer"));
        assert!(class.access.contains(AccessFlags::STATIC));
    }

    #[test]
    fn test_class_map() {
        let mut map = ClassMap::new();
        let a = map.insert(Class::new("a/A", None, &[], AccessFlags::PUBLIC));
        let b = map.insert(Class::new("a/B", Some("a/A"), &[], AccessFlags::PUBLIC));
        assert_ne!(a, b);
        assert_eq!(map.lookup("a/B"), Some(b));
        assert_eq!(map[b].super_name, "a/A");

        let again = map.insert(Class::new("a/A", None, &[], AccessFlags::FINAL));
        assert_eq!(again, a);
        assert_eq!(map.len(), 2);
        assert!(map[a].access.contains(AccessFlags::FINAL));
        assert_eq!(map.ids().count(), 2);
    }
}
