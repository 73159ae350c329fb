//! The class model shared by every pipeline phase.
//!
//! Classes live in a dense [`ClassMap`] and are referenced by [`ClassId`]. The loader fills
//! in declarations and method bodies, the hierarchy resolver links superclasses and
//! computes vtables, the dependency collector records referenced class names, and the code
//! generator reads the result. No phase ever removes a class from the map.
//!
//! # Key Components
//!
//! - [`Class`] - One class or interface, including synthesized proxy classes
//! - [`Method`] / [`MethodBody`] - Method declarations and their lowered instructions
//! - [`Field`] - Field declarations with optional constant values
//! - [`ClassMap`] - Arena of all classes indexed by internal name
//! - [`naming`] - Mapping of Java names onto C++ identifiers
//! - [`types`] - Descriptor parsing and type representations

pub mod annotation;
pub mod class;
pub mod field;
pub mod method;
pub mod naming;
pub mod types;

pub use class::{Class, ClassId, ClassMap, HierarchyState, VtableSlot};
pub use field::{Field, FieldValue};
pub use method::{ExceptionFrame, Method, MethodBody, MethodKey};

/// Internal name of the root class.
pub const OBJECT: &str = "java/lang/Object";

/// Internal name of the root of all annotation interfaces.
pub const ANNOTATION: &str = "java/lang/annotation/Annotation";
