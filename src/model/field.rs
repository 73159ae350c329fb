//! Field declarations.

use crate::{
    classfile::{constant_pool::Loadable, flags::AccessFlags},
    model::{
        annotation::Annotation,
        naming::{field_symbol, static_field_symbol},
        types::JavaType,
    },
    Result,
};

/// The value of a `ConstantValue` attribute.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum FieldValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl FieldValue {
    /// Convert a loadable constant, `None` for kinds a field cannot hold.
    #[must_use]
    pub fn from_loadable(value: Loadable) -> Option<FieldValue> {
        Some(match value {
            Loadable::Int(value) => FieldValue::Int(value),
            Loadable::Long(value) => FieldValue::Long(value),
            Loadable::Float(value) => FieldValue::Float(value),
            Loadable::Double(value) => FieldValue::Double(value),
            Loadable::String(value) => FieldValue::String(value),
            _ => return None,
        })
    }
}

/// A field of a class.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
    /// Parsed descriptor
    pub ty: JavaType,
    /// Access flags
    pub access: AccessFlags,
    /// Generic signature, if present
    pub signature: Option<String>,
    /// Initial value of a constant field
    pub value: Option<FieldValue>,
    /// Visible annotations
    pub annotations: Vec<Annotation>,
}

impl Field {
    /// Create a field declaration.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `descriptor` is not a field descriptor.
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: AccessFlags) -> Result<Self> {
        let name = name.into();
        let descriptor = descriptor.into();
        let ty = JavaType::from_descriptor(&descriptor)
            .filter(|ty| !ty.is_void())
            .ok_or_else(|| malformed_error!("Invalid descriptor {} for field {}", descriptor, name))?;

        Ok(Field {
            name,
            descriptor,
            ty,
            access,
            signature: None,
            value: None,
            annotations: Vec::new(),
        })
    }

    /// Whether the field is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Whether the field is volatile.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.access.contains(AccessFlags::VOLATILE)
    }

    /// Whether the field is final.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.access.contains(AccessFlags::FINAL)
    }

    /// The C++ name of the field: a struct member for instance fields, a global for statics.
    #[must_use]
    pub fn symbol(&self, qualified_owner: &str) -> String {
        if self.is_static() {
            static_field_symbol(qualified_owner, &self.name)
        } else {
            field_symbol(&self.name)
        }
    }
}
