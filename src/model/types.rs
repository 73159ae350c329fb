//! Java types, their stack representation and their C++ spelling.

use std::fmt;

use strum::{EnumCount, EnumIter};

use crate::{model::naming::qualified_name, Result};

/// The computational type of an operand stack entry.
///
/// `boolean`, `byte`, `char` and `short` all compute as `Int`; arrays and
/// class instances are `Object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum BasicType {
    /// 32-bit integer category
    Int,
    /// 64-bit integer, occupies two local slots
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float, occupies two local slots
    Double,
    /// Reference
    Object,
}

impl BasicType {
    /// Field of the runtime's `jtype` union holding this type.
    #[must_use]
    pub fn slot(self) -> &'static str {
        match self {
            BasicType::Int => "i",
            BasicType::Long => "l",
            BasicType::Float => "f",
            BasicType::Double => "d",
            BasicType::Object => "o",
        }
    }

    /// C++ type used for temporaries of this type.
    #[must_use]
    pub fn cpp_type(self) -> &'static str {
        match self {
            BasicType::Int => "jint",
            BasicType::Long => "jlong",
            BasicType::Float => "jfloat",
            BasicType::Double => "jdouble",
            BasicType::Object => "jobject",
        }
    }

    /// Whether the type occupies two local variable slots.
    #[must_use]
    pub fn is_wide(self) -> bool {
        matches!(self, BasicType::Long | BasicType::Double)
    }
}

/// A field or method parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum JavaType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Class or interface by internal name
    Object(String),
    /// Array of a non-array component
    Array { dims: u8, component: Box<JavaType> },
}

impl JavaType {
    /// Parse a complete field descriptor such as `I`, `Ljava/lang/String;` or `[[J`.
    #[must_use]
    pub fn from_descriptor(desc: &str) -> Option<JavaType> {
        match Self::parse_at(desc.as_bytes(), 0) {
            Some((ty, end)) if end == desc.len() => Some(ty),
            _ => None,
        }
    }

    /// Parse a class reference as found in `Class` constants.
    ///
    /// These are internal names, except for array classes which use descriptors.
    #[must_use]
    pub fn from_class_ref(name: &str) -> Option<JavaType> {
        if name.starts_with('[') {
            Self::from_descriptor(name)
        } else if name.is_empty() {
            None
        } else {
            Some(JavaType::Object(name.to_string()))
        }
    }

    /// Parse one type at `pos`, returning it and the position after it.
    #[must_use]
    pub fn parse_at(bytes: &[u8], pos: usize) -> Option<(JavaType, usize)> {
        let ty = match *bytes.get(pos)? {
            b'V' => JavaType::Void,
            b'Z' => JavaType::Boolean,
            b'B' => JavaType::Byte,
            b'C' => JavaType::Char,
            b'S' => JavaType::Short,
            b'I' => JavaType::Int,
            b'J' => JavaType::Long,
            b'F' => JavaType::Float,
            b'D' => JavaType::Double,
            b'L' => {
                let end = pos + bytes[pos..].iter().position(|byte| *byte == b';')?;
                let name = std::str::from_utf8(&bytes[pos + 1..end]).ok()?;
                if name.is_empty() {
                    return None;
                }
                return Some((JavaType::Object(name.to_string()), end + 1));
            }
            b'[' => {
                let mut dims: u8 = 0;
                let mut cursor = pos;
                while bytes.get(cursor) == Some(&b'[') {
                    dims = dims.checked_add(1)?;
                    cursor += 1;
                }
                let (component, end) = Self::parse_at(bytes, cursor)?;
                if component == JavaType::Void {
                    return None;
                }
                return Some((
                    JavaType::Array {
                        dims,
                        component: Box::new(component),
                    },
                    end,
                ));
            }
            _ => return None,
        };
        Some((ty, pos + 1))
    }

    /// The type for a `newarray` primitive type code.
    #[must_use]
    pub fn from_newarray_code(code: u8) -> Option<JavaType> {
        Some(match code {
            4 => JavaType::Boolean,
            5 => JavaType::Char,
            6 => JavaType::Float,
            7 => JavaType::Double,
            8 => JavaType::Byte,
            9 => JavaType::Short,
            10 => JavaType::Int,
            11 => JavaType::Long,
            _ => return None,
        })
    }

    /// An array of this type with `dims` more dimensions.
    #[must_use]
    pub fn array_of(self, dims: u8) -> JavaType {
        match self {
            JavaType::Array {
                dims: inner,
                component,
            } => JavaType::Array {
                dims: inner.saturating_add(dims),
                component,
            },
            other => JavaType::Array {
                dims,
                component: Box::new(other),
            },
        }
    }

    /// The field descriptor of this type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            JavaType::Void => "V".to_string(),
            JavaType::Boolean => "Z".to_string(),
            JavaType::Byte => "B".to_string(),
            JavaType::Char => "C".to_string(),
            JavaType::Short => "S".to_string(),
            JavaType::Int => "I".to_string(),
            JavaType::Long => "J".to_string(),
            JavaType::Float => "F".to_string(),
            JavaType::Double => "D".to_string(),
            JavaType::Object(name) => format!("L{};", name),
            JavaType::Array { dims, component } => {
                format!("{}{}", "[".repeat(*dims as usize), component.descriptor())
            }
        }
    }

    /// Stack representation, `None` for `void`.
    #[must_use]
    pub fn basic(&self) -> Option<BasicType> {
        Some(match self {
            JavaType::Void => return None,
            JavaType::Boolean
            | JavaType::Byte
            | JavaType::Char
            | JavaType::Short
            | JavaType::Int => BasicType::Int,
            JavaType::Long => BasicType::Long,
            JavaType::Float => BasicType::Float,
            JavaType::Double => BasicType::Double,
            JavaType::Object(_) | JavaType::Array { .. } => BasicType::Object,
        })
    }

    /// Whether this is `void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, JavaType::Void)
    }

    /// Whether values of this type are primitives (not references).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, JavaType::Object(_) | JavaType::Array { .. })
    }

    /// Whether values of this type are references.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    /// Whether the type occupies two local variable slots.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, JavaType::Long | JavaType::Double)
    }

    /// Number of local variable slots (0 for `void`).
    #[must_use]
    pub fn slots(&self) -> usize {
        match self {
            JavaType::Void => 0,
            JavaType::Long | JavaType::Double => 2,
            _ => 1,
        }
    }

    /// The class this type names, looking through arrays; `None` for primitives.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            JavaType::Object(name) => Some(name),
            JavaType::Array { component, .. } => component.class_name(),
            _ => None,
        }
    }

    /// Number of array dimensions, 0 for non-arrays.
    #[must_use]
    pub fn dimensions(&self) -> u8 {
        match self {
            JavaType::Array { dims, .. } => *dims,
            _ => 0,
        }
    }

    /// C++ type for parameters, return values and static storage.
    #[must_use]
    pub fn cpp_type(&self) -> &'static str {
        match self {
            JavaType::Void => "void",
            JavaType::Boolean => "jbool",
            JavaType::Byte => "jbyte",
            JavaType::Char => "jchar",
            JavaType::Short => "jshort",
            JavaType::Int => "jint",
            JavaType::Long => "jlong",
            JavaType::Float => "jfloat",
            JavaType::Double => "jdouble",
            JavaType::Object(_) | JavaType::Array { .. } => "jobject",
        }
    }

    /// C++ type for instance struct members; references are stored as `jref`.
    #[must_use]
    pub fn member_type(&self) -> &'static str {
        if self.is_reference() {
            "jref"
        } else {
            self.cpp_type()
        }
    }

    /// Type fragment used in generated method symbols.
    #[must_use]
    pub fn symbol_name(&self) -> String {
        match self {
            JavaType::Void => "void".to_string(),
            JavaType::Boolean => "boolean".to_string(),
            JavaType::Byte => "byte".to_string(),
            JavaType::Char => "char".to_string(),
            JavaType::Short => "short".to_string(),
            JavaType::Int => "int".to_string(),
            JavaType::Long => "long".to_string(),
            JavaType::Float => "float".to_string(),
            JavaType::Double => "double".to_string(),
            JavaType::Object(name) => qualified_name(name),
            JavaType::Array { dims, component } => {
                format!("Array{}_{}", dims, component.symbol_name())
            }
        }
    }

    /// Expression evaluating to the runtime `jclass` of this type.
    #[must_use]
    pub fn class_fetch(&self) -> String {
        match self {
            JavaType::Array { dims, component } => {
                format!("getArrayClass({}, {})", component.class_fetch(), dims)
            }
            other => format!("&class_{}", other.symbol_name()),
        }
    }

    /// Suffix of the runtime's `boxX`/`unboxX` helpers, `None` for references.
    #[must_use]
    pub fn box_name(&self) -> Option<&'static str> {
        Some(match self {
            JavaType::Boolean => "Boolean",
            JavaType::Byte => "Byte",
            JavaType::Char => "Character",
            JavaType::Short => "Short",
            JavaType::Int => "Integer",
            JavaType::Long => "Long",
            JavaType::Float => "Float",
            JavaType::Double => "Double",
            _ => return None,
        })
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Object(name) => write!(f, "{}", name.replace('/', ".")),
            JavaType::Array { dims, component } => {
                write!(f, "{}{}", component, "[]".repeat(*dims as usize))
            }
            other => write!(f, "{}", other.symbol_name()),
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// The raw descriptor, `(I[J)V`
    pub desc: String,
    /// Parameter types in order
    pub params: Vec<JavaType>,
    /// Return type
    pub ret: JavaType,
}

impl MethodSignature {
    /// Parse a method descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `desc` is not a valid method descriptor.
    pub fn parse(desc: &str) -> Result<Self> {
        let bytes = desc.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed_error!("Invalid method descriptor {}", desc));
        }

        let mut params = Vec::new();
        let mut pos = 1;
        while bytes.get(pos) != Some(&b')') {
            match JavaType::parse_at(bytes, pos) {
                Some((ty, next)) if ty != JavaType::Void => {
                    params.push(ty);
                    pos = next;
                }
                _ => return Err(malformed_error!("Invalid method descriptor {}", desc)),
            }
        }

        match JavaType::parse_at(bytes, pos + 1) {
            Some((ret, end)) if end == bytes.len() => Ok(MethodSignature {
                desc: desc.to_string(),
                params,
                ret,
            }),
            _ => Err(malformed_error!("Invalid method descriptor {}", desc)),
        }
    }

    /// Local variable slots taken by the parameters, excluding `this`.
    #[must_use]
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(JavaType::slots).sum()
    }

    /// Every class named by the parameter and return types.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .chain(std::iter::once(&self.ret))
            .filter_map(JavaType::class_name)
    }

    /// `jtype name0, jtype name1, ...` for C++ parameter lists.
    #[must_use]
    pub fn cpp_params(&self, prefix: &str) -> String {
        self.params
            .iter()
            .enumerate()
            .map(|(index, ty)| format!("{} {}{}", ty.cpp_type(), prefix, index))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
