//! The class file constant pool.
//!
//! Entries are decoded eagerly into [`Constant`]; accessors resolve the indirections
//! (class → utf8, member ref → class + name-and-type) and return
//! [`crate::Error::Malformed`] when an index points at the wrong kind of entry.

use std::fmt;

use crate::{file::parser::Parser, Result};

/// Constant pool tag values (JVMS 4.4).
#[allow(missing_docs)]
pub mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// Method handle reference kinds (JVMS 5.4.3.5).
#[allow(missing_docs)]
pub mod handle_kind {
    pub const GET_FIELD: u8 = 1;
    pub const GET_STATIC: u8 = 2;
    pub const PUT_FIELD: u8 = 3;
    pub const PUT_STATIC: u8 = 4;
    pub const INVOKE_VIRTUAL: u8 = 5;
    pub const INVOKE_STATIC: u8 = 6;
    pub const INVOKE_SPECIAL: u8 = 7;
    pub const NEW_INVOKE_SPECIAL: u8 = 8;
    pub const INVOKE_INTERFACE: u8 = 9;
}

/// One decoded constant pool entry.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Constant {
    /// Index 0 and the second slot of `Long`/`Double` entries
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

/// A resolved field or method reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Internal name of the owning class (may be an array descriptor for methods like `clone`)
    pub owner: String,
    /// Member name
    pub name: String,
    /// Member descriptor
    pub descriptor: String,
    /// Whether the reference was an `InterfaceMethodref`
    pub interface: bool,
}

/// A resolved method handle constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    /// Reference kind, see [`handle_kind`]
    pub kind: u8,
    /// The referenced member
    pub member: MemberRef,
}

/// A constant usable by `ldc` or as a bootstrap argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable {
    /// `int`, `short`, `char`, `byte` or `boolean` constant
    Int(i32),
    /// `float` constant
    Float(f32),
    /// `long` constant
    Long(i64),
    /// `double` constant
    Double(f64),
    /// `java.lang.String` literal
    String(String),
    /// Class literal, an internal name or array descriptor
    Class(String),
    /// Method type, as a method descriptor
    MethodType(String),
    /// Method handle
    MethodHandle(MethodHandle),
    /// Dynamically computed constant (name, descriptor)
    Dynamic(String, String),
}

impl fmt::Display for Loadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loadable::Int(value) => write!(f, "{}", value),
            Loadable::Float(value) => write!(f, "{}f", value),
            Loadable::Long(value) => write!(f, "{}L", value),
            Loadable::Double(value) => write!(f, "{}d", value),
            Loadable::String(value) => write!(f, "{:?}", value),
            Loadable::Class(name) => write!(f, "{}.class", name),
            Loadable::MethodType(desc) => write!(f, "MethodType {}", desc),
            Loadable::MethodHandle(handle) => write!(
                f,
                "MethodHandle {} {}.{}{}",
                handle.kind, handle.member.owner, handle.member.name, handle.member.descriptor
            ),
            Loadable::Dynamic(name, desc) => write!(f, "Dynamic {}:{}", name, desc),
        }
    }
}

/// The constant pool of one class file.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Decode a constant pool, starting at the `constant_pool_count` field.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on unknown tags and
    /// [`crate::Error::OutOfBounds`] on truncated data.
    pub fn read(parser: &mut Parser<'_>) -> Result<Self> {
        let count = parser.read_be::<u16>()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag = parser.read_be::<u8>()?;
            let entry = match tag {
                tag::UTF8 => {
                    let length = parser.read_be::<u16>()? as usize;
                    Constant::Utf8(parser.read_modified_utf8(length)?)
                }
                tag::INTEGER => Constant::Integer(parser.read_be::<i32>()?),
                tag::FLOAT => Constant::Float(parser.read_be::<f32>()?),
                tag::LONG => Constant::Long(parser.read_be::<i64>()?),
                tag::DOUBLE => Constant::Double(parser.read_be::<f64>()?),
                tag::CLASS => Constant::Class(parser.read_be::<u16>()?),
                tag::STRING => Constant::String(parser.read_be::<u16>()?),
                tag::FIELD_REF => Constant::FieldRef {
                    class: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                tag::METHOD_REF => Constant::MethodRef {
                    class: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                tag::INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                    class: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                tag::NAME_AND_TYPE => Constant::NameAndType {
                    name: parser.read_be::<u16>()?,
                    descriptor: parser.read_be::<u16>()?,
                },
                tag::METHOD_HANDLE => Constant::MethodHandle {
                    kind: parser.read_be::<u8>()?,
                    reference: parser.read_be::<u16>()?,
                },
                tag::METHOD_TYPE => Constant::MethodType(parser.read_be::<u16>()?),
                tag::DYNAMIC => Constant::Dynamic {
                    bootstrap: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                tag::MODULE => Constant::Module(parser.read_be::<u16>()?),
                tag::PACKAGE => Constant::Package(parser.read_be::<u16>()?),
                _ => {
                    return Err(malformed_error!(
                        "Invalid constant pool tag {} at entry {}",
                        tag,
                        entries.len()
                    ))
                }
            };

            let wide = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        if entries.len() != count {
            return Err(malformed_error!(
                "Wide constant overruns the constant pool ({} slots)",
                count
            ));
        }

        Ok(ConstantPool { entries })
    }

    /// Number of slots, including the unusable slot 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no usable entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// The entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` is out of range or unusable.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(malformed_error!(
                "Invalid constant pool index {}",
                index
            )),
            Some(entry) => Ok(entry),
        }
    }

    /// The `Utf8` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not `Utf8`.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            other => Err(malformed_error!(
                "Expected Utf8 at constant {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// The name referenced by the `Class` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not `Class`.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(malformed_error!(
                "Expected Class at constant {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Like [`ConstantPool::class_name`], but index 0 yields `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a non-zero index is not `Class`.
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&str>> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    /// Name and descriptor of the `NameAndType` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not `NameAndType`.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(malformed_error!(
                "Expected NameAndType at constant {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for any other entry kind.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef> {
        let (class, name_and_type, interface) = match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            other => {
                return Err(malformed_error!(
                    "Expected member reference at constant {}, found {:?}",
                    index,
                    other
                ))
            }
        };

        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.class_name(class)?.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface,
        })
    }

    /// Resolve a `MethodHandle` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not a method handle.
    pub fn method_handle(&self, index: u16) -> Result<MethodHandle> {
        match self.get(index)? {
            Constant::MethodHandle { kind, reference } => Ok(MethodHandle {
                kind: *kind,
                member: self.member_ref(*reference)?,
            }),
            other => Err(malformed_error!(
                "Expected MethodHandle at constant {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve an `InvokeDynamic` entry to its bootstrap index, name and descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for any other entry kind.
    pub fn invoke_dynamic(&self, index: u16) -> Result<(u16, &str, &str)> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                let (name, desc) = self.name_and_type(*name_and_type)?;
                Ok((*bootstrap, name, desc))
            }
            other => Err(malformed_error!(
                "Expected InvokeDynamic at constant {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve an entry usable by `ldc` or as a bootstrap method argument.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for entries that are not loadable.
    pub fn loadable(&self, index: u16) -> Result<Loadable> {
        Ok(match self.get(index)? {
            Constant::Integer(value) => Loadable::Int(*value),
            Constant::Float(value) => Loadable::Float(*value),
            Constant::Long(value) => Loadable::Long(*value),
            Constant::Double(value) => Loadable::Double(*value),
            Constant::String(value) => Loadable::String(self.utf8(*value)?.to_string()),
            Constant::Class(name) => Loadable::Class(self.utf8(*name)?.to_string()),
            Constant::MethodType(desc) => Loadable::MethodType(self.utf8(*desc)?.to_string()),
            Constant::MethodHandle { .. } => Loadable::MethodHandle(self.method_handle(index)?),
            Constant::Dynamic { name_and_type, .. } => {
                let (name, desc) = self.name_and_type(*name_and_type)?;
                Loadable::Dynamic(name.to_string(), desc.to_string())
            }
            other => {
                return Err(malformed_error!(
                    "Constant {} is not loadable: {:?}",
                    index,
                    other
                ))
            }
        })
    }
}
