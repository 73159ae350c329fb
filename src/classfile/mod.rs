//! Decoding of the binary class file format.
//!
//! [`ClassFile::parse`] reads the fixed layout of a class file (JVMS chapter 4) into a
//! borrowed view: the constant pool is decoded eagerly, everything else keeps pointing into
//! the input buffer until the loader asks for it. Attribute payloads are only decoded on
//! demand through the functions in [`attributes`].
//!
//! # Key Components
//!
//! - [`ClassFile`] - Header, members and attributes of one class
//! - [`MemberInfo`] - A field or method declaration
//! - [`constant_pool::ConstantPool`] - Decoded constant pool with typed accessors
//! - [`flags::AccessFlags`] - Class, field and method access flags
//!
//! # Examples
//!
//! ```rust,no_run
//! use clearwing::classfile::ClassFile;
//!
//! let data = std::fs::read("Main.class")?;
//! let class = ClassFile::parse(&data)?;
//! println!("{} extends {:?}", class.this_class, class.super_class);
//! for method in &class.methods {
//!     println!("  {}{}", method.name, method.descriptor);
//! }
//! # Ok::<(), clearwing::Error>(())
//! ```

pub mod attributes;
pub mod constant_pool;
pub mod flags;

use crate::{
    classfile::{
        attributes::{find, read_attributes, Attribute},
        constant_pool::ConstantPool,
        flags::AccessFlags,
    },
    file::parser::Parser,
    Result,
};

/// The `0xCAFEBABE` class file magic.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// A field or method declaration.
#[derive(Debug, Clone)]
pub struct MemberInfo<'a> {
    /// Access flags
    pub access: AccessFlags,
    /// Member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
    /// Undecoded member attributes
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> MemberInfo<'a> {
    fn read(parser: &mut Parser<'a>, pool: &ConstantPool) -> Result<Self> {
        Ok(MemberInfo {
            access: AccessFlags::from_bits_retain(parser.read_be::<u16>()?),
            name: pool.utf8(parser.read_be::<u16>()?)?.to_string(),
            descriptor: pool.utf8(parser.read_be::<u16>()?)?.to_string(),
            attributes: read_attributes(parser, pool)?,
        })
    }

    /// The first attribute called `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        find(&self.attributes, name)
    }
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile<'a> {
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    /// The constant pool
    pub pool: ConstantPool,
    /// Class access flags
    pub access: AccessFlags,
    /// Internal name of this class
    pub this_class: String,
    /// Internal name of the superclass, `None` only for `java/lang/Object`
    pub super_class: Option<String>,
    /// Internal names of the direct superinterfaces
    pub interfaces: Vec<String>,
    /// Fields in declaration order
    pub fields: Vec<MemberInfo<'a>>,
    /// Methods in declaration order
    pub methods: Vec<MemberInfo<'a>>,
    /// Undecoded class attributes
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> ClassFile<'a> {
    /// Parse a complete class file.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a bad magic number, invalid constant
    /// references or trailing data, and [`crate::Error::OutOfBounds`] if the input is
    /// truncated.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut parser = Parser::new(data);

        let magic = parser.read_be::<u32>()?;
        if magic != MAGIC {
            return Err(malformed_error!("Invalid class file magic {:#010x}", magic));
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        let pool = ConstantPool::read(&mut parser)?;

        let access = AccessFlags::from_bits_retain(parser.read_be::<u16>()?);
        let this_class = pool.class_name(parser.read_be::<u16>()?)?.to_string();
        let super_class = pool
            .optional_class_name(parser.read_be::<u16>()?)?
            .map(str::to_string);

        let interface_count = parser.read_be::<u16>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(parser.read_be::<u16>()?)?.to_string());
        }

        let field_count = parser.read_be::<u16>()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(MemberInfo::read(&mut parser, &pool)?);
        }

        let method_count = parser.read_be::<u16>()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MemberInfo::read(&mut parser, &pool)?);
        }

        let attributes = read_attributes(&mut parser, &pool)?;

        if parser.has_more_data() {
            return Err(malformed_error!(
                "Trailing data after class {} at offset {}",
                this_class,
                parser.pos()
            ));
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// The first class attribute called `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        find(&self.attributes, name)
    }
}
