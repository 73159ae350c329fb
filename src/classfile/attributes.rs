//! Decoders for the attributes the transpiler interprets.
//!
//! Attributes are first read generically as [`Attribute`] (name plus raw bytes) and decoded
//! on demand. Unknown attributes are never touched.

use crate::{
    classfile::{
        constant_pool::{ConstantPool, Loadable, MethodHandle},
        flags::AccessFlags,
    },
    file::parser::Parser,
    model::annotation::{Annotation, AnnotationValue},
    Result,
};

/// Attribute names.
#[allow(missing_docs)]
pub mod names {
    pub const CODE: &str = "Code";
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const SIGNATURE: &str = "Signature";
    pub const INNER_CLASSES: &str = "InnerClasses";
    pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
    pub const ANNOTATION_DEFAULT: &str = "AnnotationDefault";
}

/// An undecoded attribute.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name
    pub name: String,
    /// Attribute payload
    pub data: &'a [u8],
}

/// Read an `attributes_count` prefixed attribute table.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`] if a
/// name index is not a `Utf8` constant.
pub fn read_attributes<'a>(
    parser: &mut Parser<'a>,
    pool: &ConstantPool,
) -> Result<Vec<Attribute<'a>>> {
    let count = parser.read_be::<u16>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(parser.read_be::<u16>()?)?.to_string();
        let length = parser.read_be::<u32>()? as usize;
        attributes.push(Attribute {
            name,
            data: parser.read_bytes(length)?,
        });
    }
    Ok(attributes)
}

/// Find the first attribute called `name`.
#[must_use]
pub fn find<'b, 'a>(attributes: &'b [Attribute<'a>], name: &str) -> Option<&'b Attribute<'a>> {
    attributes.iter().find(|attribute| attribute.name == name)
}

/// One exception table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// First covered bytecode offset
    pub start_pc: u16,
    /// First offset past the covered range
    pub end_pc: u16,
    /// Offset of the handler
    pub handler_pc: u16,
    /// Caught class, `None` for `finally` style handlers
    pub catch_type: Option<String>,
}

/// One `LineNumberTable` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    /// Bytecode offset the line starts at
    pub start_pc: u16,
    /// Source line
    pub line: u16,
}

/// A decoded `Code` attribute.
#[derive(Debug, Clone)]
pub struct CodeAttribute<'a> {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// The raw bytecode
    pub code: &'a [u8],
    /// Exception table in declaration order
    pub exception_table: Vec<ExceptionEntry>,
    /// Line numbers, sorted by offset
    pub line_numbers: Vec<LineNumber>,
}

impl<'a> CodeAttribute<'a> {
    /// Decode a `Code` attribute payload.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`]
    /// on invalid constant references.
    pub fn read(data: &'a [u8], pool: &ConstantPool) -> Result<Self> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()? as usize;
        let code = parser.read_bytes(code_length)?;

        let exception_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            exception_table.push(ExceptionEntry {
                start_pc: parser.read_be::<u16>()?,
                end_pc: parser.read_be::<u16>()?,
                handler_pc: parser.read_be::<u16>()?,
                catch_type: pool
                    .optional_class_name(parser.read_be::<u16>()?)?
                    .map(str::to_string),
            });
        }

        let mut line_numbers = Vec::new();
        for attribute in read_attributes(&mut parser, pool)? {
            if attribute.name != names::LINE_NUMBER_TABLE {
                continue;
            }
            let mut table = Parser::new(attribute.data);
            let count = table.read_be::<u16>()?;
            for _ in 0..count {
                line_numbers.push(LineNumber {
                    start_pc: table.read_be::<u16>()?,
                    line: table.read_be::<u16>()?,
                });
            }
        }
        line_numbers.sort_by_key(|entry| entry.start_pc);

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            line_numbers,
        })
    }
}

/// One `InnerClasses` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    /// The nested class
    pub inner: String,
    /// The enclosing class, if it is a member class
    pub outer: Option<String>,
    /// Simple name, `None` for anonymous classes
    pub name: Option<String>,
    /// Access flags as declared in source
    pub access: AccessFlags,
}

/// Decode an `InnerClasses` attribute payload.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`] on
/// invalid constant references.
pub fn read_inner_classes(data: &[u8], pool: &ConstantPool) -> Result<Vec<InnerClassEntry>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let inner = pool.class_name(parser.read_be::<u16>()?)?.to_string();
        let outer = pool
            .optional_class_name(parser.read_be::<u16>()?)?
            .map(str::to_string);
        let name_index = parser.read_be::<u16>()?;
        let name = if name_index == 0 {
            None
        } else {
            Some(pool.utf8(name_index)?.to_string())
        };
        entries.push(InnerClassEntry {
            inner,
            outer,
            name,
            access: AccessFlags::from_bits_retain(parser.read_be::<u16>()?),
        });
    }
    Ok(entries)
}

/// One `BootstrapMethods` row.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    /// The bootstrap method handle
    pub handle: MethodHandle,
    /// Static arguments
    pub arguments: Vec<Loadable>,
}

/// Decode a `BootstrapMethods` attribute payload.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`] on
/// invalid constant references.
pub fn read_bootstrap_methods(data: &[u8], pool: &ConstantPool) -> Result<Vec<BootstrapMethod>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let handle = pool.method_handle(parser.read_be::<u16>()?)?;
        let argument_count = parser.read_be::<u16>()?;
        let mut arguments = Vec::with_capacity(argument_count as usize);
        for _ in 0..argument_count {
            arguments.push(pool.loadable(parser.read_be::<u16>()?)?);
        }
        methods.push(BootstrapMethod { handle, arguments });
    }
    Ok(methods)
}

/// Internal name from an annotation type descriptor (`La/B;` → `a/B`).
fn annotation_type_name(desc: &str) -> String {
    desc.strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(desc)
        .to_string()
}

fn read_annotation(parser: &mut Parser<'_>, pool: &ConstantPool) -> Result<Annotation> {
    let type_name = annotation_type_name(pool.utf8(parser.read_be::<u16>()?)?);
    let count = parser.read_be::<u16>()?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(parser.read_be::<u16>()?)?.to_string();
        values.push((name, read_element_value(parser, pool)?));
    }
    Ok(Annotation { type_name, values })
}

fn read_element_value(parser: &mut Parser<'_>, pool: &ConstantPool) -> Result<AnnotationValue> {
    let tag = parser.read_be::<u8>()?;
    let int = |parser: &mut Parser<'_>| -> Result<i32> {
        let index = parser.read_be::<u16>()?;
        match pool.loadable(index)? {
            Loadable::Int(value) => Ok(value),
            other => Err(malformed_error!("Expected int annotation value, found {}", other)),
        }
    };

    Ok(match tag {
        b'B' => AnnotationValue::Byte(int(parser)? as i8),
        b'C' => AnnotationValue::Char(int(parser)? as u16),
        b'S' => AnnotationValue::Short(int(parser)? as i16),
        b'I' => AnnotationValue::Int(int(parser)?),
        b'Z' => AnnotationValue::Boolean(int(parser)? != 0),
        b'J' => match pool.loadable(parser.read_be::<u16>()?)? {
            Loadable::Long(value) => AnnotationValue::Long(value),
            other => return Err(malformed_error!("Expected long annotation value, found {}", other)),
        },
        b'F' => match pool.loadable(parser.read_be::<u16>()?)? {
            Loadable::Float(value) => AnnotationValue::Float(value),
            other => return Err(malformed_error!("Expected float annotation value, found {}", other)),
        },
        b'D' => match pool.loadable(parser.read_be::<u16>()?)? {
            Loadable::Double(value) => AnnotationValue::Double(value),
            other => return Err(malformed_error!("Expected double annotation value, found {}", other)),
        },
        b's' => AnnotationValue::String(pool.utf8(parser.read_be::<u16>()?)?.to_string()),
        b'c' => AnnotationValue::Class(pool.utf8(parser.read_be::<u16>()?)?.to_string()),
        b'e' => AnnotationValue::Enum {
            type_desc: pool.utf8(parser.read_be::<u16>()?)?.to_string(),
            name: pool.utf8(parser.read_be::<u16>()?)?.to_string(),
        },
        b'@' => AnnotationValue::Annotation(read_annotation(parser, pool)?),
        b'[' => {
            let count = parser.read_be::<u16>()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(read_element_value(parser, pool)?);
            }
            AnnotationValue::Array(values)
        }
        _ => return Err(malformed_error!("Invalid annotation element tag {}", tag)),
    })
}

/// Decode a `RuntimeVisibleAnnotations` attribute payload.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`] on
/// invalid tags or constant references.
pub fn read_annotations(data: &[u8], pool: &ConstantPool) -> Result<Vec<Annotation>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(read_annotation(&mut parser, pool)?);
    }
    Ok(annotations)
}

/// Decode an `AnnotationDefault` attribute payload.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`] on
/// invalid tags or constant references.
pub fn read_annotation_default(data: &[u8], pool: &ConstantPool) -> Result<AnnotationValue> {
    read_element_value(&mut Parser::new(data), pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::constant_pool::tag;

    fn pool(entries: &[Vec<u8>]) -> ConstantPool {
        let mut data = Vec::new();
        data.extend(((entries.len() + 1) as u16).to_be_bytes());
        for entry in entries {
            data.extend(entry);
        }
        ConstantPool::read(&mut Parser::new(&data)).unwrap()
    }

    fn utf8(value: &str) -> Vec<u8> {
        let mut bytes = vec![tag::UTF8];
        bytes.extend((value.len() as u16).to_be_bytes());
        bytes.extend(value.as_bytes());
        bytes
    }

    #[test]
    fn test_code_attribute() {
        let pool = pool(&[
            utf8("LineNumberTable"),         // 1
            utf8("java/lang/Exception"),     // 2
            vec![tag::CLASS, 0, 2],          // 3
        ]);

        let mut data = Vec::new();
        data.extend(2_u16.to_be_bytes());
        data.extend(1_u16.to_be_bytes());
        data.extend(3_u32.to_be_bytes());
        data.extend([0x03, 0x57, 0xB1]);
        data.extend(2_u16.to_be_bytes());
        data.extend([0, 0, 0, 2, 0, 2, 0, 3]);
        data.extend([0, 0, 0, 2, 0, 2, 0, 0]);
        data.extend(1_u16.to_be_bytes());
        data.extend(1_u16.to_be_bytes());
        data.extend(10_u32.to_be_bytes());
        data.extend(2_u16.to_be_bytes());
        data.extend([0, 2, 0, 11, 0, 0, 0, 10]);

        let code = CodeAttribute::read(&data, &pool).unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.code, &[0x03, 0x57, 0xB1]);
        assert_eq!(
            code.exception_table[0].catch_type.as_deref(),
            Some("java/lang/Exception")
        );
        assert_eq!(code.exception_table[1].catch_type, None);
        assert_eq!(
            code.line_numbers,
            vec![
                LineNumber { start_pc: 0, line: 10 },
                LineNumber { start_pc: 2, line: 11 }
            ]
        );
    }

    #[test]
    fn test_annotations() {
        let pool = pool(&[
            utf8("La/Ann;"),      // 1
            utf8("value"),        // 2
            vec![tag::INTEGER, 0, 0, 0, 5], // 3
            utf8("names"),        // 4
            utf8("x"),            // 5
        ]);

        let mut data = Vec::new();
        data.extend(1_u16.to_be_bytes());
        data.extend(1_u16.to_be_bytes());
        data.extend(2_u16.to_be_bytes());
        data.extend(2_u16.to_be_bytes());
        data.push(b'I');
        data.extend(3_u16.to_be_bytes());
        data.extend(4_u16.to_be_bytes());
        data.push(b'[');
        data.extend(1_u16.to_be_bytes());
        data.push(b's');
        data.extend(5_u16.to_be_bytes());

        let annotations = read_annotations(&data, &pool).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].type_name, "a/Ann");
        assert_eq!(annotations[0].get("value"), Some(&AnnotationValue::Int(5)));
        assert_eq!(
            annotations[0].get("names"),
            Some(&AnnotationValue::Array(vec![AnnotationValue::String(
                "x".to_string()
            )]))
        );

        assert!(read_annotation_default(&[b'Q', 0, 0], &pool).is_err());
        assert_eq!(
            read_annotation_default(&[b'Z', 0, 3], &pool).unwrap(),
            AnnotationValue::Boolean(true)
        );
    }
}
