//! Method declarations and lowered method bodies.

use std::fmt;

use crate::{
    classfile::flags::AccessFlags,
    ir::{Instruction, Node},
    model::{
        annotation::{Annotation, AnnotationValue},
        naming::{method_symbol, sanitize_name},
        types::MethodSignature,
    },
    Result,
};

/// Name and descriptor, the identity of a method within a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
}

impl MethodKey {
    /// Create a key.
    #[must_use]
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        MethodKey {
            name: name.into(),
            desc: desc.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.desc)
    }
}

/// One row of the exception table, bound to labels in the lowered body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionFrame {
    /// Position in the exception table; handler dispatch uses `index + 1`
    pub index: usize,
    /// Label at the first covered instruction
    pub start: u32,
    /// Label after the last covered instruction
    pub end: u32,
    /// Label of the handler
    pub handler: u32,
    /// Caught class, `None` for catch-all
    pub catch_type: Option<String>,
    /// Frame location where the region starts
    pub start_location: Option<u32>,
    /// Frame location where the region ends
    pub end_location: Option<u32>,
}

/// The lowered code of a method.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    /// Maximum operand stack depth
    pub max_stack: usize,
    /// Number of local variable slots
    pub max_locals: usize,
    /// Instructions in program order
    pub nodes: Vec<Node>,
    /// Exception regions in table order
    pub frames: Vec<ExceptionFrame>,
    /// Source line of every frame location, indexed by location
    pub locations: Vec<u32>,
}

impl MethodBody {
    /// Slots of the `frame` array: locals followed by the operand stack.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.max_stack + self.max_locals
    }

    /// Position of the label with id `label`.
    #[must_use]
    pub fn find_label(&self, label: u32) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| matches!(node.insn, Instruction::Label { id, .. } if id == label))
    }

    /// Walk every instruction, descending into groups.
    pub fn for_each_instruction(&self, mut visit: impl FnMut(&Instruction)) {
        fn walk(nodes: &[Node], visit: &mut impl FnMut(&Instruction)) {
            for node in nodes {
                match &node.insn {
                    Instruction::Group(members) => walk(members, visit),
                    other => visit(other),
                }
            }
        }
        walk(&self.nodes, &mut visit);
    }
}

/// A method of a class.
#[derive(Debug, Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Parsed descriptor
    pub sig: MethodSignature,
    /// Access flags
    pub access: AccessFlags,
    /// Generic signature, if present
    pub signature: Option<String>,
    /// Visible annotations
    pub annotations: Vec<Annotation>,
    /// Default value of an annotation element
    pub annotation_default: Option<AnnotationValue>,
    /// Code, `None` for abstract and native methods
    pub body: Option<MethodBody>,
    /// Body supplied by the runtime instead of generated
    pub intrinsic: bool,
}

impl Method {
    /// Create a method declaration without a body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `descriptor` is not a method descriptor.
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: AccessFlags) -> Result<Self> {
        let descriptor = descriptor.into();
        let sig = MethodSignature::parse(&descriptor)?;
        Ok(Method {
            name: name.into(),
            descriptor,
            sig,
            access,
            signature: None,
            annotations: Vec::new(),
            annotation_default: None,
            body: None,
            intrinsic: false,
        })
    }

    /// The name and descriptor of this method.
    #[must_use]
    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.name.clone(), self.descriptor.clone())
    }

    /// Whether the method has the given name and descriptor.
    #[must_use]
    pub fn matches(&self, name: &str, desc: &str) -> bool {
        self.name == name && self.descriptor == desc
    }

    /// The C++ function implementing the method in class `qualified_owner`.
    #[must_use]
    pub fn symbol(&self, qualified_owner: &str) -> String {
        method_symbol(qualified_owner, &self.name, &self.sig, self.is_static())
    }

    /// `owner:name`, the name frames and JNI wrappers report.
    #[must_use]
    pub fn display_name(&self, owner: &str) -> String {
        format!("{}:{}", sanitize_name(owner), self.name)
    }

    /// Whether the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Whether the method is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.access.contains(AccessFlags::ABSTRACT)
    }

    /// Whether the method is native.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.access.contains(AccessFlags::NATIVE)
    }

    /// Whether the method holds the monitor of its receiver or class.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.access.contains(AccessFlags::SYNCHRONIZED)
    }

    /// Whether the method is private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access.contains(AccessFlags::PRIVATE)
    }

    /// Whether this is an instance initializer.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Whether this is the class initializer.
    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    /// Whether the method overrides `Object.finalize()`.
    #[must_use]
    pub fn is_finalizer(&self) -> bool {
        !self.is_static() && self.name == "finalize" && self.descriptor == "()V"
    }

    /// Whether this is a `public static void main(String[])` entry point.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.is_static() && self.name == "main" && self.descriptor == "([Ljava/lang/String;)V"
    }

    /// Whether the method is public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.access.contains(AccessFlags::PUBLIC)
    }

    /// Whether this is the `annotationType()` accessor of an annotation implementation.
    #[must_use]
    pub fn is_annotation_type(&self) -> bool {
        self.name == "annotationType" && self.descriptor == "()Ljava/lang/Class;"
    }

    /// Whether the method takes part in virtual dispatch.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        !self.is_static() && !self.is_constructor() && !self.is_static_initializer()
    }

    /// Whether generated code provides a body for the method.
    #[must_use]
    pub fn has_generated_body(&self) -> bool {
        self.body.is_some() && !self.intrinsic
    }
}
