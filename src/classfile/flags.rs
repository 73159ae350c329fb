//! Access flags of classes, fields and methods.

use bitflags::bitflags;

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Hash)]
    /// Access flags shared by classes, fields, methods and inner class entries
    ///
    /// Several bits carry a different meaning depending on where they appear; the aliases
    /// below name both meanings.
    pub struct AccessFlags : u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Method is synchronized
        const SYNCHRONIZED = 0x0020;
        /// Class uses the modern `invokespecial` semantics
        const SUPER = 0x0020;
        /// Field is volatile
        const VOLATILE = 0x0040;
        /// Method is a compiler generated bridge
        const BRIDGE = 0x0040;
        /// Field is transient
        const TRANSIENT = 0x0080;
        /// Method takes variable arguments
        const VARARGS = 0x0080;
        /// Method is implemented natively
        const NATIVE = 0x0100;
        /// Class is an interface
        const INTERFACE = 0x0200;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Method uses strict floating point
        const STRICT = 0x0800;
        /// Not present in source
        const SYNTHETIC = 0x1000;
        /// Class is an annotation interface
        const ANNOTATION = 0x2000;
        /// Class or field is an enum
        const ENUM = 0x4000;
        /// Class is a module descriptor
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    /// The raw bits as a signed int, the representation the runtime metadata uses
    #[must_use]
    pub fn as_jint(self) -> i32 {
        i32::from(self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_bits() {
        let flags = AccessFlags::from_bits_retain(0x0021);
        assert!(flags.contains(AccessFlags::PUBLIC | AccessFlags::SUPER));
        assert!(flags.contains(AccessFlags::SYNCHRONIZED));
        assert_eq!(flags.as_jint(), 0x21);
    }
}
