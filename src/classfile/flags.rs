//! Access flags for classes, fields and methods.
//!
//! One [`AccessFlags`] type covers all three contexts; the JVM reuses bit
//! positions between them (0x0020 is `ACC_SUPER` on classes and
//! `ACC_SYNCHRONIZED` on methods), so unknown bits are always retained
//! verbatim and written back unchanged.

use bitflags::bitflags;

bitflags! {
    /// JVM access and property flags, as found in `access_flags` fields of
    /// the class file, field entries and method entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u16 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared private.
        const PRIVATE = 0x0002;
        /// Declared protected.
        const PROTECTED = 0x0004;
        /// Declared static.
        const STATIC = 0x0008;
        /// Declared final.
        const FINAL = 0x0010;
        /// `ACC_SUPER` on classes, `ACC_SYNCHRONIZED` on methods.
        const SUPER = 0x0020;
        /// Declared volatile (fields only).
        const VOLATILE = 0x0040;
        /// Declared transient (fields only).
        const TRANSIENT = 0x0080;
        /// Declared native (methods only).
        const NATIVE = 0x0100;
        /// Is an interface (classes only).
        const INTERFACE = 0x0200;
        /// Declared abstract.
        const ABSTRACT = 0x0400;
        /// Compiler-generated.
        const SYNTHETIC = 0x1000;

        // Keep any bits we do not model (enum, annotation, module, ...)
        const _ = !0;
    }
}

impl AccessFlags {
    /// `true` for a static member.
    #[must_use]
    pub fn is_static(self) -> bool {
        self.contains(AccessFlags::STATIC)
    }

    /// `true` for a final member.
    #[must_use]
    pub fn is_final(self) -> bool {
        self.contains(AccessFlags::FINAL)
    }

    /// `true` for a volatile field.
    #[must_use]
    pub fn is_volatile(self) -> bool {
        self.contains(AccessFlags::VOLATILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let flags = AccessFlags::from_bits_retain(0x0019); // public static final
        assert!(flags.is_static());
        assert!(flags.is_final());
        assert!(!flags.is_volatile());
    }

    #[test]
    fn unknown_bits_survive() {
        let flags = AccessFlags::from_bits_retain(0x4000); // ACC_ENUM
        assert_eq!(flags.bits(), 0x4000);
    }
}
