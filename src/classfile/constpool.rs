//! Constant pool: parsing, serialization and append-style interning.
//!
//! The constant pool is the class file's string/reference heap. The
//! instrumentation pipeline never removes or reorders existing entries —
//! indices embedded in untouched attribute bytes must stay valid — it only
//! appends the entries its injected instructions need. [`ConstPool`]
//! therefore exposes two faces:
//!
//! - read access by index ([`ConstPool::get`], [`ConstPool::utf8`],
//!   [`ConstPool::class_name`], [`ConstPool::member_ref`]), and
//! - interning appenders ([`ConstPool::add_utf8`], [`ConstPool::add_class`],
//!   [`ConstPool::add_method_ref`], ...) that reuse an existing equal entry
//!   when one is present.
//!
//! `Utf8` payloads are kept as raw bytes (the JVM's modified UTF-8), so
//! byte-for-byte round trips hold even for payloads that are not valid
//! UTF-8.

use crate::{file::io::write_be, file::parser::Parser, Result};

/// Constant pool entry tags, as defined by the class file format.
mod tag {
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

/// A single constant pool entry.
///
/// Float and double payloads are kept as raw bit patterns so serialization
/// reproduces the input exactly (NaN payloads included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Modified UTF-8 byte payload.
    Utf8(Vec<u8>),
    /// 32-bit integer constant.
    Integer(i32),
    /// 32-bit float constant, raw IEEE-754 bits.
    Float(u32),
    /// 64-bit long constant (occupies two pool slots).
    Long(i64),
    /// 64-bit double constant, raw IEEE-754 bits (occupies two pool slots).
    Double(u64),
    /// Class reference: index of the Utf8 internal name.
    Class(u16),
    /// String literal: index of the Utf8 payload.
    String(u16),
    /// Field reference: (class index, name-and-type index).
    FieldRef(u16, u16),
    /// Method reference: (class index, name-and-type index).
    MethodRef(u16, u16),
    /// Interface method reference: (class index, name-and-type index).
    InterfaceMethodRef(u16, u16),
    /// Name and type: (name Utf8 index, descriptor Utf8 index).
    NameAndType(u16, u16),
    /// Method handle: (reference kind, reference index).
    MethodHandle(u8, u16),
    /// Method type: descriptor Utf8 index.
    MethodType(u16),
    /// Dynamically-computed constant: (bootstrap index, name-and-type index).
    Dynamic(u16, u16),
    /// Dynamically-computed call site: (bootstrap index, name-and-type index).
    InvokeDynamic(u16, u16),
    /// Module name: Utf8 index.
    Module(u16),
    /// Package name: Utf8 index.
    Package(u16),
}

/// The constant pool of one class file.
///
/// Entry 0 is unused by the format; `Long` and `Double` entries are followed
/// by a phantom slot. Both are represented as `None`.
#[derive(Debug, Clone)]
pub struct ConstPool {
    entries: Vec<Option<Constant>>,
}

impl Default for ConstPool {
    fn default() -> Self {
        ConstPool {
            entries: vec![None],
        }
    }
}

impl ConstPool {
    /// Create an empty pool (slot 0 reserved).
    #[must_use]
    pub fn new() -> Self {
        ConstPool::default()
    }

    /// Parse a constant pool, including its leading count word.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on an unknown tag and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let count = parser.read_u16()?;
        let mut entries: Vec<Option<Constant>> = Vec::with_capacity(count as usize);
        entries.push(None);

        while entries.len() < count as usize {
            let tag = parser.read_u8()?;
            let constant = match tag {
                tag::UTF8 => {
                    let len = parser.read_u16()? as usize;
                    Constant::Utf8(parser.read_bytes(len)?.to_vec())
                }
                tag::INTEGER => Constant::Integer(parser.read_i32()?),
                tag::FLOAT => Constant::Float(parser.read_u32()?),
                tag::LONG => Constant::Long(parser.read_be::<i64>()?),
                tag::DOUBLE => Constant::Double(parser.read_be::<u64>()?),
                tag::CLASS => Constant::Class(parser.read_u16()?),
                tag::STRING => Constant::String(parser.read_u16()?),
                tag::FIELD_REF => Constant::FieldRef(parser.read_u16()?, parser.read_u16()?),
                tag::METHOD_REF => Constant::MethodRef(parser.read_u16()?, parser.read_u16()?),
                tag::INTERFACE_METHOD_REF => {
                    Constant::InterfaceMethodRef(parser.read_u16()?, parser.read_u16()?)
                }
                tag::NAME_AND_TYPE => {
                    Constant::NameAndType(parser.read_u16()?, parser.read_u16()?)
                }
                tag::METHOD_HANDLE => Constant::MethodHandle(parser.read_u8()?, parser.read_u16()?),
                tag::METHOD_TYPE => Constant::MethodType(parser.read_u16()?),
                tag::DYNAMIC => Constant::Dynamic(parser.read_u16()?, parser.read_u16()?),
                tag::INVOKE_DYNAMIC => {
                    Constant::InvokeDynamic(parser.read_u16()?, parser.read_u16()?)
                }
                tag::MODULE => Constant::Module(parser.read_u16()?),
                tag::PACKAGE => Constant::Package(parser.read_u16()?),
                _ => {
                    return Err(malformed_error!(
                        "Unknown constant pool tag {} at entry {}",
                        tag,
                        entries.len()
                    ))
                }
            };

            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(Some(constant));
            if wide {
                entries.push(None);
            }
        }

        if entries.len() != count as usize {
            return Err(malformed_error!(
                "Constant pool overran its declared count of {}",
                count
            ));
        }

        Ok(ConstPool { entries })
    }

    /// Serialize the pool, including its leading count word.
    pub fn write(&self, out: &mut Vec<u8>) {
        write_be(out, self.entries.len() as u16);
        for entry in self.entries.iter().flatten() {
            match entry {
                Constant::Utf8(bytes) => {
                    write_be(out, tag::UTF8);
                    write_be(out, bytes.len() as u16);
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) => {
                    write_be(out, tag::INTEGER);
                    write_be(out, *v);
                }
                Constant::Float(bits) => {
                    write_be(out, tag::FLOAT);
                    write_be(out, *bits);
                }
                Constant::Long(v) => {
                    write_be(out, tag::LONG);
                    write_be(out, *v);
                }
                Constant::Double(bits) => {
                    write_be(out, tag::DOUBLE);
                    write_be(out, *bits);
                }
                Constant::Class(idx) => {
                    write_be(out, tag::CLASS);
                    write_be(out, *idx);
                }
                Constant::String(idx) => {
                    write_be(out, tag::STRING);
                    write_be(out, *idx);
                }
                Constant::FieldRef(class, nat) => {
                    write_be(out, tag::FIELD_REF);
                    write_be(out, *class);
                    write_be(out, *nat);
                }
                Constant::MethodRef(class, nat) => {
                    write_be(out, tag::METHOD_REF);
                    write_be(out, *class);
                    write_be(out, *nat);
                }
                Constant::InterfaceMethodRef(class, nat) => {
                    write_be(out, tag::INTERFACE_METHOD_REF);
                    write_be(out, *class);
                    write_be(out, *nat);
                }
                Constant::NameAndType(name, desc) => {
                    write_be(out, tag::NAME_AND_TYPE);
                    write_be(out, *name);
                    write_be(out, *desc);
                }
                Constant::MethodHandle(kind, reference) => {
                    write_be(out, tag::METHOD_HANDLE);
                    write_be(out, *kind);
                    write_be(out, *reference);
                }
                Constant::MethodType(desc) => {
                    write_be(out, tag::METHOD_TYPE);
                    write_be(out, *desc);
                }
                Constant::Dynamic(bootstrap, nat) => {
                    write_be(out, tag::DYNAMIC);
                    write_be(out, *bootstrap);
                    write_be(out, *nat);
                }
                Constant::InvokeDynamic(bootstrap, nat) => {
                    write_be(out, tag::INVOKE_DYNAMIC);
                    write_be(out, *bootstrap);
                    write_be(out, *nat);
                }
                Constant::Module(idx) => {
                    write_be(out, tag::MODULE);
                    write_be(out, *idx);
                }
                Constant::Package(idx) => {
                    write_be(out, tag::PACKAGE);
                    write_be(out, *idx);
                }
            }
        }
    }

    /// Number of pool slots, counting the reserved slot 0 and phantom slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the pool holds no real entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Look up an entry by pool index.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize).and_then(Option::as_ref)
    }

    /// Resolve a `Utf8` entry to a `&str`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a Utf8
    /// entry or the payload is not valid UTF-8 (injected names always are).
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => std::str::from_utf8(bytes)
                .map_err(|_| malformed_error!("Utf8 entry {} is not valid UTF-8", index)),
            _ => Err(malformed_error!("Entry {} is not a Utf8 constant", index)),
        }
    }

    /// Resolve a `Class` entry to its internal name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a Class
    /// entry or its name entry is invalid.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(Constant::Class(name_index)) => self.utf8(*name_index),
            _ => Err(malformed_error!("Entry {} is not a Class constant", index)),
        }
    }

    /// Resolve a field/method/interface-method reference to
    /// `(owner, name, descriptor)`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the index does not name a member
    /// reference or any of its components is invalid.
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        let (class_index, nat_index) = match self.get(index) {
            Some(
                Constant::FieldRef(class, nat)
                | Constant::MethodRef(class, nat)
                | Constant::InterfaceMethodRef(class, nat),
            ) => (*class, *nat),
            _ => {
                return Err(malformed_error!(
                    "Entry {} is not a member reference",
                    index
                ))
            }
        };

        let owner = self.class_name(class_index)?;
        let (name_index, desc_index) = match self.get(nat_index) {
            Some(Constant::NameAndType(name, desc)) => (*name, *desc),
            _ => {
                return Err(malformed_error!(
                    "Entry {} is not a NameAndType constant",
                    nat_index
                ))
            }
        };

        Ok((owner, self.utf8(name_index)?, self.utf8(desc_index)?))
    }

    fn push(&mut self, constant: Constant) -> Result<u16> {
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        let index = self.entries.len();
        if index + usize::from(wide) > u16::MAX as usize {
            return Err(malformed_error!(
                "Constant pool exhausted while appending injected entries"
            ));
        }

        self.entries.push(Some(constant));
        if wide {
            self.entries.push(None);
        }
        Ok(index as u16)
    }

    fn find(&self, constant: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|entry| entry.as_ref() == Some(constant))
            .map(|index| index as u16)
    }

    fn intern(&mut self, constant: Constant) -> Result<u16> {
        match self.find(&constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    /// Intern a Utf8 entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_utf8(&mut self, text: &str) -> Result<u16> {
        self.intern(Constant::Utf8(text.as_bytes().to_vec()))
    }

    /// Intern an Integer entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.intern(Constant::Integer(value))
    }

    /// Intern a Class entry for `internal_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.add_utf8(internal_name)?;
        self.intern(Constant::Class(name))
    }

    /// Intern a String entry for `text`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_string(&mut self, text: &str) -> Result<u16> {
        let utf8 = self.add_utf8(text)?;
        self.intern(Constant::String(utf8))
    }

    /// Intern a NameAndType entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.add_utf8(name)?;
        let desc = self.add_utf8(descriptor)?;
        self.intern(Constant::NameAndType(name, desc))
    }

    /// Intern a FieldRef entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(owner)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::FieldRef(class, nat))
    }

    /// Intern a MethodRef entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is exhausted.
    pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(owner)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::MethodRef(class, nat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(pool: &ConstPool) -> ConstPool {
        let mut bytes = Vec::new();
        pool.write(&mut bytes);
        let mut parser = Parser::new(&bytes);
        ConstPool::parse(&mut parser).unwrap()
    }

    #[test]
    fn intern_is_idempotent() {
        let mut pool = ConstPool::new();
        let a = pool.add_utf8("Hello").unwrap();
        let b = pool.add_utf8("Hello").unwrap();
        assert_eq!(a, b);

        let m1 = pool
            .add_method_ref("demo/Worker", "run", "()V")
            .unwrap();
        let m2 = pool
            .add_method_ref("demo/Worker", "run", "()V")
            .unwrap();
        assert_eq!(m1, m2);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstPool::new();
        let long_idx = pool.intern(Constant::Long(42)).unwrap();
        let next = pool.add_utf8("after").unwrap();
        assert_eq!(next, long_idx + 2);

        let reparsed = round_trip(&pool);
        assert_eq!(reparsed.get(long_idx), Some(&Constant::Long(42)));
        assert!(reparsed.get(long_idx + 1).is_none());
        assert_eq!(reparsed.utf8(next).unwrap(), "after");
    }

    #[test]
    fn member_ref_resolution() {
        let mut pool = ConstPool::new();
        let field = pool
            .add_field_ref("demo/Counter", "value", "I")
            .unwrap();
        let (owner, name, desc) = pool.member_ref(field).unwrap();
        assert_eq!((owner, name, desc), ("demo/Counter", "value", "I"));
    }

    #[test]
    fn float_bits_survive_round_trip() {
        let mut pool = ConstPool::new();
        let nan_bits = 0x7FC0_0001u32; // NaN with a payload
        let idx = pool.intern(Constant::Float(nan_bits)).unwrap();

        let reparsed = round_trip(&pool);
        assert_eq!(reparsed.get(idx), Some(&Constant::Float(nan_bits)));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        // count=2, tag=99
        let bytes = [0x00, 0x02, 0x63];
        let mut parser = Parser::new(&bytes);
        assert!(matches!(
            ConstPool::parse(&mut parser),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
