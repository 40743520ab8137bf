//! Class file parsing and serialization.
//!
//! A [`ClassFile`] is a faithful in-memory form of one `.class` blob: the
//! version words, the constant pool, the access flags, the field and method
//! tables and the attribute lists, all mutable and all written back in the
//! standard big-endian layout by [`ClassFile::serialize`]. Attribute
//! payloads are kept as raw bytes; only the `Code` attribute has a decoded
//! form (see [`crate::classfile::code`]), produced on demand.
//!
//! Parsing never panics on hostile input. Structural violations surface as
//! [`crate::Error::Malformed`], truncation as [`crate::Error::OutOfBounds`].

pub mod builder;
pub mod code;
pub mod constpool;
pub mod flags;

use crate::{
    classfile::{constpool::ConstPool, flags::AccessFlags},
    file::{io::write_be, parser::Parser},
    Result,
};

/// First four bytes of every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Highest class file version emitted: 49.0 (Java 5).
///
/// Versions 50+ require `StackMapTable` frames for verification; rewritten
/// methods drop their frames, so the output is pinned to the last version
/// the JVM verifies by type inference.
pub const EMITTED_MAJOR_VERSION: u16 = 49;

/// A named attribute with an uninterpreted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Constant pool index of the attribute name (`Utf8`).
    pub name_index: u16,
    /// Raw attribute bytes, excluding the six-byte header.
    pub info: Vec<u8>,
}

/// One entry of the field or method table.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Access and property flags.
    pub access_flags: AccessFlags,
    /// Constant pool index of the member name (`Utf8`).
    pub name_index: u16,
    /// Constant pool index of the member descriptor (`Utf8`).
    pub descriptor_index: u16,
    /// Member attributes (`Code`, `ConstantValue`, ...).
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    /// The member's name, resolved through `pool`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name index does not
    /// resolve to a `Utf8` entry.
    pub fn name<'a>(&self, pool: &'a ConstPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    /// The member's descriptor, resolved through `pool`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the descriptor index does not
    /// resolve to a `Utf8` entry.
    pub fn descriptor<'a>(&self, pool: &'a ConstPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    /// Find an attribute of this member by name.
    #[must_use]
    pub fn attribute(&self, pool: &ConstPool, name: &str) -> Option<&AttributeInfo> {
        self.attributes
            .iter()
            .find(|attr| pool.utf8(attr.name_index).is_ok_and(|n| n == name))
    }
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor version word.
    pub minor_version: u16,
    /// Major version word.
    pub major_version: u16,
    /// The constant pool.
    pub pool: ConstPool,
    /// Class access flags.
    pub access_flags: AccessFlags,
    /// Constant pool index of this class.
    pub this_class: u16,
    /// Constant pool index of the superclass, 0 for `java/lang/Object`.
    pub super_class: u16,
    /// Constant pool indices of directly implemented interfaces.
    pub interfaces: Vec<u16>,
    /// Declared fields.
    pub fields: Vec<MemberInfo>,
    /// Declared methods.
    pub methods: Vec<MemberInfo>,
    /// Class-level attributes.
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Parse a complete class file from `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on a bad magic number or
    /// structurally invalid tables, [`crate::Error::OutOfBounds`] on
    /// truncated input.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);

        let magic = parser.read_u32()?;
        if magic != MAGIC {
            return Err(malformed_error!("Invalid class file magic 0x{:08X}", magic));
        }

        let minor_version = parser.read_u16()?;
        let major_version = parser.read_u16()?;
        let pool = ConstPool::parse(&mut parser)?;

        let access_flags = AccessFlags::from_bits_retain(parser.read_u16()?);
        let this_class = parser.read_u16()?;
        let super_class = parser.read_u16()?;

        let interface_count = parser.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(parser.read_u16()?);
        }

        let fields = Self::parse_members(&mut parser)?;
        let methods = Self::parse_members(&mut parser)?;
        let attributes = Self::parse_attributes(&mut parser)?;

        Ok(ClassFile {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_members(parser: &mut Parser<'_>) -> Result<Vec<MemberInfo>> {
        let count = parser.read_u16()?;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access_flags = AccessFlags::from_bits_retain(parser.read_u16()?);
            let name_index = parser.read_u16()?;
            let descriptor_index = parser.read_u16()?;
            let attributes = Self::parse_attributes(parser)?;
            members.push(MemberInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            });
        }
        Ok(members)
    }

    fn parse_attributes(parser: &mut Parser<'_>) -> Result<Vec<AttributeInfo>> {
        let count = parser.read_u16()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_index = parser.read_u16()?;
            let len = parser.read_u32()? as usize;
            attributes.push(AttributeInfo {
                name_index,
                info: parser.read_bytes(len)?.to_vec(),
            });
        }
        Ok(attributes)
    }

    /// Serialize back to class file bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1024);
        write_be(&mut out, MAGIC);
        write_be(&mut out, self.minor_version);
        write_be(&mut out, self.major_version);
        self.pool.write(&mut out);
        write_be(&mut out, self.access_flags.bits());
        write_be(&mut out, self.this_class);
        write_be(&mut out, self.super_class);

        write_be(&mut out, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            write_be(&mut out, *interface);
        }

        Self::write_members(&mut out, &self.fields);
        Self::write_members(&mut out, &self.methods);
        Self::write_attributes(&mut out, &self.attributes);
        out
    }

    fn write_members(out: &mut Vec<u8>, members: &[MemberInfo]) {
        write_be(out, members.len() as u16);
        for member in members {
            write_be(out, member.access_flags.bits());
            write_be(out, member.name_index);
            write_be(out, member.descriptor_index);
            Self::write_attributes(out, &member.attributes);
        }
    }

    fn write_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) {
        write_be(out, attributes.len() as u16);
        for attr in attributes {
            write_be(out, attr.name_index);
            write_be(out, attr.info.len() as u32);
            out.extend_from_slice(&attr.info);
        }
    }

    /// Internal name of this class (e.g. `com/example/Worker`).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `this_class` does not resolve
    /// to a `Class` entry.
    pub fn name(&self) -> Result<&str> {
        self.pool.class_name(self.this_class)
    }

    /// Cap the class version at the highest version emitted.
    ///
    /// Rewritten methods carry no `StackMapTable`, which version 50+
    /// class files require, so anything newer is lowered to
    /// [`EMITTED_MAJOR_VERSION`].
    pub fn cap_version(&mut self) {
        if self.major_version > EMITTED_MAJOR_VERSION {
            self.major_version = EMITTED_MAJOR_VERSION;
            self.minor_version = 0;
        }
    }
}
