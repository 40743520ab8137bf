//! Programmatic construction of class files.
//!
//! The transformation emits a handful of support classes that do not exist
//! in the input archive (the runtime facade, the shadow-reference holder,
//! per-class shadow state). [`ClassBuilder`] assembles those from scratch:
//! it owns a fresh [`ClassFile`] with an interned constant pool and offers
//! the small vocabulary the generators need, fields with optional
//! `ConstantValue` attributes, native method stubs and constructors built
//! around the mandatory superclass call.

use crate::{
    classfile::{
        code::{opcodes, CodeAttribute, Insn},
        constpool::ConstPool,
        flags::AccessFlags,
        AttributeInfo, ClassFile, MemberInfo, EMITTED_MAJOR_VERSION,
    },
    Result,
};

/// Builder for a synthesized class file.
pub struct ClassBuilder {
    class: ClassFile,
    super_name: String,
}

impl ClassBuilder {
    /// Start a public class `name` extending `super_name`, both internal
    /// names.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on constant pool exhaustion.
    pub fn new(name: &str, super_name: &str) -> Result<Self> {
        let mut pool = ConstPool::new();
        let this_class = pool.add_class(name)?;
        let super_class = pool.add_class(super_name)?;

        Ok(ClassBuilder {
            class: ClassFile {
                minor_version: 0,
                major_version: EMITTED_MAJOR_VERSION,
                pool,
                access_flags: AccessFlags::PUBLIC | AccessFlags::SUPER,
                this_class,
                super_class,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
            super_name: super_name.to_string(),
        })
    }

    /// Add a field with no attributes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on constant pool exhaustion.
    pub fn add_field(&mut self, name: &str, descriptor: &str, flags: AccessFlags) -> Result<()> {
        let name_index = self.class.pool.add_utf8(name)?;
        let descriptor_index = self.class.pool.add_utf8(descriptor)?;
        self.class.fields.push(MemberInfo {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// Add a `public static final int` field with a `ConstantValue`
    /// attribute, so reads of it are folded by the loading JVM.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on constant pool exhaustion.
    pub fn add_int_constant(&mut self, name: &str, value: i32) -> Result<()> {
        let name_index = self.class.pool.add_utf8(name)?;
        let descriptor_index = self.class.pool.add_utf8("I")?;
        let attr_name = self.class.pool.add_utf8("ConstantValue")?;
        let value_index = self.class.pool.add_integer(value)?;

        self.class.fields.push(MemberInfo {
            access_flags: AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
            name_index,
            descriptor_index,
            attributes: vec![AttributeInfo {
                name_index: attr_name,
                info: value_index.to_be_bytes().to_vec(),
            }],
        });
        Ok(())
    }

    /// Add a `native` method: flags plus `ACC_NATIVE`, no `Code` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on constant pool exhaustion.
    pub fn add_native_method(
        &mut self,
        name: &str,
        descriptor: &str,
        flags: AccessFlags,
    ) -> Result<()> {
        let name_index = self.class.pool.add_utf8(name)?;
        let descriptor_index = self.class.pool.add_utf8(descriptor)?;
        self.class.methods.push(MemberInfo {
            access_flags: flags | AccessFlags::NATIVE,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// Add a method with the given body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on constant pool exhaustion or if
    /// the body fails to assemble.
    pub fn add_method(
        &mut self,
        name: &str,
        descriptor: &str,
        flags: AccessFlags,
        code: &CodeAttribute,
    ) -> Result<()> {
        let name_index = self.class.pool.add_utf8(name)?;
        let descriptor_index = self.class.pool.add_utf8(descriptor)?;
        let code_name = self.class.pool.add_utf8("Code")?;
        let info = code.encode()?;

        self.class.methods.push(MemberInfo {
            access_flags: flags,
            name_index,
            descriptor_index,
            attributes: vec![AttributeInfo {
                name_index: code_name,
                info,
            }],
        });
        Ok(())
    }

    /// Add a public constructor: `aload_0`, the superclass `<init>()V`
    /// call, then `tail`, then `return`.
    ///
    /// `max_stack`/`max_locals` must cover `tail` as well as the super
    /// call (which needs one stack slot and one local).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on constant pool exhaustion or if
    /// the body fails to assemble.
    pub fn add_constructor(
        &mut self,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        tail: Vec<Insn>,
    ) -> Result<()> {
        let super_init = self
            .class
            .pool
            .add_method_ref(&self.super_name, "<init>", "()V")?;

        let mut insns = vec![
            Insn::Raw(vec![opcodes::ALOAD_0]),
            Insn::Raw(vec![
                opcodes::INVOKESPECIAL,
                (super_init >> 8) as u8,
                super_init as u8,
            ]),
        ];
        insns.extend(tail);
        insns.push(Insn::Raw(vec![opcodes::RETURN]));

        let code = CodeAttribute {
            max_stack: max_stack.max(1),
            max_locals: max_locals.max(1),
            insns,
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        self.add_method("<init>", descriptor, AccessFlags::PUBLIC, &code)
    }

    /// Mutable access to the pool, for bodies that need extra constants.
    pub fn pool_mut(&mut self) -> &mut ConstPool {
        &mut self.class.pool
    }

    /// Internal name of the class under construction.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the pool is inconsistent,
    /// which cannot happen for a builder-owned pool.
    pub fn name(&self) -> Result<&str> {
        self.class.name()
    }

    /// Consume the builder, yielding the finished class.
    #[must_use]
    pub fn finish(self) -> ClassFile {
        self.class
    }
}
