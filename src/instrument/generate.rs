//! Generation of the runtime support classes.
//!
//! Rewritten code references classes that do not exist in the input: the
//! runtime facade, the shadow reference holder, the sizing constants and
//! one shadow class per instrumented class. All of
//! them are synthesized here from the registry's records and appended to
//! the output archive.
//!
//! The facade's entries are declared `native`: the methods exist so the
//! rewritten classes link, and the host environment supplies the
//! implementation when the archive actually runs.

use strum::IntoEnumIterator;

use crate::{
    classfile::{builder::ClassBuilder, code::opcodes, code::Insn, flags::AccessFlags},
    instrument::{emit, registry::FieldRegistry},
    runtime::value::TypeKind,
    Result,
};

/// A generated class, ready for the output archive.
pub struct GeneratedClass {
    /// Archive entry name (`jrelax/runtime/Coherence.class`).
    pub entry_name: String,
    /// Serialized class file.
    pub data: Vec<u8>,
}

fn entry(class: ClassBuilder) -> Result<GeneratedClass> {
    let name = class.name()?.to_string();
    Ok(GeneratedClass {
        entry_name: format!("{name}.class"),
        data: class.finish().serialize(),
    })
}

/// Synthesize every support class for one finished transformation run.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a generated class exhausts its
/// constant pool, which only a pathological number of shadow fields can
/// cause.
pub fn generate_support(registry: &FieldRegistry) -> Result<Vec<GeneratedClass>> {
    let mut classes = vec![
        coherence_facade()?,
        shadow_ref()?,
        configuration(registry)?,
    ];
    for shape in registry.shapes() {
        classes.push(shadow_class(shape)?);
    }
    log::info!("generated {} support classes", classes.len());
    Ok(classes)
}

/// The facade every injected call targets.
fn coherence_facade() -> Result<GeneratedClass> {
    let mut builder = ClassBuilder::new(emit::COHERENCE_CLASS, "java/lang/Object")?;
    let entry_flags = AccessFlags::PUBLIC | AccessFlags::STATIC;

    for name in ["enterThread", "leaveThread", "enterScope", "leaveScope", "flush", "refresh"] {
        builder.add_native_method(name, "()V", entry_flags)?;
    }
    builder.add_native_method("bindAccessor", emit::BIND_ACCESSOR_DESC, entry_flags)?;

    for kind in TypeKind::iter() {
        let stem = kind.method_stem();
        let sig = kind.accessor_descriptor();
        builder.add_native_method(&format!("getStatic{stem}"), &format!("(I){sig}"), entry_flags)?;
        builder.add_native_method(&format!("setStatic{stem}"), &format!("({sig}I)V"), entry_flags)?;
        builder.add_native_method(
            &format!("getField{stem}"),
            &format!("(Ljava/lang/Object;Ljava/lang/String;){sig}"),
            entry_flags,
        )?;
        builder.add_native_method(
            &format!("setField{stem}"),
            &format!("(Ljava/lang/Object;{sig}Ljava/lang/String;)V"),
            entry_flags,
        )?;
    }

    entry(builder)
}

/// The per-object shadow reference holder: one public final `owner` field
/// and a constructor that captures it.
fn shadow_ref() -> Result<GeneratedClass> {
    let mut builder = ClassBuilder::new(emit::SHADOW_REF_CLASS, "java/lang/Object")?;
    builder.add_field(
        "owner",
        "Ljava/lang/Object;",
        AccessFlags::PUBLIC | AccessFlags::FINAL,
    )?;

    let owner_ref = builder.pool_mut().add_field_ref(
        emit::SHADOW_REF_CLASS,
        "owner",
        "Ljava/lang/Object;",
    )?;
    let [hi, lo] = owner_ref.to_be_bytes();
    builder.add_constructor(
        "(Ljava/lang/Object;)V",
        2,
        2,
        vec![
            Insn::Raw(vec![opcodes::ALOAD_0]),
            Insn::Raw(vec![0x2B]), // aload_1
            Insn::Raw(vec![opcodes::PUTFIELD, hi, lo]),
        ],
    )?;
    entry(builder)
}

/// Sizing constants for the host runtime.
fn configuration(registry: &FieldRegistry) -> Result<GeneratedClass> {
    let mut builder = ClassBuilder::new(emit::CONFIGURATION_CLASS, "java/lang/Object")?;
    builder.add_int_constant("STATIC_SLOT_COUNT", registry.slot_count() as i32)?;
    builder.add_int_constant("SHADOW_FIELD_COUNT", registry.max_shape_len() as i32)?;
    entry(builder)
}

/// One shadow class: per original instance field a thread-local value
/// column, a mirror column, a scope counter and a volatility flag, plus a
/// constructor raising the flags of the volatile fields.
fn shadow_class(shape: &crate::instrument::registry::ClassFieldShape) -> Result<GeneratedClass> {
    let shadow_name = format!("{}{}", shape.class_name, emit::SHADOW_CLASS_SUFFIX);
    let mut builder = ClassBuilder::new(&shadow_name, "java/lang/Object")?;

    for field in &shape.fields {
        builder.add_field(&field.name, &field.descriptor, AccessFlags::PUBLIC)?;
        builder.add_field(
            &format!("{}{}", field.name, emit::MIRROR_SUFFIX),
            &field.descriptor,
            AccessFlags::PUBLIC,
        )?;
        builder.add_field(
            &format!("{}{}", field.name, emit::SCOPE_SUFFIX),
            "I",
            AccessFlags::PUBLIC,
        )?;
        builder.add_field(
            &format!("{}{}", field.name, emit::VOLATILE_SUFFIX),
            "Z",
            AccessFlags::PUBLIC,
        )?;
    }

    let mut tail = Vec::new();
    for field in shape.fields.iter().filter(|f| f.is_volatile) {
        let flag_ref = builder.pool_mut().add_field_ref(
            &shadow_name,
            &format!("{}{}", field.name, emit::VOLATILE_SUFFIX),
            "Z",
        )?;
        let [hi, lo] = flag_ref.to_be_bytes();
        tail.push(Insn::Raw(vec![opcodes::ALOAD_0]));
        tail.push(Insn::Raw(vec![0x04])); // iconst_1
        tail.push(Insn::Raw(vec![opcodes::PUTFIELD, hi, lo]));
    }
    builder.add_constructor("()V", 2, 1, tail)?;

    entry(builder)
}
