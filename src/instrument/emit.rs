//! Emission of the call sequences spliced into rewritten methods.
//!
//! Every injected sequence targets a static entry on the runtime facade
//! class, so the rewriter never has to thread a receiver through the
//! operand stack: a field read becomes `push slot; invokestatic`, a field
//! write finds its value already on the stack and just appends the
//! routing operands. Constants are interned through the class's own pool.

use crate::{
    classfile::{
        code::{opcodes, Insn},
        constpool::ConstPool,
    },
    instrument::registry::PendingAccessor,
    runtime::value::TypeKind,
    Result,
};

/// Internal name of the runtime facade all injected calls target.
pub const COHERENCE_CLASS: &str = "jrelax/runtime/Coherence";
/// Internal name of the per-object shadow reference holder.
pub const SHADOW_REF_CLASS: &str = "jrelax/runtime/ShadowRef";
/// Internal name of the generated constants class.
pub const CONFIGURATION_CLASS: &str = "jrelax/runtime/Configuration";
/// Name of the shadow reference field injected into rewritten classes.
pub const SHADOW_REF_FIELD: &str = "jrxShadow";
/// Descriptor of the injected shadow reference field.
pub const SHADOW_REF_DESC: &str = "Ljrelax/runtime/ShadowRef;";
/// Suffix of generated per-class shadow classes.
pub const SHADOW_CLASS_SUFFIX: &str = "JrxShadow";
/// Suffix of mirror fields inside a shadow class.
pub const MIRROR_SUFFIX: &str = "JrxMirror";
/// Suffix of scope-counter fields inside a shadow class.
pub const SCOPE_SUFFIX: &str = "JrxScope";
/// Suffix of volatility-flag fields inside a shadow class.
pub const VOLATILE_SUFFIX: &str = "JrxVolatile";
/// Descriptor of `Coherence.bindAccessor`.
pub const BIND_ACCESSOR_DESC: &str =
    "(ILjava/lang/String;Ljava/lang/String;Ljava/lang/String;ZZ)V";

/// Operand stack headroom added to every rewritten method, covering the
/// widest injected sequence (a wide field write with routing operands).
pub const INJECTED_STACK_MARGIN: u16 = 6;

/// Push an `int` constant with the shortest encoding.
pub fn push_int(pool: &mut ConstPool, value: i32) -> Result<Insn> {
    let bytes = match value {
        -1..=5 => vec![(opcodes::ICONST_0 as i32 + value) as u8],
        v if i8::try_from(v).is_ok() => vec![opcodes::BIPUSH, v as u8],
        v if i16::try_from(v).is_ok() => {
            let [hi, lo] = (v as i16).to_be_bytes();
            vec![opcodes::SIPUSH, hi, lo]
        }
        v => return ldc(pool.add_integer(v)?),
    };
    Ok(Insn::Raw(bytes))
}

/// Push a string constant.
pub fn push_string(pool: &mut ConstPool, text: &str) -> Result<Insn> {
    ldc(pool.add_string(text)?)
}

fn ldc(index: u16) -> Result<Insn> {
    if let Ok(narrow) = u8::try_from(index) {
        Ok(Insn::Raw(vec![opcodes::LDC, narrow]))
    } else {
        let [hi, lo] = index.to_be_bytes();
        Ok(Insn::Raw(vec![opcodes::LDC_W, hi, lo]))
    }
}

/// `invokestatic` on a runtime facade entry.
pub fn invoke_coherence(pool: &mut ConstPool, name: &str, descriptor: &str) -> Result<Insn> {
    let index = pool.add_method_ref(COHERENCE_CLASS, name, descriptor)?;
    let [hi, lo] = index.to_be_bytes();
    Ok(Insn::Raw(vec![opcodes::INVOKESTATIC, hi, lo]))
}

/// `checkcast` back to the declared type after a reference read. The
/// accessor entries traffic in `java/lang/Object`.
fn checkcast_to(pool: &mut ConstPool, descriptor: &str) -> Result<Insn> {
    let internal = match descriptor.as_bytes().first() {
        Some(b'L') => &descriptor[1..descriptor.len() - 1],
        _ => descriptor,
    };
    let index = pool.add_class(internal)?;
    let [hi, lo] = index.to_be_bytes();
    Ok(Insn::Raw(vec![opcodes::CHECKCAST, hi, lo]))
}

/// Replacement for `getstatic`: route the read through the cache.
pub fn read_static_seq(
    pool: &mut ConstPool,
    slot: u32,
    kind: TypeKind,
    descriptor: &str,
) -> Result<Vec<Insn>> {
    let mut seq = vec![
        push_int(pool, slot as i32)?,
        invoke_coherence(
            pool,
            &format!("getStatic{}", kind.method_stem()),
            &format!("(I){}", kind.accessor_descriptor()),
        )?,
    ];
    if kind == TypeKind::Reference && descriptor != "Ljava/lang/Object;" {
        seq.push(checkcast_to(pool, descriptor)?);
    }
    Ok(seq)
}

/// Replacement for `putstatic`: the value is on the stack, append the
/// slot and route the write through the cache.
pub fn write_static_seq(pool: &mut ConstPool, slot: u32, kind: TypeKind) -> Result<Vec<Insn>> {
    Ok(vec![
        push_int(pool, slot as i32)?,
        invoke_coherence(
            pool,
            &format!("setStatic{}", kind.method_stem()),
            &format!("({}I)V", kind.accessor_descriptor()),
        )?,
    ])
}

/// Replacement for `getfield`: the receiver is on the stack, append the
/// field name and route the read through the cache.
pub fn read_field_seq(
    pool: &mut ConstPool,
    name: &str,
    kind: TypeKind,
    descriptor: &str,
) -> Result<Vec<Insn>> {
    let mut seq = vec![
        push_string(pool, name)?,
        invoke_coherence(
            pool,
            &format!("getField{}", kind.method_stem()),
            &format!(
                "(Ljava/lang/Object;Ljava/lang/String;){}",
                kind.accessor_descriptor()
            ),
        )?,
    ];
    if kind == TypeKind::Reference && descriptor != "Ljava/lang/Object;" {
        seq.push(checkcast_to(pool, descriptor)?);
    }
    Ok(seq)
}

/// Replacement for `putfield`: receiver and value are on the stack,
/// append the field name and route the write through the cache.
pub fn write_field_seq(pool: &mut ConstPool, name: &str, kind: TypeKind) -> Result<Vec<Insn>> {
    Ok(vec![
        push_string(pool, name)?,
        invoke_coherence(
            pool,
            &format!("setField{}", kind.method_stem()),
            &format!(
                "(Ljava/lang/Object;{}Ljava/lang/String;)V",
                kind.accessor_descriptor()
            ),
        )?,
    ])
}

/// `Coherence.enterScope()`, appended after a lock acquisition.
pub fn scope_enter(pool: &mut ConstPool) -> Result<Insn> {
    invoke_coherence(pool, "enterScope", "()V")
}

/// `Coherence.leaveScope()`, prepended before a lock release.
pub fn scope_leave(pool: &mut ConstPool) -> Result<Insn> {
    invoke_coherence(pool, "leaveScope", "()V")
}

/// `Coherence.enterThread()`, the prologue of thread entry methods.
pub fn thread_enter(pool: &mut ConstPool) -> Result<Insn> {
    invoke_coherence(pool, "enterThread", "()V")
}

/// `Coherence.leaveThread()`, emitted before each return of a thread
/// entry method.
pub fn thread_leave(pool: &mut ConstPool) -> Result<Insn> {
    invoke_coherence(pool, "leaveThread", "()V")
}

/// One `Coherence.bindAccessor(...)` call for a class initializer.
pub fn bind_accessor_seq(pool: &mut ConstPool, pending: &PendingAccessor) -> Result<Vec<Insn>> {
    Ok(vec![
        push_int(pool, pending.slot as i32)?,
        push_string(pool, &pending.owner)?,
        push_string(pool, &pending.name)?,
        push_string(pool, &pending.descriptor)?,
        push_int(pool, i32::from(pending.is_final))?,
        push_int(pool, i32::from(pending.is_volatile))?,
        invoke_coherence(pool, "bindAccessor", BIND_ACCESSOR_DESC)?,
    ])
}

/// Install the shadow reference at the end of a constructor:
/// `this.jrxShadow = new ShadowRef(this)`.
pub fn shadow_install_seq(pool: &mut ConstPool, class_name: &str) -> Result<Vec<Insn>> {
    let shadow_class = pool.add_class(SHADOW_REF_CLASS)?;
    let ctor = pool.add_method_ref(SHADOW_REF_CLASS, "<init>", "(Ljava/lang/Object;)V")?;
    let field = pool.add_field_ref(class_name, SHADOW_REF_FIELD, SHADOW_REF_DESC)?;

    let [class_hi, class_lo] = shadow_class.to_be_bytes();
    let [ctor_hi, ctor_lo] = ctor.to_be_bytes();
    let [field_hi, field_lo] = field.to_be_bytes();
    Ok(vec![
        Insn::Raw(vec![opcodes::ALOAD_0]),
        Insn::Raw(vec![opcodes::NEW, class_hi, class_lo]),
        Insn::Raw(vec![opcodes::DUP]),
        Insn::Raw(vec![opcodes::ALOAD_0]),
        Insn::Raw(vec![opcodes::INVOKESPECIAL, ctor_hi, ctor_lo]),
        Insn::Raw(vec![opcodes::PUTFIELD, field_hi, field_lo]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_push_encodings() {
        let mut pool = ConstPool::new();
        assert_eq!(push_int(&mut pool, 3).unwrap(), Insn::Raw(vec![0x06]));
        assert_eq!(push_int(&mut pool, -1).unwrap(), Insn::Raw(vec![0x02]));
        assert_eq!(
            push_int(&mut pool, 100).unwrap(),
            Insn::Raw(vec![opcodes::BIPUSH, 100])
        );
        assert_eq!(
            push_int(&mut pool, 1000).unwrap(),
            Insn::Raw(vec![opcodes::SIPUSH, 0x03, 0xE8])
        );
        // Beyond sipush range the value moves into the pool.
        let wide = push_int(&mut pool, 100_000).unwrap();
        assert_eq!(wide.opcode(), opcodes::LDC);
    }

    #[test]
    fn static_read_of_reference_casts_back() {
        let mut pool = ConstPool::new();
        let seq =
            read_static_seq(&mut pool, 3, TypeKind::Reference, "Ljava/lang/String;").unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[1].opcode(), opcodes::INVOKESTATIC);
        assert_eq!(seq[2].opcode(), opcodes::CHECKCAST);

        let (owner, name, desc) = pool.member_ref(seq[1].pool_index().unwrap()).unwrap();
        assert_eq!(owner, COHERENCE_CLASS);
        assert_eq!(name, "getStaticObject");
        assert_eq!(desc, "(I)Ljava/lang/Object;");
    }

    #[test]
    fn primitive_read_has_no_cast() {
        let mut pool = ConstPool::new();
        let seq = read_static_seq(&mut pool, 0, TypeKind::Long, "J").unwrap();
        assert_eq!(seq.len(), 2);
        let (_, name, desc) = pool.member_ref(seq[1].pool_index().unwrap()).unwrap();
        assert_eq!(name, "getStaticLong");
        assert_eq!(desc, "(I)J");
    }

    #[test]
    fn field_write_routes_value_and_name() {
        let mut pool = ConstPool::new();
        let seq = write_field_seq(&mut pool, "count", TypeKind::Int).unwrap();
        assert_eq!(seq.len(), 2);
        let (_, name, desc) = pool.member_ref(seq[1].pool_index().unwrap()).unwrap();
        assert_eq!(name, "setFieldInt");
        assert_eq!(desc, "(Ljava/lang/Object;ILjava/lang/String;)V");
    }

    #[test]
    fn bind_sequence_shape() {
        let mut pool = ConstPool::new();
        let seq = bind_accessor_seq(
            &mut pool,
            &PendingAccessor {
                slot: 2,
                owner: "demo/A".to_string(),
                name: "flag".to_string(),
                descriptor: "Z".to_string(),
                is_volatile: true,
                is_final: false,
            },
        )
        .unwrap();
        assert_eq!(seq.len(), 7);
        assert_eq!(seq[0], Insn::Raw(vec![0x05])); // iconst_2
        assert_eq!(seq[4], Insn::Raw(vec![0x03])); // iconst_0: not final
        assert_eq!(seq[5], Insn::Raw(vec![0x04])); // iconst_1: volatile
        let (_, name, desc) = pool.member_ref(seq[6].pool_index().unwrap()).unwrap();
        assert_eq!(name, "bindAccessor");
        assert_eq!(desc, BIND_ACCESSOR_DESC);
    }

    #[test]
    fn shadow_install_targets_the_rewritten_class() {
        let mut pool = ConstPool::new();
        let seq = shadow_install_seq(&mut pool, "demo/Worker").unwrap();
        assert_eq!(seq.len(), 6);
        assert_eq!(seq[5].opcode(), opcodes::PUTFIELD);
        let (owner, name, desc) = pool.member_ref(seq[5].pool_index().unwrap()).unwrap();
        assert_eq!(owner, "demo/Worker");
        assert_eq!(name, SHADOW_REF_FIELD);
        assert_eq!(desc, SHADOW_REF_DESC);
    }
}
