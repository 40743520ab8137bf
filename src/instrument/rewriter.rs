//! The class rewriter.
//!
//! Takes a parsed class and redirects its shared-memory traffic through
//! the runtime facade: field access bytecodes become accessor calls,
//! monitor and `Lock` operations grow scope brackets, thread entry
//! points register their cache, constructors install the shadow
//! reference and class initializers bind the accessors of every static
//! field queued so far.
//!
//! Rewriting works on the decoded instruction list. Each original
//! instruction maps to the first instruction emitted for it, so branches
//! into a replaced access run the whole injected sequence, and a branch
//! to a `monitorexit` performs the flush that precedes it.

use crate::{
    classfile::{
        code::{opcodes, CodeAttribute, Insn},
        flags::AccessFlags,
        ClassFile, MemberInfo,
    },
    instrument::{
        emit,
        registry::{ClassFieldShape, FieldRegistry, PendingAccessor, ShadowField},
    },
    runtime::value::TypeKind,
    Result,
};

/// Name prefixes of classes that are never rewritten and whose fields are
/// never routed through the cache.
pub const PLATFORM_PREFIXES: &[&str] = &["java/", "javax/", "sun/", "com/sun/", "jdk/", "jrelax/"];

/// Returns `true` for platform and runtime-support classes.
#[must_use]
pub fn is_platform(internal_name: &str) -> bool {
    PLATFORM_PREFIXES
        .iter()
        .any(|prefix| internal_name.starts_with(prefix))
}

/// The lock interface whose acquire/release pairs are bracketed like
/// monitors.
const LOCK_INTERFACE: &str = "java/util/concurrent/locks/Lock";

/// Attributes dropped from rewritten methods. The splices invalidate all
/// three, and the emitted class version does not require frames.
const DROPPED_CODE_ATTRIBUTES: &[&str] = &["StackMapTable", "LineNumberTable", "LocalVariableTable"];

struct MethodShape {
    is_init: bool,
    is_clinit: bool,
    is_entry: bool,
}

impl MethodShape {
    fn classify(name: &str, descriptor: &str, flags: AccessFlags) -> Self {
        let is_entry = (name == "main" && descriptor == "([Ljava/lang/String;)V" && flags.is_static())
            || (name == "run" && descriptor == "()V" && !flags.is_static());
        MethodShape {
            is_init: name == "<init>",
            is_clinit: name == "<clinit>",
            is_entry,
        }
    }
}

/// Rewrites classes against a shared [`FieldRegistry`].
pub struct Rewriter<'a> {
    registry: &'a mut FieldRegistry,
    excludes: &'a [String],
}

impl<'a> Rewriter<'a> {
    /// A rewriter recording into `registry`. `excludes` holds user
    /// exclusion patterns in internal-name form; accesses to fields owned
    /// by a matching class keep their original bytecode.
    pub fn new(registry: &'a mut FieldRegistry, excludes: &'a [String]) -> Self {
        Rewriter { registry, excludes }
    }

    fn skip_owner(&self, owner: &str) -> bool {
        is_platform(owner)
            || self
                .excludes
                .iter()
                .any(|pattern| owner.contains(pattern.as_str()))
    }

    /// Rewrite `class` in place.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the class or one of its
    /// method bodies cannot be decoded or re-assembled.
    pub fn rewrite(&mut self, class: &mut ClassFile) -> Result<()> {
        let class_name = class.name()?.to_string();
        let is_interface = class.access_flags.contains(AccessFlags::INTERFACE);
        log::debug!("rewriting {class_name}");

        self.register_fields(class, &class_name, is_interface)?;
        if !is_interface {
            self.inject_shadow_field(class)?;
        }

        let mut methods = std::mem::take(&mut class.methods);
        for method in &mut methods {
            self.rewrite_method(class, &class_name, is_interface, method)?;
        }
        class.methods = methods;

        class.cap_version();
        Ok(())
    }

    /// Assign slots to declared statics and record the instance layout.
    fn register_fields(
        &mut self,
        class: &ClassFile,
        class_name: &str,
        is_interface: bool,
    ) -> Result<()> {
        let mut shadow_fields = Vec::new();
        for field in &class.fields {
            let name = field.name(&class.pool)?.to_string();
            let descriptor = field.descriptor(&class.pool)?.to_string();
            let kind = TypeKind::from_descriptor(&descriptor)?;

            if field.access_flags.is_static() {
                let slot = self.registry.slot_for(class_name, &name, &descriptor);
                self.registry.queue_accessor(PendingAccessor {
                    slot,
                    owner: class_name.to_string(),
                    name,
                    descriptor,
                    is_volatile: field.access_flags.is_volatile(),
                    is_final: field.access_flags.is_final(),
                });
            } else {
                shadow_fields.push(ShadowField {
                    name,
                    descriptor,
                    kind,
                    is_volatile: field.access_flags.is_volatile(),
                });
            }
        }

        // A shadow class is generated for every rewritten class, even a
        // field-less one, so constructors can attach a shadow unconditionally.
        if !is_interface {
            self.registry.record_shape(ClassFieldShape {
                class_name: class_name.to_string(),
                fields: shadow_fields,
            });
        }
        Ok(())
    }

    /// Insert the shadow reference field at index 0.
    fn inject_shadow_field(&mut self, class: &mut ClassFile) -> Result<()> {
        let name_index = class.pool.add_utf8(emit::SHADOW_REF_FIELD)?;
        let descriptor_index = class.pool.add_utf8(emit::SHADOW_REF_DESC)?;
        class.fields.insert(
            0,
            MemberInfo {
                access_flags: AccessFlags::PUBLIC | AccessFlags::FINAL,
                name_index,
                descriptor_index,
                attributes: Vec::new(),
            },
        );
        Ok(())
    }

    fn rewrite_method(
        &mut self,
        class: &mut ClassFile,
        class_name: &str,
        is_interface: bool,
        method: &mut MemberInfo,
    ) -> Result<()> {
        let name = method.name(&class.pool)?.to_string();
        let descriptor = method.descriptor(&class.pool)?.to_string();
        let shape = MethodShape::classify(&name, &descriptor, method.access_flags);

        let Some(code_pos) = method
            .attributes
            .iter()
            .position(|attr| class.pool.utf8(attr.name_index).is_ok_and(|n| n == "Code"))
        else {
            return Ok(());
        };

        let mut code = CodeAttribute::decode(&method.attributes[code_pos].info)?;
        self.rewrite_body(class, class_name, is_interface, &shape, &mut code)?;

        code.attributes.retain(|attr| {
            !class
                .pool
                .utf8(attr.name_index)
                .is_ok_and(|n| DROPPED_CODE_ATTRIBUTES.contains(&n))
        });
        code.max_stack = code.max_stack.saturating_add(emit::INJECTED_STACK_MARGIN);

        method.attributes[code_pos].info = code.encode()?;
        Ok(())
    }

    fn rewrite_body(
        &mut self,
        class: &mut ClassFile,
        class_name: &str,
        is_interface: bool,
        shape: &MethodShape,
        code: &mut CodeAttribute,
    ) -> Result<()> {
        let pool = &mut class.pool;
        let old = std::mem::take(&mut code.insns);
        let mut new: Vec<Insn> = Vec::with_capacity(old.len() + 8);
        let mut map = vec![0usize; old.len() + 1];

        if shape.is_clinit {
            for pending in self.registry.take_pending() {
                new.extend(emit::bind_accessor_seq(pool, &pending)?);
            }
        }
        if shape.is_entry {
            new.push(emit::thread_enter(pool)?);
        }

        for (i, insn) in old.into_iter().enumerate() {
            map[i] = new.len();
            let opcode = insn.opcode();
            match opcode {
                opcodes::GETSTATIC
                | opcodes::PUTSTATIC
                | opcodes::GETFIELD
                | opcodes::PUTFIELD
                    if !shape.is_init && !shape.is_clinit =>
                {
                    let index = insn.pool_index().ok_or_else(|| {
                        malformed_error!("Field instruction without a pool operand")
                    })?;
                    let (owner, name, descriptor) = {
                        let (o, n, d) = pool.member_ref(index)?;
                        (o.to_string(), n.to_string(), d.to_string())
                    };

                    if self.skip_owner(&owner) {
                        new.push(insn);
                        continue;
                    }
                    let kind = TypeKind::from_descriptor(&descriptor)?;
                    match opcode {
                        opcodes::GETSTATIC => {
                            let slot = self.registry.slot_for(&owner, &name, &descriptor);
                            new.extend(emit::read_static_seq(pool, slot, kind, &descriptor)?);
                        }
                        opcodes::PUTSTATIC => {
                            let slot = self.registry.slot_for(&owner, &name, &descriptor);
                            new.extend(emit::write_static_seq(pool, slot, kind)?);
                        }
                        opcodes::GETFIELD => {
                            new.extend(emit::read_field_seq(pool, &name, kind, &descriptor)?);
                        }
                        _ => {
                            new.extend(emit::write_field_seq(pool, &name, kind)?);
                        }
                    }
                }
                opcodes::MONITORENTER => {
                    new.push(insn);
                    new.push(emit::scope_enter(pool)?);
                }
                opcodes::MONITOREXIT => {
                    new.push(emit::scope_leave(pool)?);
                    new.push(insn);
                }
                opcodes::INVOKEINTERFACE => {
                    let index = insn.pool_index().ok_or_else(|| {
                        malformed_error!("invokeinterface without a pool operand")
                    })?;
                    let (owner, name, descriptor) = {
                        let (o, n, d) = pool.member_ref(index)?;
                        (o.to_string(), n.to_string(), d.to_string())
                    };
                    match (owner.as_str(), name.as_str(), descriptor.as_str()) {
                        (LOCK_INTERFACE, "lock", "()V") => {
                            new.push(insn);
                            new.push(emit::scope_enter(pool)?);
                        }
                        (LOCK_INTERFACE, "unlock", "()V") => {
                            new.push(emit::scope_leave(pool)?);
                            new.push(insn);
                        }
                        _ => new.push(insn),
                    }
                }
                opcodes::RETURN if shape.is_entry => {
                    new.push(emit::thread_leave(pool)?);
                    new.push(insn);
                }
                opcodes::RETURN if shape.is_init && !is_interface => {
                    new.extend(emit::shadow_install_seq(pool, class_name)?);
                    new.push(insn);
                }
                _ => new.push(insn),
            }
        }
        let end = map.len() - 1;
        map[end] = new.len();

        for insn in &mut new {
            match insn {
                Insn::Branch { target, .. } | Insn::BranchWide { target, .. } => {
                    *target = map[*target];
                }
                Insn::TableSwitch {
                    default, targets, ..
                } => {
                    *default = map[*default];
                    for target in targets {
                        *target = map[*target];
                    }
                }
                Insn::LookupSwitch { default, pairs } => {
                    *default = map[*default];
                    for (_, target) in pairs {
                        *target = map[*target];
                    }
                }
                Insn::Raw(_) => {}
            }
        }
        for handler in &mut code.handlers {
            handler.start = map[handler.start];
            handler.end = map[handler.end];
            handler.handler = map[handler.handler];
        }

        code.insns = new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{builder::ClassBuilder, constpool::ConstPool};

    fn field_insn(opcode: u8, index: u16) -> Insn {
        let [hi, lo] = index.to_be_bytes();
        Insn::Raw(vec![opcode, hi, lo])
    }

    /// A class with one static int, one instance int and a static `tick()V`
    /// method that increments the static field.
    fn sample_class() -> ClassFile {
        let mut builder = ClassBuilder::new("demo/Worker", "java/lang/Object").unwrap();
        builder
            .add_field("ticks", "I", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .unwrap();
        builder.add_field("id", "I", AccessFlags::PRIVATE).unwrap();

        let field_ref = builder
            .pool_mut()
            .add_field_ref("demo/Worker", "ticks", "I")
            .unwrap();
        let code = CodeAttribute {
            max_stack: 2,
            max_locals: 0,
            insns: vec![
                field_insn(opcodes::GETSTATIC, field_ref),
                Insn::Raw(vec![0x04]), // iconst_1
                Insn::Raw(vec![0x60]), // iadd
                field_insn(opcodes::PUTSTATIC, field_ref),
                Insn::Raw(vec![opcodes::RETURN]),
            ],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method(
                "tick",
                "()V",
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                &code,
            )
            .unwrap();
        builder.add_constructor("()V", 1, 1, Vec::new()).unwrap();
        builder.finish()
    }

    fn decoded_method(class: &ClassFile, name: &str) -> CodeAttribute {
        let method = class
            .methods
            .iter()
            .find(|m| m.name(&class.pool).unwrap() == name)
            .unwrap();
        let attr = method.attribute(&class.pool, "Code").unwrap();
        CodeAttribute::decode(&attr.info).unwrap()
    }

    #[test]
    fn static_accesses_become_accessor_calls() {
        let mut class = sample_class();
        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let bytes = class.serialize();
        let reparsed = ClassFile::parse(&bytes).unwrap();
        let code = decoded_method(&reparsed, "tick");

        let called: Vec<String> = code
            .insns
            .iter()
            .filter(|i| i.opcode() == opcodes::INVOKESTATIC)
            .map(|i| {
                let (_, name, _) = reparsed.pool.member_ref(i.pool_index().unwrap()).unwrap();
                name.to_string()
            })
            .collect();
        assert_eq!(called, vec!["getStaticInt", "setStaticInt"]);
        assert!(code
            .insns
            .iter()
            .all(|i| i.opcode() != opcodes::GETSTATIC && i.opcode() != opcodes::PUTSTATIC));
    }

    #[test]
    fn shadow_field_injected_first() {
        let mut class = sample_class();
        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let first = &class.fields[0];
        assert_eq!(first.name(&class.pool).unwrap(), emit::SHADOW_REF_FIELD);
        assert_eq!(first.descriptor(&class.pool).unwrap(), emit::SHADOW_REF_DESC);
        assert!(first.access_flags.contains(AccessFlags::FINAL));
        assert_eq!(class.fields.len(), 3);
    }

    #[test]
    fn constructor_installs_shadow_reference() {
        let mut class = sample_class();
        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let code = decoded_method(&class, "<init>");
        let putfields: Vec<u8> = code.insns.iter().map(Insn::opcode).collect();
        assert!(putfields.contains(&opcodes::PUTFIELD));
        assert!(putfields.contains(&opcodes::NEW));
        // The original return is still last.
        assert_eq!(code.insns.last().unwrap().opcode(), opcodes::RETURN);
    }

    #[test]
    fn shape_recorded_for_instance_fields() {
        let mut class = sample_class();
        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let shapes = registry.shapes();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].class_name, "demo/Worker");
        assert_eq!(shapes[0].fields.len(), 1);
        assert_eq!(shapes[0].fields[0].name, "id");
        // The static field got a slot, not a shape entry.
        assert_eq!(registry.slot_count(), 1);
    }

    #[test]
    fn monitors_grow_scope_brackets() {
        let mut builder = ClassBuilder::new("demo/Locked", "java/lang/Object").unwrap();
        let code = CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            insns: vec![
                Insn::Raw(vec![opcodes::ALOAD_0]),
                Insn::Raw(vec![opcodes::MONITORENTER]),
                Insn::Raw(vec![opcodes::ALOAD_0]),
                Insn::Raw(vec![opcodes::MONITOREXIT]),
                Insn::Raw(vec![opcodes::RETURN]),
            ],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method("work", "()V", AccessFlags::PUBLIC, &code)
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let code = decoded_method(&class, "work");
        let names: Vec<String> = code
            .insns
            .iter()
            .map(|i| match i.opcode() {
                opcodes::INVOKESTATIC => {
                    let (_, name, _) = class.pool.member_ref(i.pool_index().unwrap()).unwrap();
                    name.to_string()
                }
                op => format!("0x{op:02X}"),
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "0x2A",
                "0xC2",
                "enterScope",
                "0x2A",
                "leaveScope",
                "0xC3",
                "0xB1"
            ]
        );
    }

    #[test]
    fn entry_method_brackets_the_thread() {
        let mut builder = ClassBuilder::new("demo/Task", "java/lang/Object").unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            insns: vec![Insn::Raw(vec![opcodes::RETURN])],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method("run", "()V", AccessFlags::PUBLIC, &code)
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let code = decoded_method(&class, "run");
        assert_eq!(code.insns.len(), 3);
        let (_, first, _) = class
            .pool
            .member_ref(code.insns[0].pool_index().unwrap())
            .unwrap();
        let (_, before_return, _) = class
            .pool
            .member_ref(code.insns[1].pool_index().unwrap())
            .unwrap();
        assert_eq!(first, "enterThread");
        assert_eq!(before_return, "leaveThread");
    }

    #[test]
    fn clinit_binds_queued_accessors() {
        let mut builder = ClassBuilder::new("demo/Config", "java/lang/Object").unwrap();
        builder
            .add_field(
                "LIMIT",
                "I",
                AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::VOLATILE,
            )
            .unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            insns: vec![Insn::Raw(vec![opcodes::RETURN])],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method("<clinit>", "()V", AccessFlags::STATIC, &code)
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();
        assert_eq!(registry.pending_len(), 0);

        let code = decoded_method(&class, "<clinit>");
        let (_, name, desc) = class
            .pool
            .member_ref(code.insns[6].pool_index().unwrap())
            .unwrap();
        assert_eq!(name, "bindAccessor");
        assert_eq!(desc, emit::BIND_ACCESSOR_DESC);
    }

    #[test]
    fn overloaded_static_names_bind_distinct_slots() {
        // One class, two statics called `x` with different descriptors.
        let mut builder = ClassBuilder::new("demo/Twin", "java/lang/Object").unwrap();
        builder
            .add_field("x", "I", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .unwrap();
        builder
            .add_field("x", "J", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            insns: vec![Insn::Raw(vec![opcodes::RETURN])],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method("<clinit>", "()V", AccessFlags::STATIC, &code)
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();
        assert_eq!(registry.slot_count(), 2);

        // Each bind sequence opens with its slot push: 0 then 1.
        let code = decoded_method(&class, "<clinit>");
        assert_eq!(code.insns[0], Insn::Raw(vec![opcodes::ICONST_0]));
        assert_eq!(code.insns[7], Insn::Raw(vec![0x04])); // iconst_1
    }

    #[test]
    fn platform_field_access_passes_through() {
        let mut builder = ClassBuilder::new("demo/Printer", "java/lang/Object").unwrap();
        let out_ref = builder
            .pool_mut()
            .add_field_ref("java/lang/System", "out", "Ljava/io/PrintStream;")
            .unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            insns: vec![
                field_insn(opcodes::GETSTATIC, out_ref),
                Insn::Raw(vec![0x57]), // pop
                Insn::Raw(vec![opcodes::RETURN]),
            ],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method(
                "show",
                "()V",
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                &code,
            )
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let code = decoded_method(&class, "show");
        assert_eq!(code.insns[0].opcode(), opcodes::GETSTATIC);
        assert_eq!(registry.slot_count(), 0);
    }

    #[test]
    fn access_to_excluded_owner_passes_through() {
        let mut builder = ClassBuilder::new("demo/App", "java/lang/Object").unwrap();
        let vendored_ref = builder
            .pool_mut()
            .add_field_ref("vendor/util/Helper", "count", "I")
            .unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            insns: vec![
                field_insn(opcodes::GETSTATIC, vendored_ref),
                Insn::Raw(vec![0x57]), // pop
                Insn::Raw(vec![opcodes::RETURN]),
            ],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method(
                "peek",
                "()V",
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                &code,
            )
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        let excludes = vec!["vendor/util".to_string()];
        Rewriter::new(&mut registry, &excludes)
            .rewrite(&mut class)
            .unwrap();

        let code = decoded_method(&class, "peek");
        assert_eq!(code.insns[0].opcode(), opcodes::GETSTATIC);
        assert_eq!(registry.slot_count(), 0);
    }

    #[test]
    fn branch_targets_follow_the_splices() {
        // A loop whose back edge crosses a rewritten access.
        let mut builder = ClassBuilder::new("demo/Spin", "java/lang/Object").unwrap();
        builder
            .add_field("flag", "Z", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .unwrap();
        let flag_ref = builder
            .pool_mut()
            .add_field_ref("demo/Spin", "flag", "Z")
            .unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            insns: vec![
                field_insn(opcodes::GETSTATIC, flag_ref), // 0: loop head
                Insn::Branch {
                    opcode: 0x99, // ifeq -> loop head
                    target: 0,
                },
                Insn::Raw(vec![opcodes::RETURN]),
            ],
            handlers: Vec::new(),
            attributes: Vec::new(),
        };
        builder
            .add_method(
                "spin",
                "()V",
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                &code,
            )
            .unwrap();
        let mut class = builder.finish();

        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let bytes = class.serialize();
        let reparsed = ClassFile::parse(&bytes).unwrap();
        let code = decoded_method(&reparsed, "spin");

        // The back edge lands on the start of the injected read sequence.
        let branch_target = code
            .insns
            .iter()
            .find_map(|i| match i {
                Insn::Branch { target, .. } => Some(*target),
                _ => None,
            })
            .unwrap();
        assert_eq!(branch_target, 0);
        assert_eq!(code.insns[0].opcode(), opcodes::ICONST_0); // push slot 0
    }

    #[test]
    fn rewritten_max_stack_gains_margin() {
        let mut class = sample_class();
        let mut registry = FieldRegistry::new();
        Rewriter::new(&mut registry, &[]).rewrite(&mut class).unwrap();

        let code = decoded_method(&class, "tick");
        assert_eq!(code.max_stack, 2 + emit::INJECTED_STACK_MARGIN);
    }

    #[test]
    fn pool_index_helper() {
        let mut pool = ConstPool::new();
        let index = pool.add_field_ref("demo/A", "x", "I").unwrap();
        let insn = field_insn(opcodes::GETSTATIC, index);
        assert_eq!(insn.pool_index(), Some(index));
    }
}
