//! The instrumentation pipeline.
//!
//! A [`Session`] owns everything one transformation run accumulates: the
//! field registry, the exclusion list and the rewriter state. Class blobs
//! go in one at a time through [`Session::transform_class`]; when the
//! input is exhausted, [`Session::into_generated`] yields the support
//! classes the rewritten code links against.
//!
//! ```rust,no_run
//! use jrelax::Session;
//! use std::path::Path;
//!
//! let session = Session::new(&["org.example.vendored".to_string()]);
//! session.transform_archive(Path::new("app.jar"), Path::new("app-relaxed.jar"))?;
//! # Ok::<(), jrelax::Error>(())
//! ```

pub mod emit;
pub mod generate;
pub mod registry;
pub mod rewriter;

use std::path::Path;

use crate::{
    archive::{self, ArchiveEntry},
    classfile::ClassFile,
    instrument::{
        generate::GeneratedClass,
        registry::FieldRegistry,
        rewriter::{is_platform, Rewriter},
    },
    Result,
};

/// Counters for one archive transformation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformStats {
    /// Class entries rewritten.
    pub rewritten: usize,
    /// Class entries excluded and copied verbatim.
    pub excluded: usize,
    /// Non-class entries copied verbatim.
    pub resources: usize,
    /// Support classes appended.
    pub generated: usize,
}

/// One transformation run.
pub struct Session {
    registry: FieldRegistry,
    excludes: Vec<String>,
}

impl Session {
    /// Start a session with user exclusion patterns. Patterns are given in
    /// source form (`com.example.vendored`) and match internal names by
    /// substring.
    #[must_use]
    pub fn new(excludes: &[String]) -> Self {
        Session {
            registry: FieldRegistry::new(),
            excludes: excludes.iter().map(|e| e.replace('.', "/")).collect(),
        }
    }

    /// Returns `true` if `internal_name` is left untouched, either as a
    /// platform class or by user exclusion.
    #[must_use]
    pub fn is_excluded(&self, internal_name: &str) -> bool {
        is_platform(internal_name)
            || self
                .excludes
                .iter()
                .any(|pattern| internal_name.contains(pattern.as_str()))
    }

    /// Transform one class blob.
    ///
    /// The blob is parsed either way; an excluded class returns the
    /// original bytes unchanged, so a damaged class is rejected even when
    /// it would not have been rewritten.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or
    /// [`crate::Error::OutOfBounds`] if the blob is not a wellformed
    /// class file.
    pub fn transform_class(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut class = ClassFile::parse(data)?;
        if self.is_excluded(class.name()?) {
            log::debug!("passing through {}", class.name()?);
            return Ok(data.to_vec());
        }

        Rewriter::new(&mut self.registry, &self.excludes).rewrite(&mut class)?;
        Ok(class.serialize())
    }

    /// Finish the session: synthesize the support classes for everything
    /// recorded so far.
    ///
    /// # Errors
    /// Propagates generation failures.
    pub fn into_generated(self) -> Result<Vec<GeneratedClass>> {
        if self.registry.pending_len() > 0 {
            log::warn!(
                "{} static fields never met a class initializer; their accessors stay unbound",
                self.registry.pending_len()
            );
        }
        generate::generate_support(&self.registry)
    }

    /// Transform a whole archive: rewrite its classes, copy everything
    /// else, append the generated support classes.
    ///
    /// # Errors
    /// Returns archive errors for an unreadable input or unwritable
    /// output, and parse errors for any damaged class entry.
    pub fn transform_archive(mut self, input: &Path, output: &Path) -> Result<TransformStats> {
        let mut stats = TransformStats::default();
        let entries = archive::extract(input)?;
        let mut out = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.name.ends_with(".class") {
                let data = self.transform_class(&entry.data)?;
                if data == entry.data {
                    stats.excluded += 1;
                } else {
                    stats.rewritten += 1;
                }
                out.push(ArchiveEntry {
                    name: entry.name,
                    data,
                });
            } else {
                stats.resources += 1;
                out.push(entry);
            }
        }

        for generated in self.into_generated()? {
            stats.generated += 1;
            out.push(ArchiveEntry {
                name: generated.entry_name,
                data: generated.data,
            });
        }

        archive::pack(output, &out)?;
        log::info!(
            "rewrote {} classes, excluded {}, copied {} resources, generated {}",
            stats.rewritten,
            stats.excluded,
            stats.resources,
            stats.generated
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{builder::ClassBuilder, flags::AccessFlags};

    fn class_bytes(name: &str) -> Vec<u8> {
        let mut builder = ClassBuilder::new(name, "java/lang/Object").unwrap();
        builder
            .add_field("x", "I", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .unwrap();
        builder.finish().serialize()
    }

    #[test]
    fn exclusion_returns_identical_bytes() {
        let mut session = Session::new(&["demo.vendored".to_string()]);
        let original = class_bytes("demo/vendored/Util");
        let out = session.transform_class(&original).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn platform_classes_always_pass_through() {
        let mut session = Session::new(&[]);
        let original = class_bytes("javax/demo/Thing");
        assert_eq!(session.transform_class(&original).unwrap(), original);
    }

    #[test]
    fn rewritten_class_differs() {
        let mut session = Session::new(&[]);
        let original = class_bytes("demo/App");
        let out = session.transform_class(&original).unwrap();
        assert_ne!(out, original);
        let class = ClassFile::parse(&out).unwrap();
        // Shadow reference field injected in front of the original.
        assert_eq!(class.fields.len(), 2);
    }

    #[test]
    fn damaged_class_rejected_even_when_excluded() {
        let mut session = Session::new(&["demo".to_string()]);
        assert!(session.transform_class(&[0xCA, 0xFE, 0xBA]).is_err());
    }

    #[test]
    fn generated_set_always_has_the_core_three() {
        let session = Session::new(&[]);
        let generated = session.into_generated().unwrap();
        let names: Vec<&str> = generated.iter().map(|g| g.entry_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "jrelax/runtime/Coherence.class",
                "jrelax/runtime/ShadowRef.class",
                "jrelax/runtime/Configuration.class"
            ]
        );
    }
}
