//! A bytecode rewriter that puts a software-managed cache between every
//! thread and shared memory, so programs run under relaxed memory
//! consistency instead of the sequential consistency the host silently
//! provides.
//!
//! `jrelax` takes a jar archive, rewrites each class so that static and
//! instance field traffic, monitor operations and `Lock` calls route
//! through a runtime facade, and emits a new archive together with the
//! generated support classes. Reads and writes then hit a per-thread
//! cache; a thread's writes reach other threads only at synchronization
//! actions, which is where weakly ordered hardware is allowed to surprise
//! you and sequentially consistent test machines never do.
//!
//! # Architecture
//!
//! - [`file`] - memory-mapped input and the bounds-checked parser
//! - [`classfile`] - class file model: constant pool, members, bytecode
//! - [`instrument`] - the rewriting pipeline and support-class generation
//! - [`runtime`] - the coherence model: per-thread caches, flush/refresh
//! - [`archive`] - jar extraction and packing
//!
//! # Getting started
//!
//! ```rust,no_run
//! use jrelax::Session;
//! use std::path::Path;
//!
//! let session = Session::new(&[]);
//! let stats = session.transform_archive(
//!     Path::new("app.jar"),
//!     Path::new("app-relaxed.jar"),
//! )?;
//! println!("rewrote {} classes", stats.rewritten);
//! # Ok::<(), jrelax::Error>(())
//! ```
//!
//! The runtime model is usable on its own for reproducing memory-model
//! bugs in tests; see [`runtime::Coherence`].

#![warn(missing_docs)]

#[macro_use]
mod error;
#[macro_use]
pub(crate) mod macros;

pub mod archive;
pub mod classfile;
pub mod file;
pub mod instrument;
pub mod runtime;

pub use crate::{
    classfile::{
        builder::ClassBuilder, code::CodeAttribute, constpool::ConstPool, flags::AccessFlags,
        ClassFile,
    },
    error::Error,
    file::parser::Parser,
    instrument::{Session, TransformStats},
    runtime::Coherence,
};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
