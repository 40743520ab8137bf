use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        $crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        $crate::Error::OutOfBounds
    };
}

/// The generic Error type, covering everything this library can return.
///
/// Parsing errors are fatal by design: a class file that fails to parse aborts
/// the whole transformation with no partial output. Runtime errors surface
/// protocol violations (an unbound accessor) rather than silently skipping
/// them, because a skipped access would corrupt the coherence protocol.
///
/// # Examples
///
/// ```rust,no_run
/// use jrelax::{ClassFile, Error};
///
/// match ClassFile::parse(&[0xCA, 0xFE]) {
///     Ok(class) => println!("parsed version {}.{}", class.major_version, class.minor_version),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed class: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The class file is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected,
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// Description of what was malformed
        message: String,
        /// Source file in which this error was raised
        file: &'static str,
        /// Source line in which this error was raised
        line: u32,
    },

    /// An out of bound read was attempted while parsing a class file.
    #[error("Out of bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A shared slot was used before its bound getter/setter was installed.
    ///
    /// Fatal at first use: silently skipping the access would let the slot
    /// diverge from the backing store with no record of it.
    #[error("No bound accessor installed for shared slot {0}")]
    UnresolvedAccessor(u32),

    /// An instance-field access named a field the attached shadow does not
    /// declare.
    #[error("Shadow of class '{owner}' declares no field '{name}'")]
    UnknownShadowField {
        /// Internal name of the shadowed class
        owner: String,
        /// The field name that failed to resolve
        name: String,
    },

    /// The container archive could not be read or written.
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ArchiveError(err.to_string())
    }
}
