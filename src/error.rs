use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two groups. Decoding errors ([`Error::Malformed`], [`Error::OutOfBounds`],
/// [`Error::Unsupported`]) and internal consistency failures ([`Error::DataflowUnresolved`],
/// [`Error::StackUnderflow`], [`Error::StackMismatch`]) abort a transpilation run. Code
/// generation failures are collected per class and surface once as
/// [`Error::GenerationFailed`] after every class has been attempted.
///
/// Recoverable conditions such as missing dependencies never become an `Error`; they are
/// logged and recorded in [`crate::Diagnostics`].
///
/// # Error Categories
///
/// ## Class File Errors
/// - [`Error::Malformed`] - Corrupted or invalid class file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::Unsupported`] - Bytecode the runtime cannot express
/// - [`Error::UnsupportedInvokeDynamic`] - Unknown `invokedynamic` bootstrap shape
///
/// ## Resolution Errors
/// - [`Error::DataflowUnresolved`] - An instruction was never reached by the stack walk
/// - [`Error::StackUnderflow`] - An instruction consumes more entries than available
/// - [`Error::StackMismatch`] - Two paths reach an instruction with different depths
/// - [`Error::MissingLabel`] - An exception region references an unknown label
/// - [`Error::MultipleMainClasses`] - More than one class matched the entry point
///
/// ## Output Errors
/// - [`Error::Codegen`] - Generation of a single class failed
/// - [`Error::GenerationFailed`] - The batch finished with failed classes
///
/// ## Environment Errors
/// - [`Error::Config`], [`Error::Pattern`], [`Error::Archive`], [`Error::Io`]
///
/// # Examples
///
/// ```rust,no_run
/// use clearwing::{Error, Transpiler, TranspilerConfig};
/// use std::path::Path;
///
/// let transpiler = Transpiler::new(TranspilerConfig::default());
/// match transpiler.transpile(&[Path::new("app.jar")], &[], Path::new("out")) {
///     Ok(result) => println!("{}", result),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed class file: {} ({}:{})", message, file, line);
///     }
///     Err(Error::GenerationFailed(count)) => {
///         eprintln!("{} classes failed to generate", count);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The class file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The bytecode uses a construct the runtime has no representation for.
    ///
    /// Covers `jsr`/`ret` subroutines and `ldc` of method types, method handles
    /// and dynamic constants.
    #[error("Unsupported bytecode: {0}")]
    Unsupported(String),

    /// An `invokedynamic` call site uses a bootstrap shape that cannot be lowered.
    ///
    /// Only `LambdaMetafactory` (without serializable or bridged lambdas and with a
    /// handle kind of virtual dispatch or above) and
    /// `StringConcatFactory.makeConcatWithConstants` are supported.
    #[error("Unsupported InvokeDynamic call: {0}")]
    UnsupportedInvokeDynamic(String),

    /// A non-label instruction was never reached by the dataflow walk.
    #[error("Failed to resolve instruction {index} in {class}.{method}")]
    DataflowUnresolved {
        /// Name of the class that owns the method
        class: String,
        /// Name and descriptor of the method
        method: String,
        /// Position of the instruction in the method
        index: usize,
    },

    /// An instruction consumes more stack entries than the abstract stack holds.
    #[error("Stack underflow at instruction {index} in {class}.{method}: needed {needed}, available {available}")]
    StackUnderflow {
        /// Name of the class that owns the method
        class: String,
        /// Name and descriptor of the method
        method: String,
        /// Position of the instruction in the method
        index: usize,
        /// Entries the instruction consumes
        needed: usize,
        /// Entries on the abstract stack
        available: usize,
    },

    /// Two control flow paths reach one instruction with different stack depths.
    #[error("Stack depth mismatch at instruction {index} in {class}.{method}: expected {expected}, found {found}")]
    StackMismatch {
        /// Name of the class that owns the method
        class: String,
        /// Name and descriptor of the method
        method: String,
        /// Position of the instruction in the method
        index: usize,
        /// Depth recorded by the first visit
        expected: usize,
        /// Depth seen by the conflicting visit
        found: usize,
    },

    /// More than one class declares the configured entry point.
    #[error("Multiple main classes found: {0} and {1}")]
    MultipleMainClasses(String, String),

    /// An exception region references a label that is not part of the method body.
    #[error("Failed to find label {label} in {method}")]
    MissingLabel {
        /// Name and descriptor of the method
        method: String,
        /// The label id that could not be located
        label: u32,
    },

    /// Generation of a single class failed.
    #[error("Failed to generate {class}: {message}")]
    Codegen {
        /// Original name of the class
        class: String,
        /// Description of the failure
        message: String,
    },

    /// Code generation finished, but the given number of classes failed.
    #[error("Failed to generate {0} classes")]
    GenerationFailed(usize),

    /// The configuration could not be parsed or is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A glob pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An input archive could not be read.
    #[error("{0}")]
    Archive(#[from] zip::result::ZipError),

    /// Wrapper for filesystem errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Config(error.to_string())
    }
}
