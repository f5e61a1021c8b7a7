use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssemblyLoadError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("No assemblies found in {0}")]
    NoAssemblies(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("{type_name}::{field} needs a byte offset annotation to lay out the leading padding")]
    MissingOffsetAnnotation { type_name: String, field: String },
    #[error("{type_name}::{field} has an unparseable byte offset {value:?}")]
    InvalidOffset {
        type_name: String,
        field: String,
        value: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LowerError {
    #[error("Stack underflow at instruction {offset}")]
    StackUnderflow { offset: usize },
    #[error("Argument {index} at instruction {offset} is out of range (method takes {count})")]
    ArgumentOutOfRange {
        offset: usize,
        index: usize,
        count: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerateError {
    #[error("Assembly loading failed: {0}")]
    AssemblyLoad(#[from] AssemblyLoadError),

    #[error("Struct layout failed: {0}")]
    Layout(#[from] LayoutError),

    #[error("Method lowering failed: {0}")]
    Lower(#[from] LowerError),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for GenerateError {
    fn from(e: std::io::Error) -> Self {
        GenerateError::Io(e.to_string())
    }
}
