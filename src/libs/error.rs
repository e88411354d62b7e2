use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, AlnError>;

#[derive(Debug, thiserror::Error)]
pub enum AlnError {
    /// Unrecognized header or no sequence found
    #[error("{path}: input format not recognized ({message})")]
    InputFormat { path: PathBuf, message: String },

    /// Rows of one alignment differ in length
    #[error("{path}: sequences have unequal length ({message})")]
    UnequalLength { path: PathBuf, message: String },

    #[error("{0}: alignment has no usable sequence")]
    EmptyAlignment(String),

    #[error("The following taxa were duplicated in the alignment: {}", .taxa.join("; "))]
    DuplicateTaxon { path: PathBuf, taxa: Vec<String> },

    /// Malformed partition line, `line` is 1-based
    #[error("Badly formatted partitions file in line {line}: {message}")]
    InvalidPartitionFile { line: usize, message: String },

    #[error("partition name already exists: {0}")]
    PartitionNameConflict(String),

    /// Merge/split/remove would break the partition coordinate space
    #[error("inconsistent partitions: {0}")]
    PartitionConsistency(String),

    #[error("{path}: sequence type {found} differs from the collection ({expected})")]
    MultipleSequenceTypes {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("operation killed by user")]
    UserCancelled,

    #[error("output format {format} cannot be used here: {message}")]
    UnsupportedFormat { format: String, message: String },

    #[error("table {0} does not exist in the store")]
    MissingTable(String),

    #[error("taxon not found: {0}")]
    UnknownTaxon(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

impl AlnError {
    /// Errors that send an input file to the non-alignment bucket instead of
    /// the bad-file bucket
    pub fn is_unequal_length(&self) -> bool {
        matches!(self, AlnError::UnequalLength { .. })
    }

    pub fn input_format(path: &std::path::Path, message: impl Into<String>) -> Self {
        AlnError::InputFormat {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn unequal_length(path: &std::path::Path, message: impl Into<String>) -> Self {
        AlnError::UnequalLength {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn bad_partition(line: usize, message: impl Into<String>) -> Self {
        AlnError::InvalidPartitionFile {
            line,
            message: message.into(),
        }
    }
}
