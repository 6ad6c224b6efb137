use std::{error, fmt, io};

use super::normalization::NormalizationType;
use super::zoom::HiCZoom;

/// Operation requested on a matrix type that cannot support it (O/E, Pearson,
/// eigenvector or slice of an inter-chromosomal matrix).
#[derive(Debug, Clone)]
pub struct UnsupportedOperation {
    pub operation: &'static str,
}

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Computation of {} is not supported for inter-chromosomal matrices.", self.operation)
    }
}

impl error::Error for UnsupportedOperation {}

/// Malformed input file or line.
#[derive(Debug, Clone)]
pub struct FormatError {
    pub line: Option<usize>,
    pub message: String,
}

impl FormatError {
    pub fn new<S: Into<String>>(message: S) -> FormatError {
        FormatError { line: None, message: message.into() }
    }

    pub fn at_line<S: Into<String>>(line: usize, message: S) -> FormatError {
        FormatError { line: Some(line), message: message.into() }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Improperly formatted file (line {}): {}", line, self.message),
            None => write!(f, "Improperly formatted file: {}", self.message),
        }
    }
}

impl error::Error for FormatError {}

/// Data that is legitimately absent. Callers are expected to show the message
/// to the user and carry on.
#[derive(Debug, Clone)]
pub enum MissingData {
    Zoom(HiCZoom),
    Matrix(usize, usize),
    ExpectedValues(HiCZoom, NormalizationType),
    NormalizationVector(usize, HiCZoom, NormalizationType),
    EigenvectorUnavailable(HiCZoom),
    EigenvectorIndex(usize, usize),
}

impl fmt::Display for MissingData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MissingData::Zoom(zoom) => write!(f, "Resolution {} does not exist.", zoom),
            MissingData::Matrix(c1, c2) => write!(f, "No matrix stored for chromosomes {} and {}.", c1, c2),
            MissingData::ExpectedValues(zoom, norm) =>
                write!(f, "Expected values ({}) not computed at resolution {}.", norm, zoom),
            MissingData::NormalizationVector(chr, zoom, norm) =>
                write!(f, "Normalization vector {} for chromosome {} not computed at resolution {}.", norm, chr, zoom),
            MissingData::EigenvectorUnavailable(zoom) =>
                write!(f, "Eigenvector not available at resolution {}.", zoom),
            MissingData::EigenvectorIndex(which, n) =>
                write!(f, "Eigenvector {} requested but only {} usable bins exist.", which, n),
        }
    }
}

impl error::Error for MissingData {}

/// Failure of a dataset backend.
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Corrupt(String),
    MissingNormalization(usize, HiCZoom, NormalizationType),
    Backend(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadError::Io(e) => write!(f, "Storage I/O error: {}", e),
            ReadError::Corrupt(msg) => write!(f, "Corrupted dataset: {}", msg),
            ReadError::MissingNormalization(chr, zoom, norm) =>
                write!(f, "No {} normalization vector for chromosome {} at {}.", norm, chr, zoom),
            ReadError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl error::Error for ReadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ReadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::Io(e)
    }
}

#[cfg(feature = "hdf5")]
impl From<hdf5::Error> for ReadError {
    fn from(e: hdf5::Error) -> Self {
        ReadError::Backend(e.to_string())
    }
}
