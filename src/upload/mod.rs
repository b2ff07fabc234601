//! Upload handling: filename sanitization and batch validation.

mod sanitize;
mod validator;

pub use sanitize::{sanitize_filename, SafeFilename};
pub use validator::{
    IncomingFile, UploadOutcome, UploadPolicy, UploadReport, UploadValidator,
    DEFAULT_ALLOWED_EXTENSIONS, SNIFF_LEN,
};
