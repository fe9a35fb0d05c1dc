use thiserror::Error;

/// Errors raised while reading, editing or writing a document tree
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Invalid plist: {0}")]
    InvalidPlist(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Unable to graft at selector \"{0}\"")]
    GraftFailed(String),

    #[error("Unable to prune at selector \"{0}\"")]
    PruneFailed(String),

    #[error("Output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
