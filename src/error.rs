// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the annotation pipeline.

use std::fmt;

/// Result type alias for annotation operations.
pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Main error type for the annotation pipeline.
#[derive(Debug)]
pub enum AnnotateError {
    /// Input file or video does not exist.
    NotFound(String),
    /// A detection result has no keypoints attribute at all.
    MissingKeypoints {
        /// Position of the offending result in the stream.
        frame: usize,
    },
    /// A keypoint coordinate could not be converted to its numeric type.
    MalformedKeypoint {
        /// Position of the offending result in the stream.
        frame: usize,
        /// What was wrong with the value.
        detail: String,
    },
    /// A keypoint CSV data row could not be parsed.
    RowParse {
        /// Raw row contents, comma joined.
        row: String,
        /// Parser message.
        detail: String,
    },
    /// Input data does not match its format contract (headers, bbox blocks, pose dumps).
    MalformedData(String),
    /// Destination could not be written.
    IoWrite(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// Error decoding or encoding images.
    Image(String),
    /// Video decoding or encoding error.
    Video(String),
    /// Invalid configuration.
    Config(String),
    /// Object store transfer error.
    Transfer(String),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl AnnotateError {
    /// Whether this error means the input data broke its contract.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MissingKeypoints { .. }
                | Self::MalformedKeypoint { .. }
                | Self::RowParse { .. }
                | Self::MalformedData(_)
        )
    }
}

impl fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::MissingKeypoints { frame } => write!(
                f,
                "Frame data at index {frame} lacks keypoints attribute or it is None"
            ),
            Self::MalformedKeypoint { frame, detail } => {
                write!(f, "Error processing keypoints at frame {frame}: {detail}")
            }
            Self::RowParse { row, detail } => {
                write!(f, "Error processing row [{row}] in CSV: {detail}")
            }
            Self::MalformedData(msg) => write!(f, "Malformed data: {msg}"),
            Self::IoWrite(msg) => write!(f, "Write error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Image(msg) => write!(f, "Image error: {msg}"),
            Self::Video(msg) => write!(f, "Video error: {msg}"),
            Self::Config(msg) => write!(f, "Config error: {msg}"),
            Self::Transfer(msg) => write!(f, "Transfer error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for AnnotateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnnotateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for AnnotateError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<opencv::Error> for AnnotateError {
    fn from(err: opencv::Error) -> Self {
        Self::Video(err.to_string())
    }
}

impl From<csv::Error> for AnnotateError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            return Self::IoWrite(err.to_string());
        }
        Self::MalformedData(err.to_string())
    }
}

impl From<serde_json::Error> for AnnotateError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedData(err.to_string())
    }
}

impl From<toml::de::Error> for AnnotateError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnnotateError::NotFound("clip.mp4".to_string());
        assert_eq!(err.to_string(), "Not found: clip.mp4");

        let err = AnnotateError::RowParse {
            row: "3,0,x,100,200,0.9".to_string(),
            detail: "invalid digit found in string".to_string(),
        };
        assert!(err.to_string().contains("3,0,x,100,200,0.9"));
    }

    #[test]
    fn test_malformed_grouping() {
        assert!(AnnotateError::MissingKeypoints { frame: 2 }.is_malformed());
        assert!(AnnotateError::MalformedData("bad".into()).is_malformed());
        assert!(!AnnotateError::IoWrite("disk full".into()).is_malformed());
        assert!(!AnnotateError::NotFound("x".into()).is_malformed());
    }
}
