use std::fmt::{self, Display};
use std::path::PathBuf;

use thiserror::Error;

/// Error returned when a bucket name or object key is not acceptable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPathError {
    /// The bucket is empty, starts with a `.` or contains a `/`.
    #[error("invalid bucket name `{0}`")]
    Bucket(String),
    /// The key is empty or contains an empty, `.` or `..` segment.
    #[error("invalid object key `{0}`")]
    Key(String),
}

/// The fully qualified path of an object.
///
/// This consists of a bucket, which is a single path segment, and a user-defined key which may
/// contain `/` separated segments. Both are validated on construction so that backends can map
/// them onto the filesystem without escaping their root. Buckets starting with a `.` are reserved
/// for internal bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    /// The bucket the object belongs to.
    pub bucket: String,
    /// The user-defined key, unique within its bucket.
    pub key: String,
}

impl ObjectPath {
    /// Creates a validated object path.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, InvalidPathError> {
        let bucket = bucket.into();
        let key = key.into();

        if !is_valid_segment(&bucket) || bucket.starts_with('.') {
            return Err(InvalidPathError::Bucket(bucket));
        }
        if key.is_empty() || !key.split('/').all(is_valid_segment) {
            return Err(InvalidPathError::Key(key));
        }

        Ok(Self { bucket, key })
    }

    /// Returns the relative filesystem path of this object below a storage root.
    pub fn to_relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.bucket);
        path.extend(self.key.split('/'));
        path
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\', '\0'])
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        let path = ObjectPath::new("photos", "2015/feb/donut.jpg").unwrap();
        assert_eq!(path.to_string(), "photos/2015/feb/donut.jpg");
        assert_eq!(
            path.to_relative_path(),
            PathBuf::from("photos/2015/feb/donut.jpg")
        );
    }

    #[test]
    fn rejects_traversal() {
        assert_eq!(
            ObjectPath::new("photos", "../etc/passwd"),
            Err(InvalidPathError::Key("../etc/passwd".into()))
        );
        assert_eq!(
            ObjectPath::new("..", "passwd"),
            Err(InvalidPathError::Bucket("..".into()))
        );
        assert!(ObjectPath::new(".minio.sys", "tmp").is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(ObjectPath::new("", "key").is_err());
        assert!(ObjectPath::new("bucket", "").is_err());
        assert!(ObjectPath::new("bucket", "a//b").is_err());
        assert!(ObjectPath::new("bucket", "a/").is_err());
    }
}
