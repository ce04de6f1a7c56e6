//! Source file locations

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a source file
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Wrap a raw file number
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A line-granular position in a source file
///
/// Tree nodes only ever need the file and line of the construct they came
/// from; byte offsets stay with the parser.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// File the construct came from
    pub file: FileId,
    /// One-based line number
    pub line: u32,
}

impl Location {
    /// Location of `line` in `file`
    #[must_use]
    pub fn new(file: FileId, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "file {}:{}", self.file.0, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let location = Location::new(FileId::new(2), 17);
        assert_eq!(location.to_string(), "file 2:17");
    }
}
