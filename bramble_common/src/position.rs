//! Source positions for tokens and diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in a source stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Position of the start of a stream
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Placeholder position for errors with no source location, e.g.
    /// invariant violations inside the compiler
    pub fn none() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(10, 4).to_string(), "10:4");
        assert_eq!(Position::start().to_string(), "1:1");
    }
}
