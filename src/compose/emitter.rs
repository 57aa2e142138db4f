//! Brace-aware line emitter for fragment producers

const INDENT: &str = "  ";

/// Collects statement lines, indenting two spaces per open brace.
///
/// A line that is exactly `}` closes a level before it is emitted and a line
/// that is exactly `{` opens one after it is emitted, so producers can emit
/// blocks without tracking depth themselves.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceEmitter {
    lines: Vec<String>,
    depth: usize,
}

impl SourceEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, line: impl AsRef<str>) -> &mut Self {
        let line = line.as_ref().trim();
        if line == "}" {
            self.depth = self.depth.saturating_sub(1);
        }

        self.lines
            .push(format!("{}{}", INDENT.repeat(self.depth), line));

        if line == "{" {
            self.depth += 1;
        }
        self
    }

    /// Current nesting depth; zero once every block is closed.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
