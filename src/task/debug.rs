//! Debug-stack formatting.
//!
//! Debug stacks are produced as single strings in which composite tasks
//! embed the stacks of their entries using back-tick depth markers: a
//! back-tick immediately *after* a newline opens one indent level, a
//! back-tick immediately *before* a newline closes one. [`DebugStackFormat`]
//! turns the encoded form into a human-readable indented listing.

/// Formatter for encoded debug-stack strings.
///
/// Both methods have default implementations; override `indent` to change
/// the indentation style.
pub trait DebugStackFormat {
    /// Produces the leading whitespace for one indent level.
    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    /// Expands the back-tick depth markers in `raw` into indentation.
    fn format(&self, raw: &str) -> String {
        let bytes = raw.as_bytes();
        let mut result = self.indent(0);
        let mut level: i32 = 0;
        let mut start = 0;
        while let Some(offset) = raw[start..].find('\n') {
            let found = start + offset;
            let mut line_end = found;
            let mut next = found + 1;
            if bytes.get(found + 1) == Some(&b'`') {
                // Marker after the newline: one level deeper.
                level += 1;
                next += 1;
            } else if found >= 1 && bytes[found - 1] == b'`' {
                // Marker before the newline: one level shallower.
                level -= 1;
                line_end -= 1;
            }
            result.push_str(&raw[start..line_end]);
            result.push('\n');
            result.push_str(&self.indent(level.max(0) as usize));
            start = next;
        }
        result.push_str(&raw[start..]);
        result
    }
}

/// The default two-spaces-per-level formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugStackFormatter;

impl DebugStackFormat for DebugStackFormatter {}
