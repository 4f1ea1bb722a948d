use once_cell::unsync::OnceCell;
use std::fmt::{Display, Formatter};

/// Line/column rendering of a byte offset into a source, for error messages.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Advance this position past `lexeme`, accounting for embedded newlines.
    pub fn advance(&self, lexeme: &str) -> Self {
        if lexeme.is_empty() {
            return *self;
        }
        let offset = self.offset + lexeme.len();
        match lexeme.rfind('\n') {
            Some(last_break) => Self {
                line: self.line + lexeme.matches('\n').count(),
                column: lexeme.len() - last_break,
                offset,
            },
            None => Self {
                line: self.line,
                column: self.column + lexeme.len(),
                offset,
            },
        }
    }

    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.offset.cmp(&other.offset)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A source text plus a lazily-computed table of line-break offsets, used to
/// render a [`Position`] for any byte offset without rescanning the source.
pub struct Code<'c> {
    pub text: &'c str,
    line_breaks: OnceCell<Vec<usize>>,
}

impl<'c> Code<'c> {
    pub fn new(text: &'c str) -> Self {
        Self {
            text,
            line_breaks: OnceCell::new(),
        }
    }

    fn line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.text
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| if b == b'\n' { Some(i) } else { None })
                .collect()
        })
    }

    /// Render the line/column position of a byte offset into this source.
    pub fn position_at(&self, offset: usize) -> Position {
        let line_breaks = self.line_breaks();
        let index = match line_breaks.binary_search(&offset) {
            Ok(i) | Err(i) => i,
        };
        let line_start = if index == 0 {
            0
        } else {
            line_breaks[index - 1] + 1
        };
        let column = self.text[line_start..offset.min(self.text.len())]
            .chars()
            .count()
            + 1;
        Position::new(index + 1, column, offset)
    }

    /// A short printable sample of the source starting at `offset`, used in
    /// tokenize-error messages.
    pub fn sample_at(&self, offset: usize, max_len: usize) -> String {
        let rest = &self.text[offset.min(self.text.len())..];
        let end = rest
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        rest[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_newlines() {
        let start = Position::start();
        let next = start.advance("ab\ncd");
        assert_eq!(next.line, 2);
        assert_eq!(next.column, 3);
        assert_eq!(next.offset, 5);
    }

    #[test]
    fn position_at_reports_line_and_column() {
        let code = Code::new("foo\nbar\nbaz");
        let pos = code.position_at(5);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn position_is_ordered_by_offset() {
        let a = Position::new(1, 1, 3);
        let b = Position::new(5, 9, 4);
        assert!(a < b);
    }
}
