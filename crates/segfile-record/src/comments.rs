//! Comment area capability shared by DAF and DAS files.

use crate::format::check_printable;
use crate::{ErrorKind, KernelError, Result};

/// Free-text annotation area of a kernel file
pub trait CommentStore {
    /// Append lines to the comment area. Requires write access.
    fn add_comments(&mut self, lines: &[&str]) -> Result<()>;

    /// Read all comment lines, folding lines longer than `max_line_len`.
    fn read_comments(&self, max_line_len: usize) -> Result<Vec<String>>;

    /// Remove the comment area entirely. Requires write access.
    fn delete_comments(&mut self) -> Result<()>;
}

/// Comment lines must be printable ASCII.
pub fn check_comment_line(line: &str) -> Result<()> {
    check_printable("comment line", line)
}

/// Split `line` into chunks of at most `width` characters.
///
/// An empty line yields one empty chunk.
pub fn fold_line(line: &str, width: usize) -> Result<Vec<String>> {
    if width == 0 {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            "comment line length must be positive",
        ));
    }
    if line.len() <= width {
        return Ok(vec![line.to_string()]);
    }
    // lines are ASCII, so byte chunks are character chunks
    Ok(line
        .as_bytes()
        .chunks(width)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect())
}

/// Split stored comment text on a terminator byte and fold each line.
pub fn split_comment_text(text: &[u8], terminator: u8, width: usize) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if text.is_empty() {
        return Ok(lines);
    }
    let body = text.strip_suffix(&[terminator]).unwrap_or(text);
    for raw in body.split(|b| *b == terminator) {
        let line = String::from_utf8_lossy(raw);
        lines.extend(fold_line(&line, width)?);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_line() {
        assert_eq!(fold_line("abcdef", 4).unwrap(), vec!["abcd", "ef"]);
        assert_eq!(fold_line("abcd", 4).unwrap(), vec!["abcd"]);
        assert_eq!(fold_line("", 4).unwrap(), vec![""]);
        assert!(fold_line("abc", 0).is_err());
    }

    #[test]
    fn test_check_comment_line() {
        assert!(check_comment_line("Created 2026-10-19 by mkspk.").is_ok());
        assert!(check_comment_line("").is_ok());
        assert!(check_comment_line("tab\there").is_err());
        assert!(check_comment_line("new\nline").is_err());
    }

    #[test]
    fn test_split_comment_text() {
        let text = b"first\0\0third line\0";
        let lines = split_comment_text(text, 0, 80).unwrap();
        assert_eq!(lines, vec!["first", "", "third line"]);

        let lines = split_comment_text(text, 0, 5).unwrap();
        assert_eq!(lines, vec!["first", "", "third", " line"]);

        assert!(split_comment_text(b"", 0, 80).unwrap().is_empty());
    }
}
