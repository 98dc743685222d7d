//! Placeholder normalization.
//!
//! Statements may be written with `%s` positional placeholders. The driver
//! binds `?`, so `%s` is rewritten before the statement is prepared. Values
//! are always sent as bound parameters and never spliced into the SQL text.

use std::borrow::Cow;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted(u8),
    LineComment,
    BlockComment,
}

/// Rewrite `%s` to `?` and `%%` to `%` outside literals and comments.
///
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn normalize_placeholders(sql: &str) -> Cow<'_, str> {
    if !sql.contains('%') {
        return Cow::Borrowed(sql);
    }

    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut state = State::Normal;
    // Start of the input not yet copied to `out`
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' | b'"' | b'`' => state = State::Quoted(b),
                b'#' => state = State::LineComment,
                // `--` opens a comment only when followed by whitespace or a control char
                b'-' if bytes.get(idx + 1) == Some(&b'-')
                    && bytes
                        .get(idx + 2)
                        .map_or(true, |c| c.is_ascii_whitespace() || c.is_ascii_control()) =>
                {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    idx += 1;
                }
                b'%' if matches!(bytes.get(idx + 1), Some(b's') | Some(b'%')) => {
                    let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                    buf.push_str(&sql[copied..idx]);
                    buf.push(if bytes[idx + 1] == b's' { '?' } else { '%' });
                    idx += 2;
                    copied = idx;
                    continue;
                }
                _ => {}
            },
            State::Quoted(quote) => {
                if b == b'\\' && quote != b'`' {
                    idx += 1;
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_positional_placeholders() {
        assert_eq!(
            normalize_placeholders("INSERT INTO t (a, b) VALUES (%s, %s)"),
            "INSERT INTO t (a, b) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_borrows_when_unchanged() {
        let sql = "SELECT * FROM t WHERE a = ?";
        assert!(matches!(normalize_placeholders(sql), Cow::Borrowed(_)));
        let sql = "SELECT '%s' FROM t";
        assert!(matches!(normalize_placeholders(sql), Cow::Borrowed(_)));
    }

    #[test]
    fn test_skips_literals_and_comments() {
        let sql = "SELECT '%s', `%s`, \"it\\\"s %s\" -- %s\n, %s /* %s */ FROM t # %s";
        assert_eq!(
            normalize_placeholders(sql),
            "SELECT '%s', `%s`, \"it\\\"s %s\" -- %s\n, ? /* %s */ FROM t # %s"
        );
    }

    #[test]
    fn test_double_dash_without_space_is_not_a_comment() {
        assert_eq!(
            normalize_placeholders("UPDATE t SET a = a--%s WHERE id = %s"),
            "UPDATE t SET a = a--? WHERE id = ?"
        );
        assert_eq!(
            normalize_placeholders("SELECT %s --\t%s\nFROM t"),
            "SELECT ? --\t%s\nFROM t"
        );
        assert_eq!(normalize_placeholders("SELECT %s --"), "SELECT ? --");
    }

    #[test]
    fn test_escaped_percent() {
        assert_eq!(
            normalize_placeholders("SELECT * FROM t WHERE a LIKE CONCAT(%s, '%') AND b = 5 %% 2"),
            "SELECT * FROM t WHERE a LIKE CONCAT(?, '%') AND b = 5 % 2"
        );
    }
}
