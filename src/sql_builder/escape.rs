/// Backslash-escape a string for inclusion in SQL text.
///
/// Escapes NUL, `\r`, `\n`, `\\`, `'`, `"`, and Ctrl-Z; every other byte is
/// copied unchanged. Only used for table names, which cannot be bound as
/// parameters.
#[must_use]
pub fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out
}

/// Wrap a column name in backticks.
///
/// Column names come from static record tags, so no escaping is applied.
#[must_use]
pub fn quote_column(name: &str) -> String {
    format!("`{name}`")
}

/// Escape and backtick-quote a table name.
#[must_use]
pub fn quote_table(name: &str) -> String {
    format!("`{}`", escape_string(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quote_and_backslash() {
        assert_eq!(escape_string(r"it's a\b"), r"it\'s a\\b");
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_string("a\0b\r\n\x1a\"c"), "a\\0b\\r\\n\\Z\\\"c");
    }

    #[test]
    fn leaves_other_text_unchanged() {
        let plain = "user_2024 `shard` ünï";
        assert_eq!(escape_string(plain), plain);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_column("age"), "`age`");
        assert_eq!(quote_table("users_01"), "`users_01`");
    }
}
