use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::SqlClusterError;

/// A parsed key/value configuration file with `[section]` headers.
///
/// Keys before the first header live in the root section (`""`). Lines
/// starting with `#` or `;` are comments; values may be wrapped in single or
/// double quotes. Section and key names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl IniDocument {
    /// Parse INI text.
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` naming the first malformed line.
    pub fn parse(text: &str) -> Result<Self, SqlClusterError> {
        let mut doc = IniDocument::default();
        let mut current = String::new();
        doc.sections.entry(current.clone()).or_default();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let Some(name) = rest.strip_suffix(']') else {
                    return Err(SqlClusterError::ConfigError(format!(
                        "line {}: unterminated section header `{line}`",
                        lineno + 1
                    )));
                };
                current = name.trim().to_ascii_lowercase();
                doc.sections.entry(current.clone()).or_default();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(SqlClusterError::ConfigError(format!(
                    "line {}: expected `key = value`, got `{line}`",
                    lineno + 1
                )));
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(SqlClusterError::ConfigError(format!(
                    "line {}: empty key",
                    lineno + 1
                )));
            }
            doc.sections
                .entry(current.clone())
                .or_default()
                .insert(key, unquote(value.trim()).to_string());
        }

        Ok(doc)
    }

    /// Read and parse a file.
    ///
    /// # Errors
    /// Returns `SqlClusterError::ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SqlClusterError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SqlClusterError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Look up `key` in `section` (`""` for the root section).
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_ascii_lowercase())
            .and_then(|keys| keys.get(&key.to_ascii_lowercase()))
            .map(String::as_str)
    }

    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(&section.to_ascii_lowercase())
    }

    /// Set a value programmatically, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_ascii_lowercase())
            .or_default()
            .insert(key.to_ascii_lowercase(), value.into());
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
