//! Line terminator handling.
//!
//! Lines are stored without terminators. The newline sequence only matters when the document is
//! joined back into a single string, and is either fixed by the [`NewLineMode`] or detected from
//! the first line break the document receives.

use serde::{Deserialize, Serialize};

/// Which newline sequence [`crate::Document::value`] joins lines with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewLineMode {
    /// Use whatever the first inserted line break looked like (`"\n"` if none was seen).
    #[default]
    Auto,
    /// Always `"\r\n"`.
    Windows,
    /// Always `"\n"`.
    Unix,
}

impl NewLineMode {
    /// Resolve the mode to a concrete sequence, given the detected one.
    pub fn resolve(self, detected: &'static str) -> &'static str {
        match self {
            Self::Windows => "\r\n",
            Self::Unix => "\n",
            Self::Auto => {
                if detected.is_empty() {
                    "\n"
                } else {
                    detected
                }
            }
        }
    }
}

impl std::str::FromStr for NewLineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "windows" => Ok(Self::Windows),
            "unix" => Ok(Self::Unix),
            other => Err(format!("unknown new line mode: {other}")),
        }
    }
}

/// The first line break in `text`, or `"\n"` when it has none.
pub fn detect_in_text(text: &str) -> &'static str {
    match text.find(['\r', '\n']) {
        Some(i) if text[i..].starts_with("\r\n") => "\r\n",
        Some(i) if text[i..].starts_with('\r') => "\r",
        _ => "\n",
    }
}

/// `true` if `text` is exactly one newline sequence.
pub fn is_new_line(text: &str) -> bool {
    matches!(text, "\r\n" | "\r" | "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_first_break_wins() {
        assert_eq!(detect_in_text("a\r\nb\nc"), "\r\n");
        assert_eq!(detect_in_text("a\rb"), "\r");
        assert_eq!(detect_in_text("a\nb\r\n"), "\n");
        assert_eq!(detect_in_text("abc"), "\n");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(NewLineMode::Auto.resolve(""), "\n");
        assert_eq!(NewLineMode::Auto.resolve("\r\n"), "\r\n");
        assert_eq!(NewLineMode::Unix.resolve("\r\n"), "\n");
        assert_eq!(NewLineMode::Windows.resolve(""), "\r\n");
        assert_eq!("windows".parse::<NewLineMode>(), Ok(NewLineMode::Windows));
    }
}
