//! Extraction of the tagged header lines from a module interface.
//!
//! Every interface carries two header lines, conventionally at the top but
//! accepted anywhere in the file:
//!
//! ```text
//! // quill-interface-format-version: 1.0
//! // quill-module-flags: -module-name Foo -target x86_64-unknown-linux
//! ```
//!
//! The version line gates which loaders can rebuild the interface; the flags
//! line seeds the subordinate compiler invocation.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// The interface format version this loader can build.
///
/// Interfaces with a different major version are rejected; minor-version
/// drift is tolerated.
pub const CURRENT_INTERFACE_FORMAT_VERSION: FormatVersion = FormatVersion { major: 1, minor: 0 };

/// A dotted interface format version.
///
/// Components beyond the second are accepted on input and ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatVersion {
    /// Major version; a mismatch makes the interface unbuildable.
    pub major: u32,
    /// Minor version; drift is tolerated.
    pub minor: u32,
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for FormatVersion {
    type Err = InterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| InterfaceError::BadVersion { text: s.to_string() })?;
        let minor = match parts.next() {
            Some(p) => p
                .parse()
                .map_err(|_| InterfaceError::BadVersion { text: s.to_string() })?,
            None => 0,
        };
        // Trailing components are tolerated as long as they are numeric.
        for extra in parts {
            extra
                .parse::<u32>()
                .map_err(|_| InterfaceError::BadVersion { text: s.to_string() })?;
        }
        Ok(Self { major, minor })
    }
}

/// The two header values extracted from an interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceHeader {
    /// The declared interface format version.
    pub version: FormatVersion,
    /// The tokenized driver flags embedded in the interface.
    pub flags: Vec<String>,
}

/// Failure to extract the header lines from an interface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterfaceError {
    /// The format-version header is absent, or present more than once.
    #[error("could not extract the format version from the module interface")]
    NoVersion,

    /// The module-flags header is absent, or present more than once.
    #[error("could not extract the embedded flags from the module interface")]
    NoFlags,

    /// The format-version value did not parse as a dotted version.
    #[error("malformed interface format version {text:?}")]
    BadVersion {
        /// The text that failed to parse.
        text: String,
    },
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*//\s*quill-interface-format-version:\s*([0-9]+(?:\.[0-9]+)*)\s*$")
            .expect("version regex should compile")
    })
}

fn flags_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*//\s*quill-module-flags:(.*)$").expect("flags regex should compile")
    })
}

/// Captures exactly one occurrence of `re`'s single capture group in `text`.
fn capture_exactly_once<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    let mut captures = re.captures_iter(text);
    let first = captures.next()?;
    if captures.next().is_some() {
        return None;
    }
    first.get(1).map(|m| m.as_str())
}

/// Extracts the format version and tokenized driver flags from an interface.
///
/// Each header line must appear exactly once anywhere in the file.
pub fn extract_interface_header(text: &str) -> Result<InterfaceHeader, InterfaceError> {
    let version_text =
        capture_exactly_once(version_regex(), text).ok_or(InterfaceError::NoVersion)?;
    let flags_text = capture_exactly_once(flags_regex(), text).ok_or(InterfaceError::NoFlags)?;

    Ok(InterfaceHeader {
        version: version_text.parse()?,
        flags: tokenize_flags(flags_text),
    })
}

/// Splits a flag string into tokens using GNU shell rules.
///
/// Whitespace separates tokens. Single quotes protect everything up to the
/// closing quote; double quotes protect everything except `\"` and `\\`
/// escapes; an unquoted backslash escapes the next character. An unclosed
/// quote runs to the end of the input.
pub fn tokenize_flags(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_token = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some(e @ ('"' | '\\')) => current.push(e),
                            Some(e) => {
                                current.push('\\');
                                current.push(e);
                            }
                            None => current.push('\\'),
                        },
                        _ => current.push(q),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(e) = chars.next() {
                    current.push(e);
                }
            }
            _ => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}
