// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NetplanError};

const GLOB_SIZE_LIMIT: usize = 1 << 16;

/// Shell style pattern (`*`, `?`, `[...]`, `[!...]`) used by match rules on
/// interface names and drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GlobPattern {
    source: String,
    regex: regex::Regex,
}

impl GlobPattern {
    pub fn new(source: &str) -> Result<Self, NetplanError> {
        let regex = regex::RegexBuilder::new(&glob_to_regex(source)?)
            .size_limit(GLOB_SIZE_LIMIT)
            .build()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        self.source.as_str()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobPattern {}

impl std::fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl TryFrom<String> for GlobPattern {
    type Error = NetplanError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<GlobPattern> for String {
    fn from(value: GlobPattern) -> Self {
        value.source
    }
}

fn glob_to_regex(pattern: &str) -> Result<String, NetplanError> {
    let mut ret = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => ret.push_str(".*"),
            '?' => ret.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                let mut first = true;
                for c in chars.by_ref() {
                    match c {
                        // A leading `]`, after the optional `!`, is literal.
                        ']' if !class.is_empty() && class != "^" => {
                            closed = true;
                            break;
                        }
                        '!' if first => class.push('^'),
                        '\\' | '[' | ']' | '&' | '~' => {
                            class.push('\\');
                            class.push(c);
                        }
                        '-' if class.is_empty() || class == "^" => {
                            class.push('\\');
                            class.push(c);
                        }
                        c => class.push(c),
                    }
                    first = false;
                }
                if !closed || class.is_empty() || class == "^" {
                    return Err(NetplanError::new(
                        ErrorKind::InvalidConfig,
                        format!("Invalid glob pattern '{pattern}'"),
                    ));
                }
                ret.push('[');
                ret.push_str(&class);
                ret.push(']');
            }
            c => ret.push_str(&regex::escape(&c.to_string())),
        }
    }
    ret.push('$');
    Ok(ret)
}
