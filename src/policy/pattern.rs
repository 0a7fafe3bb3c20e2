use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How whitelist/blacklist entries are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Entry is an unanchored regular expression.
    #[default]
    Regex,
    /// Entry matches if it occurs anywhere in the command text.
    Substring,
}

/// A single compiled policy entry.
#[derive(Debug, Clone)]
pub enum Pattern {
    Regex(Regex),
    Substring(String),
}

impl Pattern {
    /// Compile `source` under `mode`. Regex entries are validated here so a bad
    /// pattern fails the load instead of every later match.
    pub fn compile(source: &str, mode: MatchMode) -> Result<Self> {
        match mode {
            MatchMode::Regex => Regex::new(source)
                .map(Pattern::Regex)
                .map_err(|e| Error::Pattern {
                    pattern: source.to_string(),
                    source: e,
                }),
            MatchMode::Substring => Ok(Pattern::Substring(source.to_string())),
        }
    }

    pub fn is_match(&self, command: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(command),
            Pattern::Substring(s) => command.contains(s.as_str()),
        }
    }

    /// The entry as written in the policy file.
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Regex(re) => re.as_str(),
            Pattern::Substring(s) => s,
        }
    }
}
