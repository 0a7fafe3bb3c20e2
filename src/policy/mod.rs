pub mod decision;
pub mod pattern;

pub use decision::GateDecision;
pub use pattern::{MatchMode, Pattern};

use crate::error::Result;

/// Whitelist/blacklist admission control over command strings.
///
/// Built once per pass and shared read-only by every definition.
#[derive(Debug, Clone, Default)]
pub struct PolicyGate {
    whitelist: Vec<Pattern>,
    blacklist: Vec<Pattern>,
    noexceptions: bool,
}

impl PolicyGate {
    /// Compile both lists under `mode`.
    pub fn new<S: AsRef<str>>(
        whitelist: &[S],
        blacklist: &[S],
        mode: MatchMode,
        noexceptions: bool,
    ) -> Result<Self> {
        let compile = |list: &[S]| {
            list.iter()
                .map(|s| Pattern::compile(s.as_ref(), mode))
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self {
            whitelist: compile(whitelist)?,
            blacklist: compile(blacklist)?,
            noexceptions,
        })
    }

    /// A gate with no entries and `noexceptions` off: everything runs.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Override `noexceptions` (e.g. from the --noexceptions flag).
    pub fn set_noexceptions(&mut self, noexceptions: bool) {
        self.noexceptions = noexceptions;
    }

    /// Evaluate the exact text about to be executed.
    pub fn check(&self, command: &str) -> GateDecision {
        if let Some(p) = self.whitelist.iter().find(|p| p.is_match(command)) {
            return GateDecision::Whitelisted(p.as_str().to_string());
        }
        if self.noexceptions {
            return GateDecision::DeniedNoExceptions;
        }
        if let Some(p) = self.blacklist.iter().find(|p| p.is_match(command)) {
            return GateDecision::DeniedBlacklist(p.as_str().to_string());
        }
        GateDecision::Allowed
    }

    pub fn permitted(&self, command: &str) -> bool {
        self.check(command).is_permitted()
    }
}
