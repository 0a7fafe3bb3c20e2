/// Verdict of the policy gate for one command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Matched a whitelist entry; runs even if blacklisted.
    Whitelisted(String),
    /// Not whitelisted, not blacklisted, and `noexceptions` is off.
    Allowed,
    /// Not whitelisted while `noexceptions` is on.
    DeniedNoExceptions,
    /// Matched a blacklist entry.
    DeniedBlacklist(String),
}

impl GateDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, GateDecision::Whitelisted(_) | GateDecision::Allowed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Whitelisted(_) => "WHITELIST",
            GateDecision::Allowed => "ALLOW",
            GateDecision::DeniedNoExceptions | GateDecision::DeniedBlacklist(_) => "DENY",
        }
    }

    /// Human-readable reason, used in log lines.
    pub fn reason(&self) -> String {
        match self {
            GateDecision::Whitelisted(p) => format!("whitelisted by {p:?}"),
            GateDecision::Allowed => "no policy entry matched".into(),
            GateDecision::DeniedNoExceptions => "no permission whitelist[noexceptions]".into(),
            GateDecision::DeniedBlacklist(p) => format!("no permission blacklist ({p:?})"),
        }
    }
}
