use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::MatchMode;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub settings: Settings,
    /// Symbolic alert name → command.
    #[serde(default)]
    pub alerts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Base directory for the policy/definitions files and baselines.
    pub path: String,
    /// Policy file name, relative to `path` unless absolute.
    pub config: String,
    /// Definitions file name, relative to `path` unless absolute.
    pub define: String,
    pub shell: String,
    pub noexceptions: bool,
    pub match_mode: MatchMode,
    pub placeholder: String,
    pub parallel: bool,
    pub debug: bool,
    pub logging: bool,
    pub log_dir: String,
    /// Read policy and definitions from the policy file alone (serverless
    /// deployments ship a single file).
    #[serde(default)]
    pub single_source: bool,
}

impl Settings {
    /// `path` with `~` and `$VAR` expanded.
    pub fn base_dir(&self) -> Result<PathBuf> {
        expand(&self.path)
    }

    pub fn policy_path(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(expand(&self.config)?))
    }

    pub fn define_path(&self) -> Result<PathBuf> {
        if self.single_source {
            return self.policy_path();
        }
        Ok(self.base_dir()?.join(expand(&self.define)?))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        expand(&self.log_dir)
    }
}

fn expand(raw: &str) -> Result<PathBuf> {
    shellexpand::full(raw)
        .map(|s| PathBuf::from(s.into_owned()))
        .map_err(|e| Error::Config(format!("cannot expand {raw:?}: {e}")))
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    alerts: AlertsOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    path: Option<String>,
    config: Option<String>,
    define: Option<String>,
    shell: Option<String>,
    noexceptions: Option<bool>,
    match_mode: Option<MatchMode>,
    placeholder: Option<String>,
    parallel: Option<bool>,
    debug: Option<bool>,
    logging: Option<bool>,
    log_dir: Option<String>,
    single_source: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    remove: Vec<String>,
    #[serde(flatten)]
    add: BTreeMap<String, String>,
}

// ── Merge logic ──

/// Merge a user table into a default table.
/// In replace mode: user table replaces default entirely.
/// In merge mode: remove keys first, then insert additions (user wins).
fn merge_map(
    base: &mut BTreeMap<String, String>,
    add: BTreeMap<String, String>,
    remove: &[String],
    replace: bool,
) {
    if replace {
        *base = add;
    } else {
        base.retain(|k, _| !remove.contains(k));
        base.extend(add);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay at `explicit` if given, otherwise
    ///    ~/.config/driftgate/config.toml if it exists
    ///
    /// Scalars override; the `[alerts]` table merges unless it sets
    /// `replace = true`. `remove = [..]` drops default alert keys.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();
        let overlay = match explicit {
            Some(path) => Some(Self::read_overlay(path)?),
            None => match Self::user_overlay_path() {
                Some(path) if path.exists() => Some(Self::read_overlay(&path)?),
                _ => None,
            },
        };
        if let Some(overlay) = overlay {
            config.apply_overlay(overlay);
        }
        Ok(config)
    }

    fn user_overlay_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/driftgate/config.toml"))
    }

    fn read_overlay(path: &Path) -> Result<ConfigOverlay> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let o = overlay.settings;
        let s = &mut self.settings;
        set(&mut s.path, o.path);
        set(&mut s.config, o.config);
        set(&mut s.define, o.define);
        set(&mut s.shell, o.shell);
        set(&mut s.noexceptions, o.noexceptions);
        set(&mut s.match_mode, o.match_mode);
        set(&mut s.placeholder, o.placeholder);
        set(&mut s.parallel, o.parallel);
        set(&mut s.debug, o.debug);
        set(&mut s.logging, o.logging);
        set(&mut s.log_dir, o.log_dir);
        set(&mut s.single_source, o.single_source);

        let a = overlay.alerts;
        merge_map(&mut self.alerts, a.add, &a.remove, a.replace);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = Config::default_config();
        assert_eq!(config.settings.path, "/tmp/");
        assert_eq!(config.settings.config, "governance.ini");
        assert_eq!(config.settings.define, "define.ini");
        assert_eq!(config.settings.shell, "/bin/bash");
        assert_eq!(config.settings.placeholder, "{}");
        assert_eq!(config.settings.match_mode, MatchMode::Regex);
        assert!(config.alerts.is_empty());
    }

    #[test]
    fn defaults_are_permissive_and_sequential() {
        let s = Config::default_config().settings;
        assert!(!s.noexceptions);
        assert!(!s.parallel);
        assert!(!s.single_source);
        assert!(!s.debug);
        assert!(!s.logging);
    }

    #[test]
    fn default_paths() {
        let s = Config::default_config().settings;
        assert_eq!(s.policy_path().unwrap(), PathBuf::from("/tmp/governance.ini"));
        assert_eq!(s.define_path().unwrap(), PathBuf::from("/tmp/define.ini"));
    }

    #[test]
    fn single_source_reads_policy_file() {
        let mut s = Config::default_config().settings;
        s.single_source = true;
        assert_eq!(s.define_path().unwrap(), s.policy_path().unwrap());
    }

    #[test]
    fn absolute_file_names_ignore_base() {
        let mut s = Config::default_config().settings;
        s.define = "/etc/driftgate/define.ini".into();
        assert_eq!(s.define_path().unwrap(), PathBuf::from("/etc/driftgate/define.ini"));
    }

    #[test]
    fn overlay_overrides_scalars() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            shell = "/bin/sh"
            noexceptions = true
            match_mode = "substring"
        "#,
        );
        assert_eq!(config.settings.shell, "/bin/sh");
        assert!(config.settings.noexceptions);
        assert_eq!(config.settings.match_mode, MatchMode::Substring);
        // Omitted settings keep their defaults
        assert_eq!(config.settings.placeholder, "{}");
    }

    #[test]
    fn overlay_extends_alerts() {
        let mut config = Config::default_config();
        config.alerts.insert("mail".into(), "mail -s drift ops".into());
        config.apply_overlay_str(
            r#"
            [alerts]
            pager = "pagerduty-cli trigger"
        "#,
        );
        assert_eq!(config.alerts.len(), 2);
        assert_eq!(config.alerts["pager"], "pagerduty-cli trigger");
    }

    #[test]
    fn overlay_removes_alerts() {
        let mut config = Config::default_config();
        config.alerts.insert("mail".into(), "mail ops".into());
        config.alerts.insert("pager".into(), "page".into());
        config.apply_overlay_str(
            r#"
            [alerts]
            remove = ["mail"]
        "#,
        );
        assert!(!config.alerts.contains_key("mail"));
        assert!(config.alerts.contains_key("pager"));
    }

    #[test]
    fn overlay_replaces_alerts() {
        let mut config = Config::default_config();
        config.alerts.insert("mail".into(), "mail ops".into());
        config.apply_overlay_str(
            r#"
            [alerts]
            replace = true
            slack = "slack-notify"
        "#,
        );
        assert_eq!(config.alerts.len(), 1);
        assert_eq!(config.alerts["slack"], "slack-notify");
    }

    #[test]
    fn empty_overlay_changes_nothing() {
        let original = Config::default_config();
        let mut config = Config::default_config();
        config.apply_overlay_str("");
        assert_eq!(config.settings.path, original.settings.path);
        assert_eq!(config.alerts, original.alerts);
    }

    #[test]
    fn explicit_overlay_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driftgate.toml");
        std::fs::write(&path, "[settings]\nparallel = true\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(config.settings.parallel);
    }

    #[test]
    fn explicit_overlay_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn malformed_overlay_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[settings]\nmatch_mode = \"glob\"\n").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(Error::Config(_))));
    }
}
