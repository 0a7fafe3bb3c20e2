//! Definition registry: the policy lists and the named drift checks.
//!
//! The policy file holds `[input]`, `[whitelist]`, `[blacklist]` and
//! `[forcealert]`. The definitions file holds `[define]`, one
//! `name<TAB>limit<TAB>alert` line per check, and one section per check
//! listing its command pipeline. Both may be the same file.

pub mod materialize;
pub mod sections;

pub use materialize::{Fetch, Materializer, NetworkFetcher, Producer, RemoteTarget};
pub use sections::Sections;

use std::path::Path;

use crate::baseline::normalize_name;
use crate::error::{Error, Result};

/// One named governance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    /// Commands run in order; the last one's stdout is the observed state.
    pub pipeline: Vec<String>,
    /// Drift strictly above this fires the alert.
    pub limit: i64,
    /// Literal command or a key into the alert table.
    pub alert: String,
}

/// Lists read from the policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyLists {
    pub input: Vec<String>,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub forcealert: Vec<String>,
}

impl PolicyLists {
    pub fn parse(text: &str) -> Self {
        let s = Sections::new(text);
        let lists = Self {
            input: s.get_owned("input"),
            whitelist: s.get_owned("whitelist"),
            blacklist: s.get_owned("blacklist"),
            forcealert: s.get_owned("forcealert"),
        };
        log::debug!(
            "policy: {} input, {} whitelist, {} blacklist, {} forcealert",
            lists.input.len(),
            lists.whitelist.len(),
            lists.blacklist.len(),
            lists.forcealert.len()
        );
        lists
    }

    /// Load from `path`. A missing policy file means no policy at all.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("no policy file at {}; running without policy", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!("cannot read {}: {e}", path.display()))),
        }
    }
}

/// Parse one `[define]` line into `(name, limit, alert)`.
///
/// Exactly three tab-separated fields and an integer limit are required.
pub fn parse_define_line(line: &str) -> Option<(&str, i64, &str)> {
    let fields: Vec<&str> = line.split('\t').collect();
    let &[name, limit, alert] = fields.as_slice() else {
        return None;
    };
    if name.is_empty() {
        return None;
    }
    let limit = limit.parse::<i64>().ok()?;
    Some((name, limit, alert))
}

/// Loaded definitions in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    definitions: Vec<Definition>,
}

impl Registry {
    pub fn parse(text: &str) -> Self {
        let s = Sections::new(text);
        let mut registry = Self::default();
        for line in s.get("define") {
            let Some((name, limit, alert)) = parse_define_line(line) else {
                log::debug!("skipping malformed define line: {line:?}");
                continue;
            };
            let pipeline = s.get_owned(name);
            if pipeline.is_empty() {
                log::warn!("definition {name:?} has no commands; skipped");
                continue;
            }
            registry.insert(Definition {
                name: name.to_string(),
                pipeline,
                limit,
                alert: alert.to_string(),
            });
        }
        registry
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let registry = Self::parse(&text);
        log::info!(
            "loaded {} definition(s) from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Add a definition. A later definition whose name normalizes to the
    /// same baseline key replaces the earlier one in its original position.
    pub fn insert(&mut self, def: Definition) {
        let key = normalize_name(&def.name);
        match self
            .definitions
            .iter_mut()
            .find(|d| normalize_name(&d.name) == key)
        {
            Some(existing) if existing.name == def.name => {
                log::debug!("definition {:?} redefined; last one wins", def.name);
                *existing = def;
            }
            Some(existing) => {
                log::warn!(
                    "definition {:?} shares baseline .{key} with {:?}; last one wins",
                    def.name,
                    existing.name
                );
                *existing = def;
            }
            None => self.definitions.push(def),
        }
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl FromIterator<Definition> for Registry {
    fn from_iter<I: IntoIterator<Item = Definition>>(iter: I) -> Self {
        let mut registry = Self::default();
        for def in iter {
            registry.insert(def);
        }
        registry
    }
}
