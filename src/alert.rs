//! Alert dispatch on threshold breach.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::exec::Executor;
use crate::registry::Definition;

/// Everything needed to turn a breached definition into alert commands.
#[derive(Debug, Clone, Default)]
pub struct AlertPolicy {
    /// Templates fired for every breach, replacing per-definition actions.
    pub force: Vec<String>,
    /// Token in `force` templates replaced with the definition name.
    pub placeholder: String,
    /// Symbolic alert name → command.
    pub table: BTreeMap<String, String>,
}

/// What happened when alerts fired for one definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub fired: Vec<String>,
    pub failed: Vec<String>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl AlertPolicy {
    pub fn new(force: Vec<String>, placeholder: impl Into<String>, table: BTreeMap<String, String>) -> Self {
        Self {
            force,
            placeholder: placeholder.into(),
            table,
        }
    }

    /// The commands a breach of `def` runs, in order.
    pub fn commands_for(&self, def: &Definition) -> Vec<String> {
        if !self.force.is_empty() {
            return self
                .force
                .iter()
                .map(|t| substitute(t, &self.placeholder, &def.name))
                .collect();
        }
        let action = self.table.get(&def.alert).unwrap_or(&def.alert);
        if action.trim().is_empty() {
            return Vec::new();
        }
        vec![action.clone()]
    }

    /// Fire every alert command for `def`. Failures are logged and reported,
    /// never retried.
    pub fn dispatch(&self, executor: &Executor, def: &Definition) -> DispatchReport {
        let commands = self.commands_for(def);
        if commands.is_empty() {
            log::warn!("{}: threshold exceeded but no alert action is set", def.name);
        }
        let mut report = DispatchReport::default();
        for command in commands {
            log::info!("Alert: {command}");
            if executor.run(&command).is_ok() {
                report.fired.push(command);
            } else {
                log::error!("{}: alert command failed: {command}", def.name);
                report.failed.push(command);
            }
        }
        report
    }
}

fn substitute(template: &str, placeholder: &str, name: &str) -> String {
    if placeholder.is_empty() {
        return template.to_string();
    }
    template.replace(placeholder, name)
}
