//! Evaluation orchestrator: one pass over every definition.
//!
//! Both entrypoints, the direct CLI loop and the single-shot serverless
//! [`handle_request`], go through [`Engine::evaluate_all`].

use serde::Serialize;

use crate::alert::{AlertPolicy, DispatchReport};
use crate::baseline::BaselineStore;
use crate::config::Config;
use crate::drift;
use crate::error::Result;
use crate::exec::{Executor, PipelineOutcome, Shell};
use crate::policy::PolicyGate;
use crate::registry::{Definition, Fetch, Materializer, PolicyLists, Registry};

/// Larger drifts are counted but their line diff is not logged.
const MAX_LOGGED_CHANGES: usize = 1000;

/// How one definition's evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DefinitionOutcome {
    /// No prior baseline; output stored, no diff computed.
    Seeded,
    /// Drift at or below the limit; baseline refreshed.
    WithinLimit { changes: usize },
    /// Drift above the limit; alerts fired and baseline refreshed.
    Alerted {
        changes: usize,
        report: DispatchReport,
    },
    /// A pipeline command was refused by the policy gate.
    Denied { command: String },
    /// A pipeline command could not run or exited non-zero.
    Failed { command: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: DefinitionOutcome,
}

/// Per-pass counts plus each definition's outcome, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub evaluated: usize,
    pub seeded: usize,
    pub within_limit: usize,
    pub alerted: usize,
    pub denied: usize,
    pub failed: usize,
    /// Alert commands that exited non-zero or were denied.
    pub alert_failures: usize,
    pub reports: Vec<DefinitionReport>,
}

impl PassSummary {
    fn record(&mut self, name: &str, outcome: DefinitionOutcome) {
        self.evaluated += 1;
        match &outcome {
            DefinitionOutcome::Seeded => self.seeded += 1,
            DefinitionOutcome::WithinLimit { .. } => self.within_limit += 1,
            DefinitionOutcome::Alerted { report, .. } => {
                self.alerted += 1;
                self.alert_failures += report.failed.len();
            }
            DefinitionOutcome::Denied { .. } => self.denied += 1,
            DefinitionOutcome::Failed { .. } => self.failed += 1,
        }
        self.reports.push(DefinitionReport {
            name: name.to_string(),
            outcome,
        });
    }

    /// One-line status for operators and serverless hosts.
    pub fn status(&self) -> String {
        format!(
            "ok: {} evaluated, {} seeded, {} within limit, {} alerted, {} denied, {} failed",
            self.evaluated, self.seeded, self.within_limit, self.alerted, self.denied, self.failed
        )
    }
}

/// Owns everything a pass needs. Shared state is read-only during a pass.
#[derive(Debug)]
pub struct Engine {
    executor: Executor,
    store: BaselineStore,
    alerts: AlertPolicy,
    registry: Registry,
    parallel: bool,
}

impl Engine {
    pub fn new(
        executor: Executor,
        store: BaselineStore,
        alerts: AlertPolicy,
        registry: Registry,
    ) -> Self {
        Self {
            executor,
            store,
            alerts,
            registry,
            parallel: false,
        }
    }

    /// Run definitions concurrently, one thread each.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Build an engine from settings: load the policy file, compile the
    /// gate, materialize the definitions file from `[input]` if any, then
    /// parse the definitions.
    pub fn from_config(config: &Config, fetcher: &dyn Fetch) -> Result<Self> {
        let s = &config.settings;
        let policy_path = s.policy_path()?;
        let define_path = s.define_path()?;

        log::debug!("-- Load Config -- {}", policy_path.display());
        let lists = PolicyLists::load(&policy_path)?;
        let gate = PolicyGate::new(&lists.whitelist, &lists.blacklist, s.match_mode, s.noexceptions)?;
        let executor = Executor::new(gate, Shell::parse(&s.shell)?);

        log::debug!("-- Define Get --");
        Materializer::new(&executor, fetcher).materialize(&lists.input, &define_path)?;

        log::debug!("-- Load Define -- {}", define_path.display());
        let registry = Registry::load(&define_path)?;

        let alerts = AlertPolicy::new(lists.forcealert, s.placeholder.clone(), config.alerts.clone());
        let store = BaselineStore::new(s.base_dir()?);
        Ok(Self::new(executor, store, alerts, registry).with_parallel(s.parallel))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Evaluate one definition. `Err` only for persistence failures.
    pub fn evaluate(&self, def: &Definition) -> Result<DefinitionOutcome> {
        let before = self.store.read(&def.name)?;

        let after = match self.executor.run_pipeline(&def.pipeline) {
            PipelineOutcome::Completed(out) => out,
            PipelineOutcome::Denied { command, .. } => {
                log::warn!("{}: pipeline denied at {command:?}", def.name);
                return Ok(DefinitionOutcome::Denied { command });
            }
            PipelineOutcome::Failed { command, reason } => {
                log::warn!("{}: pipeline failed at {command:?}: {reason}", def.name);
                return Ok(DefinitionOutcome::Failed { command, reason });
            }
        };

        let Some(before) = before else {
            log::info!(
                "{}: no previous result, seeding {}",
                def.name,
                self.store.path_for(&def.name).display()
            );
            self.store.write(&def.name, &after)?;
            return Ok(DefinitionOutcome::Seeded);
        };

        let changes = drift::change_count(&before, &after);
        if log::log_enabled!(log::Level::Debug) {
            match drift::diff_lines_bounded(&before, &after, MAX_LOGGED_CHANGES) {
                Some(diff) => log::debug!("{}: -- diff --\n{}", def.name, drift::render(&diff)),
                None => log::debug!(
                    "{}: diff of {changes} changed line(s) not logged (over {MAX_LOGGED_CHANGES})",
                    def.name
                ),
            }
        }

        let outcome = if drift::exceeds(changes, def.limit) {
            log::warn!("{}: {changes} changed line(s) > limit {}", def.name, def.limit);
            let report = self.alerts.dispatch(&self.executor, def);
            DefinitionOutcome::Alerted { changes, report }
        } else {
            log::info!("{}: {changes} changed line(s), no alert", def.name);
            DefinitionOutcome::WithinLimit { changes }
        };
        self.store.write(&def.name, &after)?;
        Ok(outcome)
    }

    /// One pass over every definition.
    ///
    /// Per-definition denials and failures are contained. A persistence
    /// error halts a sequential pass before the next definition runs; in
    /// parallel mode every thread is joined first and the first error in
    /// registration order is returned.
    pub fn evaluate_all(&self) -> Result<PassSummary> {
        let defs = self.registry.definitions();
        let results = if self.parallel {
            log::debug!("evaluating {} definition(s) in parallel", defs.len());
            self.evaluate_parallel(defs)
        } else {
            let mut results = Vec::with_capacity(defs.len());
            for def in defs {
                let result = self.evaluate(def);
                let halt = result.is_err();
                results.push(result);
                if halt {
                    break;
                }
            }
            results
        };

        let mut summary = PassSummary::default();
        let mut fatal = None;
        for (def, result) in defs.iter().zip(results) {
            match result {
                Ok(outcome) => summary.record(&def.name, outcome),
                Err(e) => {
                    log::error!("{}: {e}", def.name);
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }
        log::info!("{}", summary.status());
        Ok(summary)
    }

    fn evaluate_parallel(&self, defs: &[Definition]) -> Vec<Result<DefinitionOutcome>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = defs
                .iter()
                .map(|def| scope.spawn(move || self.evaluate(def)))
                .collect();
            handles
                .into_iter()
                .zip(defs)
                .map(|(handle, def)| {
                    handle.join().unwrap_or_else(|_| {
                        log::error!("{}: evaluation thread panicked", def.name);
                        Ok(DefinitionOutcome::Failed {
                            command: String::new(),
                            reason: "evaluation thread panicked".into(),
                        })
                    })
                })
                .collect()
        })
    }
}

/// Single-shot entrypoint for serverless hosts: one pass, short status.
pub fn handle_request(engine: &Engine) -> Result<String> {
    engine.evaluate_all().map(|summary| summary.status())
}
