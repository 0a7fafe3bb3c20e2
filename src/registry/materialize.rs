//! Bootstrap phase: regenerate the definitions file from `[input]` producers.
//!
//! Each producer line is tagged by its first tab-separated field:
//!
//! - `cmd<TAB><command>` or any untagged line: run through the gated shell
//! - `http<TAB><url>`: HTTP GET
//! - `s3<TAB>s3://<bucket>/<key>`: object-storage GET
//!
//! Outputs are concatenated in order and written over the definitions file
//! in one atomic replace. Any denied or failed producer aborts the whole
//! phase and leaves the existing file untouched.

use std::path::Path;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;

use crate::baseline::atomic_write;
use crate::error::{Error, Result};
use crate::exec::{Executor, PipelineOutcome};

/// A fetch that does not go through the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    Http(String),
    ObjectStore { bucket: String, key: String },
}

impl RemoteTarget {
    /// The text the policy gate sees for this target.
    pub fn gate_text(&self) -> String {
        match self {
            RemoteTarget::Http(url) => url.clone(),
            RemoteTarget::ObjectStore { bucket, key } => format!("s3://{bucket}/{key}"),
        }
    }
}

/// One `[input]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Producer {
    Shell(String),
    Remote(RemoteTarget),
}

impl Producer {
    pub fn parse(line: &str) -> Result<Self> {
        let Some((tag, rest)) = line.split_once('\t') else {
            return Ok(Producer::Shell(line.to_string()));
        };
        match tag {
            "cmd" => Ok(Producer::Shell(rest.to_string())),
            "http" => Ok(Producer::Remote(RemoteTarget::Http(rest.to_string()))),
            "s3" => {
                let (bucket, key) = rest
                    .strip_prefix("s3://")
                    .and_then(|r| r.split_once('/'))
                    .filter(|(b, k)| !b.is_empty() && !k.is_empty())
                    .ok_or_else(|| {
                        Error::Config(format!("expected s3://<bucket>/<key>, got {rest:?}"))
                    })?;
                Ok(Producer::Remote(RemoteTarget::ObjectStore {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }))
            }
            _ => Ok(Producer::Shell(line.to_string())),
        }
    }
}

/// Retrieves remote producer content.
pub trait Fetch: Send + Sync {
    fn fetch(&self, target: &RemoteTarget) -> Result<String>;
}

/// Real network fetcher: blocking HTTP and AWS S3 via `object_store`.
///
/// S3 credentials and region come from the usual `AWS_*` environment.
/// No timeout is applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkFetcher;

impl Fetch for NetworkFetcher {
    fn fetch(&self, target: &RemoteTarget) -> Result<String> {
        match target {
            RemoteTarget::Http(url) => {
                let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
                Ok(body)
            }
            RemoteTarget::ObjectStore { bucket, key } => fetch_object(bucket, key),
        }
    }
}

fn fetch_object(bucket: &str, key: &str) -> Result<String> {
    let store = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .build()?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Fetch {
            target: format!("s3://{bucket}/{key}"),
            reason: format!("runtime: {e}"),
        })?;
    let path = object_store::path::Path::from(key);
    let bytes = rt.block_on(async { store.get(&path).await?.bytes().await })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Runs the bootstrap producers.
pub struct Materializer<'a> {
    executor: &'a Executor,
    fetcher: &'a dyn Fetch,
}

impl<'a> Materializer<'a> {
    pub fn new(executor: &'a Executor, fetcher: &'a dyn Fetch) -> Self {
        Self { executor, fetcher }
    }

    /// Collect every producer's output, in order.
    pub fn collect<S: AsRef<str>>(&self, inputs: &[S]) -> Result<String> {
        let mut combined = String::new();
        for line in inputs {
            let line = line.as_ref();
            match Producer::parse(line)? {
                Producer::Shell(command) => match self.executor.run(&command) {
                    PipelineOutcome::Completed(out) => combined.push_str(&out),
                    PipelineOutcome::Denied { decision, .. } => {
                        return Err(Error::Fetch {
                            target: command,
                            reason: decision.reason(),
                        });
                    }
                    PipelineOutcome::Failed { reason, .. } => {
                        return Err(Error::Fetch {
                            target: command,
                            reason,
                        });
                    }
                },
                Producer::Remote(target) => {
                    let text = target.gate_text();
                    let decision = self.executor.gate().check(&text);
                    if !decision.is_permitted() {
                        log::warn!("{}: {}: {text}", decision.label(), decision.reason());
                        return Err(Error::Fetch {
                            target: text,
                            reason: decision.reason(),
                        });
                    }
                    log::debug!("fetch: {text}");
                    combined.push_str(&self.fetcher.fetch(&target)?);
                }
            }
        }
        Ok(combined)
    }

    /// Regenerate `dest` from `inputs`. Returns `false` when there are no
    /// producers and `dest` is used as-is.
    pub fn materialize<S: AsRef<str>>(&self, inputs: &[S], dest: &Path) -> Result<bool> {
        if inputs.is_empty() {
            return Ok(false);
        }
        let combined = self.collect(inputs)?;
        atomic_write(dest, &combined)?;
        log::info!(
            "materialized {} producer(s) into {}",
            inputs.len(),
            dest.display()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Shell;
    use crate::policy::{MatchMode, PolicyGate};
    use std::sync::Mutex;

    /// Serves canned bodies and records what was asked for.
    #[derive(Default)]
    struct FakeFetcher {
        seen: Mutex<Vec<RemoteTarget>>,
        fail: bool,
    }

    impl Fetch for FakeFetcher {
        fn fetch(&self, target: &RemoteTarget) -> Result<String> {
            self.seen.lock().unwrap().push(target.clone());
            if self.fail {
                return Err(Error::Fetch {
                    target: target.gate_text(),
                    reason: "503".into(),
                });
            }
            Ok(format!("[from {}]\n", target.gate_text()))
        }
    }

    fn executor(white: &[&str], black: &[&str], noexceptions: bool) -> Executor {
        let gate = PolicyGate::new(white, black, MatchMode::Regex, noexceptions).unwrap();
        Executor::new(gate, Shell::parse("/bin/sh").unwrap())
    }

    #[test]
    fn producer_tags() {
        assert_eq!(
            Producer::parse("cat define.ini").unwrap(),
            Producer::Shell("cat define.ini".into())
        );
        assert_eq!(
            Producer::parse("cmd\tcat define.ini").unwrap(),
            Producer::Shell("cat define.ini".into())
        );
        assert_eq!(
            Producer::parse("http\thttps://example.com/define.ini").unwrap(),
            Producer::Remote(RemoteTarget::Http("https://example.com/define.ini".into()))
        );
        assert_eq!(
            Producer::parse("s3\ts3://governance/prod/define.ini").unwrap(),
            Producer::Remote(RemoteTarget::ObjectStore {
                bucket: "governance".into(),
                key: "prod/define.ini".into(),
            })
        );
    }

    #[test]
    fn unknown_tag_is_a_shell_line() {
        assert_eq!(
            Producer::parse("printf\t'%s'").unwrap(),
            Producer::Shell("printf\t'%s'".into())
        );
    }

    #[test]
    fn malformed_s3_target() {
        assert!(Producer::parse("s3\tgovernance/define.ini").is_err());
        assert!(Producer::parse("s3\ts3://bucket-only").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn empty_inputs_skip() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("define.ini");
        std::fs::write(&dest, "keep me").unwrap();
        let ex = executor(&[], &[], false);
        let fetcher = FakeFetcher::default();
        let m = Materializer::new(&ex, &fetcher);
        let empty: [&str; 0] = [];
        assert!(!m.materialize(&empty, &dest).unwrap());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "keep me");
    }

    #[cfg(unix)]
    #[test]
    fn concatenates_in_order_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("define.ini");
        std::fs::write(&dest, "stale").unwrap();
        let ex = executor(&[], &[], false);
        let fetcher = FakeFetcher::default();
        let m = Materializer::new(&ex, &fetcher);
        let inputs = ["echo '[define]'", "http\thttps://example.com/x", "cmd\techo tail"];
        assert!(m.materialize(&inputs, &dest).unwrap());
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "[define]\n[from https://example.com/x]\ntail\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn failed_producer_is_fatal_and_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("define.ini");
        std::fs::write(&dest, "previous").unwrap();
        let ex = executor(&[], &[], false);
        let fetcher = FakeFetcher::default();
        let m = Materializer::new(&ex, &fetcher);
        let err = m.materialize(&["echo ok", "false"], &dest).unwrap_err();
        assert!(matches!(err, Error::Fetch { ref target, .. } if target == "false"));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");
    }

    #[test]
    fn denied_remote_is_fatal_and_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("define.ini");
        let ex = executor(&[], &["^http://"], false);
        let fetcher = FakeFetcher::default();
        let m = Materializer::new(&ex, &fetcher);
        let err = m
            .materialize(&["http\thttp://insecure.example/define.ini"], &dest)
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(fetcher.seen.lock().unwrap().is_empty());
        assert!(!dest.exists());
    }

    #[test]
    fn remote_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("define.ini");
        let ex = executor(&[], &[], false);
        let fetcher = FakeFetcher {
            fail: true,
            ..Default::default()
        };
        let m = Materializer::new(&ex, &fetcher);
        assert!(m.materialize(&["s3\ts3://b/k"], &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn s3_target_gated_as_uri() {
        let ex = executor(&["^s3://governance/"], &[], true);
        let fetcher = FakeFetcher::default();
        let m = Materializer::new(&ex, &fetcher);
        let out = m.collect(&["s3\ts3://governance/define.ini"]).unwrap();
        assert_eq!(out, "[from s3://governance/define.ini]\n");
    }
}
