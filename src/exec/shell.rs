use std::process::Command;

use crate::error::{Error, Result};

/// The interpreter every gated command is handed to.
///
/// The configured string is split with POSIX word rules, so
/// `bash -o pipefail` becomes `["bash", "-o", "pipefail"]` and each command
/// runs as `bash -o pipefail -c <command>`. On Windows the configured shell
/// is ignored and `cmd /C <command>` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
    args: Vec<String>,
}

impl Shell {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut words = shlex::split(spec)
            .ok_or_else(|| Error::Config(format!("unparseable shell: {spec:?}")))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::Config("shell must not be empty".into()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the process that runs `command`.
    pub fn command(&self, command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            return cmd;
        }
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("-c").arg(command);
        cmd
    }
}
