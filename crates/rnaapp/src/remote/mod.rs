pub mod command;
pub mod ssh;
pub mod submit;

use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub use command::{AnalysisCommand, SubmitScript, build_analysis_command, build_submit_script, job_name};
pub use ssh::SshConnector;
pub use submit::{JobSubmitter, SubmitContext, SubmitStage};

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub password: String,
    pub timeout: Duration,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub exit_status: i32,
    /// Stdout and stderr, interleaved as the remote side wrote them.
    pub output: String,
}

/// An open, authenticated remote shell.
pub trait RemoteShell {
    /// Runs `command` with `cwd` as working directory. With `echo` the command
    /// text is logged before it runs.
    fn run(&mut self, cwd: &str, command: &str, echo: bool) -> Result<RemoteOutput>;
    fn close(&mut self) -> Result<()>;
}

pub trait Connector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteShell>>;
}
