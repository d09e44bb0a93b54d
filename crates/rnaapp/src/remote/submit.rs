use std::fmt;
use std::time::Duration;

use super::command::{AnalysisCommand, SubmitScript, build_analysis_command, build_submit_script};
use super::{ConnectParams, Connector};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::form::FormState;
use crate::log_sanitize::sanitize_remote_output;
use crate::params::{HOST_KEY, OUTDIR_KEY, PORT_KEY, PROGRAM_KEY, ParameterSet, SAMPLE_INFO_KEY, USER_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubmitStage {
    Idle,
    CollectedValues,
    BuiltCommand,
    Connected,
    Submitted,
}

impl fmt::Display for SubmitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmitStage::Idle => "idle",
            SubmitStage::CollectedValues => "collected-values",
            SubmitStage::BuiltCommand => "built-command",
            SubmitStage::Connected => "connected",
            SubmitStage::Submitted => "submitted",
        };
        f.write_str(s)
    }
}

/// Everything one submit needs, built fresh from the form and dropped once the
/// remote call returns.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    stage: SubmitStage,
    pub connection: ParameterSet,
    pub job: ParameterSet,
    pub analysis: Option<AnalysisCommand>,
    pub script: Option<SubmitScript>,
}

impl SubmitContext {
    /// Reads the visible connection and job values and checks the keys every
    /// submit needs.
    pub fn collect(form: &FormState) -> Result<Self> {
        let connection = form.connection_key_values();
        for key in [USER_KEY, HOST_KEY, PORT_KEY, PROGRAM_KEY] {
            connection.require_text(key)?;
        }
        let job = form.job_key_values();
        for key in [OUTDIR_KEY, SAMPLE_INFO_KEY] {
            job.require_text(key)?;
        }

        let mut ctx = Self {
            stage: SubmitStage::Idle,
            connection,
            job,
            analysis: None,
            script: None,
        };
        ctx.advance(SubmitStage::CollectedValues);
        Ok(ctx)
    }

    /// Collects and builds without connecting.
    pub fn prepare(form: &FormState, remote: &RemoteConfig) -> Result<Self> {
        let mut ctx = Self::collect(form)?;
        ctx.build(remote)?;
        Ok(ctx)
    }

    pub fn stage(&self) -> SubmitStage {
        self.stage
    }

    fn advance(&mut self, next: SubmitStage) {
        tracing::debug!(from = %self.stage, to = %next, "submit stage");
        self.stage = next;
    }

    pub fn build(&mut self, remote: &RemoteConfig) -> Result<&SubmitScript> {
        if self.stage != SubmitStage::CollectedValues {
            return Err(Error::msg(format!(
                "cannot build the submit command in stage {}",
                self.stage
            )));
        }
        let program = self.connection.require_text(PROGRAM_KEY)?;
        let analysis = build_analysis_command(&remote.interpreter, program, &self.job)?;
        let script = build_submit_script(
            self.job.require_text(OUTDIR_KEY)?,
            self.job.require_text(SAMPLE_INFO_KEY)?,
            &analysis,
            &remote.bash_profile,
        );
        self.analysis = Some(analysis);
        self.advance(SubmitStage::BuiltCommand);
        Ok(&*self.script.insert(script))
    }

    pub fn connect_params(&self, password: &str, timeout: Duration) -> Result<ConnectParams> {
        let raw_port = self.connection.require_text(PORT_KEY)?;
        let port = raw_port
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::msg(format!("invalid Port '{raw_port}': {e}")))?;
        Ok(ConnectParams {
            host: self.connection.require_text(HOST_KEY)?.trim().to_string(),
            user: self.connection.require_text(USER_KEY)?.trim().to_string(),
            port,
            password: password.to_string(),
            timeout,
        })
    }
}

/// Runs the submit sequence against a `Connector`.
pub struct JobSubmitter<'a, C: ?Sized> {
    connector: &'a C,
    remote: &'a RemoteConfig,
}

impl<'a, C: Connector + ?Sized> JobSubmitter<'a, C> {
    pub fn new(connector: &'a C, remote: &'a RemoteConfig) -> Self {
        Self { connector, remote }
    }

    /// Collect, build, connect, run in the remote root directory, close.
    ///
    /// The first failure ends the sequence, a non-zero exit status of the remote
    /// command included. Once connected the connection is closed whether or not
    /// the run succeeded.
    pub fn submit(&self, form: &FormState, password: &str) -> Result<SubmitContext> {
        let mut ctx = SubmitContext::prepare(form, self.remote)?;
        let command = match &ctx.script {
            Some(script) => script.command.clone(),
            None => return Err(Error::msg("submit command was not built")),
        };

        let params = ctx.connect_params(
            password,
            Duration::from_secs(self.remote.connect_timeout_secs),
        )?;
        let mut shell = self.connector.connect(&params)?;
        ctx.advance(SubmitStage::Connected);

        let run = shell.run(&self.remote.root_dir, &command, true);
        if let Err(e) = shell.close() {
            tracing::warn!(error = %e, "failed to close remote connection");
        }
        let output = run?;

        if output.exit_status != 0 {
            return Err(remote_failure(output.exit_status, &output.output));
        }
        ctx.advance(SubmitStage::Submitted);
        tracing::info!(
            job = ctx.script.as_ref().map(|s| s.job_name.as_str()).unwrap_or_default(),
            host = %params.host,
            "job submitted"
        );
        Ok(ctx)
    }
}

const FAILURE_TAIL_LINES: usize = 5;

fn remote_failure(status: i32, output: &str) -> Error {
    let lines = sanitize_remote_output(output);
    let tail = &lines[lines.len().saturating_sub(FAILURE_TAIL_LINES)..];
    if tail.is_empty() {
        Error::msg(format!("remote command exited with status {status}"))
    } else {
        Error::msg(format!(
            "remote command exited with status {status}: {}",
            tail.join("; ")
        ))
    }
}
