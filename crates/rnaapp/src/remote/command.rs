use crate::error::Result;
use crate::params::{OUTDIR_KEY, ParamValue, ParameterSet};

/// Written inside the output directory by `tee`.
pub const PROGRESS_FILE: &str = "progress.txt";
/// Script file the detached session runs, inside the output directory.
pub const COMMAND_FILE: &str = "command.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisCommand {
    pub text: String,
    /// Set when double quotes had to be swapped for single quotes.
    pub quotes_replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitScript {
    pub job_name: String,
    /// Line written to the command file: profile sourcing + analysis command.
    pub script: String,
    pub command_file: String,
    /// The full `&&` chain sent over the connection.
    pub command: String,
}

/// `<interpreter> <program> --flag --key='value' ... 2>&1 | tee <outdir>/progress.txt`
///
/// Arguments follow the iteration order of `job`. Flags that are off never
/// appear. The result ends up inside a double-quoted `echo`, so any double
/// quote is replaced by a single quote.
pub fn build_analysis_command(
    interpreter: &str,
    program: &str,
    job: &ParameterSet,
) -> Result<AnalysisCommand> {
    let outdir = job.require_text(OUTDIR_KEY)?;

    let mut args = vec![format!("{interpreter} {program}")];
    for (key, value) in job.iter() {
        match value {
            ParamValue::Flag(true) => args.push(format!("--{key}")),
            ParamValue::Flag(false) => {}
            ParamValue::Text(v) => args.push(format!("--{key}='{v}'")),
        }
    }
    args.push(format!("2>&1 | tee {outdir}/{PROGRESS_FILE}"));

    let mut text = args.join(" ");
    let quotes_replaced = text.contains('"');
    if quotes_replaced {
        tracing::warn!(
            "double quotes in the analysis command will be replaced by single quotes"
        );
        text = text.replace('"', "'");
    }

    Ok(AnalysisCommand {
        text,
        quotes_replaced,
    })
}

/// Base name of `outdir` with spaces replaced by underscores.
pub fn job_name(outdir: &str) -> String {
    let trimmed = outdir.trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    base.replace(' ', "_")
}

pub fn build_submit_script(
    outdir: &str,
    sample_sheet: &str,
    analysis: &AnalysisCommand,
    bash_profile: &str,
) -> SubmitScript {
    let job_name = job_name(outdir);
    // The profile sets up the analysis environment and must be sourced in the
    // same shell that runs the analysis.
    let script = format!("source {bash_profile} && {}", analysis.text);
    let command_file = format!("{outdir}/{COMMAND_FILE}");

    let command = [
        format!("mkdir -p \"{outdir}\""),
        format!("cp \"{sample_sheet}\" \"{outdir}/\""),
        format!("echo \"{script}\" > \"{command_file}\""),
        format!("screen -dm -S {job_name} bash \"{command_file}\""),
    ]
    .join(" && ");

    SubmitScript {
        job_name,
        script,
        command_file,
        command,
    }
}
