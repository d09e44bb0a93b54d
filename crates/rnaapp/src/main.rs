use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use rnaapp::config::{self, Settings};
use rnaapp::controller::Controller;
use rnaapp::form::FormState;
use rnaapp::paramfile::{ParamStore, TomlParamFile};
use rnaapp::params::{ActionId, Mode, visible_buttons, visible_keys};
use rnaapp::remote::{SshConnector, SubmitContext};
use rnaapp::ui::ConsoleDialogs;
use rnaapp::ui::console::PASSWORD_ENV;
use rnaapp::{Error, Result};

const LOG_ENV: &str = "RNAAPP_LOG";
const DEFAULT_TUI_LOG_FILE: &str = "rnaapp.log";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Settings file (default: $RNAAPP_CONFIG, then ./rnaapp.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Terminal form (default)
    Tui {
        /// Parameter file to load at startup
        #[arg(long)]
        params: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
    /// Print the connection keys, job keys and buttons of a mode
    Keys {
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        #[arg(long)]
        json: bool,
    },
    /// Print the analysis command and the remote submit command for a parameter file
    Render {
        #[arg(long)]
        params: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
    /// Load a parameter file and submit the job without the terminal form
    Submit {
        #[arg(long)]
        params: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
        /// Save the values that are submitted to this parameter file first
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let cmd = args.cmd.unwrap_or(Command::Tui {
        params: None,
        mode: None,
    });

    // The terminal form owns the screen, so it never logs to stderr.
    let log_file = match (&cmd, args.log_file) {
        (_, Some(p)) => Some(p),
        (Command::Tui { .. }, None) => Some(PathBuf::from(DEFAULT_TUI_LOG_FILE)),
        _ => None,
    };
    init_logging(log_file.as_deref(), args.log_json)?;

    let settings = config::discover(args.config.as_deref())?;
    match cmd {
        Command::Tui { params, mode } => cmd_tui(settings, params.as_deref(), mode),
        Command::Keys { mode, json } => cmd_keys(mode.unwrap_or(settings.form.mode), json),
        Command::Render { params, mode } => cmd_render(&settings, &params, mode),
        Command::Submit {
            params,
            mode,
            yes,
            save,
        } => cmd_submit(settings, params, mode, yes, save),
    }
}

fn init_logging(log_file: Option<&Path>, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = match log_file {
        Some(p) => {
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(p)
                .map_err(|e| Error::msg(format!("failed to open log file {}: {e}", p.display())))?;
            BoxMakeWriter::new(Mutex::new(f))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(log_file.is_none())
        .with_writer(writer);
    let res = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    res.map_err(|e| Error::msg(format!("failed to init logging: {e}")))
}

fn controller(settings: Settings, mode: Option<Mode>) -> Result<Controller<TomlParamFile, SshConnector>> {
    let mut ctrl = Controller::new(settings, TomlParamFile, SshConnector)?;
    if let Some(mode) = mode {
        ctrl.form_mut().set_mode(mode);
    }
    Ok(ctrl)
}

fn cmd_tui(settings: Settings, params: Option<&Path>, mode: Option<Mode>) -> Result<()> {
    let mut ctrl = controller(settings, mode)?;
    if let Some(p) = params {
        let loaded = TomlParamFile.read(p)?;
        ctrl.form_mut().apply_parameters(&loaded);
    }
    rnaapp::ui::run_tui(ctrl)
}

fn cmd_keys(mode: Mode, json: bool) -> Result<()> {
    let (connection, job) = visible_keys(mode);
    let buttons: Vec<&str> = visible_buttons(mode).iter().map(|a| a.key()).collect();

    if json {
        let doc = serde_json::json!({
            "mode": mode.name(),
            "connection_keys": connection,
            "job_keys": job,
            "buttons": buttons,
        });
        let s = serde_json::to_string_pretty(&doc)
            .map_err(|e| Error::msg(format!("failed to render keys: {e}")))?;
        println!("{s}");
        return Ok(());
    }

    println!("mode: {mode}");
    println!("connection keys:");
    for k in connection {
        println!("  {k}");
    }
    println!("job keys:");
    for k in job {
        println!("  {k}");
    }
    println!("buttons: {}", buttons.join(", "));
    Ok(())
}

fn cmd_render(settings: &Settings, params: &Path, mode: Option<Mode>) -> Result<()> {
    let mut form = FormState::with_defaults(mode.unwrap_or(settings.form.mode), &settings.defaults)?;
    form.apply_parameters(&TomlParamFile.read(params)?);

    let ctx = SubmitContext::prepare(&form, &settings.remote)?;
    let (Some(analysis), Some(script)) = (&ctx.analysis, &ctx.script) else {
        return Err(Error::msg("submit command was not built"));
    };
    println!("# analysis command");
    println!("{}", analysis.text);
    println!("# remote command (in {})", settings.remote.root_dir);
    println!("{}", script.command);
    Ok(())
}

fn cmd_submit(
    settings: Settings,
    params: PathBuf,
    mode: Option<Mode>,
    yes: bool,
    save: Option<PathBuf>,
) -> Result<()> {
    let mut ctrl = controller(settings, mode)?;
    let mut dialogs = ConsoleDialogs::new()
        .with_open_path(params)
        .with_password(std::env::var(PASSWORD_ENV).ok())
        .assume_yes(yes);

    let mut steps = vec![ActionId::LoadParameters];
    if let Some(path) = save {
        dialogs = dialogs.with_save_path(path);
        steps.push(ActionId::SaveParameters);
    }
    steps.push(ActionId::Submit);

    for id in steps {
        if !ctrl.dispatch(id, &mut dialogs) {
            return Err(Error::msg(format!("action '{id}' is not available")));
        }
        if let Some(msg) = dialogs.failure() {
            return Err(Error::msg(msg));
        }
    }
    Ok(())
}
