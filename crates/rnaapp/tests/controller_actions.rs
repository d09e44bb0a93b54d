use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rnaapp::config::Settings;
use rnaapp::controller::{ActionRegistry, Controller, actions};
use rnaapp::paramfile::ParamStore;
use rnaapp::params::{
    ActionId, HOST_KEY, Mode, OUTDIR_KEY, PORT_KEY, PROGRAM_KEY, ParamValue, ParameterSet,
    USER_KEY,
};
use rnaapp::remote::{ConnectParams, Connector, RemoteOutput, RemoteShell};
use rnaapp::ui::Dialogs;
use rnaapp::{Error, Result};

#[derive(Default)]
struct FakeDialogs {
    open: Option<PathBuf>,
    save: Option<PathBuf>,
    secret: Option<String>,
    confirm: bool,
    asked: Vec<&'static str>,
    infos: Vec<String>,
    errors: Vec<String>,
}

impl Dialogs for FakeDialogs {
    fn pick_open_file(&mut self, _title: &str) -> Option<PathBuf> {
        self.asked.push("open");
        self.open.clone()
    }

    fn pick_save_file(&mut self, _title: &str) -> Option<PathBuf> {
        self.asked.push("save");
        self.save.clone()
    }

    fn confirm(&mut self, _title: &str, message: &str) -> bool {
        assert_eq!(message, "Are you sure you want to submit the job?");
        self.asked.push("confirm");
        self.confirm
    }

    fn prompt_secret(&mut self, _title: &str, label: &str) -> Option<String> {
        assert_eq!(label, "Password:");
        self.asked.push("secret");
        self.secret.clone()
    }

    fn info(&mut self, _title: &str, message: &str) {
        self.infos.push(message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

#[derive(Default)]
struct MemStore {
    files: RefCell<BTreeMap<PathBuf, ParameterSet>>,
    reads: RefCell<usize>,
    writes: RefCell<usize>,
}

impl ParamStore for MemStore {
    fn read(&self, path: &Path) -> Result<ParameterSet> {
        *self.reads.borrow_mut() += 1;
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::msg(format!("failed to read parameters {}: not found", path.display())))
    }

    fn write(&self, path: &Path, params: &ParameterSet) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        self.files.borrow_mut().insert(path.to_path_buf(), params.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RemoteLog {
    connects: Vec<ConnectParams>,
    runs: Vec<(String, String)>,
    closed: usize,
}

#[derive(Default)]
struct FakeConnector {
    log: Rc<RefCell<RemoteLog>>,
    exit_status: Cell<i32>,
    output: &'static str,
    fail_run: bool,
}

struct FakeShell {
    log: Rc<RefCell<RemoteLog>>,
    exit_status: i32,
    output: &'static str,
    fail_run: bool,
}

impl Connector for FakeConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteShell>> {
        self.log.borrow_mut().connects.push(params.clone());
        Ok(Box::new(FakeShell {
            log: self.log.clone(),
            exit_status: self.exit_status.get(),
            output: self.output,
            fail_run: self.fail_run,
        }))
    }
}

impl RemoteShell for FakeShell {
    fn run(&mut self, cwd: &str, command: &str, _echo: bool) -> Result<RemoteOutput> {
        self.log
            .borrow_mut()
            .runs
            .push((cwd.to_string(), command.to_string()));
        if self.fail_run {
            return Err(Error::msg("ssh: channel closed"));
        }
        Ok(RemoteOutput {
            exit_status: self.exit_status,
            output: self.output.to_string(),
        })
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().closed += 1;
        Ok(())
    }
}

type Ctrl = Controller<MemStore, FakeConnector>;

fn controller() -> Ctrl {
    controller_with(FakeConnector::default())
}

fn controller_with(connector: FakeConnector) -> Ctrl {
    let mut ctrl = Controller::new(Settings::default(), MemStore::default(), connector).unwrap();
    let form = ctrl.form_mut();
    form.set_value(USER_KEY, ParamValue::Text("alice".into())).unwrap();
    form.set_value(HOST_KEY, ParamValue::Text("10.0.0.5".into())).unwrap();
    form.set_value(PROGRAM_KEY, ParamValue::Text("analysis.py".into())).unwrap();
    form.set_value(OUTDIR_KEY, ParamValue::Text("/tmp/run one".into())).unwrap();
    ctrl
}

fn submit_dialogs() -> FakeDialogs {
    FakeDialogs {
        secret: Some("hunter2".into()),
        confirm: true,
        ..Default::default()
    }
}

#[test]
fn cancelled_open_reads_nothing() {
    let mut ctrl = controller();
    let before = ctrl.form().clone();
    let mut dialogs = FakeDialogs::default();
    assert!(ctrl.dispatch(ActionId::LoadParameters, &mut dialogs));
    assert_eq!(dialogs.asked, vec!["open"]);
    assert_eq!(*ctrl.store().reads.borrow(), 0);
    assert_eq!(ctrl.form(), &before);
    assert!(dialogs.errors.is_empty());

    let mut dialogs = FakeDialogs {
        open: Some(PathBuf::new()),
        ..Default::default()
    };
    ctrl.dispatch(ActionId::LoadParameters, &mut dialogs);
    assert_eq!(*ctrl.store().reads.borrow(), 0);
}

#[test]
fn cancelled_save_writes_nothing() {
    let mut ctrl = controller();
    let mut dialogs = FakeDialogs::default();
    ctrl.dispatch(ActionId::SaveParameters, &mut dialogs);
    assert_eq!(*ctrl.store().writes.borrow(), 0);
    assert!(dialogs.errors.is_empty());
}

#[test]
fn cancelled_or_empty_password_never_connects() {
    let mut ctrl = controller();
    for secret in [None, Some(String::new())] {
        let mut dialogs = FakeDialogs {
            secret,
            confirm: true,
            ..Default::default()
        };
        ctrl.dispatch(ActionId::Submit, &mut dialogs);
        assert_eq!(dialogs.asked, vec!["secret"]);
        assert!(dialogs.infos.is_empty());
    }
    assert!(ctrl.connector().log.borrow().connects.is_empty());
}

#[test]
fn declined_confirmation_never_connects() {
    let mut ctrl = controller();
    let mut dialogs = FakeDialogs {
        secret: Some("pw".into()),
        confirm: false,
        ..Default::default()
    };
    ctrl.dispatch(ActionId::Submit, &mut dialogs);
    assert_eq!(dialogs.asked, vec!["secret", "confirm"]);
    assert!(ctrl.connector().log.borrow().connects.is_empty());
    assert!(dialogs.errors.is_empty());
}

#[test]
fn mode_round_trip_keeps_every_value() {
    let mut ctrl = controller();
    assert!(ctrl.dispatch(ActionId::AdvancedMode, &mut FakeDialogs::default()));
    assert_eq!(ctrl.mode(), Mode::Advanced);
    ctrl.form_mut()
        .set_value("threads", ParamValue::Text("4".into()))
        .unwrap();
    ctrl.form_mut().toggle_flag("invert-colors").unwrap();
    let before = ctrl.form().clone();

    assert!(ctrl.dispatch(ActionId::BasicMode, &mut FakeDialogs::default()));
    assert_eq!(ctrl.mode(), Mode::Basic);
    assert!(!ctrl.form().key_values().contains_key("threads"));
    assert!(ctrl.dispatch(ActionId::AdvancedMode, &mut FakeDialogs::default()));

    assert_eq!(ctrl.form(), &before);
}

#[test]
fn actions_outside_the_mode_are_refused() {
    let mut ctrl = controller();
    assert_eq!(ctrl.mode(), Mode::Basic);
    assert!(!ctrl.dispatch(ActionId::BasicMode, &mut FakeDialogs::default()));
    assert_eq!(ctrl.mode(), Mode::Basic);
}

#[test]
fn load_resets_absent_flags_and_sets_present_ones() {
    let mut ctrl = controller();
    ctrl.dispatch(ActionId::AdvancedMode, &mut FakeDialogs::default());
    ctrl.form_mut().toggle_flag("invert-colors").unwrap();
    ctrl.form_mut()
        .set_value("colormap", ParamValue::Text("Dark2".into()))
        .unwrap();

    let path = PathBuf::from("params.toml");
    let file: ParameterSet = [
        ("publication-figure", ParamValue::Flag(false)),
        ("threads", ParamValue::Text("2".into())),
        ("unknown-key", ParamValue::Text("x".into())),
    ]
    .into_iter()
    .collect();
    ctrl.store().files.borrow_mut().insert(path.clone(), file);

    let mut dialogs = FakeDialogs {
        open: Some(path),
        ..Default::default()
    };
    ctrl.dispatch(ActionId::LoadParameters, &mut dialogs);
    assert!(dialogs.errors.is_empty(), "{:?}", dialogs.errors);

    let form = ctrl.form();
    assert_eq!(form.value("invert-colors"), Some(&ParamValue::Flag(false)));
    assert_eq!(form.value("publication-figure"), Some(&ParamValue::Flag(true)));
    assert_eq!(form.value("threads"), Some(&ParamValue::Text("2".into())));
    assert_eq!(form.value("colormap"), Some(&ParamValue::Text("Dark2".into())));
    assert_eq!(form.value(OUTDIR_KEY), Some(&ParamValue::Text("/tmp/run one".into())));
}

#[test]
fn load_failure_is_reported_once() {
    let mut ctrl = controller();
    let before = ctrl.form().clone();
    let mut dialogs = FakeDialogs {
        open: Some(PathBuf::from("missing.toml")),
        ..Default::default()
    };
    ctrl.dispatch(ActionId::LoadParameters, &mut dialogs);
    assert_eq!(dialogs.errors.len(), 1);
    assert!(dialogs.errors[0].contains("missing.toml"), "{:?}", dialogs.errors);
    assert_eq!(ctrl.form(), &before);
}

#[test]
fn save_writes_visible_values_in_form_order() {
    let mut ctrl = controller();
    let path = PathBuf::from("out.toml");
    let mut dialogs = FakeDialogs {
        save: Some(path.clone()),
        ..Default::default()
    };
    ctrl.dispatch(ActionId::SaveParameters, &mut dialogs);

    let files = ctrl.store().files.borrow();
    let saved = files.get(&path).expect("saved parameters");
    let keys: Vec<&str> = saved.keys().collect();
    assert_eq!(&keys[..4], &[USER_KEY, HOST_KEY, PORT_KEY, PROGRAM_KEY]);
    assert_eq!(keys.len(), 4 + Mode::Basic.job_keys().len());
    assert!(!saved.contains_key("threads"));
}

#[test]
fn submit_runs_chain_in_remote_root_and_closes() {
    let mut ctrl = controller();
    let mut dialogs = submit_dialogs();
    ctrl.dispatch(ActionId::Submit, &mut dialogs);

    assert!(dialogs.errors.is_empty(), "{:?}", dialogs.errors);
    assert_eq!(dialogs.infos, vec!["Job submitted!".to_string()]);

    let log = ctrl.connector().log.borrow();
    assert_eq!(log.connects.len(), 1);
    let params = &log.connects[0];
    assert_eq!(params.host, "10.0.0.5");
    assert_eq!(params.user, "alice");
    assert_eq!(params.port, 22);
    assert_eq!(params.password, "hunter2");

    let (cwd, command) = &log.runs[0];
    assert_eq!(cwd, "~/RNAapp");
    assert!(command.starts_with("mkdir -p \"/tmp/run one\" && cp \"sample-info-table.csv\" \"/tmp/run one/\" && echo \"source .bash_profile && python analysis.py "), "{command}");
    assert!(command.contains("2>&1 | tee /tmp/run one/progress.txt\" > \"/tmp/run one/command.txt\""), "{command}");
    assert!(command.ends_with("screen -dm -S run_one bash \"/tmp/run one/command.txt\""), "{command}");
    assert_eq!(log.closed, 1);
}

#[test]
fn non_zero_remote_exit_is_reported_as_one_error() {
    let mut ctrl = controller_with(FakeConnector {
        exit_status: Cell::new(1),
        output: "cp: cannot stat 'sample-info-table.csv': No such file or directory\n",
        ..Default::default()
    });
    let mut dialogs = submit_dialogs();
    ctrl.dispatch(ActionId::Submit, &mut dialogs);
    assert!(dialogs.infos.is_empty(), "{:?}", dialogs.infos);
    assert_eq!(dialogs.errors.len(), 1);
    assert!(
        dialogs.errors[0].starts_with("remote command exited with status 1: cp: cannot stat"),
        "{:?}",
        dialogs.errors
    );
    assert_eq!(ctrl.connector().log.borrow().closed, 1);
}

#[test]
fn failed_submit_after_a_successful_one_reports_only_the_failure() {
    let mut ctrl = controller();
    let mut dialogs = submit_dialogs();
    ctrl.dispatch(ActionId::Submit, &mut dialogs);
    assert_eq!(dialogs.infos, vec!["Job submitted!".to_string()]);

    ctrl.connector().exit_status.set(1);
    let mut dialogs = submit_dialogs();
    ctrl.dispatch(ActionId::Submit, &mut dialogs);
    assert!(dialogs.infos.is_empty(), "{:?}", dialogs.infos);
    assert_eq!(
        dialogs.errors,
        vec!["remote command exited with status 1".to_string()]
    );

    let log = ctrl.connector().log.borrow();
    assert_eq!(log.runs.len(), 2);
    assert_eq!(log.closed, 2);
}

#[test]
fn transport_failure_is_reported_and_connection_closed() {
    let mut ctrl = controller_with(FakeConnector {
        fail_run: true,
        ..Default::default()
    });
    let mut dialogs = submit_dialogs();
    ctrl.dispatch(ActionId::Submit, &mut dialogs);
    assert_eq!(dialogs.errors, vec!["ssh: channel closed".to_string()]);
    assert!(dialogs.infos.is_empty());
    assert_eq!(ctrl.connector().log.borrow().closed, 1);
}

#[test]
fn bad_port_is_reported_without_connecting() {
    let mut ctrl = controller();
    ctrl.form_mut()
        .set_value(PORT_KEY, ParamValue::Text("ssh".into()))
        .unwrap();
    let mut dialogs = submit_dialogs();
    ctrl.dispatch(ActionId::Submit, &mut dialogs);
    assert_eq!(dialogs.errors.len(), 1);
    assert!(dialogs.errors[0].starts_with("invalid Port 'ssh'"), "{:?}", dialogs.errors);
    assert!(ctrl.connector().log.borrow().connects.is_empty());
}

#[test]
fn registry_missing_handler_fails_fast() {
    let mut reg: ActionRegistry<MemStore, FakeConnector> = ActionRegistry::new();
    actions::BasicMode::register(&mut reg).unwrap();
    actions::AdvancedMode::register(&mut reg).unwrap();
    actions::LoadParameters::register(&mut reg).unwrap();
    actions::SaveParameters::register(&mut reg).unwrap();

    let err = Controller::with_registry(
        Settings::default(),
        MemStore::default(),
        FakeConnector::default(),
        reg,
    )
    .err()
    .expect("missing submit handler")
    .to_string();
    assert!(err.contains("'submit'"), "unexpected err: {err}");
}

#[test]
fn registry_rejects_duplicates() {
    let mut reg: ActionRegistry<MemStore, FakeConnector> = ActionRegistry::new();
    actions::Submit::register(&mut reg).unwrap();
    let err = actions::Submit::register(&mut reg).unwrap_err().to_string();
    assert!(err.contains("duplicate action handler: submit"), "unexpected err: {err}");
}
