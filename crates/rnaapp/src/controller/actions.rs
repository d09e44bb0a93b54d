use std::path::PathBuf;

use rnaapp_macros::Action;

use super::Controller;
use crate::error::Result;
use crate::paramfile::ParamStore;
use crate::params::{ActionId, Mode};
use crate::remote::{Connector, JobSubmitter};
use crate::ui::Dialogs;

pub const SUBMIT_CONFIRM: &str = "Are you sure you want to submit the job?";
pub const SUBMIT_DONE: &str = "Job submitted!";
pub const PASSWORD_LABEL: &str = "Password:";

fn non_empty_path(p: Option<PathBuf>) -> Option<PathBuf> {
    p.filter(|p| !p.as_os_str().is_empty())
}

fn switch_mode<S, C>(ctrl: &mut Controller<S, C>, mode: Mode) {
    let from = ctrl.form.mode();
    ctrl.form.set_mode(mode);
    tracing::info!(%from, to = %mode, "mode switched");
}

#[Action(id = ActionId::BasicMode)]
pub struct BasicMode;

impl BasicMode {
    fn run<S: ParamStore, C: Connector>(
        ctrl: &mut Controller<S, C>,
        _dialogs: &mut dyn Dialogs,
    ) -> Result<()> {
        switch_mode(ctrl, Mode::Basic);
        Ok(())
    }
}

#[Action(id = ActionId::AdvancedMode)]
pub struct AdvancedMode;

impl AdvancedMode {
    fn run<S: ParamStore, C: Connector>(
        ctrl: &mut Controller<S, C>,
        _dialogs: &mut dyn Dialogs,
    ) -> Result<()> {
        switch_mode(ctrl, Mode::Advanced);
        Ok(())
    }
}

#[Action(id = ActionId::LoadParameters)]
pub struct LoadParameters;

impl LoadParameters {
    fn run<S: ParamStore, C: Connector>(
        ctrl: &mut Controller<S, C>,
        dialogs: &mut dyn Dialogs,
    ) -> Result<()> {
        let Some(path) = non_empty_path(dialogs.pick_open_file("Open")) else {
            tracing::debug!("load cancelled");
            return Ok(());
        };
        let params = ctrl.store.read(&path)?;
        ctrl.form.apply_parameters(&params);
        tracing::info!(path = %path.display(), count = params.len(), "parameters loaded");
        Ok(())
    }
}

#[Action(id = ActionId::SaveParameters)]
pub struct SaveParameters;

impl SaveParameters {
    fn run<S: ParamStore, C: Connector>(
        ctrl: &mut Controller<S, C>,
        dialogs: &mut dyn Dialogs,
    ) -> Result<()> {
        let Some(path) = non_empty_path(dialogs.pick_save_file("Save As")) else {
            tracing::debug!("save cancelled");
            return Ok(());
        };
        let params = ctrl.form.key_values();
        ctrl.store.write(&path, &params)?;
        tracing::info!(path = %path.display(), count = params.len(), "parameters saved");
        Ok(())
    }
}

#[Action(id = ActionId::Submit)]
pub struct Submit;

impl Submit {
    fn run<S: ParamStore, C: Connector>(
        ctrl: &mut Controller<S, C>,
        dialogs: &mut dyn Dialogs,
    ) -> Result<()> {
        let Some(password) = dialogs
            .prompt_secret("Password", PASSWORD_LABEL)
            .filter(|p| !p.is_empty())
        else {
            tracing::debug!("submit cancelled at password prompt");
            return Ok(());
        };
        if !dialogs.confirm(" ", SUBMIT_CONFIRM) {
            tracing::debug!("submit declined");
            return Ok(());
        }

        JobSubmitter::new(&ctrl.connector, &ctrl.settings.remote).submit(&ctrl.form, &password)?;
        dialogs.info("Info", SUBMIT_DONE);
        Ok(())
    }
}
