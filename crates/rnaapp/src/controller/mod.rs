pub mod actions;

use std::collections::BTreeMap;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::form::FormState;
use crate::paramfile::ParamStore;
use crate::params::{ActionId, Mode};
use crate::remote::Connector;
use crate::ui::Dialogs;

pub type ActionFn<S, C> = fn(&mut Controller<S, C>, &mut dyn Dialogs);

pub struct ActionRegistry<S, C> {
    handlers: BTreeMap<ActionId, ActionFn<S, C>>,
}

impl<S, C> Default for ActionRegistry<S, C> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<S, C> ActionRegistry<S, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ActionId, handler: ActionFn<S, C>) -> Result<()> {
        if self.handlers.contains_key(&id) {
            return Err(Error::msg(format!("duplicate action handler: {id}")));
        }
        self.handlers.insert(id, handler);
        Ok(())
    }

    pub fn get(&self, id: ActionId) -> Option<ActionFn<S, C>> {
        self.handlers.get(&id).copied()
    }

    /// Every button of every mode needs a handler.
    pub fn validate(&self) -> Result<()> {
        for mode in Mode::ALL {
            for id in mode.buttons() {
                if !self.handlers.contains_key(id) {
                    return Err(Error::msg(format!(
                        "no handler registered for action '{id}' (button of {mode} mode)"
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn builtin_registry<S, C>() -> Result<ActionRegistry<S, C>>
where
    S: ParamStore,
    C: Connector,
{
    let mut reg = ActionRegistry::new();
    actions::BasicMode::register(&mut reg)?;
    actions::AdvancedMode::register(&mut reg)?;
    actions::LoadParameters::register(&mut reg)?;
    actions::SaveParameters::register(&mut reg)?;
    actions::Submit::register(&mut reg)?;
    Ok(reg)
}

/// Owns the form state and routes each button to its action.
pub struct Controller<S, C> {
    form: FormState,
    store: S,
    connector: C,
    settings: Settings,
    registry: ActionRegistry<S, C>,
}

impl<S, C> Controller<S, C>
where
    S: ParamStore,
    C: Connector,
{
    pub fn new(settings: Settings, store: S, connector: C) -> Result<Self> {
        Self::with_registry(settings, store, connector, builtin_registry()?)
    }

    /// Fails when `registry` misses a handler for any button.
    pub fn with_registry(
        settings: Settings,
        store: S,
        connector: C,
        registry: ActionRegistry<S, C>,
    ) -> Result<Self> {
        registry.validate()?;
        let form = FormState::with_defaults(settings.form.mode, &settings.defaults)?;
        tracing::debug!(mode = %form.mode(), "controller ready");
        Ok(Self {
            form,
            store,
            connector,
            settings,
            registry,
        })
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mode(&self) -> Mode {
        self.form.mode()
    }

    pub fn buttons(&self) -> &'static [ActionId] {
        self.form.mode().buttons()
    }

    /// Runs the action behind a visible button. Returns `false` when the
    /// action is not a button of the current mode.
    pub fn dispatch(&mut self, id: ActionId, dialogs: &mut dyn Dialogs) -> bool {
        if !self.buttons().contains(&id) {
            tracing::warn!(action = %id, mode = %self.mode(), "action is not wired in this mode");
            return false;
        }
        let Some(handler) = self.registry.get(id) else {
            tracing::warn!(action = %id, "no handler for action");
            return false;
        };
        handler(self, dialogs);
        true
    }
}
