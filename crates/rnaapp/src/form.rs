use crate::error::{Error, Result};
use crate::params::{DECLARATIONS, Mode, ParamDecl, ParamValue, ParameterSet, declaration};

/// Values for every declared parameter plus the active mode.
///
/// The mode only decides which values are visible; switching it never touches
/// a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    mode: Mode,
    values: Vec<ParamValue>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl FormState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            values: DECLARATIONS.iter().map(ParamDecl::default_value).collect(),
        }
    }

    /// Builds a form whose defaults are overridden by `defaults` (from settings).
    pub fn with_defaults(mode: Mode, defaults: &ParameterSet) -> Result<Self> {
        let mut form = Self::new(mode);
        for (key, value) in defaults.iter() {
            form.set_value(key, value.clone())?;
        }
        Ok(form)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn index_of(key: &str) -> Option<usize> {
        DECLARATIONS.iter().position(|d| d.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&ParamValue> {
        Self::index_of(key).and_then(|i| self.values.get(i))
    }

    pub fn set_value(&mut self, key: &str, value: ParamValue) -> Result<()> {
        let Some(idx) = Self::index_of(key) else {
            return Err(Error::msg(format!("unknown parameter '{key}'")));
        };
        let decl = &DECLARATIONS[idx];
        match (&value, decl.is_flag()) {
            (ParamValue::Flag(_), true) | (ParamValue::Text(_), false) => {}
            (ParamValue::Text(_), true) => {
                return Err(Error::msg(format!("parameter '{key}' is a flag, not text")));
            }
            (ParamValue::Flag(_), false) => {
                return Err(Error::msg(format!("parameter '{key}' is text, not a flag")));
            }
        }
        self.values[idx] = value;
        Ok(())
    }

    pub fn toggle_flag(&mut self, key: &str) -> Result<bool> {
        match self.value(key) {
            Some(ParamValue::Flag(b)) => {
                let next = !*b;
                self.set_value(key, ParamValue::Flag(next))?;
                Ok(next)
            }
            Some(ParamValue::Text(_)) => {
                Err(Error::msg(format!("parameter '{key}' is not a flag")))
            }
            None => Err(Error::msg(format!("unknown parameter '{key}'"))),
        }
    }

    /// Visible fields in declaration order.
    pub fn visible_fields(&self) -> impl Iterator<Item = (&'static ParamDecl, &ParamValue)> {
        let mode = self.mode;
        DECLARATIONS
            .iter()
            .zip(self.values.iter())
            .filter(move |(d, _)| mode.is_visible(d.key))
    }

    fn collect(&self, keys: &[&str]) -> ParameterSet {
        DECLARATIONS
            .iter()
            .zip(self.values.iter())
            .filter(|(d, _)| keys.contains(&d.key))
            .map(|(d, v)| (d.key, v.clone()))
            .collect()
    }

    /// Connection and job values visible in the current mode.
    pub fn key_values(&self) -> ParameterSet {
        let mut keys = self.mode.connection_keys().to_vec();
        keys.extend_from_slice(self.mode.job_keys());
        self.collect(&keys)
    }

    pub fn connection_key_values(&self) -> ParameterSet {
        self.collect(self.mode.connection_keys())
    }

    pub fn job_key_values(&self) -> ParameterSet {
        self.collect(self.mode.job_keys())
    }

    /// Applies loaded parameters to the visible fields.
    ///
    /// Every visible flag is cleared first: a flag missing from `params` is off,
    /// and a flag present in `params` is on whatever its stored value. Visible
    /// text fields missing from `params` keep their value. Hidden fields and
    /// unknown keys are left alone.
    pub fn apply_parameters(&mut self, params: &ParameterSet) {
        let mode = self.mode;
        for (decl, value) in DECLARATIONS.iter().zip(self.values.iter_mut()) {
            if mode.is_visible(decl.key) && decl.is_flag() {
                *value = ParamValue::Flag(false);
            }
        }

        for (decl, value) in DECLARATIONS.iter().zip(self.values.iter_mut()) {
            if !mode.is_visible(decl.key) {
                continue;
            }
            let Some(loaded) = params.get(decl.key) else {
                continue;
            };
            *value = if decl.is_flag() {
                ParamValue::Flag(true)
            } else {
                ParamValue::Text(loaded.to_string())
            };
        }

        let ignored: Vec<&str> = params
            .keys()
            .filter(|k| declaration(k).is_none_or(|d| !mode.is_visible(d.key)))
            .collect();
        if !ignored.is_empty() {
            tracing::debug!(mode = %mode, ?ignored, "parameters not visible in mode were ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{OUTDIR_KEY, PORT_KEY};

    #[test]
    fn new_form_uses_declared_defaults() {
        let form = FormState::new(Mode::Basic);
        assert_eq!(form.value(PORT_KEY), Some(&ParamValue::Text("22".into())));
        assert_eq!(
            form.value("skip-deseq2-gsea"),
            Some(&ParamValue::Flag(false))
        );
    }

    #[test]
    fn set_value_rejects_kind_mismatch() {
        let mut form = FormState::new(Mode::Advanced);
        assert!(form.set_value("invert-colors", ParamValue::Text("x".into())).is_err());
        assert!(form.set_value(OUTDIR_KEY, ParamValue::Flag(true)).is_err());
        assert!(form.set_value("nope", ParamValue::Flag(true)).is_err());
    }

    #[test]
    fn basic_mode_hides_advanced_only_fields() {
        let form = FormState::new(Mode::Basic);
        let visible: Vec<&str> = form.visible_fields().map(|(d, _)| d.key).collect();
        assert!(visible.contains(&OUTDIR_KEY));
        assert!(!visible.contains(&"threads"));
        assert!(!form.key_values().contains_key("threads"));
    }

    #[test]
    fn key_values_are_connection_then_job() {
        let form = FormState::new(Mode::Basic);
        let all: Vec<String> = form.key_values().keys().map(str::to_string).collect();
        let mut expected: Vec<String> = Mode::Basic
            .connection_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        expected.extend(Mode::Basic.job_keys().iter().map(|k| k.to_string()));
        assert_eq!(all, expected);
    }

    #[test]
    fn toggle_flag_flips_and_rejects_text() {
        let mut form = FormState::new(Mode::Advanced);
        assert!(form.toggle_flag("publication-figure").unwrap());
        assert!(!form.toggle_flag("publication-figure").unwrap());
        assert!(form.toggle_flag(OUTDIR_KEY).is_err());
    }

    #[test]
    fn apply_parameters_ignores_hidden_fields() {
        let mut form = FormState::new(Mode::Basic);
        let params: ParameterSet = [("threads", ParamValue::Text("4".into()))]
            .into_iter()
            .collect();
        form.apply_parameters(&params);
        assert_eq!(form.value("threads"), Some(&ParamValue::Text("1".into())));
    }
}
