use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Value;

use crate::error::{Error, Result};
use crate::params::{Mode, ParamValue, ParameterSet, declaration};

pub const DEFAULT_SETTINGS_FILE: &str = "rnaapp.toml";
pub const SETTINGS_ENV: &str = "RNAAPP_CONFIG";

fn default_root_dir() -> String {
    "~/RNAapp".into()
}

fn default_bash_profile() -> String {
    ".bash_profile".into()
}

fn default_interpreter() -> String {
    "python".into()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Remote working directory every submit runs in.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
    /// Profile sourced right before the analysis command.
    #[serde(default = "default_bash_profile")]
    pub bash_profile: String,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            bash_profile: default_bash_profile(),
            interpreter: default_interpreter(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub mode: Mode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    remote: RemoteConfig,
    form: FormConfig,
    defaults: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub path: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub form: FormConfig,
    /// Overrides of the declared parameter defaults.
    pub defaults: ParameterSet,
}

impl Settings {
    pub fn from_value(path: Option<PathBuf>, value: Value) -> Result<Self> {
        let origin = path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<settings>".into());
        let raw: RawSettings = value
            .try_into()
            .map_err(|e| Error::msg(format!("invalid settings in {origin}: {e}")))?;
        let defaults = parse_defaults(&raw.defaults, &origin)?;
        Ok(Self {
            path,
            remote: raw.remote,
            form: raw.form,
            defaults,
        })
    }

    /// Applies `RNAAPP_*` overrides through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(v) = get("RNAAPP_REMOTE_ROOT_DIR") {
            self.remote.root_dir = v;
        }
        if let Some(v) = get("RNAAPP_INTERPRETER") {
            self.remote.interpreter = v;
        }
    }
}

fn parse_defaults(table: &toml::Table, origin: &str) -> Result<ParameterSet> {
    let mut out = ParameterSet::new();
    for (key, value) in table {
        let Some(decl) = declaration(key) else {
            return Err(Error::msg(format!(
                "unknown parameter '{key}' in [defaults] of {origin}"
            )));
        };
        let v = match (decl.is_flag(), value) {
            (true, Value::Boolean(b)) => ParamValue::Flag(*b),
            (true, _) => {
                return Err(Error::msg(format!(
                    "[defaults].{key} in {origin} must be a boolean"
                )));
            }
            (false, Value::String(s)) => ParamValue::Text(s.clone()),
            (false, Value::Integer(i)) => ParamValue::Text(i.to_string()),
            (false, Value::Float(f)) => ParamValue::Text(f.to_string()),
            (false, _) => {
                return Err(Error::msg(format!(
                    "[defaults].{key} in {origin} must be a string or number"
                )));
            }
        };
        out.insert(key.clone(), v);
    }
    Ok(out)
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "settings extends cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read settings {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(ext) = value.get("extends").and_then(Value::as_str) {
        let base_path = resolve_ref_path(path, ext);
        out = load_value_inner(&base_path, stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }

    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn load(path: &Path) -> Result<Settings> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    Settings::from_value(Some(path.to_path_buf()), value)
}

/// Resolves the settings file: explicit path, then `RNAAPP_CONFIG`, then
/// `./rnaapp.toml` when present. Falls back to builtin defaults.
pub fn discover(explicit: Option<&Path>) -> Result<Settings> {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| {
            std::env::var(SETTINGS_ENV)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| {
            let p = PathBuf::from(DEFAULT_SETTINGS_FILE);
            p.exists().then_some(p)
        });

    let mut settings = match candidate {
        Some(p) => {
            tracing::debug!(path = %p.display(), "loading settings");
            load(&p)?
        }
        None => Settings::default(),
    };
    settings.apply_overrides(|k| std::env::var(k).ok());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_str(raw: &str) -> Result<Settings> {
        let value: Value = toml::from_str(raw).expect("parse toml");
        Settings::from_value(None, value)
    }

    #[test]
    fn empty_settings_use_builtin_defaults() {
        let s = from_str("").unwrap();
        assert_eq!(s.remote.root_dir, "~/RNAapp");
        assert_eq!(s.remote.bash_profile, ".bash_profile");
        assert_eq!(s.remote.interpreter, "python");
        assert_eq!(s.form.mode, Mode::Basic);
        assert!(s.defaults.is_empty());
    }

    #[test]
    fn parses_remote_form_and_defaults() {
        let s = from_str(
            r#"
[remote]
root_dir = "/srv/rna"

[form]
mode = "advanced"

[defaults]
User = "alice"
Port = 2222
invert-colors = true
"#,
        )
        .unwrap();
        assert_eq!(s.remote.root_dir, "/srv/rna");
        assert_eq!(s.remote.interpreter, "python");
        assert_eq!(s.form.mode, Mode::Advanced);
        assert_eq!(s.defaults.get("User"), Some(&ParamValue::Text("alice".into())));
        assert_eq!(s.defaults.get("Port"), Some(&ParamValue::Text("2222".into())));
        assert_eq!(s.defaults.get("invert-colors"), Some(&ParamValue::Flag(true)));
    }

    #[test]
    fn rejects_unknown_default_key() {
        let err = from_str("[defaults]\nnope = \"x\"\n").unwrap_err().to_string();
        assert!(err.contains("unknown parameter 'nope'"), "unexpected err: {err}");
    }

    #[test]
    fn rejects_non_bool_flag_default() {
        let err = from_str("[defaults]\ninvert-colors = \"yes\"\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("must be a boolean"), "unexpected err: {err}");
    }

    #[test]
    fn overrides_replace_remote_values() {
        let mut s = Settings::default();
        s.apply_overrides(|k| match k {
            "RNAAPP_REMOTE_ROOT_DIR" => Some("/data/jobs".into()),
            "RNAAPP_INTERPRETER" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(s.remote.root_dir, "/data/jobs");
        assert_eq!(s.remote.interpreter, "python");
    }

    #[test]
    fn merge_overlays_nested_tables() {
        let mut base: Value = toml::from_str("[remote]\nroot_dir = \"a\"\ninterpreter = \"python3\"\n").unwrap();
        let overlay: Value = toml::from_str("[remote]\nroot_dir = \"b\"\n").unwrap();
        merge_values(&mut base, overlay);
        assert_eq!(base["remote"]["root_dir"].as_str(), Some("b"));
        assert_eq!(base["remote"]["interpreter"].as_str(), Some("python3"));
    }
}
