use std::fs;
use std::path::Path;

use toml::Value;

use crate::error::{Error, Result};
use crate::params::{ParamValue, ParameterSet};

/// Reads and writes flat parameter files.
pub trait ParamStore {
    fn read(&self, path: &Path) -> Result<ParameterSet>;
    fn write(&self, path: &Path, params: &ParameterSet) -> Result<()>;
}

/// Flat TOML parameter files: `key = "text"` and `flag = true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlParamFile;

impl ParamStore for TomlParamFile {
    fn read(&self, path: &Path) -> Result<ParameterSet> {
        let data = fs::read_to_string(path).map_err(|e| {
            Error::msg(format!("failed to read parameters {}: {e}", path.display()))
        })?;
        parse_params(&data, &path.display().to_string())
    }

    fn write(&self, path: &Path, params: &ParameterSet) -> Result<()> {
        let s = render_params(params)?;
        fs::write(path, s).map_err(|e| {
            Error::msg(format!("failed to write parameters {}: {e}", path.display()))
        })
    }
}

pub fn parse_params(data: &str, origin: &str) -> Result<ParameterSet> {
    let table: toml::Table = toml::from_str(data)
        .map_err(|e| Error::msg(format!("TOML parse error in {origin}: {e}")))?;

    let mut out = ParameterSet::new();
    for (key, value) in table {
        let v = match value {
            Value::String(s) => ParamValue::Text(s),
            Value::Boolean(b) => ParamValue::Flag(b),
            Value::Integer(i) => ParamValue::Text(i.to_string()),
            Value::Float(f) => ParamValue::Text(f.to_string()),
            Value::Datetime(d) => ParamValue::Text(d.to_string()),
            Value::Array(_) | Value::Table(_) => {
                return Err(Error::msg(format!(
                    "parameter '{key}' in {origin} must be a string or boolean"
                )));
            }
        };
        out.insert(key, v);
    }
    Ok(out)
}

/// Renders `params` in order. Flags that are off are left out: absence means off.
pub fn render_params(params: &ParameterSet) -> Result<String> {
    let mut table = toml::Table::new();
    for (key, value) in params.iter() {
        match value {
            ParamValue::Text(s) => {
                table.insert(key.to_string(), Value::String(s.clone()));
            }
            ParamValue::Flag(true) => {
                table.insert(key.to_string(), Value::Boolean(true));
            }
            ParamValue::Flag(false) => {}
        }
    }
    Ok(toml::to_string(&table)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strings_flags_and_numbers() {
        let got = parse_params(
            r#"
"RNA-Seq Analysis" = "analysis.py"
threads = 4
heatmap-read-fraction = 0.5
invert-colors = true
skip-deseq2-gsea = false
"#,
            "<mem>",
        )
        .unwrap();
        assert_eq!(
            got.get("RNA-Seq Analysis"),
            Some(&ParamValue::Text("analysis.py".into()))
        );
        assert_eq!(got.get("threads"), Some(&ParamValue::Text("4".into())));
        assert_eq!(
            got.get("heatmap-read-fraction"),
            Some(&ParamValue::Text("0.5".into()))
        );
        assert_eq!(got.get("invert-colors"), Some(&ParamValue::Flag(true)));
        assert_eq!(got.get("skip-deseq2-gsea"), Some(&ParamValue::Flag(false)));
    }

    #[test]
    fn rejects_nested_values() {
        let err = parse_params("colormap = [\"Set1\"]\n", "p.toml")
            .unwrap_err()
            .to_string();
        assert!(err.contains("'colormap' in p.toml"), "unexpected err: {err}");
    }

    #[test]
    fn render_omits_flags_that_are_off() {
        let params: ParameterSet = [
            ("outdir", ParamValue::Text("/tmp/run1".into())),
            ("invert-colors", ParamValue::Flag(false)),
            ("publication-figure", ParamValue::Flag(true)),
        ]
        .into_iter()
        .collect();
        let s = render_params(&params).unwrap();
        assert!(s.contains("outdir = \"/tmp/run1\""), "{s}");
        assert!(s.contains("publication-figure = true"), "{s}");
        assert!(!s.contains("invert-colors"), "{s}");
    }

    #[test]
    fn render_keeps_form_order() {
        let params: ParameterSet = [
            ("outdir", ParamValue::Text("o".into())),
            ("count-table", ParamValue::Text("c".into())),
        ]
        .into_iter()
        .collect();
        let s = render_params(&params).unwrap();
        let outdir = s.find("outdir").unwrap();
        let count = s.find("count-table").unwrap();
        assert!(outdir < count, "{s}");
    }
}
