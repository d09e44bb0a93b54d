use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const USER_KEY: &str = "User";
pub const HOST_KEY: &str = "Host";
pub const PORT_KEY: &str = "Port";
/// Connection key whose value is the path of the remote analysis program.
pub const PROGRAM_KEY: &str = "RNA-Seq Analysis";
pub const OUTDIR_KEY: &str = "outdir";
pub const SAMPLE_INFO_KEY: &str = "sample-info-table";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Flag(bool),
}

impl ParamValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(b) => Some(*b),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{s}"),
            ParamValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Editable text with suggested choices; the first choice is the default.
    Text { choices: &'static [&'static str] },
    Flag { default: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDecl {
    pub key: &'static str,
    pub kind: ParamKind,
}

impl ParamDecl {
    const fn text(key: &'static str, choices: &'static [&'static str]) -> Self {
        Self {
            key,
            kind: ParamKind::Text { choices },
        }
    }

    const fn flag(key: &'static str) -> Self {
        Self {
            key,
            kind: ParamKind::Flag { default: false },
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self.kind, ParamKind::Flag { .. })
    }

    pub fn choices(&self) -> &'static [&'static str] {
        match self.kind {
            ParamKind::Text { choices } => choices,
            ParamKind::Flag { .. } => &[],
        }
    }

    pub fn default_value(&self) -> ParamValue {
        match self.kind {
            ParamKind::Text { choices } => {
                ParamValue::Text(choices.first().copied().unwrap_or_default().to_string())
            }
            ParamKind::Flag { default } => ParamValue::Flag(default),
        }
    }
}

pub static DECLARATIONS: &[ParamDecl] = &[
    ParamDecl::text(USER_KEY, &[""]),
    ParamDecl::text(HOST_KEY, &["255.255.255.255"]),
    ParamDecl::text(PORT_KEY, &["22"]),
    ParamDecl::text(PROGRAM_KEY, &["rna_seq_analysis-1.1.2"]),
    ParamDecl::text("count-table", &["count-table.csv"]),
    ParamDecl::text(SAMPLE_INFO_KEY, &["sample-info-table.csv"]),
    ParamDecl::text("gene-info-table", &["gene-info-table.csv"]),
    ParamDecl::text(OUTDIR_KEY, &["outdir"]),
    ParamDecl::text("gene-sets-gmt", &["None"]),
    ParamDecl::text("gene-length-column", &["gene_length"]),
    ParamDecl::text("gene-name-column", &["gene_name"]),
    ParamDecl::text("gene-description-column", &["None", "gene_description"]),
    ParamDecl::text("heatmap-read-fraction", &["0.8"]),
    ParamDecl::text("sample-group-column", &["group"]),
    ParamDecl::text("control-group-name", &["normal"]),
    ParamDecl::text("experimental-group-name", &["tumor"]),
    ParamDecl::text("sample-batch-column", &["None", "batch"]),
    ParamDecl::flag("skip-deseq2-gsea"),
    ParamDecl::text("volcano-plot-label-genes", &["None"]),
    ParamDecl::text("gsea-input", &["deseq2", "tpm"]),
    ParamDecl::text("gsea-gene-name-keywords", &["None"]),
    ParamDecl::text("gsea-gene-set-name-keywords", &["None"]),
    ParamDecl::text(
        "colormap",
        &[
            "Set1", "Set2", "Set3", "tab10", "tab20", "tab20b", "tab20c", "Pastel1", "Pastel2",
            "Paired", "Accent", "Dark2",
        ],
    ),
    ParamDecl::flag("invert-colors"),
    ParamDecl::flag("publication-figure"),
    ParamDecl::text("threads", &["1", "2", "4"]),
];

pub fn declaration(key: &str) -> Option<&'static ParamDecl> {
    DECLARATIONS.iter().find(|d| d.key == key)
}

const CONNECTION_KEYS: &[&str] = &[USER_KEY, HOST_KEY, PORT_KEY, PROGRAM_KEY];

const BASIC_JOB_KEYS: &[&str] = &[
    "count-table",
    SAMPLE_INFO_KEY,
    "gene-info-table",
    OUTDIR_KEY,
    "gene-sets-gmt",
    "control-group-name",
    "experimental-group-name",
];

const ADVANCED_JOB_KEYS: &[&str] = &[
    "count-table",
    SAMPLE_INFO_KEY,
    "gene-info-table",
    OUTDIR_KEY,
    "gene-sets-gmt",
    "gene-length-column",
    "gene-name-column",
    "gene-description-column",
    "heatmap-read-fraction",
    "sample-group-column",
    "control-group-name",
    "experimental-group-name",
    "sample-batch-column",
    "skip-deseq2-gsea",
    "volcano-plot-label-genes",
    "gsea-input",
    "gsea-gene-name-keywords",
    "gsea-gene-set-name-keywords",
    "colormap",
    "invert-colors",
    "publication-figure",
    "threads",
];

const BASIC_BUTTONS: &[ActionId] = &[
    ActionId::AdvancedMode,
    ActionId::LoadParameters,
    ActionId::SaveParameters,
    ActionId::Submit,
];

const ADVANCED_BUTTONS: &[ActionId] = &[
    ActionId::BasicMode,
    ActionId::LoadParameters,
    ActionId::SaveParameters,
    ActionId::Submit,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Basic,
    Advanced,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Basic, Mode::Advanced];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Basic => "basic",
            Mode::Advanced => "advanced",
        }
    }

    pub fn connection_keys(self) -> &'static [&'static str] {
        CONNECTION_KEYS
    }

    pub fn job_keys(self) -> &'static [&'static str] {
        match self {
            Mode::Basic => BASIC_JOB_KEYS,
            Mode::Advanced => ADVANCED_JOB_KEYS,
        }
    }

    pub fn buttons(self) -> &'static [ActionId] {
        match self {
            Mode::Basic => BASIC_BUTTONS,
            Mode::Advanced => ADVANCED_BUTTONS,
        }
    }

    pub fn is_visible(self, key: &str) -> bool {
        self.connection_keys().contains(&key) || self.job_keys().contains(&key)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection keys and job keys visible in `mode`.
pub fn visible_keys(mode: Mode) -> (&'static [&'static str], &'static [&'static str]) {
    (mode.connection_keys(), mode.job_keys())
}

pub fn visible_buttons(mode: Mode) -> &'static [ActionId] {
    mode.buttons()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionId {
    BasicMode,
    AdvancedMode,
    LoadParameters,
    SaveParameters,
    Submit,
}

impl ActionId {
    pub const ALL: [ActionId; 5] = [
        ActionId::BasicMode,
        ActionId::AdvancedMode,
        ActionId::LoadParameters,
        ActionId::SaveParameters,
        ActionId::Submit,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ActionId::BasicMode => "basic_mode",
            ActionId::AdvancedMode => "advanced_mode",
            ActionId::LoadParameters => "load_parameters",
            ActionId::SaveParameters => "save_parameters",
            ActionId::Submit => "submit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionId::BasicMode => "Basic Mode",
            ActionId::AdvancedMode => "Advanced Mode",
            ActionId::LoadParameters => "Load Parameters",
            ActionId::SaveParameters => "Save Parameters",
            ActionId::Submit => "Submit",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered key/value pairs read from the form or a parameter file.
///
/// Iteration follows insertion order, which is what the command builder
/// relies on for argument order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn require_text(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(ParamValue::Text(s)) => Ok(s),
            Some(ParamValue::Flag(_)) => Err(Error::msg(format!(
                "parameter '{key}' must be text, got a flag"
            ))),
            None => Err(Error::msg(format!("missing required parameter '{key}'"))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, ParamValue)>>(iter: I) -> Self {
        let mut out = ParameterSet::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}
