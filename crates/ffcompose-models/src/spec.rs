//! Declarative FFmpeg job requests.
//!
//! A [`JobSpec`] is the validated request the engine receives from the API
//! layer. It never contains a full command line; the argument vector is
//! derived deterministically by the command builder.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One input slot of a job.
///
/// Either a bare path/URL, or a list whose last element is the path and whose
/// preceding elements are flag tokens emitted immediately before that `-i`
/// (e.g. `["-loop", "1", "-t", "5", "intro.png"]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum InputSource {
    /// Plain input path or URL
    Path(String),
    /// Per-input flag tokens followed by the input path
    WithFlags(Vec<String>),
}

impl InputSource {
    /// The input path, i.e. the last element of a flag-list entry.
    pub fn path(&self) -> Option<&str> {
        match self {
            InputSource::Path(p) => Some(p.as_str()),
            InputSource::WithFlags(parts) => parts.last().map(String::as_str),
        }
    }
}

impl From<&str> for InputSource {
    fn from(s: &str) -> Self {
        InputSource::Path(s.to_string())
    }
}

impl From<String> for InputSource {
    fn from(s: String) -> Self {
        InputSource::Path(s)
    }
}

/// Value of a single `-key value` option, mirroring the JSON scalar the
/// caller supplied.
///
/// The command builder matches this exhaustively: `true` emits a bare flag,
/// `false` and `Null` emit nothing, lists repeat the flag per element, and
/// everything else is stringified. Nested lists are rejected at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<OptionValue>),
    Null,
}

impl OptionValue {
    /// Short type label used in build error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Float(_) => "float",
            OptionValue::Str(_) => "string",
            OptionValue::List(_) => "list",
            OptionValue::Null => "null",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for OptionValue {
    fn from(v: Vec<T>) -> Self {
        OptionValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A declarative FFmpeg job request.
///
/// Immutable once accepted; the options map preserves caller insertion order
/// because FFmpeg option order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSpec {
    /// Ordered input slots
    pub input_files: Vec<InputSource>,

    /// Output path, always the final command argument
    pub output_file: String,

    /// `-key value` options in caller order
    #[serde(default)]
    pub options: IndexMap<String, OptionValue>,

    /// Raw tokens emitted before any input
    #[serde(default)]
    pub global_options: Vec<String>,

    /// Completion callback endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl JobSpec {
    /// Create a spec with no inputs or options yet.
    pub fn new(output_file: impl Into<String>) -> Self {
        Self {
            input_files: Vec::new(),
            output_file: output_file.into(),
            options: IndexMap::new(),
            global_options: Vec::new(),
            webhook_url: None,
        }
    }

    /// Append a plain input path.
    pub fn with_input(mut self, path: impl Into<String>) -> Self {
        self.input_files.push(InputSource::Path(path.into()));
        self
    }

    /// Append an input with per-input flags; the path goes last.
    pub fn with_input_flags(mut self, parts: Vec<String>) -> Self {
        self.input_files.push(InputSource::WithFlags(parts));
        self
    }

    /// Append a `-key value` option, preserving insertion order.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Append a raw global token.
    pub fn with_global_option(mut self, token: impl Into<String>) -> Self {
        self.global_options.push(token.into());
        self
    }

    /// Set the completion webhook endpoint.
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }
}
