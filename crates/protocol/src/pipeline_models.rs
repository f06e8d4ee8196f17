//! Pipeline definition models for `.px/pipelines/*.yaml`.
//!
//! A pipeline is an ordered list of process definitions. Each process names
//! an executable and declares the parameters it accepts, which the core
//! validates and renders into a command line before submission.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Validation applied to a parameter value before it is rendered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum ArgValidator {
    /// No whitespace and no path separators.
    #[default]
    Default,
    /// ASCII digits only.
    Digits,
    /// Parses as a signed integer.
    Integer,
    /// Parses as a floating point number.
    Float,
    /// A filesystem path: anything except tabs and line breaks.
    Path,
    /// Validation disabled.
    Off,
}

impl ArgValidator {
    /// Check `value` against this validator.
    pub fn is_valid(&self, value: &str) -> bool {
        match self {
            ArgValidator::Default => {
                !value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c == '/')
            }
            ArgValidator::Digits => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
            ArgValidator::Integer => value.parse::<i64>().is_ok(),
            ArgValidator::Float => value.parse::<f64>().is_ok(),
            ArgValidator::Path => !value.contains(['\t', '\r', '\n']),
            ArgValidator::Off => true,
        }
    }
}

/// How named options are rendered on the command line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum CommandLineFormat {
    /// `--long=value`, `-s value`, bare `--flag`.
    #[default]
    Posix,
    /// `name=value`.
    KeyValuePair,
}

/// A parameter declared by a process.
///
/// Identity covers every field: two parameters are equal only when their
/// names, kind, optionality, position and validator all match.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    /// Key under which task parameter values are supplied.
    pub name: String,

    /// Short option name, rendered as `-s value`.
    #[serde(default, rename = "short")]
    pub short_name: Option<String>,

    /// Long option name, rendered as `--long=value`.
    #[serde(default, rename = "long")]
    pub long_name: Option<String>,

    /// Boolean switch with no value on the command line.
    #[serde(default)]
    pub flag: bool,

    /// Whether the parameter may be left out.
    #[serde(default)]
    pub optional: bool,

    /// Position among the positional arguments. `None` for named options.
    #[serde(default)]
    pub index: Option<u32>,

    /// Output redirection target (`> value`).
    #[serde(default)]
    pub redirect: bool,

    #[serde(default)]
    pub validator: ArgValidator,
}

impl Parameter {
    /// A mandatory named option with the default validator.
    pub fn option(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            long_name: Some(name.clone()),
            name,
            short_name: None,
            flag: false,
            optional: false,
            index: None,
            redirect: false,
            validator: ArgValidator::Default,
        }
    }

    /// A mandatory positional argument at `index`.
    pub fn positional(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            short_name: None,
            long_name: None,
            flag: false,
            optional: false,
            index: Some(index),
            redirect: false,
            validator: ArgValidator::Path,
        }
    }

    /// An optional boolean switch.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            flag: true,
            optional: true,
            validator: ArgValidator::Off,
            ..Self::option(name)
        }
    }

    /// A redirection target for the process's stdout.
    pub fn redirection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_name: None,
            long_name: None,
            flag: false,
            optional: false,
            index: None,
            redirect: true,
            validator: ArgValidator::Path,
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short_name = Some(short.into());
        self
    }

    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long_name = Some(long.into());
        self
    }

    pub fn with_validator(mut self, validator: ArgValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// True for parameters that render as named options.
    pub fn is_option(&self) -> bool {
        self.index.is_none() && !self.redirect
    }
}

/// One executable step of a pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct ProcessDefinition {
    /// Unique name within the pipeline; also the key for pre-commands.
    pub name: String,

    /// Program to run.
    pub executable: String,

    /// Optional sub-command placed between the executable and its options.
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub format: CommandLineFormat,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Threads requested from the scheduler. 0 leaves the scheduler default.
    #[serde(default)]
    pub threads: u32,

    /// Memory requested from the scheduler in megabytes.
    #[serde(default)]
    pub memory_mb: u32,

    /// Commands appended after the process command.
    #[serde(default)]
    pub post_commands: Vec<String>,
}

impl ProcessDefinition {
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            mode: None,
            format: CommandLineFormat::Posix,
            parameters: Vec::new(),
            threads: 0,
            memory_mb: 0,
            post_commands: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// An ordered list of processes executed for a task.
///
/// # Example
///
/// ```yaml
/// name: align-reads
/// description: Index and align a read set
/// processes:
///   - name: index
///     executable: bowtie2-build
///     parameters:
///       - name: reference
///         index: 0
///         validator: path
///       - name: prefix
///         index: 1
///   - name: align
///     executable: bowtie2
///     threads: 8
///     memory-mb: 16000
///     parameters:
///       - name: prefix
///         short: x
///       - name: reads
///         short: U
///         validator: path
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct Pipeline {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub processes: Vec<ProcessDefinition>,
}

impl Pipeline {
    /// Every parameter declared by any process, deduplicated by name.
    pub fn all_parameters(&self) -> Vec<&Parameter> {
        let mut seen = Vec::<&Parameter>::new();
        for parameter in self.processes.iter().flat_map(|p| p.parameters.iter()) {
            if !seen.iter().any(|p| p.name == parameter.name) {
                seen.push(parameter);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validator_rejects_whitespace_and_slash() {
        assert!(ArgValidator::Default.is_valid("sample_1"));
        assert!(!ArgValidator::Default.is_valid("sample 1"));
        assert!(!ArgValidator::Default.is_valid("dir/file"));
        assert!(!ArgValidator::Default.is_valid(""));
    }

    #[test]
    fn test_numeric_validators() {
        assert!(ArgValidator::Digits.is_valid("0042"));
        assert!(!ArgValidator::Digits.is_valid("-42"));
        assert!(ArgValidator::Integer.is_valid("-42"));
        assert!(!ArgValidator::Integer.is_valid("4.2"));
        assert!(ArgValidator::Float.is_valid("4.2"));
        assert!(!ArgValidator::Float.is_valid("four"));
    }

    #[test]
    fn test_path_validator_allows_spaces_but_not_newlines() {
        assert!(ArgValidator::Path.is_valid("/data/my reads.fq"));
        assert!(!ArgValidator::Path.is_valid("a\nb"));
        assert!(ArgValidator::Off.is_valid("anything\tgoes"));
    }

    #[test]
    fn test_parameter_identity_covers_all_fields() {
        let a = Parameter::option("threads").with_validator(ArgValidator::Integer);
        let b = Parameter::option("threads").with_validator(ArgValidator::Integer);
        let c = Parameter::option("threads").with_validator(ArgValidator::Digits);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Parameter::option("threads").with_validator(ArgValidator::Integer).optional());
    }
}
