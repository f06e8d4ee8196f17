//! Ordered parameter values for one process invocation.

use crate::param::error::{ParamError, ParamResult};
use crate::param::format::OptionRenderer;
use px_protocol::pipeline_models::{CommandLineFormat, Parameter};
use std::collections::BTreeMap;

/// An insertion-ordered mapping from `Parameter` to its string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: Vec<(Parameter, String)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the values for `declared` parameters out of a task's value map.
    ///
    /// Values for names the process does not declare are ignored, since a
    /// task's values cover every process of its pipeline.
    pub fn from_values(declared: &[Parameter], values: &BTreeMap<String, String>) -> Self {
        let mut map = Self::new();
        for parameter in declared {
            if let Some(value) = values.get(&parameter.name) {
                map.insert(parameter.clone(), value.clone());
            }
        }
        map
    }

    /// Parse a rendered option string back into a map.
    pub fn parse_option_string(
        format: CommandLineFormat,
        declared: &[Parameter],
        text: &str,
    ) -> ParamResult<Self> {
        let mut map = Self::new();
        for (parameter, value) in format.parse(declared, text)? {
            map.insert(parameter.clone(), value);
        }
        Ok(map)
    }

    /// Set a value, replacing any previous value for the same parameter.
    pub fn insert(&mut self, parameter: Parameter, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(p, _)| *p == parameter) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((parameter, value)),
        }
    }

    pub fn get(&self, parameter: &Parameter) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == parameter)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Parameter, &str)> {
        self.entries.iter().map(|(p, v)| (p, v.as_str()))
    }

    /// Check this map against the parameters a process declares.
    ///
    /// Every mandatory parameter must have a value, every value must pass
    /// its validator, and at most one redirection may be present.
    pub fn validate(&self, declared: &[Parameter]) -> ParamResult<()> {
        for (parameter, _) in &self.entries {
            if !declared.contains(parameter) {
                return Err(ParamError::Undeclared(parameter.name.clone()));
            }
        }

        for parameter in declared {
            match self.get(parameter) {
                None if !parameter.optional => {
                    return Err(ParamError::MissingMandatory(parameter.name.clone()));
                }
                Some(value) if !parameter.validator.is_valid(value) => {
                    return Err(ParamError::InvalidValue {
                        name: parameter.name.clone(),
                        value: value.to_string(),
                    });
                }
                _ => {}
            }
        }

        self.redirection().map(|_| ())
    }

    /// Named options in insertion order.
    pub fn options(&self) -> Vec<(&Parameter, &str)> {
        self.iter().filter(|(p, _)| p.is_option()).collect()
    }

    /// Positional arguments sorted by index.
    pub fn arguments(&self) -> Vec<(&Parameter, &str)> {
        let mut arguments: Vec<(&Parameter, &str)> =
            self.iter().filter(|(p, _)| p.index.is_some()).collect();
        arguments.sort_by_key(|(p, _)| p.index);
        arguments
    }

    /// The single redirection target, if any.
    pub fn redirection(&self) -> ParamResult<Option<(&Parameter, &str)>> {
        let mut redirects = self.iter().filter(|(p, _)| p.redirect);
        let first = redirects.next();
        if let (Some((first, _)), Some((second, _))) = (first, redirects.next()) {
            return Err(ParamError::MultipleRedirections {
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }
        Ok(first)
    }

    /// Render the named options, skipping any whose name is in `exclusions`.
    pub fn build_option_string(&self, format: CommandLineFormat, exclusions: &[&str]) -> String {
        self.options()
            .into_iter()
            .filter(|(p, _)| !exclusions.contains(&p.name.as_str()))
            .filter_map(|(p, v)| format.render(p, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render the positional arguments in index order.
    pub fn build_argument_string(&self) -> String {
        self.arguments()
            .into_iter()
            .map(|(_, v)| v)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
