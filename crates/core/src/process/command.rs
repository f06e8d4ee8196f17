//! Command-line assembly for one process invocation.

use crate::param::{ParamMap, ParamResult};
use crate::scheduler::args::ArgJoiner;
use px_protocol::pipeline_models::ProcessDefinition;
use std::collections::BTreeMap;

/// A process definition bound to its parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCommand {
    definition: ProcessDefinition,
    params: ParamMap,
    pre_commands: Vec<String>,
}

impl ProcessCommand {
    pub fn new(definition: ProcessDefinition, params: ParamMap) -> Self {
        Self {
            definition,
            params,
            pre_commands: Vec::new(),
        }
    }

    /// Bind the subset of a task's values this process declares.
    pub fn from_values(definition: ProcessDefinition, values: &BTreeMap<String, String>) -> Self {
        let params = ParamMap::from_values(&definition.parameters, values);
        Self::new(definition, params)
    }

    /// Run `pre_command` before every earlier pre-command.
    pub fn prepend_pre_command(&mut self, pre_command: impl Into<String>) {
        self.pre_commands.insert(0, pre_command.into());
    }

    pub fn add_pre_command(&mut self, pre_command: impl Into<String>) {
        self.pre_commands.push(pre_command.into());
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn executable(&self) -> &str {
        &self.definition.executable
    }

    pub fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// `executable [mode] <options> <arguments> [> redirect]`.
    ///
    /// Fails when the values do not satisfy the declared parameters.
    pub fn command(&self) -> ParamResult<String> {
        self.params.validate(&self.definition.parameters)?;

        let redirect = self
            .params
            .redirection()?
            .map(|(_, target)| format!("> {target}"))
            .unwrap_or_default();

        let mut joiner = ArgJoiner::new();
        joiner
            .push(&self.definition.executable)
            .push(self.definition.mode.as_deref().unwrap_or_default())
            .push(self.params.build_option_string(self.definition.format, &[]))
            .push(self.params.build_argument_string())
            .push(redirect);
        Ok(joiner.join(" "))
    }

    /// Pre-commands, the command with stderr folded into stdout, then the
    /// post-commands, separated by `; `.
    pub fn full_command(&self) -> ParamResult<String> {
        let mut joiner = ArgJoiner::new();
        for pre_command in &self.pre_commands {
            joiner.push(pre_command);
        }
        joiner.push(format!("{} 2>&1", self.command()?));
        for post_command in &self.definition.post_commands {
            joiner.push(post_command);
        }
        Ok(joiner.join("; "))
    }
}
