//! Rendering of named options for each `CommandLineFormat`.

use crate::param::error::{ParamError, ParamResult};
use px_protocol::pipeline_models::{CommandLineFormat, Parameter};

/// Renders and parses named options in a particular command-line style.
pub trait OptionRenderer {
    /// Render one option, or `None` when it produces nothing (an unset flag).
    fn render(&self, parameter: &Parameter, value: &str) -> Option<String>;

    /// Split a rendered option string back into (parameter, value) pairs.
    ///
    /// Values are assumed not to contain whitespace.
    fn parse<'a>(
        &self,
        declared: &'a [Parameter],
        text: &str,
    ) -> ParamResult<Vec<(&'a Parameter, String)>>;
}

fn flag_is_set(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn key_name(parameter: &Parameter) -> &str {
    parameter
        .long_name
        .as_deref()
        .or(parameter.short_name.as_deref())
        .unwrap_or(&parameter.name)
}

impl OptionRenderer for CommandLineFormat {
    fn render(&self, parameter: &Parameter, value: &str) -> Option<String> {
        if parameter.flag && !flag_is_set(value) {
            return None;
        }

        match self {
            CommandLineFormat::Posix => {
                let rendered = match (&parameter.long_name, &parameter.short_name) {
                    (Some(long), _) if parameter.flag => format!("--{long}"),
                    (Some(long), _) => format!("--{long}={value}"),
                    (None, Some(short)) if parameter.flag => format!("-{short}"),
                    (None, Some(short)) => format!("-{short} {value}"),
                    (None, None) if parameter.flag => format!("--{}", parameter.name),
                    (None, None) => format!("--{}={value}", parameter.name),
                };
                Some(rendered)
            }
            CommandLineFormat::KeyValuePair => {
                if parameter.flag {
                    Some(key_name(parameter).to_string())
                } else {
                    Some(format!("{}={value}", key_name(parameter)))
                }
            }
        }
    }

    fn parse<'a>(
        &self,
        declared: &'a [Parameter],
        text: &str,
    ) -> ParamResult<Vec<(&'a Parameter, String)>> {
        let options: Vec<&Parameter> = declared.iter().filter(|p| p.is_option()).collect();
        let mut parsed = Vec::new();
        let mut tokens = text.split_whitespace();

        while let Some(token) = tokens.next() {
            match self {
                CommandLineFormat::Posix => {
                    if let Some(body) = token.strip_prefix("--") {
                        let (name, value) = match body.split_once('=') {
                            Some((name, value)) => (name, Some(value)),
                            None => (body, None),
                        };
                        let parameter = options
                            .iter()
                            .find(|p| p.long_name.as_deref().unwrap_or(&p.name) == name)
                            .ok_or_else(|| ParamError::Unparseable(token.to_string()))?;
                        let value = match value {
                            Some(v) => v.to_string(),
                            None if parameter.flag => "true".to_string(),
                            None => return Err(ParamError::Unparseable(token.to_string())),
                        };
                        parsed.push((*parameter, value));
                    } else if let Some(short) = token.strip_prefix('-') {
                        let parameter = options
                            .iter()
                            .find(|p| p.long_name.is_none() && p.short_name.as_deref() == Some(short))
                            .ok_or_else(|| ParamError::Unparseable(token.to_string()))?;
                        let value = if parameter.flag {
                            "true".to_string()
                        } else {
                            tokens
                                .next()
                                .ok_or_else(|| ParamError::Unparseable(token.to_string()))?
                                .to_string()
                        };
                        parsed.push((*parameter, value));
                    } else {
                        return Err(ParamError::Unparseable(token.to_string()));
                    }
                }
                CommandLineFormat::KeyValuePair => {
                    let (name, value) = match token.split_once('=') {
                        Some((name, value)) => (name, Some(value)),
                        None => (token, None),
                    };
                    let parameter = options
                        .iter()
                        .find(|p| key_name(p) == name)
                        .ok_or_else(|| ParamError::Unparseable(token.to_string()))?;
                    let value = match value {
                        Some(v) => v.to_string(),
                        None if parameter.flag => "true".to_string(),
                        None => return Err(ParamError::Unparseable(token.to_string())),
                    };
                    parsed.push((*parameter, value));
                }
            }
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use px_protocol::pipeline_models::ArgValidator;

    #[test]
    fn test_posix_long_and_short() {
        let long = Parameter::option("threads").with_validator(ArgValidator::Integer);
        let short = Parameter::option("x").with_short("x");
        let short = Parameter {
            long_name: None,
            ..short
        };

        assert_eq!(
            CommandLineFormat::Posix.render(&long, "4").as_deref(),
            Some("--threads=4")
        );
        assert_eq!(
            CommandLineFormat::Posix.render(&short, "idx").as_deref(),
            Some("-x idx")
        );
    }

    #[test]
    fn test_flags_render_only_when_set() {
        let flag = Parameter::flag("verbose");
        assert_eq!(
            CommandLineFormat::Posix.render(&flag, "true").as_deref(),
            Some("--verbose")
        );
        assert_eq!(CommandLineFormat::Posix.render(&flag, "false"), None);
        assert_eq!(
            CommandLineFormat::KeyValuePair.render(&flag, "TRUE").as_deref(),
            Some("verbose")
        );
    }

    #[test]
    fn test_key_value_pair() {
        let p = Parameter::option("INPUT");
        assert_eq!(
            CommandLineFormat::KeyValuePair.render(&p, "reads.bam").as_deref(),
            Some("INPUT=reads.bam")
        );
    }

    #[test]
    fn test_parse_rejects_unknown_option() {
        let declared = vec![Parameter::option("threads")];
        let err = CommandLineFormat::Posix
            .parse(&declared, "--memory=4")
            .unwrap_err();
        assert_eq!(err, ParamError::Unparseable("--memory=4".to_string()));
    }
}
