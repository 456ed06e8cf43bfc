//! Failure vocabulary shared by routing, resolution, binding and coercion.
//!
//! Every variant renders a stable single-line message, so callers can print
//! it verbatim (or assert on it) without re-deriving any parser state.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A leading token matched no registered command and the app has no default.
    #[error("Unknown command \"{token}\".{}", available_suffix(.available))]
    UnknownCommand {
        token: String,
        available: Vec<String>,
    },

    /// An option-shaped token matched no positive or negative parameter name.
    #[error("Unknown option: \"{token}\".")]
    UnknownOption { token: String },

    /// Every required parameter left unset after CLI, env and default lookup.
    #[error("{}", missing_message(.parameters))]
    MissingArgument { parameters: Vec<String> },

    /// Raw token(s) could not be converted into the declared type.
    #[error("{}", coercion_message(.parameter, .value, .attempted, .choices, .reason))]
    Coercion {
        parameter: Option<String>,
        value: String,
        attempted: Vec<String>,
        choices: Vec<String>,
        reason: Option<String>,
    },

    /// Too few (or, for fixed-arity targets, too many) tokens for a parameter.
    #[error("{}", arity_message(.parameter, .expected, .received))]
    Arity {
        parameter: Option<String>,
        expected: usize,
        received: usize,
    },

    #[error("Cannot assign value to negative flag \"{flag}\".")]
    NegativeFlagAssignment { flag: String },

    /// A validator rejected an already coerced value.
    #[error("Invalid value for \"{parameter}\": {reason}")]
    Validation { parameter: String, reason: String },

    /// Positional tokens left over with no variadic collector to take them.
    #[error("Unused tokens: {}.", quoted(.tokens))]
    Surplus { tokens: Vec<String> },

    /// Definition-time misconfiguration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The bound command's handler failed.
    #[error(transparent)]
    Command(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach the display name of the parameter being converted.
    ///
    /// The coercion engine works on shapes and tokens only; the binder knows
    /// which parameter it was converting and fills the name in afterwards.
    pub(crate) fn for_parameter(self, name: &str) -> Self {
        match self {
            Self::Coercion {
                parameter: None,
                value,
                attempted,
                choices,
                reason,
            } => Self::Coercion {
                parameter: Some(name.to_string()),
                value,
                attempted,
                choices,
                reason,
            },
            Self::Arity {
                parameter: None,
                expected,
                received,
            } => Self::Arity {
                parameter: Some(name.to_string()),
                expected,
                received,
            },
            other => other,
        }
    }

    /// Whether this error came from parsing user input (as opposed to a
    /// definition-time or handler failure).
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Command(_))
    }
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn available_suffix(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" Available commands: {}.", available.join(", "))
    }
}

fn missing_message(parameters: &[String]) -> String {
    if parameters.len() == 1 {
        format!("Missing required argument: {}.", quoted(parameters))
    } else {
        format!("Missing required arguments: {}.", quoted(parameters))
    }
}

fn coercion_message(
    parameter: &Option<String>,
    value: &str,
    attempted: &[String],
    choices: &[String],
    reason: &Option<String>,
) -> String {
    let mut out = format!("Invalid value \"{value}\"");
    if let Some(parameter) = parameter {
        out.push_str(&format!(" for \"{parameter}\""));
    }
    if let Some(reason) = reason {
        out.push_str(&format!(": {reason}."));
    } else if !choices.is_empty() && attempted.len() <= 1 {
        out.push_str(&format!(": choose from {}.", choices.join(", ")));
    } else if attempted.len() == 1 {
        out.push_str(&format!(": expected {}.", attempted[0]));
    } else {
        out.push_str(&format!(
            ": could not convert to any of {}.",
            attempted.join(", ")
        ));
    }
    out
}

fn arity_message(parameter: &Option<String>, expected: &usize, received: &usize) -> String {
    let noun = if *expected == 1 { "value" } else { "values" };
    match parameter {
        Some(p) => format!("Parameter \"{p}\" expects {expected} {noun}, got {received}."),
        None => format!("Expected {expected} {noun}, got {received}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_flag_message_is_exact() {
        let err = Error::NegativeFlagAssignment {
            flag: "--no-my-flag".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot assign value to negative flag \"--no-my-flag\"."
        );
    }

    #[test]
    fn missing_message_lists_every_parameter() {
        let one = Error::MissingArgument {
            parameters: vec!["--hostname".to_string()],
        };
        assert_eq!(one.to_string(), "Missing required argument: \"--hostname\".");

        let two = Error::MissingArgument {
            parameters: vec!["--a".to_string(), "B".to_string()],
        };
        assert_eq!(
            two.to_string(),
            "Missing required arguments: \"--a\", \"B\"."
        );
    }

    #[test]
    fn coercion_message_prefers_choices_for_single_type() {
        let err = Error::Coercion {
            parameter: None,
            value: "xml".to_string(),
            attempted: vec!["\"plain\" | \"json\"".to_string()],
            choices: vec!["plain".to_string(), "json".to_string()],
            reason: None,
        }
        .for_parameter("--format");
        assert_eq!(
            err.to_string(),
            "Invalid value \"xml\" for \"--format\": choose from plain, json."
        );
    }

    #[test]
    fn coercion_message_names_all_union_members() {
        let err = Error::Coercion {
            parameter: Some("--n".to_string()),
            value: "x".to_string(),
            attempted: vec!["int".to_string(), "float".to_string()],
            choices: Vec::new(),
            reason: None,
        };
        assert_eq!(
            err.to_string(),
            "Invalid value \"x\" for \"--n\": could not convert to any of int, float."
        );
    }

    #[test]
    fn for_parameter_keeps_existing_name() {
        let err = Error::Arity {
            parameter: Some("--coords".to_string()),
            expected: 3,
            received: 2,
        }
        .for_parameter("--other");
        assert_eq!(
            err.to_string(),
            "Parameter \"--coords\" expects 3 values, got 2."
        );
    }

    #[test]
    fn unknown_command_lists_available() {
        let err = Error::UnknownCommand {
            token: "nope".to_string(),
            available: vec!["build".to_string(), "check".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown command \"nope\". Available commands: build, check."
        );
        assert!(err.is_user_error());
        assert!(!Error::config("x").is_user_error());
    }
}
