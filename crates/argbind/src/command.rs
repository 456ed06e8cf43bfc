//! Explicit command schemas: raw parameter descriptors plus a handler.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::app::Invocation;
use crate::error::{Error, Result};
use crate::group::GroupRef;
use crate::parameter::Parameter;
use crate::shape::TypeShape;
use crate::value::Value;

/// How a parameter may be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Only by position; displayed upper-case, never matched as an option.
    PositionalOnly,
    /// By position or by `--name`.
    PositionalOrKeyword,
    /// Only by `--name`.
    KeywordOnly,
    /// Collects remaining positional tokens into a tuple.
    VarPositional,
    /// Collects unmatched `--key value` pairs into a map.
    VarKeyword,
}

impl ParamKind {
    pub fn is_variadic(self) -> bool {
        matches!(self, Self::VarPositional | Self::VarKeyword)
    }

    /// Kinds that can receive bare positional tokens.
    pub fn accepts_positional(self) -> bool {
        matches!(self, Self::PositionalOnly | Self::PositionalOrKeyword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PositionalOnly => "positional-only",
            Self::PositionalOrKeyword => "positional-or-keyword",
            Self::KeywordOnly => "keyword-only",
            Self::VarPositional => "var-positional",
            Self::VarKeyword => "var-keyword",
        }
    }
}

/// Raw descriptor of one command parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub shape: TypeShape,
    pub default: Option<Value>,
    /// Explicit configuration layers; later layers override earlier ones.
    pub annotations: Vec<Parameter>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            kind,
            shape,
            default: None,
            annotations: Vec::new(),
        }
    }

    pub fn positional_only(name: impl Into<String>, shape: TypeShape) -> Self {
        Self::new(name, ParamKind::PositionalOnly, shape)
    }

    pub fn positional(name: impl Into<String>, shape: TypeShape) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword, shape)
    }

    pub fn keyword(name: impl Into<String>, shape: TypeShape) -> Self {
        Self::new(name, ParamKind::KeywordOnly, shape)
    }

    /// Element shape; the bound value is a tuple of elements.
    pub fn var_positional(name: impl Into<String>, element: TypeShape) -> Self {
        Self::new(name, ParamKind::VarPositional, element)
    }

    /// Value shape; the bound value is a map of option key to value.
    pub fn var_keyword(name: impl Into<String>, value: TypeShape) -> Self {
        Self::new(name, ParamKind::VarKeyword, value)
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn annotate(mut self, layer: Parameter) -> Self {
        self.annotations.push(layer);
        self
    }
}

pub type Handler = Arc<dyn Fn(&Invocation<'_>) -> anyhow::Result<i32> + Send + Sync>;

/// A callable with an explicit parameter schema.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub help: String,
    pub params: Vec<ParamSpec>,
    pub default_parameter: Option<Parameter>,
    /// Per-field help text, the lowest-precedence help source.
    pub param_help: IndexMap<String, String>,
    pub aliases: Vec<String>,
    /// Group the command is listed under in its parent's help.
    pub group: Option<GroupRef>,
    pub show: bool,
    handler: Option<Handler>,
}

impl Command {
    /// `snake_case` names are registered as `kebab-case`.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: kebab_case(name.as_ref()),
            help: String::new(),
            params: Vec::new(),
            default_parameter: None,
            param_help: IndexMap::new(),
            aliases: Vec::new(),
            group: None,
            show: true,
            handler: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn with_default_parameter(mut self, parameter: Parameter) -> Self {
        self.default_parameter = Some(parameter);
        self
    }

    pub fn param_help(mut self, field: impl Into<String>, help: impl Into<String>) -> Self {
        self.param_help.insert(field.into(), help.into());
        self
    }

    pub fn alias(mut self, alias: impl AsRef<str>) -> Self {
        self.aliases.push(kebab_case(alias.as_ref()));
        self
    }

    pub fn group(mut self, group: impl Into<GroupRef>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show = false;
        self
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<i32> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    pub(crate) fn handler_fn(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// Schema-level checks run at registration.
    pub(crate) fn validate(&self) -> Result<()> {
        for (i, spec) in self.params.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(Error::config(format!(
                    "command \"{}\" has a parameter with an empty name",
                    self.name
                )));
            }
            if self.params[..i].iter().any(|p| p.name == spec.name) {
                return Err(Error::config(format!(
                    "command \"{}\" declares parameter \"{}\" twice",
                    self.name, spec.name
                )));
            }
        }
        for kind in [ParamKind::VarPositional, ParamKind::VarKeyword] {
            if self.params.iter().filter(|p| p.kind == kind).count() > 1 {
                return Err(Error::config(format!(
                    "command \"{}\" declares more than one {} parameter",
                    self.name,
                    kind.as_str()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("aliases", &self.aliases)
            .field("show", &self.show)
            .finish_non_exhaustive()
    }
}

/// `meta_cmd` -> `meta-cmd`, `MyFlag` -> `my-flag`.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for ch in name.trim().chars() {
        if ch == '_' {
            out.push('-');
            prev_lower = false;
        } else if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
