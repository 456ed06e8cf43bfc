//! Turns a command's raw descriptors and the stacked configuration layers
//! into concrete, fully-populated parameters.

use std::sync::Arc;

use crate::command::{Command, ParamKind, ParamSpec, kebab_case};
use crate::error::{Error, Result};
use crate::group::{Group, GroupRef, GroupRegistry, same_group};
use crate::parameter::{Converter, Parameter, Validator, normalize_long};
use crate::shape::TypeShape;
use crate::value::Value;

/// The enclosing configuration a command is resolved in.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    /// App chain `default_parameter`s, outermost first.
    pub app_defaults: Vec<&'a Parameter>,
    pub group_arguments: Arc<Group>,
    pub group_parameters: Arc<Group>,
}

impl Default for Scope<'_> {
    fn default() -> Self {
        Self {
            app_defaults: Vec::new(),
            group_arguments: Arc::new(Group::arguments()),
            group_parameters: Arc::new(Group::parameters()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedParameter {
    pub field: String,
    pub kind: ParamKind,
    pub shape: TypeShape,
    /// Positive names; the first is the display name.
    pub names: Vec<String>,
    pub negatives: Vec<String>,
    pub group: Arc<Group>,
    pub default: Option<Value>,
    pub required: bool,
    pub help: String,
    pub env_vars: Vec<String>,
    pub show: bool,
    pub show_default: bool,
    pub show_choices: bool,
    pub converter: Option<Converter>,
    pub validators: Vec<Validator>,
    pub parse: bool,
    pub allow_leading_hyphen: bool,
}

impl ResolvedParameter {
    pub fn display_name(&self) -> String {
        self.names
            .first()
            .cloned()
            .unwrap_or_else(|| self.field.to_uppercase())
    }

    /// Eligible to receive bare positional tokens.
    pub fn is_positional(&self) -> bool {
        self.kind.accepts_positional()
    }

    /// Positive names that can appear on the command line.
    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        let matchable = !matches!(
            self.kind,
            ParamKind::PositionalOnly | ParamKind::VarPositional | ParamKind::VarKeyword
        );
        self.names
            .iter()
            .filter(move |n| matchable && n.starts_with('-'))
            .map(String::as_str)
    }

    /// Zero-arity flag: a bare occurrence binds `true`.
    pub fn is_flag(&self) -> bool {
        self.converter.is_none() && self.shape.is_bool()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub parameters: Vec<ResolvedParameter>,
    /// Groups in first-occurrence order, each with its member indices.
    pub groups: Vec<(Arc<Group>, Vec<usize>)>,
}

impl ResolvedCommand {
    /// Match an option token; `true` for a positive name, `false` for a negative.
    pub fn find_option(&self, token: &str) -> Option<(usize, bool)> {
        self.parameters.iter().enumerate().find_map(|(i, p)| {
            if !p.parse {
                return None;
            }
            if p.option_names().any(|n| n == token) {
                Some((i, true))
            } else if p.negatives.iter().any(|n| n == token) {
                Some((i, false))
            } else {
                None
            }
        })
    }

    pub fn get(&self, field: &str) -> Option<&ResolvedParameter> {
        self.parameters.iter().find(|p| p.field == field)
    }

    pub fn var_positional(&self) -> Option<usize> {
        self.find_kind(ParamKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<usize> {
        self.find_kind(ParamKind::VarKeyword)
    }

    fn find_kind(&self, kind: ParamKind) -> Option<usize> {
        self.parameters
            .iter()
            .position(|p| p.parse && p.kind == kind)
    }
}

/// Resolve every parameter of `command` in declaration order.
pub fn resolve(command: &Command, scope: &Scope<'_>) -> Result<ResolvedCommand> {
    let mut registry = GroupRegistry::default();
    let explicit = command
        .params
        .iter()
        .flat_map(|spec| spec.annotations.iter())
        .chain(command.default_parameter.iter())
        .chain(scope.app_defaults.iter().copied());
    for layer in explicit {
        if let Some(GroupRef::Group(group)) = &layer.group {
            registry.register(group);
        }
    }
    registry.register(&scope.group_arguments);
    registry.register(&scope.group_parameters);

    let fallback = Parameter::fallback();
    let mut parameters = Vec::with_capacity(command.params.len());
    for spec in &command.params {
        let structural = Parameter::new().group(Arc::clone(match spec.kind {
            ParamKind::PositionalOnly => &scope.group_arguments,
            _ => &scope.group_parameters,
        }));
        let docstring = match command.param_help.get(&spec.name) {
            Some(help) => Parameter::new().help(help.clone()),
            None => Parameter::new(),
        };

        let mut lower: Vec<&Parameter> = vec![&fallback, &docstring, &structural];
        lower.extend(scope.app_defaults.iter().copied());
        lower.extend(command.default_parameter.iter());

        let first_pass = Parameter::combine(lower.iter().copied().chain(spec.annotations.iter()));
        let group = match &first_pass.group {
            Some(reference) => registry.resolve(reference),
            None => Arc::clone(&scope.group_parameters),
        };

        let mut layers = lower;
        layers.extend(group.default_parameter());
        layers.extend(spec.annotations.iter());
        let merged = Parameter::combine(layers);

        parameters.push(build(spec, merged, group));
    }

    check_collisions(&command.name, &parameters)?;

    let mut groups: Vec<(Arc<Group>, Vec<usize>)> = Vec::new();
    for (i, p) in parameters.iter().enumerate() {
        match groups.iter_mut().find(|(g, _)| same_group(g, &p.group)) {
            Some((_, members)) => members.push(i),
            None => groups.push((Arc::clone(&p.group), vec![i])),
        }
    }

    tracing::trace!(
        command = %command.name,
        parameters = parameters.len(),
        groups = groups.len(),
        "resolved command"
    );
    Ok(ResolvedCommand { parameters, groups })
}

fn build(spec: &ParamSpec, merged: Parameter, group: Arc<Group>) -> ResolvedParameter {
    let display_only = matches!(
        spec.kind,
        ParamKind::PositionalOnly | ParamKind::VarPositional | ParamKind::VarKeyword
    );
    let names = match &merged.name {
        Some(explicit)
            if matches!(spec.kind, ParamKind::PositionalOnly | ParamKind::VarPositional) =>
        {
            explicit.clone()
        }
        Some(explicit) => explicit.iter().map(|n| normalize_long(n)).collect(),
        None if display_only => vec![spec.name.to_uppercase()],
        None => vec![format!("--{}", kebab_case(&spec.name))],
    };

    let negatives = if display_only {
        Vec::new()
    } else {
        negatives_for(&spec.shape, &names, &merged)
    };

    let parse = merged.parse.unwrap_or(true);
    ResolvedParameter {
        field: spec.name.clone(),
        kind: spec.kind,
        shape: spec.shape.clone(),
        names,
        negatives,
        group,
        default: spec.default.clone(),
        required: merged
            .required
            .unwrap_or(spec.default.is_none() && !spec.kind.is_variadic()),
        help: merged.help.unwrap_or_default(),
        env_vars: merged.env_var.unwrap_or_default(),
        show: merged.show.unwrap_or(parse),
        show_default: merged.show_default.unwrap_or(true),
        show_choices: merged.show_choices.unwrap_or(true),
        converter: merged.converter,
        validators: merged.validators.unwrap_or_default(),
        parse,
        allow_leading_hyphen: merged.allow_leading_hyphen.unwrap_or(false),
    }
}

fn negatives_for(shape: &TypeShape, names: &[String], merged: &Parameter) -> Vec<String> {
    let prefix = if shape.is_bool() {
        merged.negative_bool.as_deref()
    } else if shape.is_list() {
        merged.negative_iterable.as_deref()
    } else {
        return Vec::new();
    };

    if let Some(explicit) = &merged.negative {
        return explicit.iter().map(|n| normalize_long(n)).collect();
    }

    let prefix = match prefix.map(str::trim) {
        None | Some("") => return Vec::new(),
        Some(p) => normalize_long(p),
    };
    names
        .iter()
        .filter_map(|n| n.strip_prefix("--"))
        .map(|stem| format!("{prefix}{stem}"))
        .collect()
}

fn check_collisions(command: &str, parameters: &[ResolvedParameter]) -> Result<()> {
    let mut seen: Vec<(&str, &str)> = Vec::new();
    for p in parameters.iter().filter(|p| p.parse) {
        for name in p.option_names().chain(p.negatives.iter().map(String::as_str)) {
            if let Some((_, owner)) = seen.iter().find(|(n, _)| *n == name) {
                return Err(Error::config(format!(
                    "command \"{command}\": option \"{name}\" is used by both \"{owner}\" and \"{}\"",
                    p.field
                )));
            }
            seen.push((name, p.field.as_str()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_default(command: &Command) -> ResolvedCommand {
        resolve(command, &Scope::default()).unwrap()
    }

    #[test]
    fn default_names_and_negatives() {
        let cmd = Command::new("foo")
            .param(ParamSpec::positional("my_flag", TypeShape::Bool).default(true))
            .param(
                ParamSpec::positional("items", TypeShape::list(TypeShape::Int))
                    .default(Value::List(Vec::new())),
            )
            .param(ParamSpec::positional("count", TypeShape::Int));
        let r = resolve_default(&cmd);
        assert_eq!(r.parameters[0].names, vec!["--my-flag"]);
        assert_eq!(r.parameters[0].negatives, vec!["--no-my-flag"]);
        assert_eq!(r.parameters[1].negatives, vec!["--empty-items"]);
        assert!(r.parameters[2].negatives.is_empty());
        assert!(r.parameters[2].required);
        assert!(!r.parameters[0].required);
    }

    #[test]
    fn renamed_flag_derives_negative_from_new_name() {
        let cmd = Command::new("foo").param(
            ParamSpec::positional("my_flag", TypeShape::Bool)
                .default(true)
                .annotate(Parameter::new().name("--bar")),
        );
        let r = resolve_default(&cmd);
        assert_eq!(r.parameters[0].names, vec!["--bar"]);
        assert_eq!(r.parameters[0].negatives, vec!["--no-bar"]);
    }

    #[test]
    fn empty_negative_disables_negation() {
        for layer in [
            Parameter::new().negative(""),
            Parameter::new().negatives(Vec::<String>::new()),
            Parameter::new().negative_bool(""),
        ] {
            let cmd = Command::new("foo").param(
                ParamSpec::positional("my_flag", TypeShape::Bool)
                    .default(true)
                    .annotate(layer),
            );
            assert!(resolve_default(&cmd).parameters[0].negatives.is_empty());
        }
    }

    #[test]
    fn kind_decides_structural_group() {
        let cmd = Command::new("foo")
            .param(ParamSpec::positional_only("src", TypeShape::Str))
            .param(ParamSpec::positional("dst", TypeShape::Str))
            .param(ParamSpec::keyword("force", TypeShape::Bool).default(false));
        let r = resolve_default(&cmd);
        assert_eq!(r.parameters[0].group.name, "Arguments");
        assert_eq!(r.parameters[1].group.name, "Parameters");
        assert_eq!(r.parameters[2].group.name, "Parameters");
        assert_eq!(r.parameters[0].names, vec!["SRC"]);
        let names: Vec<&str> = r.groups.iter().map(|(g, _)| g.name.as_str()).collect();
        assert_eq!(names, vec!["Arguments", "Parameters"]);
        assert_eq!(r.groups[1].1, vec![1, 2]);
    }

    #[test]
    fn group_default_parameter_applies_below_annotations() {
        let group = Group::new("Flags")
            .with_default_parameter(Parameter::new().negative_bool("--group-"))
            .unwrap();
        let cmd = Command::new("foo")
            .param(
                ParamSpec::keyword("flag", TypeShape::Bool)
                    .default(false)
                    .annotate(Parameter::new().group(group.clone())),
            )
            .param(
                ParamSpec::keyword("other", TypeShape::Bool)
                    .default(false)
                    .annotate(Parameter::new().group("Flags").negative_bool("--not-")),
            );
        let r = resolve_default(&cmd);
        assert_eq!(r.parameters[0].negatives, vec!["--group-flag"]);
        assert_eq!(r.parameters[1].negatives, vec!["--not-other"]);
        assert!(Arc::ptr_eq(&r.parameters[0].group, &r.parameters[1].group));
    }

    #[test]
    fn list_negatives_use_group_iterable_prefix() {
        let group = Group::new("Lists")
            .with_default_parameter(Parameter::new().negative_iterable("--clear-"))
            .unwrap();
        let cmd = Command::new("foo").param(
            ParamSpec::keyword("tags", TypeShape::list(TypeShape::Str))
                .default(Value::List(Vec::new()))
                .annotate(Parameter::new().group(group)),
        );
        assert_eq!(resolve_default(&cmd).parameters[0].negatives, vec!["--clear-tags"]);
    }

    #[test]
    fn resolution_is_stable_across_calls() {
        let cmd = Command::new("foo")
            .param(
                ParamSpec::keyword("a", TypeShape::Int)
                    .annotate(Parameter::new().group(Group::new("Food"))),
            )
            .param(ParamSpec::keyword("b", TypeShape::Int))
            .param(
                ParamSpec::keyword("c", TypeShape::Int)
                    .annotate(Parameter::new().group(Group::new("Food"))),
            );
        let first = resolve_default(&cmd);
        let second = resolve_default(&cmd);
        let order = |r: &ResolvedCommand| -> Vec<(String, Vec<usize>)> {
            r.groups.iter().map(|(g, m)| (g.name.clone(), m.clone())).collect()
        };
        assert_eq!(order(&first), order(&second));
        assert_eq!(
            order(&first),
            vec![("Food".to_string(), vec![0, 2]), ("Parameters".to_string(), vec![1])]
        );
        assert!(Arc::ptr_eq(&first.parameters[0].group, &first.parameters[2].group));
    }

    #[test]
    fn help_precedence_prefers_annotation_over_docstring() {
        let cmd = Command::new("foo")
            .param_help("a", "from docstring")
            .param_help("b", "from docstring")
            .param(
                ParamSpec::keyword("a", TypeShape::Int).annotate(Parameter::new().help("explicit")),
            )
            .param(ParamSpec::keyword("b", TypeShape::Int));
        let r = resolve_default(&cmd);
        assert_eq!(r.parameters[0].help, "explicit");
        assert_eq!(r.parameters[1].help, "from docstring");
    }

    #[test]
    fn command_default_parameter_is_overridden_by_annotation() {
        let cmd = Command::new("foo")
            .with_default_parameter(Parameter::new().negative_bool("--without-"))
            .param(ParamSpec::keyword("a", TypeShape::Bool).default(true))
            .param(
                ParamSpec::keyword("b", TypeShape::Bool)
                    .default(true)
                    .annotate(Parameter::new().negative_bool("--no-")),
            );
        let r = resolve_default(&cmd);
        assert_eq!(r.parameters[0].negatives, vec!["--without-a"]);
        assert_eq!(r.parameters[1].negatives, vec!["--no-b"]);
    }

    #[test]
    fn colliding_option_names_are_rejected() {
        let cmd = Command::new("foo")
            .param(ParamSpec::keyword("a", TypeShape::Int).annotate(Parameter::new().name("--x")))
            .param(ParamSpec::keyword("b", TypeShape::Int).annotate(Parameter::new().name("--x")));
        let err = resolve(&cmd, &Scope::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
    }

    #[test]
    fn variadic_parameters_are_optional_and_display_only() {
        let cmd = Command::new("foo")
            .param(ParamSpec::var_positional("tokens", TypeShape::Str))
            .param(ParamSpec::var_keyword("extra", TypeShape::Str));
        let r = resolve_default(&cmd);
        assert!(!r.parameters[0].required);
        assert_eq!(r.parameters[0].names, vec!["TOKENS"]);
        assert_eq!(r.parameters[0].option_names().count(), 0);
        assert_eq!(r.var_positional(), Some(0));
        assert_eq!(r.var_keyword(), Some(1));
    }
}
