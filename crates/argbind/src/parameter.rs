//! Per-parameter configuration layers.
//!
//! A [`Parameter`] is a partial configuration: every field may be absent.
//! Layers are stacked (global fallback, app chain, command, group, explicit
//! annotations) and folded with [`Parameter::merge`], where the higher
//! layer's present fields win. List-valued fields replace wholly.

use std::fmt;
use std::sync::Arc;

use crate::group::GroupRef;
use crate::shape::TypeShape;
use crate::value::Value;

type ConvertFn = dyn Fn(&TypeShape, &[String]) -> Result<Value, String> + Send + Sync;
type ValidateFn = dyn Fn(&TypeShape, &Value) -> Result<(), String> + Send + Sync;

/// User conversion that fully replaces structural coercion for a parameter.
///
/// Receives the declared shape and the raw tokens.
#[derive(Clone)]
pub struct Converter(Arc<ConvertFn>);

impl Converter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TypeShape, &[String]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn convert(&self, shape: &TypeShape, tokens: &[String]) -> Result<Value, String> {
        (self.0)(shape, tokens)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Converter(..)")
    }
}

/// Post-coercion semantic check.
#[derive(Clone)]
pub struct Validator(Arc<ValidateFn>);

impl Validator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TypeShape, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn validate(&self, shape: &TypeShape, value: &Value) -> Result<(), String> {
        (self.0)(shape, value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Parameter {
    /// Positive names. `Some(vec![])` means "no positive names".
    pub name: Option<Vec<String>>,
    /// Negative names. `Some(vec![])` disables negation.
    pub negative: Option<Vec<String>>,
    /// Prefix for derived boolean negatives (`--no-`).
    pub negative_bool: Option<String>,
    /// Prefix for derived list negatives (`--empty-`).
    pub negative_iterable: Option<String>,
    pub group: Option<GroupRef>,
    pub converter: Option<Converter>,
    pub validators: Option<Vec<Validator>>,
    pub required: Option<bool>,
    /// Whether the parameter participates in binding at all.
    pub parse: Option<bool>,
    pub show: Option<bool>,
    pub show_default: Option<bool>,
    pub show_choices: Option<bool>,
    pub help: Option<String>,
    pub env_var: Option<Vec<String>>,
    /// Accept `-`-prefixed tokens as values for this parameter.
    pub allow_leading_hyphen: Option<bool>,
}

impl Parameter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lowest configuration layer, applied beneath everything else.
    pub(crate) fn fallback() -> Self {
        Self {
            negative_bool: Some("--no-".to_string()),
            negative_iterable: Some("--empty-".to_string()),
            parse: Some(true),
            show_default: Some(true),
            show_choices: Some(true),
            allow_leading_hyphen: Some(false),
            ..Self::default()
        }
    }

    /// Single positive name; an empty string means "no positive names".
    pub fn name(self, name: impl Into<String>) -> Self {
        self.names([name.into()])
    }

    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.name = Some(non_empty(names));
        self
    }

    /// Single negative name; an empty string disables negation.
    pub fn negative(self, name: impl Into<String>) -> Self {
        self.negatives([name.into()])
    }

    /// Negative names; an empty collection disables negation.
    pub fn negatives<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.negative = Some(non_empty(names));
        self
    }

    pub fn negative_bool(mut self, prefix: impl Into<String>) -> Self {
        self.negative_bool = Some(prefix.into());
        self
    }

    pub fn negative_iterable(mut self, prefix: impl Into<String>) -> Self {
        self.negative_iterable = Some(prefix.into());
        self
    }

    pub fn group(mut self, group: impl Into<GroupRef>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&TypeShape, &[String]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.converter = Some(Converter::new(f));
        self
    }

    /// Append a validator to this layer's list.
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&TypeShape, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators
            .get_or_insert_with(Vec::new)
            .push(Validator::new(f));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn parse(mut self, parse: bool) -> Self {
        self.parse = Some(parse);
        self
    }

    pub fn show(mut self, show: bool) -> Self {
        self.show = Some(show);
        self
    }

    pub fn show_default(mut self, show: bool) -> Self {
        self.show_default = Some(show);
        self
    }

    pub fn show_choices(mut self, show: bool) -> Self {
        self.show_choices = Some(show);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn env_var(self, name: impl Into<String>) -> Self {
        self.env_vars([name.into()])
    }

    pub fn env_vars<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.env_var = Some(non_empty(names));
        self
    }

    pub fn allow_leading_hyphen(mut self, allow: bool) -> Self {
        self.allow_leading_hyphen = Some(allow);
        self
    }

    /// Overlay `over` on top of `self`: present fields of `over` win.
    pub fn merge(&self, over: &Parameter) -> Parameter {
        Parameter {
            name: over.name.clone().or_else(|| self.name.clone()),
            negative: over.negative.clone().or_else(|| self.negative.clone()),
            negative_bool: over
                .negative_bool
                .clone()
                .or_else(|| self.negative_bool.clone()),
            negative_iterable: over
                .negative_iterable
                .clone()
                .or_else(|| self.negative_iterable.clone()),
            group: over.group.clone().or_else(|| self.group.clone()),
            converter: over.converter.clone().or_else(|| self.converter.clone()),
            validators: over.validators.clone().or_else(|| self.validators.clone()),
            required: over.required.or(self.required),
            parse: over.parse.or(self.parse),
            show: over.show.or(self.show),
            show_default: over.show_default.or(self.show_default),
            show_choices: over.show_choices.or(self.show_choices),
            help: over.help.clone().or_else(|| self.help.clone()),
            env_var: over.env_var.clone().or_else(|| self.env_var.clone()),
            allow_leading_hyphen: over.allow_leading_hyphen.or(self.allow_leading_hyphen),
        }
    }

    /// Fold layers from lowest to highest precedence.
    pub fn combine<'a>(layers: impl IntoIterator<Item = &'a Parameter>) -> Parameter {
        layers
            .into_iter()
            .fold(Parameter::default(), |acc, layer| acc.merge(layer))
    }
}

fn non_empty<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Vec<String> {
    names
        .into_iter()
        .map(Into::into)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// `foo` -> `--foo`; names already starting with `-` are kept.
pub(crate) fn normalize_long(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        trimmed.to_string()
    } else {
        format!("--{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_negative_disables() {
        assert_eq!(Parameter::new().negative("").negative, Some(Vec::new()));
        assert_eq!(
            Parameter::new().negatives(Vec::<String>::new()).negative,
            Some(Vec::new())
        );
        assert_eq!(Parameter::new().negative, None);
    }

    #[test]
    fn merge_prefers_higher_layer_scalars() {
        let low = Parameter::new().help("low").required(true);
        let high = Parameter::new().help("high");
        let merged = low.merge(&high);
        assert_eq!(merged.help.as_deref(), Some("high"));
        assert_eq!(merged.required, Some(true));
    }

    #[test]
    fn merge_replaces_lists_wholly() {
        let low = Parameter::new().names(["--a", "-a"]).env_vars(["A", "B"]);
        let high = Parameter::new().names(["--bar"]);
        let merged = Parameter::combine([&low, &high]);
        assert_eq!(merged.name, Some(vec!["--bar".to_string()]));
        assert_eq!(merged.env_var, Some(vec!["A".to_string(), "B".to_string()]));
    }

    #[test]
    fn validators_replace_rather_than_accumulate_across_layers() {
        let low = Parameter::new()
            .validator(|_, _| Ok(()))
            .validator(|_, _| Ok(()));
        let high = Parameter::new().validator(|_, _| Err("nope".into()));
        let merged = low.merge(&high);
        assert_eq!(merged.validators.map(|v| v.len()), Some(1));
    }

    #[test]
    fn normalize_long_adds_prefix() {
        assert_eq!(normalize_long("foo"), "--foo");
        assert_eq!(normalize_long("--foo"), "--foo");
        assert_eq!(normalize_long("-f"), "-f");
    }
}
