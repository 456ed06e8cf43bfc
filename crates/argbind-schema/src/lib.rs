//! Declarative app descriptions.
//!
//! An [`AppSchema`] is the JSON form of an [`argbind::App`]: commands,
//! nested apps, parameter descriptors with their type shapes, and the
//! groups they reference. [`AppSchema::build`] turns it into a live app
//! whose command handlers do nothing, which is enough to route, bind and
//! render help without any application code.
//!
//! ```json
//! {
//!   "name": "demo",
//!   "version": "1.0.0",
//!   "commands": [
//!     {
//!       "name": "serve",
//!       "params": [
//!         { "name": "port", "kind": "keyword", "type": "int", "default": 8080 },
//!         { "name": "tags", "kind": "keyword", "type": { "list": "str" }, "default": [] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::sync::Arc;

use argbind::{
    App, Command, Error, Group, GroupRef, ParamKind, ParamSpec, Parameter, TypeShape, Value,
};
use serde::{Deserialize, Serialize};

pub type Result<T> = argbind::Result<T>;

/// One name or several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(one) => vec![one],
            Self::Many(many) => many,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AppSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_parameter: Option<ParameterSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub show: bool,
    /// Groups referenced by name from this app and everything below it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSchema>,
    /// Command bound when no registered entry matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<CommandSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<AppSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub show: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_parameter: Option<ParameterSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSchema>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KindSchema {
    PositionalOnly,
    #[default]
    Positional,
    Keyword,
    VarPositional,
    VarKeyword,
}

impl From<KindSchema> for ParamKind {
    fn from(kind: KindSchema) -> Self {
        match kind {
            KindSchema::PositionalOnly => ParamKind::PositionalOnly,
            KindSchema::Positional => ParamKind::PositionalOrKeyword,
            KindSchema::Keyword => ParamKind::KeywordOnly,
            KindSchema::VarPositional => ParamKind::VarPositional,
            KindSchema::VarKeyword => ParamKind::VarKeyword,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParamSchema {
    pub name: String,
    #[serde(default)]
    pub kind: KindSchema,
    #[serde(rename = "type")]
    pub shape: TypeSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<ParameterSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TypeSchema {
    Bool,
    Int,
    Float,
    Str,
    Optional(Box<TypeSchema>),
    Union(Vec<TypeSchema>),
    Literal(Vec<String>),
    Enum { name: String, members: Vec<String> },
    List(Box<TypeSchema>),
    Tuple(Vec<TypeSchema>),
}

impl From<&TypeSchema> for TypeShape {
    fn from(schema: &TypeSchema) -> Self {
        match schema {
            TypeSchema::Bool => TypeShape::Bool,
            TypeSchema::Int => TypeShape::Int,
            TypeSchema::Float => TypeShape::Float,
            TypeSchema::Str => TypeShape::Str,
            TypeSchema::Optional(inner) => TypeShape::optional(inner.as_ref().into()),
            TypeSchema::Union(members) => TypeShape::union(members.iter().map(Into::into)),
            TypeSchema::Literal(values) => TypeShape::literal(values.iter().cloned()),
            TypeSchema::Enum { name, members } => {
                TypeShape::enumeration(name.clone(), members.iter().cloned())
            }
            TypeSchema::List(inner) => TypeShape::list(inner.as_ref().into()),
            TypeSchema::Tuple(elements) => TypeShape::tuple(elements.iter().map(Into::into)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default = "default_true")]
    pub show: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_parameter: Option<ParameterSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ParameterSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_bool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_iterable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_choices: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_leading_hyphen: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Declared groups visible while building one app subtree.
#[derive(Debug, Clone, Default)]
struct GroupTable {
    groups: Vec<Arc<Group>>,
}

impl GroupTable {
    fn extend(&self, declared: &[GroupSchema]) -> Result<Self> {
        let mut table = self.clone();
        for schema in declared {
            let mut group = Group::new(schema.name.clone()).with_help(schema.help.clone());
            if !schema.show {
                group = group.hidden();
            }
            if let Some(key) = schema.sort_key {
                group = group.with_sort_key(key);
            }
            if let Some(dp) = &schema.default_parameter {
                group = group.with_default_parameter(dp.to_parameter(&table))?;
            }
            table.groups.retain(|g| g.name != schema.name);
            table.groups.push(Arc::new(group));
        }
        Ok(table)
    }

    fn reference(&self, name: &str) -> GroupRef {
        match self.groups.iter().find(|g| g.name == name) {
            Some(group) => GroupRef::Group(Arc::clone(group)),
            None => GroupRef::Name(name.to_string()),
        }
    }
}

impl ParameterSchema {
    fn to_parameter(&self, groups: &GroupTable) -> Parameter {
        let mut p = Parameter::new();
        if let Some(names) = &self.name {
            p = p.names(names.clone().into_vec());
        }
        if let Some(names) = &self.negative {
            p = p.negatives(names.clone().into_vec());
        }
        if let Some(env) = &self.env_var {
            p = p.env_vars(env.clone().into_vec());
        }
        p.negative_bool = self.negative_bool.clone();
        p.negative_iterable = self.negative_iterable.clone();
        p.group = self.group.as_deref().map(|name| groups.reference(name));
        p.required = self.required;
        p.parse = self.parse;
        p.show = self.show;
        p.show_default = self.show_default;
        p.show_choices = self.show_choices;
        p.help = self.help.clone();
        p.allow_leading_hyphen = self.allow_leading_hyphen;
        p
    }
}

impl ParamSchema {
    fn to_spec(&self, groups: &GroupTable) -> Result<ParamSpec> {
        let shape = TypeShape::from(&self.shape);
        let mut spec = ParamSpec::new(self.name.clone(), self.kind.into(), shape);
        if let Some(default) = &self.default {
            spec.default = Some(json_to_value(&spec.shape, default).map_err(|msg| {
                Error::Config(format!("default of parameter \"{}\": {msg}", self.name))
            })?);
        }
        if let Some(parameter) = &self.parameter {
            spec = spec.annotate(parameter.to_parameter(groups));
        }
        Ok(spec)
    }
}

impl CommandSchema {
    fn to_command(&self, groups: &GroupTable) -> Result<Command> {
        let mut command = Command::new(&self.name).with_help(self.help.clone());
        for alias in &self.aliases {
            command = command.alias(alias);
        }
        if let Some(group) = &self.group {
            command = command.group(groups.reference(group));
        }
        if !self.show {
            command = command.hidden();
        }
        if let Some(dp) = &self.default_parameter {
            command = command.with_default_parameter(dp.to_parameter(groups));
        }
        for param in &self.params {
            command = command.param(param.to_spec(groups)?);
        }
        Ok(command.handler(|_| Ok(0)))
    }
}

impl AppSchema {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| Error::Config(format!("invalid app description: {err}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| Error::Config(format!("cannot serialize app description: {err}")))
    }

    /// Build a live app; every command handler returns `0`.
    pub fn build(&self) -> Result<App> {
        self.build_in(&GroupTable::default())
    }

    fn build_in(&self, inherited: &GroupTable) -> Result<App> {
        let groups = inherited.extend(&self.groups)?;
        let mut app = App::new(self.name.clone()).with_help(self.help.clone());
        if let Some(version) = &self.version {
            app = app.with_version(version.clone());
        }
        if let Some(flags) = &self.help_flags {
            app = app.with_help_flags(flags.iter().cloned());
        }
        if let Some(flags) = &self.version_flags {
            app = app.with_version_flags(flags.iter().cloned());
        }
        if let Some(dp) = &self.default_parameter {
            app = app.with_default_parameter(dp.to_parameter(&groups));
        }
        if let Some(group) = &self.group {
            app = app.with_group(groups.reference(group));
        }
        if !self.show {
            app = app.hidden();
        }
        if let Some(default) = &self.default {
            app.default_command(default.to_command(&groups)?)?;
        }
        for command in &self.commands {
            app.command(command.to_command(&groups)?)?;
        }
        for child in &self.apps {
            app.subapp(child.build_in(&groups)?)?;
        }
        tracing::debug!(
            app = %self.name,
            commands = self.commands.len(),
            apps = self.apps.len(),
            "built app from description"
        );
        Ok(app)
    }
}

/// Convert a JSON default into a value of `shape`.
fn json_to_value(
    shape: &TypeShape,
    json: &serde_json::Value,
) -> std::result::Result<Value, String> {
    use serde_json::Value as Json;

    let target = shape.unwrap_optional();
    Ok(match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match (target, n.as_i64()) {
            (TypeShape::Float, _) | (_, None) => Value::Float(
                n.as_f64()
                    .ok_or_else(|| format!("number {n} is out of range"))?,
            ),
            (_, Some(i)) => Value::Int(i),
        },
        Json::String(s) => match target {
            TypeShape::Enum { members, .. } if members.contains(s) => Value::Enum(s.clone()),
            TypeShape::Enum { name, .. } => {
                return Err(format!("\"{s}\" is not a member of {name}"));
            }
            _ => Value::Str(s.clone()),
        },
        Json::Array(items) => match target {
            TypeShape::Tuple(elements) => {
                if elements.len() != items.len() {
                    return Err(format!(
                        "expected {} elements, got {}",
                        elements.len(),
                        items.len()
                    ));
                }
                Value::Tuple(
                    elements
                        .iter()
                        .zip(items)
                        .map(|(shape, item)| json_to_value(shape, item))
                        .collect::<std::result::Result<_, _>>()?,
                )
            }
            TypeShape::List(inner) => Value::List(
                items
                    .iter()
                    .map(|item| json_to_value(inner, item))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            other => Value::Tuple(
                items
                    .iter()
                    .map(|item| json_to_value(other, item))
                    .collect::<std::result::Result<_, _>>()?,
            ),
        },
        Json::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| json_to_value(target, v).map(|v| (k.clone(), v)))
                .collect::<std::result::Result<_, _>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argbind::ParseOutcome;

    const DEMO: &str = r#"{
      "name": "demo",
      "version": "1.0.0",
      "groups": [
        { "name": "Output", "sort-key": 1, "default-parameter": { "negative-bool": "--without-" } }
      ],
      "commands": [
        {
          "name": "serve_http",
          "aliases": ["s"],
          "params": [
            { "name": "port", "kind": "keyword", "type": "int", "default": 8080 },
            { "name": "color", "kind": "keyword", "type": "bool", "default": true,
              "parameter": { "group": "Output" } },
            { "name": "mode", "kind": "keyword",
              "type": { "enum": { "name": "Mode", "members": ["fast", "safe"] } },
              "default": "safe" },
            { "name": "hosts", "kind": "var-positional", "type": "str" }
          ]
        }
      ],
      "apps": [
        { "name": "db", "commands": [ { "name": "migrate", "params": [
          { "name": "steps", "type": { "optional": "int" }, "default": null }
        ] } ] }
      ]
    }"#;

    fn bound(app: &App, tokens: &[&str]) -> argbind::BoundArguments {
        let env: Vec<(String, String)> = Vec::new();
        match app.parse_args_with_env(tokens, &env).unwrap() {
            ParseOutcome::Bound(invocation) => invocation.arguments,
            other => panic!("expected Bound, got: {other:?}"),
        }
    }

    #[test]
    fn builds_and_binds_description() {
        let app = AppSchema::from_json(DEMO).unwrap().build().unwrap();
        let args = bound(
            &app,
            &["s", "a", "b", "--port", "81", "--without-color", "--mode", "fast"],
        );
        assert_eq!(args.get_int("port"), Some(81));
        assert_eq!(args.get_bool("color"), Some(false));
        assert_eq!(args.get("mode"), Some(&Value::Enum("fast".into())));
        assert_eq!(
            args.get("hosts"),
            Some(&Value::Tuple(vec!["a".into(), "b".into()]))
        );

        let args = bound(&app, &["db", "migrate"]);
        assert_eq!(args.get("steps"), Some(&Value::None));
        let args = bound(&app, &["db", "migrate", "3"]);
        assert_eq!(args.get_int("steps"), Some(3));
    }

    #[test]
    fn type_schema_uses_external_tags() {
        let shape: TypeSchema =
            serde_json::from_str(r#"{"list": {"tuple": ["str", "int"]}}"#).unwrap();
        assert_eq!(
            TypeShape::from(&shape),
            TypeShape::list(TypeShape::tuple([TypeShape::Str, TypeShape::Int]))
        );
        let shape: TypeSchema = serde_json::from_str(r#"{"literal": ["a", "b"]}"#).unwrap();
        assert_eq!(TypeShape::from(&shape).choices(), vec!["a", "b"]);
    }

    #[test]
    fn one_or_many_names() {
        let p: ParameterSchema =
            serde_json::from_str(r#"{"name": ["--verbose", "-v"], "negative": ""}"#).unwrap();
        let p = p.to_parameter(&GroupTable::default());
        assert_eq!(p.name, Some(vec!["--verbose".to_string(), "-v".to_string()]));
        assert_eq!(p.negative, Some(Vec::new()));
    }

    #[test]
    fn group_default_parameter_with_group_is_rejected() {
        let text = r#"{
          "name": "demo",
          "groups": [ { "name": "Bad", "default-parameter": { "group": "Other" } } ]
        }"#;
        let err = AppSchema::from_json(text).unwrap().build().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = AppSchema::from_json("{ \"name\": 3 }").unwrap_err();
        let Error::Config(msg) = err else {
            panic!("expected Config error");
        };
        assert!(msg.starts_with("invalid app description:"), "{msg}");
    }

    #[test]
    fn bad_enum_default_is_reported() {
        let text = r#"{
          "name": "demo",
          "default": { "name": "main", "params": [
            { "name": "mode",
              "type": { "enum": { "name": "Mode", "members": ["a"] } },
              "default": "z" }
          ] }
        }"#;
        let err = AppSchema::from_json(text).unwrap().build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: default of parameter \"mode\": \"z\" is not a member of Mode"
        );
    }

    #[test]
    fn description_round_trips_through_json() {
        let schema = AppSchema::from_json(DEMO).unwrap();
        let again = AppSchema::from_json(&schema.to_json().unwrap()).unwrap();
        assert_eq!(again.commands[0].params.len(), 4);
        assert_eq!(again.groups[0].sort_key, Some(1));
    }
}
