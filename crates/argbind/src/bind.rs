//! Maps a token stream onto a resolved command.
//!
//! Binding runs in three passes: options are matched in token order while
//! bare tokens are queued, queued tokens are then assigned to positional
//! slots, and finally every parameter is converted from its CLI tokens, or
//! falls back to the environment and then to its default.

use indexmap::IndexMap;
use serde::Serialize;

use crate::coerce::{coerce, parse_bool};
use crate::command::ParamKind;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::lexer::{Token, is_number, lex, looks_like_option};
use crate::resolve::{ResolvedCommand, ResolvedParameter};
use crate::shape::TypeShape;
use crate::value::Value;

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSource {
    Cli,
    Env,
    Default,
}

/// Bound values keyed by field name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoundArguments {
    #[serde(rename = "arguments")]
    values: IndexMap<String, Value>,
    sources: IndexMap<String, ValueSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unused: Vec<String>,
}

impl BoundArguments {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    pub fn get_float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_float)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn source(&self, field: &str) -> Option<ValueSource> {
        self.sources.get(field).copied()
    }

    /// Set from the command line rather than env or default.
    pub fn is_explicit(&self, field: &str) -> bool {
        self.source(field) == Some(ValueSource::Cli)
    }

    /// Tokens left over in known-args mode.
    pub fn unused(&self) -> &[String] {
        &self.unused
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> IndexMap<String, Value> {
        self.values
    }

    fn insert(&mut self, field: &str, value: Value, source: ValueSource) {
        self.values.insert(field.to_string(), value);
        self.sources.insert(field.to_string(), source);
    }
}

/// What the command line supplied for one parameter.
#[derive(Debug, Clone)]
enum Pending {
    Tokens(Vec<String>),
    /// Already final: a bare flag or a negative name.
    Value(Value),
}

/// Positional tokens directly after a tuple option's values.
#[derive(Debug)]
struct TupleOverflow {
    /// Index into the positional queue of the first extra token.
    start: usize,
    flag: String,
    expected: usize,
    extra: usize,
}

/// Bind `tokens` to `command`.
///
/// With `allow_unused`, surplus positionals and unknown options are
/// returned in [`BoundArguments::unused`] instead of failing.
pub fn bind<S: AsRef<str>>(
    command: &ResolvedCommand,
    tokens: &[S],
    env: &dyn Env,
    allow_unused: bool,
) -> Result<BoundArguments> {
    let raw: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
    let mut binder = Binder {
        command,
        raw: &raw,
        lexed: lex(&raw),
        pending: vec![None; command.parameters.len()],
        extras: IndexMap::new(),
        positionals: Vec::new(),
        overflows: Vec::new(),
        unused: Vec::new(),
        allow_unused,
    };
    binder.scan()?;
    binder.assign_positionals()?;
    binder.finish(env)
}

struct Binder<'c, 't> {
    command: &'c ResolvedCommand,
    raw: &'t [&'t str],
    lexed: Vec<Token<'t>>,
    pending: Vec<Option<Pending>>,
    /// Unmatched `--key value` pairs for the var-keyword collector.
    extras: IndexMap<String, Vec<String>>,
    positionals: Vec<String>,
    overflows: Vec<TupleOverflow>,
    unused: Vec<String>,
    allow_unused: bool,
}

impl<'c, 't> Binder<'c, 't> {
    fn param(&self, idx: usize) -> &'c ResolvedParameter {
        &self.command.parameters[idx]
    }

    fn scan(&mut self) -> Result<()> {
        let mut i = 0usize;
        while i < self.lexed.len() {
            let arg = self.raw[i];
            let token = self.lexed[i];
            i = match token {
                Token::Separator => i + 1,
                Token::Positional(value) => {
                    self.positionals.push(value.to_string());
                    i + 1
                }
                Token::Long { name, value } => match self.command.find_option(name) {
                    Some((idx, true)) => self.take_option(idx, name, value, i + 1)?,
                    Some((idx, false)) => {
                        self.negate(idx, name, value)?;
                        i + 1
                    }
                    None => self.unmatched(arg, Some((name, value)), i + 1)?,
                },
                Token::Short { cluster } => self.short(arg, cluster, i + 1)?,
            };
        }
        Ok(())
    }

    fn short(&mut self, arg: &'t str, cluster: &'t str, next: usize) -> Result<usize> {
        match self.command.find_option(arg) {
            Some((idx, true)) => return self.take_option(idx, arg, None, next),
            Some((idx, false)) => {
                self.negate(idx, arg, None)?;
                return Ok(next);
            }
            None if is_number(arg) => {
                self.positionals.push(arg.to_string());
                return Ok(next);
            }
            None => {}
        }

        let mut flags = Vec::new();
        for (pos, ch) in cluster.char_indices() {
            let flag = format!("-{ch}");
            let Some((idx, positive)) = self.command.find_option(&flag) else {
                return self.unmatched(arg, None, next);
            };
            let rest = &cluster[pos + ch.len_utf8()..];
            if !positive || self.param(idx).is_flag() {
                flags.push((idx, flag, positive));
                continue;
            }
            // A value-taking flag ends the cluster.
            for (idx, flag, positive) in flags {
                self.set_flag(idx, &flag, positive);
            }
            let inline = (!rest.is_empty()).then_some(rest);
            return self.take_option(idx, &flag, inline, next);
        }
        for (idx, flag, positive) in flags {
            self.set_flag(idx, &flag, positive);
        }
        Ok(next)
    }

    fn set_flag(&mut self, idx: usize, flag: &str, positive: bool) {
        tracing::trace!(flag, positive, "flag");
        let value = if positive {
            Value::Bool(true)
        } else {
            negative_value(&self.param(idx).shape)
        };
        self.pending[idx] = Some(Pending::Value(value));
    }

    fn negate(&mut self, idx: usize, flag: &str, value: Option<&str>) -> Result<()> {
        if value.is_some() {
            return Err(Error::NegativeFlagAssignment {
                flag: flag.to_string(),
            });
        }
        self.set_flag(idx, flag, false);
        Ok(())
    }

    /// Consume the values of a positive option; returns the next token index.
    fn take_option(
        &mut self,
        idx: usize,
        flag: &str,
        inline: Option<&str>,
        next: usize,
    ) -> Result<usize> {
        let param = self.param(idx);
        if param.is_flag() {
            let value = match inline {
                None => Value::Bool(true),
                Some(v) => parse_bool(v).map(Value::Bool).ok_or_else(|| Error::Coercion {
                    parameter: Some(flag.to_string()),
                    value: v.to_string(),
                    attempted: vec![TypeShape::Bool.to_string()],
                    choices: Vec::new(),
                    reason: None,
                })?,
            };
            self.pending[idx] = Some(Pending::Value(value));
            return Ok(next);
        }

        let need = param.shape.token_count();
        let mut values: Vec<String> = inline.map(str::to_string).into_iter().collect();
        let mut j = next;
        while values.len() < need && j < self.raw.len() {
            if self.lexed[j] == Token::Separator || !accepts_value(self.raw[j], param) {
                break;
            }
            values.push(self.raw[j].to_string());
            j += 1;
        }
        if values.len() < need {
            return Err(Error::Arity {
                parameter: Some(flag.to_string()),
                expected: need,
                received: values.len(),
            });
        }
        tracing::trace!(flag, ?values, "option");

        if matches!(param.shape.unwrap_optional(), TypeShape::Tuple(_)) {
            let extra = self.lexed[j..]
                .iter()
                .take_while(|t| matches!(t, Token::Positional(_)))
                .count();
            if extra > 0 {
                self.overflows.push(TupleOverflow {
                    start: self.positionals.len(),
                    flag: flag.to_string(),
                    expected: need,
                    extra,
                });
            }
        }

        if param.shape.is_list() {
            match &mut self.pending[idx] {
                Some(Pending::Tokens(existing)) => existing.extend(values),
                slot => *slot = Some(Pending::Tokens(values)),
            }
        } else {
            self.pending[idx] = Some(Pending::Tokens(values));
        }
        Ok(j)
    }

    /// An option-shaped token that matched no name.
    fn unmatched(
        &mut self,
        arg: &str,
        long: Option<(&str, Option<&str>)>,
        next: usize,
    ) -> Result<usize> {
        if let (Some(collector), Some((name, inline))) = (self.command.var_keyword(), long) {
            let param = self.param(collector);
            let key = name.trim_start_matches('-').to_string();
            let mut j = next;
            let value = match inline {
                Some(v) => v.to_string(),
                None if param.is_flag() => "true".to_string(),
                None => match self.raw.get(j) {
                    Some(v) if self.lexed[j] != Token::Separator && accepts_value(v, param) => {
                        j += 1;
                        v.to_string()
                    }
                    _ => {
                        return Err(Error::Arity {
                            parameter: Some(name.to_string()),
                            expected: 1,
                            received: 0,
                        });
                    }
                },
            };
            tracing::trace!(key = %key, value = %value, "collected keyword");
            self.extras.entry(key).or_default().push(value);
            return Ok(j);
        }

        let slot_allows_hyphen = self
            .next_positional_slot()
            .is_some_and(|p| p.allow_leading_hyphen);
        if slot_allows_hyphen || is_number(arg) {
            self.positionals.push(arg.to_string());
            return Ok(next);
        }
        if self.allow_unused {
            self.unused.push(arg.to_string());
            return Ok(next);
        }
        Err(Error::UnknownOption {
            token: arg.to_string(),
        })
    }

    /// The parameter the next queued positional token would land in.
    fn next_positional_slot(&self) -> Option<&'c ResolvedParameter> {
        let mut queued = self.positionals.len();
        for (idx, p) in self.command.parameters.iter().enumerate() {
            if !p.parse || !p.is_positional() || self.pending[idx].is_some() {
                continue;
            }
            let width = p.shape.token_count();
            if p.shape.is_list() || queued < width {
                return Some(p);
            }
            queued -= width;
        }
        self.command.var_positional().map(|idx| self.param(idx))
    }

    fn assign_positionals(&mut self) -> Result<()> {
        let queue = std::mem::take(&mut self.positionals);
        let mut rest: &[String] = &queue;
        for idx in 0..self.command.parameters.len() {
            if rest.is_empty() {
                break;
            }
            let p = self.param(idx);
            if !p.parse || !p.is_positional() || self.pending[idx].is_some() {
                continue;
            }
            let take = if p.shape.is_list() {
                rest.len()
            } else {
                let need = p.shape.token_count();
                if rest.len() < need {
                    return Err(Error::Arity {
                        parameter: Some(p.display_name()),
                        expected: need,
                        received: rest.len(),
                    });
                }
                need
            };
            let (head, tail) = rest.split_at(take);
            self.pending[idx] = Some(Pending::Tokens(head.to_vec()));
            rest = tail;
        }

        if rest.is_empty() {
            return Ok(());
        }
        if let Some(collector) = self.command.var_positional() {
            self.pending[collector] = Some(Pending::Tokens(rest.to_vec()));
        } else if self.allow_unused {
            self.unused.extend(rest.iter().cloned());
        } else {
            let start = queue.len() - rest.len();
            if let Some(overflow) = self.overflows.iter().find(|o| o.start == start) {
                return Err(Error::Arity {
                    parameter: Some(overflow.flag.clone()),
                    expected: overflow.expected,
                    received: overflow.expected + overflow.extra,
                });
            }
            return Err(Error::Surplus {
                tokens: rest.to_vec(),
            });
        }
        Ok(())
    }

    fn finish(mut self, env: &dyn Env) -> Result<BoundArguments> {
        let command = self.command;
        let mut bound = BoundArguments::default();
        let mut missing = Vec::new();

        for (idx, p) in command.parameters.iter().enumerate() {
            if !p.parse {
                continue;
            }
            if p.kind == ParamKind::VarKeyword {
                let map = std::mem::take(&mut self.extras)
                    .into_iter()
                    .map(|(key, tokens)| convert_value(p, &tokens).map(|v| (key, v)))
                    .collect::<Result<IndexMap<_, _>>>()?;
                let source = if map.is_empty() {
                    ValueSource::Default
                } else {
                    ValueSource::Cli
                };
                bound.insert(&p.field, Value::Map(map), source);
                continue;
            }

            match self.pending[idx].take() {
                Some(Pending::Value(value)) => {
                    validate(p, &value)?;
                    bound.insert(&p.field, value, ValueSource::Cli);
                }
                Some(Pending::Tokens(tokens)) => {
                    let value = convert_value(p, &tokens)?;
                    validate(p, &value)?;
                    bound.insert(&p.field, value, ValueSource::Cli);
                }
                None => {
                    if let Some((var, raw)) = p
                        .env_vars
                        .iter()
                        .find_map(|var| env.var(var).map(|raw| (var, raw)))
                    {
                        tracing::debug!(
                            parameter = %p.field,
                            var = %var,
                            "using environment fallback"
                        );
                        let tokens = split_env(p, &raw);
                        let value = convert_value(p, &tokens)?;
                        validate(p, &value)?;
                        bound.insert(&p.field, value, ValueSource::Env);
                    } else if let Some(default) = &p.default {
                        bound.insert(&p.field, default.clone(), ValueSource::Default);
                    } else if p.kind == ParamKind::VarPositional {
                        bound.insert(&p.field, Value::Tuple(Vec::new()), ValueSource::Default);
                    } else if p.required {
                        missing.push(p.display_name());
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(Error::MissingArgument {
                parameters: missing,
            });
        }
        bound.unused = self.unused;
        Ok(bound)
    }
}

fn accepts_value(arg: &str, param: &ResolvedParameter) -> bool {
    !looks_like_option(arg) || is_number(arg) || param.allow_leading_hyphen
}

fn negative_value(shape: &TypeShape) -> Value {
    if shape.is_list() {
        Value::List(Vec::new())
    } else {
        Value::Bool(false)
    }
}

/// Sequence-shaped targets take whitespace-separated env values.
fn split_env(param: &ResolvedParameter, raw: &str) -> Vec<String> {
    let sequence = param.kind == ParamKind::VarPositional
        || matches!(
            param.shape.unwrap_optional(),
            TypeShape::List(_) | TypeShape::Tuple(_)
        );
    if sequence {
        raw.split_whitespace().map(str::to_string).collect()
    } else {
        vec![raw.to_string()]
    }
}

/// Convert a parameter's tokens; variadic positionals chunk per element.
fn convert_value(param: &ResolvedParameter, tokens: &[String]) -> Result<Value> {
    if param.kind != ParamKind::VarPositional {
        return convert_one(param, tokens);
    }
    let width = param.shape.token_count().max(1);
    if tokens.len() % width != 0 {
        return Err(Error::Arity {
            parameter: Some(param.display_name()),
            expected: (tokens.len() / width + 1) * width,
            received: tokens.len(),
        });
    }
    let items = tokens
        .chunks(width)
        .map(|chunk| convert_one(param, chunk))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Tuple(items))
}

fn convert_one(param: &ResolvedParameter, tokens: &[String]) -> Result<Value> {
    match &param.converter {
        Some(converter) => {
            converter
                .convert(&param.shape, tokens)
                .map_err(|reason| Error::Coercion {
                    parameter: Some(param.display_name()),
                    value: tokens.join(" "),
                    attempted: vec![param.shape.to_string()],
                    choices: Vec::new(),
                    reason: Some(reason),
                })
        }
        None => coerce(&param.shape, tokens).map_err(|e| e.for_parameter(&param.display_name())),
    }
}

fn validate(param: &ResolvedParameter, value: &Value) -> Result<()> {
    for validator in &param.validators {
        validator
            .validate(&param.shape, value)
            .map_err(|reason| Error::Validation {
                parameter: param.display_name(),
                reason,
            })?;
    }
    Ok(())
}
