//! Command tree: registration, routing, builtin flags and the meta layer.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::bind::{BoundArguments, bind};
use crate::command::{Command, kebab_case};
use crate::env::{Env, ProcessEnv};
use crate::error::{Error, Result};
use crate::group::{Group, GroupRef};
use crate::help;
use crate::parameter::Parameter;
use crate::resolve::{ResolvedCommand, Scope, resolve};

static PROCESS_ENV: ProcessEnv = ProcessEnv;

const HELP_TEXT: &str = "Display this message and exit.";
const VERSION_TEXT: &str = "Display application version.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Help,
    Version,
}

/// An application: a named node owning commands, sub-apps and an optional
/// default command.
///
/// Registered entries live in an arena indexed by name (aliases and the
/// several builtin flag spellings map to the same slot), so they can be
/// reached again through [`App::entry_mut`] after registration.
#[derive(Debug, Clone)]
pub struct App {
    pub name: String,
    pub help: String,
    pub version: Option<String>,
    pub default_parameter: Option<Parameter>,
    /// Group this app is listed under in its parent's help.
    pub group: Option<GroupRef>,
    pub show: bool,
    pub group_commands: Arc<Group>,
    pub group_arguments: Arc<Group>,
    pub group_parameters: Arc<Group>,
    help_flags: Vec<String>,
    version_flags: Vec<String>,
    entries: Vec<App>,
    index: IndexMap<String, usize>,
    default_command: Option<Command>,
    builtin: Option<Builtin>,
    meta: Option<Box<App>>,
    is_meta: bool,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        let mut app = Self::bare(name.into());
        app.install_builtins();
        app
    }

    fn bare(name: String) -> Self {
        Self {
            name,
            help: String::new(),
            version: None,
            default_parameter: None,
            group: None,
            show: true,
            group_commands: Arc::new(Group::commands()),
            group_arguments: Arc::new(Group::arguments()),
            group_parameters: Arc::new(Group::parameters()),
            help_flags: vec!["--help".to_string(), "-h".to_string()],
            version_flags: vec!["--version".to_string()],
            entries: Vec::new(),
            index: IndexMap::new(),
            default_command: None,
            builtin: None,
            meta: None,
            is_meta: false,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Replace the builtin help flags; an empty list removes the entry.
    pub fn with_help_flags<S: Into<String>>(mut self, flags: impl IntoIterator<Item = S>) -> Self {
        self.help_flags = flags.into_iter().map(Into::into).collect();
        self.install_builtins();
        self
    }

    /// Replace the builtin version flags; an empty list removes the entry.
    pub fn with_version_flags<S: Into<String>>(
        mut self,
        flags: impl IntoIterator<Item = S>,
    ) -> Self {
        self.version_flags = flags.into_iter().map(Into::into).collect();
        self.install_builtins();
        self
    }

    pub fn with_default_parameter(mut self, parameter: Parameter) -> Self {
        self.default_parameter = Some(parameter);
        self
    }

    pub fn with_group(mut self, group: impl Into<GroupRef>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_group_commands(mut self, group: impl Into<Arc<Group>>) -> Self {
        self.group_commands = group.into();
        self
    }

    pub fn with_group_arguments(mut self, group: impl Into<Arc<Group>>) -> Self {
        self.group_arguments = group.into();
        self
    }

    pub fn with_group_parameters(mut self, group: impl Into<Arc<Group>>) -> Self {
        self.group_parameters = group.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show = false;
        self
    }

    pub fn help_flags(&self) -> &[String] {
        &self.help_flags
    }

    pub fn version_flags(&self) -> &[String] {
        &self.version_flags
    }

    pub fn is_meta(&self) -> bool {
        self.is_meta
    }

    /// The command bound when no registered entry matches.
    pub fn default_target(&self) -> Option<&Command> {
        self.default_command.as_ref()
    }

    pub(crate) fn builtin(&self) -> Option<Builtin> {
        self.builtin
    }

    /// (Re)attach the builtin entries under the configured flag spellings.
    fn install_builtins(&mut self) {
        let flags = [
            (Builtin::Help, self.help_flags.clone(), HELP_TEXT),
            (Builtin::Version, self.version_flags.clone(), VERSION_TEXT),
        ];
        for (kind, names, text) in flags {
            let slot = self.entries.iter().position(|e| e.builtin == Some(kind));
            if let Some(slot) = slot {
                self.index.retain(|_, idx| *idx != slot);
            }
            let Some(first) = names.first() else {
                continue;
            };
            let slot = slot.unwrap_or_else(|| {
                let mut entry = Self::bare(first.clone());
                entry.help = text.to_string();
                entry.builtin = Some(kind);
                self.entries.push(entry);
                self.entries.len() - 1
            });
            self.entries[slot].name = first.clone();
            for name in names {
                self.index.insert(name, slot);
            }
        }
    }

    fn register(&mut self, names: Vec<String>, entry: App) -> Result<()> {
        if let Some(taken) = names.iter().find(|n| self.index.contains_key(n.as_str())) {
            return Err(Error::config(format!(
                "\"{taken}\" is already registered in \"{}\"",
                self.name
            )));
        }
        tracing::debug!(app = %self.name, entry = %entry.name, "registered entry");
        self.entries.push(entry);
        let slot = self.entries.len() - 1;
        for name in names {
            self.index.insert(name, slot);
        }
        Ok(())
    }

    /// Register `command` as a child entry under its name and aliases.
    pub fn command(&mut self, command: Command) -> Result<()> {
        command.validate()?;
        let mut child = Self::bare(command.name.clone());
        child.help = command.help.clone();
        child.group = command.group.clone();
        child.show = command.show;
        child.help_flags = self.help_flags.clone();
        child.version_flags = self.version_flags.clone();
        child.install_builtins();
        child.group_commands = Arc::clone(&self.group_commands);
        child.group_arguments = Arc::clone(&self.group_arguments);
        child.group_parameters = if self.is_meta {
            Arc::new(Group::parameters())
        } else {
            Arc::clone(&self.group_parameters)
        };

        let mut scope = Scope {
            app_defaults: Vec::new(),
            group_arguments: Arc::clone(&child.group_arguments),
            group_parameters: Arc::clone(&child.group_parameters),
        };
        scope.app_defaults.extend(self.default_parameter.as_ref());
        resolve(&command, &scope)?;

        let mut names = vec![command.name.clone()];
        names.extend(command.aliases.iter().cloned());
        child.default_command = Some(command);
        self.register(names, child)
    }

    /// Register a nested app under its (kebab-cased) name.
    pub fn subapp(&mut self, app: App) -> Result<()> {
        let name = kebab_case(&app.name);
        self.register(vec![name], app)
    }

    /// Set the command run when no registered entry matches.
    pub fn default_command(&mut self, command: Command) -> Result<()> {
        if let Some(existing) = &self.default_command {
            return Err(Error::config(format!(
                "\"{}\" already has default command \"{}\"",
                self.name, existing.name
            )));
        }
        command.validate()?;
        let scope = Scope {
            app_defaults: self.default_parameter.iter().collect(),
            group_arguments: Arc::clone(&self.group_arguments),
            group_parameters: Arc::clone(&self.group_parameters),
        };
        resolve(&command, &scope)?;
        self.default_command = Some(command);
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<&App> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut App> {
        let idx = *self.index.get(name)?;
        Some(&mut self.entries[idx])
    }

    /// Registered entries with every name that reaches them, in registration order.
    pub fn entries(&self) -> Vec<(Vec<&str>, &App)> {
        let mut out: Vec<(Vec<&str>, &App)> = Vec::new();
        let mut slots: Vec<usize> = Vec::new();
        for (name, &idx) in &self.index {
            match slots.iter().position(|&s| s == idx) {
                Some(pos) => out[pos].0.push(name.as_str()),
                None => {
                    slots.push(idx);
                    out.push((vec![name.as_str()], &self.entries[idx]));
                }
            }
        }
        out
    }

    /// Primary names of visible, non-builtin entries in registration order.
    pub fn command_names(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(_, app)| app.builtin.is_none() && app.show)
            .filter_map(|(names, _)| names.first().map(|n| n.to_string()))
            .collect()
    }

    /// The wrapping meta app, created on first use.
    ///
    /// Its default command receives every invocation of [`App::run`] and may
    /// hand the remaining tokens back through [`Invocation::delegate`].
    pub fn meta_mut(&mut self) -> &mut App {
        let (name, help, version) = (self.name.clone(), self.help.clone(), self.version.clone());
        let (help_flags, version_flags) = (self.help_flags.clone(), self.version_flags.clone());
        self.meta.get_or_insert_with(|| {
            let mut meta = Self::bare(name);
            meta.help = help;
            meta.version = version;
            meta.help_flags = help_flags;
            meta.version_flags = version_flags;
            meta.install_builtins();
            meta.group_parameters = Arc::new(Group::session_parameters());
            meta.is_meta = true;
            Box::new(meta)
        })
    }

    pub fn meta(&self) -> Option<&App> {
        self.meta.as_deref()
    }

    pub fn version_text(&self) -> String {
        match self.version.as_deref().map(str::trim) {
            None | Some("") => self.name.clone(),
            Some(version) => format!("{} {version}", self.name),
        }
    }

    /// Follow leading tokens through registered entries.
    fn route<'a, S: AsRef<str>>(&'a self, tokens: &[S]) -> (Vec<&'a App>, Option<Builtin>, usize) {
        let mut chain = vec![self];
        let mut consumed = 0;
        while let Some(token) = tokens.get(consumed) {
            let current = chain[chain.len() - 1];
            let Some(entry) = current.entry(token.as_ref()) else {
                break;
            };
            consumed += 1;
            if let Some(builtin) = entry.builtin {
                return (chain, Some(builtin), consumed);
            }
            chain.push(entry);
        }
        (chain, None, consumed)
    }

    fn requested_builtin<S: AsRef<str>>(&self, tokens: &[S]) -> Option<Builtin> {
        tokens
            .iter()
            .map(|t| t.as_ref())
            .take_while(|t| *t != "--")
            .find_map(|t| {
                if self.help_flags.iter().any(|f| f == t) {
                    Some(Builtin::Help)
                } else if self.version_flags.iter().any(|f| f == t) {
                    Some(Builtin::Version)
                } else {
                    None
                }
            })
    }

    fn parse_inner<'a, S: AsRef<str>>(
        &'a self,
        tokens: &[S],
        env: &'a dyn Env,
        allow_unused: bool,
        wrapped: Option<&'a App>,
    ) -> Result<ParseOutcome<'a>> {
        let (chain, builtin, consumed) = self.route(tokens);
        let rest = &tokens[consumed..];
        let target = chain[chain.len() - 1];
        tracing::debug!(
            app = %self.name,
            target = %target.name,
            depth = chain.len() - 1,
            "routed tokens"
        );

        match builtin.or_else(|| self.requested_builtin(rest)) {
            Some(Builtin::Help) => {
                return Ok(ParseOutcome::Help(self.help_request(chain, rest, wrapped)));
            }
            Some(Builtin::Version) => {
                return Ok(ParseOutcome::Version(chain[0].version_text()));
            }
            None => {}
        }

        let Some(command) = target.default_command.as_ref() else {
            if let (true, 1, Some(inner), Some(_)) =
                (self.is_meta, chain.len(), wrapped, rest.first())
            {
                return inner.parse_inner(tokens, env, allow_unused, None);
            }
            return match rest.first() {
                None => Ok(ParseOutcome::Help(HelpRequest {
                    apps: chain,
                    wrapped,
                })),
                Some(token) => Err(Error::UnknownCommand {
                    token: token.as_ref().to_string(),
                    available: target.command_names(),
                }),
            };
        };

        let resolved = resolve_in(&chain, command)?;
        let arguments = bind(&resolved, rest, env, allow_unused)?;
        Ok(ParseOutcome::Bound(Invocation {
            chain,
            command,
            arguments,
            env,
            wrapped,
        }))
    }

    fn help_request<'a, S: AsRef<str>>(
        &'a self,
        chain: Vec<&'a App>,
        rest: &[S],
        wrapped: Option<&'a App>,
    ) -> HelpRequest<'a> {
        if let (true, 1, Some(inner)) = (self.is_meta, chain.len(), wrapped) {
            // Meta options may precede the wrapped command.
            let start = rest
                .iter()
                .map(|t| t.as_ref())
                .take_while(|t| *t != "--")
                .position(|t| inner.entry(t).is_some_and(|e| e.builtin.is_none()))
                .unwrap_or(rest.len());
            let (inner_chain, _, _) = inner.route(&rest[start..]);
            if inner_chain.len() > 1 {
                return HelpRequest {
                    apps: inner_chain,
                    wrapped: None,
                };
            }
        }
        HelpRequest {
            apps: chain,
            wrapped,
        }
    }

    /// Route and bind against the process environment.
    pub fn parse_args<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ParseOutcome<'_>> {
        self.parse_inner(tokens, &PROCESS_ENV, false, None)
    }

    pub fn parse_args_with_env<'a, S: AsRef<str>>(
        &'a self,
        tokens: &[S],
        env: &'a dyn Env,
    ) -> Result<ParseOutcome<'a>> {
        self.parse_inner(tokens, env, false, None)
    }

    /// Like [`App::parse_args`], but surplus tokens are returned in
    /// [`BoundArguments::unused`] instead of failing.
    pub fn parse_known_args<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ParseOutcome<'_>> {
        self.parse_inner(tokens, &PROCESS_ENV, true, None)
    }

    pub fn parse_known_args_with_env<'a, S: AsRef<str>>(
        &'a self,
        tokens: &[S],
        env: &'a dyn Env,
    ) -> Result<ParseOutcome<'a>> {
        self.parse_inner(tokens, env, true, None)
    }

    /// Parse and invoke, entering through the meta app when one exists.
    ///
    /// Help and version requests are printed to stdout and return `0`.
    pub fn run<S: AsRef<str>>(&self, tokens: &[S]) -> Result<i32> {
        self.run_with_env(tokens, &PROCESS_ENV)
    }

    pub fn run_with_env<S: AsRef<str>>(&self, tokens: &[S], env: &dyn Env) -> Result<i32> {
        match &self.meta {
            Some(meta) => meta.parse_inner(tokens, env, false, Some(self))?.execute(),
            None => self.run_direct(tokens, env),
        }
    }

    fn run_direct<S: AsRef<str>>(&self, tokens: &[S], env: &dyn Env) -> Result<i32> {
        self.parse_inner(tokens, env, false, None)?.execute()
    }
}

/// Resolve `command` in the configuration scope of `chain`.
pub fn resolve_in(chain: &[&App], command: &Command) -> Result<ResolvedCommand> {
    let Some(owner) = chain.last() else {
        return resolve(command, &Scope::default());
    };
    let scope = Scope {
        app_defaults: chain
            .iter()
            .filter_map(|app| app.default_parameter.as_ref())
            .collect(),
        group_arguments: Arc::clone(&owner.group_arguments),
        group_parameters: Arc::clone(&owner.group_parameters),
    };
    resolve(command, &scope)
}

#[derive(Debug)]
pub enum ParseOutcome<'a> {
    Bound(Invocation<'a>),
    Help(HelpRequest<'a>),
    Version(String),
}

impl ParseOutcome<'_> {
    fn execute(self) -> Result<i32> {
        match self {
            Self::Bound(invocation) => invocation.call(),
            Self::Help(request) => {
                print!("{}", request.render()?);
                Ok(0)
            }
            Self::Version(text) => {
                println!("{text}");
                Ok(0)
            }
        }
    }
}

/// Help was requested for the routed chain of apps.
#[derive(Debug, Clone)]
pub struct HelpRequest<'a> {
    /// Root first; the last app is the one to describe.
    pub apps: Vec<&'a App>,
    /// Set when a meta app is describing the app it wraps.
    pub wrapped: Option<&'a App>,
}

impl HelpRequest<'_> {
    pub fn render(&self) -> Result<String> {
        help::render(&self.apps, self.wrapped)
    }
}

/// A routed command with bound arguments, ready to call.
pub struct Invocation<'a> {
    pub chain: Vec<&'a App>,
    pub command: &'a Command,
    pub arguments: BoundArguments,
    env: &'a dyn Env,
    wrapped: Option<&'a App>,
}

impl<'a> Invocation<'a> {
    /// Space-separated command path below the root, e.g. `db migrate`.
    pub fn path(&self) -> String {
        self.chain
            .iter()
            .skip(1)
            .map(|app| app.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn env(&self) -> &'a dyn Env {
        self.env
    }

    pub fn call(&self) -> Result<i32> {
        let Some(handler) = self.command.handler_fn() else {
            return Err(Error::config(format!(
                "command \"{}\" has no handler",
                self.command.name
            )));
        };
        handler(self).map_err(|err| match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(other) => Error::Command(other),
        })
    }

    /// Run the app wrapped by the meta layer on `tokens`, bypassing the meta app.
    pub fn delegate<S: AsRef<str>>(&self, tokens: &[S]) -> Result<i32> {
        match self.wrapped {
            Some(app) => app.run_direct(tokens, self.env),
            None => Err(Error::config(format!(
                "\"{}\" is not a meta app and has nothing to delegate to",
                self.chain.first().map_or("", |a| a.name.as_str())
            ))),
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("path", &self.path())
            .field("command", &self.command.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::command::ParamSpec;
    use crate::shape::TypeShape;
    use crate::value::Value;

    fn env() -> Vec<(String, String)> {
        Vec::new()
    }

    fn bound<'a>(outcome: ParseOutcome<'a>) -> Invocation<'a> {
        match outcome {
            ParseOutcome::Bound(invocation) => invocation,
            other => panic!("expected Bound, got: {other:?}"),
        }
    }

    fn demo() -> App {
        let mut app = App::new("demo").with_version("1.2.3");
        app.command(
            Command::new("foo")
                .param(ParamSpec::positional("my_flag", TypeShape::Bool).default(true))
                .handler(|inv| {
                    Ok(if inv.arguments.get_bool("my_flag") == Some(true) {
                        0
                    } else {
                        3
                    })
                }),
        )
        .unwrap();
        let mut db = App::new("db").with_help("Database commands.");
        db.command(
            Command::new("migrate_all")
                .alias("m")
                .param(ParamSpec::keyword("steps", TypeShape::Int).default(1i64)),
        )
        .unwrap();
        app.subapp(db).unwrap();
        app
    }

    #[test]
    fn routes_commands_and_binds() {
        let app = demo();
        let e = env();
        let inv = bound(app.parse_args_with_env(&["foo", "--no-my-flag"], &e).unwrap());
        assert_eq!(inv.path(), "foo");
        assert_eq!(inv.arguments.get_bool("my_flag"), Some(false));
        assert_eq!(inv.call().unwrap(), 3);

        let inv = bound(
            app.parse_args_with_env(&["db", "migrate-all", "--steps", "4"], &e)
                .unwrap(),
        );
        assert_eq!(inv.path(), "db migrate-all");
        assert_eq!(inv.arguments.get_int("steps"), Some(4));

        let inv = bound(app.parse_args_with_env(&["db", "m"], &e).unwrap());
        assert_eq!(inv.command.name, "migrate-all");
    }

    #[test]
    fn builtin_flags_produce_help_and_version() {
        let app = demo();
        let e = env();
        assert!(matches!(
            app.parse_args_with_env(&["--version"], &e).unwrap(),
            ParseOutcome::Version(ref v) if v == "demo 1.2.3"
        ));
        match app.parse_args_with_env(&["db", "migrate-all", "--help"], &e).unwrap() {
            ParseOutcome::Help(req) => {
                let names: Vec<&str> = req.apps.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["demo", "db", "migrate-all"]);
            }
            other => panic!("expected Help, got: {other:?}"),
        }
        assert!(matches!(
            app.parse_args_with_env(&["-h"], &e).unwrap(),
            ParseOutcome::Help(_)
        ));
        assert!(matches!(
            app.parse_args_with_env(&[] as &[&str], &e).unwrap(),
            ParseOutcome::Help(_)
        ));
    }

    #[test]
    fn help_after_separator_is_a_token() {
        let mut app = App::new("demo");
        app.default_command(
            Command::new("main").param(ParamSpec::var_positional("rest", TypeShape::Str)),
        )
        .unwrap();
        let e = env();
        let inv = bound(app.parse_args_with_env(&["--", "--help"], &e).unwrap());
        assert_eq!(
            inv.arguments.get("rest"),
            Some(&Value::Tuple(vec!["--help".into()]))
        );
    }

    #[test]
    fn unknown_command_lists_available() {
        let app = demo();
        let e = env();
        let err = app.parse_args_with_env(&["nope"], &e).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown command \"nope\". Available commands: foo, db."
        );
    }

    #[test]
    fn duplicate_registration_is_config_error() {
        let mut app = demo();
        let err = app.command(Command::new("foo")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = app.command(Command::new("other").alias("db")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = app
            .default_command(Command::new("main"))
            .and_then(|_| app.default_command(Command::new("again")));
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn empty_flag_lists_remove_builtins() {
        let app = App::new("demo").with_help_flags(Vec::<String>::new()).with_version_flags(["-V"]);
        assert!(app.entry("--help").is_none());
        assert!(app.entry("--version").is_none());
        assert_eq!(app.entry("-V").map(|e| e.name.as_str()), Some("-V"));
        let e = env();
        let err = app.parse_args_with_env(&["--help"], &e).unwrap_err();
        assert!(matches!(err, Error::UnknownCommand { .. }));
    }

    #[test]
    fn entry_mut_reassigns_group() {
        let mut app = demo();
        if let Some(entry) = app.entry_mut("-h") {
            entry.group = Some(GroupRef::from("Admin"));
        }
        assert_eq!(
            app.entry("--help").and_then(|e| e.group.as_ref()).map(GroupRef::name),
            Some("Admin")
        );
    }

    #[test]
    fn meta_app_delegates_to_wrapped_app() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new("demo");
        let record = Arc::clone(&seen);
        app.command(
            Command::new("foo")
                .param(ParamSpec::positional("n", TypeShape::Int))
                .handler(move |inv| {
                    let n = inv.arguments.get_int("n").unwrap_or_default();
                    record.lock().unwrap().push(format!("foo {n}"));
                    Ok(0)
                }),
        )
        .unwrap();

        let record = Arc::clone(&seen);
        app.meta_mut()
            .default_command(
                Command::new("launcher")
                    .param(ParamSpec::var_positional("tokens", TypeShape::Str).annotate(
                        Parameter::new().show(false).allow_leading_hyphen(true),
                    ))
                    .param(ParamSpec::keyword("user", TypeShape::Str).default("guest"))
                    .handler(move |inv| {
                        let user = inv.arguments.get_str("user").unwrap_or_default().to_string();
                        record.lock().unwrap().push(format!("user {user}"));
                        let tokens: Vec<String> = inv
                            .arguments
                            .get("tokens")
                            .and_then(Value::as_slice)
                            .unwrap_or_default()
                            .iter()
                            .map(ToString::to_string)
                            .collect();
                        Ok(inv.delegate(&tokens)?)
                    }),
            )
            .unwrap();

        let e = env();
        assert_eq!(app.run_with_env(&["--user", "ada", "foo", "7"], &e).unwrap(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["user ada", "foo 7"]);

        let err = app.run_with_env(&["foo", "x"], &e).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value \"x\" for \"--n\": expected int.");
    }

    #[test]
    fn meta_commands_are_routed_by_kebab_name() {
        let mut app = App::new("demo");
        app.meta_mut()
            .command(
                Command::new("meta_cmd")
                    .param(ParamSpec::positional("a", TypeShape::Int))
                    .handler(|inv| Ok(inv.arguments.get_int("a").unwrap_or_default() as i32)),
            )
            .unwrap();
        let e = env();
        assert_eq!(app.run_with_env(&["meta-cmd", "5"], &e).unwrap(), 5);
    }

    #[test]
    fn meta_without_default_routes_wrapped_commands() {
        let mut app = App::new("demo");
        app.command(
            Command::new("foo")
                .param(ParamSpec::positional("n", TypeShape::Int))
                .handler(|inv| Ok(inv.arguments.get_int("n").unwrap_or_default() as i32)),
        )
        .unwrap();
        app.meta_mut()
            .command(Command::new("meta_cmd").handler(|_| Ok(9)))
            .unwrap();

        let e = env();
        let meta = app.meta().unwrap();
        let help = meta.parse_inner(&[] as &[&str], &e, false, Some(&app)).unwrap();
        let ParseOutcome::Help(request) = help else {
            panic!("expected Help, got: {help:?}");
        };
        assert!(request.render().unwrap().contains("foo"));

        assert_eq!(app.run_with_env(&["foo", "3"], &e).unwrap(), 3);
        assert_eq!(app.run_with_env(&["meta-cmd"], &e).unwrap(), 9);
        let err = app.run_with_env(&["nope"], &e).unwrap_err();
        assert!(matches!(err, Error::UnknownCommand { .. }), "{err:?}");
    }

    #[test]
    fn meta_help_skips_meta_options_before_command() {
        let mut app = App::new("demo");
        app.command(Command::new("foo").with_help("Do foo.").handler(|_| Ok(0)))
            .unwrap();
        app.meta_mut()
            .default_command(
                Command::new("launcher")
                    .param(ParamSpec::var_positional("tokens", TypeShape::Str))
                    .param(ParamSpec::keyword("user", TypeShape::Str).default("guest"))
                    .handler(|_| Ok(0)),
            )
            .unwrap();

        let e = env();
        let meta = app.meta().unwrap();
        let outcome = meta
            .parse_inner(&["--user", "ada", "foo", "--help"], &e, false, Some(&app))
            .unwrap();
        let ParseOutcome::Help(request) = outcome else {
            panic!("expected Help, got: {outcome:?}");
        };
        let names: Vec<&str> = request.apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["demo", "foo"]);
        assert!(request.wrapped.is_none());
    }

    #[test]
    fn handler_errors_are_wrapped() {
        let mut app = App::new("demo");
        app.command(Command::new("boom").handler(|_| anyhow::bail!("exploded")))
            .unwrap();
        let e = env();
        let err = app.run_with_env(&["boom"], &e).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(err.to_string(), "exploded");
    }

    #[test]
    fn known_args_keep_leftovers() {
        let mut app = App::new("demo");
        app.default_command(Command::new("main").param(ParamSpec::positional("a", TypeShape::Str)))
            .unwrap();
        let e = env();
        let inv = bound(app.parse_known_args_with_env(&["x", "--z", "y"], &e).unwrap());
        assert_eq!(inv.arguments.unused(), ["--z", "y"]);
        assert!(app.parse_args_with_env(&["x", "y"], &e).is_err());
    }
}
