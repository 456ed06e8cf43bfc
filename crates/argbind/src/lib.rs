//! Declarative command-line argument binding.
//!
//! An [`App`] owns commands, each described by an explicit schema of
//! [`ParamSpec`]s (name, kind, [`TypeShape`], default and [`Parameter`]
//! annotation layers). Parsing routes the leading tokens to one command,
//! resolves its layered configuration into concrete parameters, and binds the
//! remaining tokens into type-checked [`Value`]s:
//!
//! ```
//! use argbind::{App, Command, ParamSpec, ParseOutcome, TypeShape};
//!
//! let mut app = App::new("demo");
//! app.command(
//!     Command::new("serve")
//!         .param(ParamSpec::keyword("port", TypeShape::Int).default(8080i64))
//!         .param(ParamSpec::keyword("verbose", TypeShape::Bool).default(false)),
//! )?;
//!
//! let env: Vec<(String, String)> = Vec::new();
//! let outcome = app.parse_args_with_env(&["serve", "--port", "9000"], &env)?;
//! let ParseOutcome::Bound(call) = outcome else {
//!     unreachable!();
//! };
//! assert_eq!(call.arguments.get_int("port"), Some(9000));
//! assert_eq!(call.arguments.get_bool("verbose"), Some(false));
//! # Ok::<(), argbind::Error>(())
//! ```

pub mod app;
pub mod bind;
pub mod coerce;
pub mod command;
pub mod env;
pub mod error;
pub mod group;
pub mod help;
pub mod lexer;
pub mod parameter;
pub mod resolve;
pub mod shape;
pub mod value;

pub use app::{App, HelpRequest, Invocation, ParseOutcome};
pub use bind::{BoundArguments, ValueSource};
pub use command::{Command, Handler, ParamKind, ParamSpec};
pub use env::{Env, ProcessEnv};
pub use error::{Error, Result};
pub use group::{Group, GroupRef, SortKey};
pub use parameter::{Converter, Parameter, Validator};
pub use resolve::{ResolvedCommand, ResolvedParameter};
pub use shape::TypeShape;
pub use value::Value;
