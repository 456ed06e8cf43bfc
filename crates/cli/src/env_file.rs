use std::path::Path;

use anyhow::{Context, Result};
use argbind::{Env, ProcessEnv};
use indexmap::IndexMap;

/// Process environment layered over the variables of a `.env` file.
///
/// Variables already set in the process win, as with `dotenvy::dotenv`.
#[derive(Debug, Default)]
pub struct DotenvEnv {
    file: IndexMap<String, String>,
}

impl DotenvEnv {
    pub fn from_path(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path)
            .with_context(|| format!("failed to read env file: {}", path.display()))?;
        let mut file = IndexMap::new();
        for item in iter {
            let (key, value) =
                item.with_context(|| format!("failed to parse env file: {}", path.display()))?;
            file.insert(key, value);
        }
        tracing::debug!(path = %path.display(), vars = file.len(), "loaded env file");
        Ok(Self { file })
    }
}

impl Env for DotenvEnv {
    fn var(&self, name: &str) -> Option<String> {
        ProcessEnv.var(name).or_else(|| self.file.get(name).cloned())
    }
}
