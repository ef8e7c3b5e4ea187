use crate::app::node::CollectorMode;
use crate::configuration::constants::common::{DEFAULT_HOOK_TIMEOUT, DEFAULT_TEST_TIMEOUT, ENV_PREFIX};
use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Shell commands attached to a suite as lifetime hooks.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HookCommands {
    #[serde(default)]
    pub before_all: Vec<String>,
    #[serde(default)]
    pub after_all: Vec<String>,
    #[serde(default)]
    pub before_each: Vec<String>,
    #[serde(default)]
    pub after_each: Vec<String>,
}

impl HookCommands {
    pub fn is_empty(&self) -> bool {
        self.before_all.is_empty()
            && self.after_all.is_empty()
            && self.before_each.is_empty()
            && self.after_each.is_empty()
    }
}

/// A suite (when `children` is present) or a test.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub name: String,
    #[serde(default, deserialize_with = "crate::configuration::deserialize::mode::deserialize")]
    pub mode: CollectorMode,
    /// Command run as the test body. A test without one is todo.
    pub run: Option<String>,
    #[serde(default)]
    pub hooks: HookCommands,
    pub children: Option<Vec<Entry>>,
}

impl Entry {
    pub fn is_suite(&self) -> bool {
        self.children.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(
        default = "default_test_timeout",
        deserialize_with = "crate::configuration::deserialize::duration::deserialize"
    )]
    pub timeout: Duration,
    #[serde(
        default = "default_hook_timeout",
        deserialize_with = "crate::configuration::deserialize::duration::deserialize"
    )]
    pub hook_timeout: Duration,
    #[serde(default)]
    pub hooks: HookCommands,
    #[serde(default)]
    pub children: Vec<Entry>,
}

fn default_test_timeout() -> Duration {
    DEFAULT_TEST_TIMEOUT
}

fn default_hook_timeout() -> Duration {
    DEFAULT_HOOK_TIMEOUT
}

impl Manifest {
    pub fn from(file: PathBuf) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config
            .merge(File::from(file))?
            .merge(Environment::with_prefix(ENV_PREFIX))?;

        config.try_into()
    }
}
