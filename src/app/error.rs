use crate::app::hooks::LifetimeHook;
use std::time::Duration;
use thiserror::Error;

/// Faults in the shape of the collected tree. Any of these aborts the run
/// before a single test body executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("cannot register {what}: no suite is open for registration")]
    NoOpenSuite { what: String },
    #[error("'{identifier}' is already declared in suite '{parent}'")]
    DuplicateIdentifier { parent: String, identifier: String },
    #[error("factory of suite '{suite}' panicked during collection: {message}")]
    FactoryPanicked { suite: String, message: String },
    #[error("collection has already been finished")]
    AlreadyCollected,
    #[error("run modes of the collected tree have not been resolved")]
    Unresolved,
}

/// Why a single node failed. Cloned onto every test blocked by a failing
/// `beforeAll` hook.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    #[error("{0}")]
    Error(String),
    #[error("panicked: {0}")]
    Panic(String),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{hook} hook failed: {cause}")]
    Hook {
        hook: LifetimeHook,
        cause: Box<Failure>,
    },
    #[error("{0} nested failure(s)")]
    Nested(usize),
}

impl Failure {
    pub fn in_hook(self, hook: LifetimeHook) -> Self {
        Failure::Hook {
            hook,
            cause: Box::new(self),
        }
    }

    /// The innermost failure, looking through hook wrappers.
    pub fn root_cause(&self) -> &Failure {
        match self {
            Failure::Hook { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("failed to load manifest: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to write report: {0}")]
    Report(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_failure_message_names_hook_and_cause() {
        let failure = Failure::Error("boom".to_owned()).in_hook(LifetimeHook::BeforeAll);

        assert_eq!(failure.to_string(), "beforeAll hook failed: boom");
        assert_eq!(failure.root_cause(), &Failure::Error("boom".to_owned()));
    }

    #[test]
    fn test_timeout_message_in_millis() {
        let failure = Failure::Timeout(Duration::from_millis(250));

        assert_eq!(failure.to_string(), "timed out after 250ms");
    }
}
