pub mod cargo_env {
    pub const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
}

pub mod common {
    use std::time::Duration;

    /// Prefix of environment variables overriding manifest values, e.g. `KURTEX_TIMEOUT`.
    pub const ENV_PREFIX: &str = "KURTEX";
    pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(10);
    pub const SHELL: &str = "sh";
}
