//! Host that declares tests and hooks from a [`Manifest`], running each of
//! them as a shell command.

use crate::app::collector::{into_callback, HostBridge};
use crate::app::error::StructuralError;
use crate::app::hooks::LifetimeHook;
use crate::app::node::{TaskResult, TestCallback};
use crate::configuration::constants::common::SHELL;
use crate::configuration::manifest::{Entry, HookCommands, Manifest};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
#[error("`{command}` exited with {status}{}", stderr_suffix(.stderr))]
pub struct CommandError {
    pub command: String,
    pub status: ExitStatus,
    pub stderr: String,
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Registers everything `manifest` declares through `bridge`, starting at the
/// currently open suite.
pub fn declare(manifest: &Manifest, bridge: &mut dyn HostBridge) -> Result<(), StructuralError> {
    register_hooks(&manifest.hooks, bridge)?;
    for entry in &manifest.children {
        declare_entry(entry, bridge)?;
    }
    Ok(())
}

fn declare_entry(entry: &Entry, bridge: &mut dyn HostBridge) -> Result<(), StructuralError> {
    match &entry.children {
        Some(children) => bridge.register_collector_node(
            entry.name.clone(),
            Box::new(move |bridge: &mut dyn HostBridge| -> Result<(), StructuralError> {
                register_hooks(&entry.hooks, bridge)?;
                for child in children {
                    declare_entry(child, bridge)?;
                }
                Ok(())
            }),
            entry.mode,
        ),
        None => bridge.register_collector_task(
            entry.name.clone(),
            entry.run.clone().map(command),
            entry.mode,
        ),
    }
}

fn register_hooks(hooks: &HookCommands, bridge: &mut dyn HostBridge) -> Result<(), StructuralError> {
    let groups = [
        (LifetimeHook::BeforeAll, &hooks.before_all),
        (LifetimeHook::AfterAll, &hooks.after_all),
        (LifetimeHook::BeforeEach, &hooks.before_each),
        (LifetimeHook::AfterEach, &hooks.after_each),
    ];
    for (hook, commands) in groups.iter() {
        for line in commands.iter() {
            bridge.register_lifetime_hook(*hook, command(line.clone()))?;
        }
    }
    Ok(())
}

/// Wraps a shell command line into a callback. A non-zero exit is a failure.
pub fn command(line: String) -> TestCallback {
    into_callback(move || run(line.clone()))
}

async fn run(line: String) -> TaskResult {
    debug!("Running `{}`", line);
    let output = Command::new(SHELL)
        .arg("-c")
        .arg(&line)
        .kill_on_drop(true)
        .output()
        .await?;
    if output.status.success() {
        trace!("`{}` succeeded", line);
        return Ok(());
    }
    Err(CommandError {
        command: line,
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    }
    .into())
}
