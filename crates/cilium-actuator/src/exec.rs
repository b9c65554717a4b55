use crate::ActuatorError;
use std::process::Command;
use tracing::{debug, error};

/// Runs one shell command line and returns its stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str) -> Result<String, ActuatorError>;
}

/// Executes through `/bin/sh -c`, so the command line may carry quoted
/// arguments such as a pipework route.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<String, ActuatorError> {
        debug!("executing {command}");
        let output = Command::new("/bin/sh").arg("-c").arg(command).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("stdout: '{stdout}'");
        if !output.status.success() {
            error!("command '{command}' exited with {}: {stderr}", output.status);
            return Err(ActuatorError::CommandFailed {
                command: command.to_owned(),
                stderr: stderr.trim().to_owned(),
            });
        }
        Ok(stdout)
    }
}
