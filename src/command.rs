use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Build a command that runs `program` through the privilege wrapper
/// (e.g. `sudo`), or directly when no wrapper is configured.
pub fn privileged<S: AsRef<OsStr>>(wrapper: Option<&str>, program: S) -> Command {
    match wrapper {
        Some(wrapper) => {
            let mut cmd = Command::new(wrapper);
            cmd.arg(program);
            cmd
        }
        None => Command::new(program),
    }
}

/// Run a privileged helper to completion, failing on a non-zero exit.
pub fn run_privileged(wrapper: Option<&str>, program: &str, args: &[&OsStr]) -> Result<()> {
    let display = describe(wrapper, program, args);
    let output = privileged(wrapper, program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Command {
            command: display.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Command {
            command: display,
            reason: format!("{} ({})", stderr.trim(), output.status),
        });
    }

    Ok(())
}

fn describe(wrapper: Option<&str>, program: &str, args: &[&OsStr]) -> String {
    let mut parts: Vec<String> = wrapper.into_iter().map(String::from).collect();
    parts.push(program.to_string());
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
