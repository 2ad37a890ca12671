// Helpers for driving external command-line tools (poppler, tesseract, ...)
use anyhow::{bail, Context, Result};
use std::process::{Command, Stdio};

/// True when `program` can be spawned at all.
pub fn command_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Runs the command and returns stdout as UTF-8 (lossy). Non-zero exits
/// fail with the last lines of stderr.
pub fn run_to_string(command: &mut Command) -> Result<String> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .output()
        .with_context(|| format!("failed to run {}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" | ");
        bail!("{} exited with {}: {}", program, output.status, tail.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
