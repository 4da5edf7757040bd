//! External command execution.
//!
//! The site builder and the child server are both plain processes; this
//! module owns how they are assembled, run and reported.

use crate::log;
use anyhow::{Context, Result, bail};
use std::{
    ffi::OsString,
    path::Path,
    process::{Child, Command, Output, Stdio},
};

// ============================================================================
// Macros
// ============================================================================

/// Run a configured command vector with extra arguments, capturing output.
///
/// # Examples
/// ```ignore
/// exec!(["git"]; "status", "-s")?;
/// exec!(root; &config.build.command; "--out", output)?;
/// ```
#[macro_export]
macro_rules! exec {
    ($cmd:expr; $($arg:expr),* $(,)?) => {{
        $crate::utils::command::exec(
            None,
            &$crate::utils::command::to_cmd_vec($cmd),
            &$crate::utils::command::filter_args(&[$($crate::utils::command::to_os($arg)),*]),
        )
    }};
    ($root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {{
        $crate::utils::command::exec(
            Some($root),
            &$crate::utils::command::to_cmd_vec($cmd),
            &$crate::utils::command::filter_args(&[$($crate::utils::command::to_os($arg)),*]),
        )
    }};
}

// ============================================================================
// Argument Conversion
// ============================================================================

#[inline]
pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
    s.into()
}

/// Anything that names a program followed by its fixed arguments.
pub trait ToCmd {
    fn to_cmd(self) -> Vec<OsString>;
}

impl<const N: usize> ToCmd for [&str; N] {
    fn to_cmd(self) -> Vec<OsString> {
        self.into_iter().map(OsString::from).collect()
    }
}

impl ToCmd for &[String] {
    fn to_cmd(self) -> Vec<OsString> {
        self.iter().map(OsString::from).collect()
    }
}

impl ToCmd for &Vec<String> {
    fn to_cmd(self) -> Vec<OsString> {
        self.as_slice().to_cmd()
    }
}

impl ToCmd for Vec<OsString> {
    fn to_cmd(self) -> Vec<OsString> {
        self
    }
}

#[inline]
pub fn to_cmd_vec<C: ToCmd>(cmd: C) -> Vec<OsString> {
    cmd.to_cmd()
}

/// Drop empty arguments.
#[inline]
pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
    args.iter().filter(|a| !a.is_empty()).cloned().collect()
}

// ============================================================================
// Execution
// ============================================================================

/// Run a command to completion and log what it printed.
///
/// # Errors
/// Fails if the program can't be started or exits non-zero.
pub fn exec(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    log_output(&name, &output)?;
    Ok(output)
}

/// Start a long-running command with inherited stdio.
///
/// # Errors
/// Fails if the program can't be started.
pub fn spawn(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<Child> {
    let (name, mut command) = prepare(root, cmd, args)?;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    command
        .spawn()
        .with_context(|| format!("Failed to spawn `{name}`"))
}

fn prepare(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let Some((program, fixed)) = cmd.split_first() else {
        bail!("Empty command");
    };

    let name = Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned();

    let mut command = Command::new(program);
    command.args(fixed).args(args);

    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

// ============================================================================
// Output
// ============================================================================

/// Log non-blank output lines under the command name; on failure print
/// stderr (or stdout, when stderr is empty) and bail with the exit status.
fn log_output(name: &str, output: &Output) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let detail = match stderr.trim() {
            "" => stdout.trim(),
            s => s,
        };
        if !detail.is_empty() {
            eprintln!("{detail}");
        }
        bail!("Command `{name}` failed with {}", output.status);
    }

    for line in stdout.lines().chain(stderr.lines()) {
        if !line.trim().is_empty() {
            log!(name; "{line}");
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cmd_vec_config_command() {
        let v = vec!["astrodon".to_string(), "build".to_string()];
        let cmd = to_cmd_vec(&v);
        assert_eq!(cmd, vec![OsString::from("astrodon"), OsString::from("build")]);
    }

    #[test]
    fn test_filter_args() {
        let args = [OsString::from("a"), OsString::from(""), OsString::from("b")];
        assert_eq!(filter_args(&args), vec![OsString::from("a"), OsString::from("b")]);
    }

    #[test]
    fn test_prepare_empty() {
        assert!(prepare(None, &[], &[]).is_err());
    }

    #[test]
    fn test_prepare_uses_program_file_name() {
        let cmd = to_cmd_vec(["/usr/bin/env", "true"]);
        let (name, command) = prepare(None, &cmd, &[OsString::from("x")]).unwrap();

        assert_eq!(name, "env");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, ["true", "x"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_success_and_failure() {
        assert!(exec!(["true"];).is_ok());

        let err = exec!(["false"];).unwrap_err();
        assert!(err.to_string().contains("`false` failed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_runs_in_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = exec!(dir.path(); ["pwd"];).unwrap();
        let printed = String::from_utf8_lossy(&output.stdout);

        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(printed.trim()).canonicalize().unwrap(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_and_reap() {
        let mut child = spawn(None, &to_cmd_vec(["sleep"]), &[OsString::from("5")]).unwrap();
        child.kill().unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
