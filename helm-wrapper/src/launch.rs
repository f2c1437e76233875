use std::{
  ffi::OsString,
  io::{self, Read, Write},
  path::Path,
  process::{Command, ExitStatus, Stdio},
};

use tracing::debug;

use crate::error::{Error, Result};

/// Finished run of the wrapped binary
#[derive(Debug)]
pub struct Launched {
  pub command: String,
  /// stdout and stderr interleaved in the order they were written
  pub output: Vec<u8>,
  pub status: ExitStatus,
}

impl Launched {
  /// Exit code to hand back to our own caller
  pub fn code(&self) -> i32 {
    self.status.code().unwrap_or(1)
  }
}

/// Run `binary` with `args`, capturing stdout and stderr through a single pipe
pub fn launch(binary: &Path, args: &[OsString]) -> Result<Launched> {
  let command = binary.display().to_string();
  debug!("Launching {command} with {} argument(s)", args.len());

  let spawn_error = |source| Error::Spawn {
    command: command.to_owned(),
    source,
  };

  let (mut reader, writer) = io::pipe()?;
  // The builder is a temporary so the parent's copies of the write end are closed once spawned,
  // otherwise reading below never sees EOF
  let mut child = Command::new(binary)
    .args(args)
    .stdin(Stdio::inherit())
    .stdout(writer.try_clone()?)
    .stderr(writer)
    .spawn()
    .map_err(spawn_error)?;

  let mut output = Vec::new();
  reader.read_to_end(&mut output)?;
  let status = child.wait()?;

  Ok(Launched {
    command,
    output,
    status,
  })
}

/// Write the captured output to `stdout` and return the exit code to terminate with
///
/// On failure the reason is reported on `stderr` after the output.
pub fn relay<O: Write, E: Write>(launched: &Launched, stdout: &mut O, stderr: &mut E) -> io::Result<i32> {
  stdout.write_all(&launched.output)?;
  stdout.flush()?;

  if !launched.status.success() {
    writeln!(stderr, "{}: {}", launched.command, launched.status)?;
  }

  Ok(launched.code())
}

#[cfg(test)]
mod tests {
  use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};

  use super::*;

  fn script(dir: &Path, body: &str) -> PathBuf {
    let binary = dir.join("helm-v2.16.7");
    fs::write(&binary, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
    binary
  }

  fn args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
  }

  #[test]
  fn it_forwards_arguments_verbatim() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = script(tmp.path(), r#"for a in "$@"; do printf '[%s]' "$a"; done"#);

    let launched = launch(&binary, &args(&["install", "--set", "a=b c", "--", "-x"])).unwrap();

    assert_eq!(String::from_utf8(launched.output).unwrap(), "[install][--set][a=b c][--][-x]");
    assert!(launched.status.success());
  }

  #[test]
  fn it_combines_stdout_and_stderr_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = script(tmp.path(), "echo one; echo two >&2; echo three");

    let launched = launch(&binary, &[]).unwrap();

    assert_eq!(String::from_utf8(launched.output).unwrap(), "one\ntwo\nthree\n");
  }

  #[test]
  fn it_relays_success() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = script(tmp.path(), "echo deployed");
    let launched = launch(&binary, &[]).unwrap();

    let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
    let code = relay(&launched, &mut stdout, &mut stderr).unwrap();

    assert_eq!(code, 0);
    assert_eq!(stdout, b"deployed\n");
    assert!(stderr.is_empty());
  }

  #[test]
  fn it_relays_failure_exit_code() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = script(tmp.path(), "echo 'Error: release not found'; exit 3");
    let launched = launch(&binary, &[]).unwrap();

    let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
    let code = relay(&launched, &mut stdout, &mut stderr).unwrap();

    assert_eq!(code, 3);
    assert_eq!(stdout, b"Error: release not found\n");
    assert!(String::from_utf8(stderr).unwrap().contains("exit status: 3"));
  }

  #[test]
  fn it_fails_on_missing_binary() {
    let tmp = tempfile::tempdir().unwrap();

    let err = launch(&tmp.path().join("helm-v0.0.0"), &[]).unwrap_err();

    assert!(matches!(err, Error::Spawn { .. }));
  }
}
