use std::process::Command;

use regex_lite::Regex;
use semver::Version;

use crate::error::{Error, Result};

/// Validate that `ver` is a single semantic version, with or without a leading `v`
///
/// Pre-release and build metadata suffixes are accepted, surrounding text is not.
pub fn get_semver(ver: &str) -> Result<Version> {
  let re = Regex::new(r"^v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)$")?;

  match re.captures(ver).and_then(|cap| cap.get(1)) {
    Some(cap) => Version::parse(cap.as_str()).map_err(|_| Error::UnexpectedOutput(ver.to_owned())),
    None => Err(Error::UnexpectedOutput(ver.to_owned())),
  }
}

#[derive(Debug)]
pub struct CmdResult {
  pub stdout: String,
  pub stderr: String,
  pub status: i32,
}

impl CmdResult {
  pub fn success(&self) -> bool {
    self.status == 0
  }
}

/// Execute a command and collect its output
pub fn cmd_exec(cmd: &mut Command) -> Result<CmdResult> {
  let output = cmd.output().map_err(|source| Error::Spawn {
    command: describe(cmd),
    source,
  })?;

  Ok(CmdResult {
    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    status: output.status.code().unwrap_or(1),
  })
}

/// Render a command line for error messages
pub fn describe(cmd: &Command) -> String {
  let mut line = cmd.get_program().to_string_lossy().to_string();
  for arg in cmd.get_args() {
    line.push(' ');
    line.push_str(&arg.to_string_lossy());
  }
  line
}
