// src/app/launch.rs
// External player and file-manager launch. Both spawn detached and only
// report whether the spawn itself worked.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{info, warn};

use crate::app::error::LaunchError;
use crate::config::AppConfig;

/// Program + arguments, kept separate from `Command` so it can be inspected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, a: impl Into<OsString>) -> Self {
        self.args.push(a.into());
        self
    }
}

/// System opener for a path.
fn opener(target: &Path) -> LaunchCommand {
    if cfg!(target_os = "macos") {
        LaunchCommand::new("open").arg(target)
    } else if cfg!(target_os = "windows") {
        // empty title argument so `start` does not eat a quoted path
        LaunchCommand::new("cmd").arg("/C").arg("start").arg("").arg(target)
    } else {
        LaunchCommand::new("xdg-open").arg(target)
    }
}

/// `player_cmd` split on whitespace with the file appended, or the system
/// opener when no player is configured.
pub fn play_command(player_cmd: Option<&str>, file: &Path) -> Result<LaunchCommand, LaunchError> {
    let Some(cmd) = player_cmd else {
        return Ok(opener(file));
    };
    let mut parts = cmd.split_whitespace();
    let program = parts.next().ok_or(LaunchError::EmptyCommand)?;
    let cmd_line = parts.fold(LaunchCommand::new(program), |acc, a| acc.arg(a));
    Ok(cmd_line.arg(file))
}

pub fn reveal_command(target: &Path) -> LaunchCommand {
    if cfg!(target_os = "macos") {
        LaunchCommand::new("open").arg("-R").arg(target)
    } else if cfg!(target_os = "windows") {
        let mut select = OsString::from("/select,");
        select.push(target.as_os_str());
        LaunchCommand::new("explorer").arg(select)
    } else {
        // no portable "select in folder"; open the containing directory
        let dir = if target.is_dir() {
            target
        } else {
            target.parent().unwrap_or(target)
        };
        LaunchCommand::new("xdg-open").arg(dir)
    }
}

fn spawn_detached(cmd_line: &LaunchCommand) -> Result<(), LaunchError> {
    let mut child = Command::new(&cmd_line.program)
        .args(&cmd_line.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: cmd_line.program.to_string_lossy().into_owned(),
            source,
        })?;
    // reap in the background so the child never lingers as a zombie
    thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

pub fn play(cfg: &AppConfig, file: &Path) -> Result<(), LaunchError> {
    if !file.exists() {
        return Err(LaunchError::MissingPath(file.to_path_buf()));
    }
    let cmd_line = play_command(cfg.player_cmd.as_deref(), file)?;
    info!("Launching player {:?} for {}", cmd_line.program, file.display());
    spawn_detached(&cmd_line).inspect_err(|e| warn!("Play failed: {e}"))
}

pub fn reveal(target: &Path) -> Result<(), LaunchError> {
    if !target.exists() {
        return Err(LaunchError::MissingPath(target.to_path_buf()));
    }
    let cmd_line = reveal_command(target);
    info!("Revealing {}", target.display());
    spawn_detached(&cmd_line).inspect_err(|e| warn!("Reveal failed: {e}"))
}
