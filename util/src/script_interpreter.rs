//! # Vehicle script interpreter module
//!
//! This module provides an interpreter for vehicle scripts, allowing
//! telecommands to be executed from these scripts.
//!
//! A script is a sequence of `<time_s>: <tc_json>;` entries, where the time is
//! measured from the start of the session. For example:
//!
//! ```text
//! 0.5: {"type": "VELOCITY", "speed": 40, "angle": 0};
//! 3.0: {"type": "TURN", "swing": 90};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use veh_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug)]
struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The Telecommand to run
    tc: Tc,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_tcs` to
/// acquire a list of telecommands that need executing.
#[derive(Debug)]
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    cmds: VecDeque<Command>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error),

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)"
    )]
    InvalidTimestamp(String),

    #[error("Script contains an invalid TC at {0} s: {1}")]
    InvalidTc(f64, TcParseError),

    #[error("Scripts can only be timed once a session has been started")]
    NoSession,
}

#[derive(Debug, PartialEq)]
pub enum PendingTcs {
    None,
    Some(Vec<Tc>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut si = Self::from_script(&script)?;
        si.script_path = Some(path);

        Ok(si)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script(script: &str) -> Result<Self, ScriptError> {
        let mut cmds: VecDeque<Command> = VecDeque::new();

        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            let exec_time_s: f64 = cap[1]
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            let tc = Tc::from_json(&cap[3]).map_err(|e| ScriptError::InvalidTc(exec_time_s, e))?;

            cmds.push_back(Command { exec_time_s, tc });
        }

        if cmds.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            script_path: None,
            cmds,
        })
    }

    /// Return the TCs which are due at the current session time.
    pub fn get_pending_tcs(&mut self) -> Result<PendingTcs, ScriptError> {
        let now_s = get_elapsed_seconds().ok_or(ScriptError::NoSession)?;
        Ok(self.get_pending_tcs_at(now_s))
    }

    /// Return the TCs which are due at the given time.
    ///
    /// TCs are returned in script order, and each TC is only returned once.
    pub fn get_pending_tcs_at(&mut self, current_time_s: f64) -> PendingTcs {
        // An empty queue means the script is over
        if self.cmds.is_empty() {
            return PendingTcs::EndOfScript;
        }

        let mut tc_vec: Vec<Tc> = vec![];

        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s >= current_time_s {
                break;
            }
            if let Some(cmd) = self.cmds.pop_front() {
                tc_vec.push(cmd.tc);
            }
        }

        if tc_vec.is_empty() {
            PendingTcs::None
        } else {
            PendingTcs::Some(tc_vec)
        }
    }

    /// Get the path the script was loaded from, if any
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    /// Get the number of TCs remaining in the script
    pub fn get_num_tcs(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }
}
