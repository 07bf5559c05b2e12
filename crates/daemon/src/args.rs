// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command line of `cape-workflow`.
//!
//! The daemon is started by the launcher, never by hand, so parsing is kept
//! to a fixed positional shape plus two directory overrides.

use cape_core::{CapePaths, PathsError, WorkflowId};
use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str =
    "Usage: cape-workflow <issue_id> <workflow_id> [--data-dir PATH] [--runtime-dir PATH]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("missing argument <{0}>")]
    Missing(&'static str),
    #[error("invalid issue id '{0}'")]
    IssueId(String),
    #[error("invalid workflow id '{0}'")]
    WorkflowId(String),
    #[error("option '{0}' requires a value")]
    MissingValue(String),
    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonArgs {
    pub issue_id: i64,
    pub workflow_id: WorkflowId,
    pub data_dir: Option<PathBuf>,
    pub runtime_dir: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(DaemonArgs),
    Help,
    Version,
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> Result<Invocation, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut positional = Vec::new();
    let mut data_dir = None;
    let mut runtime_dir = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Ok(Invocation::Help),
            "--version" | "-V" | "-v" => return Ok(Invocation::Version),
            "--data-dir" => data_dir = Some(value_of(&arg, args.next())?),
            "--runtime-dir" => runtime_dir = Some(value_of(&arg, args.next())?),
            flag if flag.starts_with("--") => return Err(ArgsError::Unexpected(flag.to_string())),
            _ if positional.len() < 2 => positional.push(arg),
            _ => return Err(ArgsError::Unexpected(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let issue = positional.next().ok_or(ArgsError::Missing("issue_id"))?;
    let id = positional.next().ok_or(ArgsError::Missing("workflow_id"))?;

    let issue_id = issue.parse::<i64>().map_err(|_| ArgsError::IssueId(issue))?;
    let workflow_id = WorkflowId::parse(&id).ok_or(ArgsError::WorkflowId(id))?;

    Ok(Invocation::Run(DaemonArgs {
        issue_id,
        workflow_id,
        data_dir,
        runtime_dir,
    }))
}

fn value_of(flag: &str, value: Option<String>) -> Result<PathBuf, ArgsError> {
    value
        .map(PathBuf::from)
        .ok_or_else(|| ArgsError::MissingValue(flag.to_string()))
}

impl DaemonArgs {
    /// Directory layout: explicit flags win over the environment.
    pub fn paths(&self) -> Result<CapePaths, PathsError> {
        let paths = match &self.data_dir {
            Some(base) => CapePaths::new(base),
            None => CapePaths::from_env()?,
        };
        Ok(match &self.runtime_dir {
            Some(runtime) => paths.with_runtime_dir(runtime),
            None => paths,
        })
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
