//! Common types and utilities shared across commands

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser};
use plugmunge_config::Config;
use std::path::PathBuf;

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

impl GlobalOpts {
    /// Effective verbosity: 0 warn, 1 debug, 2 trace
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Project location flags shared by the platform commands
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Platform to operate on (android, ios, ...)
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Native project root for the platform
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Directory holding installed plugins and the platform state files
    #[arg(long)]
    pub plugins_dir: Option<PathBuf>,
}

/// Project settings after merging flags over the user config
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub platform: String,
    pub project_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub xml_indent: usize,
}

impl ProjectArgs {
    pub fn resolve(&self, config: &Config) -> Result<ProjectContext> {
        let platform = self
            .platform
            .clone()
            .or_else(|| config.platform.clone())
            .ok_or_else(|| anyhow!("No platform given. Pass --platform or run `plugmunge config set platform <name>`"))?;
        let project_dir = self.project_dir.clone().unwrap_or_else(|| config.project_dir());
        let plugins_dir = self
            .plugins_dir
            .clone()
            .unwrap_or_else(|| config.plugins_dir(&project_dir));
        Ok(ProjectContext {
            platform,
            project_dir,
            plugins_dir,
            xml_indent: config.xml_indent(),
        })
    }
}

/// Parse `KEY=VALUE` into its parts
pub fn parse_variable(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid variable '{}', expected KEY=VALUE", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Invalid variable '{}', the name is empty", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
