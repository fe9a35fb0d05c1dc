use crate::common::ProjectArgs;
use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indexmap::IndexMap;
use plugmunge_config::Config;
use plugmunge_state::{PlatformState, PluginStatus, Variables};

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Only show this plugin
    pub plugin: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Every plugin the state knows about, installed ones first
pub fn known_plugins(state: &PlatformState) -> Vec<String> {
    let root = &state.root;
    let mut seen: Vec<String> = Vec::new();
    let names = root
        .installed_plugins
        .keys()
        .chain(root.dependent_plugins.keys())
        .chain(root.prepare_queue.installed.iter().map(|r| &r.plugin))
        .chain(root.prepare_queue.uninstalled.iter().map(|r| &r.plugin));
    for name in names {
        if !seen.contains(name) {
            seen.push(name.clone());
        }
    }
    seen
}

fn format_vars(vars: &Variables) -> String {
    vars.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(status: &PluginStatus) -> String {
    match status {
        PluginStatus::Queued { action, vars } => {
            let action = serde_json::to_value(action)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            format!("{} {}", format!("queued {}", action).yellow(), format_vars(vars))
        }
        PluginStatus::Installed { vars, top_level } => {
            let label = if *top_level { "installed" } else { "installed (dependent)" };
            format!("{} {}", label.green(), format_vars(vars))
        }
        PluginStatus::Absent => "absent".dimmed().to_string(),
    }
}

pub fn handle_status(args: StatusArgs, _opts: &GlobalOpts) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let ctx = args.project.resolve(&config)?;
    let state = PlatformState::load(&ctx.plugins_dir, &ctx.platform)?;

    let plugins = match args.plugin {
        Some(plugin) => vec![plugin],
        None => known_plugins(&state),
    };
    let statuses: IndexMap<String, PluginStatus> = plugins
        .into_iter()
        .map(|plugin| {
            let status = state.status(&plugin);
            (plugin, status)
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("{} {}", "Platform:".bold().green(), ctx.platform);
    if statuses.is_empty() {
        println!("  {}", "(no plugins)".yellow());
    }
    for (plugin, status) in &statuses {
        println!("  {}: {}", plugin.cyan(), describe(status).trim_end());
    }
    println!(
        "  {} {}",
        "applied fragments:".dimmed(),
        state.root.config_munge.fragment_count()
    );
    Ok(())
}
