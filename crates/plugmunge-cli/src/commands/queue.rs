//! `queue-install` and `queue-uninstall`
//!
//! Both only touch the platform state file. Project files change on the
//! next `prepare`.

use crate::common::{parse_variable, ProjectArgs};
use crate::plugin_info::PluginInfo;
use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Args;
use plugmunge_config::Config;
use plugmunge_logger as logger;
use plugmunge_state::{InstallRequest, PlatformState, UninstallRequest, Variables};

#[derive(Args, Debug, Clone)]
pub struct QueueInstallArgs {
    /// Plugin id, also the directory name under the plugins directory
    pub plugin: String,

    /// Plugin variable as KEY=VALUE, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Overwrite edit-config changes of conflicting plugins
    #[arg(long)]
    pub force: bool,

    /// Record the plugin as a dependency of another plugin
    #[arg(long)]
    pub dependent: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Args, Debug, Clone)]
pub struct QueueUninstallArgs {
    pub plugin: String,

    /// The plugin was installed as a dependency
    #[arg(long)]
    pub dependent: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn handle_queue_install(args: QueueInstallArgs, _opts: &GlobalOpts) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let ctx = args.project.resolve(&config)?;
    logger::set_current_platform(Some(ctx.platform.clone()));

    let vars = args
        .vars
        .iter()
        .map(String::as_str)
        .map(parse_variable)
        .collect::<Result<Variables>>()?;

    // Fail now on a missing or malformed manifest rather than during prepare
    let plugin_dir = ctx.plugins_dir.join(&args.plugin);
    let info = PluginInfo::load(&plugin_dir)
        .with_context(|| format!("Cannot read plugin '{}' from {}", args.plugin, plugin_dir.display()))?;
    logger::debug(&format!("Found {} {} at {}", info.id, info.version, plugin_dir.display()));

    let mut state = PlatformState::load(&ctx.plugins_dir, &ctx.platform)?;
    // Its changes are already applied; only the ownership record moves
    if !args.dependent && state.make_top_level(&args.plugin) {
        state.save()?;
        logger::success(&format!("Promoted {} to a top-level plugin on {}", args.plugin, ctx.platform));
        return Ok(());
    }

    let mut request = InstallRequest::new(args.plugin.as_str(), vars);
    request.top_level = !args.dependent;
    request.force = args.force;
    state.queue_install(request)?;
    state.save()?;

    logger::success(&format!("Queued {} for install on {}", args.plugin, ctx.platform));
    Ok(())
}

pub fn handle_queue_uninstall(args: QueueUninstallArgs, _opts: &GlobalOpts) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let ctx = args.project.resolve(&config)?;
    logger::set_current_platform(Some(ctx.platform.clone()));

    let mut state = PlatformState::load(&ctx.plugins_dir, &ctx.platform)?;
    let top_level = !(args.dependent || state.is_plugin_dependent(&args.plugin));
    state.queue_uninstall(UninstallRequest::new(args.plugin.as_str(), top_level))?;
    state.save()?;

    logger::success(&format!("Queued {} for uninstall on {}", args.plugin, ctx.platform));
    Ok(())
}
