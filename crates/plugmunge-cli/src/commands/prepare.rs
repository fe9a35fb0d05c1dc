use crate::common::ProjectArgs;
use crate::config_parser::ConfigParser;
use crate::errors::MungeError;
use crate::munger::PlatformMunger;
use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Args;
use plugmunge_config::Config;
use plugmunge_logger as logger;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    /// App manifest whose config-file and edit-config entries are applied
    /// after the queued plugins
    #[arg(long, value_name = "PATH")]
    pub app_config: Option<PathBuf>,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReapplyArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Drain the prepare queue, apply the app manifest and save
pub fn handle_prepare(args: PrepareArgs, _opts: &GlobalOpts) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let ctx = args.project.resolve(&config)?;
    logger::set_current_platform(Some(ctx.platform.clone()));

    let parser = args
        .app_config
        .as_deref()
        .map(ConfigParser::load)
        .transpose()?;

    let mut munger = PlatformMunger::open(&ctx.platform, &ctx.project_dir, &ctx.plugins_dir)?
        .with_indent(ctx.xml_indent);
    let queue = munger.state().root.prepare_queue.clone();
    logger::debug(&format!(
        "{} queued installs, {} queued uninstalls",
        queue.installed.len(),
        queue.uninstalled.len()
    ));

    logger::spinner_start(&format!("Preparing {}", ctx.platform));
    let result = (|| -> Result<(), MungeError> {
        munger.process(&ctx.plugins_dir)?;
        if let Some(parser) = &parser {
            munger.add_config_changes(parser, true)?;
        }
        munger.save_all()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            logger::spinner_success(&format!(
                "Prepared {} ({} installed, {} removed)",
                ctx.platform,
                queue.installed.len(),
                queue.uninstalled.len()
            ));
            Ok(())
        }
        Err(e) => {
            logger::spinner_error(&format!("Prepare failed for {}", ctx.platform));
            Err(e.into())
        }
    }
}

/// Graft the recorded munge into the project files again
pub fn handle_reapply(args: ReapplyArgs, _opts: &GlobalOpts) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let ctx = args.project.resolve(&config)?;
    logger::set_current_platform(Some(ctx.platform.clone()));

    let mut munger = PlatformMunger::open(&ctx.platform, &ctx.project_dir, &ctx.plugins_dir)?
        .with_indent(ctx.xml_indent);
    munger.reapply_global_munge()?.save_all()?;

    logger::success(&format!("Reapplied config changes to {}", ctx.platform));
    Ok(())
}
