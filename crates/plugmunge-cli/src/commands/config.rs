use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use plugmunge_config::Config;
use plugmunge_logger as logger;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print every configured value
    Show,
    /// Set a configuration value (project-dir, plugins-dir, platform, xml-indent)
    Set { key: String, value: String },
    /// Get or set the path to the config file.
    /// If `new_path` is provided, later runs read the configuration from there.
    /// If omitted, the current configuration file path is printed.
    Path {
        /// Optional new config path to set
        new_path: Option<String>,
    },
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<()> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = Config::load().context("Failed to load config")?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load().context("Failed to load config")?;
            config.set(&key, value.clone()).with_context(|| {
                format!("Currently supported keys: {}", Config::KEYS.join(", "))
            })?;
            config.save().context("Failed to save config")?;
            logger::success(&format!("Set {} = {}", key, value));
        }
        ConfigAction::Path { new_path } => {
            let config_path = Config::path();
            logger::debug(&format!("Reading config from: {}", config_path.display()));
            let pointer_path = Config::pointer_path();

            match (new_path, pointer_path) {
                (Some(p), Some(pointer)) => {
                    if let Some(parent) = pointer.parent() {
                        std::fs::create_dir_all(parent).context("Failed to set config path")?;
                    }
                    std::fs::write(&pointer, p.as_bytes()).context("Failed to set config path")?;
                    logger::success(&format!("Config path set to {}", p));
                }
                (Some(_), None) => anyhow::bail!("Failed to set config path: no home directory"),
                (None, pointer) => {
                    println!("{}", config_path.display());
                    let overridden = pointer
                        .and_then(|p| std::fs::read_to_string(p).ok())
                        .map(|contents| contents.trim().to_string())
                        .filter(|trimmed| !trimmed.is_empty());
                    if let Some(target) = overridden {
                        println!("{} {}", "overridden-by".cyan(), target);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_is_rejected_before_saving() {
        let Ok(dir) = tempfile::TempDir::new() else {
            return;
        };
        let path = dir.path().join("plugmunge.toml");
        std::env::set_var("PLUGMUNGE_CONFIG", &path);
        let result = handle_config(
            Some(ConfigAction::Set {
                key: "color".to_string(),
                value: "blue".to_string(),
            }),
            &GlobalOpts::default(),
        );
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
