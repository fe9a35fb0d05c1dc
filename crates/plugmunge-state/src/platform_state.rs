//! Persisted per-platform state - loading, saving, and queue bookkeeping
//!
//! One JSON file per platform lives at `<plugins_dir>/<platform>.json`. It
//! records the applied munge, installed and dependent plugins, and the
//! pending prepare queue.
//!
//! There is no locking. Two processes preparing the same platform at once
//! will overwrite each other's state; callers must serialize access.

use crate::errors::StateError;
use crate::types::{
    FileMunge, Fragment, InstallRequest, Munge, PluginStatus, PrepareQueue, QueuedAction,
    UninstallRequest, Variables,
};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk content of a platform state file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformRecord {
    #[serde(default)]
    pub prepare_queue: PrepareQueue,
    #[serde(default, deserialize_with = "deserialize_munge")]
    pub config_munge: Munge,
    /// Munge last applied from the app manifest
    #[serde(rename = "config_xml_munge", default, deserialize_with = "deserialize_munge")]
    pub app_munge: Munge,
    #[serde(default)]
    pub installed_plugins: IndexMap<String, Variables>,
    #[serde(default)]
    pub dependent_plugins: IndexMap<String, Variables>,
    /// Keys written by other tools, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept both the current `{files: {f: {parents: {s: [..]}}}}` layout and
/// the legacy `{f: {s: {xml: count}}}` one.
fn deserialize_munge<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Munge, D::Error> {
    let value = Value::deserialize(deserializer)?;
    fix_munge(value).map_err(serde::de::Error::custom)
}

/// Convert a raw munge value, migrating the legacy layout
pub fn fix_munge(value: Value) -> Result<Munge, serde_json::Error> {
    let Value::Object(map) = value else {
        return Ok(Munge::default());
    };
    if map.is_empty() || map.contains_key("files") {
        return serde_json::from_value(Value::Object(map));
    }

    debug!("Migrating legacy munge layout");
    let mut munge = Munge::default();
    for (file, selectors) in map {
        let Value::Object(selectors) = selectors else {
            continue;
        };
        let file_munge: &mut FileMunge = munge.files.entry(file).or_default();
        for (selector, entries) in selectors {
            let Value::Object(entries) = entries else {
                continue;
            };
            let list = file_munge.parents.entry(selector).or_default();
            for (xml, count) in entries {
                let mut fragment = Fragment::new(xml);
                fragment.count = count.as_u64().map_or(1, |c| c as u32);
                list.push(fragment);
            }
        }
    }
    Ok(munge)
}

/// Platform state bound to its file
#[derive(Debug, Clone)]
pub struct PlatformState {
    pub path: PathBuf,
    pub platform: String,
    pub root: PlatformRecord,
}

impl PlatformState {
    /// Path of the state file for `platform`
    pub fn path_for(plugins_dir: &Path, platform: &str) -> PathBuf {
        plugins_dir.join(format!("{platform}.json"))
    }

    /// Load the state for `platform`, starting empty when no file exists
    pub fn load(plugins_dir: &Path, platform: &str) -> Result<Self, StateError> {
        let path = Self::path_for(plugins_dir, platform);
        let root = if path.exists() {
            debug!("Loading platform state from {:?}", path);
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                PlatformRecord::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            PlatformRecord::default()
        };
        Ok(PlatformState {
            path,
            platform: platform.to_string(),
            root,
        })
    }

    /// Write the state with an atomic rename
    pub fn save(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.root)?;
        let temp_path = self.path.with_extension("json.tmp");
        {
            let file = std::fs::File::create(&temp_path)?;
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(content.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &self.path)?;
        info!("Saved {} state to {:?}", self.platform, self.path);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Installed plugins
    // -------------------------------------------------------------------------

    pub fn add_plugin(&mut self, plugin: &str, vars: Variables, top_level: bool) {
        let list = if top_level {
            &mut self.root.installed_plugins
        } else {
            &mut self.root.dependent_plugins
        };
        list.insert(plugin.to_string(), vars);
    }

    pub fn remove_plugin(&mut self, plugin: &str, top_level: bool) {
        let list = if top_level {
            &mut self.root.installed_plugins
        } else {
            &mut self.root.dependent_plugins
        };
        list.shift_remove(plugin);
    }

    pub fn is_plugin_top_level(&self, plugin: &str) -> bool {
        self.root.installed_plugins.contains_key(plugin)
    }

    pub fn is_plugin_dependent(&self, plugin: &str) -> bool {
        self.root.dependent_plugins.contains_key(plugin)
    }

    pub fn is_plugin_installed(&self, plugin: &str) -> bool {
        self.is_plugin_top_level(plugin) || self.is_plugin_dependent(plugin)
    }

    pub fn installed_vars(&self, plugin: &str) -> Option<&Variables> {
        self.root
            .installed_plugins
            .get(plugin)
            .or_else(|| self.root.dependent_plugins.get(plugin))
    }

    /// Promote a dependent plugin to top level
    pub fn make_top_level(&mut self, plugin: &str) -> bool {
        match self.root.dependent_plugins.shift_remove(plugin) {
            Some(vars) => {
                self.root.installed_plugins.insert(plugin.to_string(), vars);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Prepare queue
    // -------------------------------------------------------------------------

    fn queued_install(&self, plugin: &str) -> Option<&InstallRequest> {
        self.root.prepare_queue.installed.iter().find(|r| r.plugin == plugin)
    }

    fn queued_uninstall(&self, plugin: &str) -> Option<&UninstallRequest> {
        self.root.prepare_queue.uninstalled.iter().find(|r| r.plugin == plugin)
    }

    pub fn status(&self, plugin: &str) -> PluginStatus {
        match (self.queued_install(plugin), self.queued_uninstall(plugin)) {
            (Some(install), Some(_)) => PluginStatus::Queued {
                action: QueuedAction::Reinstall,
                vars: install.vars.clone(),
            },
            (Some(install), None) => PluginStatus::Queued {
                action: QueuedAction::Install,
                vars: install.vars.clone(),
            },
            (None, Some(_)) => PluginStatus::Queued {
                action: QueuedAction::Uninstall,
                vars: self.installed_vars(plugin).cloned().unwrap_or_default(),
            },
            (None, None) => match self.installed_vars(plugin) {
                Some(vars) => PluginStatus::Installed {
                    vars: vars.clone(),
                    top_level: self.is_plugin_top_level(plugin),
                },
                None => PluginStatus::Absent,
            },
        }
    }

    /// Queue an install. An installed plugin may only be queued again when
    /// it is also queued for uninstall, which makes the pair a reinstall.
    pub fn queue_install(&mut self, request: InstallRequest) -> Result<(), StateError> {
        let plugin = request.plugin.clone();
        if self.queued_install(&plugin).is_some() {
            return Err(StateError::AlreadyQueued(plugin, "install"));
        }
        if self.is_plugin_installed(&plugin) && self.queued_uninstall(&plugin).is_none() {
            return Err(StateError::AlreadyInstalled(plugin));
        }
        debug!("Queueing {} for install on {}", plugin, self.platform);
        self.root.prepare_queue.installed.push(request);
        Ok(())
    }

    /// Queue an uninstall. A pending install of a plugin that is not
    /// installed yet is cancelled instead.
    pub fn queue_uninstall(&mut self, request: UninstallRequest) -> Result<(), StateError> {
        let plugin = request.plugin.clone();
        if self.queued_uninstall(&plugin).is_some() {
            return Err(StateError::AlreadyQueued(plugin, "uninstall"));
        }
        if !self.is_plugin_installed(&plugin) {
            if self.queued_install(&plugin).is_some() {
                debug!("Cancelling queued install of {}", plugin);
                self.root.prepare_queue.installed.retain(|r| r.plugin != plugin);
                return Ok(());
            }
            return Err(StateError::NotInstalled(plugin));
        }
        debug!("Queueing {} for uninstall on {}", plugin, self.platform);
        self.root.prepare_queue.uninstalled.push(request);
        Ok(())
    }

    /// Check that no plugin is queued twice in one direction and that a
    /// plugin queued both ways is an installed plugin being reinstalled
    pub fn validate_queue(&self) -> Result<(), StateError> {
        let queue = &self.root.prepare_queue;
        for (idx, request) in queue.installed.iter().enumerate() {
            if queue.installed[..idx].iter().any(|r| r.plugin == request.plugin) {
                return Err(StateError::InvalidQueue(format!(
                    "{} is queued for install more than once",
                    request.plugin
                )));
            }
            if self.queued_uninstall(&request.plugin).is_some() && !self.is_plugin_installed(&request.plugin) {
                return Err(StateError::InvalidQueue(format!(
                    "{} is queued for install and uninstall but is not installed",
                    request.plugin
                )));
            }
        }
        for (idx, request) in queue.uninstalled.iter().enumerate() {
            if queue.uninstalled[..idx].iter().any(|r| r.plugin == request.plugin) {
                return Err(StateError::InvalidQueue(format!(
                    "{} is queued for uninstall more than once",
                    request.plugin
                )));
            }
        }
        Ok(())
    }

    pub fn clear_queue(&mut self) {
        self.root.prepare_queue = PrepareQueue::default();
    }
}
