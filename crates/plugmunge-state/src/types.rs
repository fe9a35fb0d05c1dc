//! Serializable types for munges and platform state
//!
//! The JSON shape is shared with existing platform state files, so field
//! names follow the on-disk keys (`oldAttrib`, `topLevel`, `config_munge`).

use indexmap::IndexMap;
use plugmunge_tree::{Attributes, EditMode};
use serde::{Deserialize, Serialize};

/// Plugin variables, in declaration order
pub type Variables = IndexMap<String, String>;

/// Owner id used for fragments declared by the app manifest
pub const APP_CONFIG_OWNER: &str = "config.xml";

// =============================================================================
// MUNGE
// =============================================================================

fn default_count() -> u32 {
    1
}

/// One counted change at a (file, selector) location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub xml: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EditMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Target attributes captured the first time an attribute edit applied
    #[serde(rename = "oldAttrib", default, skip_serializing_if = "Option::is_none")]
    pub old_attrib: Option<Attributes>,
    /// Plugin that declared an edit-config fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    /// Set to [`APP_CONFIG_OWNER`] for fragments from the app manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Fragment {
    pub fn new(xml: impl Into<String>) -> Self {
        Fragment {
            xml: xml.into(),
            count: 1,
            mode: None,
            after: None,
            old_attrib: None,
            plugin: None,
            id: None,
        }
    }

    pub fn with_mode(mut self, mode: Option<EditMode>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_after(mut self, after: Option<String>) -> Self {
        self.after = after;
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Plugin id or app-manifest id that declared this fragment
    pub fn owner(&self) -> Option<&str> {
        self.plugin.as_deref().or(self.id.as_deref())
    }

    pub fn is_from_app_config(&self) -> bool {
        self.id.as_deref() == Some(APP_CONFIG_OWNER)
    }

    /// True for merge/overwrite/remove edits, which target attributes
    pub fn is_attribute_edit(&self) -> bool {
        self.mode.is_some()
    }
}

/// Fragment lists of one file, keyed by selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMunge {
    #[serde(default)]
    pub parents: IndexMap<String, Vec<Fragment>>,
}

/// Reference-counted change set: file → selector → fragments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Munge {
    #[serde(default)]
    pub files: IndexMap<String, FileMunge>,
}

// =============================================================================
// PREPARE QUEUE
// =============================================================================

fn default_true() -> bool {
    true
}

/// Pending install request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallRequest {
    pub plugin: String,
    #[serde(default)]
    pub vars: Variables,
    #[serde(rename = "topLevel", default = "default_true")]
    pub top_level: bool,
    #[serde(default)]
    pub force: bool,
}

impl InstallRequest {
    pub fn new(plugin: impl Into<String>, vars: Variables) -> Self {
        InstallRequest {
            plugin: plugin.into(),
            vars,
            top_level: true,
            force: false,
        }
    }
}

/// Pending uninstall request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UninstallRequest {
    pub plugin: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "topLevel", default = "default_true")]
    pub top_level: bool,
}

impl UninstallRequest {
    pub fn new(plugin: impl Into<String>, top_level: bool) -> Self {
        let plugin = plugin.into();
        UninstallRequest {
            id: plugin.clone(),
            plugin,
            top_level,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepareQueue {
    #[serde(default)]
    pub installed: Vec<InstallRequest>,
    #[serde(default)]
    pub uninstalled: Vec<UninstallRequest>,
}

impl PrepareQueue {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.uninstalled.is_empty()
    }
}

// =============================================================================
// PLUGIN STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuedAction {
    Install,
    Uninstall,
    /// Queued for uninstall and install in the same pass
    Reinstall,
}

/// Where a plugin stands on one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PluginStatus {
    Queued { action: QueuedAction, vars: Variables },
    Installed { vars: Variables, top_level: bool },
    Absent,
}
