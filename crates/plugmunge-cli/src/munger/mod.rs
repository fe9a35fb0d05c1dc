//! Platform munger
//!
//! Reconciles the config changes plugins and the app manifest declare with
//! the munge recorded in the platform state, then grafts or prunes exactly
//! the fragments whose reference count appeared or dropped to zero.
//!
//! A pass runs all queued uninstalls before any queued install. Nothing is
//! written until [`PlatformMunger::save_all`], so a failed pass leaves both
//! the project files and the state file as they were.

mod conflicts;
mod generate;

pub use conflicts::{find_edit_conflicts, EditConflicts};
pub use generate::{expand_variables, generate_config_xml_munge, generate_plugin_config_munge, ConfigChange};

use crate::config_file::ConfigKeeper;
use crate::config_parser::ConfigParser;
use crate::errors::MungeError;
use crate::plugin_info::{PluginInfo, PluginInfoProvider, PluginInfoSource};
use plugmunge_state::{
    decrement_munge, deep_add, fragments_equal, increment_munge, record_old_attrib, FileMunge,
    Munge, PlatformState, Variables,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DEFAULT_INDENT: usize = 4;

/// Orchestrates munge reconciliation for one platform of one project
#[derive(Debug)]
pub struct PlatformMunger<S: PluginInfoSource = PluginInfoProvider> {
    platform: String,
    project_dir: PathBuf,
    state: PlatformState,
    plugins: S,
    keeper: ConfigKeeper,
}

impl PlatformMunger<PluginInfoProvider> {
    /// Load the state of `platform` from `plugins_dir` and read plugin
    /// manifests from disk
    pub fn open(platform: &str, project_dir: &Path, plugins_dir: &Path) -> Result<Self, MungeError> {
        let state = PlatformState::load(plugins_dir, platform)?;
        Ok(Self::new(platform, project_dir, state, PluginInfoProvider::new()))
    }
}

impl<S: PluginInfoSource> PlatformMunger<S> {
    pub fn new(platform: &str, project_dir: &Path, state: PlatformState, plugins: S) -> Self {
        PlatformMunger {
            platform: platform.to_string(),
            project_dir: project_dir.to_path_buf(),
            state,
            plugins,
            keeper: ConfigKeeper::new(project_dir, platform, DEFAULT_INDENT),
        }
    }

    /// Indentation used when native XML files are written back
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.keeper = ConfigKeeper::new(&self.project_dir, &self.platform, indent);
        self
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn state(&self) -> &PlatformState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PlatformState {
        &mut self.state
    }

    // =========================================================================
    // Physical application
    // =========================================================================

    /// Graft (or prune when `remove` is set) every fragment of one file.
    /// A file missing from the project is skipped.
    pub fn apply_file_munge(&mut self, file: &str, file_munge: &FileMunge, remove: bool) -> Result<(), MungeError> {
        let handle = self.keeper.get(file)?;
        if !handle.exists {
            warn!(
                "config file {} requested for changes not found at {}, ignoring",
                file,
                handle.path.display()
            );
            return Ok(());
        }

        for (selector, fragments) in &file_munge.parents {
            for fragment in fragments {
                if remove {
                    debug!("Pruning {} at {} in {}", fragment.xml, selector, file);
                    handle.prune_child(selector, fragment)?;
                } else {
                    debug!("Grafting {} at {} in {}", fragment.xml, selector, file);
                    if let Some(snapshot) = handle.graft_child(selector, fragment)? {
                        record_old_attrib(&mut self.state.root.config_munge, file, selector, &fragment.xml, snapshot);
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_munge(&mut self, munge: &Munge, remove: bool) -> Result<(), MungeError> {
        for (file, file_munge) in &munge.files {
            self.apply_file_munge(file, file_munge, remove)?;
        }
        Ok(())
    }

    /// Apply `munge`, first recording it in the applied munge when
    /// `should_increment` is set. Only newly introduced fragments are
    /// grafted in that case.
    fn munge_helper(&mut self, should_increment: bool, munge: &Munge) -> Result<(), MungeError> {
        let to_apply = if should_increment {
            increment_munge(&mut self.state.root.config_munge, munge)
        } else {
            munge.clone()
        };
        self.apply_munge(&to_apply, false)
    }

    /// Drop `munge` from the applied munge and prune what reached zero
    fn unmunge(&mut self, munge: &Munge) -> Result<(), MungeError> {
        let to_prune = decrement_munge(&mut self.state.root.config_munge, munge);
        self.apply_munge(&to_prune, true)?;
        self.state.root.config_munge.compact();
        Ok(())
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Revert a plugin's changes using the variables it was installed with
    pub fn remove_plugin_changes(&mut self, info: &PluginInfo, top_level: bool) -> Result<&mut Self, MungeError> {
        let vars = self.state.installed_vars(&info.id).cloned().unwrap_or_default();
        let munge = generate_plugin_config_munge(info, &self.platform, &vars);
        self.unmunge(&munge)?;
        self.state.remove_plugin(&info.id, top_level);
        info!("Removed config changes of {} from {}", info.id, self.platform);
        Ok(self)
    }

    /// Apply a plugin's changes. Conflicting edit-configs of other plugins
    /// fail the install unless `force` is set, in which case they are
    /// reverted first. A conflict with the app manifest always fails.
    pub fn add_plugin_changes(
        &mut self,
        info: &PluginInfo,
        vars: &Variables,
        top_level: bool,
        should_increment: bool,
        force: bool,
    ) -> Result<&mut Self, MungeError> {
        let munge = generate_plugin_config_munge(info, &self.platform, vars);

        let conflicts = find_edit_conflicts(&self.state.root.config_munge, &munge, &mut self.keeper)?;
        if !conflicts.with_app.is_empty() {
            return Err(MungeError::ConflictWithAppConfig {
                plugin: info.id.clone(),
            });
        }
        if let Some(other) = conflicts.first_plugin() {
            if !force {
                return Err(MungeError::Conflict {
                    plugin: info.id.clone(),
                    other: other.to_string(),
                });
            }
            warn!("--force is used. edit-config will overwrite conflicts if any. Conflicting plugins may not work as expected.");
            self.unmunge(&conflicts.with_plugins)?;
        }

        self.munge_helper(should_increment, &munge)?;
        self.state.add_plugin(&info.id, vars.clone(), top_level);
        info!("Applied config changes of {} to {}", info.id, self.platform);
        Ok(self)
    }

    /// Drain the prepare queue: uninstalls first, then installs. Plugin
    /// manifests are read from `<plugins_dir>/<plugin>`.
    pub fn process(&mut self, plugins_dir: &Path) -> Result<&mut Self, MungeError> {
        self.state.validate_queue()?;
        let queue = self.state.root.prepare_queue.clone();

        for request in &queue.uninstalled {
            let info = self.plugins.get(&plugins_dir.join(&request.plugin))?;
            self.remove_plugin_changes(&info, request.top_level)?;
        }
        for request in &queue.installed {
            let info = self.plugins.get(&plugins_dir.join(&request.plugin))?;
            self.add_plugin_changes(&info, &request.vars, request.top_level, true, request.force)?;
        }

        self.state.clear_queue();
        Ok(self)
    }

    /// Graft the whole applied munge again, e.g. after native files were
    /// regenerated
    pub fn reapply_global_munge(&mut self) -> Result<&mut Self, MungeError> {
        let munge = self.state.root.config_munge.clone();
        self.apply_munge(&munge, false)?;
        Ok(self)
    }

    // =========================================================================
    // App manifest
    // =========================================================================

    /// Apply the app manifest's declarations.
    ///
    /// With `should_increment` the result is reconciled against what the
    /// manifest applied last time: dropped declarations are reverted, new
    /// ones are grafted after removing plugin edit-configs they conflict
    /// with. Without it the full set is grafted and nothing is recorded.
    pub fn add_config_changes(&mut self, parser: &ConfigParser, should_increment: bool) -> Result<&mut Self, MungeError> {
        let munge = generate_config_xml_munge(parser.changes(&self.platform));
        if !should_increment {
            self.munge_helper(false, &munge)?;
            return Ok(self);
        }

        let previous = std::mem::take(&mut self.state.root.app_munge);
        let stale = munge_difference(&previous, &munge);
        if !stale.is_empty() {
            debug!("Reverting {} app manifest changes", stale.fragment_count());
            self.unmunge(&stale)?;
        }

        let fresh = munge_difference(&munge, &previous);
        let conflicts = find_edit_conflicts(&self.state.root.config_munge, &fresh, &mut self.keeper)?;
        if !conflicts.with_app.is_empty() {
            self.unmunge(&conflicts.with_app)?;
        }
        if !conflicts.with_plugins.is_empty() {
            warn!("Conflict found, edit-config changes from config.xml will overwrite plugin.xml changes");
            self.unmunge(&conflicts.with_plugins)?;
        }

        self.munge_helper(true, &fresh)?;
        self.state.root.app_munge = munge;
        Ok(self)
    }

    /// Write every changed project file, then the platform state
    pub fn save_all(&mut self) -> Result<&mut Self, MungeError> {
        let written = self.keeper.save_all()?;
        self.state.save()?;
        info!("Saved {} project files for {}", written, self.platform);
        Ok(self)
    }
}

/// Fragments of `one` with no equal fragment (same XML and mode) at the
/// same location in `other`
fn munge_difference(one: &Munge, other: &Munge) -> Munge {
    let mut diff = Munge::default();
    for (file, selector, fragment) in one.fragments() {
        let present = other
            .files
            .get(file)
            .and_then(|f| f.parents.get(selector))
            .is_some_and(|list| {
                list.iter()
                    .any(|entry| entry.mode == fragment.mode && fragments_equal(&entry.xml, &fragment.xml))
            });
        if !present {
            deep_add(&mut diff, file, selector, fragment.clone());
        }
    }
    diff
}
