//! Munge store and persisted platform state
//!
//! A munge counts how many plugins (or the app manifest) request each
//! fragment at each location of each native file. The platform state file
//! keeps the applied munge between runs together with the installed plugins
//! and the pending prepare queue.

pub mod errors;
pub mod munge;
pub mod platform_state;
pub mod types;

pub use errors::StateError;
pub use munge::{
    clone_munge, decrement_munge, deep_add, deep_find, deep_remove, fragments_equal,
    increment_munge, record_old_attrib, Removal,
};
pub use platform_state::{PlatformRecord, PlatformState};
pub use types::{
    FileMunge, Fragment, InstallRequest, Munge, PluginStatus, PrepareQueue, QueuedAction,
    UninstallRequest, Variables, APP_CONFIG_OWNER,
};
