//! Error types for the munger and its collaborators

use plugmunge_state::StateError;
use plugmunge_tree::TreeError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MungeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Failed to parse {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: TreeError,
    },

    #[error("Unable to graft xml at selector \"{selector}\" from \"{file}\" during config install")]
    GraftFailed {
        file: PathBuf,
        selector: String,
        #[source]
        source: TreeError,
    },

    #[error("Pruning at selector \"{selector}\" from \"{file}\" went bad")]
    PruneFailed {
        file: PathBuf,
        selector: String,
        #[source]
        source: TreeError,
    },

    #[error("Malformed plugin declaration in {path}: {message}")]
    MalformedPlugin { path: PathBuf, message: String },

    #[error(
        "There was a conflict trying to modify attributes with <edit-config> in plugin {plugin}. \
         The conflicting plugin, {other}, already modified the same attributes. The conflict must \
         be resolved before {plugin} can be added. You may use --force to add the plugin and \
         overwrite the conflicting attributes."
    )]
    Conflict { plugin: String, other: String },

    #[error(
        "There was a conflict trying to modify attributes with <edit-config> in plugin {plugin}. \
         The conflicting edit-config in config.xml must be removed and recreated before {plugin} \
         can be added."
    )]
    ConflictWithAppConfig { plugin: String },

    #[error("Could not determine the Xcode project name in {0}")]
    ProjectName(PathBuf),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] globset::Error),
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_conflict_names_both_plugins() {
        let err = MungeError::Conflict {
            plugin: "plugin-b".to_string(),
            other: "plugin-a".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("in plugin plugin-b"));
        assert!(message.contains("The conflicting plugin, plugin-a"));
    }

    #[test]
    fn test_graft_failure_names_file_and_selector() {
        let err = MungeError::GraftFailed {
            file: PathBuf::from("AndroidManifest.xml"),
            selector: "/manifest/missing".to_string(),
            source: TreeError::GraftFailed("/manifest/missing".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unable to graft xml at selector \"/manifest/missing\" from \"AndroidManifest.xml\" during config install"
        );
    }
}
