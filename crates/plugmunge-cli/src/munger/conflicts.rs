//! Edit-config conflict detection

use crate::config_file::ConfigKeeper;
use crate::errors::MungeError;
use plugmunge_state::{deep_add, deep_find, fragments_equal, Fragment, Munge};
use plugmunge_tree::EditMode;

/// Applied fragments that collide with incoming edit-configs, split by owner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditConflicts {
    /// Entries declared by the app manifest
    pub with_app: Munge,
    /// Entries declared by plugins
    pub with_plugins: Munge,
}

impl EditConflicts {
    pub fn is_empty(&self) -> bool {
        self.with_app.is_empty() && self.with_plugins.is_empty()
    }

    /// Owner of the first conflicting plugin entry
    pub fn first_plugin(&self) -> Option<&str> {
        self.with_plugins.fragments().find_map(|(_, _, f)| f.owner())
    }
}

fn is_exclusive(fragment: &Fragment) -> bool {
    matches!(fragment.mode, Some(EditMode::Merge | EditMode::Overwrite))
}

/// Find applied attribute edits that target the same node as an incoming
/// merge/overwrite fragment but come from another owner and set different
/// attributes. Two selectors name the same target when they are equal or
/// resolve to the same node of the target document.
pub fn find_edit_conflicts(
    applied: &Munge,
    incoming: &Munge,
    keeper: &mut ConfigKeeper,
) -> Result<EditConflicts, MungeError> {
    let mut conflicts = EditConflicts::default();

    for (file, selector, fragment) in incoming.fragments().filter(|(_, _, f)| is_exclusive(f)) {
        let Some(applied_file) = applied.files.get(file) else {
            continue;
        };
        let handle = keeper.get(file)?;

        for (applied_selector, list) in &applied_file.parents {
            if !handle.same_target(selector, applied_selector) {
                continue;
            }
            for existing in list {
                if !existing.is_attribute_edit()
                    || existing.owner() == fragment.owner()
                    || fragments_equal(&existing.xml, &fragment.xml)
                {
                    continue;
                }
                let bucket = if existing.is_from_app_config() {
                    &mut conflicts.with_app
                } else {
                    &mut conflicts.with_plugins
                };
                if deep_find(bucket, file, applied_selector, &existing.xml).is_none() {
                    deep_add(bucket, file, applied_selector, existing.clone());
                }
            }
        }
    }

    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = "AndroidManifest.xml";

    fn edit(xml: &str, mode: EditMode, owner: &str) -> Fragment {
        let fragment = Fragment::new(xml).with_mode(Some(mode));
        if owner == "config.xml" {
            fragment.with_id(owner)
        } else {
            fragment.with_plugin(owner)
        }
    }

    #[test]
    fn test_conflicts_split_by_owner() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        let _ = fs::write(
            dir.path().join(MANIFEST),
            r#"<manifest><uses-sdk android:minSdkVersion="10"/></manifest>"#,
        );
        let mut keeper = ConfigKeeper::new(dir.path(), "android", 4);

        let mut applied = Munge::default();
        deep_add(
            &mut applied,
            MANIFEST,
            "/manifest/uses-sdk",
            edit(r#"<uses-sdk android:targetSdkVersion="24"/>"#, EditMode::Merge, "plugin-a"),
        );
        deep_add(
            &mut applied,
            MANIFEST,
            "uses-sdk",
            edit(r#"<uses-sdk android:maxSdkVersion="30"/>"#, EditMode::Merge, "config.xml"),
        );

        let mut incoming = Munge::default();
        deep_add(
            &mut incoming,
            MANIFEST,
            "/*/uses-sdk",
            edit(r#"<uses-sdk android:targetSdkVersion="26"/>"#, EditMode::Overwrite, "plugin-b"),
        );

        let conflicts = find_edit_conflicts(&applied, &incoming, &mut keeper)?;
        assert_eq!(conflicts.first_plugin(), Some("plugin-a"));
        assert_eq!(conflicts.with_app.fragment_count(), 1);
        Ok(())
    }

    #[test]
    fn test_identical_edits_do_not_conflict() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        let mut keeper = ConfigKeeper::new(dir.path(), "android", 4);
        let xml = r#"<uses-sdk android:targetSdkVersion="24"/>"#;

        let mut applied = Munge::default();
        deep_add(&mut applied, MANIFEST, "/manifest/uses-sdk", edit(xml, EditMode::Merge, "plugin-a"));
        let mut incoming = Munge::default();
        deep_add(&mut incoming, MANIFEST, "/manifest/uses-sdk", edit(xml, EditMode::Merge, "plugin-b"));
        deep_add(
            &mut incoming,
            MANIFEST,
            "/manifest/uses-sdk",
            edit(r#"<uses-sdk android:maxSdkVersion="1"/>"#, EditMode::Remove, "plugin-b"),
        );

        assert!(find_edit_conflicts(&applied, &incoming, &mut keeper)?.is_empty());
        Ok(())
    }
}
