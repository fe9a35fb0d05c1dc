//! Config file accessor
//!
//! Maps a logical target such as `AndroidManifest.xml` or `*-Info.plist` to a
//! file in the native project, loads it as an XML or plist document and
//! applies fragments to it. Handles are cached per target by [`ConfigKeeper`]
//! and written back once by [`ConfigKeeper::save_all`].

use crate::errors::MungeError;
use globset::GlobBuilder;
use indexmap::map::Entry;
use indexmap::IndexMap;
use plugmunge_state::Fragment;
use plugmunge_tree::{load_document, Attributes, DocumentAdapter, DocumentKind, Edit};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Every file under `project_dir` matching `**/<pattern>`, sorted by path
fn glob_project(project_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, MungeError> {
    let matcher = GlobBuilder::new(&format!("**/{pattern}"))
        .literal_separator(true)
        .build()?
        .compile_matcher();
    let mut matches: Vec<PathBuf> = WalkDir::new(project_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(project_dir)
                .is_ok_and(|rel| matcher.is_match(rel))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    matches.sort();
    Ok(matches)
}

/// Name of the single `*.xcodeproj` bundle in `project_dir`
pub fn ios_project_name(project_dir: &Path) -> Result<String, MungeError> {
    let names: Vec<String> = std::fs::read_dir(project_dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            (path.extension().and_then(|e| e.to_str()) == Some("xcodeproj"))
                .then(|| path.file_stem().and_then(|s| s.to_str()).map(String::from))
                .flatten()
        })
        .collect();
    match names.as_slice() {
        [name] => Ok(name.clone()),
        _ => Err(MungeError::ProjectName(project_dir.to_path_buf())),
    }
}

/// Resolve a logical config-file target to a path in the native project
pub fn resolve_config_file_path(project_dir: &Path, platform: &str, file: &str) -> Result<PathBuf, MungeError> {
    let filepath = project_dir.join(file);

    if file.contains('*') {
        let matches = glob_project(project_dir, file)?;
        let Some(first) = matches.first() else {
            return Ok(filepath);
        };
        // Several Info.plist files: prefer <ProjectName>-Info.plist
        if matches.len() > 1 && file.contains("-Info.plist") {
            if let Ok(name) = ios_project_name(project_dir) {
                let plist_name = format!("{name}-Info.plist");
                if let Some(found) = matches.iter().find(|m| m.ends_with(&plist_name)) {
                    return Ok(found.clone());
                }
            }
        }
        return Ok(first.clone());
    }

    // Android Studio layout
    if platform == "android" && !filepath.exists() {
        let main = project_dir.join("app").join("src").join("main");
        let base = Path::new(file).file_name().map(PathBuf::from).unwrap_or_default();
        let normalized = file.replace('\\', "/");
        let resolved = if file == "AndroidManifest.xml" {
            main.join("AndroidManifest.xml")
        } else if file.ends_with("config.xml") {
            main.join("res").join("xml").join("config.xml")
        } else if file.ends_with("strings.xml") {
            main.join("res").join("values").join("strings.xml")
        } else if normalized.contains("res/values") {
            main.join("res").join("values").join(base)
        } else if normalized.contains("res/xml") {
            main.join("res").join("xml").join(base)
        } else {
            filepath
        };
        return Ok(resolved);
    }

    if file == "config.xml" {
        return match platform {
            "ubuntu" => Ok(filepath),
            "ios" | "osx" => Ok(project_dir.join(ios_project_name(project_dir)?).join("config.xml")),
            _ => Ok(glob_project(project_dir, "config.xml")?
                .into_iter()
                .next()
                .unwrap_or(filepath)),
        };
    }

    Ok(filepath)
}

fn edit_of(fragment: &Fragment) -> Edit<'_> {
    Edit {
        xml: &fragment.xml,
        mode: fragment.mode,
        after: fragment.after.as_deref(),
        old_attrib: fragment.old_attrib.as_ref(),
    }
}

/// One native project file and its in-memory document
#[derive(Debug)]
pub struct ConfigFile {
    pub file_tag: String,
    pub path: PathBuf,
    pub exists: bool,
    pub is_changed: bool,
    indent: usize,
    doc: Option<Box<dyn DocumentAdapter>>,
}

impl ConfigFile {
    pub fn load(project_dir: &Path, platform: &str, file_tag: &str, indent: usize) -> Result<Self, MungeError> {
        let path = resolve_config_file_path(project_dir, platform, file_tag)?;
        let doc = if path.is_file() {
            let bytes = std::fs::read(&path)?;
            let doc = load_document(&path, &bytes).map_err(|source| MungeError::Document {
                path: path.clone(),
                source,
            })?;
            Some(doc)
        } else {
            None
        };
        debug!("Loaded config file {} from {:?} (exists: {})", file_tag, path, doc.is_some());
        Ok(ConfigFile {
            file_tag: file_tag.to_string(),
            exists: doc.is_some(),
            path,
            is_changed: false,
            indent,
            doc,
        })
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        self.doc.as_ref().map(|d| d.kind())
    }

    /// Apply `fragment` at `selector`, returning the attribute snapshot of
    /// an attribute edit
    pub fn graft_child(&mut self, selector: &str, fragment: &Fragment) -> Result<Option<Attributes>, MungeError> {
        let Some(doc) = self.doc.as_mut() else {
            return Ok(None);
        };
        let snapshot = doc
            .graft(selector, &edit_of(fragment))
            .map_err(|source| MungeError::GraftFailed {
                file: self.path.clone(),
                selector: selector.to_string(),
                source,
            })?;
        self.is_changed = true;
        Ok(snapshot)
    }

    pub fn prune_child(&mut self, selector: &str, fragment: &Fragment) -> Result<(), MungeError> {
        let Some(doc) = self.doc.as_mut() else {
            return Ok(());
        };
        doc.prune(selector, &edit_of(fragment))
            .map_err(|source| MungeError::PruneFailed {
                file: self.path.clone(),
                selector: selector.to_string(),
                source,
            })?;
        self.is_changed = true;
        Ok(())
    }

    /// Whether two selectors address the same node of this file
    pub fn same_target(&self, one: &str, two: &str) -> bool {
        match &self.doc {
            Some(doc) => doc.same_target(one, two),
            None => one == two,
        }
    }

    /// Write the document if it changed since the last save
    pub fn save(&mut self) -> Result<bool, MungeError> {
        let Some(doc) = self.doc.as_ref().filter(|_| self.is_changed) else {
            return Ok(false);
        };
        let content = doc.serialize(self.indent).map_err(|source| MungeError::Document {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, content)?;
        self.is_changed = false;
        info!("Saved {:?}", self.path);
        Ok(true)
    }
}

/// Cache of config file handles for one platform of one project
#[derive(Debug)]
pub struct ConfigKeeper {
    project_dir: PathBuf,
    platform: String,
    indent: usize,
    files: IndexMap<String, ConfigFile>,
}

impl ConfigKeeper {
    pub fn new(project_dir: &Path, platform: &str, indent: usize) -> Self {
        ConfigKeeper {
            project_dir: project_dir.to_path_buf(),
            platform: platform.to_string(),
            indent,
            files: IndexMap::new(),
        }
    }

    fn normalize<'a>(&self, file: &'a str) -> &'a str {
        if file == "config.xml" && self.platform == "android" {
            "res/xml/config.xml"
        } else {
            file
        }
    }

    /// Handle for `file`, loading it on first use
    pub fn get(&mut self, file: &str) -> Result<&mut ConfigFile, MungeError> {
        let key = self.normalize(file).to_string();
        match self.files.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let config_file = ConfigFile::load(&self.project_dir, &self.platform, entry.key(), self.indent)?;
                Ok(entry.insert(config_file))
            }
        }
    }

    /// Save every changed handle. Returns how many files were written.
    pub fn save_all(&mut self) -> Result<usize, MungeError> {
        let mut written = 0;
        for config_file in self.files.values_mut() {
            if config_file.save()? {
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::write(path, content);
    }

    #[test]
    fn test_android_studio_fallbacks() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        let root = dir.path();
        let main = root.join("app/src/main");
        assert_eq!(resolve_config_file_path(root, "android", "AndroidManifest.xml")?, main.join("AndroidManifest.xml"));
        assert_eq!(resolve_config_file_path(root, "android", "res/xml/config.xml")?, main.join("res/xml/config.xml"));
        assert_eq!(resolve_config_file_path(root, "android", "res/values/colors.xml")?, main.join("res/values/colors.xml"));

        write(&root.join("AndroidManifest.xml"), "<manifest/>");
        assert_eq!(resolve_config_file_path(root, "android", "AndroidManifest.xml")?, root.join("AndroidManifest.xml"));
        Ok(())
    }

    #[test]
    fn test_info_plist_prefers_project_name() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        let root = dir.path();
        let _ = fs::create_dir_all(root.join("Demo.xcodeproj"));
        write(&root.join("Demo/Demo-Info.plist"), "<plist/>");
        write(&root.join("Demo/Alpha-Info.plist"), "<plist/>");
        write(&root.join("Demo/config.xml"), "<widget/>");

        let resolved = resolve_config_file_path(root, "ios", "*-Info.plist")?;
        assert_eq!(resolved, root.join("Demo/Demo-Info.plist"));
        assert_eq!(resolve_config_file_path(root, "ios", "config.xml")?, root.join("Demo/config.xml"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_loaded() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        let mut keeper = ConfigKeeper::new(dir.path(), "ios", 4);
        let handle = keeper.get("Entitlements.plist")?;
        assert!(!handle.exists);
        assert!(handle.graft_child("key", &Fragment::new("<string>x</string>"))?.is_none());
        assert!(!handle.is_changed);
        assert_eq!(keeper.save_all()?, 0);
        Ok(())
    }

    #[test]
    fn test_keeper_saves_dirty_handles_once() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        let manifest = dir.path().join("AndroidManifest.xml");
        write(&manifest, "<manifest><application/></manifest>");

        let mut keeper = ConfigKeeper::new(dir.path(), "android", 2);
        let handle = keeper.get("AndroidManifest.xml")?;
        assert_eq!(handle.kind(), Some(DocumentKind::Xml));
        handle.graft_child("/manifest", &Fragment::new(r#"<uses-permission android:name="X"/>"#))?;
        assert!(handle.is_changed);

        assert_eq!(keeper.save_all()?, 1);
        assert_eq!(keeper.save_all()?, 0);
        let written = fs::read_to_string(&manifest)?;
        assert!(written.contains("  <uses-permission android:name=\"X\"/>"));
        Ok(())
    }

    #[test]
    fn test_android_config_xml_is_normalized() -> Result<(), MungeError> {
        let Ok(dir) = TempDir::new() else {
            return Ok(());
        };
        write(&dir.path().join("res/xml/config.xml"), "<widget/>");
        let mut keeper = ConfigKeeper::new(dir.path(), "android", 4);
        let handle = keeper.get("config.xml")?;
        assert!(handle.exists);
        assert_eq!(handle.file_tag, "res/xml/config.xml");
        Ok(())
    }
}
