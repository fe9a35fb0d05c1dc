//! Plugin manifest reader
//!
//! Reads the `<config-file>`, `<edit-config>` and `<asset>` declarations of a
//! `plugin.xml`, both at the root and inside `<platform name="...">`
//! sections. Declarations are validated when the manifest is loaded, so a
//! malformed plugin fails before any project file is touched.

use crate::errors::MungeError;
use indexmap::IndexMap;
use plugmunge_tree::{EditMode, Element, XmlDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// `<config-file target=".." parent="..">` with its children serialized
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFileDecl {
    pub target: String,
    pub parent: String,
    pub after: Option<String>,
    pub xmls: Vec<String>,
    pub versions: Option<String>,
    pub device_target: Option<String>,
}

/// `<edit-config file=".." target=".." mode="..">` with its children serialized
#[derive(Debug, Clone, PartialEq)]
pub struct EditConfigDecl {
    pub file: String,
    pub target: String,
    pub mode: EditMode,
    pub xmls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetDecl {
    pub src: String,
    pub target: String,
}

/// Declarations found in one scope of a manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    pub config_files: Vec<ConfigFileDecl>,
    pub edit_configs: Vec<EditConfigDecl>,
    pub assets: Vec<AssetDecl>,
}

impl Declarations {
    /// Read the direct children of `scope`
    pub fn read(scope: &Element, path: &Path) -> Result<Self, MungeError> {
        let malformed = |message: String| MungeError::MalformedPlugin {
            path: path.to_path_buf(),
            message,
        };
        let mut decls = Declarations::default();

        for el in scope.find_all("config-file") {
            let target = el
                .get("target")
                .or_else(|| el.get("file"))
                .ok_or_else(|| malformed("<config-file> is missing \"target\"".to_string()))?;
            let parent = el
                .get("parent")
                .ok_or_else(|| malformed(format!("<config-file target=\"{target}\"> is missing \"parent\"")))?;
            decls.config_files.push(ConfigFileDecl {
                target: target.to_string(),
                parent: parent.to_string(),
                after: el.get("after").map(String::from),
                xmls: serialize_children(el, path)?,
                versions: el.get("versions").map(String::from),
                device_target: el.get("device-target").map(String::from),
            });
        }

        for el in scope.find_all("edit-config") {
            let (Some(file), Some(target)) = (el.get("file"), el.get("target")) else {
                return Err(malformed("<edit-config> needs \"file\" and \"target\"".to_string()));
            };
            let raw_mode = el.get("mode").unwrap_or_default();
            let mode = EditMode::parse(raw_mode).ok_or_else(|| {
                malformed(format!("<edit-config target=\"{target}\"> has unknown mode \"{raw_mode}\""))
            })?;
            decls.edit_configs.push(EditConfigDecl {
                file: file.to_string(),
                target: target.to_string(),
                mode,
                xmls: serialize_children(el, path)?,
            });
        }

        for el in scope.find_all("asset") {
            let (Some(src), Some(target)) = (el.get("src"), el.get("target")) else {
                return Err(malformed("<asset> needs \"src\" and \"target\"".to_string()));
            };
            decls.assets.push(AssetDecl {
                src: src.to_string(),
                target: target.to_string(),
            });
        }

        Ok(decls)
    }
}

fn serialize_children(element: &Element, path: &Path) -> Result<Vec<String>, MungeError> {
    element
        .elements()
        .map(|child| {
            child.to_xml_string().map_err(|source| MungeError::Document {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

/// Root-level and per-platform declarations of a manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedDeclarations {
    pub common: Declarations,
    pub platforms: IndexMap<String, Declarations>,
}

impl ScopedDeclarations {
    pub fn read(root: &Element, path: &Path) -> Result<Self, MungeError> {
        let mut platforms = IndexMap::new();
        for section in root.find_all("platform") {
            let Some(name) = section.get("name") else {
                continue;
            };
            platforms.insert(name.to_string(), Declarations::read(section, path)?);
        }
        Ok(ScopedDeclarations {
            common: Declarations::read(root, path)?,
            platforms,
        })
    }

    fn scopes<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a Declarations> {
        std::iter::once(&self.common).chain(self.platforms.get(platform))
    }

    pub fn config_files<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a ConfigFileDecl> {
        self.scopes(platform).flat_map(|d| d.config_files.iter())
    }

    pub fn edit_configs<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a EditConfigDecl> {
        self.scopes(platform).flat_map(|d| d.edit_configs.iter())
    }

    pub fn assets<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a AssetDecl> {
        self.scopes(platform).flat_map(|d| d.assets.iter())
    }
}

/// A parsed `plugin.xml`
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub id: String,
    pub version: String,
    pub dir: PathBuf,
    pub path: PathBuf,
    pub declarations: ScopedDeclarations,
}

impl PluginInfo {
    /// Load `<plugin_dir>/plugin.xml`
    pub fn load(plugin_dir: &Path) -> Result<Self, MungeError> {
        let path = plugin_dir.join("plugin.xml");
        debug!("Reading plugin manifest {:?}", path);
        let content = std::fs::read_to_string(&path)?;
        Self::parse(plugin_dir, &content)
    }

    pub fn parse(plugin_dir: &Path, content: &str) -> Result<Self, MungeError> {
        let path = plugin_dir.join("plugin.xml");
        let doc = XmlDocument::parse(content).map_err(|source| MungeError::Document {
            path: path.clone(),
            source,
        })?;
        if doc.root.tag != "plugin" {
            return Err(MungeError::MalformedPlugin {
                path,
                message: format!("root element is <{}>, expected <plugin>", doc.root.tag),
            });
        }
        let Some(id) = doc.root.get("id").map(String::from) else {
            return Err(MungeError::MalformedPlugin {
                path,
                message: "<plugin> is missing \"id\"".to_string(),
            });
        };
        let declarations = ScopedDeclarations::read(&doc.root, &path)?;
        Ok(PluginInfo {
            id,
            version: doc.root.get("version").unwrap_or_default().to_string(),
            dir: plugin_dir.to_path_buf(),
            path,
            declarations,
        })
    }

    pub fn config_files<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a ConfigFileDecl> {
        self.declarations.config_files(platform)
    }

    pub fn edit_configs<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a EditConfigDecl> {
        self.declarations.edit_configs(platform)
    }

    pub fn assets<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a AssetDecl> {
        self.declarations.assets(platform)
    }
}

/// Where the munger gets plugin manifests from
pub trait PluginInfoSource {
    fn get(&mut self, plugin_dir: &Path) -> Result<Arc<PluginInfo>, MungeError>;
}

/// Loads manifests from disk, once per directory
#[derive(Debug, Default)]
pub struct PluginInfoProvider {
    cache: HashMap<PathBuf, Arc<PluginInfo>>,
}

impl PluginInfoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an already parsed manifest in the cache
    pub fn put(&mut self, info: PluginInfo) {
        self.cache.insert(info.dir.clone(), Arc::new(info));
    }
}

impl PluginInfoSource for PluginInfoProvider {
    fn get(&mut self, plugin_dir: &Path) -> Result<Arc<PluginInfo>, MungeError> {
        if let Some(info) = self.cache.get(plugin_dir) {
            return Ok(Arc::clone(info));
        }
        let info = Arc::new(PluginInfo::load(plugin_dir)?);
        self.cache.insert(plugin_dir.to_path_buf(), Arc::clone(&info));
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUGIN_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plugin xmlns="http://apache.org/cordova/ns/plugins/1.0" id="com.example.camera" version="1.2.0">
    <config-file target="res/xml/config.xml" parent="/*">
        <feature name="Camera"/>
    </config-file>
    <platform name="android">
        <config-file target="AndroidManifest.xml" parent="/manifest" after="uses-sdk">
            <!-- permissions -->
            <uses-permission android:name="android.permission.CAMERA"/>
            <uses-permission android:name="android.permission.WRITE_EXTERNAL_STORAGE"/>
        </config-file>
        <edit-config file="AndroidManifest.xml" target="/manifest/uses-sdk" mode="merge">
            <uses-sdk android:targetSdkVersion="24"/>
        </edit-config>
        <asset src="www/camera.js" target="js/camera.js"/>
    </platform>
    <platform name="ios">
        <config-file target="*-Info.plist" parent="NSCameraUsageDescription">
            <string>$CAMERA_USAGE</string>
        </config-file>
    </platform>
</plugin>
"#;

    fn parse(content: &str) -> Result<PluginInfo, MungeError> {
        PluginInfo::parse(Path::new("/plugins/com.example.camera"), content)
    }

    #[test]
    fn test_platform_scoped_declarations() -> Result<(), MungeError> {
        let info = parse(PLUGIN_XML)?;
        assert_eq!(info.id, "com.example.camera");
        assert_eq!(info.version, "1.2.0");

        let android: Vec<&ConfigFileDecl> = info.config_files("android").collect();
        assert_eq!(android.len(), 2);
        assert_eq!(android[1].after.as_deref(), Some("uses-sdk"));
        assert_eq!(android[1].xmls.len(), 2);
        assert!(android[1].xmls[0].starts_with("<uses-permission"));

        let edits: Vec<&EditConfigDecl> = info.edit_configs("android").collect();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].mode, EditMode::Merge);
        assert_eq!(info.edit_configs("ios").count(), 0);
        assert_eq!(info.assets("android").count(), 1);
        assert_eq!(info.config_files("windows").count(), 1);
        Ok(())
    }

    #[test]
    fn test_malformed_declarations_name_the_manifest() {
        let missing_parent = r#"<plugin id="p"><config-file target="a.xml"><x/></config-file></plugin>"#;
        let bad_mode = r#"<plugin id="p"><edit-config file="a.xml" target="/a" mode="replace"><x/></edit-config></plugin>"#;
        let bad_asset = r#"<plugin id="p"><platform name="android"><asset src="a"/></platform></plugin>"#;
        for content in [missing_parent, bad_mode, bad_asset] {
            let result = parse(content);
            assert!(
                matches!(&result, Err(MungeError::MalformedPlugin { path, .. }) if path.ends_with("plugin.xml")),
                "expected malformed plugin error, got {:?}",
                result
            );
        }
    }

    #[test]
    fn test_provider_caches_by_directory() -> Result<(), MungeError> {
        let mut provider = PluginInfoProvider::new();
        provider.put(parse(PLUGIN_XML)?);
        let first = provider.get(Path::new("/plugins/com.example.camera"))?;
        let second = provider.get(Path::new("/plugins/com.example.camera"))?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }
}
