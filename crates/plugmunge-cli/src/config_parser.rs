//! App manifest (`config.xml`) reader

use crate::errors::MungeError;
use crate::munger::ConfigChange;
use crate::plugin_info::{ConfigFileDecl, EditConfigDecl, ScopedDeclarations};
use plugmunge_tree::XmlDocument;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigParser {
    pub path: PathBuf,
    pub doc: XmlDocument,
    declarations: ScopedDeclarations,
}

impl ConfigParser {
    pub fn load(path: &Path) -> Result<Self, MungeError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, MungeError> {
        let doc = XmlDocument::parse(content).map_err(|source| MungeError::Document {
            path: path.to_path_buf(),
            source,
        })?;
        let declarations = ScopedDeclarations::read(&doc.root, path)?;
        Ok(ConfigParser {
            path: path.to_path_buf(),
            doc,
            declarations,
        })
    }

    pub fn config_files<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a ConfigFileDecl> {
        self.declarations.config_files(platform)
    }

    pub fn edit_configs<'a>(&'a self, platform: &str) -> impl Iterator<Item = &'a EditConfigDecl> {
        self.declarations.edit_configs(platform)
    }

    /// Every declaration for `platform`, edit-configs first
    pub fn changes<'a>(&'a self, platform: &str) -> Vec<ConfigChange<'a>> {
        self.edit_configs(platform)
            .map(ConfigChange::Edit)
            .chain(self.config_files(platform).map(ConfigChange::File))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_manifest_declarations() -> Result<(), MungeError> {
        let parser = ConfigParser::parse(
            Path::new("config.xml"),
            r#"<widget id="io.example.app" version="1.0.0">
                <name>Example</name>
                <edit-config file="AndroidManifest.xml" target="/manifest/uses-sdk" mode="overwrite">
                    <uses-sdk android:minSdkVersion="5" android:targetSdkVersion="23"/>
                </edit-config>
                <platform name="ios">
                    <config-file target="*-Info.plist" parent="CFBundleDisplayName">
                        <string>Example</string>
                    </config-file>
                </platform>
            </widget>"#,
        )?;
        assert_eq!(parser.doc.root.get("id"), Some("io.example.app"));
        assert_eq!(parser.edit_configs("android").count(), 1);
        assert_eq!(parser.config_files("android").count(), 0);
        assert_eq!(parser.config_files("ios").count(), 1);
        assert!(matches!(parser.changes("ios").as_slice(), [ConfigChange::Edit(_), ConfigChange::File(_)]));
        Ok(())
    }
}
