//! Format-independent editing interface over XML and plist documents

use crate::errors::TreeError;
use crate::graft::{
    graft_xml, graft_xml_merge, graft_xml_overwrite, prune_xml, prune_xml_remove, prune_xml_restore,
};
use crate::plist::{graft_plist, prune_plist, PlistDocument, PlistValue};
use crate::selector::resolve_parent;
use crate::xml::{Attributes, Element, XmlDocument};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How an edit applies to its target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Add the fragment's attributes to the target
    Merge,
    /// Replace the target's attributes with the fragment's
    Overwrite,
    /// Delete the fragment's attribute keys from the target
    Remove,
}

impl EditMode {
    pub fn parse(value: &str) -> Option<EditMode> {
        match value {
            "merge" => Some(EditMode::Merge),
            "overwrite" => Some(EditMode::Overwrite),
            "remove" => Some(EditMode::Remove),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EditMode::Merge => "merge",
            EditMode::Overwrite => "overwrite",
            EditMode::Remove => "remove",
        }
    }
}

/// One fragment to graft or prune. `mode = None` inserts or removes the
/// fragment as a child node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Edit<'a> {
    pub xml: &'a str,
    pub mode: Option<EditMode>,
    pub after: Option<&'a str>,
    pub old_attrib: Option<&'a Attributes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Xml,
    Plist,
}

impl DocumentKind {
    /// Pick the format from the file extension, falling back to the content
    pub fn detect(path: &Path, content: &str) -> DocumentKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xml" | "appxmanifest" | "storyboard" | "jsproj") => DocumentKind::Xml,
            Some("plist") => DocumentKind::Plist,
            _ if content.contains("<plist") => DocumentKind::Plist,
            _ => DocumentKind::Xml,
        }
    }
}

/// Editing operations shared by every supported document format
pub trait DocumentAdapter: std::fmt::Debug {
    fn kind(&self) -> DocumentKind;

    /// Apply `edit` at `selector`. Attribute edits return the target's
    /// attributes from before the change.
    fn graft(&mut self, selector: &str, edit: &Edit<'_>) -> Result<Option<Attributes>, TreeError>;

    /// Reverse `edit` at `selector`
    fn prune(&mut self, selector: &str, edit: &Edit<'_>) -> Result<(), TreeError>;

    /// Whether two selectors address the same node of this document
    fn same_target(&self, one: &str, two: &str) -> bool;

    fn serialize(&self, indent: usize) -> Result<String, TreeError>;
}

impl DocumentAdapter for XmlDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Xml
    }

    fn graft(&mut self, selector: &str, edit: &Edit<'_>) -> Result<Option<Attributes>, TreeError> {
        let node = Element::parse(edit.xml)?;
        let nodes = std::slice::from_ref(&node);
        let failed = || TreeError::GraftFailed(selector.to_string());
        match edit.mode {
            None => {
                if graft_xml(&mut self.root, nodes, selector, edit.after) {
                    Ok(None)
                } else {
                    Err(failed())
                }
            }
            Some(EditMode::Merge) => graft_xml_merge(&mut self.root, nodes, selector)
                .map(Some)
                .ok_or_else(failed),
            Some(EditMode::Overwrite) => graft_xml_overwrite(&mut self.root, nodes, selector)
                .map(Some)
                .ok_or_else(failed),
            Some(EditMode::Remove) => {
                let snapshot = resolve_parent(&self.root, selector)
                    .and_then(|path| self.root.element_at(&path))
                    .map(|target| target.attributes.clone())
                    .ok_or_else(failed)?;
                if prune_xml_remove(&mut self.root, selector, nodes) {
                    Ok(Some(snapshot))
                } else {
                    Err(failed())
                }
            }
        }
    }

    fn prune(&mut self, selector: &str, edit: &Edit<'_>) -> Result<(), TreeError> {
        let pruned = match edit.mode {
            None => {
                let node = Element::parse(edit.xml)?;
                prune_xml(&mut self.root, std::slice::from_ref(&node), selector)
            }
            Some(_) => prune_xml_restore(&mut self.root, selector, edit.old_attrib),
        };
        if pruned {
            Ok(())
        } else {
            Err(TreeError::PruneFailed(selector.to_string()))
        }
    }

    fn same_target(&self, one: &str, two: &str) -> bool {
        if one == two {
            return true;
        }
        match (resolve_parent(&self.root, one), resolve_parent(&self.root, two)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn serialize(&self, indent: usize) -> Result<String, TreeError> {
        self.to_string_indented(indent)
    }
}

impl DocumentAdapter for PlistDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Plist
    }

    fn graft(&mut self, selector: &str, edit: &Edit<'_>) -> Result<Option<Attributes>, TreeError> {
        let value = PlistValue::from_fragment(edit.xml)?;
        let dict = self
            .dict_mut()
            .ok_or_else(|| TreeError::GraftFailed(selector.to_string()))?;
        if graft_plist(dict, &value, selector) {
            Ok(None)
        } else {
            Err(TreeError::GraftFailed(selector.to_string()))
        }
    }

    fn prune(&mut self, selector: &str, edit: &Edit<'_>) -> Result<(), TreeError> {
        let value = PlistValue::from_fragment(edit.xml)?;
        let dict = self
            .dict_mut()
            .ok_or_else(|| TreeError::PruneFailed(selector.to_string()))?;
        if prune_plist(dict, &value, selector) {
            Ok(())
        } else {
            Err(TreeError::PruneFailed(selector.to_string()))
        }
    }

    fn same_target(&self, one: &str, two: &str) -> bool {
        one == two
    }

    fn serialize(&self, _indent: usize) -> Result<String, TreeError> {
        self.to_plist_string()
    }
}

/// Parse file content into the matching adapter. Binary plists are rejected.
pub fn load_document(path: &Path, bytes: &[u8]) -> Result<Box<dyn DocumentAdapter>, TreeError> {
    if bytes.starts_with(b"bplist") {
        return Err(TreeError::UnsupportedFormat(format!(
            "{} is a binary plist",
            path.display()
        )));
    }
    let content = String::from_utf8(bytes.to_vec())?;
    Ok(match DocumentKind::detect(path, &content) {
        DocumentKind::Xml => Box::new(XmlDocument::parse(&content)?),
        DocumentKind::Plist => Box::new(PlistDocument::parse(&content)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_kind() {
        assert_eq!(DocumentKind::detect(Path::new("a/AndroidManifest.xml"), ""), DocumentKind::Xml);
        assert_eq!(DocumentKind::detect(Path::new("Main.storyboard"), ""), DocumentKind::Xml);
        assert_eq!(DocumentKind::detect(Path::new("App-Info.plist"), ""), DocumentKind::Plist);
        assert_eq!(
            DocumentKind::detect(Path::new("Entitlements"), "<plist version=\"1.0\"><dict/></plist>"),
            DocumentKind::Plist
        );
    }

    #[test]
    fn test_binary_plist_rejected() {
        let result = load_document(&PathBuf::from("Info.plist"), b"bplist00\x01\x02");
        assert!(matches!(result, Err(TreeError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_remove_mode_snapshot_restores() -> Result<(), TreeError> {
        let mut doc = load_document(
            Path::new("AndroidManifest.xml"),
            br#"<manifest><application android:debuggable="true" android:label="x"/></manifest>"#,
        )?;
        let xml = r#"<application android:debuggable="true"/>"#;
        let edit = Edit {
            xml,
            mode: Some(EditMode::Remove),
            ..Default::default()
        };
        let snapshot = doc.graft("/manifest/application", &edit)?;
        assert!(!doc.serialize(4)?.contains("debuggable"));

        let undo = Edit {
            old_attrib: snapshot.as_ref(),
            ..edit
        };
        doc.prune("/manifest/application", &undo)?;
        assert!(doc.serialize(4)?.contains("android:debuggable=\"true\""));
        Ok(())
    }

    #[test]
    fn test_unresolvable_graft_is_error() -> Result<(), TreeError> {
        let mut doc = load_document(Path::new("config.xml"), b"<widget/>")?;
        let edit = Edit {
            xml: "<x a=\"1\"/>",
            mode: Some(EditMode::Merge),
            ..Default::default()
        };
        assert!(matches!(doc.graft("/widget/missing", &edit), Err(TreeError::GraftFailed(_))));
        assert!(doc.same_target("/widget", "/*"));
        Ok(())
    }

    #[test]
    fn test_edit_mode_serde_names() {
        assert_eq!(EditMode::parse("overwrite"), Some(EditMode::Overwrite));
        assert_eq!(EditMode::Merge.as_str(), "merge");
        assert_eq!(EditMode::parse("replace"), None);
    }
}
