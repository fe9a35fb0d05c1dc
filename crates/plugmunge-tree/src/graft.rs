//! Graft and prune primitives for XML documents
//!
//! Every primitive resolves its target before touching the tree, so a
//! `false`/`None` result means the document was left unmodified.

use crate::selector::{is_plain_tag, resolve_parent, split_last_segment};
use crate::xml::{Attributes, Element, Node};
use tracing::debug;

/// Structural equality: tag, trimmed text, attribute set (order-independent)
/// and child elements in order. Comments are ignored.
pub fn equal_nodes(one: &Element, two: &Element) -> bool {
    if one.tag != two.tag || one.text_trimmed() != two.text_trimmed() {
        return false;
    }
    if !attrib_match(&one.attributes, &two.attributes) {
        return false;
    }
    let mut left = one.elements();
    let mut right = two.elements();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) if equal_nodes(a, b) => {}
            _ => return false,
        }
    }
}

/// Same keys with the same values, ignoring order
pub fn attrib_match(one: &Attributes, two: &Attributes) -> bool {
    one.len() == two.len() && one.iter().all(|(k, v)| two.get(k) == Some(v))
}

/// Index at which to insert a child given a `;`-separated priority list of
/// sibling tags. The first entry that exists among the children wins and the
/// node goes right after its last occurrence; with no match it goes first.
pub fn find_insert_idx(children: &[Node], after: &str) -> usize {
    after
        .split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .find_map(|tag| children.iter().rposition(|child| child.tag() == Some(tag)))
        .map_or(0, |idx| idx + 1)
}

fn has_equal_child(parent: &Element, node: &Element) -> bool {
    parent.find_all(&node.tag).any(|kid| equal_nodes(node, kid))
}

/// Work out which ancestors must be created for `selector` to resolve.
/// Returns the segments to create, outermost first, plus the selector of the
/// existing ancestor they hang from.
fn plan_missing_parents<'s>(root: &Element, selector: &'s str) -> Option<(&'s str, Vec<&'s str>)> {
    let mut missing = Vec::new();
    let mut current = selector;
    loop {
        let (parent, name) = split_last_segment(current)?;
        if !is_plain_tag(name) {
            return None;
        }
        missing.push(name);
        if resolve_parent(root, parent).is_some() {
            missing.reverse();
            return Some((parent, missing));
        }
        current = parent;
    }
}

/// Insert `nodes` as children of the node at `selector`.
///
/// Missing ancestors named by plain tags are created first. A node is
/// skipped when a structurally equal child already exists. With `after`,
/// the insertion point follows [`find_insert_idx`]; otherwise nodes are
/// appended. Returns `false` when the parent cannot be resolved or created.
pub fn graft_xml(root: &mut Element, nodes: &[Element], selector: &str, after: Option<&str>) -> bool {
    let path = match resolve_parent(root, selector) {
        Some(path) => path,
        None => {
            let Some((anchor, missing)) = plan_missing_parents(root, selector) else {
                return false;
            };
            debug!("Creating missing parents {:?} under {}", missing, anchor);
            let mut parent_selector = anchor.to_string();
            for name in missing {
                if !graft_xml(root, &[Element::new(name)], &parent_selector, None) {
                    return false;
                }
                if !parent_selector.ends_with('/') {
                    parent_selector.push('/');
                }
                parent_selector.push_str(name);
            }
            match resolve_parent(root, selector) {
                Some(path) => path,
                None => return false,
            }
        }
    };

    let Some(parent) = root.element_at_mut(&path) else {
        return false;
    };
    for node in nodes {
        if has_equal_child(parent, node) {
            continue;
        }
        let idx = after.map_or(parent.children.len(), |a| find_insert_idx(&parent.children, a));
        parent.children.insert(idx, Node::Element(node.clone()));
    }
    true
}

/// Copy the attributes of `nodes` onto the target, keeping attributes the
/// nodes do not mention. Returns the target's attributes from before the
/// change, or `None` when the selector does not resolve.
pub fn graft_xml_merge(root: &mut Element, nodes: &[Element], selector: &str) -> Option<Attributes> {
    let path = resolve_parent(root, selector)?;
    let target = root.element_at_mut(&path)?;
    let snapshot = target.attributes.clone();
    for node in nodes {
        for (key, value) in &node.attributes {
            target.attributes.insert(key.clone(), value.clone());
        }
    }
    Some(snapshot)
}

/// Replace the target's attributes with those of `nodes`. Returns the
/// previous attributes, or `None` when the selector does not resolve.
pub fn graft_xml_overwrite(root: &mut Element, nodes: &[Element], selector: &str) -> Option<Attributes> {
    let path = resolve_parent(root, selector)?;
    let target = root.element_at_mut(&path)?;
    let snapshot = std::mem::take(&mut target.attributes);
    for node in nodes {
        for (key, value) in &node.attributes {
            target.attributes.insert(key.clone(), value.clone());
        }
    }
    Some(snapshot)
}

/// Remove from the node at `selector` every child structurally equal to
/// one of `nodes`
pub fn prune_xml(root: &mut Element, nodes: &[Element], selector: &str) -> bool {
    let Some(path) = resolve_parent(root, selector) else {
        return false;
    };
    let Some(parent) = root.element_at_mut(&path) else {
        return false;
    };
    parent.children.retain(|child| {
        !child
            .as_element()
            .is_some_and(|kid| nodes.iter().any(|node| equal_nodes(node, kid)))
    });
    true
}

/// Reset the target's attributes to `old_attrib` when a snapshot exists
pub fn prune_xml_restore(root: &mut Element, selector: &str, old_attrib: Option<&Attributes>) -> bool {
    let Some(path) = resolve_parent(root, selector) else {
        return false;
    };
    let Some(target) = root.element_at_mut(&path) else {
        return false;
    };
    if let Some(old) = old_attrib {
        target.attributes = old.clone();
    }
    true
}

/// Delete from the target the attribute keys present on `nodes`, leaving
/// the rest untouched
pub fn prune_xml_remove(root: &mut Element, selector: &str, nodes: &[Element]) -> bool {
    let Some(path) = resolve_parent(root, selector) else {
        return false;
    };
    let Some(target) = root.element_at_mut(&path) else {
        return false;
    };
    for node in nodes {
        for key in node.attributes.keys() {
            target.attributes.shift_remove(key);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    fn parse(xml: &str) -> Element {
        match Element::parse(xml) {
            Ok(el) => el,
            Err(e) => panic!("fixture should parse: {e}"),
        }
    }

    #[test]
    fn test_equal_nodes_ignores_attribute_order_and_whitespace() {
        let a = parse(r#"<a x="1" y="2">  hi <b/></a>"#);
        let b = parse(r#"<a y="2" x="1">hi<b/></a>"#);
        assert!(equal_nodes(&a, &b));
        assert!(equal_nodes(&b, &a));
        assert!(equal_nodes(&a, &a));

        let c = parse(r#"<a x="1" y="3">hi<b/></a>"#);
        assert!(!equal_nodes(&a, &c));
        let d = parse(r#"<a x="1" y="2">hi<b/><b/></a>"#);
        assert!(!equal_nodes(&a, &d));
    }

    #[test]
    fn test_find_insert_idx_priority_order() {
        let parent = parse("<p><A/><B/></p>");
        assert_eq!(find_insert_idx(&parent.children, "C;B;A"), 2);
        assert_eq!(find_insert_idx(&parent.children, "C;A"), 1);
        assert_eq!(find_insert_idx(&parent.children, "C;D"), 0);
    }

    #[test]
    fn test_graft_is_idempotent() {
        let mut root = parse("<manifest><application/></manifest>");
        let perm = parse(r#"<uses-permission android:name="X"/>"#);
        assert!(graft_xml(&mut root, &[perm.clone()], "/manifest", None));
        assert!(graft_xml(&mut root, &[perm], "/manifest", None));
        assert_eq!(root.find_all("uses-permission").count(), 1);
    }

    #[test]
    fn test_graft_creates_missing_parents() {
        let mut root = parse("<widget/>");
        let feature = parse(r#"<feature name="Camera"/>"#);
        assert!(graft_xml(&mut root, &[feature], "/widget/platform/features", None));
        let created = root.find("platform").and_then(|p| p.find("features"));
        assert!(created.is_some_and(|f| f.find("feature").is_some()));
    }

    #[test]
    fn test_graft_unresolvable_leaves_document_untouched() {
        let mut root = parse("<widget/>");
        let before = root.clone();
        let node = parse("<x/>");
        assert!(!graft_xml(&mut root, &[node.clone()], "/other/thing", None));
        assert!(!graft_xml(&mut root, &[node], "/widget/a[@b='c']/d", None));
        assert_eq!(root, before);
    }

    #[test]
    fn test_graft_with_after() {
        let mut root = parse("<manifest><uses-permission/><application/></manifest>");
        let sdk = parse("<uses-sdk/>");
        assert!(graft_xml(&mut root, &[sdk], "/manifest", Some("uses-feature;uses-permission")));
        let tags: Vec<&str> = root.elements().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["uses-permission", "uses-sdk", "application"]);
    }

    #[test]
    fn test_merge_overwrite_and_restore() {
        let mut root = parse(r#"<manifest><uses-sdk min="10" max="15"/></manifest>"#);
        let edit = parse(r#"<uses-sdk target="24"/>"#);

        let snapshot = graft_xml_merge(&mut root, &[edit.clone()], "/manifest/uses-sdk");
        assert_eq!(snapshot.as_ref().map(Attributes::len), Some(2));
        let sdk = root.find("uses-sdk");
        assert!(sdk.is_some_and(|s| s.get("min") == Some("10") && s.get("target") == Some("24")));

        assert!(prune_xml_restore(&mut root, "/manifest/uses-sdk", snapshot.as_ref()));
        assert!(root.find("uses-sdk").is_some_and(|s| s.get("target").is_none() && s.get("max") == Some("15")));

        let overwritten = graft_xml_overwrite(&mut root, &[edit], "/manifest/uses-sdk");
        assert!(overwritten.is_some());
        assert!(root.find("uses-sdk").is_some_and(|s| s.attributes.len() == 1));
        assert!(graft_xml_merge(&mut root, &[], "/manifest/missing").is_none());
    }

    #[test]
    fn test_prune_xml_and_remove() {
        let mut root = parse(r#"<manifest><a x="1"/><a x="2"/><b k="v" j="w"/></manifest>"#);
        assert!(prune_xml(&mut root, &[parse(r#"<a x="2"/>"#)], "/manifest"));
        assert_eq!(root.find_all("a").count(), 1);

        assert!(prune_xml_remove(&mut root, "/manifest/b", &[parse(r#"<b k="ignored"/>"#)]));
        assert!(root.find("b").is_some_and(|b| b.get("k").is_none() && b.get("j") == Some("w")));
        assert!(!prune_xml(&mut root, &[], "/nope"));
    }

    #[test]
    fn test_prune_xml_removes_every_equal_child() {
        let mut root = parse(r#"<manifest><a x="1"/><!-- keep --><a x="1"/><a x="2"/></manifest>"#);
        assert!(prune_xml(&mut root, &[parse(r#"<a x="1"/>"#)], "/manifest"));
        let left: Vec<Option<&str>> = root.elements().map(|a| a.get("x")).collect();
        assert_eq!(left, vec![Some("2")]);
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_graft_keeps_comments_in_place() -> Result<(), crate::errors::TreeError> {
        let mut doc = XmlDocument::parse("<manifest><!-- c --><A/><B/></manifest>")?;
        let node = parse("<C/>");
        assert!(graft_xml(&mut doc.root, &[node], "/manifest", Some("C;B;A")));
        let tags: Vec<Option<&str>> = doc.root.children.iter().map(Node::tag).collect();
        assert_eq!(tags, vec![None, Some("A"), Some("B"), Some("C")]);
        Ok(())
    }
}
