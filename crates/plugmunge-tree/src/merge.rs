//! Whole-document merge of an app manifest into a platform config

use crate::graft::attrib_match;
use crate::xml::{Element, Node};
use indexmap::IndexMap;

/// Tags that declare structure rather than content and are never merged
const BLACKLIST: &[&str] = &["platform", "feature", "plugin", "engine"];

/// Tags of which a document holds at most one
const SINGLETONS: &[&str] = &["content", "author", "name"];

/// Fold `src` into `dest`.
///
/// Attributes and text are copied when `clobber` is set or `dest` lacks
/// them. Children of `<platform name="{platform}">` sections are merged as if
/// they were direct children. Singleton tags replace their counterpart; other
/// children reuse an existing child with identical text and attributes and
/// are appended otherwise. `<preference>` entries are then reduced to one
/// per `name`, keeping the last value.
pub fn merge_xml(src: &Element, dest: &mut Element, platform: Option<&str>, clobber: bool) {
    if BLACKLIST.contains(&src.tag.as_str()) {
        return;
    }

    for (key, value) in &src.attributes {
        if clobber || dest.get(key).is_none_or(str::is_empty) {
            dest.set(key.clone(), value.clone());
        }
    }

    let text = src.text();
    if !text.trim().is_empty() && (clobber || dest.text_trimmed().is_empty()) {
        dest.set_text(text);
    }

    for child in src.elements() {
        merge_child(child, dest, platform, clobber);
    }

    if let Some(name) = platform {
        for section in src.find_all("platform").filter(|p| p.get("name") == Some(name)) {
            for child in section.elements() {
                merge_child(child, dest, platform, clobber);
            }
        }
    }

    remove_duplicate_preferences(dest);
}

fn merge_child(src_child: &Element, dest: &mut Element, platform: Option<&str>, clobber: bool) {
    let tag = src_child.tag.as_str();
    if BLACKLIST.contains(&tag) {
        return;
    }

    let mut dest_child = Element::new(tag);
    let mut should_merge = true;

    let found = if SINGLETONS.contains(&tag) {
        position_of(dest, |el| el.tag == tag)
    } else {
        let candidate = position_of(dest, |el| {
            el.tag == tag && text_match(src_child, el) && attrib_match(&src_child.attributes, &el.attributes)
        });
        if candidate.is_some() {
            should_merge = false;
        }
        candidate
    };

    if let Some(idx) = found {
        if let Node::Element(existing) = dest.children.remove(idx) {
            dest_child = existing;
        }
    }

    merge_xml(src_child, &mut dest_child, platform, clobber && should_merge);
    dest.append(dest_child);
}

fn position_of(parent: &Element, pred: impl Fn(&Element) -> bool) -> Option<usize> {
    parent
        .children
        .iter()
        .position(|node| node.as_element().is_some_and(&pred))
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn text_match(src: &Element, dest: &Element) -> bool {
    let left = strip_whitespace(&src.text());
    left.is_empty() || left == strip_whitespace(&dest.text())
}

fn is_named_preference(node: &Node) -> bool {
    node.as_element().is_some_and(|el| {
        el.tag == "preference" && el.get("name").is_some() && el.get("value").is_some()
    })
}

fn remove_duplicate_preferences(element: &mut Element) {
    let mut prefs: IndexMap<String, String> = IndexMap::new();
    for pref in element.children.iter().filter(|n| is_named_preference(n)).filter_map(Node::as_element) {
        if let (Some(name), Some(value)) = (pref.get("name"), pref.get("value")) {
            prefs.insert(name.to_string(), value.to_string());
        }
    }
    if prefs.is_empty() {
        return;
    }

    element.children.retain(|n| !is_named_preference(n));
    for (name, value) in prefs {
        element.append(
            Element::new("preference")
                .with_attribute("name", name)
                .with_attribute("value", value),
        );
    }
}
