//! XPath-like selectors over an [`Element`] tree
//!
//! Supports the subset plugin manifests use in practice: absolute
//! (`/manifest/application`), any-root (`/*/application`), relative
//! (`application/activity`), `.`, `*`, `//` descendant steps and the
//! predicates `[@attr]`, `[@attr='value']`, `[child]`, `[child='text']` and
//! positional `[n]`.

use crate::xml::{Element, NodePath};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    SelfNode,
    Any,
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(String),
    AttrEquals(String, String),
    HasChild(String),
    ChildText(String, String),
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    test: NodeTest,
    predicates: SmallVec<[Predicate; 2]>,
}

impl Step {
    fn parse(segment: &str) -> Option<Step> {
        let segment = segment.trim();
        let (name, mut rest) = match segment.find('[') {
            Some(idx) => (&segment[..idx], &segment[idx..]),
            None => (segment, ""),
        };

        let test = match name {
            "." => NodeTest::SelfNode,
            "*" => NodeTest::Any,
            "" | ".." => return None,
            tag => NodeTest::Tag(tag.to_string()),
        };

        let mut predicates = SmallVec::new();
        while !rest.is_empty() {
            let close = closing_bracket(rest)?;
            predicates.push(parse_predicate(&rest[1..close])?);
            rest = rest[close + 1..].trim_start();
        }

        Some(Step { test, predicates })
    }

    fn matches_node(&self, element: &Element) -> bool {
        match &self.test {
            NodeTest::SelfNode | NodeTest::Any => true,
            NodeTest::Tag(tag) => element.tag == *tag,
        }
    }

    fn filter_predicates(&self, root: &Element, candidates: Vec<NodePath>) -> Vec<NodePath> {
        let mut current = candidates;
        for predicate in &self.predicates {
            current = match predicate {
                Predicate::Position(n) => current.into_iter().nth(n.saturating_sub(1)).into_iter().collect(),
                other => current
                    .into_iter()
                    .filter(|path| {
                        root.element_at(path)
                            .is_some_and(|el| predicate_holds(other, el))
                    })
                    .collect(),
            };
        }
        current
    }
}

fn predicate_holds(predicate: &Predicate, element: &Element) -> bool {
    match predicate {
        Predicate::HasAttr(name) => element.attributes.contains_key(name),
        Predicate::AttrEquals(name, value) => element.get(name) == Some(value.as_str()),
        Predicate::HasChild(tag) => element.find(tag).is_some(),
        Predicate::ChildText(tag, text) => element.find_all(tag).any(|c| c.text_trimmed() == *text),
        Predicate::Position(_) => true,
    }
}

fn closing_bracket(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in s.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ']') => return Some(idx),
            _ => {}
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    value
}

fn parse_predicate(body: &str) -> Option<Predicate> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Some(attr) = body.strip_prefix('@') {
        return Some(match attr.split_once('=') {
            Some((name, value)) => {
                Predicate::AttrEquals(name.trim().to_string(), unquote(value).to_string())
            }
            None => Predicate::HasAttr(attr.trim().to_string()),
        });
    }
    if body.chars().all(|c| c.is_ascii_digit()) {
        let n = body.parse().ok()?;
        return (n > 0).then_some(Predicate::Position(n));
    }
    Some(match body.split_once('=') {
        Some((tag, text)) => Predicate::ChildText(tag.trim().to_string(), unquote(text).to_string()),
        None => Predicate::HasChild(body.to_string()),
    })
}

/// Split a path on `/`, ignoring separators inside predicates
pub(crate) fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in path.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                segments.push(&path[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Split a selector into its parent selector and last segment, like
/// `dirname`/`basename`. `/manifest/application` → (`/manifest`, `application`),
/// `application` → (`.`, `application`).
pub fn split_last_segment(selector: &str) -> Option<(&str, &str)> {
    let segments = split_segments(selector);
    let last = *segments.last()?;
    if segments.len() < 2 {
        return (last != ".").then_some((".", last));
    }
    let parent_len = selector.len().saturating_sub(last.len() + 1);
    let parent = &selector[..parent_len];
    Some((if parent.is_empty() && selector.starts_with('/') { "/" } else { parent }, last))
}

/// True when a selector segment is a plain tag name that can be created
pub fn is_plain_tag(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "*"
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Evaluate a relative path against `root`, returning the first match in
/// document order
pub fn find_path(root: &Element, path: &str) -> Option<NodePath> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut current: Vec<NodePath> = vec![NodePath::new()];
    let mut descendant = false;
    for segment in split_segments(path) {
        if segment.is_empty() {
            descendant = true;
            continue;
        }
        let step = Step::parse(segment)?;
        let mut next = Vec::new();
        for context in &current {
            let element = root.element_at(context)?;
            let candidates = if step.test == NodeTest::SelfNode {
                vec![context.clone()]
            } else if descendant {
                let mut found = Vec::new();
                collect_descendants(element, context, &step, &mut found);
                found
            } else {
                element
                    .children
                    .iter()
                    .enumerate()
                    .filter(|(_, node)| node.as_element().is_some_and(|el| step.matches_node(el)))
                    .map(|(idx, _)| {
                        let mut path = context.clone();
                        path.push(idx);
                        path
                    })
                    .collect()
            };
            next.extend(step.filter_predicates(root, candidates));
        }
        if next.is_empty() {
            return None;
        }
        current = next;
        descendant = false;
    }

    current.into_iter().next()
}

fn collect_descendants(element: &Element, base: &NodePath, step: &Step, out: &mut Vec<NodePath>) {
    for (idx, node) in element.children.iter().enumerate() {
        if let Some(child) = node.as_element() {
            let mut path = base.clone();
            path.push(idx);
            if step.matches_node(child) {
                out.push(path.clone());
            }
            collect_descendants(child, &path, step, out);
        }
    }
}

/// Resolve `selector` to a node of the document rooted at `root`.
///
/// Absolute selectors must name the root tag (or `*`) in their first
/// segment; everything else is evaluated relative to the root element.
/// Returns `None` when nothing matches.
pub fn resolve_parent(root: &Element, selector: &str) -> Option<NodePath> {
    let Some(rest) = selector.strip_prefix('/') else {
        return find_path(root, selector);
    };

    let segments = split_segments(rest);
    let first = Step::parse(segments.first()?)?;
    let root_matches = match &first.test {
        NodeTest::Any => true,
        NodeTest::Tag(tag) => *tag == root.tag,
        NodeTest::SelfNode => false,
    };
    if !root_matches || first.filter_predicates(root, vec![NodePath::new()]).is_empty() {
        return None;
    }

    let first_len = segments[0].len();
    match rest.get(first_len + 1..) {
        Some(sub) if !sub.trim().is_empty() => find_path(root, sub),
        _ => Some(NodePath::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    fn doc() -> XmlDocument {
        let xml = r#"<manifest package="x">
            <uses-sdk min="1"/>
            <application>
                <activity android:name="Main" android:label="a/b"/>
                <activity android:name="Other"/>
                <receiver><intent-filter/></receiver>
            </application>
        </manifest>"#;
        match XmlDocument::parse(xml) {
            Ok(doc) => doc,
            Err(e) => panic!("fixture should parse: {e}"),
        }
    }

    fn tag_at(doc: &XmlDocument, selector: &str) -> Option<String> {
        resolve_parent(&doc.root, selector)
            .and_then(|p| doc.root.element_at(&p).map(|el| el.tag.clone()))
    }

    #[test]
    fn test_absolute_root_selectors() {
        let doc = doc();
        assert_eq!(tag_at(&doc, "/manifest").as_deref(), Some("manifest"));
        assert_eq!(tag_at(&doc, "/*").as_deref(), Some("manifest"));
        assert_eq!(tag_at(&doc, "/*/application").as_deref(), Some("application"));
        assert_eq!(tag_at(&doc, "/widget"), None);
        assert_eq!(tag_at(&doc, "/"), None);
    }

    #[test]
    fn test_relative_and_predicates() {
        let doc = doc();
        assert_eq!(tag_at(&doc, "application").as_deref(), Some("application"));
        let other = resolve_parent(&doc.root, "application/activity[@android:name='Other']")
            .and_then(|p| doc.root.element_at(&p).and_then(|el| el.get("android:name").map(String::from)));
        assert_eq!(other.as_deref(), Some("Other"));

        let slashed = resolve_parent(&doc.root, "/manifest/application/activity[@android:label=\"a/b\"]");
        assert!(slashed.is_some());

        let second = resolve_parent(&doc.root, "application/activity[2]")
            .and_then(|p| doc.root.element_at(&p).and_then(|el| el.get("android:name").map(String::from)));
        assert_eq!(second.as_deref(), Some("Other"));

        assert_eq!(tag_at(&doc, "application[receiver]").as_deref(), Some("application"));
        assert_eq!(tag_at(&doc, ".//intent-filter").as_deref(), Some("intent-filter"));
        assert_eq!(tag_at(&doc, "application/service"), None);
    }

    #[test]
    fn test_split_last_segment() {
        assert_eq!(split_last_segment("/manifest/application"), Some(("/manifest", "application")));
        assert_eq!(split_last_segment("/manifest"), Some(("/", "manifest")));
        assert_eq!(split_last_segment("a/b[@x='1/2']"), Some(("a", "b[@x='1/2']")));
        assert_eq!(split_last_segment("application"), Some((".", "application")));
        assert_eq!(split_last_segment("."), None);
    }

    #[test]
    fn test_plain_tags() {
        assert!(is_plain_tag("uses-permission"));
        assert!(is_plain_tag("android:foo"));
        assert!(!is_plain_tag("activity[@a='b']"));
        assert!(!is_plain_tag("*"));
    }
}
