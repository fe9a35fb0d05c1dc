//! Reference-counted munge operations
//!
//! Fragments at one (file, selector) location are kept in a list and matched
//! by structural equality of their XML, so two plugins declaring the same
//! node with different attribute order or whitespace share one entry.

use crate::types::{FileMunge, Fragment, Munge};
use plugmunge_tree::{equal_nodes, Attributes, Element};
use tracing::debug;

/// Outcome of [`deep_remove`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Removal {
    /// The entry is gone, either now or because it never existed
    pub removed: bool,
    /// Snapshot stored on the entry, needed to restore an attribute edit
    pub old_attrib: Option<Attributes>,
}

/// Structural comparison of two serialized fragments. Falls back to string
/// comparison when either side does not parse.
pub fn fragments_equal(one: &str, two: &str) -> bool {
    if one == two {
        return true;
    }
    match (Element::parse(one), Element::parse(two)) {
        (Ok(a), Ok(b)) => equal_nodes(&a, &b),
        _ => false,
    }
}

fn position_in(list: &[Fragment], xml: &str) -> Option<usize> {
    list.iter().position(|entry| fragments_equal(&entry.xml, xml))
}

/// Add `fragment` at (file, selector). Returns `true` when a new entry was
/// created, `false` when an existing entry's count was raised.
pub fn deep_add(munge: &mut Munge, file: &str, selector: &str, fragment: Fragment) -> bool {
    let list = munge
        .files
        .entry(file.to_string())
        .or_default()
        .parents
        .entry(selector.to_string())
        .or_default();

    match position_in(list, &fragment.xml) {
        Some(idx) => {
            let entry = &mut list[idx];
            entry.count += fragment.count;
            if entry.after.is_none() {
                entry.after = fragment.after;
            }
            false
        }
        None => {
            list.push(fragment);
            true
        }
    }
}

/// Lower the count of the entry matching `fragment` by `fragment.count`,
/// dropping it once the count reaches zero. A missing entry counts as
/// removed and leaves the munge untouched.
pub fn deep_remove(munge: &mut Munge, file: &str, selector: &str, fragment: &Fragment) -> Removal {
    let Some(list) = munge
        .files
        .get_mut(file)
        .and_then(|f| f.parents.get_mut(selector))
    else {
        return Removal {
            removed: true,
            old_attrib: None,
        };
    };

    let Some(idx) = position_in(list, &fragment.xml) else {
        return Removal {
            removed: true,
            old_attrib: None,
        };
    };

    let entry = &mut list[idx];
    let old_attrib = entry.old_attrib.clone();
    entry.count = entry.count.saturating_sub(fragment.count);
    if entry.count > 0 {
        return Removal {
            removed: false,
            old_attrib,
        };
    }

    list.remove(idx);
    Removal {
        removed: true,
        old_attrib,
    }
}

/// Find the entry whose stored XML is exactly `xml`
pub fn deep_find<'a>(munge: &'a Munge, file: &str, selector: &str, xml: &str) -> Option<&'a Fragment> {
    munge
        .files
        .get(file)?
        .parents
        .get(selector)?
        .iter()
        .find(|entry| entry.xml == xml)
}

/// Add every fragment of `delta` to `base` and return the ones that were
/// not present before. Those are the fragments to graft.
pub fn increment_munge(base: &mut Munge, delta: &Munge) -> Munge {
    let mut diff = Munge::default();
    for (file, selector, fragment) in delta.fragments() {
        if deep_add(base, file, selector, fragment.clone()) {
            deep_add(&mut diff, file, selector, fragment.clone());
        }
    }
    diff
}

/// Remove every fragment of `delta` from `base` and return the ones whose
/// count dropped to zero, carrying their attribute snapshots. Those are the
/// fragments to prune.
pub fn decrement_munge(base: &mut Munge, delta: &Munge) -> Munge {
    let mut diff = Munge::default();
    for (file, selector, fragment) in delta.fragments() {
        let removal = deep_remove(base, file, selector, fragment);
        if removal.removed {
            let mut gone = fragment.clone();
            if removal.old_attrib.is_some() {
                gone.old_attrib = removal.old_attrib;
            }
            deep_add(&mut diff, file, selector, gone);
        }
    }
    diff
}

pub fn clone_munge(munge: &Munge) -> Munge {
    let mut copy = Munge::default();
    increment_munge(&mut copy, munge);
    copy
}

/// Store a graft-time snapshot on the live entry unless it already has one.
/// Returns `true` when the snapshot was recorded.
pub fn record_old_attrib(
    munge: &mut Munge,
    file: &str,
    selector: &str,
    xml: &str,
    snapshot: Attributes,
) -> bool {
    let entry = munge
        .files
        .get_mut(file)
        .and_then(|f| f.parents.get_mut(selector))
        .and_then(|list| list.iter_mut().find(|entry| fragments_equal(&entry.xml, xml)));
    match entry {
        Some(entry) if entry.old_attrib.is_none() => {
            debug!("Recording attribute snapshot for {} {}", file, selector);
            entry.old_attrib = Some(snapshot);
            true
        }
        _ => false,
    }
}

impl Munge {
    /// Every `(file, selector, fragment)` triple in insertion order
    pub fn fragments(&self) -> impl Iterator<Item = (&str, &str, &Fragment)> {
        self.files.iter().flat_map(|(file, f)| {
            f.parents.iter().flat_map(move |(selector, list)| {
                list.iter().map(move |frag| (file.as_str(), selector.as_str(), frag))
            })
        })
    }

    /// True when no fragment is recorded. Empty selector lists are ignored.
    pub fn is_empty(&self) -> bool {
        self.fragments().next().is_none()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments().count()
    }

    /// Drop empty selector lists and files
    pub fn compact(&mut self) {
        for file in self.files.values_mut() {
            file.parents.retain(|_, list| !list.is_empty());
        }
        self.files.retain(|_, f: &mut FileMunge| !f.parents.is_empty());
    }
}
