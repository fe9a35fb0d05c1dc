//! Document tree primitives for plugmunge
//!
//! Owned XML and plist trees, selector resolution, and the graft/prune
//! operations the munger uses to apply and revert fragments. Every operation
//! resolves its target before mutating, so a failed call leaves the tree as
//! it was.

pub mod adapter;
pub mod errors;
pub mod graft;
pub mod merge;
pub mod plist;
pub mod selector;
pub mod xml;

pub use adapter::{load_document, DocumentAdapter, DocumentKind, Edit, EditMode};
pub use errors::TreeError;
pub use graft::{equal_nodes, find_insert_idx};
pub use merge::merge_xml;
pub use plist::{PlistDocument, PlistValue};
pub use xml::{Attributes, Element, Node, XmlDocument};
