//! Order-preserving, type-partitioned mask containers.

use std::collections::BTreeMap;

use crate::masks::{Mask, MaskKind, Traceable};
use crate::signal::Signal;

/// The set of all masks of a document.
///
/// Masks are partitioned by kind and kept in insertion order within a
/// kind; iteration order is therefore deterministic (kind order, then
/// insertion order), which the export paths rely on. Identity is the mask
/// name, which is unique within the set.
#[derive(Debug, Default)]
pub struct MaskSet {
    items: BTreeMap<MaskKind, Vec<Mask>>,
    /// Fired after a mask was inserted.
    pub added: Signal<Mask>,
    /// Fired before a mask is removed, while it is still a member.
    pub preremove: Signal<Mask>,
    /// Fired after a mask was removed.
    pub removed: Signal<Mask>,
}

impl MaskSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// True when the set holds no masks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a mask with this name is a member.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Looks up a member by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Mask> {
        let (kind, idx) = self.position(name)?;
        self.items.get(&kind).and_then(|v| v.get(idx))
    }

    /// Mutable lookup by name (for split/translate operations).
    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Mask> {
        let (kind, idx) = self.position(name)?;
        self.items.get_mut(&kind).and_then(|v| v.get_mut(idx))
    }

    /// Inserts a mask and fires `added`; a no-op returning false when a
    /// mask of the same name is already a member.
    pub fn add(&mut self, mask: Mask) -> bool {
        if self.contains(mask.name()) {
            return false;
        }
        let kind = mask.kind();
        self.items.entry(kind).or_default().push(mask);
        if let Some(stored) = self.items.get(&kind).and_then(|v| v.last()) {
            self.added.emit(stored);
        }
        true
    }

    /// Removes a mask by name, firing `preremove` before removal and
    /// `removed` after; a no-op returning None when absent.
    pub fn discard(&mut self, name: &str) -> Option<Mask> {
        let (kind, idx) = self.position(name)?;
        if let Some(member) = self.items.get(&kind).and_then(|v| v.get(idx)) {
            self.preremove.emit(member);
        }
        let mask = self.items.get_mut(&kind).map(|v| v.remove(idx))?;
        self.removed.emit(&mask);
        Some(mask)
    }

    /// Removes every mask, firing the removal signals per member.
    pub fn clear(&mut self) {
        let names: Vec<String> = self.iter().map(|m| m.name().to_string()).collect();
        for name in names {
            self.discard(&name);
        }
    }

    /// The kinds currently present, ascending.
    #[must_use]
    pub fn kinds(&self) -> Vec<MaskKind> {
        self.items
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| *k)
            .collect()
    }

    /// Top-level masks of one kind, in insertion order.
    #[must_use]
    pub fn of_kind(&self, kind: MaskKind) -> &[Mask] {
        self.items.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Iterates over top-level masks: kind order, then insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Mask> {
        self.items.values().flatten()
    }

    /// Iterates over every trace source: each top-level mask followed
    /// directly by its descendants (depth-first).
    pub fn iter_flat(&self) -> impl Iterator<Item = &dyn Traceable> {
        self.iter()
            .flat_map(|m| std::iter::once(m.as_traceable()).chain(m.children()))
    }

    fn position(&self, name: &str) -> Option<(MaskKind, usize)> {
        for (kind, masks) in &self.items {
            if let Some(idx) = masks.iter().position(|m| m.name() == name) {
                return Some((*kind, idx));
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a MaskSet {
    type Item = &'a Mask;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::Values<'a, MaskKind, Vec<Mask>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values().flatten()
    }
}

/// Path of a selectable mask: a top-level mask name, optionally narrowed
/// to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaskPath {
    /// Name of the top-level mask.
    pub mask: String,
    /// Name of a child, when a descendant is addressed.
    pub child: Option<String>,
}

impl MaskPath {
    /// Path of a top-level mask.
    #[must_use]
    pub fn top(mask: impl Into<String>) -> Self {
        Self {
            mask: mask.into(),
            child: None,
        }
    }

    /// Path of a child of a top-level mask.
    #[must_use]
    pub fn child(mask: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            mask: mask.into(),
            child: Some(child.into()),
        }
    }
}

/// The current selection: a MaskSet-like list of paths with hierarchy
/// rules. Selecting a child implicitly selects its parent; deselecting a
/// parent deselects its selected descendants first.
#[derive(Debug, Default)]
pub struct Selection {
    entries: Vec<MaskPath>,
    /// Fired after a path was selected.
    pub added: Signal<MaskPath>,
    /// Fired after a path was deselected.
    pub removed: Signal<MaskPath>,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of selected paths (parents included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the exact path is selected.
    #[must_use]
    pub fn contains(&self, path: &MaskPath) -> bool {
        self.entries.contains(path)
    }

    /// Selects a path; a child path first selects its parent. No-op for
    /// already selected paths.
    pub fn add(&mut self, path: MaskPath) {
        if path.child.is_some() {
            let parent = MaskPath::top(path.mask.clone());
            if !self.contains(&parent) {
                self.entries.push(parent.clone());
                self.added.emit(&parent);
            }
        }
        if self.contains(&path) {
            return;
        }
        self.entries.push(path.clone());
        self.added.emit(&path);
    }

    /// Deselects a path; a parent path first deselects its selected
    /// descendants. No-op for unselected paths.
    pub fn discard(&mut self, path: &MaskPath) {
        if path.child.is_none() {
            let descendants: Vec<MaskPath> = self
                .entries
                .iter()
                .filter(|e| e.mask == path.mask && e.child.is_some())
                .cloned()
                .collect();
            for d in descendants {
                self.discard(&d);
            }
        }
        if let Some(pos) = self.entries.iter().position(|e| e == path) {
            let entry = self.entries.remove(pos);
            self.removed.emit(&entry);
        }
    }

    /// Iterates over selected paths in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &MaskPath> {
        self.entries.iter()
    }
}
