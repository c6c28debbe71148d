//! Ordered collection of the painters attached to one pad.

use crate::pad::PadPainter;
use crate::painter::ObjectPainter;
use crate::queue::DrawKind;
use crate::LocalBoxFuture;
use pad_model::{SnapId, SnapObject};
use slotmap::SlotMap;
use smallvec::{smallvec, SmallVec};
use std::rc::Rc;

slotmap::new_key_type! {
    /// Stable key of a registry entry, survives reordering and removals.
    pub struct EntryKey;
}

/// Painter owned by a pad: a nested pad or an object painter.
#[derive(Clone)]
pub enum PainterHandle {
    Pad(Rc<PadPainter>),
    Object(Rc<dyn ObjectPainter>),
}

impl PainterHandle {
    pub fn as_pad(&self) -> Option<&Rc<PadPainter>> {
        match self {
            Self::Pad(pad) => Some(pad),
            Self::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<dyn ObjectPainter>> {
        match self {
            Self::Pad(_) => None,
            Self::Object(painter) => Some(painter),
        }
    }

    pub fn is_pad(&self) -> bool {
        matches!(self, Self::Pad(_))
    }

    pub fn object(&self) -> Option<Rc<SnapObject>> {
        match self {
            Self::Pad(_) => None,
            Self::Object(painter) => painter.object(),
        }
    }

    pub fn class_name(&self) -> String {
        match self {
            Self::Pad(pad) => pad.class_name(),
            Self::Object(painter) => painter.class_name(),
        }
    }

    pub fn object_name(&self) -> String {
        match self {
            Self::Pad(pad) => pad.name(),
            Self::Object(painter) => painter.object_name(),
        }
    }

    pub fn update_object(&self, object: &SnapObject, option: &str) -> bool {
        match self {
            Self::Pad(pad) => pad.update_from_object(object),
            Self::Object(painter) => painter.update_object(object, option),
        }
    }

    /// Redraw the painter. Pads redraw detached so sibling pads proceed
    /// concurrently; the returned future then resolves immediately.
    pub fn redraw(&self, kind: DrawKind) -> LocalBoxFuture<'static, ()> {
        match self {
            Self::Pad(pad) => {
                pad.redraw(kind);
                Box::pin(async {})
            }
            Self::Object(painter) => painter.clone().redraw(kind),
        }
    }

    pub fn cleanup(&self) {
        match self {
            Self::Pad(pad) => pad.cleanup(),
            Self::Object(painter) => painter.cleanup(),
        }
    }

    pub fn need_redraw_by_resize(&self) -> bool {
        match self {
            Self::Pad(pad) => pad.need_redraw_by_resize(),
            Self::Object(painter) => painter.need_redraw_by_resize(),
        }
    }

    pub fn claims_main(&self) -> bool {
        match self {
            Self::Pad(_) => false,
            Self::Object(painter) => painter.claims_main(),
        }
    }

    pub fn ptr_eq(&self, other: &PainterHandle) -> bool {
        match (self, other) {
            (Self::Pad(a), Self::Pad(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for PainterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pad(pad) => write!(f, "Pad({})", pad.name()),
            Self::Object(painter) => {
                write!(f, "Object({}::{})", painter.class_name(), painter.object_name())
            }
        }
    }
}

pub struct RegistryEntry {
    pub painter: PainterHandle,
    pub snap_id: Option<SnapId>,
    /// Entry this painter was derived from, set for secondary painters.
    pub derived_from: Option<EntryKey>,
    pub secondary_key: Option<String>,
    /// Painter created for an entry of the pad's primitive list.
    pub primitive: bool,
}

impl RegistryEntry {
    pub fn new(painter: PainterHandle) -> Self {
        Self {
            painter,
            snap_id: None,
            derived_from: None,
            secondary_key: None,
            primitive: false,
        }
    }

    pub fn with_snap_id(mut self, snap_id: Option<SnapId>) -> Self {
        self.snap_id = snap_id;
        self
    }

    pub fn primitive(mut self) -> Self {
        self.primitive = true;
        self
    }

    pub fn is_secondary(&self) -> bool {
        self.derived_from.is_some()
    }
}

/// Which entry to remove.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveTarget {
    Index(usize),
    Key(EntryKey),
}

/// Result of a removal, as seen by a loop walking the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    NotFound,
    /// Index where a forward scan should continue and the number of
    /// entries removed including secondaries.
    Removed { next: usize, count: usize },
    /// The pad's main painter was among the removed entries.
    MainRemoved { count: usize },
}

/// Painters taken out of the registry; cleanup runs once the registry
/// borrow is released.
#[must_use]
pub struct Detached {
    pub removal: Removal,
    painters: SmallVec<[PainterHandle; 4]>,
}

impl Detached {
    fn none(removal: Removal) -> Self {
        Self {
            removal,
            painters: SmallVec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.painters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.painters.len()
    }

    /// Clean every detached painter exactly once.
    pub fn cleanup(self) -> Removal {
        for painter in &self.painters {
            painter.cleanup();
        }
        self.removal
    }
}

#[derive(Default)]
pub struct Registry {
    entries: SlotMap<EntryKey, RegistryEntry>,
    order: Vec<EntryKey>,
    main: Option<EntryKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> &[EntryKey] {
        &self.order
    }

    pub fn get(&self, key: EntryKey) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: EntryKey) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(key)
    }

    pub fn at(&self, index: usize) -> Option<(EntryKey, &RegistryEntry)> {
        let key = *self.order.get(index)?;
        self.entries.get(key).map(|entry| (key, entry))
    }

    pub fn index_of(&self, key: EntryKey) -> Option<usize> {
        self.order.iter().position(|k| *k == key)
    }

    /// Entries in drawing order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryKey, &RegistryEntry)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(*key).map(|entry| (*key, entry)))
    }

    /// Clones of all painter handles in drawing order.
    pub fn painters(&self) -> Vec<PainterHandle> {
        self.iter().map(|(_, entry)| entry.painter.clone()).collect()
    }

    /// Append an entry; it becomes the main painter if it claims that
    /// role and the pad has none yet.
    pub fn add(&mut self, entry: RegistryEntry) -> EntryKey {
        let claims_main = !entry.is_secondary() && entry.painter.claims_main();
        let key = self.entries.insert(entry);
        self.order.push(key);
        if claims_main && self.main.is_none() {
            self.main = Some(key);
        }
        key
    }

    /// Append a painter derived from `parent`. Its snapshot id is the
    /// parent's id suffixed with the secondary key.
    pub fn add_derived(
        &mut self,
        parent: EntryKey,
        secondary_key: &str,
        painter: PainterHandle,
    ) -> EntryKey {
        let snap_id = self
            .entries
            .get(parent)
            .and_then(|entry| entry.snap_id.as_ref())
            .map(|id| id.derived(secondary_key));
        let primitive = self.entries.get(parent).is_some_and(|entry| entry.primitive);
        self.add(RegistryEntry {
            painter,
            snap_id,
            derived_from: Some(parent),
            secondary_key: Some(secondary_key.to_string()),
            primitive,
        })
    }

    pub fn main(&self) -> Option<EntryKey> {
        self.main
    }

    pub fn main_painter(&self) -> Option<&PainterHandle> {
        self.main
            .and_then(|key| self.entries.get(key))
            .map(|entry| &entry.painter)
    }

    /// Point the main painter at an existing entry.
    pub fn set_main(&mut self, key: EntryKey) -> bool {
        if self.entries.contains_key(key) {
            self.main = Some(key);
            true
        } else {
            false
        }
    }

    /// Remove an entry and every entry derived from it, transitively.
    ///
    /// With `clean_only_secondary` the target itself is detached without
    /// being handed back for cleanup.
    pub fn remove(&mut self, target: RemoveTarget, clean_only_secondary: bool) -> Detached {
        let index = match target {
            RemoveTarget::Index(index) => Some(index),
            RemoveTarget::Key(key) => self.index_of(key),
        };
        let Some(index) = index.filter(|index| *index < self.order.len()) else {
            return Detached::none(Removal::NotFound);
        };

        let target_key = self.order.remove(index);
        let mut removed: SmallVec<[EntryKey; 4]> = smallvec![target_key];
        let mut removed_before = 0;

        let mut scan = 0;
        while scan < removed.len() {
            let parent = removed[scan];
            let mut k = self.order.len();
            while k > 0 {
                k -= 1;
                let key = self.order[k];
                let derived = self
                    .entries
                    .get(key)
                    .is_some_and(|entry| entry.derived_from == Some(parent));
                if derived {
                    self.order.remove(k);
                    removed.push(key);
                    if k < index {
                        removed_before += 1;
                    }
                }
            }
            scan += 1;
        }

        let main_removed = self.main.is_some_and(|main| removed.contains(&main));
        if main_removed {
            self.main = None;
        }

        let count = removed.len();
        let mut painters = SmallVec::new();
        for key in removed {
            if let Some(entry) = self.entries.remove(key) {
                if key != target_key || !clean_only_secondary {
                    painters.push(entry.painter);
                }
            }
        }

        let removal = if main_removed {
            Removal::MainRemoved { count }
        } else {
            Removal::Removed {
                next: index - removed_before,
                count,
            }
        };

        Detached { removal, painters }
    }

    /// Remove every entry matching `predicate`. Matches are decided on the
    /// current list before anything is removed.
    pub fn clean_all(&mut self, predicate: impl Fn(&RegistryEntry) -> bool) -> Detached {
        let matches: Vec<bool> = self
            .order
            .iter()
            .map(|key| self.entries.get(*key).is_some_and(&predicate))
            .collect();

        let mut painters = SmallVec::new();
        for index in (0..self.order.len()).rev() {
            if !matches[index] {
                continue;
            }
            let key = self.order.remove(index);
            if self.main == Some(key) {
                self.main = None;
            }
            if let Some(entry) = self.entries.remove(key) {
                painters.push(entry.painter);
            }
        }

        let count = painters.len();
        Detached {
            removal: Removal::Removed { next: 0, count },
            painters,
        }
    }

    /// Remove everything.
    pub fn clear(&mut self) -> Detached {
        self.clean_all(|_| true)
    }

    /// First entry drawing `object` (by identity), or when no object is
    /// given, the first entry matching the given name and/or type.
    pub fn find_by_identity(
        &self,
        object: Option<&Rc<SnapObject>>,
        name: Option<&str>,
        typename: Option<&str>,
    ) -> Option<EntryKey> {
        self.iter()
            .find(|(_, entry)| {
                let painter = &entry.painter;
                if let (Some(wanted), Some(obj)) = (object, painter.object()) {
                    if Rc::ptr_eq(wanted, &obj) {
                        return true;
                    }
                }
                let name = name.filter(|name| !name.is_empty());
                let typename = typename.filter(|typename| !typename.is_empty());
                if name.is_none() && typename.is_none() {
                    return false;
                }
                if name.is_some_and(|name| painter.object_name() != name) {
                    return false;
                }
                if typename.is_some_and(|typename| painter.class_name() != typename) {
                    return false;
                }
                true
            })
            .map(|(key, _)| key)
    }

    pub fn find(&self, predicate: impl Fn(&RegistryEntry) -> bool) -> Option<EntryKey> {
        self.iter()
            .find(|(_, entry)| predicate(entry))
            .map(|(key, _)| key)
    }

    pub fn find_by_snap_id(&self, snap_id: &SnapId) -> Option<EntryKey> {
        self.find(|entry| entry.snap_id.as_ref() == Some(snap_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Journal, RecordingPainter};

    fn object_entry(journal: &Journal, name: &str) -> RegistryEntry {
        RegistryEntry::new(PainterHandle::Object(RecordingPainter::new(journal, "TH1F", name)))
    }

    #[test]
    fn cascade_removes_transitive_secondaries() {
        let journal = Journal::default();
        let mut registry = Registry::new();

        let hist = RecordingPainter::new(&journal, "TH1F", "h").claiming_main();
        let main = registry.add(
            RegistryEntry::new(PainterHandle::Object(hist)).with_snap_id(Some(SnapId::from("7"))),
        );
        let palette = registry.add_derived(
            main,
            "palette",
            PainterHandle::Object(RecordingPainter::new(&journal, "TPaletteAxis", "palette")),
        );
        registry.add_derived(
            palette,
            "axis",
            PainterHandle::Object(RecordingPainter::new(&journal, "TGaxis", "axis")),
        );
        registry.add_derived(
            main,
            "stats",
            PainterHandle::Object(RecordingPainter::new(&journal, "TPaveStats", "stats")),
        );
        registry.add(object_entry(&journal, "other"));

        assert_eq!(registry.get(palette).unwrap().snap_id, Some(SnapId::from("7#palette")));
        assert_eq!(registry.main(), Some(main));

        let removal = registry.remove(RemoveTarget::Key(main), false).cleanup();

        assert_eq!(removal, Removal::MainRemoved { count: 4 });
        assert_eq!(registry.len(), 1);
        assert!(registry.main().is_none());
        assert!(registry.main_painter().is_none());
        assert_eq!(
            journal.count_prefix("cleanup:"),
            4,
            "each removed painter is cleaned exactly once"
        );
        assert_eq!(journal.entries_with_prefix("cleanup:").len(), 4);
    }

    #[test]
    fn removal_reports_adjusted_index() {
        let journal = Journal::default();
        let mut registry = Registry::new();
        let a = registry.add(object_entry(&journal, "a"));
        registry.add(object_entry(&journal, "b"));
        registry.add_derived(
            a,
            "sec",
            PainterHandle::Object(RecordingPainter::new(&journal, "TGaxis", "a_sec")),
        );
        let c = registry.add(object_entry(&journal, "c"));

        // Removing "b" leaves a, a_sec, c
        let removal = registry.remove(RemoveTarget::Index(1), false).cleanup();
        assert_eq!(removal, Removal::Removed { next: 1, count: 1 });
        assert_eq!(registry.index_of(c), Some(2));

        assert_eq!(
            registry.remove(RemoveTarget::Index(10), false).cleanup(),
            Removal::NotFound
        );
    }

    #[test]
    fn clean_only_secondary_keeps_target_alive() {
        let journal = Journal::default();
        let mut registry = Registry::new();
        let a = registry.add(object_entry(&journal, "a"));
        registry.add_derived(
            a,
            "sec",
            PainterHandle::Object(RecordingPainter::new(&journal, "TGaxis", "a_sec")),
        );

        let detached = registry.remove(RemoveTarget::Key(a), true);
        assert_eq!(detached.len(), 1);
        detached.cleanup();

        assert!(registry.is_empty());
        assert_eq!(journal.entries(), vec!["cleanup:a_sec".to_string()]);
    }

    #[test]
    fn clean_all_scans_back_to_front() {
        let journal = Journal::default();
        let mut registry = Registry::new();
        for name in ["a", "b", "c", "d"] {
            registry.add(object_entry(&journal, name));
        }

        let detached = registry.clean_all(|entry| {
            let name = entry.painter.object_name();
            name == "b" || name == "d"
        });
        assert!(!detached.is_empty());
        detached.cleanup();

        let names: Vec<String> = registry.painters().iter().map(|p| p.object_name()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(journal.entries(), vec!["cleanup:d", "cleanup:b"]);
        assert!(registry.clean_all(|_| false).is_empty());
    }

    #[test]
    fn find_by_identity_prefers_object_reference() {
        let journal = Journal::default();
        let mut registry = Registry::new();
        let legend = RecordingPainter::new(&journal, "TLegend", "leg");
        let legend_object = legend.object().unwrap();
        registry.add(object_entry(&journal, "h"));
        let key = registry.add(RegistryEntry::new(PainterHandle::Object(legend)));

        assert_eq!(registry.find_by_identity(Some(&legend_object), None, None), Some(key));
        assert_eq!(registry.find_by_identity(None, None, Some("TLegend")), Some(key));
        assert_eq!(registry.find_by_identity(None, Some("h"), Some("TLegend")), None);
        assert_eq!(registry.find_by_identity(None, None, None), None);
    }
}
