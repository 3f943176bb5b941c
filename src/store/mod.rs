use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::error::{NotepadError, NotepadResult};

mod note;

pub use note::{Note, NoteId, DEFAULT_TITLE};

/// Plain view of the store used for hydration and persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub notes: Vec<Note>,
    pub active_id: Option<NoteId>,
}

#[derive(Debug, Clone, Default)]
pub struct NoteStore {
    notes: IndexMap<NoteId, Note>,
    active: Option<NoteId>,
}

impl NoteStore {
    /// Builds an initialised store from whatever persistence produced.
    pub fn hydrate(snapshot: Option<StoreSnapshot>) -> Self {
        let mut store = Self::default();
        if let Some(snapshot) = snapshot {
            for note in snapshot.notes {
                if store.notes.contains_key(&note.id) {
                    tracing::warn!(note_id = %note.id, "dropping duplicate note id from snapshot");
                    continue;
                }
                store.notes.insert(note.id.clone(), note);
            }
            store.active = snapshot.active_id;
        }
        store.initialize();
        store
    }

    /// Re-establishes both collection invariants. Returns true if anything
    /// had to change.
    pub fn initialize(&mut self) -> bool {
        if self.notes.is_empty() {
            let id = self.push_default_note();
            tracing::info!(note_id = %id, "synthesised default note for empty collection");
            return true;
        }
        let resolves = self
            .active
            .as_ref()
            .map(|id| self.notes.contains_key(id))
            .unwrap_or(false);
        if resolves {
            return false;
        }
        self.active = self.notes.keys().next().cloned();
        true
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.notes.contains_key(id)
    }

    pub fn active_id(&self) -> Option<&NoteId> {
        self.active.as_ref()
    }

    /// The active note, or the first note when the active id is stale.
    pub fn active_note(&self) -> Option<&Note> {
        self.active
            .as_ref()
            .and_then(|id| self.notes.get(id))
            .or_else(|| self.notes.values().next())
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve(&self, needle: &str) -> Option<&NoteId> {
        let exact = NoteId::from(needle);
        if let Some((id, _)) = self.notes.get_key_value(&exact) {
            return Some(id);
        }
        if needle.is_empty() {
            return None;
        }
        let mut matches = self
            .notes
            .keys()
            .filter(|id| id.as_str().starts_with(needle));
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    pub fn create(&mut self, title_hint: Option<&str>) -> NoteId {
        let title = match title_hint.map(str::trim) {
            Some(hint) if !hint.is_empty() => hint.to_string(),
            _ => format!("{DEFAULT_TITLE} {}", self.notes.len() + 1),
        };
        let note = Note::blank(title, OffsetDateTime::now_utc());
        let id = note.id.clone();
        self.notes.insert(id.clone(), note);
        self.active = Some(id.clone());
        id
    }

    pub fn select(&mut self, id: &NoteId) -> NotepadResult<()> {
        if !self.notes.contains_key(id) {
            return Err(NotepadError::NotFound(id.clone()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    /// Blank titles are ignored and keep the previous title.
    pub fn rename(&mut self, id: &NoteId, title: &str) -> bool {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return false;
        }
        let Some(note) = self.notes.get_mut(id) else {
            return false;
        };
        note.title = trimmed.to_string();
        note.updated_at = OffsetDateTime::now_utc();
        true
    }

    pub fn update_content(&mut self, id: &NoteId, content: &str) -> bool {
        let Some(note) = self.notes.get_mut(id) else {
            return false;
        };
        note.content.clear();
        note.content.push_str(content);
        note.updated_at = OffsetDateTime::now_utc();
        true
    }

    pub fn delete(&mut self, id: &NoteId) -> bool {
        if self.notes.shift_remove(id).is_none() {
            return false;
        }
        if self.notes.is_empty() {
            let replacement = self.push_default_note();
            tracing::info!(note_id = %replacement, "last note deleted, synthesised default note");
        } else if self.active.as_ref() == Some(id) {
            self.active = self.notes.keys().next().cloned();
        }
        true
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            notes: self.notes.values().cloned().collect(),
            active_id: self.active.clone(),
        }
    }

    fn push_default_note(&mut self) -> NoteId {
        let note = Note::blank(DEFAULT_TITLE.to_string(), OffsetDateTime::now_utc());
        let id = note.id.clone();
        self.notes.insert(id.clone(), note);
        self.active = Some(id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn note(id: &str, title: &str) -> Note {
        let now = OffsetDateTime::now_utc();
        Note {
            id: NoteId::from(id),
            title: title.to_string(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn store_with(notes: &[(&str, &str)], active: &str) -> NoteStore {
        NoteStore::hydrate(Some(StoreSnapshot {
            notes: notes.iter().map(|(id, title)| note(id, title)).collect(),
            active_id: Some(NoteId::from(active)),
        }))
    }

    #[test]
    fn hydrate_without_snapshot_synthesises_default_note() {
        let store = NoteStore::hydrate(None);
        assert_eq!(store.len(), 1);
        let active = store.active_note().expect("active note");
        assert_eq!(active.title, DEFAULT_TITLE);
        assert!(active.content.is_empty());
        assert_eq!(store.active_id(), Some(&active.id));
    }

    #[test]
    fn hydrate_repairs_stale_active_id() {
        let store = store_with(&[("1", "A"), ("2", "B")], "missing");
        assert_eq!(store.active_id(), Some(&NoteId::from("1")));
    }

    #[test]
    fn active_note_falls_back_without_touching_stale_id() {
        let mut store = store_with(&[("1", "A"), ("2", "B")], "2");
        store.active = Some(NoteId::from("ghost"));

        assert_eq!(store.active_note().map(|n| n.title.as_str()), Some("A"));
        assert_eq!(store.active_id(), Some(&NoteId::from("ghost")));
    }

    #[test]
    fn hydrate_keeps_first_of_duplicate_ids() {
        let store = store_with(&[("1", "A"), ("1", "shadow"), ("2", "B")], "2");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&NoteId::from("1")).map(|n| n.title.as_str()), Some("A"));
    }

    #[test]
    fn create_with_blank_hint_numbers_the_title() {
        let mut store = store_with(&[("1", "A"), ("2", "B")], "1");
        let id = store.create(Some("   "));
        let created = store.get(&id).expect("created note");
        assert_eq!(created.title, "Untitled Note 3");
        assert!(created.content.is_empty());
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(store.active_id(), Some(&id));
        assert_eq!(store.notes().last().map(|n| &n.id), Some(&id));
    }

    #[test]
    fn create_trims_hint() {
        let mut store = NoteStore::hydrate(None);
        let id = store.create(Some("  Shopping  "));
        assert_eq!(store.get(&id).map(|n| n.title.as_str()), Some("Shopping"));
    }

    #[test]
    fn select_reports_missing_ids() {
        let mut store = store_with(&[("1", "A"), ("2", "B")], "1");
        store.select(&NoteId::from("2")).expect("select existing");
        assert_eq!(store.active_id(), Some(&NoteId::from("2")));

        let err = store.select(&NoteId::from("9")).unwrap_err();
        assert_matches!(err, NotepadError::NotFound(id) if id.as_str() == "9");
        assert_eq!(store.active_id(), Some(&NoteId::from("2")));
    }

    #[test]
    fn rename_ignores_blank_titles() {
        let mut store = store_with(&[("1", "A")], "1");
        let id = NoteId::from("1");
        let before = store.get(&id).cloned().expect("note");
        assert!(!store.rename(&id, "   "));
        assert_eq!(store.get(&id), Some(&before));

        assert!(store.rename(&id, "  Renamed "));
        let after = store.get(&id).expect("note");
        assert_eq!(after.title, "Renamed");
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn update_content_is_verbatim_and_skips_missing() {
        let mut store = store_with(&[("1", "A")], "1");
        let id = NoteId::from("1");
        assert!(store.update_content(&id, "  keep\n\nspacing "));
        assert_eq!(store.get(&id).map(|n| n.content.as_str()), Some("  keep\n\nspacing "));
        assert!(!store.update_content(&NoteId::from("nope"), "x"));
    }

    #[test]
    fn deleting_active_note_selects_first_remaining() {
        let mut store = store_with(&[("1", "A"), ("2", "B")], "1");
        assert!(store.delete(&NoteId::from("1")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), Some(&NoteId::from("2")));
    }

    #[test]
    fn deleting_inactive_note_keeps_selection() {
        let mut store = store_with(&[("1", "A"), ("2", "B"), ("3", "C")], "3");
        assert!(store.delete(&NoteId::from("1")));
        assert_eq!(store.active_id(), Some(&NoteId::from("3")));
        let order: Vec<_> = store.notes().map(|n| n.id.as_str()).collect();
        assert_eq!(order, ["2", "3"]);
    }

    #[test]
    fn deleting_sole_note_leaves_fresh_active_default() {
        let mut store = store_with(&[("1", "A")], "1");
        assert!(store.delete(&NoteId::from("1")));
        assert_eq!(store.len(), 1);
        let active = store.active_note().expect("active");
        assert_ne!(active.id.as_str(), "1");
        assert_eq!(active.title, DEFAULT_TITLE);
        assert_eq!(store.active_id(), Some(&active.id));
    }

    #[test]
    fn delete_missing_id_is_a_no_op() {
        let mut store = store_with(&[("1", "A")], "1");
        assert!(!store.delete(&NoteId::from("2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolve_accepts_unique_prefixes() {
        let store = store_with(&[("abc1", "A"), ("abd2", "B")], "abc1");
        assert_eq!(store.resolve("abd").map(NoteId::as_str), Some("abd2"));
        assert_eq!(store.resolve("ab"), None);
        assert_eq!(store.resolve("abc1").map(NoteId::as_str), Some("abc1"));
        assert_eq!(store.resolve(""), None);
    }

    #[test]
    fn snapshot_preserves_order_and_active() {
        let store = store_with(&[("1", "A"), ("2", "B")], "2");
        let snapshot = store.snapshot();
        let ids: Vec<_> = snapshot.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(snapshot.active_id, Some(NoteId::from("2")));
    }
}
