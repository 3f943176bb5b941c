use crate::error::NotepadResult;
use crate::session::Clock;
use crate::storage::KeyValueStore;
use crate::store::NoteId;
use crate::text::TransformOp;

use super::{MutationOutcome, Notepad};

/// One entry per UI control: new-note dialog, tab click, rename dialog,
/// delete confirmation, text-utilities "Apply", manual save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create { title: Option<String> },
    Select(NoteId),
    Rename { id: NoteId, title: String },
    Delete(NoteId),
    UpdateContent { id: NoteId, content: String },
    ApplyTransform(TransformOp),
    Save,
}

impl<K: KeyValueStore, C: Clock> Notepad<K, C> {
    pub fn dispatch(&mut self, action: Action) -> NotepadResult<MutationOutcome> {
        tracing::trace!(?action, "dispatching");
        let outcome = match action {
            Action::Create { title } => self.create(title.as_deref()),
            Action::Select(id) => self.select(&id)?,
            Action::Rename { id, title } => self.rename(&id, &title),
            Action::Delete(id) => self.delete(&id),
            Action::UpdateContent { id, content } => self.update_content(&id, &content),
            Action::ApplyTransform(op) => self.apply_transform(op),
            Action::Save => self.flush(),
        };
        Ok(outcome)
    }
}
