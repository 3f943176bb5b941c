use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{NotepadError, NotepadResult};
use crate::store::Note;

const TMP_SUFFIX: &str = "tmp";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// Writes the note's plaintext into `dir` as `<title>.<ext>`. The note is
/// only read.
pub fn export_note(note: &Note, format: ExportFormat, dir: &Path) -> NotepadResult<PathBuf> {
    if format != ExportFormat::Txt {
        return Err(NotepadError::UnsupportedFormat(format));
    }
    fs::create_dir_all(dir)?;
    let final_path = dir.join(format!("{}.{}", file_stem(&note.title), format.extension()));
    let tmp_path = final_path.with_extension(format!("{}.{TMP_SUFFIX}", format.extension()));
    fs::write(&tmp_path, note.content.as_bytes())?;
    fs::rename(&tmp_path, &final_path)?;
    tracing::info!(note_id = %note.id, path = %final_path.display(), "exported note");
    Ok(final_path)
}

/// Title with path separators and control characters replaced.
pub fn file_stem(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        crate::store::DEFAULT_TITLE.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoteStore;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn sample_note() -> Note {
        let mut store = NoteStore::hydrate(None);
        let id = store.create(Some("Trip: plan/v2"));
        store.update_content(&id, "pack\nleave");
        store.get(&id).cloned().expect("note")
    }

    #[test]
    fn writes_plain_text_file_named_after_title() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let note = sample_note();
        let path = export_note(&note, ExportFormat::Txt, temp.path())?;

        assert_eq!(path, temp.path().join("Trip_ plan_v2.txt"));
        assert_eq!(fs::read_to_string(&path)?, "pack\nleave");
        assert_eq!(fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn rich_formats_are_stubbed() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let note = sample_note();
        for format in [ExportFormat::Pdf, ExportFormat::Docx] {
            let err = export_note(&note, format, temp.path()).unwrap_err();
            assert_matches!(err, NotepadError::UnsupportedFormat(f) if f == format);
        }
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn degenerate_titles_fall_back() {
        assert_eq!(file_stem(" .. "), "Untitled Note");
        assert_eq!(file_stem("a\tb"), "a_b");
    }

    #[test]
    fn formats_parse_lowercase() {
        assert_eq!("docx".parse::<ExportFormat>().ok(), Some(ExportFormat::Docx));
        assert_eq!(ExportFormat::Txt.to_string(), "txt");
        assert_eq!(ExportFormat::Txt.mime_type(), "text/plain");
    }
}
