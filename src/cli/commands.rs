use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::app::{MutationOutcome, Notepad};
use crate::config::AppConfig;
use crate::export::ExportFormat;
use crate::session::Clock;
use crate::storage::KeyValueStore;
use crate::store::{Note, NoteId};
use crate::text::{self, TransformOp};

const SHORT_ID_LEN: usize = 8;

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (numbered "Untitled Note" if omitted)
    #[arg()]
    pub title: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Note id or a unique prefix of it
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct RenameArgs {
    /// Note id or a unique prefix of it
    pub id: String,
    /// New title (whitespace trimmed)
    pub title: String,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note id or prefix; defaults to the active note
    pub id: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Provide the body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TransformArgs {
    /// uppercase, lowercase, title-case, remove-line-breaks,
    /// remove-extra-spaces or remove-duplicate-lines
    pub op: TransformOp,
    /// Replace the note's content instead of printing a preview
    #[arg(long)]
    pub apply: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// txt, pdf or docx (defaults to the configured format)
    #[arg(long)]
    pub format: Option<ExportFormat>,
    /// Target directory (defaults to the configured export directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn list_notes<K: KeyValueStore, C: Clock>(notepad: &Notepad<K, C>) -> String {
    let active = notepad.active_note().map(|n| n.id.clone());
    let mut out = String::new();
    for note in notepad.notes() {
        let marker = if Some(&note.id) == active.as_ref() {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(
            &mut out,
            "{marker} {}  {}  (updated {})",
            short_id(&note.id),
            note.title,
            format_timestamp(note.updated_at)
        );
    }
    out
}

pub fn new_note<K: KeyValueStore, C: Clock>(notepad: &mut Notepad<K, C>, args: NewArgs) -> String {
    let outcome = notepad.create(args.title.as_deref());
    let mut out = match notepad.active_note() {
        Some(note) => format!("Created note {} ({})\n", short_id(&note.id), note.title),
        None => String::from("Created note\n"),
    };
    report(&mut out, &outcome);
    out
}

pub fn select_note<K: KeyValueStore, C: Clock>(
    notepad: &mut Notepad<K, C>,
    args: IdArgs,
) -> Result<String> {
    let id = resolve_id(notepad, &args.id)?;
    let outcome = notepad.select(&id)?;
    let mut out = format!("Active note is now {}\n", describe(notepad, &id));
    report(&mut out, &outcome);
    Ok(out)
}

pub fn rename_note<K: KeyValueStore, C: Clock>(
    notepad: &mut Notepad<K, C>,
    args: RenameArgs,
) -> Result<String> {
    let id = resolve_id(notepad, &args.id)?;
    let outcome = notepad.rename(&id, &args.title);
    let mut out = if outcome.changed {
        format!("Renamed note to {}\n", describe(notepad, &id))
    } else {
        format!("Title unchanged for {}\n", describe(notepad, &id))
    };
    report(&mut out, &outcome);
    Ok(out)
}

pub fn delete_note<K: KeyValueStore, C: Clock>(
    notepad: &mut Notepad<K, C>,
    args: IdArgs,
) -> Result<String> {
    let id = resolve_id(notepad, &args.id)?;
    let label = describe(notepad, &id);
    let outcome = notepad.delete(&id);
    let mut out = format!("Deleted note {label}\n");
    if let Some(active) = notepad.active_note() {
        let _ = writeln!(&mut out, "Active note is now {}", describe(notepad, &active.id));
    }
    report(&mut out, &outcome);
    Ok(out)
}

pub fn show_note<K: KeyValueStore, C: Clock>(
    notepad: &Notepad<K, C>,
    args: ShowArgs,
) -> Result<String> {
    let note = match args.id {
        Some(needle) => {
            let id = resolve_id(notepad, &needle)?;
            notepad.store().get(&id)
        }
        None => notepad.active_note(),
    };
    let Some(note) = note else {
        bail!("no note to show");
    };
    let mut out = note.content.clone();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Routes the body through the edit session like typed input, then flushes
/// instead of waiting out the debounce window.
pub fn write_note<K: KeyValueStore, C: Clock>(
    notepad: &mut Notepad<K, C>,
    args: WriteArgs,
) -> Result<String> {
    let body = match args.body {
        Some(body) => body,
        None => match read_stdin()? {
            Some(body) => body,
            None => bail!("nothing to write: pass --body or pipe text on stdin"),
        },
    };
    notepad.input(&text::to_editable(&body));
    let outcome = notepad.flush();
    let Some(note) = notepad.active_note() else {
        bail!("no active note");
    };
    let mut out = if outcome.committed.is_some() {
        format!(
            "Saved {} characters to {}\n",
            body.chars().count(),
            describe(notepad, &note.id)
        )
    } else {
        format!("No changes to {}\n", describe(notepad, &note.id))
    };
    report(&mut out, &outcome);
    Ok(out)
}

pub fn transform_note<K: KeyValueStore, C: Clock>(
    notepad: &mut Notepad<K, C>,
    args: TransformArgs,
) -> String {
    if !args.apply {
        let mut preview = notepad.preview_transform(args.op);
        if !preview.is_empty() && !preview.ends_with('\n') {
            preview.push('\n');
        }
        return preview;
    }
    let outcome = notepad.apply_transform(args.op);
    let mut out = if outcome.changed {
        format!("Applied {}\n", args.op.label())
    } else {
        format!("{} left the note unchanged\n", args.op.label())
    };
    report(&mut out, &outcome);
    out
}

pub fn note_stats<K: KeyValueStore, C: Clock>(notepad: &Notepad<K, C>) -> String {
    let stats = notepad.stats();
    format!(
        "Words:      {}\nCharacters: {}\nLines:      {}\n{}\n",
        stats.words,
        stats.characters,
        stats.lines,
        stats.reading_label()
    )
}

pub fn export_note<K: KeyValueStore, C: Clock>(
    notepad: &Notepad<K, C>,
    config: &AppConfig,
    args: ExportArgs,
) -> Result<String> {
    let format = args.format.unwrap_or(config.export.default_format);
    let dir = args
        .out
        .or_else(|| config.export.directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let path = notepad
        .export_active(format, &dir)
        .with_context(|| format!("exporting active note as {format}"))?;
    Ok(format!("Exported to {}\n", path.display()))
}

fn resolve_id<K: KeyValueStore, C: Clock>(notepad: &Notepad<K, C>, needle: &str) -> Result<NoteId> {
    let needle = needle.trim();
    if needle.is_empty() {
        bail!("note id cannot be empty");
    }
    match notepad.resolve(needle) {
        Some(id) => Ok(id),
        None => bail!("no single note matches '{needle}'"),
    }
}

fn describe<K: KeyValueStore, C: Clock>(notepad: &Notepad<K, C>, id: &NoteId) -> String {
    match notepad.store().get(id) {
        Some(Note { title, .. }) => format!("{} ({title})", short_id(id)),
        None => short_id(id).to_string(),
    }
}

fn report(out: &mut String, outcome: &MutationOutcome) {
    if let Some(err) = &outcome.warning {
        tracing::warn!(%err, "change kept in memory only");
        let _ = writeln!(out, "warning: {err}");
    }
}

fn short_id(id: &NoteId) -> &str {
    let raw = id.as_str();
    raw.char_indices()
        .nth(SHORT_ID_LEN)
        .map(|(idx, _)| &raw[..idx])
        .unwrap_or(raw)
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn setup(kv: &MemoryKv) -> Notepad<&MemoryKv> {
        Notepad::open(kv, &AppConfig::default())
    }

    fn active_id(notepad: &Notepad<&MemoryKv>) -> NoteId {
        notepad.active_note().map(|n| n.id.clone()).expect("active note")
    }

    #[test]
    fn cli_list_marks_active_note() {
        let kv = MemoryKv::new();
        let mut notepad = setup(&kv);
        new_note(
            &mut notepad,
            NewArgs {
                title: Some("Groceries".into()),
            },
        );

        let output = list_notes(&notepad);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  "));
        assert!(lines[0].contains("Untitled Note"));
        assert!(lines[1].starts_with("* "));
        assert!(lines[1].contains("Groceries"));
    }

    #[test]
    fn cli_ids_resolve_by_prefix() -> TestResult {
        let kv = MemoryKv::new();
        let mut notepad = setup(&kv);
        let first = active_id(&notepad);
        new_note(&mut notepad, NewArgs { title: None });

        let prefix: String = first.as_str().chars().take(SHORT_ID_LEN).collect();
        select_note(&mut notepad, IdArgs { id: prefix.clone() })?;
        assert_eq!(active_id(&notepad), first);

        let output = rename_note(
            &mut notepad,
            RenameArgs {
                id: prefix,
                title: "  Plans  ".into(),
            },
        )?;
        assert!(output.contains("(Plans)"));
        assert!(select_note(&mut notepad, IdArgs { id: "zz-none".into() }).is_err());
        Ok(())
    }

    #[test]
    fn cli_write_then_transform() -> TestResult {
        let kv = MemoryKv::new();
        let mut notepad = setup(&kv);
        write_note(
            &mut notepad,
            WriteArgs {
                body: Some("a <b> & c\na <b> & c".into()),
            },
        )?;
        let shown = show_note(&notepad, ShowArgs { id: None })?;
        assert_eq!(shown, "a <b> & c\na <b> & c\n");

        let preview = transform_note(
            &mut notepad,
            TransformArgs {
                op: TransformOp::RemoveDuplicateLines,
                apply: false,
            },
        );
        assert_eq!(preview, "a <b> & c\n");
        assert_eq!(
            notepad.active_note().map(|n| n.content.as_str()),
            Some("a <b> & c\na <b> & c")
        );

        transform_note(
            &mut notepad,
            TransformArgs {
                op: TransformOp::RemoveDuplicateLines,
                apply: true,
            },
        );
        assert_eq!(
            notepad.active_note().map(|n| n.content.as_str()),
            Some("a <b> & c")
        );
        Ok(())
    }

    #[test]
    fn cli_delete_reports_new_active_note() -> TestResult {
        let kv = MemoryKv::new();
        let mut notepad = setup(&kv);
        let only = active_id(&notepad);

        let output = delete_note(
            &mut notepad,
            IdArgs {
                id: only.as_str().to_string(),
            },
        )?;
        assert!(output.starts_with("Deleted note"));
        assert!(output.contains("Active note is now"));
        assert_eq!(notepad.store().len(), 1);
        assert_ne!(active_id(&notepad), only);
        Ok(())
    }

    #[test]
    fn cli_stats_output() -> TestResult {
        let kv = MemoryKv::new();
        let mut notepad = setup(&kv);
        write_note(
            &mut notepad,
            WriteArgs {
                body: Some("one two\nthree".into()),
            },
        )?;
        let output = note_stats(&notepad);
        insta::assert_snapshot!(output.trim_end(), @r"
        Words:      3
        Characters: 13
        Lines:      2
        Less than a minute read
        ");
        Ok(())
    }

    #[test]
    fn cli_export_writes_into_requested_dir() -> TestResult {
        let temp = TempDir::new()?;
        let kv = MemoryKv::new();
        let mut notepad = setup(&kv);
        write_note(
            &mut notepad,
            WriteArgs {
                body: Some("exported".into()),
            },
        )?;

        let args = ExportArgs {
            format: None,
            out: Some(temp.path().to_path_buf()),
        };
        let output = export_note(&notepad, &AppConfig::default(), args)?;
        let path = temp.path().join("Untitled Note.txt");
        assert!(output.contains("Untitled Note.txt"));
        assert_eq!(std::fs::read_to_string(path)?, "exported");

        let args = ExportArgs {
            format: Some(ExportFormat::Pdf),
            out: Some(temp.path().to_path_buf()),
        };
        assert!(export_note(&notepad, &AppConfig::default(), args).is_err());
        Ok(())
    }
}
