use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use strum::{Display, EnumIter, EnumString};

pub mod stats;

pub use stats::DocumentStats;

const LINE_BREAK_MARKER: &str = "<br>";

static LINE_BREAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break regex"));
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|#39|nbsp);").expect("valid entity regex"));
static LINE_TERMINATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\n|\r").expect("valid line terminator regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Text-utility operations offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum TransformOp {
    Uppercase,
    Lowercase,
    TitleCase,
    RemoveLineBreaks,
    RemoveExtraSpaces,
    RemoveDuplicateLines,
}

impl TransformOp {
    pub fn label(&self) -> &'static str {
        match self {
            TransformOp::Uppercase => "UPPERCASE",
            TransformOp::Lowercase => "lowercase",
            TransformOp::TitleCase => "Title Case",
            TransformOp::RemoveLineBreaks => "Remove Line Breaks",
            TransformOp::RemoveExtraSpaces => "Remove Extra Spaces",
            TransformOp::RemoveDuplicateLines => "Remove Duplicate Lines",
        }
    }
}

/// Renders stored plaintext for the editing surface.
///
/// Besides turning each `\n` into a `<br>` marker, this also escapes `&`, `<`
/// and `>`, which a bare newline replacement does not. Without the escaping,
/// text such as `a <b>` would be stripped as markup by `to_plaintext`, and
/// `to_plaintext(to_editable(x)) == x` would not hold.
pub fn to_editable(plaintext: &str) -> String {
    let mut out = String::with_capacity(plaintext.len());
    for ch in plaintext.chars() {
        match ch {
            '\n' => out.push_str(LINE_BREAK_MARKER),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Reduces surface markup to canonical plaintext: `<br>` variants become
/// `\n`, other tags are dropped, and the entities written by `to_editable`
/// plus `&quot;`, `&#39;` and `&nbsp;` are decoded (`&nbsp;` to a space).
pub fn to_plaintext(rich: &str) -> String {
    let with_newlines = LINE_BREAK_TAG.replace_all(rich, "\n");
    let stripped = MARKUP_TAG.replace_all(&with_newlines, "");
    ENTITY
        .replace_all(&stripped, |caps: &Captures<'_>| match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "#39" => "'",
            _ => " ",
        })
        .into_owned()
}

pub fn transform(text: &str, op: TransformOp) -> String {
    match op {
        TransformOp::Uppercase => text.to_uppercase(),
        TransformOp::Lowercase => text.to_lowercase(),
        TransformOp::TitleCase => title_case(text),
        TransformOp::RemoveLineBreaks => LINE_TERMINATOR.replace_all(text, " ").into_owned(),
        TransformOp::RemoveExtraSpaces => {
            WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
        }
        TransformOp::RemoveDuplicateLines => remove_duplicate_lines(text),
    }
}

/// Empty tokens produced by leading or trailing whitespace are kept as empty
/// strings, so the result keeps a single space at either end.
fn title_case(text: &str) -> String {
    WHITESPACE_RUN
        .split(text)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().collect();
    out.push_str(&chars.as_str().to_lowercase());
    out
}

fn remove_duplicate_lines(text: &str) -> String {
    let unique: IndexSet<&str> = LINE_TERMINATOR.split(text).collect();
    unique.into_iter().collect::<Vec<_>>().join("\n")
}
