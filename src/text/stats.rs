use unicode_segmentation::UnicodeSegmentation;

const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub words: usize,
    pub characters: usize,
    pub lines: usize,
    pub reading_minutes: usize,
}

impl DocumentStats {
    pub fn compute(text: &str) -> Self {
        let words = text.unicode_words().count();
        let lines = if text.is_empty() {
            0
        } else {
            super::LINE_TERMINATOR.split(text).count()
        };
        Self {
            words,
            characters: text.graphemes(true).count(),
            lines,
            reading_minutes: words / WORDS_PER_MINUTE,
        }
    }

    pub fn reading_label(&self) -> String {
        match self.reading_minutes {
            0 => "Less than a minute read".to_string(),
            1 => "1 min read".to_string(),
            n => format!("{n} mins read"),
        }
    }
}
