// ============================================================
// Layer 4 — Sentence Preprocessor
// ============================================================
// Normalises premise and hypothesis text before tokenisation.
//
// Crowd-sourced NLI sentences regularly contain:
//   - Non-breaking spaces (U+00A0) and zero-width spaces
//   - Byte order marks left over from file concatenation
//   - Tabs and stray line breaks inside a single sentence
//   - Runs of spaces around punctuation
//
// A premise or hypothesis is a single line of text, so every
// whitespace variant collapses into one space.
//
// Cleaning steps (applied in order):
//   1. Map Unicode whitespace and control characters to spaces
//   2. Collapse whitespace runs into one space
//   3. Trim both ends

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean one sentence. Takes a &str and returns an owned String.
    pub fn clean(&self, text: &str) -> String {
        // ── Step 1: Normalise individual characters ───────────────────────────
        let normalised = text.chars().map(|c| match c {
            '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
            c if c.is_control() => ' ',
            c => c,
        });

        // ── Step 2 + 3: Collapse runs and trim ────────────────────────────────
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;
        for c in normalised {
            if c.is_whitespace() {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        if out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("The cat\r\n sat\u{00A0}down."), "The cat sat down.");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }
}
