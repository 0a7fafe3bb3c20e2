//! Reader for the bracketed-section text format shared by the policy and
//! definitions files.
//!
//! ```text
//! [whitelist]
//! # comment
//! ^aws iam list-
//! [blacklist]
//! delete-
//! ```
//!
//! A section starts at a line that is exactly `[name]` and runs until the
//! next line starting with `[` or end of input. Blank lines and lines
//! starting with `#` are skipped. Only the first matching header is read.

/// Borrowed view over a section-delimited document.
#[derive(Debug, Clone, Copy)]
pub struct Sections<'a> {
    text: &'a str,
}

impl<'a> Sections<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Body lines of `[name]`, in file order. Empty if the section is absent.
    /// Whitespace-only lines count as blank and are skipped.
    pub fn get(&self, name: &str) -> Vec<&'a str> {
        let header = format!("[{name}]");
        let mut lines = self.text.lines();
        if !lines.any(|l| l == header) {
            return Vec::new();
        }
        lines
            .filter(|l| !l.trim().is_empty())
            .take_while(|l| !l.starts_with('['))
            .filter(|l| !l.starts_with('#'))
            .collect()
    }

    /// Like [`get`](Self::get) but owned.
    pub fn get_owned(&self, name: &str) -> Vec<String> {
        self.get(name).into_iter().map(str::to_string).collect()
    }
}
