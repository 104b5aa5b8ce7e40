//! Source positions for JSON configuration files.
//!
//! `serde_json` does not keep spans, so keys are located by scanning the
//! raw text for each quoted key of a path in turn.

use crate::issue::{Pos, Range};

pub(crate) struct SourceIndex<'a> {
    filename: &'a str,
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceIndex<'a> {
    pub fn new(filename: &'a str, text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            filename,
            text,
            line_starts,
        }
    }

    /// Range of the last key in `path`, searching each key after the previous one.
    ///
    /// Falls back to the start of the file if any key cannot be found.
    pub fn locate(&self, path: &[&str]) -> Range {
        let mut cursor = 0;
        let mut found = None;
        for key in path {
            match self.find_key(key, cursor) {
                Some((start, end)) => {
                    cursor = end;
                    found = Some((start, end));
                }
                None => return Range::file_start(self.filename),
            }
        }
        match found {
            Some((start, end)) => Range::new(self.filename, self.pos(start), self.pos(end)),
            None => Range::file_start(self.filename),
        }
    }

    fn find_key(&self, key: &str, from: usize) -> Option<(usize, usize)> {
        let quoted = serde_json::to_string(key).ok()?;
        let mut offset = from;
        while let Some(idx) = self.text[offset..].find(&quoted) {
            let start = offset + idx;
            let end = start + quoted.len();
            let rest = self.text[end..].trim_start();
            if rest.starts_with(':') {
                return Some((start, end));
            }
            offset = end;
        }
        None
    }

    fn pos(&self, offset: usize) -> Pos {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = self.text[self.line_starts[line]..offset].chars().count() + 1;
        Pos {
            line: line + 1,
            column,
        }
    }
}
