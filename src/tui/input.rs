use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line editor shared by the shell and chat panes.
/// `cursor` is a byte offset that always sits on a char boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInput {
    text: String,
    cursor: usize,
}

impl LineInput {
    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    #[cfg(test)]
    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.len();
    }

    /// Hand the line over and reset the editor.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    /// Apply an editing key. Returns false when the key is not an edit
    /// (Enter, Tab, scrolling...) so the caller can handle it.
    pub fn handle(&mut self, key: &KeyEvent) -> bool {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Backspace) => backspace(&mut self.text, &mut self.cursor),
            (KeyModifiers::NONE, KeyCode::Delete) => delete_forward(&mut self.text, &mut self.cursor),
            (KeyModifiers::CONTROL, KeyCode::Backspace) | (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
                delete_word(&mut self.text, &mut self.cursor)
            }
            (KeyModifiers::NONE, KeyCode::Left) => self.cursor = prev_char_boundary(&self.text, self.cursor),
            (KeyModifiers::NONE, KeyCode::Right) => self.cursor = next_char_boundary(&self.text, self.cursor),
            (KeyModifiers::CONTROL, KeyCode::Left) => self.cursor = word_left(&self.text, self.cursor),
            (KeyModifiers::CONTROL, KeyCode::Right) => self.cursor = word_right(&self.text, self.cursor),
            (KeyModifiers::NONE, KeyCode::Home) | (KeyModifiers::CONTROL, KeyCode::Char('a')) => self.cursor = 0,
            (KeyModifiers::NONE, KeyCode::End) | (KeyModifiers::CONTROL, KeyCode::Char('e')) => {
                self.cursor = self.text.len()
            }
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
                self.text.drain(..self.cursor);
                self.cursor = 0;
            }
            (KeyModifiers::CONTROL, KeyCode::Char('k')) => self.text.truncate(self.cursor),
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
                let mut buf = [0u8; 4];
                let s = c.encode_utf8(&mut buf);
                self.text.insert_str(self.cursor, s);
                self.cursor += s.len();
            }
            _ => return false,
        }
        true
    }
}

fn backspace(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let prev = prev_char_boundary(input, *cursor);
    input.drain(prev..*cursor);
    *cursor = prev;
}

fn delete_forward(input: &mut String, cursor: &mut usize) {
    if *cursor >= input.len() {
        return;
    }
    let next = next_char_boundary(input, *cursor);
    input.drain(*cursor..next);
}

fn delete_word(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let start = word_left(input, *cursor);
    input.drain(start..*cursor);
    *cursor = start;
}

fn prev_char_boundary(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let mut p = pos - 1;
    while !s.is_char_boundary(p) {
        p -= 1;
    }
    p
}

fn next_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut p = pos + 1;
    while p <= s.len() && !s.is_char_boundary(p) {
        p += 1;
    }
    p.min(s.len())
}

/// Start of the previous word: skip spaces, then the word.
fn word_left(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    while pos > 0 && !bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

fn word_right(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    let len = s.len();
    while pos < len && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    while pos < len && !bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}
