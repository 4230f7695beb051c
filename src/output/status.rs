//! Single-line console status
//!
//! Each update rewrites the current terminal line, padding with spaces so a
//! shorter message fully covers the previous one.

use crate::agents::Observer;
use std::io::{self, Write};

pub struct StatusLine<W: Write> {
    out: W,
    last_len: usize,
}

impl StatusLine<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W) -> Self {
        Self { out, last_len: 0 }
    }

    /// Replaces the current line with `text`
    pub fn update(&mut self, text: &str) -> io::Result<()> {
        let len = text.chars().count();
        let padding = self.last_len.saturating_sub(len);
        write!(self.out, "\r{}{}", text, " ".repeat(padding))?;
        self.out.flush()?;
        self.last_len = len;
        Ok(())
    }

    /// Blanks the current line and returns the cursor to its start
    pub fn clear(&mut self) -> io::Result<()> {
        if self.last_len > 0 {
            write!(self.out, "\r{}\r", " ".repeat(self.last_len))?;
            self.out.flush()?;
            self.last_len = 0;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Observer for StatusLine<W> {
    fn on_node(&mut self, _node: &str, status: &str) {
        // Redraw errors are logged and ignored
        if let Err(e) = self.update(status) {
            tracing::debug!("Status line update failed: {}", e);
        }
    }
}
