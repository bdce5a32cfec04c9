//! Console I/O abstraction for the terminal device.
//!
//! The `Console` trait provides character I/O that works identically
//! for both testing (HeadlessConsole) and real terminals.

use std::collections::VecDeque;

/// Console interface for terminal character I/O.
pub trait Console {
    /// Write a character to console output.
    fn write(&mut self, ch: u8);

    /// Get next key without blocking. Returns None if no key is available.
    fn get_key(&mut self) -> Option<u8>;
}

/// Headless console for testing - captures output, provides queued input.
#[derive(Default)]
pub struct HeadlessConsole {
    output: Vec<u8>,
    input: VecDeque<u8>,
}

impl HeadlessConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-queued input.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            output: Vec::new(),
            input: input.iter().copied().collect(),
        }
    }

    pub fn queue_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output as a string (lossy UTF-8 conversion).
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for HeadlessConsole {
    fn write(&mut self, ch: u8) {
        self.output.push(ch);
    }

    fn get_key(&mut self) -> Option<u8> {
        self.input.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_console_output() {
        let mut console = HeadlessConsole::new();
        console.write(b'H');
        console.write(b'i');
        assert_eq!(console.output_string(), "Hi");
    }

    #[test]
    fn test_headless_console_input() {
        let mut console = HeadlessConsole::with_input(b"AB");
        assert_eq!(console.get_key(), Some(b'A'));
        console.queue_input(b"C");
        assert_eq!(console.get_key(), Some(b'B'));
        assert_eq!(console.get_key(), Some(b'C'));
        assert_eq!(console.get_key(), None);
    }
}
