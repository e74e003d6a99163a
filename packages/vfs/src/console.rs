//! Console sink for the reserved descriptors.
//!
//! Writes to descriptors 1 and 2 never touch the byte store; they are
//! decoded to text and forwarded to whatever sink the embedder registered -
//! a terminal widget, a log, or a capture buffer in tests.

use std::sync::{Arc, Mutex};

/// Receives decoded text written to stdout/stderr.
///
/// Object-safe so the VFS can own it as a boxed trait object.
pub trait Console: Send {
    /// Append a chunk of text to the console.
    fn print(&mut self, text: &str);
}

/// Console that discards everything.
#[derive(Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn print(&mut self, _text: &str) {}
}

/// Console that accumulates output into a shared string.
///
/// Cloning yields another handle onto the same buffer, so a test can keep
/// one handle and give the other to the VFS.
#[derive(Debug, Clone, Default)]
pub struct CaptureConsole {
    buffer: Arc<Mutex<String>>,
}

impl CaptureConsole {
    /// Create an empty capture console.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed so far.
    pub fn contents(&self) -> String {
        self.buffer.lock().unwrap().clone()
    }
}

impl Console for CaptureConsole {
    fn print(&mut self, text: &str) {
        self.buffer.lock().unwrap().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_accumulates_in_order() {
        let console = CaptureConsole::new();
        let mut sink: Box<dyn Console> = Box::new(console.clone());

        sink.print("Hello, ");
        sink.print("world!\n");

        assert_eq!(console.contents(), "Hello, world!\n");
    }

    #[test]
    fn null_console_swallows_output() {
        let mut sink = NullConsole;
        sink.print("anything");
    }
}
