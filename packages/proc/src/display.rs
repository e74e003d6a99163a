//! Display sink for the `showGraphic` host function.

/// Receives raw RGBA pixel data a guest asked to display.
///
/// The core performs no rendering: when a guest calls the display-show
/// primitive, the runtime bounds-checks the pixel region in linear memory
/// and forwards a copy here. The embedder decides what a "display" is.
pub trait DisplaySink: Send {
    /// Present a `width` x `height` frame of RGBA bytes (4 per pixel).
    fn show(&mut self, width: u32, height: u32, pixels: &[u8]);
}
