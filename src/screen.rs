// Output port of the LCD controller. The front-end owns the actual surface
// (a window, a terminal, a test buffer) and hands it to the core by mutable
// reference; the core only knows how to draw into it. `present` is called
// once per frame, at the start of the vertical blank.
pub trait Screen {
    fn draw_pixel(&mut self, x: usize, y: usize, color: u32);

    fn fill(&mut self, color: u32);

    fn present(&mut self);
}

// Discards every pixel. Useful for headless drivers and tests that only care
// about timing.
pub struct Headless;

impl Screen for Headless {
    fn draw_pixel(&mut self, _: usize, _: usize, _: u32) {}

    fn fill(&mut self, _: u32) {}

    fn present(&mut self) {}
}
