//! Rolling Sample Window
//!
//! Fixed-capacity ring buffer that keeps the most recent samples and
//! drops the oldest on overflow. Used to damp per-frame detector noise.

mod buffer;

pub use buffer::RingBuffer;
