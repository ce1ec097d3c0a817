//! Sample buffering and mixing for the tandem recorder.
//!
//! This crate holds the pure audio path between capture callbacks and the
//! file writer: a drop-oldest [`RingBuffer`] per source, the
//! [`StereoMixer`] that resamples and folds both sources into interleaved
//! stereo, and the [`RingFeed`] worker that moves buffers from a capture
//! callback into a ring without letting the callback touch anything
//! slower than a channel send.

mod feed;
mod mixer;
mod ring;

pub use feed::RingFeed;
pub use mixer::{downmix_to_mono, peak_level, rms_level, StereoMixer};
pub use ring::RingBuffer;
