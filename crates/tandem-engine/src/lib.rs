//! Capture orchestration for the tandem recorder.
//!
//! This crate drives a whole recording: it probes the microphone's real
//! sample rate, wires two [`CaptureProvider`]s through ring buffers into
//! the [`StereoMixer`](tandem_audio::StereoMixer), runs the periodic mix
//! loop and duration timer, and finalizes the (optionally encrypted) WAV
//! file when capture stops.
//!
//! ```text
//! [mic provider] ──channel──▶ [mic ring] ──┐
//!                                          ├─▶ mix ─▶ PCM ─▶ [WavWriter]
//! [system provider] ─channel─▶ [sys ring] ─┘
//! ```
//!
//! [`CaptureProvider`]: tandem_types::CaptureProvider

mod probe;
mod session;

pub use probe::MicRateProbe;
pub use session::CaptureSession;

use std::time::Duration;

/// Cadence of the mix-and-write processing loop.
pub const PROCESS_INTERVAL: Duration = Duration::from_millis(100);

/// Cadence of the duration/max-duration timer.
pub const DURATION_TICK: Duration = Duration::from_millis(250);

/// How long the mic rate probe lets HFP/SCO negotiation settle.
pub const PROBE_SETTLE: Duration = Duration::from_millis(500);

/// Ring capacity in seconds of audio at the output rate.
pub const RING_SECONDS: f64 = 5.0;
