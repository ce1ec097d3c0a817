//! File output for the tandem recorder.
//!
//! A recording on disk is a canonical 44-byte WAV header followed either
//! by raw little-endian PCM or, when a [`ChunkEncryptor`] is configured,
//! by a sequence of length-prefixed sealed boxes. Header
//! sizes are placeholders while the file streams and are fixed up when
//! the writer closes, together with the sample rate when Bluetooth HFP
//! renegotiated it mid-capture.
//!
//! [`ChunkEncryptor`]: tandem_types::ChunkEncryptor

mod crypto;
mod metadata;
mod recover;
pub mod wav;
mod writer;

pub use crypto::{GcmChunkEncryptor, GCM_SEAL_OVERHEAD};
pub use metadata::{read_metadata, write_metadata};
pub use recover::{decrypt_wav_bytes, decrypt_wav_file, ChunkDecryptor};
pub use writer::WavWriter;
