//! Pre-capture microphone sample-rate probe.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use tandem_types::{AudioBufferCallback, CaptureProvider, PcmBuffer};

use crate::PROBE_SETTLE;

/// Discovers the sample rate a microphone actually settles on.
///
/// Asking the device for its rate before opening it is not enough: on
/// Bluetooth headsets, opening the mic can force the link into HFP and
/// drop the rate (48 kHz → ~16 kHz) several buffers after delivery
/// begins. The probe opens the mic, watches delivered buffers for the
/// settle window, and reports the minimum rate seen.
///
/// The probe leaves the provider running; the session stops it before
/// starting the real capture.
pub struct MicRateProbe {
    settle: Duration,
}

impl MicRateProbe {
    pub fn new() -> Self {
        Self {
            settle: PROBE_SETTLE,
        }
    }

    /// Override the settle window. Mostly useful in tests.
    pub fn with_settle(settle: Duration) -> Self {
        Self { settle }
    }

    /// Run the probe, returning the minimum rate any buffer reported,
    /// or `configured_rate` when the mic stayed silent or failed to open.
    #[instrument(name = "mic_rate_probe", skip(self, mic))]
    pub fn run<P: CaptureProvider>(&self, mic: &mut P, configured_rate: f64) -> f64 {
        let observed: Arc<Mutex<Option<f64>>> = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&observed);
        let callback: AudioBufferCallback = Arc::new(move |buf: PcmBuffer<'_>| {
            let mut slot = sink.lock();
            match *slot {
                Some(seen) if seen <= buf.sample_rate => {}
                _ => *slot = Some(buf.sample_rate),
            }
        });

        if let Err(e) = mic.start(callback) {
            warn!(error = %e, "probe could not open the mic, assuming configured rate");
            return configured_rate;
        }

        thread::sleep(self.settle);

        let detected = (*observed.lock()).unwrap_or(configured_rate);
        if detected < configured_rate {
            info!(detected, configured_rate, "mic settled below the configured rate");
        }
        detected
    }
}

impl Default for MicRateProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::JoinHandle;
    use std::time::Instant;

    use tandem_types::{AudioSource, CaptureError, CaptureResult};

    /// Mic that renegotiates downward after the first few buffers.
    struct RenegotiatingMic {
        rates: Vec<f64>,
        fail_start: bool,
        running: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl RenegotiatingMic {
        fn new(rates: Vec<f64>) -> Self {
            Self {
                rates,
                fail_start: false,
                running: Arc::new(AtomicBool::new(false)),
                handle: None,
            }
        }
    }

    impl CaptureProvider for RenegotiatingMic {
        fn is_available(&self) -> bool {
            true
        }

        fn devices(&self) -> CaptureResult<Vec<AudioSource>> {
            Ok(Vec::new())
        }

        fn start(&mut self, callback: AudioBufferCallback) -> CaptureResult<()> {
            if self.fail_start {
                return Err(CaptureError::DeviceNotAvailable);
            }
            self.running.store(true, Ordering::SeqCst);
            let running = Arc::clone(&self.running);
            let rates = self.rates.clone();
            self.handle = Some(thread::spawn(move || {
                let samples = vec![0.0f32; 64];
                for rate in rates {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    callback(PcmBuffer {
                        samples: &samples,
                        sample_rate: rate,
                        channels: 1,
                        timestamp: Instant::now(),
                    });
                    thread::sleep(Duration::from_millis(10));
                }
            }));
            Ok(())
        }

        fn stop(&mut self) -> CaptureResult<()> {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
            Ok(())
        }
    }

    #[test]
    fn reports_minimum_rate_seen() {
        let mut mic = RenegotiatingMic::new(vec![48000.0, 48000.0, 16000.0, 16000.0]);
        let probe = MicRateProbe::with_settle(Duration::from_millis(100));
        assert_eq!(probe.run(&mut mic, 48000.0), 16000.0);
        mic.stop().unwrap();
    }

    #[test]
    fn silent_mic_falls_back_to_configured_rate() {
        let mut mic = RenegotiatingMic::new(Vec::new());
        let probe = MicRateProbe::with_settle(Duration::from_millis(50));
        assert_eq!(probe.run(&mut mic, 44100.0), 44100.0);
        mic.stop().unwrap();
    }

    #[test]
    fn failed_start_falls_back_to_configured_rate() {
        let mut mic = RenegotiatingMic::new(vec![8000.0]);
        mic.fail_start = true;
        let probe = MicRateProbe::with_settle(Duration::from_millis(50));
        assert_eq!(probe.run(&mut mic, 48000.0), 48000.0);
    }
}
