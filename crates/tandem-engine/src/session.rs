//! The capture session: state machine, buffer routing, and finalization.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use tandem_audio::{downmix_to_mono, peak_level, rms_level, RingBuffer, RingFeed, StereoMixer};
use tandem_storage::{write_metadata, WavWriter};
use tandem_types::{
    AudioBufferCallback, AudioLevels, AudioSource, CaptureConfiguration, CaptureDelegate,
    CaptureError, CaptureProvider, CaptureResult, CaptureSessionDiagnostics, CaptureState,
    PcmBuffer, RecordingMetadata, RecordingResult,
};

use crate::probe::MicRateProbe;
use crate::{DURATION_TICK, PROCESS_INTERVAL, RING_SECONDS};

/// Mutable session fields, all behind one short-held mutex.
struct SessionShared {
    state: CaptureState,
    config: Option<CaptureConfiguration>,
    levels: AudioLevels,
    diagnostics: CaptureSessionDiagnostics,
    capture_start: Option<Instant>,
    paused_duration: Duration,
    last_pause: Option<Instant>,
    detected_mic_rate: Option<f64>,
    file_path: Option<PathBuf>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            config: None,
            levels: AudioLevels::default(),
            diagnostics: CaptureSessionDiagnostics::default(),
            capture_start: None,
            paused_duration: Duration::ZERO,
            last_pause: None,
            detected_mic_rate: None,
            file_path: None,
        }
    }

    /// Captured duration: wall time minus completed pauses minus the
    /// pause currently in progress, if any.
    fn elapsed_secs(&self) -> f64 {
        let Some(start) = self.capture_start else {
            return 0.0;
        };
        let mut active = start.elapsed().saturating_sub(self.paused_duration);
        if let Some(pause_start) = self.last_pause {
            active = active.saturating_sub(pause_start.elapsed());
        }
        active.as_secs_f64()
    }
}

/// Per-capture resources, built in `start` and dropped when capture ends.
struct Pipeline {
    mixer: StereoMixer,
    mic_ring: Arc<Mutex<RingBuffer>>,
    system_ring: Arc<Mutex<RingBuffer>>,
    mic_tx: Sender<Vec<f32>>,
    system_tx: Sender<Vec<f32>>,
    mic_feed: RingFeed,
    system_feed: RingFeed,

    /// Frames drained per processing tick.
    chunk_frames: usize,

    /// Whether system capture actually started; when it did, system
    /// frames drive the output clock and the mic is padded to match.
    system_clocked: bool,
}

struct SessionInner<M, S> {
    mic: Mutex<M>,
    system: Mutex<S>,
    shared: Mutex<SessionShared>,
    delegate: RwLock<Option<Arc<dyn CaptureDelegate>>>,
    pipeline: Mutex<Option<Pipeline>>,
    writer: Mutex<Option<WavWriter>>,
    processing_running: Arc<AtomicBool>,
    processing_handle: Mutex<Option<JoinHandle<()>>>,
    timer_running: Arc<AtomicBool>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
}

/// A dual-source capture session.
///
/// Owns a microphone provider and a system-audio provider and mixes both
/// into one stereo recording. Public operations are gated by the
/// [`CaptureState`] machine; a session records once and then parks in a
/// terminal state; construct a new session for the next recording.
///
/// Workers and provider callbacks hold weak handles to the session
/// internals, so dropping the session tears everything down without
/// reference cycles.
pub struct CaptureSession<M: CaptureProvider, S: CaptureProvider> {
    inner: Arc<SessionInner<M, S>>,
}

impl<M, S> CaptureSession<M, S>
where
    M: CaptureProvider + 'static,
    S: CaptureProvider + 'static,
{
    /// Create an idle session over the given providers.
    pub fn new(mic: M, system: S) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                mic: Mutex::new(mic),
                system: Mutex::new(system),
                shared: Mutex::new(SessionShared::new()),
                delegate: RwLock::new(None),
                pipeline: Mutex::new(None),
                writer: Mutex::new(None),
                processing_running: Arc::new(AtomicBool::new(false)),
                processing_handle: Mutex::new(None),
                timer_running: Arc::new(AtomicBool::new(false)),
                timer_handle: Mutex::new(None),
            }),
        }
    }

    /// Register the observer for state, level, and error events.
    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.inner.delegate.write() = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.inner.shared.lock().state.clone()
    }

    pub fn current_levels(&self) -> AudioLevels {
        self.inner.shared.lock().levels
    }

    pub fn diagnostics(&self) -> CaptureSessionDiagnostics {
        self.inner.shared.lock().diagnostics.clone()
    }

    /// The rate the probe saw the mic settle on, once `start` ran it.
    pub fn detected_mic_rate(&self) -> Option<f64> {
        self.inner.shared.lock().detected_mic_rate
    }

    /// The file the active (or finished) capture writes to.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.inner.shared.lock().file_path.clone()
    }

    /// Enumerate capturable sources: every mic the provider can open,
    /// plus a synthetic `"system-audio"` entry when system capture is
    /// available.
    pub fn list_sources(&self) -> CaptureResult<Vec<AudioSource>> {
        let mut sources = self.inner.mic.lock().devices()?;
        if self.inner.system.lock().is_available() {
            sources.push(AudioSource::system_audio());
        }
        Ok(sources)
    }

    /// Apply a configuration. Transitions: `Idle → Configuring → Ready`.
    #[instrument(name = "session_configure", skip(self, config))]
    pub fn configure(&self, config: CaptureConfiguration) -> CaptureResult<()> {
        {
            let shared = self.inner.shared.lock();
            if !shared.state.is_idle() {
                return Err(CaptureError::ConfigurationFailed(
                    "cannot configure when not idle".into(),
                ));
            }
        }

        self.inner.set_state(CaptureState::Configuring);

        if let Err(reason) = config.validate() {
            let err = CaptureError::ConfigurationFailed(reason);
            error!(error = %err, "configuration rejected");
            self.inner.set_state(CaptureState::Failed(err.clone()));
            return Err(err);
        }

        info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            bit_depth = config.bit_depth,
            encrypted = config.encryptor.is_some(),
            "session configured"
        );
        self.inner.shared.lock().config = Some(config);
        self.inner.set_state(CaptureState::Ready);
        Ok(())
    }

    /// Begin capturing. Transitions: `Ready → Capturing`.
    #[instrument(name = "session_start", skip(self))]
    pub fn start(&self) -> CaptureResult<()> {
        let config = {
            let shared = self.inner.shared.lock();
            if !shared.state.is_ready() {
                return Err(CaptureError::ConfigurationFailed(
                    "cannot start when not ready".into(),
                ));
            }
            match shared.config.clone() {
                Some(config) => config,
                None => {
                    return Err(CaptureError::ConfigurationFailed(
                        "cannot start when not configured".into(),
                    ))
                }
            }
        };

        // Phase A: find the rate the mic really runs at before committing
        // to an output format. Never upsample past the configured rate.
        let output_rate = if config.enable_mic_capture {
            let probed = MicRateProbe::new().run(&mut *self.inner.mic.lock(), config.sample_rate);
            self.inner.shared.lock().detected_mic_rate = Some(probed);
            probed.min(config.sample_rate)
        } else {
            config.sample_rate
        };

        // Phase B: mixer, rings, ring feeds, output file.
        let mixer = StereoMixer::new(output_rate);
        let mic_capacity = ((output_rate * RING_SECONDS) as usize).max(1);
        let mic_ring = Arc::new(Mutex::new(RingBuffer::new(mic_capacity)));
        let system_ring = Arc::new(Mutex::new(RingBuffer::new(mic_capacity * 2)));

        let extension = if config.encryptor.is_some() { "enc.wav" } else { "wav" };
        let path = config
            .output_directory
            .join(format!("recording_{}.{extension}", uuid::Uuid::new_v4()));

        let writer_config = CaptureConfiguration {
            sample_rate: output_rate,
            ..config.clone()
        };
        let mut writer = WavWriter::new(path.clone(), config.encryptor.clone());
        if let Err(e) = writer.open(&writer_config) {
            return Err(self.inner.fail(e));
        }
        *self.inner.writer.lock() = Some(writer);

        let mic_feed = RingFeed::spawn("mic", Arc::clone(&mic_ring));
        let system_feed = RingFeed::spawn("system", Arc::clone(&system_ring));
        *self.inner.pipeline.lock() = Some(Pipeline {
            mixer,
            mic_ring,
            system_ring,
            mic_tx: mic_feed.sender(),
            system_tx: system_feed.sender(),
            mic_feed,
            system_feed,
            chunk_frames: (config.sample_rate * PROCESS_INTERVAL.as_secs_f64()) as usize,
            system_clocked: false,
        });

        // Phase C: swap the probe capture for the real one, then bring up
        // system audio. Losing the system tap is survivable; losing the
        // mic is not.
        if config.enable_mic_capture {
            let _ = self.inner.mic.lock().stop();

            let weak = Arc::downgrade(&self.inner);
            let callback: AudioBufferCallback = Arc::new(move |buf: PcmBuffer<'_>| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_mic_buffer(buf);
                }
            });
            if let Err(e) = self.inner.mic.lock().start(callback) {
                error!(error = %e, "microphone capture failed to start");
                self.inner.abort_startup();
                return Err(self.inner.fail(CaptureError::DeviceNotAvailable));
            }
        }

        if config.enable_system_capture {
            let weak = Arc::downgrade(&self.inner);
            let callback: AudioBufferCallback = Arc::new(move |buf: PcmBuffer<'_>| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_system_buffer(buf);
                }
            });

            let started = {
                let mut system = self.inner.system.lock();
                if system.is_available() {
                    match system.start(callback) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(error = %e, "system audio failed to start");
                            false
                        }
                    }
                } else {
                    false
                }
            };

            if started {
                if let Some(pipeline) = self.inner.pipeline.lock().as_mut() {
                    pipeline.system_clocked = true;
                }
            } else {
                self.inner.notify_error(&CaptureError::ConfigurationFailed(
                    "system audio unavailable, continuing with microphone only".into(),
                ));
            }
        }

        // Phase D: reset the clock and meters, then run.
        {
            let mut shared = self.inner.shared.lock();
            shared.capture_start = Some(Instant::now());
            shared.paused_duration = Duration::ZERO;
            shared.last_pause = None;
            shared.levels = AudioLevels::default();
            shared.diagnostics = CaptureSessionDiagnostics::default();
            shared.file_path = Some(path.clone());
        }
        self.inner
            .set_state(CaptureState::Capturing { duration_secs: 0.0 });

        self.inner.spawn_workers();
        info!(output_rate, path = %path.display(), "capture started");
        Ok(())
    }

    /// Suspend the duration clock. Transitions: `Capturing → Paused`.
    ///
    /// Providers stay open; buffered audio keeps accumulating in the
    /// rings but nothing is mixed or written until `resume`.
    #[instrument(name = "session_pause", skip(self))]
    pub fn pause(&self) -> CaptureResult<()> {
        let state = {
            let mut shared = self.inner.shared.lock();
            if !shared.state.is_capturing() {
                return Err(CaptureError::ConfigurationFailed(
                    "cannot pause when not capturing".into(),
                ));
            }
            shared.last_pause = Some(Instant::now());
            shared.state = CaptureState::Paused {
                duration_secs: shared.elapsed_secs(),
            };
            shared.state.clone()
        };
        self.inner.notify_state(&state);
        Ok(())
    }

    /// Resume a paused capture. Transitions: `Paused → Capturing`.
    #[instrument(name = "session_resume", skip(self))]
    pub fn resume(&self) -> CaptureResult<()> {
        let state = {
            let mut shared = self.inner.shared.lock();
            if !shared.state.is_paused() {
                return Err(CaptureError::ConfigurationFailed(
                    "cannot resume when not paused".into(),
                ));
            }
            if let Some(pause_start) = shared.last_pause.take() {
                shared.paused_duration += pause_start.elapsed();
            }
            shared.state = CaptureState::Capturing {
                duration_secs: shared.elapsed_secs(),
            };
            shared.state.clone()
        };
        self.inner.notify_state(&state);
        Ok(())
    }

    /// Stop capturing and finalize the recording.
    /// Transitions: `Capturing | Paused → Stopping → Completed / Failed`.
    pub fn stop(&self) -> CaptureResult<RecordingResult> {
        self.inner.stop()
    }
}

impl<M, S> SessionInner<M, S>
where
    M: CaptureProvider + 'static,
    S: CaptureProvider + 'static,
{
    #[instrument(name = "session_stop", skip(self))]
    fn stop(self: &Arc<Self>) -> CaptureResult<RecordingResult> {
        {
            let mut shared = self.shared.lock();
            if !shared.state.is_capturing() && !shared.state.is_paused() {
                return Err(CaptureError::ConfigurationFailed(
                    "cannot stop when not capturing or paused".into(),
                ));
            }
            shared.state = CaptureState::Stopping;
        }
        self.notify_state(&CaptureState::Stopping);

        let config = { self.shared.lock().config.clone() };
        let Some(config) = config else {
            return Err(self.fail(CaptureError::ConfigurationFailed(
                "cannot stop when not configured".into(),
            )));
        };

        // Providers first, so everything they delivered is in flight
        // before the feeds drain and the final flush runs.
        if config.enable_mic_capture {
            if let Err(e) = self.mic.lock().stop() {
                warn!(error = %e, "mic provider stop failed");
            }
        }
        if config.enable_system_capture {
            if let Err(e) = self.system.lock().stop() {
                warn!(error = %e, "system provider stop failed");
            }
        }

        if let Some(pipeline) = self.pipeline.lock().as_mut() {
            pipeline.mic_feed.stop();
            pipeline.system_feed.stop();
        }

        self.processing_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.processing_handle.lock().take() {
            let _ = handle.join();
        }

        self.timer_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.timer_handle.lock().take() {
            if handle.thread().id() == thread::current().id() {
                // Max-duration stop runs on the timer thread itself; it
                // exits its loop right after this call returns.
                drop(handle);
            } else {
                let _ = handle.join();
            }
        }

        // One final pass over whatever the rings still hold.
        self.process_chunk();

        let (actual_rate, duration_secs) = {
            let shared = self.shared.lock();
            (
                shared.detected_mic_rate.map(|r| r.min(config.sample_rate)),
                shared.elapsed_secs(),
            )
        };

        // Rings are per-capture; drop them with the rest of the pipeline.
        *self.pipeline.lock() = None;

        let closed = {
            let mut writer_slot = self.writer.lock();
            match writer_slot.take() {
                Some(mut writer) => writer
                    .close(actual_rate, config.channels, config.bit_depth)
                    .map(|checksum| (checksum, writer.path().to_owned())),
                None => Err(CaptureError::StorageError("file writer not available".into())),
            }
        };
        let (checksum, file_path) = match closed {
            Ok(finalized) => finalized,
            Err(e) => return Err(self.fail(e)),
        };

        let metadata = RecordingMetadata::dual_track(
            duration_secs,
            &file_path.to_string_lossy(),
            &checksum,
            config.encryptor.as_ref().map(|e| e.algorithm().to_owned()),
            config.encryptor.as_ref().and_then(|e| e.key_id()),
        );
        if let Err(e) = write_metadata(&metadata, &file_path) {
            warn!(error = %e, "metadata sidecar not written");
            self.notify_error(&e);
        }

        let result = RecordingResult {
            file_path,
            duration_secs,
            metadata,
            checksum,
        };

        info!(duration_secs, path = %result.file_path.display(), "capture completed");
        self.set_state(CaptureState::Completed(Box::new(result.clone())));
        if let Some(delegate) = self.delegate() {
            delegate.on_finished(&result);
        }
        Ok(result)
    }

    /// Mic buffers: downmix to mono, resample to the output rate, meter,
    /// then hand off to the mic ring feed. Runs on the provider's audio
    /// thread, so nothing here may block beyond a short mutex.
    fn on_mic_buffer(&self, buf: PcmBuffer<'_>) {
        let Some((mixer, tx)) = self
            .pipeline
            .lock()
            .as_ref()
            .map(|p| (p.mixer.clone(), p.mic_tx.clone()))
        else {
            return;
        };

        let mono = if buf.channels > 1 {
            downmix_to_mono(buf.samples, buf.channels as usize)
        } else {
            buf.samples.to_vec()
        };
        let resampled = mixer.resample_mono(&mono, buf.sample_rate);

        let levels = {
            let mut shared = self.shared.lock();
            shared.levels.mic_level = rms_level(&resampled);
            shared.levels.peak_mic_level = shared.levels.peak_mic_level.max(peak_level(&resampled));
            shared.diagnostics.mic_callback_count += 1;
            shared.diagnostics.mic_samples_total += resampled.len() as u64;
            shared.diagnostics.mic_format = buf.format();
            shared.levels
        };
        self.notify_levels(levels);

        let _ = tx.send(resampled);
    }

    /// System buffers: resample, meter, hand off to the system ring feed.
    fn on_system_buffer(&self, buf: PcmBuffer<'_>) {
        let Some((mixer, tx)) = self
            .pipeline
            .lock()
            .as_ref()
            .map(|p| (p.mixer.clone(), p.system_tx.clone()))
        else {
            return;
        };

        // The tap advertises whatever rate it negotiated at open time,
        // but buffers arrive at the output device's current clock, which
        // is the mixer target. Trusting the advertised rate chipmunks
        // every HFP capture, so the resampler is fed the target rate.
        let stereo = if buf.channels >= 2 {
            mixer.resample_stereo(buf.samples, mixer.target_sample_rate)
        } else {
            let mono = mixer.resample_mono(buf.samples, mixer.target_sample_rate);
            mixer.interleave(&mono, &mono)
        };

        let left: Vec<f32> = stereo.iter().step_by(2).copied().collect();
        let levels = {
            let mut shared = self.shared.lock();
            shared.levels.system_level = rms_level(&left);
            shared.levels.peak_system_level =
                shared.levels.peak_system_level.max(peak_level(&left));
            shared.diagnostics.system_callback_count += 1;
            shared.diagnostics.system_samples_total += stereo.len() as u64;
            shared.diagnostics.system_format = buf.format();
            shared.levels
        };
        self.notify_levels(levels);

        let _ = tx.send(stereo);
    }

    /// One mix cycle: drain equal-frame chunks from both rings, mix to
    /// stereo, convert to PCM, write.
    ///
    /// When system capture runs, system frames drive the clock and a
    /// short mic read is zero-padded by the mixer rather than stalling
    /// the pipeline. Mic-only captures clock on the mic ring instead.
    fn process_chunk(&self) {
        let Some((mixer, mic_ring, system_ring, chunk_frames, system_clocked)) =
            self.pipeline.lock().as_ref().map(|p| {
                (
                    p.mixer.clone(),
                    Arc::clone(&p.mic_ring),
                    Arc::clone(&p.system_ring),
                    p.chunk_frames,
                    p.system_clocked,
                )
            })
        else {
            return;
        };

        let (mic_samples, system_samples) = if system_clocked {
            let frames_available = system_ring.lock().count() / 2;
            let frames = frames_available.min(chunk_frames);
            if frames == 0 {
                return;
            }
            let system_samples = system_ring.lock().read(frames * 2);
            let mic_samples = mic_ring.lock().read(frames);
            (mic_samples, system_samples)
        } else {
            let mic_samples = mic_ring.lock().read(chunk_frames);
            if mic_samples.is_empty() {
                return;
            }
            (mic_samples, Vec::new())
        };

        let stereo = mixer.mix_mono_mic_with_stereo_system(&mic_samples, &system_samples);
        let pcm = mixer.to_int16_pcm(&stereo);

        {
            let mut shared = self.shared.lock();
            shared.diagnostics.mix_cycles += 1;
            shared.diagnostics.bytes_written += pcm.len() as u64;
        }

        let write_result = match self.writer.lock().as_mut() {
            Some(writer) => writer.write(&pcm),
            None => return,
        };
        if let Err(e) = write_result {
            // A bad chunk (e.g. one failed seal) is not fatal; the
            // delegate hears about it and capture keeps going.
            warn!(error = %e, "audio chunk not written");
            self.notify_error(&e);
        }
    }

    fn spawn_workers(self: &Arc<Self>) {
        self.processing_running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.processing_running);
        let weak = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name("capture-processing".into())
            .spawn(move || processing_loop(weak, running))
            .expect("failed to spawn processing thread");
        *self.processing_handle.lock() = Some(handle);

        self.timer_running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.timer_running);
        let weak = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name("duration-timer".into())
            .spawn(move || timer_loop(weak, running))
            .expect("failed to spawn timer thread");
        *self.timer_handle.lock() = Some(handle);
    }

    /// Advance the duration shown in `Capturing`, returning the elapsed
    /// time and whether the configured maximum was hit.
    fn tick_duration(&self) -> Option<(CaptureState, bool)> {
        let mut shared = self.shared.lock();
        if !shared.state.is_capturing() {
            return None;
        }
        let elapsed = shared.elapsed_secs();
        shared.state = CaptureState::Capturing {
            duration_secs: elapsed,
        };
        let expired = shared
            .config
            .as_ref()
            .and_then(|c| c.max_duration_secs)
            .is_some_and(|max| elapsed >= max);
        Some((shared.state.clone(), expired))
    }

    /// Tear down the partially built pipeline when `start` fails.
    fn abort_startup(&self) {
        if let Some(pipeline) = self.pipeline.lock().as_mut() {
            pipeline.mic_feed.stop();
            pipeline.system_feed.stop();
        }
        *self.pipeline.lock() = None;
        *self.writer.lock() = None;
    }

    /// Latch a terminal failure and hand the error back for propagation.
    fn fail(&self, err: CaptureError) -> CaptureError {
        error!(error = %err, "session failed");
        self.set_state(CaptureState::Failed(err.clone()));
        err
    }

    fn set_state(&self, state: CaptureState) {
        self.shared.lock().state = state.clone();
        self.notify_state(&state);
    }

    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.read().clone()
    }

    fn notify_state(&self, state: &CaptureState) {
        debug!(state = state.name(), "state changed");
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn notify_levels(&self, levels: AudioLevels) {
        if let Some(delegate) = self.delegate() {
            delegate.on_levels_updated(levels);
        }
    }

    fn notify_error(&self, err: &CaptureError) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(err);
        }
    }
}

impl<M: CaptureProvider, S: CaptureProvider> Drop for CaptureSession<M, S> {
    fn drop(&mut self) {
        // Stop workers and providers if the session is dropped
        // mid-capture; the file is simply left unfinalized.
        self.inner.processing_running.store(false, Ordering::SeqCst);
        self.inner.timer_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.inner.processing_handle.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.inner.timer_handle.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        if self.inner.pipeline.lock().is_some() {
            let _ = self.inner.mic.lock().stop();
            let _ = self.inner.system.lock().stop();
        }
        if let Some(pipeline) = self.inner.pipeline.lock().as_mut() {
            pipeline.mic_feed.stop();
            pipeline.system_feed.stop();
        }
    }
}

/// 100 ms mix-and-write loop. Checks its stop flag before sleeping and
/// after waking, and exits when the session is gone.
fn processing_loop<M, S>(weak: Weak<SessionInner<M, S>>, running: Arc<AtomicBool>)
where
    M: CaptureProvider + 'static,
    S: CaptureProvider + 'static,
{
    debug!("processing loop started");
    while running.load(Ordering::SeqCst) {
        thread::sleep(PROCESS_INTERVAL);
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let Some(inner) = weak.upgrade() else {
            break;
        };
        if inner.shared.lock().state.is_capturing() {
            inner.process_chunk();
        }
    }
    debug!("processing loop exiting");
}

/// 250 ms duration timer. Publishes `Capturing(elapsed)` and triggers an
/// internal stop when the configured maximum duration is reached.
fn timer_loop<M, S>(weak: Weak<SessionInner<M, S>>, running: Arc<AtomicBool>)
where
    M: CaptureProvider + 'static,
    S: CaptureProvider + 'static,
{
    debug!("duration timer started");
    while running.load(Ordering::SeqCst) {
        thread::sleep(DURATION_TICK);
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let Some(inner) = weak.upgrade() else {
            break;
        };
        if let Some((state, expired)) = inner.tick_duration() {
            inner.notify_state(&state);
            if expired {
                info!("maximum duration reached, stopping");
                if let Err(e) = inner.stop() {
                    warn!(error = %e, "auto-stop failed");
                }
                break;
            }
        }
    }
    debug!("duration timer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::Path;

    /// Provider that opens fine but never delivers a buffer.
    struct SilentProvider {
        available: bool,
    }

    impl SilentProvider {
        fn new(available: bool) -> Self {
            Self { available }
        }
    }

    impl CaptureProvider for SilentProvider {
        fn is_available(&self) -> bool {
            self.available
        }

        fn devices(&self) -> CaptureResult<Vec<AudioSource>> {
            Ok(vec![AudioSource {
                id: "silent-mic".into(),
                name: "Silent Mic".into(),
                source_type: tandem_types::AudioTrackType::Mic,
                is_default: true,
                transport_type: Some(tandem_types::AudioTransportType::BuiltIn),
            }])
        }

        fn start(&mut self, _callback: AudioBufferCallback) -> CaptureResult<()> {
            if !self.available {
                return Err(CaptureError::DeviceNotAvailable);
            }
            Ok(())
        }

        fn stop(&mut self) -> CaptureResult<()> {
            Ok(())
        }
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tandem_session_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn quiet_session() -> CaptureSession<SilentProvider, SilentProvider> {
        CaptureSession::new(SilentProvider::new(true), SilentProvider::new(false))
    }

    fn config_in(dir: &Path) -> CaptureConfiguration {
        CaptureConfiguration {
            output_directory: dir.to_path_buf(),
            enable_system_capture: false,
            ..Default::default()
        }
    }

    #[test]
    fn configure_allowed_only_from_idle() {
        let dir = scratch_dir();
        let session = quiet_session();
        session.configure(config_in(&dir)).unwrap();
        assert!(session.state().is_ready());

        let err = session.configure(config_in(&dir)).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_configuration_latches_failure() {
        let session = quiet_session();
        let err = session
            .configure(CaptureConfiguration {
                bit_depth: 12,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert!(session.state().is_terminal());

        // No silent recovery: every further operation is refused.
        assert!(session.start().is_err());
        assert!(session.configure(CaptureConfiguration::default()).is_err());
        assert!(session.stop().is_err());
    }

    #[test]
    fn transport_controls_require_an_active_capture() {
        let session = quiet_session();
        assert!(session.pause().is_err());
        assert!(session.resume().is_err());
        assert!(session.stop().is_err());
        assert!(session.start().is_err(), "start before configure accepted");
    }

    #[test]
    fn list_sources_appends_system_entry_only_when_available() {
        let without_system = quiet_session();
        let sources = without_system.list_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "silent-mic");

        let with_system =
            CaptureSession::new(SilentProvider::new(true), SilentProvider::new(true));
        let sources = with_system.list_sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].id, "system-audio");
    }

    #[test]
    fn silent_capture_finalizes_header_only_file() {
        let dir = scratch_dir();
        let session = quiet_session();
        session.configure(config_in(&dir)).unwrap();
        session.start().unwrap();
        assert!(session.state().is_capturing());

        let result = session.stop().unwrap();
        assert!(result.file_path.exists());
        assert_eq!(session.output_path(), Some(result.file_path.clone()));

        let contents = fs::read(&result.file_path).unwrap();
        assert_eq!(contents.len(), 44, "no buffers delivered, header only");
        assert!(result.file_path.extension().unwrap() == "wav");
        assert!(!result.metadata.is_encrypted);

        // Terminal: a finished session refuses another round.
        assert!(session.state().is_terminal());
        assert!(session.stop().is_err());
        assert!(session.start().is_err());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mic_start_failure_is_fatal() {
        let dir = scratch_dir();
        let session =
            CaptureSession::new(SilentProvider::new(false), SilentProvider::new(false));
        session.configure(config_in(&dir)).unwrap();

        let err = session.start().unwrap_err();
        assert_eq!(err, CaptureError::DeviceNotAvailable);
        assert!(matches!(session.state(), CaptureState::Failed(_)));

        fs::remove_dir_all(&dir).ok();
    }
}
