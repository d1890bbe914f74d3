//! Pipeline Orchestrator
//!
//! `AudioLeds` owns the two pipeline threads and everything they share.
//!
//! # Architecture
//!
//! ```text
//! capture callback ──push──▶ PcmHandoff
//!                               │ take_frame (bounded wait = watchdog)
//!                               ▼
//! specan-processing:  active display ─▶ parse_pcm ─▶ fill_in_leds ─▶ LedStrip
//!                               ▲ active index (atomic)
//! specan-monitor:     ControlSurface + RemoteControl events
//!                     ─▶ gradient / display / reverse / delete ─▶ SettingsStore
//!                     ─▶ supplied levels ─▶ SettingsStore ─▶ disk (lock released)
//! ```
//!
//! The processing thread owns the displays and the strip outright. The
//! monitor only reaches a display through its [`ColorMapping`], so a
//! gradient change never races a frame in progress. A display switch takes
//! effect on the next frame the processing thread starts.
//!
//! The processing thread never takes the settings lock: the persisted
//! gain/brightness it falls back to are mirrored in atomics, and the levels a
//! knob or the remote supplied are published the same way for the monitor to
//! save.
//!
//! A wait for audio that outlasts the watchdog is reported once as
//! [`Fault::AudioStalled`] and ends the processing thread; deciding what to
//! do about it is left to whoever holds the fault receiver.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use specan_dsp::Rgb;
use specan_platform::{
    ControlEvent, ControlSurface, LedStrip, LevelKnobs, PlatformError, RemoteControl,
};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::display::{AudioDisplay, ColorMapping};
use crate::error::{EngineError, EngineResult};
use crate::handoff::{PcmHandoff, Take};
use crate::message::Fault;
use crate::settings::{PendingWrite, SettingsStore};

/// Brightness changes smaller than this are not written back
const LEVEL_SAVE_STEP: f32 = 0.01;

/// Hardware and persistence the pipeline is wired to
pub struct PipelineIo {
    pub strip: Box<dyn LedStrip>,
    pub knobs: Box<dyn LevelKnobs>,
    pub controls: Box<dyn ControlSurface>,
    pub remote: Option<Arc<RemoteControl>>,
    pub settings: SettingsStore,
}

/// State shared by the monitor thread and the `AudioLeds` handle
struct Controller {
    active_display: AtomicUsize,
    mappings: Vec<ColorMapping>,
    settings: Mutex<SettingsStore>,
    /// Mirror of the persisted levels (brightness as f32 bits)
    saved_gain: AtomicI32,
    saved_brightness: AtomicU32,
    /// Levels last supplied by a knob or the remote
    live_gain: AtomicI32,
    live_brightness: AtomicU32,
}

impl Controller {
    fn new(mappings: Vec<ColorMapping>, settings: SettingsStore, display_index: usize) -> Self {
        let gain = settings.gain();
        let brightness = settings.brightness().to_bits();
        Self {
            active_display: AtomicUsize::new(display_index),
            mappings,
            settings: Mutex::new(settings),
            saved_gain: AtomicI32::new(gain),
            saved_brightness: AtomicU32::new(brightness),
            live_gain: AtomicI32::new(gain),
            live_brightness: AtomicU32::new(brightness),
        }
    }

    fn active_display(&self) -> usize {
        self.active_display.load(Ordering::Acquire)
    }

    /// Rebuild display `index`'s color mapping from the settings
    fn apply_gradient(&self, index: usize) {
        let (gradient, reverse) = {
            let settings = self.settings.lock();
            (settings.current_gradient(), settings.reverse_gradient())
        };
        if let Some(mapping) = self.mappings.get(index) {
            if let Err(e) = mapping.set_gradient(&gradient, reverse) {
                warn!("Failed to apply gradient to display {}: {}", index, e);
            }
        }
    }

    fn switch_display(&self, delta: isize) -> usize {
        let count = self.mappings.len() as isize;
        let step = |index: usize| (index as isize + delta).rem_euclid(count) as usize;

        // Held across the update so the stored index follows the same order
        let next = {
            let mut settings = self.settings.lock();
            let previous = self
                .active_display
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |index| Some(step(index)))
                .unwrap_or_else(|index| index);
            let next = step(previous);
            settings.set_display_index(next);
            next
        };
        self.apply_gradient(next);
        next
    }

    fn handle_event(&self, event: ControlEvent) {
        debug!("Control event: {:?}", event);
        match event {
            ControlEvent::GradientNext | ControlEvent::GradientPrev => {
                let delta = if event == ControlEvent::GradientNext { 1 } else { -1 };
                let index = {
                    let mut settings = self.settings.lock();
                    settings.step_gradient(delta);
                    settings.gradient_index()
                };
                info!("Gradient {} selected", index);
                self.apply_gradient(self.active_display());
            }
            ControlEvent::DisplayNext | ControlEvent::DisplayPrev => {
                let delta = if event == ControlEvent::DisplayNext { 1 } else { -1 };
                let index = self.switch_display(delta);
                info!("Display {} selected", index);
            }
            ControlEvent::ToggleReverse => {
                let reverse = self.settings.lock().toggle_reverse();
                info!("Gradient reverse {}", if reverse { "on" } else { "off" });
                self.apply_gradient(self.active_display());
            }
            ControlEvent::DeleteGradient => {
                let deleted = self.settings.lock().delete_gradient();
                if deleted {
                    info!("Gradient deleted");
                    self.apply_gradient(self.active_display());
                } else {
                    debug!("Refusing to delete the last gradient");
                }
            }
        }
    }

    /// Persisted levels, used when neither the remote nor a knob supplies one
    fn fallback_levels(&self) -> (i32, f32) {
        (
            self.saved_gain.load(Ordering::Relaxed),
            f32::from_bits(self.saved_brightness.load(Ordering::Relaxed)),
        )
    }

    fn publish_levels(&self, gain: Option<i32>, brightness: Option<f32>) {
        if let Some(gain) = gain {
            self.live_gain.store(gain, Ordering::Relaxed);
        }
        if let Some(brightness) = brightness {
            self.live_brightness
                .store(brightness.to_bits(), Ordering::Relaxed);
        }
    }

    /// Copy supplied levels into the settings once they move far enough
    fn record_levels(&self) {
        let gain = self.live_gain.load(Ordering::Relaxed);
        let brightness = f32::from_bits(self.live_brightness.load(Ordering::Relaxed));
        let (saved_gain, saved_brightness) = self.fallback_levels();
        if gain == saved_gain && (brightness - saved_brightness).abs() < LEVEL_SAVE_STEP {
            return;
        }

        let (gain, brightness) = {
            let mut settings = self.settings.lock();
            settings.set_levels(gain, brightness);
            (settings.gain(), settings.brightness())
        };
        debug!("Levels saved: gain {}, brightness {:.2}", gain, brightness);
        self.saved_gain.store(gain, Ordering::Relaxed);
        self.saved_brightness
            .store(brightness.to_bits(), Ordering::Relaxed);
    }
}

struct ProcessingContext {
    displays: Vec<Box<dyn AudioDisplay>>,
    strip: Box<dyn LedStrip>,
    knobs: Box<dyn LevelKnobs>,
    remote: Option<Arc<RemoteControl>>,
    handoff: Arc<PcmHandoff>,
    controller: Arc<Controller>,
    running: Arc<AtomicBool>,
    faults: Sender<Fault>,
    watchdog_timeout: Duration,
}

struct MonitorContext {
    controls: Box<dyn ControlSurface>,
    remote: Option<Arc<RemoteControl>>,
    controller: Arc<Controller>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

/// Running audio-to-LED pipeline
pub struct AudioLeds {
    controller: Arc<Controller>,
    handoff: Arc<PcmHandoff>,
    running: Arc<AtomicBool>,
    processing_thread: Option<JoinHandle<()>>,
    monitor_thread: Option<JoinHandle<()>>,
}

impl AudioLeds {
    /// Start the processing and monitor threads
    ///
    /// The returned receiver yields at most one fault per run.
    pub fn start(
        config: &PipelineConfig,
        displays: Vec<Box<dyn AudioDisplay>>,
        handoff: Arc<PcmHandoff>,
        io: PipelineIo,
    ) -> EngineResult<(Self, Receiver<Fault>)> {
        config.check()?;
        if displays.is_empty() {
            return Err(EngineError::ConfigError(
                "At least one display is required".to_string(),
            ));
        }
        if io.strip.num_leds() != config.num_leds {
            return Err(PlatformError::LedCountMismatch {
                expected: config.num_leds,
                got: io.strip.num_leds(),
            }
            .into());
        }

        let mappings: Vec<ColorMapping> = displays.iter().map(|d| d.color_mapping()).collect();

        // Every display starts on the persisted gradient
        let (gradient, reverse, display_index) = {
            let settings = &io.settings;
            (
                settings.current_gradient(),
                settings.reverse_gradient(),
                settings.display_index().min(displays.len() - 1),
            )
        };
        for mapping in &mappings {
            mapping.set_gradient(&gradient, reverse)?;
        }

        let controller = Arc::new(Controller::new(mappings, io.settings, display_index));
        let running = Arc::new(AtomicBool::new(true));
        // Room for the single fault even if nobody is listening yet
        let (fault_tx, fault_rx) = bounded::<Fault>(1);

        info!(
            "Starting pipeline: {} displays, {} LEDs on '{}', display {} active",
            displays.len(),
            config.num_leds,
            io.strip.name(),
            display_index
        );

        let processing = ProcessingContext {
            displays,
            strip: io.strip,
            knobs: io.knobs,
            remote: io.remote.clone(),
            handoff: Arc::clone(&handoff),
            controller: Arc::clone(&controller),
            running: Arc::clone(&running),
            faults: fault_tx,
            watchdog_timeout: config.watchdog_timeout(),
        };
        let processing_thread = thread::Builder::new()
            .name("specan-processing".into())
            .spawn(move || processing_loop(processing))
            .map_err(|e| EngineError::ThreadSpawnError(e.to_string()))?;

        let monitor = MonitorContext {
            controls: io.controls,
            remote: io.remote,
            controller: Arc::clone(&controller),
            running: Arc::clone(&running),
            poll_interval: config.monitor_poll_interval(),
        };
        let monitor_thread = match thread::Builder::new()
            .name("specan-monitor".into())
            .spawn(move || monitor_loop(monitor))
        {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                handoff.stop();
                let _ = processing_thread.join();
                return Err(EngineError::ThreadSpawnError(e.to_string()));
            }
        };

        Ok((
            Self {
                controller,
                handoff,
                running,
                processing_thread: Some(processing_thread),
                monitor_thread: Some(monitor_thread),
            },
            fault_rx,
        ))
    }

    pub fn active_display(&self) -> usize {
        self.controller.active_display()
    }

    pub fn num_displays(&self) -> usize {
        self.controller.mappings.len()
    }

    /// Move the active display by `delta` with wraparound
    pub fn switch_display(&self, delta: isize) -> usize {
        self.controller.switch_display(delta)
    }

    /// Apply a control event as if it came from the monitor loop
    pub fn handle_event(&self, event: ControlEvent) {
        self.controller.handle_event(event);
    }

    /// Color mapping of display `index`
    pub fn color_mapping(&self, index: usize) -> Option<ColorMapping> {
        self.controller.mappings.get(index).cloned()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop both threads, clear the strip and write pending settings
    pub fn shutdown(&mut self) {
        if self.processing_thread.is_none() && self.monitor_thread.is_none() {
            return;
        }

        // Signal shutdown
        self.running.store(false, Ordering::SeqCst);
        self.handoff.stop();

        if let Some(handle) = self.processing_thread.take() {
            if handle.join().is_err() {
                error!("Processing thread panicked");
            }
        }
        if let Some(handle) = self.monitor_thread.take() {
            if handle.join().is_err() {
                error!("Monitor thread panicked");
            }
        }
        info!("Pipeline stopped");
    }
}

impl Drop for AudioLeds {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn resolve_levels(ctx: &ProcessingContext) -> (i32, f32) {
    let remote = ctx.remote.as_deref();
    let gain = remote
        .and_then(|r| r.gain())
        .or_else(|| ctx.knobs.gain())
        .map(|gain| gain.max(0));
    let brightness = remote
        .and_then(|r| r.brightness())
        .or_else(|| ctx.knobs.brightness())
        .filter(|brightness| brightness.is_finite())
        .map(|brightness| brightness.clamp(0.0, 1.0));
    ctx.controller.publish_levels(gain, brightness);

    let (saved_gain, saved_brightness) = ctx.controller.fallback_levels();
    (
        gain.unwrap_or(saved_gain),
        brightness.unwrap_or(saved_brightness),
    )
}

fn processing_loop(mut ctx: ProcessingContext) {
    info!("Processing thread started");

    let num_leds = ctx.strip.num_leds();
    let mut leds = vec![Rgb::BLACK; num_leds];
    let mut frame: Vec<i16> = Vec::new();
    let mut write_failing = false;
    let last_display = ctx.displays.len() - 1;

    while ctx.running.load(Ordering::SeqCst) {
        let index = ctx.controller.active_display().min(last_display);
        frame.resize(ctx.displays[index].frame_size(), 0);

        match ctx.handoff.take_frame(&mut frame, ctx.watchdog_timeout) {
            Take::Frame => {}
            Take::Stopped => break,
            Take::TimedOut => {
                let fault = Fault::AudioStalled {
                    waited_ms: ctx.watchdog_timeout.as_millis() as u64,
                };
                error!("Watchdog: {}", fault);
                if ctx.faults.try_send(fault).is_err() {
                    warn!("Fault receiver gone, stopping without a supervisor");
                }
                break;
            }
        }

        let (gain, brightness) = resolve_levels(&ctx);

        let active = &mut ctx.displays[index];
        if let Err(e) = active.parse_pcm(&frame) {
            warn!("Display '{}' rejected frame: {}", active.name(), e);
            continue;
        }
        active.fill_in_leds(&mut leds, brightness, gain);

        match ctx.strip.set(&leds) {
            Ok(()) => {
                if write_failing {
                    info!("LED writes recovered");
                    write_failing = false;
                }
            }
            Err(e) => {
                if !write_failing {
                    warn!("LED write failed: {}", e);
                    write_failing = true;
                }
            }
        }
    }

    if let Err(e) = ctx.strip.clear() {
        warn!("Failed to clear LED strip: {}", e);
    }
    info!("Processing thread stopped");
}

fn monitor_loop(mut ctx: MonitorContext) {
    info!("Monitor thread started");

    while ctx.running.load(Ordering::SeqCst) {
        while let Some(event) = ctx.controls.poll() {
            ctx.controller.handle_event(event);
        }
        if let Some(remote) = &ctx.remote {
            while let Some(event) = remote.next_event() {
                ctx.controller.handle_event(event);
            }
        }

        ctx.controller.record_levels();
        let write = ctx.controller.settings.lock().take_due(Instant::now());
        save_settings(write);

        thread::sleep(ctx.poll_interval);
    }

    ctx.controller.record_levels();
    let write = ctx.controller.settings.lock().take_pending();
    save_settings(write);
    info!("Monitor thread stopped");
}

/// Runs with the settings lock released
fn save_settings(write: Option<PendingWrite>) {
    if let Some(write) = write {
        if let Err(e) = write.save() {
            warn!("Failed to save settings: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::build_displays;
    use crate::gradient::Gradient;
    use crate::settings::Settings;
    use specan_platform::{FixedLevels, MemoryStrip, MemoryStripView, NoControls};
    use std::collections::VecDeque;

    const NUM_LEDS: usize = 10;

    fn test_config(watchdog_ms: u64) -> PipelineConfig {
        PipelineConfig {
            num_leds: NUM_LEDS,
            watchdog_timeout_ms: watchdog_ms,
            ..PipelineConfig::default()
        }
    }

    /// Scripted control panel
    struct ScriptedControls {
        events: Arc<Mutex<VecDeque<ControlEvent>>>,
    }

    impl ControlSurface for ScriptedControls {
        fn poll(&mut self) -> Option<ControlEvent> {
            self.events.lock().pop_front()
        }
    }

    fn start(
        config: &PipelineConfig,
        settings: Settings,
        controls: Box<dyn ControlSurface>,
    ) -> (AudioLeds, Receiver<Fault>, Arc<PcmHandoff>, MemoryStripView) {
        let knobs = FixedLevels {
            gain: 4,
            brightness: 1.0,
        };
        start_with_knobs(config, settings, controls, Box::new(knobs))
    }

    fn start_with_knobs(
        config: &PipelineConfig,
        settings: Settings,
        controls: Box<dyn ControlSurface>,
        knobs: Box<dyn LevelKnobs>,
    ) -> (AudioLeds, Receiver<Fault>, Arc<PcmHandoff>, MemoryStripView) {
        let strip = MemoryStrip::new(config.num_leds);
        let view = strip.view();
        let handoff = Arc::new(PcmHandoff::new());
        let displays = build_displays(config).unwrap();
        let io = PipelineIo {
            strip: Box::new(strip),
            knobs,
            controls,
            remote: None,
            settings: SettingsStore::in_memory(settings),
        };
        let (leds, faults) = AudioLeds::start(config, displays, Arc::clone(&handoff), io).unwrap();
        (leds, faults, handoff, view)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn loud_frame() -> Vec<i16> {
        (0..128)
            .map(|i| if i % 2 == 0 { 20000 } else { -20000 })
            .collect()
    }

    fn color_at_zero(leds: &AudioLeds, index: usize) -> Rgb {
        leds.color_mapping(index).unwrap().snapshot().get_color(0, 1.0)
    }

    #[test]
    fn test_watchdog_reports_exactly_one_fault() {
        let config = test_config(30);
        let (leds, faults, _handoff, _view) = start(&config, Settings::default(), Box::new(NoControls));

        let fault = faults.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fault, Fault::AudioStalled { waited_ms: 30 });

        // The processing thread has exited, dropping its sender
        assert!(faults.recv_timeout(Duration::from_millis(200)).is_err());
        drop(leds);
    }

    #[test]
    fn test_frames_reach_the_strip() {
        let config = test_config(2000);
        let (mut leds, faults, handoff, view) =
            start(&config, Settings::default(), Box::new(NoControls));

        let frame = loud_frame();
        let written = wait_for(|| {
            handoff.push(&frame);
            view.frames_written() >= 5
        });
        assert!(written);
        assert!(view.colors().iter().any(|c| !c.is_black()));

        leds.shutdown();
        assert!(!leds.is_running());
        assert!(view.colors().iter().all(|c| c.is_black()));
        assert!(faults.try_recv().is_err());
    }

    #[test]
    fn test_rejects_strip_size_mismatch() {
        let config = test_config(100);
        let io = PipelineIo {
            strip: Box::new(MemoryStrip::new(NUM_LEDS + 1)),
            knobs: Box::new(NoControls),
            controls: Box::new(NoControls),
            remote: None,
            settings: SettingsStore::in_memory(Settings::default()),
        };
        let displays = build_displays(&config).unwrap();
        let result = AudioLeds::start(&config, displays, Arc::new(PcmHandoff::new()), io);
        assert!(matches!(
            result,
            Err(EngineError::PlatformError(PlatformError::LedCountMismatch { .. }))
        ));
    }

    #[test]
    fn test_restores_clamped_display_index() {
        let config = test_config(2000);
        let settings = Settings {
            display_index: 99,
            ..Settings::default()
        };
        let (leds, _faults, _handoff, _view) = start(&config, settings, Box::new(NoControls));
        assert_eq!(leds.active_display(), config.displays.len() - 1);
    }

    #[test]
    fn test_display_switch_wraps() {
        let config = test_config(2000);
        let (leds, _faults, _handoff, _view) =
            start(&config, Settings::default(), Box::new(NoControls));
        let count = leds.num_displays();

        assert_eq!(leds.switch_display(-1), count - 1);
        assert_eq!(leds.switch_display(1), 0);
        assert_eq!(leds.switch_display(2), 2);
        assert_eq!(leds.active_display(), 2);
    }

    #[test]
    fn test_reverse_applies_to_active_display() {
        let config = test_config(2000);
        let (leds, _faults, _handoff, _view) =
            start(&config, Settings::default(), Box::new(NoControls));
        let red = Rgb::new(255, 0, 0);
        assert_eq!(color_at_zero(&leds, 0), red);
        assert_eq!(color_at_zero(&leds, 1), red);

        leds.handle_event(ControlEvent::ToggleReverse);
        assert_ne!(color_at_zero(&leds, 0), red);
        assert_eq!(color_at_zero(&leds, 1), red);

        // Switching brings the new display onto the current gradient
        leds.handle_event(ControlEvent::DisplayNext);
        assert_eq!(leds.active_display(), 1);
        assert_ne!(color_at_zero(&leds, 1), red);
    }

    #[test]
    fn test_monitor_applies_panel_events() {
        let config = PipelineConfig {
            monitor_poll_interval_us: 500,
            ..test_config(2000)
        };
        let mut settings = Settings::default();
        settings
            .gradients
            .push(crate::settings::SavedGradient::new(&Gradient::rainbow(4).reversed()));

        let events = Arc::new(Mutex::new(VecDeque::from([
            ControlEvent::DisplayNext,
            ControlEvent::GradientNext,
        ])));
        let controls = ScriptedControls {
            events: Arc::clone(&events),
        };
        let (leds, _faults, _handoff, _view) = start(&config, settings, Box::new(controls));

        assert!(wait_for(|| events.lock().is_empty()));
        assert!(wait_for(|| leds.active_display() == 1
            && color_at_zero(&leds, 1) != Rgb::new(255, 0, 0)));
    }

    #[test]
    fn test_delete_last_gradient_is_refused() {
        let config = test_config(2000);
        let (leds, _faults, _handoff, _view) =
            start(&config, Settings::default(), Box::new(NoControls));
        let before = color_at_zero(&leds, 0);
        leds.handle_event(ControlEvent::DeleteGradient);
        assert_eq!(color_at_zero(&leds, 0), before);
    }

    #[test]
    fn test_frames_flow_while_settings_are_locked() {
        let config = test_config(2000);
        let (leds, faults, handoff, view) = start_with_knobs(
            &config,
            Settings::default(),
            Box::new(NoControls),
            Box::new(NoControls),
        );
        let frame = loud_frame();

        // Stands in for a settings write stuck on a slow disk
        let held = leds.controller.settings.lock();
        let before = view.frames_written();
        let written = wait_for(|| {
            handoff.push(&frame);
            view.frames_written() >= before + 5
        });
        drop(held);

        assert!(written);
        assert!(view.colors().iter().any(|c| !c.is_black()));
        assert!(faults.try_recv().is_err());
    }

    #[test]
    fn test_supplied_levels_are_persisted() {
        let config = test_config(2000);
        let (leds, _faults, handoff, view) =
            start(&config, Settings::default(), Box::new(NoControls));
        assert_eq!(leds.controller.settings.lock().brightness(), 0.5);

        let frame = loud_frame();
        assert!(wait_for(|| {
            handoff.push(&frame);
            view.frames_written() >= 1
        }));
        assert!(wait_for(|| leds.controller.settings.lock().brightness() == 1.0));
        assert_eq!(leds.controller.fallback_levels(), (4, 1.0));
    }

    #[test]
    fn test_small_level_drift_is_not_saved() {
        let controller = Controller::new(
            Vec::new(),
            SettingsStore::in_memory(Settings::default()),
            0,
        );

        controller.publish_levels(Some(4), Some(0.505));
        controller.record_levels();
        assert!(!controller.settings.lock().is_dirty());
        assert_eq!(controller.fallback_levels(), (4, 0.5));

        controller.publish_levels(None, Some(0.8));
        controller.record_levels();
        assert!(controller.settings.lock().is_dirty());
        assert_eq!(controller.settings.lock().brightness(), 0.8);
        assert_eq!(controller.fallback_levels(), (4, 0.8));

        controller.publish_levels(Some(7), None);
        controller.record_levels();
        assert_eq!(controller.fallback_levels(), (7, 0.8));
    }

    #[test]
    fn test_concurrent_display_switches_are_not_lost() {
        let config = test_config(2000);
        let (leds, _faults, _handoff, _view) =
            start(&config, Settings::default(), Box::new(NoControls));
        let count = leds.num_displays();

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..26 {
                        leds.switch_display(1);
                    }
                });
            }
        });

        assert_eq!(leds.active_display(), 104 % count);
        assert_eq!(
            leds.controller.settings.lock().display_index(),
            104 % count
        );
    }
}
