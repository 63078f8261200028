//! A deterministic stand-in for a host media element.
//!
//! [`SimulatedMedia`] behaves like a `<video>` element as far as the player
//! can tell: seeks take a configurable number of frames to settle, the
//! position advances only while playing, and reaching the end of the source
//! pauses and reports `Ended`. [`SimulationDriver`] wires one to a
//! [`PlayerController`] on a [`ManualClock`] and steps both frame by frame.

use parking_lot::Mutex;
use seamcut_core::{Config, ManualClock};
use seamcut_timeline::VirtualTimeline;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::controller::PlayerController;
use crate::frame::{ClockSource, FrameTick};
use crate::media::{MediaElement, MediaError, MediaEvent, VideoDimensions};

const DEFAULT_SEEK_LATENCY_FRAMES: u32 = 2;

#[derive(Debug)]
struct PendingElementSeek {
    target: f64,
    frames_left: u32,
}

#[derive(Debug)]
struct SimState {
    duration: f64,
    position: f64,
    paused: bool,
    rate: f64,
    seek: Option<PendingElementSeek>,
    seek_latency: u32,
    video_frame_callbacks: bool,
    dimensions: VideoDimensions,
    events: VecDeque<MediaEvent>,
    reject_next_play: Option<String>,
    seek_calls: Vec<f64>,
    play_calls: usize,
}

impl SimState {
    fn start_seek(&mut self, time: f64) {
        let target = if time.is_finite() {
            time.clamp(0.0, self.duration)
        } else {
            0.0
        };
        self.events.push_back(MediaEvent::Seeking);
        if self.seek_latency == 0 {
            self.position = target;
            self.seek = None;
            self.events.push_back(MediaEvent::Seeked);
        } else {
            // A new seek replaces one still in flight; only it reports Seeked.
            self.seek = Some(PendingElementSeek {
                target,
                frames_left: self.seek_latency,
            });
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            self.events.push_back(if paused {
                MediaEvent::Pause
            } else {
                MediaEvent::Play
            });
        }
    }
}

/// Shared handle to a simulated media element. Clones observe and drive the
/// same element, so a test can keep one while the controller owns another.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedMedia {
    /// A paused element at position zero with a source `duration` seconds long.
    pub fn new(duration: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                duration: duration.max(0.0),
                position: 0.0,
                paused: true,
                rate: 1.0,
                seek: None,
                seek_latency: DEFAULT_SEEK_LATENCY_FRAMES,
                video_frame_callbacks: true,
                dimensions: VideoDimensions {
                    width: 1920,
                    height: 1080,
                },
                events: VecDeque::new(),
                reject_next_play: None,
                seek_calls: Vec::new(),
                play_calls: 0,
            })),
        }
    }

    /// Number of [`Self::advance`] calls a seek takes to settle. Zero settles
    /// synchronously.
    #[must_use]
    pub fn with_seek_latency(self, frames: u32) -> Self {
        self.state.lock().seek_latency = frames;
        self
    }

    #[must_use]
    pub fn without_video_frame_callbacks(self) -> Self {
        self.state.lock().video_frame_callbacks = false;
        self
    }

    #[must_use]
    pub fn with_dimensions(self, width: u32, height: u32) -> Self {
        self.state.lock().dimensions = VideoDimensions { width, height };
        self
    }

    /// Advance the element by one frame of `dt` seconds.
    pub fn advance(&self, dt: f64) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if let Some(seek) = st.seek.as_mut() {
            if seek.frames_left > 1 {
                seek.frames_left -= 1;
                return;
            }
            let target = seek.target;
            st.seek = None;
            st.position = target;
            st.events.push_back(MediaEvent::Seeked);
            return;
        }
        if st.paused || dt <= 0.0 {
            return;
        }
        let step = dt * st.rate;
        st.position += step;
        if st.position >= st.duration {
            st.position = st.duration;
            st.set_paused(true);
            st.events.push_back(MediaEvent::Ended);
        }
    }

    /// Drain queued lifecycle events in the order they occurred.
    pub fn take_events(&self) -> Vec<MediaEvent> {
        self.state.lock().events.drain(..).collect()
    }

    /// Seek as if from the element's native controls.
    pub fn user_seek(&self, time: f64) {
        self.state.lock().start_seek(time);
    }

    pub fn user_pause(&self) {
        self.state.lock().set_paused(true);
    }

    pub fn user_play(&self) {
        self.state.lock().set_paused(false);
    }

    /// Make the next `play()` call fail with `reason`.
    pub fn reject_next_play(&self, reason: impl Into<String>) {
        self.state.lock().reject_next_play = Some(reason.into());
    }

    /// Abort the in-flight seek and report an element error.
    pub fn fail_pending_seek(&self, message: impl Into<String>) {
        let mut st = self.state.lock();
        st.seek = None;
        st.events.push_back(MediaEvent::Error(message.into()));
    }

    /// Positions passed to `set_current_time` by the player, in order.
    pub fn seek_calls(&self) -> Vec<f64> {
        self.state.lock().seek_calls.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn rate(&self) -> f64 {
        self.state.lock().rate
    }
}

impl MediaElement for SimulatedMedia {
    fn play(&mut self) -> Result<(), MediaError> {
        let mut st = self.state.lock();
        st.play_calls += 1;
        if let Some(reason) = st.reject_next_play.take() {
            return Err(MediaError::PlayRejected(reason));
        }
        st.set_paused(false);
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().set_paused(true);
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn is_seeking(&self) -> bool {
        self.state.lock().seek.is_some()
    }

    /// Like a browser, reports the seek target as soon as a seek starts.
    fn current_time(&self) -> f64 {
        let st = self.state.lock();
        st.seek.as_ref().map_or(st.position, |s| s.target)
    }

    fn set_current_time(&mut self, time: f64) {
        let mut st = self.state.lock();
        st.seek_calls.push(time);
        st.start_seek(time);
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn dimensions(&self) -> VideoDimensions {
        self.state.lock().dimensions
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.lock().rate = rate;
    }

    fn supports_video_frame_callbacks(&self) -> bool {
        self.state.lock().video_frame_callbacks
    }
}

/// Steps a [`PlayerController`] and a [`SimulatedMedia`] in lockstep on a
/// manual clock.
pub struct SimulationDriver {
    controller: PlayerController<SimulatedMedia>,
    media: SimulatedMedia,
    clock: ManualClock,
    frame: Duration,
    timestamp: f64,
    frames: u64,
}

impl SimulationDriver {
    /// Build a controller for `timeline` with a simulated element attached,
    /// configured from `config.simulation`.
    pub fn new(config: &Config, timeline: VirtualTimeline, source_duration: f64) -> Self {
        let clock = ManualClock::new();
        let mut controller = PlayerController::with_clock(config, Arc::new(clock.clone()));
        controller.update_timeline(timeline);

        let mut media = SimulatedMedia::new(source_duration)
            .with_seek_latency(config.simulation.seek_latency_frames);
        if !config.simulation.video_frame_callbacks {
            media = media.without_video_frame_callbacks();
        }
        controller.attach_video(media.clone());

        let mut driver = Self {
            controller,
            media,
            clock,
            frame: config.simulation.frame_duration(),
            timestamp: 0.0,
            frames: 0,
        };
        // Attaching may already have repositioned the element.
        driver.pump_events();
        driver
    }

    pub fn controller(&self) -> &PlayerController<SimulatedMedia> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlayerController<SimulatedMedia> {
        &mut self.controller
    }

    pub fn media(&self) -> &SimulatedMedia {
        &self.media
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    /// Frames stepped so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Forward queued element events to the controller.
    pub fn pump_events(&mut self) {
        for event in self.media.take_events() {
            self.controller.handle_media_event(event);
        }
    }

    /// One display frame: advance the clock and the element, deliver element
    /// events, then the frame callback.
    ///
    /// Like a browser, video frame callbacks only fire while the element is
    /// presenting frames; a paused element gets an animation frame instead.
    pub fn step(&mut self) {
        let dt = self.frame.as_secs_f64();
        self.clock.advance(self.frame);
        self.timestamp += dt;
        self.frames += 1;

        self.media.advance(dt);
        self.pump_events();

        let tick = match self.controller.clock_source() {
            Some(ClockSource::VideoFrame) if !self.media.is_paused() => {
                FrameTick::video_frame(self.timestamp, self.media.current_time())
            }
            Some(_) => FrameTick::animation_frame(self.timestamp),
            None => return,
        };
        self.controller.handle_frame(tick);
    }

    /// Step for `secs` seconds of simulated time. Returns the frame count.
    pub fn run_for(&mut self, secs: f64) -> u64 {
        let frames = (secs.max(0.0) / self.frame.as_secs_f64()).ceil() as u64;
        for _ in 0..frames {
            self.step();
        }
        frames
    }

    /// Step until `done` holds or `max_frames` elapse. Returns whether `done`
    /// was reached.
    pub fn run_until<F>(&mut self, max_frames: u64, mut done: F) -> bool
    where
        F: FnMut(&PlayerController<SimulatedMedia>) -> bool,
    {
        for _ in 0..max_frames {
            if done(&self.controller) {
                return true;
            }
            self.step();
        }
        done(&self.controller)
    }
}
