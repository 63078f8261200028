//! The playback session: play/pause/stop/seek state machine, the virtual
//! clock and the per-frame update.
//!
//! Virtual time is owned by the controller and computed as
//! `origin + elapsed * rate` on a monotonic [`Clock`]. The media element's
//! reported position is only ever a target the controller converges towards
//! (threshold-gated repositioning); it becomes authoritative solely right
//! after a native seek the controller did not issue.

use seamcut_core::config::{Config, PlayerConfig};
use seamcut_core::{Clock, MonotonicClock, SegmentId};
use seamcut_timeline::{
    CompletionReason, FrameData, SegmentController, TimelineMapper, VirtualTimeline,
};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::error::PlayerError;
use crate::events::{
    Completion, PlaybackState, SeekEvent, SeekPhase, SegmentChange, StateChange, TimelineChange,
};
use crate::frame::{ClockSource, FrameGate, FrameStats, FrameTick};
use crate::media::{MediaElement, MediaEvent};
use crate::observer::{Subscribers, Subscription};
use crate::seek::{SeekArbiter, SeekHandle};

type OverlaySync = Arc<dyn Fn(f64) + Send + Sync>;

struct Listeners {
    frame: Subscribers<FrameData>,
    state: Subscribers<StateChange>,
    seek: Subscribers<SeekEvent>,
    time_update: Subscribers<f64>,
    segment_change: Subscribers<SegmentChange>,
    timeline_change: Subscribers<TimelineChange>,
    complete: Subscribers<Completion>,
}

impl Default for Listeners {
    fn default() -> Self {
        Self {
            frame: Subscribers::new("frame"),
            state: Subscribers::new("state"),
            seek: Subscribers::new("seek"),
            time_update: Subscribers::new("time_update"),
            segment_change: Subscribers::new("segment_change"),
            timeline_change: Subscribers::new("timeline_change"),
            complete: Subscribers::new("complete"),
        }
    }
}

/// Running totals since the controller was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerCounters {
    pub frames_processed: u64,
    pub frames_throttled: u64,
    /// Ticks from a clock source other than the active one.
    pub foreign_ticks: u64,
    pub drift_corrections: u64,
    /// Frames processed while virtual time sat outside every segment.
    pub gap_frames: u64,
    pub native_seeks: u64,
    pub completions: u64,
    pub subscriber_faults: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriberCounts {
    pub frame: usize,
    pub state: usize,
    pub seek: usize,
    pub time_update: usize,
    pub segment_change: usize,
    pub timeline_change: usize,
    pub complete: usize,
    pub overlay_sync: bool,
}

/// Introspection snapshot for diagnostics. Field set is not stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerDebugInfo {
    pub state: PlaybackState,
    pub attached: bool,
    pub clock_source: Option<ClockSource>,
    pub virtual_time: f64,
    pub duration: f64,
    pub playback_rate: f64,
    pub active_segment: Option<SegmentId>,
    pub element_time: Option<f64>,
    pub segment_count: usize,
    pub enabled_segment_count: usize,
    pub seek_generation: u64,
    pub pending_seek: bool,
    pub seeks_cancelled: u64,
    pub counters: PlayerCounters,
    pub subscribers: SubscriberCounts,
}

/// Drives one media element through a [`VirtualTimeline`].
///
/// The host forwards frame callbacks to [`Self::handle_frame`] and element
/// events to [`Self::handle_media_event`]; everything else is plain method
/// calls. Subscribers are notified synchronously from within those calls.
pub struct PlayerController<M: MediaElement> {
    config: PlayerConfig,
    clock: Arc<dyn Clock>,
    mapper: TimelineMapper,
    segments: SegmentController,
    media: Option<M>,
    clock_source: Option<ClockSource>,
    state: PlaybackState,
    /// Virtual time at `anchor`.
    origin_virtual: f64,
    anchor: Duration,
    rate: f64,
    active_segment: Option<SegmentId>,
    /// Whether the controller last told the element to play.
    element_playing: bool,
    /// Real target of a repositioning seek the controller issued on its own;
    /// its `Seeked` is not a native seek.
    internal_seek: Option<f64>,
    seeks: SeekArbiter,
    gate: FrameGate,
    stats: FrameStats,
    counters: PlayerCounters,
    listeners: Listeners,
    overlay_sync: Option<OverlaySync>,
}

impl<M: MediaElement> PlayerController<M> {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let player = config.player.clone();
        let anchor = clock.now();
        Self {
            rate: player.clamp_rate(player.default_playback_rate),
            gate: FrameGate::new(player.min_frame_interval()),
            stats: FrameStats::new(player.stats_log_interval()),
            config: player,
            clock,
            mapper: TimelineMapper::default(),
            segments: SegmentController::new(&config.segments),
            media: None,
            clock_source: None,
            state: PlaybackState::Idle,
            origin_virtual: 0.0,
            anchor,
            active_segment: None,
            element_playing: false,
            internal_seek: None,
            seeks: SeekArbiter::default(),
            counters: PlayerCounters::default(),
            listeners: Listeners::default(),
            overlay_sync: None,
        }
    }

    // ------------------------------------------------------------------
    // Attachment
    // ------------------------------------------------------------------

    /// Bind a media element. Any previously attached element is detached
    /// first and returned.
    pub fn attach_video(&mut self, mut media: M) -> Option<M> {
        let previous = self.detach_video();

        let source = if media.supports_video_frame_callbacks() {
            ClockSource::VideoFrame
        } else {
            tracing::debug!("Video frame callbacks unavailable; using animation frames");
            ClockSource::AnimationFrame
        };

        media.set_playback_rate(self.rate);
        let dimensions = media.dimensions();
        tracing::info!(
            source = %source,
            media_duration = media.duration(),
            width = dimensions.width,
            height = dimensions.height,
            "Media element attached"
        );

        self.media = Some(media);
        self.clock_source = Some(source);
        self.gate.reset();

        let virtual_time = self.live_virtual_time();
        self.position_element(virtual_time);
        previous
    }

    /// Unbind the media element and reset the session. Once this returns no
    /// frame or element event has any further effect.
    pub fn detach_video(&mut self) -> Option<M> {
        let mut media = self.media.take()?;
        self.clock_source = None;

        if let Some(generation) = self.seeks.interrupt("media detached") {
            tracing::debug!(generation, "Pending seek interrupted by detach");
        }
        self.internal_seek = None;
        if !media.is_paused() {
            media.pause();
        }
        self.element_playing = false;

        let previous = self.state;
        self.state = PlaybackState::Idle;
        self.reanchor(0.0);
        self.rate = self.config.clamp_rate(self.config.default_playback_rate);
        self.active_segment = None;
        self.segments.reset();
        self.gate.reset();

        tracing::info!("Media element detached");
        self.emit_state(previous);
        Some(media)
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Start or resume playback from the current virtual time. Playback that
    /// has reached the end restarts from zero.
    pub fn play(&mut self) -> Result<(), PlayerError> {
        if self.media.is_none() {
            return Err(PlayerError::NotAttached { operation: "play" });
        }
        if self.state == PlaybackState::Playing {
            return Ok(());
        }

        let duration = self.mapper.duration();
        let mut virtual_time = self.live_virtual_time();
        if duration > 0.0 && virtual_time >= duration {
            virtual_time = 0.0;
        }

        self.reanchor(virtual_time);
        self.segments.reset();
        self.gate.reset();
        let previous = self.state;
        self.state = PlaybackState::Playing;

        let segment = self.mapper.segment_at(virtual_time).map(|s| s.id);
        self.set_active_segment(segment, virtual_time);
        self.position_element(virtual_time);

        tracing::info!(virtual_time, rate = self.rate, "Playback started");
        self.emit_state(previous);
        Ok(())
    }

    /// Freeze virtual time and pause the element. No-op unless playing.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let virtual_time = self.live_virtual_time();
        self.reanchor(virtual_time);
        let previous = self.state;
        self.state = PlaybackState::Paused;
        self.pause_element();

        tracing::info!(virtual_time, "Playback paused");
        self.emit_state(previous);
        self.emit_time(virtual_time);
    }

    /// Reset to virtual time zero and pause the element.
    pub fn stop(&mut self) {
        if let Some(generation) = self.seeks.interrupt("playback stopped") {
            tracing::debug!(generation, "Pending seek interrupted by stop");
        }
        self.internal_seek = None;
        self.reanchor(0.0);
        let previous = self.state;
        self.state = PlaybackState::Idle;
        self.active_segment = None;
        self.segments.reset();
        self.pause_element();

        tracing::info!("Playback stopped");
        self.emit_state(previous);
        self.emit_time(0.0);
    }

    /// Jump to `virtual_time`, clamped into `[0, duration]`.
    ///
    /// Virtual time, the active segment and the seek/time-update/overlay
    /// listeners are all updated before this returns; the handle resolves
    /// once the element finishes repositioning, or with
    /// [`SeekError::Cancelled`](crate::SeekError::Cancelled) if another seek
    /// is issued first.
    pub fn seek(&mut self, virtual_time: f64) -> Result<SeekHandle, PlayerError> {
        if self.media.is_none() {
            return Err(PlayerError::NotAttached { operation: "seek" });
        }

        let duration = self.mapper.duration();
        let target = clamp_time(virtual_time, duration);
        let resume = self.state;
        self.state = PlaybackState::Seeking;

        self.reanchor(target);
        self.segments.reset();
        self.internal_seek = None;

        let segment = self
            .mapper
            .segment_at(target)
            .map(|s| (s.id, s.virtual_to_real(target)));
        let real_target = match segment {
            Some((_, real)) => Some(real),
            // End of the timeline is outside every half-open range; park the
            // element on the last frame instead.
            None if duration > 0.0 && target >= duration => {
                self.mapper.last_segment().map(|s| s.real_end_time)
            }
            None => None,
        };
        self.set_active_segment(segment.map(|(id, _)| id), target);

        match real_target {
            Some(real) => {
                if let Some(media) = self.media.as_mut() {
                    media.set_current_time(real);
                }
            }
            None => {
                self.pause_element();
                // The element still owes a `Seeked` for the superseded
                // reposition; it must not read as a native seek.
                if let Some(media) = self.media.as_ref().filter(|m| m.is_seeking()) {
                    self.internal_seek = Some(media.current_time());
                }
            }
        }

        let handle = self.seeks.begin(target, real_target);
        let generation = handle.generation();
        self.state = match resume {
            PlaybackState::Playing => PlaybackState::Playing,
            _ => PlaybackState::Paused,
        };

        tracing::debug!(
            generation,
            requested = virtual_time,
            target,
            real_target = ?real_target,
            "Seek requested"
        );
        self.emit_seek(SeekEvent {
            generation: Some(generation),
            phase: SeekPhase::Requested,
            virtual_time: target,
            real_time: real_target,
        });
        if real_target.is_none() {
            self.emit_seek(SeekEvent {
                generation: Some(generation),
                phase: SeekPhase::Settled,
                virtual_time: target,
                real_time: None,
            });
        }
        self.emit_state(resume);
        self.emit_time(target);
        Ok(handle)
    }

    /// Set the virtual clock multiplier and forward it to the element.
    /// Returns the rate actually applied after clamping.
    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        let applied = self.config.clamp_rate(rate);
        if self.state == PlaybackState::Playing {
            let virtual_time = self.live_virtual_time();
            self.reanchor(virtual_time);
        }
        self.rate = applied;
        if let Some(media) = self.media.as_mut() {
            media.set_playback_rate(applied);
        }
        if applied != rate {
            tracing::debug!(requested = rate, applied, "Playback rate clamped");
        }
        applied
    }

    /// Swap in a rebuilt timeline.
    ///
    /// Virtual time is clamped to the new duration. If the element now sits
    /// outside every enabled segment it is moved: to the next transition
    /// target while playing, or to the first segment's start otherwise.
    pub fn update_timeline(&mut self, timeline: impl Into<Arc<VirtualTimeline>>) {
        let timeline = timeline.into();
        if let Some(issue) = timeline.issues().first() {
            tracing::warn!(
                issues = timeline.issues().len(),
                first = %issue,
                "Timeline has structural issues"
            );
        }

        let previous_duration = self.mapper.duration();
        let live = self.live_virtual_time();
        let segment_count = timeline.segments().len();
        let enabled_count = timeline.enabled_count();
        self.mapper.set_timeline(timeline);

        let duration = self.mapper.duration();
        let mut virtual_time = clamp_time(live, duration);
        self.reanchor(virtual_time);
        let covering = self.mapper.segment_at(virtual_time).map(|s| s.id);
        if covering != self.active_segment {
            self.active_segment = None;
        }
        self.segments.reset();

        let element_time = self
            .media
            .as_ref()
            .filter(|m| !m.is_seeking())
            .map(|m| m.current_time());
        if let Some(real) = element_time {
            if !self.segments.is_real_time_covered(&self.mapper, real) {
                let target = if self.state == PlaybackState::Playing {
                    self.segments
                        .transition_target(&self.mapper, virtual_time)
                        .map(|t| (t.virtual_time, t.real_time))
                } else {
                    self.mapper
                        .first_segment()
                        .map(|s| (s.virtual_start_time, s.real_start_time))
                };
                if let Some((target_virtual, target_real)) = target {
                    tracing::debug!(
                        element_time = real,
                        target_virtual,
                        target_real,
                        "Element outside new timeline; repositioning"
                    );
                    virtual_time = target_virtual;
                    self.reanchor(target_virtual);
                    self.seek_element_internally(target_real);
                }
            }
        }

        tracing::info!(
            duration,
            previous_duration,
            segments = segment_count,
            enabled = enabled_count,
            virtual_time,
            "Timeline updated"
        );
        let change = TimelineChange {
            duration,
            previous_duration,
            segment_count,
            enabled_count,
            virtual_time,
        };
        let faults = self.listeners.timeline_change.notify(&change);
        self.record_faults(faults);
        self.emit_time(virtual_time);
    }

    // ------------------------------------------------------------------
    // Host callbacks
    // ------------------------------------------------------------------

    /// Per-frame update.
    ///
    /// Order within one call: virtual time, completion check, active segment,
    /// element repositioning, then subscriber notification.
    pub fn handle_frame(&mut self, tick: FrameTick) {
        let Some(source) = self.clock_source else {
            return;
        };
        // Video frame callbacks only fire for presented frames, so while the
        // element is held paused animation frames keep the clock running.
        let fallback = source == ClockSource::VideoFrame
            && tick.source == ClockSource::AnimationFrame
            && !self.element_presenting();
        if tick.source != source && !fallback {
            self.counters.foreign_ticks += 1;
            tracing::trace!(expected = %source, got = %tick.source, "Ignoring tick from inactive clock source");
            return;
        }

        let now = self.clock.now();
        if !self.gate.admit(now) {
            self.counters.frames_throttled += 1;
            self.stats.record_throttled();
            return;
        }
        self.counters.frames_processed += 1;
        self.stats.record_processed();

        if self.state != PlaybackState::Playing {
            return;
        }

        let virtual_time = self.live_virtual_time();

        if let Some(reason) = self.segments.check_completion(&self.mapper, virtual_time, now) {
            self.finish(reason, virtual_time);
            return;
        }

        let segment = self
            .mapper
            .segment_at(virtual_time)
            .map(|s| (s.id, s.virtual_to_real(virtual_time)));
        self.set_active_segment(segment.map(|(id, _)| id), virtual_time);

        let real_time = match segment {
            Some((_, real)) => {
                self.correct_drift(real, tick.media_time);
                self.resume_element();
                real
            }
            None => {
                self.counters.gap_frames += 1;
                self.pause_element();
                self.media.as_ref().map_or(0.0, |m| m.current_time())
            }
        };

        tracing::trace!(virtual_time, real_time, timestamp = tick.timestamp, "Frame");
        let data = self
            .mapper
            .create_frame_data(virtual_time, real_time, tick.timestamp);
        let faults = self.listeners.frame.notify(&data);
        self.record_faults(faults);
        self.emit_time(virtual_time);
        self.stats.maybe_log(now, virtual_time);
    }

    /// Reconcile a lifecycle event reported by the element.
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.media.is_none() {
            tracing::trace!(?event, "Ignoring media event while detached");
            return;
        }
        match event {
            MediaEvent::Seeking => tracing::trace!("Element seeking"),
            MediaEvent::Seeked => self.on_seeked(),
            MediaEvent::Play => self.on_element_play(),
            MediaEvent::Pause => self.on_element_pause(),
            MediaEvent::Ended => self.on_element_ended(),
            MediaEvent::Error(message) => {
                tracing::warn!(error = %message, "Media element error");
                self.internal_seek = None;
                if let Some(generation) = self.seeks.fail(&message) {
                    tracing::debug!(generation, "Pending seek failed");
                }
            }
        }
    }

    fn on_seeked(&mut self) {
        let Some((seeking, real)) = self
            .media
            .as_ref()
            .map(|m| (m.is_seeking(), m.current_time()))
        else {
            return;
        };
        if seeking {
            tracing::trace!(real, "Stale seeked; another seek is in flight");
            return;
        }

        let threshold = self.segments.boundary_threshold();
        let duration = self.mapper.duration();

        if let Some((virtual_target, real_target)) = self.seeks.pending_targets() {
            self.internal_seek = None;
            let mut settled = virtual_target;
            if (real - real_target).abs() > threshold {
                let mapped = self.mapper.real_to_virtual_with_tolerance(real, threshold);
                if mapped.is_valid {
                    settled = mapped.time;
                }
            }
            let settled = clamp_time(settled, duration);
            if settled != virtual_target {
                tracing::debug!(virtual_target, settled, real, "Element settled away from seek target");
                self.reanchor(settled);
            }
            if let Some(completion) = self.seeks.settle(settled, real) {
                tracing::debug!(generation = completion.generation, virtual_time = settled, real, "Seek settled");
                self.emit_seek(SeekEvent {
                    generation: Some(completion.generation),
                    phase: SeekPhase::Settled,
                    virtual_time: settled,
                    real_time: Some(real),
                });
            }
            return;
        }

        if let Some(target) = self.internal_seek.take() {
            tracing::trace!(target, real, "Repositioning seek settled");
            return;
        }

        self.counters.native_seeks += 1;
        let mapped = self.mapper.real_to_virtual_with_tolerance(real, threshold);
        let virtual_time = if mapped.is_valid {
            mapped.time
        } else if let Some((start, real_start)) = self
            .mapper
            .next_segment_after_real(real)
            .map(|s| (s.virtual_start_time, s.real_start_time))
        {
            tracing::debug!(real, snapped_to = real_start, "Native seek landed in a cut; snapping forward");
            self.seek_element_internally(real_start);
            start
        } else {
            tracing::debug!(real, "Native seek landed past all segments; holding position");
            self.live_virtual_time()
        };

        self.reanchor(virtual_time);
        self.segments.reset();
        let segment = self.mapper.segment_at(virtual_time).map(|s| s.id);
        self.set_active_segment(segment, virtual_time);

        tracing::debug!(real, virtual_time, "Native seek resynchronised");
        self.emit_seek(SeekEvent {
            generation: None,
            phase: SeekPhase::Native,
            virtual_time,
            real_time: Some(real),
        });
        self.emit_time(virtual_time);
    }

    fn on_element_play(&mut self) {
        let Some(paused) = self.media.as_ref().map(|m| m.is_paused()) else {
            return;
        };
        if paused || self.element_playing {
            return;
        }
        self.element_playing = true;
        if self.state == PlaybackState::Playing {
            return;
        }

        let virtual_time = self.live_virtual_time();
        self.reanchor(virtual_time);
        self.segments.reset();
        self.gate.reset();
        let previous = self.state;
        self.state = PlaybackState::Playing;
        tracing::info!(virtual_time, "External play adopted");
        self.emit_state(previous);
    }

    fn on_element_pause(&mut self) {
        let threshold = self.segments.boundary_threshold();
        let Some((paused, at_source_end)) = self
            .media
            .as_ref()
            .map(|m| (m.is_paused(), m.current_time() >= m.duration() - threshold))
        else {
            return;
        };
        if !paused || !self.element_playing || self.state != PlaybackState::Playing {
            return;
        }
        if at_source_end {
            // `Ended` follows and decides.
            return;
        }

        let virtual_time = self.live_virtual_time();
        self.reanchor(virtual_time);
        self.element_playing = false;
        let previous = self.state;
        self.state = PlaybackState::Paused;
        tracing::info!(virtual_time, "External pause adopted");
        self.emit_state(previous);
        self.emit_time(virtual_time);
    }

    fn on_element_ended(&mut self) {
        self.element_playing = false;
        if self.state != PlaybackState::Playing {
            return;
        }
        let virtual_time = self.live_virtual_time();
        let duration = self.mapper.duration();
        if virtual_time < duration - self.segments.boundary_threshold() {
            tracing::debug!(virtual_time, duration, "Source ended before the virtual end");
            return;
        }
        let now = self.clock.now();
        if let Some(reason) = self.segments.check_completion(&self.mapper, duration, now) {
            self.finish(reason, virtual_time);
        }
    }

    fn finish(&mut self, reason: CompletionReason, virtual_time: f64) {
        let duration = self.mapper.duration();
        let final_time = match reason {
            CompletionReason::ReachedEnd => duration,
            _ => virtual_time,
        };
        self.reanchor(final_time);
        let previous = self.state;
        self.state = PlaybackState::Paused;
        self.pause_element();
        self.counters.completions += 1;

        tracing::info!(virtual_time = final_time, duration, ?reason, "Playback complete");
        self.emit_time(final_time);
        self.emit_state(previous);
        let faults = self.listeners.complete.notify(&Completion {
            reason,
            virtual_time: final_time,
        });
        self.record_faults(faults);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current virtual time, clamped to the current duration.
    pub fn current_time(&self) -> f64 {
        self.live_virtual_time()
    }

    pub fn duration(&self) -> f64 {
        self.mapper.duration()
    }

    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn active_segment(&self) -> Option<SegmentId> {
        self.active_segment
    }

    pub fn timeline(&self) -> &Arc<VirtualTimeline> {
        self.mapper.timeline()
    }

    pub fn mapper(&self) -> &TimelineMapper {
        &self.mapper
    }

    /// The clock source frames must come from; `None` while detached.
    pub fn clock_source(&self) -> Option<ClockSource> {
        self.clock_source
    }

    pub fn is_attached(&self) -> bool {
        self.media.is_some()
    }

    pub fn media(&self) -> Option<&M> {
        self.media.as_ref()
    }

    pub fn counters(&self) -> PlayerCounters {
        self.counters
    }

    pub fn subscriber_counts(&self) -> SubscriberCounts {
        SubscriberCounts {
            frame: self.listeners.frame.len(),
            state: self.listeners.state.len(),
            seek: self.listeners.seek.len(),
            time_update: self.listeners.time_update.len(),
            segment_change: self.listeners.segment_change.len(),
            timeline_change: self.listeners.timeline_change.len(),
            complete: self.listeners.complete.len(),
            overlay_sync: self.overlay_sync.is_some(),
        }
    }

    pub fn debug_info(&self) -> PlayerDebugInfo {
        let timeline = self.mapper.timeline();
        PlayerDebugInfo {
            state: self.state,
            attached: self.media.is_some(),
            clock_source: self.clock_source,
            virtual_time: self.live_virtual_time(),
            duration: self.mapper.duration(),
            playback_rate: self.rate,
            active_segment: self.active_segment,
            element_time: self.media.as_ref().map(|m| m.current_time()),
            segment_count: timeline.segments().len(),
            enabled_segment_count: timeline.enabled_count(),
            seek_generation: self.seeks.latest_generation(),
            pending_seek: self.seeks.has_pending(),
            seeks_cancelled: self.seeks.cancelled_count(),
            counters: self.counters,
            subscribers: self.subscriber_counts(),
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn on_frame<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&FrameData) + Send + Sync + 'static,
    {
        self.listeners.frame.subscribe(handler)
    }

    pub fn on_state_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.listeners.state.subscribe(handler)
    }

    pub fn on_seek<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SeekEvent) + Send + Sync + 'static,
    {
        self.listeners.seek.subscribe(handler)
    }

    /// Virtual time, once per processed frame and after every seek, pause,
    /// stop or timeline change.
    pub fn on_time_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&f64) + Send + Sync + 'static,
    {
        self.listeners.time_update.subscribe(handler)
    }

    pub fn on_segment_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SegmentChange) + Send + Sync + 'static,
    {
        self.listeners.segment_change.subscribe(handler)
    }

    pub fn on_timeline_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TimelineChange) + Send + Sync + 'static,
    {
        self.listeners.timeline_change.subscribe(handler)
    }

    pub fn on_complete<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.listeners.complete.subscribe(handler)
    }

    /// Install the overlay renderer's callback, replacing any previous one.
    /// It receives the virtual time alongside every time update.
    pub fn set_overlay_sync<F>(&mut self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.overlay_sync = Some(Arc::new(callback));
    }

    pub fn clear_overlay_sync(&mut self) {
        self.overlay_sync = None;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn live_virtual_time(&self) -> f64 {
        let raw = match self.state {
            PlaybackState::Playing => {
                let elapsed = self.clock.now().saturating_sub(self.anchor).as_secs_f64();
                self.origin_virtual + elapsed * self.rate
            }
            _ => self.origin_virtual,
        };
        clamp_time(raw, self.mapper.duration())
    }

    fn reanchor(&mut self, virtual_time: f64) {
        self.origin_virtual = virtual_time;
        self.anchor = self.clock.now();
    }

    /// Point the element at `virtual_time` and start or stop it to match the
    /// controller state.
    fn position_element(&mut self, virtual_time: f64) {
        match self
            .mapper
            .segment_at(virtual_time)
            .map(|s| s.virtual_to_real(virtual_time))
        {
            Some(real) => {
                self.correct_drift(real, None);
                if self.state == PlaybackState::Playing {
                    self.resume_element();
                } else {
                    self.pause_element();
                }
            }
            None => self.pause_element(),
        }
    }

    /// Reposition the element if it is more than the drift threshold away
    /// from `real_time`. `reported` overrides the element's own position
    /// (the presented frame's media time, when the tick carries one).
    fn correct_drift(&mut self, real_time: f64, reported: Option<f64>) -> bool {
        let threshold = self.config.drift_threshold_secs();
        let Some(media) = self.media.as_ref() else {
            return false;
        };
        if media.is_seeking() {
            return false;
        }
        let current = reported.unwrap_or_else(|| media.current_time());
        let drift = (current - real_time).abs();
        if drift <= threshold {
            return false;
        }
        tracing::debug!(target_time = real_time, current, drift, "Correcting element drift");
        self.counters.drift_corrections += 1;
        self.seek_element_internally(real_time);
        true
    }

    fn seek_element_internally(&mut self, real_time: f64) {
        if let Some(media) = self.media.as_mut() {
            media.set_current_time(real_time);
            self.internal_seek = Some(real_time);
        }
    }

    fn element_presenting(&self) -> bool {
        self.media.as_ref().is_some_and(|m| !m.is_paused())
    }

    fn resume_element(&mut self) {
        let Some(media) = self.media.as_mut() else {
            return;
        };
        if !media.is_paused() {
            self.element_playing = true;
            return;
        }
        match media.play() {
            Ok(()) => self.element_playing = true,
            Err(e) => {
                self.element_playing = false;
                tracing::warn!(error = %e, "Media element refused to play");
            }
        }
    }

    fn pause_element(&mut self) {
        self.element_playing = false;
        if let Some(media) = self.media.as_mut() {
            if !media.is_paused() {
                media.pause();
            }
        }
    }

    fn set_active_segment(&mut self, current: Option<SegmentId>, virtual_time: f64) {
        if current == self.active_segment {
            return;
        }
        let change = SegmentChange {
            previous: self.active_segment,
            current,
            virtual_time,
        };
        self.active_segment = current;
        tracing::debug!(previous = ?change.previous, current = ?current, virtual_time, "Active segment changed");
        let faults = self.listeners.segment_change.notify(&change);
        self.record_faults(faults);
    }

    fn emit_state(&mut self, previous: PlaybackState) {
        if previous == self.state {
            return;
        }
        let change = StateChange {
            previous,
            current: self.state,
            virtual_time: self.live_virtual_time(),
        };
        let faults = self.listeners.state.notify(&change);
        self.record_faults(faults);
    }

    fn emit_seek(&mut self, event: SeekEvent) {
        let faults = self.listeners.seek.notify(&event);
        self.record_faults(faults);
    }

    fn emit_time(&mut self, virtual_time: f64) {
        let faults = self.listeners.time_update.notify(&virtual_time);
        self.record_faults(faults);

        if let Some(overlay) = self.overlay_sync.clone() {
            if catch_unwind(AssertUnwindSafe(|| overlay(virtual_time))).is_err() {
                self.counters.subscriber_faults += 1;
                tracing::error!(virtual_time, "Overlay sync callback panicked");
            }
        }
    }

    fn record_faults(&mut self, faults: usize) {
        self.counters.subscriber_faults += faults as u64;
    }
}

fn clamp_time(time: f64, duration: f64) -> f64 {
    if time.is_nan() {
        0.0
    } else {
        time.clamp(0.0, duration.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seek::SeekError;
    use crate::simulated::SimulatedMedia;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use seamcut_core::ManualClock;
    use seamcut_timeline::VirtualSegment;

    fn two_segments() -> VirtualTimeline {
        VirtualTimeline::new(vec![
            VirtualSegment::with_random_id(0.0, 5.0, 0.0, 5.0),
            VirtualSegment::with_random_id(5.0, 10.0, 10.0, 15.0),
        ])
    }

    fn controller() -> (PlayerController<SimulatedMedia>, ManualClock, SimulatedMedia) {
        let clock = ManualClock::new();
        let mut player = PlayerController::with_clock(&Config::default(), Arc::new(clock.clone()));
        player.update_timeline(two_segments());
        let media = SimulatedMedia::new(20.0);
        player.attach_video(media.clone());
        (player, clock, media)
    }

    fn pump(player: &mut PlayerController<SimulatedMedia>, media: &SimulatedMedia) {
        for event in media.take_events() {
            player.handle_media_event(event);
        }
    }

    #[test]
    fn play_requires_media() {
        let mut player: PlayerController<SimulatedMedia> = PlayerController::new(&Config::default());
        assert_eq!(
            player.play(),
            Err(PlayerError::NotAttached { operation: "play" })
        );
        assert_matches!(
            player.seek(1.0),
            Err(PlayerError::NotAttached { operation: "seek" })
        );
    }

    #[test]
    fn virtual_clock_follows_wall_clock_and_rate() {
        let (mut player, clock, _media) = controller();
        player.play().unwrap();
        clock.advance_secs(2.0);
        assert!((player.current_time() - 2.0).abs() < 1e-9);
        player.set_playback_rate(2.0);
        clock.advance_secs(1.0);
        assert!((player.current_time() - 4.0).abs() < 1e-9);
        player.pause();
        clock.advance_secs(5.0);
        assert!((player.current_time() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn seek_clamps_into_range() {
        let (mut player, _clock, _media) = controller();
        let _ = player.seek(-5.0).unwrap();
        assert_eq!(player.current_time(), 0.0);
        let _ = player.seek(100.0).unwrap();
        assert_eq!(player.current_time(), 10.0);
        let _ = player.seek(f64::NAN).unwrap();
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn seek_moves_element_to_mapped_position() {
        let (mut player, _clock, media) = controller();
        let _ = player.seek(7.5).unwrap();
        assert_eq!(media.seek_calls().last().copied(), Some(12.5));
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!(player.active_segment().is_some());
    }

    #[test]
    fn superseded_seeks_are_cancelled() {
        let (mut player, _clock, media) = controller();
        let mut first = player.seek(3.0).unwrap();
        let mut second = player.seek(5.0).unwrap();
        let mut third = player.seek(7.0).unwrap();
        assert_matches!(first.try_result(), Some(Err(SeekError::Cancelled { superseded_by: 2, .. })));
        assert_matches!(second.try_result(), Some(Err(SeekError::Cancelled { superseded_by: 3, .. })));
        assert!(third.try_result().is_none());

        media.advance(0.016);
        media.advance(0.016);
        pump(&mut player, &media);
        let done = third.try_result().unwrap().unwrap();
        assert_eq!(done.virtual_time, 7.0);
        assert_eq!(done.real_time, Some(12.0));
    }

    #[test]
    fn stop_interrupts_pending_seek() {
        let (mut player, _clock, _media) = controller();
        let mut handle = player.seek(7.0).unwrap();
        player.stop();
        assert_matches!(handle.try_result(), Some(Err(SeekError::Interrupted { .. })));
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn element_error_fails_pending_seek() {
        let (mut player, _clock, _media) = controller();
        let mut handle = player.seek(7.0).unwrap();
        player.handle_media_event(MediaEvent::Error("decode".into()));
        let err = handle.try_result().unwrap().unwrap_err();
        assert!(!err.is_cancelled());
    }

    #[test]
    fn timeline_shrink_clamps_virtual_time() {
        let (mut player, _clock, _media) = controller();
        let _ = player.seek(8.0).unwrap();
        player.update_timeline(VirtualTimeline::new(vec![VirtualSegment::with_random_id(
            0.0, 4.0, 0.0, 4.0,
        )]));
        assert_eq!(player.duration(), 4.0);
        assert!(player.current_time() <= 4.0);
    }

    #[test]
    fn paused_update_snaps_uncovered_element_to_first_segment() {
        let (mut player, _clock, media) = controller();
        let _ = player.seek(2.0).unwrap();
        media.advance(0.016);
        media.advance(0.016);
        pump(&mut player, &media);
        player.update_timeline(VirtualTimeline::new(vec![VirtualSegment::with_random_id(
            0.0, 3.0, 10.0, 13.0,
        )]));
        assert_eq!(media.seek_calls().last().copied(), Some(10.0));
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn detach_silences_everything() {
        let (mut player, clock, media) = controller();
        let count = Arc::new(Mutex::new(0usize));
        let c = count.clone();
        let _sub = player.on_time_update(move |_| *c.lock() += 1);
        player.play().unwrap();
        let detached = player.detach_video();
        assert!(detached.is_some());
        let before = *count.lock();

        clock.advance_secs(0.1);
        player.handle_frame(FrameTick::video_frame(0.1, 0.1));
        player.handle_media_event(MediaEvent::Seeked);
        assert_eq!(*count.lock(), before);
        assert!(media.is_paused());
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.clock_source().is_none());
    }

    #[test]
    fn foreign_clock_source_ticks_are_ignored() {
        let (mut player, clock, _media) = controller();
        player.play().unwrap();
        clock.advance_secs(0.02);
        player.handle_frame(FrameTick::animation_frame(0.02));
        assert_eq!(player.counters().foreign_ticks, 1);
        assert_eq!(player.counters().frames_processed, 0);
    }

    #[test]
    fn animation_frames_drive_the_clock_while_element_is_held_paused() {
        let clock = ManualClock::new();
        let mut player = PlayerController::with_clock(&Config::default(), Arc::new(clock.clone()));
        player.update_timeline(VirtualTimeline::new(vec![
            VirtualSegment::with_random_id(0.0, 1.0, 0.0, 1.0),
            VirtualSegment::with_random_id(2.0, 3.0, 4.0, 5.0),
        ]));
        let media = SimulatedMedia::new(10.0).with_seek_latency(0);
        player.attach_video(media.clone());
        player.play().unwrap();

        clock.advance_secs(1.5);
        player.handle_frame(FrameTick::video_frame(1.5, 1.5));
        assert!(media.is_paused());
        assert!(player.active_segment().is_none());

        // No presented frames while paused; only the animation loop ticks.
        clock.advance_secs(0.6);
        player.handle_frame(FrameTick::animation_frame(2.1));
        pump(&mut player, &media);
        let counters = player.counters();
        assert_eq!(counters.foreign_ticks, 0);
        assert_eq!(counters.frames_processed, 2);
        assert!(player.active_segment().is_some());
        assert!(!media.is_paused());
        assert!((media.current_time() - 4.1).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_animation_frames() {
        let mut player: PlayerController<SimulatedMedia> = PlayerController::new(&Config::default());
        player.attach_video(SimulatedMedia::new(5.0).without_video_frame_callbacks());
        assert_eq!(player.clock_source(), Some(ClockSource::AnimationFrame));
    }

    #[test]
    fn frames_are_throttled() {
        let (mut player, clock, _media) = controller();
        player.play().unwrap();
        clock.advance(Duration::from_millis(16));
        player.handle_frame(FrameTick::video_frame(0.016, 0.016));
        clock.advance(Duration::from_millis(5));
        player.handle_frame(FrameTick::video_frame(0.021, 0.021));
        let counters = player.counters();
        assert_eq!(counters.frames_processed, 1);
        assert_eq!(counters.frames_throttled, 1);
    }

    #[test]
    fn overlay_sync_receives_seek_time() {
        let (mut player, _clock, _media) = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        player.set_overlay_sync(move |t| s.lock().push(t));
        let _ = player.seek(6.0).unwrap();
        player.clear_overlay_sync();
        let _ = player.seek(7.0).unwrap();
        assert_eq!(*seen.lock(), vec![6.0]);
    }

    #[test]
    fn panicking_subscriber_is_counted() {
        let (mut player, _clock, _media) = controller();
        let _bad = player.on_seek(|_| panic!("boom"));
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        let _good = player.on_seek(move |_| *h.lock() += 1);
        let _ = player.seek(1.0).unwrap();
        assert_eq!(*hits.lock(), 1);
        assert_eq!(player.counters().subscriber_faults, 1);
    }

    #[test]
    fn external_pause_is_adopted() {
        let (mut player, clock, media) = controller();
        player.play().unwrap();
        pump(&mut player, &media);
        clock.advance_secs(1.0);
        media.user_pause();
        pump(&mut player, &media);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!((player.current_time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn native_seek_resyncs_virtual_time() {
        let (mut player, _clock, media) = controller();
        media.user_seek(12.0);
        media.advance(0.016);
        media.advance(0.016);
        pump(&mut player, &media);
        assert!((player.current_time() - 7.0).abs() < 1e-9);
        assert_eq!(player.counters().native_seeks, 1);
    }

    #[test]
    fn native_seek_into_cut_snaps_forward() {
        let (mut player, _clock, media) = controller();
        media.user_seek(7.0);
        media.advance(0.016);
        media.advance(0.016);
        pump(&mut player, &media);
        assert_eq!(player.current_time(), 5.0);
        assert_eq!(media.seek_calls().last().copied(), Some(10.0));
    }

    #[test]
    fn debug_info_reports_subscribers() {
        let (player, _clock, _media) = controller();
        let _a = player.on_frame(|_| {});
        let _b = player.on_complete(|_| {});
        let info = player.debug_info();
        assert!(info.attached);
        assert_eq!(info.duration, 10.0);
        assert_eq!(info.subscribers.frame, 1);
        assert_eq!(info.subscribers.complete, 1);
        assert!(!info.subscribers.overlay_sync);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["state"], "idle");
    }
}
