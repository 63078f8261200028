//! Scripted playback sessions on the simulated media element.
//!
//! Used by `seamcut simulate` to show how the player would drive a real
//! element through an edit: which segments it visits, where it repositions
//! the element, which seeks win and when playback completes.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use seamcut_core::{Clock, Config, ManualClock, SegmentId};
use seamcut_player::{
    PlaybackState, PlayerDebugInfo, SeekError, SeekHandle, SeekPhase, SimulationDriver,
};
use seamcut_timeline::{CompletionReason, VirtualTimeline};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::edit::source_extent;
use crate::inspect::format_time;

/// A seek issued once the session has run for `at` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSeek {
    pub at: f64,
    pub target: f64,
}

impl FromStr for ScheduledSeek {
    type Err = String;

    /// `TARGET` (issued immediately) or `AT:TARGET`, both in seconds.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid time '{v}': {e}"))
        };
        match s.split_once(':') {
            Some((at, target)) => Ok(Self {
                at: parse(at)?.max(0.0),
                target: parse(target)?,
            }),
            None => Ok(Self {
                at: 0.0,
                target: parse(s)?,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulationPlan {
    pub seeks: Vec<ScheduledSeek>,
    pub rate: Option<f64>,
    /// Stop after this many seconds even if playback has not completed.
    pub max_duration: Option<f64>,
    /// Length of the simulated source; defaults to just past the furthest
    /// segment end.
    pub source_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SeekOutcome {
    Settled { virtual_time: f64 },
    Cancelled { superseded_by: u64 },
    Failed { reason: String },
    Interrupted,
    Pending,
}

impl From<Result<seamcut_player::SeekCompletion, SeekError>> for SeekOutcome {
    fn from(result: Result<seamcut_player::SeekCompletion, SeekError>) -> Self {
        match result {
            Ok(done) => SeekOutcome::Settled {
                virtual_time: done.virtual_time,
            },
            Err(SeekError::Cancelled { superseded_by, .. }) => {
                SeekOutcome::Cancelled { superseded_by }
            }
            Err(SeekError::Failed { reason, .. }) => SeekOutcome::Failed { reason },
            Err(SeekError::Interrupted { .. }) => SeekOutcome::Interrupted,
        }
    }
}

/// Something observable that happened during the session. `at` is seconds
/// since the session started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    State {
        at: f64,
        previous: PlaybackState,
        current: PlaybackState,
        virtual_time: f64,
    },
    Seek {
        at: f64,
        generation: Option<u64>,
        phase: SeekPhase,
        virtual_time: f64,
        real_time: Option<f64>,
    },
    SeekResult {
        at: f64,
        generation: u64,
        #[serde(flatten)]
        outcome: SeekOutcome,
    },
    Segment {
        at: f64,
        previous: Option<SegmentId>,
        current: Option<SegmentId>,
        virtual_time: f64,
    },
    Complete {
        at: f64,
        reason: CompletionReason,
        virtual_time: f64,
    },
}

impl SessionEvent {
    pub fn at(&self) -> f64 {
        match self {
            SessionEvent::State { at, .. }
            | SessionEvent::Seek { at, .. }
            | SessionEvent::SeekResult { at, .. }
            | SessionEvent::Segment { at, .. }
            | SessionEvent::Complete { at, .. } => *at,
        }
    }

    /// One line for terminal output.
    pub fn describe(&self) -> String {
        let body = match self {
            SessionEvent::State {
                previous,
                current,
                virtual_time,
                ..
            } => format!("state    {previous} -> {current} at {}", format_time(*virtual_time)),
            SessionEvent::Seek {
                generation,
                phase,
                virtual_time,
                real_time,
                ..
            } => {
                let generation = generation.map_or_else(|| "native".to_string(), |g| format!("#{g}"));
                let real = real_time.map_or_else(|| "-".to_string(), format_time);
                format!(
                    "seek     {generation} {phase:?} virtual {} real {real}",
                    format_time(*virtual_time)
                )
            }
            SessionEvent::SeekResult {
                generation, outcome, ..
            } => match outcome {
                SeekOutcome::Settled { virtual_time } => {
                    format!("result   #{generation} settled at {}", format_time(*virtual_time))
                }
                SeekOutcome::Cancelled { superseded_by } => {
                    format!("result   #{generation} cancelled by #{superseded_by}")
                }
                SeekOutcome::Failed { reason } => format!("result   #{generation} failed: {reason}"),
                SeekOutcome::Interrupted => format!("result   #{generation} interrupted"),
                SeekOutcome::Pending => format!("result   #{generation} still pending"),
            },
            SessionEvent::Segment {
                current,
                virtual_time,
                ..
            } => match current {
                Some(id) => format!("segment  enter {id} at {}", format_time(*virtual_time)),
                None => format!("segment  gap at {}", format_time(*virtual_time)),
            },
            SessionEvent::Complete {
                reason,
                virtual_time,
                ..
            } => format!("complete {reason:?} at {}", format_time(*virtual_time)),
        };
        format!("[{}] {}", format_time(self.at()), body)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub frames: u64,
    /// Simulated wall-clock seconds.
    pub elapsed: f64,
    pub duration: f64,
    pub final_virtual_time: f64,
    pub completed: bool,
    pub events: Vec<SessionEvent>,
    pub debug: PlayerDebugInfo,
}

/// Play `timeline` from the start on a simulated element, issuing the
/// plan's seeks on schedule, until playback completes or the time limit.
pub fn run_simulation(
    config: &Config,
    timeline: VirtualTimeline,
    plan: &SimulationPlan,
) -> Result<SimulationReport> {
    let duration = timeline.duration();
    let source_duration = plan
        .source_duration
        .unwrap_or_else(|| source_extent(&timeline) + 1.0);
    let mut driver = SimulationDriver::new(config, timeline, source_duration);
    let events = record_events(&driver);

    if let Some(rate) = plan.rate {
        let applied = driver.controller_mut().set_playback_rate(rate);
        tracing::debug!(requested = rate, applied, "Simulation playback rate");
    }
    let rate = driver.controller().playback_rate();

    let mut seeks = plan.seeks.clone();
    seeks.sort_by(|a, b| a.at.total_cmp(&b.at));
    let last_seek = seeks.last().map_or(0.0, |s| s.at);
    let limit = plan
        .max_duration
        .filter(|d| d.is_finite())
        .unwrap_or(last_seek + 2.0 * duration / rate + 1.0);

    let clock = driver.clock().clone();
    driver
        .controller_mut()
        .play()
        .context("Failed to start simulated playback")?;

    let mut next_seek = 0;
    let mut handles: Vec<SeekHandle> = Vec::new();
    loop {
        let now = clock.now().as_secs_f64();
        while next_seek < seeks.len() && seeks[next_seek].at <= now {
            let handle = driver
                .controller_mut()
                .seek(seeks[next_seek].target)
                .context("Failed to issue seek")?;
            handles.push(handle);
            next_seek += 1;
        }
        collect_seek_results(&mut handles, &events, now);

        let completed = driver.controller().counters().completions > 0;
        if now >= limit || (completed && next_seek == seeks.len()) {
            break;
        }
        if completed && driver.controller().state() == PlaybackState::Paused {
            // Jump straight to the next scheduled seek.
            let target = seeks[next_seek].at;
            clock.set(std::time::Duration::from_secs_f64(target));
            continue;
        }
        driver.step();
    }

    let elapsed = clock.now().as_secs_f64();
    collect_seek_results(&mut handles, &events, elapsed);
    {
        let mut log = events.lock();
        for handle in &handles {
            log.push(SessionEvent::SeekResult {
                at: elapsed,
                generation: handle.generation(),
                outcome: SeekOutcome::Pending,
            });
        }
    }

    let controller = driver.controller();
    let events = std::mem::take(&mut *events.lock());
    Ok(SimulationReport {
        frames: driver.frames(),
        elapsed,
        duration,
        final_virtual_time: controller.current_time(),
        completed: controller.counters().completions > 0,
        events,
        debug: controller.debug_info(),
    })
}

fn collect_seek_results(
    handles: &mut Vec<SeekHandle>,
    events: &Mutex<Vec<SessionEvent>>,
    at: f64,
) {
    handles.retain_mut(|handle| match handle.try_result() {
        Some(result) => {
            events.lock().push(SessionEvent::SeekResult {
                at,
                generation: handle.generation(),
                outcome: result.into(),
            });
            false
        }
        None => true,
    });
}

fn record_events(driver: &SimulationDriver) -> Arc<Mutex<Vec<SessionEvent>>> {
    let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::default();
    let controller = driver.controller();
    let clock: ManualClock = driver.clock().clone();

    let (log, c) = (events.clone(), clock.clone());
    controller.on_state_change(move |s| {
        log.lock().push(SessionEvent::State {
            at: c.now().as_secs_f64(),
            previous: s.previous,
            current: s.current,
            virtual_time: s.virtual_time,
        })
    });
    let (log, c) = (events.clone(), clock.clone());
    controller.on_seek(move |s| {
        log.lock().push(SessionEvent::Seek {
            at: c.now().as_secs_f64(),
            generation: s.generation,
            phase: s.phase,
            virtual_time: s.virtual_time,
            real_time: s.real_time,
        })
    });
    let (log, c) = (events.clone(), clock.clone());
    controller.on_segment_change(move |s| {
        log.lock().push(SessionEvent::Segment {
            at: c.now().as_secs_f64(),
            previous: s.previous,
            current: s.current,
            virtual_time: s.virtual_time,
        })
    });
    let (log, c) = (events.clone(), clock);
    controller.on_complete(move |done| {
        log.lock().push(SessionEvent::Complete {
            at: c.now().as_secs_f64(),
            reason: done.reason,
            virtual_time: done.virtual_time,
        })
    });
    events
}
