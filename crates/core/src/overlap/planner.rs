//! Pure deletion planning over a sorted event window.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::event::Event;

use super::OverlapConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeletionReason {
    TooLong { duration_secs: f64 },
    Overlap { kept: String, percent: u32 },
}

impl DeletionReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TooLong { .. } => "too_long",
            Self::Overlap { .. } => "overlap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedDeletion {
    pub event_id: String,
    pub start_time: f64,
    #[serde(flatten)]
    pub reason: DeletionReason,
}

/// Percentage of `current` covered by `previous`, if `current` starts inside
/// `previous`'s window.
///
/// A zero-length `current` that starts inside the window is fully covered.
pub fn overlap_percent(previous: &Event, current: &Event) -> Option<u32> {
    if current.start_time < previous.start_time || current.start_time > previous.end() {
        return None;
    }
    let overlap = previous.end() - current.start_time;
    let duration = current.duration();
    if duration <= 0.0 {
        return Some(100);
    }
    Some((overlap / duration * 100.0).round() as u32)
}

/// Decide which events in `events` should be removed from the source.
///
/// `events` must be sorted ascending by start time. Too-long events are
/// queued first, then the shorter member of each heavily overlapping
/// adjacent pair; on equal durations the earlier event is kept. Each event
/// appears at most once.
pub fn plan_deletions(events: &[Event], config: &OverlapConfig) -> Vec<PlannedDeletion> {
    let mut queued = HashSet::new();
    let mut plan = Vec::new();

    for event in events {
        let duration = event.duration();
        if duration >= config.max_duration_secs && queued.insert(event.id.as_str()) {
            info!(event_id = %event.id, duration_secs = duration, "Event too long");
            plan.push(PlannedDeletion {
                event_id: event.id.clone(),
                start_time: event.start_time,
                reason: DeletionReason::TooLong {
                    duration_secs: duration,
                },
            });
        }
    }

    for pair in events.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let Some(percent) = overlap_percent(previous, current) else {
            continue;
        };
        info!(
            previous = %previous.id,
            current = %current.id,
            percent,
            previous_secs = previous.duration(),
            current_secs = current.duration(),
            "Events overlap"
        );
        if percent < config.max_overlap_percent {
            continue;
        }

        let (delete, keep) = if previous.duration() < current.duration() {
            (previous, current)
        } else {
            (current, previous)
        };
        if queued.insert(delete.id.as_str()) {
            plan.push(PlannedDeletion {
                event_id: delete.id.clone(),
                start_time: delete.start_time,
                reason: DeletionReason::Overlap {
                    kept: keep.id.clone(),
                    percent,
                },
            });
        }
    }

    plan
}
