//! Event stitching: merging temporally-adjacent same-kind events.
//!
//! A defect crossing a sampling or segment boundary is typically detected
//! twice, as two fragments. Stitching merges consecutive same-kind events
//! whose gap is within a tolerance, so the aggregate timeline carries one
//! contiguous event per defect. Stitching an already-stitched list is a
//! no-op.

use crate::report::Event;

/// Default merge tolerance in seconds.
pub const DEFAULT_TOLERANCE_SEC: f64 = 0.1;

/// Merge adjacent same-kind events.
///
/// Sorts by `(kind, start_time)`, merges consecutive pairs of the same
/// kind when `next.start_time <= current.end_time + tolerance` (extending
/// the end and appending non-duplicate details), then re-sorts the result
/// by `start_time`.
#[must_use]
pub fn stitch_events(events: Vec<Event>, tolerance: f64) -> Vec<Event> {
    if events.is_empty() {
        return events;
    }

    let mut sorted = events;
    sorted.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then(a.start_time.total_cmp(&b.start_time))
    });

    let mut stitched: Vec<Event> = Vec::with_capacity(sorted.len());
    for event in sorted {
        match stitched.last_mut() {
            Some(current)
                if current.kind == event.kind
                    && event.start_time <= current.end_time + tolerance =>
            {
                current.end_time = current.end_time.max(event.end_time);
                if !event.details.is_empty() && !current.details.contains(&event.details) {
                    if !current.details.is_empty() {
                        current.details.push_str("; ");
                    }
                    current.details.push_str(&event.details);
                }
            }
            _ => stitched.push(event),
        }
    }

    stitched.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    stitched
}
