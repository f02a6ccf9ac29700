use weir::{Event, Events, JobRef};

/// Drain a stream into a vector, preserving arrival order.
pub async fn drain(mut events: Events) -> Vec<Event> {
    let mut out = Vec::new();
    while let Some(event) = events.next().await {
        out.push(event);
    }
    out
}

/// The subsequence of events that occurred for the given job.
pub fn events_for<'a>(events: &'a [Event], job: &JobRef) -> Vec<&'a Event> {
    events.iter().filter(|event| event.job() == job).collect()
}
