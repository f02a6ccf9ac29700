//! Engine integration tests: event ordering, strategy selection,
//! halt-on-error, cancellation, and stream aggregation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{Barrier, Notify};
use weir::{
    job_fn, job_fn_ctx, parallel, run, run_with_token, CancelToken,
    Cancelled, Event, JobRef, Sequence,
};
use weir_testkit::{drain, events_for, FailingJob, NamedJob};

fn kind(event: &Event) -> &'static str {
    match event {
        Event::Queued { .. } => "queued",
        Event::Started { .. } => "started",
        Event::Progressed { .. } => "progressed",
        Event::Finished { .. } => "finished",
    }
}

fn kinds(events: &[&Event]) -> Vec<&'static str> {
    events.iter().map(|event| kind(event)).collect()
}

#[tokio::test]
async fn test_parallel_emits_grouped_events() {
    // All three jobs hold at a barrier, so every Started precedes every
    // Finished, and every Queued precedes every Started by construction.
    let barrier = Arc::new(Barrier::new(3));
    let jobs: Vec<JobRef> = (0..3)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            job_fn(move || {
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    Err(anyhow!("derp"))
                }
            })
        })
        .collect();

    let events = drain(parallel(jobs.len(), jobs.clone())).await;
    assert_eq!(events.len(), jobs.len() * 3);

    for (i, job) in jobs.iter().enumerate() {
        match &events[i] {
            Event::Queued { job: queued, parent } => {
                assert_eq!(queued, job, "queued events keep list order");
                assert!(parent.is_none(), "root-level jobs have no parent");
            }
            other => panic!("event {i} should be Queued, got {other:?}"),
        }
    }
    for event in &events[jobs.len()..jobs.len() * 2] {
        assert!(matches!(event, Event::Started { .. }));
    }
    for event in &events[jobs.len() * 2..] {
        match event {
            Event::Finished { error, .. } => {
                let message =
                    error.as_ref().map(ToString::to_string);
                assert_eq!(message.as_deref(), Some("derp"));
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    // Each job still observes its own strict lifecycle order.
    for job in &jobs {
        assert_eq!(
            kinds(&events_for(&events, job)),
            ["queued", "started", "finished"]
        );
    }
}

#[tokio::test]
async fn test_series_preserves_full_temporal_order() {
    let a = NamedJob::leaf("a");
    let b = NamedJob::leaf("b");
    let c = NamedJob::leaf("c");

    let events = drain(run([a.clone(), b.clone(), c.clone()])).await;

    let expected: Vec<(&str, &JobRef)> = vec![
        ("queued", &a),
        ("queued", &b),
        ("queued", &c),
        ("started", &a),
        ("finished", &a),
        ("started", &b),
        ("finished", &b),
        ("started", &c),
        ("finished", &c),
    ];
    assert_eq!(events.len(), expected.len());
    for (event, (kind_name, job)) in events.iter().zip(expected) {
        assert_eq!(kind(event), kind_name);
        assert_eq!(event.job(), job);
    }
}

#[tokio::test]
async fn test_series_halts_on_error_leaving_later_jobs_queued() {
    let a = NamedJob::leaf("a");
    let b = FailingJob::new("b", "boom");
    let c = NamedJob::leaf("c");

    let events = drain(run([a.clone(), b.clone(), c.clone()])).await;

    assert_eq!(kinds(&events_for(&events, &a)), ["queued", "started", "finished"]);
    assert_eq!(kinds(&events_for(&events, &b)), ["queued", "started", "finished"]);
    assert_eq!(kinds(&events_for(&events, &c)), ["queued"]);
}

#[tokio::test]
async fn test_bounded_pool_finishes_everything_within_its_width() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let jobs: Vec<JobRef> = (0..5)
        .map(|_| {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            job_fn(move || {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        })
        .collect();

    let events = drain(parallel(2, jobs.clone())).await;

    assert!(
        events[..jobs.len()]
            .iter()
            .all(|event| matches!(event, Event::Queued { .. })),
        "all queued events precede all started events"
    );
    let finished = events
        .iter()
        .filter(|event| matches!(event, Event::Finished { .. }))
        .count();
    assert_eq!(finished, jobs.len());
    assert!(
        peak.load(Ordering::SeqCst) <= 2,
        "no more than two workers run at once"
    );
}

#[tokio::test]
async fn test_parallel_of_one_is_an_ordered_series_without_halt() {
    let a = FailingJob::new("a", "first");
    let b = NamedJob::leaf("b");
    let c = FailingJob::new("c", "last");

    let events = drain(parallel(1, vec![a.clone(), b.clone(), c.clone()])).await;

    // Unlike run(), the failure of `a` does not stop `b` and `c`.
    for job in [&a, &b, &c] {
        assert_eq!(
            kinds(&events_for(&events, job)),
            ["queued", "started", "finished"]
        );
    }
}

#[tokio::test]
async fn test_wait_returns_the_last_failure_observed() {
    let jobs: Vec<JobRef> = vec![
        FailingJob::new("a", "first"),
        NamedJob::leaf("b"),
        FailingJob::new("c", "last"),
    ];
    let err = parallel(1, jobs).wait().await.unwrap_err();
    assert_eq!(err.to_string(), "last");
}

#[tokio::test]
async fn test_wait_returns_ok_when_every_job_succeeds() {
    let jobs: Vec<JobRef> =
        (0..4).map(|_| job_fn(|| async { Ok(()) })).collect();
    assert!(parallel(2, jobs).wait().await.is_ok());
}

#[tokio::test]
async fn test_wait_is_last_write_wins_under_concurrency() {
    // With concurrent jobs, completion order is nondeterministic, so wait()
    // may report any of the failures; it only guarantees the temporally
    // last one wins. Callers needing first-error semantics must walk the
    // Finished events themselves.
    let jobs: Vec<JobRef> = vec![
        FailingJob::new("a", "a failed"),
        FailingJob::new("b", "b failed"),
        FailingJob::new("c", "c failed"),
    ];
    let err = parallel(3, jobs).wait().await.unwrap_err();
    let message = err.to_string();
    assert!(
        ["a failed", "b failed", "c failed"].contains(&message.as_str()),
        "unexpected aggregate error: {message}"
    );
}

#[tokio::test]
async fn test_cancel_mid_series_lets_the_running_job_finish() {
    let token = CancelToken::new();
    let release = Arc::new(Notify::new());
    let first = {
        let release = Arc::clone(&release);
        job_fn(move || {
            let release = Arc::clone(&release);
            async move {
                release.notified().await;
                Ok(())
            }
        })
    };
    let second = NamedJob::leaf("second");
    let third = NamedJob::leaf("third");

    let mut events = run_with_token(
        token.clone(),
        [first.clone(), second.clone(), third.clone()],
    );
    let mut seen = Vec::new();
    while let Some(event) = events.next().await {
        if matches!(&event, Event::Started { job } if *job == first) {
            // Cancel while the first job is in flight, then let it finish.
            token.cancel();
            release.notify_one();
        }
        seen.push(event);
    }

    assert_eq!(
        kinds(&events_for(&seen, &first)),
        ["queued", "started", "finished"]
    );
    match events_for(&seen, &first).last() {
        Some(Event::Finished { error, .. }) => {
            assert!(error.is_none(), "an in-flight job is never interrupted")
        }
        other => panic!("expected Finished, got {other:?}"),
    }
    assert_eq!(kinds(&events_for(&seen, &second)), ["queued"]);
    assert_eq!(kinds(&events_for(&seen, &third)), ["queued"]);
}

#[tokio::test]
async fn test_cancelled_token_skips_every_job() {
    let token = CancelToken::new();
    token.cancel();
    let jobs: Vec<JobRef> =
        vec![NamedJob::leaf("a"), NamedJob::leaf("b")];

    let events = drain(run_with_token(token, jobs)).await;
    assert_eq!(kinds(&events.iter().collect::<Vec<_>>()), ["queued", "queued"]);
}

#[tokio::test]
async fn test_cancellation_halts_nested_sequences_uniformly() {
    let token = CancelToken::new();
    let release = Arc::new(Notify::new());
    let a = {
        let release = Arc::clone(&release);
        job_fn(move || {
            let release = Arc::clone(&release);
            async move {
                release.notified().await;
                Ok(())
            }
        })
    };
    let b = NamedJob::leaf("b");
    let inner = Sequence::new([a.clone(), b.clone()]).into_job();
    let c = NamedJob::leaf("c");
    let outer = Sequence::new([inner.clone(), c.clone()]).into_job();

    let mut events = run_with_token(token.clone(), [outer.clone()]);
    let mut seen = Vec::new();
    while let Some(event) = events.next().await {
        if matches!(&event, Event::Started { job } if *job == a) {
            token.cancel();
            release.notify_one();
        }
        seen.push(event);
    }

    // The same per-step token check applies at every nesting level: the
    // in-flight job finishes, and nothing queued after it starts.
    assert_eq!(kinds(&events_for(&seen, &a)), ["queued", "started", "finished"]);
    assert_eq!(kinds(&events_for(&seen, &b)), ["queued"]);
    assert_eq!(kinds(&events_for(&seen, &c)), ["queued"]);

    // The inner sequence reports the cancellation as its own result.
    match events_for(&seen, &inner).last() {
        Some(Event::Finished { error: Some(error), .. }) => {
            assert!(
                error.downcast_ref::<Cancelled>().is_some(),
                "inner sequence should surface Cancelled, got: {error}"
            );
        }
        other => panic!("expected a failed Finished, got {other:?}"),
    }
    match events_for(&seen, &outer).last() {
        Some(Event::Finished { error: Some(error), .. }) => {
            assert_eq!(error.to_string(), "job run cancelled");
        }
        other => panic!("expected a failed Finished, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sub_run_events_are_copied_to_both_streams() {
    let c1 = NamedJob::leaf("c1");
    let c2 = NamedJob::leaf("c2");
    let child_events = Arc::new(AtomicUsize::new(0));
    let parent = {
        let c1 = c1.clone();
        let c2 = c2.clone();
        let child_events = Arc::clone(&child_events);
        job_fn_ctx(move |ctx| {
            let c1 = c1.clone();
            let c2 = c2.clone();
            let child_events = Arc::clone(&child_events);
            async move {
                let mut events = ctx.run([c1, c2]);
                while events.next().await.is_some() {
                    child_events.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        })
    };

    let events = drain(run([parent.clone()])).await;

    // The parent saw its sub-run's six events on its local stream...
    assert_eq!(child_events.load(Ordering::SeqCst), 6);
    // ...and the root observed the same six, strictly between the parent's
    // Started and Finished.
    assert_eq!(
        kinds(&events.iter().collect::<Vec<_>>()),
        [
            "queued", "started", "queued", "queued", "started", "finished",
            "started", "finished", "finished",
        ]
    );
    assert_eq!(events[0].job(), &parent);
    assert_eq!(events[1].job(), &parent);
    assert_eq!(events[8].job(), &parent);
    for event in &events[2..8] {
        assert_ne!(event.job(), &parent);
    }
    match &events[2] {
        Event::Queued { parent: queued_by, .. } => {
            assert_eq!(queued_by.as_ref(), Some(&parent));
        }
        other => panic!("expected Queued, got {other:?}"),
    }
}

#[tokio::test]
async fn test_progress_events_carry_their_payload() {
    let job = job_fn_ctx(|ctx| async move {
        ctx.progress("halfway").await;
        Ok(())
    });

    let events = drain(run([job.clone()])).await;
    assert_eq!(
        kinds(&events.iter().collect::<Vec<_>>()),
        ["queued", "started", "progressed", "finished"]
    );
    assert_eq!(events[2].progress_payload::<&str>(), Some(&"halfway"));
}

#[tokio::test]
async fn test_sequence_aggregates_like_a_halting_series() {
    let a = NamedJob::leaf("a");
    let b = FailingJob::new("b", "boom");
    let c = NamedJob::leaf("c");
    let sequence = Sequence::new([a.clone(), b.clone(), c.clone()]).into_job();

    let events = drain(run([sequence.clone()])).await;

    assert_eq!(kinds(&events_for(&events, &c)), ["queued"]);
    match events_for(&events, &sequence).last() {
        Some(Event::Finished { error: Some(error), .. }) => {
            assert_eq!(error.to_string(), "boom");
        }
        other => panic!("expected a failed Finished, got {other:?}"),
    }
}
