//! Runs a small job tree and renders it with [`TextPresenter`].
//!
//! ```text
//! cargo run --example progress_report
//! ```

use std::io::stdout;
use std::time::Duration;

use weir::{
    formatter, job_fn, job_fn_ctx, run, Event, JobRef, Sequence,
    TextPresenter,
};

fn step(name: &'static str, delay_ms: u64) -> JobRef {
    job_fn_ctx(move |ctx| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        ctx.progress(name).await;
        Ok(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let compile = Sequence::new([
        step("parse", 30),
        step("typecheck", 50),
        step("codegen", 40),
    ])
    .into_job();
    let link = step("link", 20);
    let test = job_fn(|| async { anyhow::bail!("tests failed") });

    let labels = [
        (compile.clone(), "compile"),
        (link.clone(), "link"),
        (test.clone(), "test"),
    ];
    let label = formatter(move |event: &Event| {
        labels
            .iter()
            .find(|(job, _)| job == event.job())
            .map(|(_, name)| name.to_string())
            .unwrap_or_default()
    });

    let presenter = TextPresenter::new(
        Sequence::new([compile, link, test]).into_job(),
        stdout(),
        label,
    );
    if let Err(err) = run([presenter.into_job()]).wait().await {
        eprintln!("pipeline failed: {err}");
    }
    Ok(())
}
