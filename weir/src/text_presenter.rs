use std::collections::HashSet;
use std::io::Write;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::JobError;
use crate::event::Event;
use crate::format::Formatter;
use crate::job::{Job, JobId, JobRef};
use crate::style;

/// Rendering options for [`TextPresenter`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextPresenterConfig {
    /// When true, jobs that were queued but never started are included in
    /// the output after the run ends.
    pub show_skipped: bool,
    /// Appended to lines of jobs that succeed.
    pub suffix_ok: String,
    /// Appended to lines of jobs that fail.
    pub suffix_fail: String,
    /// Appended to lines of jobs that are queued but do not run.
    pub suffix_skipped: String,
    /// Prepended once per ancestor level to lines of sub-jobs.
    pub indent: String,
}

impl TextPresenterConfig {
    /// Set whether skipped jobs are rendered.
    pub fn with_show_skipped(mut self, show_skipped: bool) -> Self {
        self.show_skipped = show_skipped;
        self
    }

    /// Set the success suffix.
    pub fn with_suffix_ok(mut self, suffix: impl Into<String>) -> Self {
        self.suffix_ok = suffix.into();
        self
    }

    /// Set the failure suffix.
    pub fn with_suffix_fail(mut self, suffix: impl Into<String>) -> Self {
        self.suffix_fail = suffix.into();
        self
    }

    /// Set the skipped suffix.
    pub fn with_suffix_skipped(mut self, suffix: impl Into<String>) -> Self {
        self.suffix_skipped = suffix.into();
        self
    }

    /// Set the indent token.
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }
}

impl Default for TextPresenterConfig {
    fn default() -> Self {
        Self {
            show_skipped: true,
            suffix_ok: "  ok".to_string(),
            suffix_fail: "  FAIL".to_string(),
            suffix_skipped: "  -".to_string(),
            indent: "  ".to_string(),
        }
    }
}

/// Wraps a job and writes a human-readable, indented, column-aligned report
/// of its descendants as they start and finish.
///
/// The presenter is itself a [`Job`]: running it runs the wrapped job and
/// drains its event stream. Labels come from the formatter; an event whose
/// formatted text is empty produces no output and is excluded from layout
/// bookkeeping. Within each depth level, labels are padded to the widest
/// sibling, which is possible because every job in a run is queued before
/// any of them starts.
///
/// The presenter's own result is the last failure it observed, mirroring
/// [`Events::wait`](crate::Events::wait).
pub struct TextPresenter {
    config: TextPresenterConfig,
    job: JobRef,
    writer: Mutex<Box<dyn Write + Send>>,
    formatter: Formatter,
}

impl TextPresenter {
    /// Create a presenter over `job`, writing lines to `writer` with labels
    /// from `formatter`.
    pub fn new(
        job: JobRef,
        writer: impl Write + Send + 'static,
        formatter: Formatter,
    ) -> Self {
        Self {
            config: TextPresenterConfig::default(),
            job,
            writer: Mutex::new(Box::new(writer)),
            formatter,
        }
    }

    /// Replace the rendering options.
    pub fn with_config(mut self, config: TextPresenterConfig) -> Self {
        self.config = config;
        self
    }

    /// Wrap the presenter as a job handle.
    pub fn into_job(self) -> JobRef {
        JobRef::new(self)
    }

    fn write(&self, text: &str) {
        let _ = self.writer.lock().write_all(text.as_bytes());
    }
}

#[async_trait]
impl Job for TextPresenter {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let mut layout = Layout::new();
        let mut failure: Option<JobError> = None;
        let mut events = ctx.run([self.job.clone()]);
        while let Some(event) = events.next().await {
            let text = (self.formatter)(&event);
            if text.is_empty() {
                continue;
            }
            match &event {
                Event::Queued { .. } => {
                    if layout.running.take().is_some() {
                        // The job mid-line has begun spawning children: end
                        // its line and open a deeper column.
                        self.write("\n");
                        layout.widths.push(0);
                    }
                    if let Some(width) = layout.widths.last_mut() {
                        *width = (*width).max(style::visible_len(&text));
                    }
                    layout.queued.push(event.clone());
                }
                Event::Started { job } => {
                    layout.running = Some(job.id());
                    layout.started.insert(job.id());
                    let mut line = String::new();
                    for _ in 0..layout.indent_count() {
                        line.push_str(&self.config.indent);
                    }
                    line.push_str(&layout.justify(&text));
                    self.write(&line);
                }
                Event::Finished { job, error } => {
                    if layout.running == Some(job.id()) {
                        match error {
                            None => {
                                self.write(&self.config.suffix_ok);
                                self.write("\n");
                            }
                            Some(error) => {
                                failure = Some(error.clone());
                                self.write(&self.config.suffix_fail);
                                self.write("\n");
                            }
                        }
                    } else {
                        // A child run just ended; the parent resumes the
                        // enclosing line's depth.
                        layout.widths.pop();
                    }
                    layout.running = None;
                }
                Event::Progressed { .. } => {}
            }
        }
        if self.config.show_skipped {
            for event in &layout.queued {
                if layout.started.contains(&event.job().id()) {
                    continue;
                }
                let text = (self.formatter)(event);
                if text.is_empty() {
                    continue;
                }
                self.write(&layout.justify(&text));
                self.write(&self.config.suffix_skipped);
                self.write("\n");
            }
        }
        match failure {
            Some(error) => Err(error.into_anyhow()),
            None => Ok(()),
        }
    }
}

/// Per-run layout state: one column-width tracker per depth, the job
/// currently writing a line, and the record needed to report skipped jobs.
struct Layout {
    widths: Vec<usize>,
    running: Option<JobId>,
    queued: Vec<Event>,
    started: HashSet<JobId>,
}

impl Layout {
    fn new() -> Self {
        Self {
            widths: vec![0],
            running: None,
            queued: Vec::new(),
            started: HashSet::new(),
        }
    }

    fn indent_count(&self) -> usize {
        let depth = self.widths.len().saturating_sub(1);
        self.widths[..depth].iter().filter(|width| **width != 0).count()
    }

    fn justify(&self, text: &str) -> String {
        style::pad_right(text, self.widths.last().copied().unwrap_or(0))
    }
}
