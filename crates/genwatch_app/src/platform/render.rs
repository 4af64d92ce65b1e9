use std::io::{self, Write};

use chrono::{DateTime, Utc};
use genwatch_core::{PreviewDigest, ProgressView};

const BAR_WIDTH: usize = 30;

/// Line-oriented terminal output for a followed job.
///
/// Each call to [`TerminalRenderer::render`] prints only what changed since
/// the previous one: new log lines, the progress line and a fresh preview.
pub struct TerminalRenderer<W: Write> {
    out: W,
    job_id: Option<String>,
    printed_events: u64,
    last_status_line: Option<String>,
    last_preview: Option<PreviewDigest>,
    last_error: Option<String>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            job_id: None,
            printed_events: 0,
            last_status_line: None,
            last_preview: None,
            last_error: None,
        }
    }

    pub fn render(&mut self, view: &ProgressView) -> io::Result<()> {
        if view.job_id != self.job_id {
            self.job_id = view.job_id.clone();
            self.printed_events = 0;
            self.last_status_line = None;
            if let Some(job_id) = &view.job_id {
                writeln!(self.out, "Following job {job_id}")?;
            }
        }

        let unseen = view.events_seen.saturating_sub(self.printed_events);
        let unseen = usize::try_from(unseen).unwrap_or(usize::MAX).min(view.log.len());
        for line in &view.log[view.log.len() - unseen..] {
            writeln!(self.out, "  {line}")?;
        }
        self.printed_events = view.events_seen;

        let status_line = format!(
            "{} {:>3}% {} | {}",
            progress_bar(view.progress, BAR_WIDTH),
            view.progress,
            view.status_label,
            view.step_label
        );
        if self.last_status_line.as_deref() != Some(status_line.as_str()) {
            writeln!(self.out, "{status_line}")?;
            self.last_status_line = Some(status_line);
        }

        if view.error != self.last_error {
            if let Some(error) = &view.error {
                writeln!(self.out, "Error: {error}")?;
            }
            self.last_error = view.error.clone();
        }

        if view.preview != self.last_preview {
            if let Some(preview) = &view.preview {
                write_preview(&mut self.out, preview)?;
            }
            self.last_preview = view.preview.clone();
        }

        self.out.flush()
    }

    /// Final report once the job reached a terminal status.
    pub fn summary(&mut self, view: &ProgressView, now: DateTime<Utc>) -> io::Result<()> {
        let job = view.job_id.as_deref().unwrap_or("-");
        write!(self.out, "Job {job} {}", view.status_label)?;
        if let Some(started_at) = view.started_at {
            let elapsed = (now - started_at).num_seconds().max(0);
            write!(self.out, " after {}", format_elapsed(elapsed))?;
        }
        writeln!(self.out)?;
        if let Some(url) = &view.result_url {
            writeln!(self.out, "Result: {url}")?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn write_preview(out: &mut impl Write, preview: &PreviewDigest) -> io::Result<()> {
    let title = preview.title.as_deref().unwrap_or(&preview.portfolio_id);
    writeln!(out, "--- preview: {title} ---")?;
    for line in preview.body.lines() {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "---")
}

pub fn progress_bar(progress: u32, width: usize) -> String {
    let filled = (progress.min(100) as usize * width) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn format_elapsed(seconds: i64) -> String {
    if seconds >= 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}
