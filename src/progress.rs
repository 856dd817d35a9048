//! Progress bars for long-running commands, and a log writer that prints
//! above them instead of tearing through the bar.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static BARS: OnceLock<MultiProgress> = OnceLock::new();

fn bars() -> &'static MultiProgress {
    BARS.get_or_init(|| {
        let bars = MultiProgress::new();
        bars.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        bars
    })
}

/// Start a bar of `len` steps; `None` when there is nothing to track
pub fn start_progress_bar(len: usize, message: &str) -> Option<ProgressBar> {
    if len == 0 {
        return None;
    }

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let pb = bars().add(ProgressBar::new(len as u64));
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

pub fn advance_progress(pb: &Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_message(message.to_string());
        pb.inc(1);
    }
}

pub fn finish_progress(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

/// `MakeWriter` for tracing that routes each log line through the bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Buffers partial writes until a full line is available
#[derive(Default)]
pub struct LogWriter {
    pending: String,
}

fn emit(line: &str) {
    let _ = bars().println(line.trim_end_matches('\r'));
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            emit(line.trim_end_matches('\n'));
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            emit(rest.trim_end_matches('\n'));
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_progress_is_none() {
        assert!(start_progress_bar(0, "nothing").is_none());
        advance_progress(&None, "noop");
        finish_progress(None, "done");
    }

    #[test]
    fn test_writer_buffers_partial_lines() {
        let mut writer = LogWriter::default();
        writer.write_all(b"first line\nsecond ").unwrap();
        assert_eq!(writer.pending, "second ");

        writer.write_all(b"half\n").unwrap();
        assert!(writer.pending.is_empty());

        writer.write_all(b"tail").unwrap();
        writer.flush().unwrap();
        assert!(writer.pending.is_empty());
    }
}
