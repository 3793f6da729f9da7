//! Rendering of log records for streaming clients.

use spout_logs::{COLOR_RESET, Colorizer, LogRecord};
use tracing::warn;

/// How a response renders each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Payload only, one line per record.
    Raw,
    /// Right-aligned container name, a `|` and the payload.
    Prefixed {
        /// Wrap each line in the container's colour.
        colors: bool,
    },
    /// One JSON object per line.
    Json,
}

/// Per-response line renderer.
///
/// Holds the response's colour assignments and the current name column
/// width, so two clients never influence each other's output.
#[derive(Debug)]
pub struct LineFormatter {
    mode: OutputMode,
    width: usize,
    colors: Colorizer,
}

impl LineFormatter {
    /// Creates a renderer whose name column starts `width` characters wide.
    #[must_use]
    pub fn new(mode: OutputMode, width: usize) -> Self {
        Self {
            mode,
            width,
            colors: Colorizer::new(),
        }
    }

    /// Output mode.
    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Renders one record as a newline-terminated line.
    pub fn format(&mut self, record: &LogRecord) -> String {
        match self.mode {
            OutputMode::Raw => format!("{}\n", record.data),
            OutputMode::Prefixed { colors } => {
                self.width = self.width.max(record.name.chars().count());
                let width = self.width;
                if colors {
                    let color = self.colors.get(&record.name);
                    format!(
                        "{color}{name:>width$}|{data}{COLOR_RESET}\n",
                        name = record.name,
                        data = record.data
                    )
                } else {
                    format!("{name:>width$}|{data}\n", name = record.name, data = record.data)
                }
            }
            OutputMode::Json => match serde_json::to_string(record) {
                Ok(mut json) => {
                    json.push('\n');
                    json
                }
                Err(e) => {
                    warn!(error = %e, "failed to encode log record");
                    String::new()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spout_logs::{ContainerInfo, StreamType};

    fn record(name: &str, data: &str) -> LogRecord {
        let info = ContainerInfo::new("0123456789abcdef", name, "busybox");
        LogRecord::new(&info, StreamType::Stdout, data)
    }

    #[test]
    fn raw_mode_writes_payload_only() {
        let mut formatter = LineFormatter::new(OutputMode::Raw, 16);
        assert_eq!(formatter.format(&record("web", "hello")), "hello\n");
    }

    #[test]
    fn prefixed_mode_right_aligns_names() {
        let mut formatter = LineFormatter::new(OutputMode::Prefixed { colors: false }, 16);
        assert_eq!(
            formatter.format(&record("web", "hello")),
            "             web|hello\n"
        );
    }

    #[test]
    fn name_column_grows_and_stays_wide() {
        let mut formatter = LineFormatter::new(OutputMode::Prefixed { colors: false }, 4);
        assert_eq!(formatter.format(&record("database", "a")), "database|a\n");
        assert_eq!(formatter.format(&record("web", "b")), "     web|b\n");
    }

    #[test]
    fn colored_lines_reset_at_end() {
        let mut formatter = LineFormatter::new(OutputMode::Prefixed { colors: true }, 3);
        let first = formatter.format(&record("web", "x"));
        assert_eq!(first, "\x1b[1;37mweb|x\x1b[0m\n");

        let second = formatter.format(&record("db", "y"));
        assert!(second.starts_with("\x1b[36m"));
        assert!(second.ends_with("\x1b[0m\n"));

        // same container keeps its colour
        let third = formatter.format(&record("web", "z"));
        assert!(third.starts_with("\x1b[1;37m"));
    }

    #[test]
    fn json_mode_writes_one_object_per_line() {
        let mut formatter = LineFormatter::new(OutputMode::Json, 16);
        let line = formatter.format(&record("web", "hello"));
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["name"], "web");
        assert_eq!(value["type"], "stdout");
        assert_eq!(value["data"], "hello");
        assert_eq!(value["image"], "busybox");
    }
}
