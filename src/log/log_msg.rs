use crate::log::log_level::LogLevel;

/// One queued log line.
#[derive(Debug, Clone)]
pub struct LogMsg {
    pub level: LogLevel,
    /// Milliseconds since the UNIX epoch.
    pub ts_ms: u128,
    pub text: String,
    /// Usually `module_path!()` of the call site.
    pub target: &'static str,
}

impl LogMsg {
    pub fn new(
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
        ts_ms: u128,
    ) -> Self {
        Self {
            level,
            ts_ms,
            text: text.into(),
            target,
        }
    }

    /// Render as a single line: `[LEVEL] ts_ms target | text`.
    pub fn render(&self) -> String {
        format!(
            "[{}] {} {} | {}",
            self.level.as_str(),
            self.ts_ms,
            self.target,
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_keeps_level_target_and_text() {
        let m = LogMsg::new(LogLevel::Warn, "target gone", "peercall::signaling", 42);
        assert_eq!(m.render(), "[WARN ] 42 peercall::signaling | target gone");
    }
}
