use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDateTime};
use tracing::debug;

use crate::error::Result;
use crate::types::MemoryKind;

/// Hard cap on the Conscious focus lifetime, in minutes. A blob declaring a
/// longer DURATION is clamped to this.
pub const MAX_FOCUS_MINUTES: i64 = 15;

/// Returned when the Conscious blob is empty.
pub const FOCUS_EMPTY: &str = "No active conscious focus. Ready for new intent.";
/// Returned when the Conscious blob has outlived its duration (or has
/// already been cleared to the idle form).
pub const FOCUS_EXPIRED: &str = "Previous conscious focus expired. Ready for new intent.";

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";
const IDLE_MARKER: &str = "ACTIVE FOCUS:\nIdle.";

/// File-backed store for the memory blobs, one lock per kind.
///
/// Writes are full-overwrite; `append` adds a newline-separated paragraph.
/// The Conscious expiry rule is an invariant of `read` — callers never see a
/// stale focus.
pub struct MemoryStore {
    dir: PathBuf,
    locks: [Mutex<()>; 5],
}

impl MemoryStore {
    pub fn new(configs_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: configs_dir.as_ref().to_path_buf(),
            locks: Default::default(),
        }
    }

    /// Read a blob. Missing files read as the empty string.
    ///
    /// For `Conscious` this applies the expiry rule: a focus older than its
    /// declared duration is rewritten to the idle form and the expired
    /// sentinel is returned instead of the stale text.
    pub fn read(&self, kind: MemoryKind) -> Result<String> {
        if kind == MemoryKind::Conscious {
            return self.read_conscious();
        }
        let _guard = self.locks[kind.index()].lock().unwrap();
        self.read_raw(kind)
    }

    /// Overwrite a blob with new content.
    pub fn write(&self, kind: MemoryKind, text: &str) -> Result<()> {
        let _guard = self.locks[kind.index()].lock().unwrap();
        std::fs::write(self.path(kind), text)?;
        Ok(())
    }

    /// Append a paragraph to a blob.
    pub fn append(&self, kind: MemoryKind, text: &str) -> Result<()> {
        let _guard = self.locks[kind.index()].lock().unwrap();
        let mut current = self.read_raw(kind)?;
        if !current.is_empty() && !current.ends_with('\n') {
            current.push('\n');
        }
        current.push_str(text);
        current.push('\n');
        std::fs::write(self.path(kind), current)?;
        Ok(())
    }

    /// Set a new Conscious focus with the current timestamp.
    ///
    /// `duration_minutes` is clamped to [`MAX_FOCUS_MINUTES`].
    pub fn set_focus(&self, focus: &str, duration_minutes: i64) -> Result<()> {
        let duration = duration_minutes.clamp(1, MAX_FOCUS_MINUTES);
        let timestamp = Local::now().format(TIMESTAMP_FMT);
        let content =
            format!("TIMESTAMP: {timestamp}\nDURATION: {duration}\n\nACTIVE FOCUS:\n{focus}");
        debug!(duration, "setting conscious focus");
        self.write(MemoryKind::Conscious, &content)
    }

    /// Clear the Conscious focus, recording why.
    pub fn clear_focus(&self, reason: &str) -> Result<()> {
        let timestamp = Local::now().format(TIMESTAMP_FMT);
        let content = format!("TIMESTAMP: {timestamp}\n\nACTIVE FOCUS:\nIdle. Reason: {reason}");
        self.write(MemoryKind::Conscious, &content)
    }

    /// True when `focus` is one of the idle/empty sentinels.
    pub fn is_idle_focus(focus: &str) -> bool {
        focus == FOCUS_EMPTY || focus == FOCUS_EXPIRED
    }

    fn read_conscious(&self) -> Result<String> {
        let content = {
            let _guard = self.locks[MemoryKind::Conscious.index()].lock().unwrap();
            self.read_raw(MemoryKind::Conscious)?
        };

        if content.trim().is_empty() {
            return Ok(FOCUS_EMPTY.to_string());
        }
        if content.contains(IDLE_MARKER) {
            return Ok(FOCUS_EXPIRED.to_string());
        }

        let mut lines = content.lines();
        let timestamp_line = lines.next().unwrap_or("");
        let duration_line = lines.next().unwrap_or("");

        if let Some(ts_str) = timestamp_line.strip_prefix("TIMESTAMP:") {
            if let Ok(written) = NaiveDateTime::parse_from_str(ts_str.trim(), TIMESTAMP_FMT) {
                let duration_mins = duration_line
                    .strip_prefix("DURATION:")
                    .and_then(|d| d.trim().parse::<i64>().ok())
                    .unwrap_or(MAX_FOCUS_MINUTES)
                    .min(MAX_FOCUS_MINUTES);

                let age = Local::now().naive_local() - written;
                if age > Duration::minutes(duration_mins) {
                    self.clear_focus(&format!("{duration_mins} minute span reached"))?;
                    return Ok(FOCUS_EXPIRED.to_string());
                }
            }
        }

        Ok(content)
    }

    fn read_raw(&self, kind: MemoryKind) -> Result<String> {
        match std::fs::read_to_string(self.path(kind)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self, kind: MemoryKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, MemoryStore) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path()).unwrap();
        let store = MemoryStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn missing_blobs_read_empty() {
        let (_tmp, s) = store();
        assert_eq!(s.read(MemoryKind::User).unwrap(), "");
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_tmp, s) = store();
        s.write(MemoryKind::Personality, "Curious and dry-humored.").unwrap();
        assert_eq!(
            s.read(MemoryKind::Personality).unwrap(),
            "Curious and dry-humored."
        );
    }

    #[test]
    fn append_adds_a_paragraph() {
        let (_tmp, s) = store();
        s.write(MemoryKind::Subconscious, "- idea one").unwrap();
        s.append(MemoryKind::Subconscious, "- idea two").unwrap();
        let text = s.read(MemoryKind::Subconscious).unwrap();
        assert!(text.contains("idea one"));
        assert!(text.contains("idea two"));
    }

    #[test]
    fn empty_conscious_reads_as_empty_sentinel() {
        let (_tmp, s) = store();
        assert_eq!(s.read(MemoryKind::Conscious).unwrap(), FOCUS_EMPTY);
    }

    #[test]
    fn fresh_focus_reads_back_in_full() {
        let (_tmp, s) = store();
        s.set_focus("Sort the downloads folder", 10).unwrap();
        let text = s.read(MemoryKind::Conscious).unwrap();
        assert!(text.contains("Sort the downloads folder"));
        assert!(!MemoryStore::is_idle_focus(&text));
    }

    #[test]
    fn stale_focus_expires_and_stays_expired() {
        let (_tmp, s) = store();
        let old = Local::now().naive_local() - Duration::minutes(30);
        let content = format!(
            "TIMESTAMP: {}\nDURATION: 10\n\nACTIVE FOCUS:\nFinish the report",
            old.format(TIMESTAMP_FMT)
        );
        s.write(MemoryKind::Conscious, &content).unwrap();

        assert_eq!(s.read(MemoryKind::Conscious).unwrap(), FOCUS_EXPIRED);
        // A second read without intervening writes returns the same sentinel.
        assert_eq!(s.read(MemoryKind::Conscious).unwrap(), FOCUS_EXPIRED);
    }

    #[test]
    fn declared_duration_is_capped() {
        let (_tmp, s) = store();
        // 20 minutes old with a declared duration of 120 — the cap (15)
        // applies, so the focus is already expired.
        let old = Local::now().naive_local() - Duration::minutes(20);
        let content = format!(
            "TIMESTAMP: {}\nDURATION: 120\n\nACTIVE FOCUS:\nLong task",
            old.format(TIMESTAMP_FMT)
        );
        s.write(MemoryKind::Conscious, &content).unwrap();
        assert_eq!(s.read(MemoryKind::Conscious).unwrap(), FOCUS_EXPIRED);
    }

    #[test]
    fn cleared_focus_reads_as_expired_sentinel() {
        let (_tmp, s) = store();
        s.set_focus("anything", 10).unwrap();
        s.clear_focus("task finished").unwrap();
        assert_eq!(s.read(MemoryKind::Conscious).unwrap(), FOCUS_EXPIRED);
    }
}
