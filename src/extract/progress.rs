//! Progress reporting for extraction.
//!
//! The extractor only talks to a [`ProgressSink`]. Progress is always per
//! entry: the percentage is the share of the *current* entry's decompressed
//! size written so far, and it starts again from 0 for every entry.

use tokio::sync::mpsc::UnboundedSender;

/// Receives extraction progress on the extracting task.
///
/// Calls are synchronous and must return promptly; a slow sink stalls
/// extraction.
pub trait ProgressSink: Send {
    /// A file entry is about to be streamed. `index` is its position in the
    /// archive's file list and `total` the number of entries in that list.
    fn on_entry_start(&mut self, name: &str, index: usize, total: usize);

    /// A chunk of the current entry was written. Only reported for entries
    /// with a non-zero decompressed size; never decreases within an entry.
    fn on_entry_progress(&mut self, percentage: u8);
}

/// Snapshot handed to a [`ProgressCallback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionProgress {
    /// Number of entries in the archive.
    pub total: usize,
    /// Index of the entry being extracted.
    pub current: usize,
    pub filename: String,
    /// Set only for the first notification of an entry.
    pub is_new: bool,
    /// 0 to 100, rounded.
    pub percentage: u8,
}

/// Adapts a closure over an [`ExtractionProgress`] record to [`ProgressSink`].
///
/// The record is updated in place and lent to the closure for each
/// notification.
pub struct ProgressCallback<F> {
    state: ExtractionProgress,
    callback: F,
}

impl<F> ProgressCallback<F>
where
    F: FnMut(&ExtractionProgress) + Send,
{
    pub fn new(callback: F) -> Self {
        Self {
            state: ExtractionProgress::default(),
            callback,
        }
    }

    /// The record as of the last notification.
    pub fn state(&self) -> &ExtractionProgress {
        &self.state
    }
}

impl<F> ProgressSink for ProgressCallback<F>
where
    F: FnMut(&ExtractionProgress) + Send,
{
    fn on_entry_start(&mut self, name: &str, index: usize, total: usize) {
        self.state.is_new = true;
        self.state.total = total;
        self.state.current = index;
        self.state.percentage = 0;
        self.state.filename.clear();
        self.state.filename.push_str(name);
        (self.callback)(&self.state);
        self.state.is_new = false;
    }

    fn on_entry_progress(&mut self, percentage: u8) {
        self.state.percentage = percentage;
        (self.callback)(&self.state);
    }
}

/// Event form of the [`ProgressSink`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    EntryStarted {
        name: String,
        index: usize,
        total: usize,
    },
    EntryProgress {
        index: usize,
        percentage: u8,
    },
}

/// Forwards progress as [`ProgressEvent`]s over a tokio channel, for
/// consumers living on another task or thread.
///
/// Events are dropped once the receiver is gone.
pub struct ChannelProgress {
    tx: UnboundedSender<ProgressEvent>,
    current: usize,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx, current: 0 }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_entry_start(&mut self, name: &str, index: usize, total: usize) {
        self.current = index;
        let _ = self.tx.send(ProgressEvent::EntryStarted {
            name: name.to_string(),
            index,
            total,
        });
    }

    fn on_entry_progress(&mut self, percentage: u8) {
        let _ = self.tx.send(ProgressEvent::EntryProgress {
            index: self.current,
            percentage,
        });
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_entry_start(&mut self, _name: &str, _index: usize, _total: usize) {}

    fn on_entry_progress(&mut self, _percentage: u8) {}
}

/// `round(100 * written / size)`, for `size > 0`.
pub(crate) fn entry_percentage(written: u64, size: u64) -> u8 {
    debug_assert!(size > 0);
    let written = written.min(size) as u128;
    let size = size as u128;
    ((written * 200 + size) / (size * 2)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(entry_percentage(0, 10), 0);
        assert_eq!(entry_percentage(1, 3), 33);
        assert_eq!(entry_percentage(2, 3), 67);
        assert_eq!(entry_percentage(1, 200), 1);
        assert_eq!(entry_percentage(1, 201), 0);
        assert_eq!(entry_percentage(7, 7), 100);
        assert_eq!(entry_percentage(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn callback_marks_only_first_notification_new() {
        let mut seen = Vec::new();
        let mut sink = ProgressCallback::new(|p: &ExtractionProgress| seen.push(p.clone()));

        sink.on_entry_start("a.txt", 0, 2);
        sink.on_entry_progress(50);
        sink.on_entry_progress(100);
        sink.on_entry_start("b.txt", 1, 2);
        drop(sink);

        let flags: Vec<_> = seen.iter().map(|p| (p.current, p.is_new, p.percentage)).collect();
        assert_eq!(flags, vec![(0, true, 0), (0, false, 50), (0, false, 100), (1, true, 0)]);
        assert_eq!(seen[3].filename, "b.txt");
        assert_eq!(seen[3].total, 2);
    }

    #[test]
    fn channel_tags_progress_with_current_entry() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = ChannelProgress::new(tx);

        sink.on_entry_start("x.bin", 4, 9);
        sink.on_entry_progress(12);

        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::EntryStarted {
                name: "x.bin".into(),
                index: 4,
                total: 9
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::EntryProgress {
                index: 4,
                percentage: 12
            }
        );
    }
}
