//! Typed input sources for text-interactive sessions.

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::thread;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A source of typed lines. `Ok(None)` means end of input.
#[async_trait]
pub trait LineSource: Send {
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

type LineChannel = mpsc::Receiver<io::Result<String>>;

/// Read lines from the reader `open` creates on a dedicated thread.
///
/// The thread is detached, so a read blocked on it never holds up runtime
/// shutdown.
fn spawn_line_reader<R, F>(open: F) -> io::Result<LineChannel>
where
    R: BufRead,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("voxagent-input".into())
        .spawn(move || {
            for line in open().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Lines read from standard input.
///
/// The reader thread starts on the first call to `next_line`.
#[derive(Default)]
pub struct StdinLines {
    lines: Option<LineChannel>,
}

impl StdinLines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.lines.is_none() {
            self.lines = Some(spawn_line_reader(|| io::stdin().lock())?);
        }
        match self.lines.as_mut() {
            Some(lines) => lines.recv().await.transpose(),
            None => Ok(None),
        }
    }
}

/// A fixed list of lines, for scripted sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Lines not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

#[async_trait]
impl LineSource for ScriptedLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Duration;

    /// A source whose reads never return, like an idle terminal.
    struct Blocked;

    impl Read for Blocked {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            loop {
                thread::park();
            }
        }
    }

    #[tokio::test]
    async fn reader_thread_yields_lines_then_ends() {
        let mut lines = spawn_line_reader(|| Cursor::new("first\nsecond\n")).unwrap();
        assert_eq!(lines.recv().await.unwrap().unwrap(), "first");
        assert_eq!(lines.recv().await.unwrap().unwrap(), "second");
        assert!(lines.recv().await.is_none());
    }

    #[test]
    fn blocked_read_does_not_hold_up_runtime_shutdown() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let mut lines = spawn_line_reader(|| BufReader::new(Blocked)).unwrap();

        let waited = runtime.block_on(async {
            tokio::time::timeout(Duration::from_millis(20), lines.recv()).await
        });
        assert!(waited.is_err());

        // Returns at once even though the reader thread is still blocked.
        drop(runtime);
    }

    #[tokio::test]
    async fn scripted_lines_end_with_none() {
        let mut lines = ScriptedLines::new(["one", "two"]);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(lines.remaining(), 1);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
