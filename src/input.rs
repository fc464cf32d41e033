//! Local command input for the client.
//!
//! Line editing is blocking, so the [`LineSource`] lives on its own thread
//! and talks to the async client loop through channels, one prompt request
//! at a time.

use std::path::PathBuf;
use std::thread::JoinHandle;

use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::Result;

/// What the input collaborator produced for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line without its terminator.
    Line(String),
    /// The input was closed (Ctrl-D).
    EndOfInput,
    /// The user pressed Ctrl-C while editing.
    Interrupted,
}

/// Blocking source of command lines.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;

    /// Called once when the reader thread exits.
    fn finish(&mut self) {}
}

/// Filename completion on TAB.
struct PromptHelper {
    files: FilenameCompleter,
}

impl Completer for PromptHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        self.files.complete(line, pos, ctx)
    }
}

impl Hinter for PromptHelper {
    type Hint = String;
}

impl Highlighter for PromptHelper {}

impl Validator for PromptHelper {}

impl Helper for PromptHelper {}

/// Terminal line editor with history and completion.
pub struct EditorInput {
    editor: Editor<PromptHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl EditorInput {
    /// Create the editor, loading `history_file` when it exists.
    pub fn new(history_file: Option<PathBuf>) -> Result<Self> {
        let mut editor = Editor::<PromptHelper, DefaultHistory>::new()
            .map_err(|e| RelayError::Input(e.to_string()))?;
        editor.set_helper(Some(PromptHelper {
            files: FilenameCompleter::new(),
        }));

        if let Some(path) = &history_file {
            if let Err(e) = editor.load_history(path) {
                debug!("No history loaded from {}: {}", path.display(), e);
            }
        }

        Ok(Self {
            editor,
            history_file,
        })
    }
}

impl LineSource for EditorInput {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(InputEvent::Line(line))
            }
            Err(ReadlineError::Eof) => Ok(InputEvent::EndOfInput),
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(e) => Err(RelayError::Input(e.to_string())),
        }
    }

    fn finish(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                warn!("Failed to save history to {}: {}", path.display(), e);
            }
        }
    }
}

/// Async handle to a [`LineSource`] running on a dedicated thread.
pub struct InputReader {
    requests: mpsc::Sender<String>,
    events: mpsc::Receiver<Result<InputEvent>>,
    thread: JoinHandle<()>,
    pending: bool,
}

impl InputReader {
    /// Start the reader thread; `make` builds the source on that thread.
    pub async fn spawn<F, L>(make: F) -> Result<Self>
    where
        F: FnOnce() -> Result<L> + Send + 'static,
        L: LineSource + 'static,
    {
        let (requests, mut request_rx) = mpsc::channel::<String>(1);
        let (event_tx, events) = mpsc::channel::<Result<InputEvent>>(1);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        let thread = std::thread::Builder::new()
            .name("relay-input".into())
            .spawn(move || {
                let mut source = match make() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(prompt) = request_rx.blocking_recv() {
                    let event = source.read_line(&prompt);
                    let more = matches!(event, Ok(InputEvent::Line(_)));
                    if event_tx.blocking_send(event).is_err() || !more {
                        break;
                    }
                }
                source.finish();
                debug!("Input reader finished");
            })?;

        ready_rx
            .await
            .map_err(|_| RelayError::Input("input thread exited during setup".into()))??;

        Ok(Self {
            requests,
            events,
            thread,
            pending: false,
        })
    }

    /// Prompt for and wait on the next line.
    ///
    /// Cancel-safe: if the future is dropped while waiting, the next call
    /// picks up the answer to the earlier prompt instead of asking again.
    pub async fn next_line(&mut self, prompt: &str) -> Result<InputEvent> {
        if !self.pending {
            self.requests
                .send(prompt.to_string())
                .await
                .map_err(|_| RelayError::Input("input reader has stopped".into()))?;
            self.pending = true;
        }

        let event = self
            .events
            .recv()
            .await
            .unwrap_or_else(|| Err(RelayError::Input("input reader has stopped".into())));
        self.pending = false;
        event
    }

    /// Stop the reader thread.
    ///
    /// Waits for it to finish (so history gets saved) unless it is still
    /// blocked on a prompt, in which case it is left to die with the process.
    pub async fn close(self) {
        let Self {
            requests,
            events,
            thread,
            pending,
        } = self;
        drop(requests);
        drop(events);

        if pending {
            // The editor still owns the terminal in raw mode; callers hold a
            // `TerminalGuard` to put it back.
            return;
        }
        let _ = tokio::task::spawn_blocking(move || thread.join()).await;
    }
}

/// Terminal attributes of stdin, captured before the editor starts and
/// written back on drop.
///
/// An external SIGINT can end the client while the editor thread is still
/// blocked in raw mode; restoring the saved attributes leaves the user's
/// terminal usable either way. Does nothing when stdin is not a terminal.
pub struct TerminalGuard {
    #[cfg(unix)]
    saved: Option<libc::termios>,
}

impl TerminalGuard {
    #[cfg(unix)]
    pub fn capture() -> Self {
        let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
        // SAFETY: tcgetattr writes a full termios into the pointer on success.
        let saved = if unsafe { libc::tcgetattr(libc::STDIN_FILENO, termios.as_mut_ptr()) } == 0 {
            // SAFETY: initialized by the successful call above.
            Some(unsafe { termios.assume_init() })
        } else {
            None
        };
        Self { saved }
    }

    #[cfg(not(unix))]
    pub fn capture() -> Self {
        Self {}
    }

    /// Whether there were attributes to save.
    pub fn is_terminal(&self) -> bool {
        #[cfg(unix)]
        {
            self.saved.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Write the saved attributes back.
    pub fn restore(&self) {
        #[cfg(unix)]
        {
            if let Some(termios) = &self.saved {
                // SAFETY: `termios` came from tcgetattr on the same descriptor.
                if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, termios) } != 0 {
                    warn!(
                        "Failed to restore terminal: {}",
                        std::io::Error::last_os_error()
                    );
                }
            }
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Fixed sequence of lines, then end-of-input.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: std::collections::VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Result<InputEvent> {
        Ok(self
            .lines
            .pop_front()
            .map(InputEvent::Line)
            .unwrap_or(InputEvent::EndOfInput))
    }
}
