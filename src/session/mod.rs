//! Single-script execution sessions.
//!
//! [`SessionController`] owns at most one running script at a time. `start`
//! downloads the script body, stages it to a fresh temp file with the
//! interpreter prelude prepended, launches the interpreter with piped
//! stdio, and hands the merged output stream to a dedicated drain thread
//! that forwards lines to the [`OutputSink`] in arrival order. `stop` is
//! forceful (no graceful negotiation); cleanup happens exactly once, in the
//! drain thread, when the output stream closes.

mod runner;

pub use runner::ProcessHandle;

use std::fs;
use std::io::{BufRead, BufReader, PipeReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::ScriptSource;
use crate::error::{ResultExt, SendError, StartError, StopError};
use crate::fetch::ScriptFetcher;
use crate::interpreter::Interpreter;

/// Lifecycle of the single session slot.
///
/// `Idle` only before the first launch; after cleanup the slot reports the
/// last terminal status until the next `start`. Terminal sessions are never
/// reused - every `start` stages a fresh file and spawns a fresh process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    Running,
    Stopping,
    Completed(i32),
    Failed(String),
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }
}

/// Receives output lines and the final status of a session.
///
/// Called from the drain thread; implementations must be Send + Sync and
/// should not block.
pub trait OutputSink: Send + Sync {
    fn on_line(&self, line: &str);
    fn on_terminal(&self, status: &SessionStatus);
}

/// Returned by [`SessionController::start`]. `script_path` is the staged
/// temp file; the controller remains its only writer and deleter.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub pid: u32,
    pub script_path: PathBuf,
}

struct ActiveSession {
    child: Child,
    stdin: Option<ChildStdin>,
    handle: ProcessHandle,
    script_path: PathBuf,
}

struct State {
    status: SessionStatus,
    session: Option<ActiveSession>,
    generation: u64,
    drain: Option<JoinHandle<()>>,
}

struct Inner {
    fetcher: Box<dyn ScriptFetcher>,
    interpreter: Interpreter,
    sink: Arc<dyn OutputSink>,
    state: Arc<Mutex<State>>,
}

/// Owns the single external-process lifecycle and its stdio plumbing.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        fetcher: Box<dyn ScriptFetcher>,
        interpreter: Interpreter,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                interpreter,
                sink,
                state: Arc::new(Mutex::new(State {
                    status: SessionStatus::Idle,
                    session: None,
                    generation: 0,
                    drain: None,
                })),
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.lock().status.clone()
    }

    /// Download, stage, and launch a catalog script.
    ///
    /// Rejected with `AlreadyRunning` while a session is active. The fetch
    /// runs synchronously in the caller's thread; callers that need a
    /// responsive surface invoke `start` off that surface's thread.
    pub fn start(&self, source: &ScriptSource) -> Result<SessionHandle, StartError> {
        let previous_drain = {
            let mut state = self.inner.state.lock();
            if state.status.is_active() {
                return Err(StartError::AlreadyRunning);
            }
            // Reserve the slot before the download so a concurrent start is
            // rejected instead of racing to spawn two processes.
            state.status = SessionStatus::Running;
            state.drain.take()
        };
        // Supervised join: the previous drain thread has already reached its
        // terminal status, so this returns promptly.
        if let Some(handle) = previous_drain {
            let _ = handle.join();
        }

        match self.launch(source) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                let status = SessionStatus::Failed(err.to_string());
                self.inner.state.lock().status = status.clone();
                self.inner.sink.on_terminal(&status);
                Err(err)
            }
        }
    }

    fn launch(&self, source: &ScriptSource) -> Result<SessionHandle, StartError> {
        info!(label = %source.label, url = %source.url, "Starting script session");

        let body = self
            .inner
            .fetcher
            .fetch(&source.url)
            .map_err(StartError::Fetch)?;
        let script = self.inner.interpreter.compose(&body);
        let script_path = stage_script(&self.inner.interpreter.extension, &script)?;
        debug!(path = %script_path.display(), bytes = script.len(), "Staged script");

        let spawned = match runner::spawn_interpreter(&self.inner.interpreter, &script_path) {
            Ok(spawned) => spawned,
            Err(err) => {
                fs::remove_file(&script_path).warn_on_err();
                return Err(err);
            }
        };

        let runner::SpawnedScript {
            child,
            stdin,
            output,
            handle,
        } = spawned;

        let session_handle = SessionHandle {
            pid: handle.pid(),
            script_path: script_path.clone(),
        };

        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.session = Some(ActiveSession {
                child,
                stdin: Some(stdin),
                handle,
                script_path,
            });
            state.generation
        };

        match spawn_drain(
            Arc::clone(&self.inner.state),
            Arc::clone(&self.inner.sink),
            output,
            generation,
        ) {
            Ok(drain) => {
                self.inner.state.lock().drain = Some(drain);
                Ok(session_handle)
            }
            Err(err) => {
                // No drain thread means nobody will observe stream closure;
                // the launch is unwound here instead.
                let mut state = self.inner.state.lock();
                if let Some(mut session) = state.session.take() {
                    session.stdin.take();
                    session.handle.kill();
                    session.child.kill().warn_on_err();
                    session.child.wait().warn_on_err();
                    fs::remove_file(&session.script_path).warn_on_err();
                }
                Err(StartError::Io(err))
            }
        }
    }

    /// Forward one line of interactive input to the running script.
    pub fn send_input(&self, text: &str) -> Result<(), SendError> {
        let mut state = self.inner.state.lock();
        let stdin = state
            .session
            .as_mut()
            .and_then(|session| session.stdin.as_mut())
            .ok_or(SendError::NotRunning)?;
        writeln!(stdin, "{}", text)?;
        stdin.flush()?;
        Ok(())
    }

    /// Forcefully terminate the running script.
    ///
    /// Cleanup is not performed here: the drain thread observes the stream
    /// closing and runs the one and only cleanup.
    pub fn stop(&self) -> Result<(), StopError> {
        let mut state = self.inner.state.lock();
        if state.session.is_none() {
            return Err(StopError::NotRunning);
        }
        state.status = SessionStatus::Stopping;
        if let Some(session) = state.session.as_mut() {
            info!(pid = session.handle.pid(), "Stopping script");
            session.stdin.take();
            session.handle.kill();
            session.child.kill().warn_on_err();
        }
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(session) = state.session.as_mut() {
            debug!(pid = session.handle.pid(), "Controller dropped with a live session");
            session.stdin.take();
            session.handle.kill();
            session.child.kill().warn_on_err();
        }
    }
}

/// Write the composed script to a fresh uniquely-named temp file.
fn stage_script(extension: &str, contents: &str) -> Result<PathBuf, StartError> {
    let mut file = tempfile::Builder::new()
        .prefix("autobyte-")
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    let (_, path) = file.keep().map_err(|e| StartError::Io(e.error))?;
    Ok(path)
}

/// Read the merged output stream line-by-line until it closes, then run the
/// terminal cleanup.
fn spawn_drain(
    state: Arc<Mutex<State>>,
    sink: Arc<dyn OutputSink>,
    output: PipeReader,
    generation: u64,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("session-drain".to_string())
        .spawn(move || {
            let reader = BufReader::new(output);
            for line in reader.lines() {
                match line {
                    Ok(line) => sink.on_line(&line),
                    Err(err) => {
                        warn!(error = %err, "Output stream read error");
                        break;
                    }
                }
            }
            finish(&state, sink.as_ref(), generation);
        })
}

/// Terminal cleanup, run exactly once per session: reap the child, delete
/// the staged file, record and emit the terminal status. The generation
/// guard drops stale invocations if a stop and a natural exit ever race.
fn finish(state: &Mutex<State>, sink: &dyn OutputSink, generation: u64) {
    let session = {
        let mut state = state.lock();
        if state.generation != generation {
            return;
        }
        state.session.take()
    };
    let Some(mut session) = session else {
        return;
    };

    let code = match session.child.wait() {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            warn!(error = %err, "Failed to reap script process");
            -1
        }
    };
    session.handle.disarm();
    session.stdin.take();

    if let Err(err) = fs::remove_file(&session.script_path) {
        warn!(path = %session.script_path.display(), error = %err, "Failed to remove staged script");
        sink.on_line(&format!(
            "[cleanup error] {}: {}",
            session.script_path.display(),
            err
        ));
    }

    let status = SessionStatus::Completed(code);
    info!(pid = session.handle.pid(), code, "Script session finished");
    state.lock().status = status.clone();
    sink.on_terminal(&status);
}

#[cfg(test)]
#[path = "../session_tests.rs"]
mod tests;
