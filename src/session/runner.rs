//! Process spawning and forceful termination.

use std::io::{self, PipeReader};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::StartError;
use crate::interpreter::Interpreter;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

// Unix-specific process control using libc for correctness and performance
#[cfg(unix)]
mod unix_process {
    use libc::{c_int, pid_t, ESRCH};

    /// Send a signal to a process group (negative PID targets the group)
    ///
    /// Returns Ok(()) if signal was sent successfully.
    /// Returns Err with errno description on failure.
    pub fn kill_process_group(pgid: u32, signal: c_int) -> Result<(), &'static str> {
        // Safety: kill() is a simple syscall with no memory safety concerns
        let rc = unsafe { libc::kill(-(pgid as pid_t), signal) };
        if rc == 0 {
            Ok(())
        } else {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match errno {
                ESRCH => Err("no such process group"),
                libc::EPERM => Err("permission denied"),
                libc::EINVAL => Err("invalid signal"),
                _ => Err("unknown error"),
            }
        }
    }

    /// SIGKILL signal number
    pub const SIGKILL: c_int = libc::SIGKILL;
}

/// Tracks the spawned process id for termination, independent of where the
/// `Child` itself lives.
///
/// The Drop impl kills the process group, so a live handle must be disarmed
/// once the process has been reaped.
#[derive(Debug)]
pub struct ProcessHandle {
    /// Process ID (used as PGID since the child is spawned with process_group(0))
    pid: u32,
    killed: bool,
}

impl ProcessHandle {
    pub fn new(pid: u32) -> Self {
        Self { pid, killed: false }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Forcefully terminate the process group. No graceful escalation: the
    /// scripts being run are arbitrary and may be hung on a prompt.
    pub fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        #[cfg(unix)]
        {
            use unix_process::{kill_process_group, SIGKILL};

            match kill_process_group(self.pid, SIGKILL) {
                Ok(()) => info!(pid = self.pid, "Killed process group"),
                Err("no such process group") => {
                    debug!(pid = self.pid, "Process group already exited")
                }
                Err(e) => warn!(pid = self.pid, error = e, "Failed to kill process group"),
            }
        }

        #[cfg(not(unix))]
        {
            // Child::kill is issued by the controller; nothing group-wide to do.
            debug!(pid = self.pid, "Process marked as killed");
        }
    }

    /// The process has been reaped; suppress further kill attempts so a
    /// reused PID is never signalled.
    pub fn disarm(&mut self) {
        self.killed = true;
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

/// A freshly spawned interpreter process: piped stdin plus a single merged
/// stdout+stderr stream.
pub struct SpawnedScript {
    pub child: Child,
    pub stdin: ChildStdin,
    pub output: PipeReader,
    pub handle: ProcessHandle,
}

/// Launch the interpreter on a staged script file.
///
/// Both stdout and stderr write into one pipe, so the read side observes
/// lines exactly in emission order.
pub fn spawn_interpreter(
    interpreter: &Interpreter,
    script: &Path,
) -> Result<SpawnedScript, StartError> {
    let (reader, writer) = io::pipe()?;
    let writer_clone = writer.try_clone()?;

    let mut command = Command::new(&interpreter.program);
    command
        .args(&interpreter.args)
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(writer_clone));

    // Spawn in a new process group so the whole script tree can be killed.
    // process_group(0) makes the child's PID the PGID.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| StartError::Launch {
        program: interpreter.program.display().to_string(),
        source,
    })?;

    // The Command retains duplicates of the pipe writer; they must be closed
    // for the reader to see EOF when the child exits.
    drop(command);

    let pid = child.id();
    info!(pid, program = %interpreter.program.display(), "Interpreter spawned");

    let stdin = child.stdin.take().ok_or_else(|| StartError::Launch {
        program: interpreter.program.display().to_string(),
        source: io::Error::new(io::ErrorKind::BrokenPipe, "stdin was not piped"),
    })?;

    Ok(SpawnedScript {
        child,
        stdin,
        output: reader,
        handle: ProcessHandle::new(pid),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_handle_skips_kill() {
        let mut handle = ProcessHandle::new(u32::MAX - 2);
        handle.disarm();
        // Would signal a nonexistent group if not disarmed; must be a no-op.
        handle.kill();
        assert_eq!(handle.pid(), u32::MAX - 2);
    }

    #[cfg(unix)]
    #[test]
    fn spawn_merges_stdout_and_stderr() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("merge.sh");
        std::fs::write(&script, "echo out\necho err 1>&2\necho out2\n").unwrap();

        let interpreter = Interpreter::new("sh", Vec::new(), "sh", "");
        let mut spawned = spawn_interpreter(&interpreter, &script).unwrap();
        drop(spawned.stdin);

        let mut output = String::new();
        spawned.output.read_to_string(&mut output).unwrap();
        assert_eq!(output, "out\nerr\nout2\n");

        let status = spawned.child.wait().unwrap();
        spawned.handle.disarm();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn missing_interpreter_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("noop.sh");
        std::fs::write(&script, "exit 0\n").unwrap();

        let interpreter = Interpreter::new("autobyte-no-such-interpreter", Vec::new(), "sh", "");
        match spawn_interpreter(&interpreter, &script) {
            Err(StartError::Launch { program, .. }) => {
                assert!(program.contains("autobyte-no-such-interpreter"))
            }
            other => panic!("expected launch error, got {:?}", other.map(|_| ())),
        }
    }
}
