//! Interpreter selection and script composition.
//!
//! Downloaded script bodies are never executed as-is: every interpreter
//! carries a prelude that is prepended to the body so interactive prompts
//! read from the piped stdin instead of a console that does not exist. The
//! prelude and flags are interpreter-specific; the controller only relies on
//! the composition rule.

use std::path::PathBuf;

use tracing::debug;
use which::which;

/// Prepended to every downloaded PowerShell script. Replaces `Read-Host`
/// with a function that echoes the prompt and reads a line from stdin.
const READ_HOST_PRELUDE: &str = r#"# Route Read-Host through the stdin pipe
if (Get-Command Read-Host -ErrorAction SilentlyContinue) {
    Remove-Item Function:\Read-Host -ErrorAction SilentlyContinue
}
function Read-Host {
    param([string]$Prompt = "")
    Write-Host $Prompt -NoNewline
    return [Console]::In.ReadLine()
}
"#;

/// How a staged script file gets executed: the interpreter program, its
/// fixed flags (the script path is appended last), the staged file's
/// extension, and the prelude prepended to every script body.
#[derive(Debug, Clone)]
pub struct Interpreter {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub extension: String,
    pub prelude: String,
}

impl Interpreter {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        extension: impl Into<String>,
        prelude: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            extension: extension.into(),
            prelude: prelude.into(),
        }
    }

    /// PowerShell in non-interactive, policy-unrestricted, file-driven mode.
    /// Prefers `pwsh` (PowerShell Core), falling back to Windows PowerShell.
    pub fn powershell() -> Self {
        Self::new(
            locate(&["pwsh", "powershell"]),
            vec![
                "-NoProfile".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-File".to_string(),
            ],
            "ps1",
            READ_HOST_PRELUDE,
        )
    }

    /// Prelude followed by the body, newline-separated.
    pub fn compose(&self, body: &str) -> String {
        if self.prelude.is_empty() {
            return body.to_string();
        }
        let mut script = String::with_capacity(self.prelude.len() + body.len() + 1);
        script.push_str(&self.prelude);
        if !self.prelude.ends_with('\n') {
            script.push('\n');
        }
        script.push_str(body);
        script
    }
}

/// First candidate found on PATH, else the first name as-is so the spawn
/// surfaces the launch error.
fn locate(candidates: &[&str]) -> PathBuf {
    for name in candidates {
        if let Ok(path) = which(name) {
            debug!(interpreter = %path.display(), "Resolved interpreter");
            return path;
        }
    }
    PathBuf::from(candidates[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powershell_uses_file_driven_unrestricted_flags() {
        let ps = Interpreter::powershell();
        assert_eq!(
            ps.args,
            vec!["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]
        );
        assert_eq!(ps.extension, "ps1");
        assert!(ps.prelude.contains("Read-Host"));
        assert!(ps.prelude.contains("[Console]::In.ReadLine()"));
    }

    #[test]
    fn compose_prepends_the_prelude() {
        let interpreter = Interpreter::new("sh", Vec::new(), "sh", "echo prelude");
        let script = interpreter.compose("echo body");
        assert_eq!(script, "echo prelude\necho body");
    }

    #[test]
    fn compose_without_prelude_keeps_body_untouched() {
        let interpreter = Interpreter::new("sh", Vec::new(), "sh", "");
        assert_eq!(interpreter.compose("echo body"), "echo body");
    }

    #[test]
    fn compose_does_not_double_trailing_newlines() {
        let interpreter = Interpreter::new("sh", Vec::new(), "sh", "echo prelude\n");
        assert_eq!(interpreter.compose("echo body"), "echo prelude\necho body");
    }

    #[cfg(unix)]
    #[test]
    fn locate_finds_binaries_on_path() {
        let path = locate(&["sh"]);
        assert!(path.is_absolute(), "{}", path.display());
    }

    #[test]
    fn locate_falls_back_to_the_first_candidate() {
        let path = locate(&["autobyte-no-such-interpreter"]);
        assert_eq!(path, PathBuf::from("autobyte-no-such-interpreter"));
    }
}
