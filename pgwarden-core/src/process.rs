//! External command execution.
//!
//! Commands run through `sh -c` because they are shell strings (the version
//! probe uses pipes). Secrets reach the child through its environment only.

use crate::command::{CLIENT_VERSION_COMMAND, ChildEnv};
use crate::error::LifecycleError;
use crate::Result;
use async_trait::async_trait;
use std::process::Stdio;

/// Captured outcome of a command that exited with status zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Process exit code
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandResult {
    /// Stdout read as an integer the way a lenient cast does.
    ///
    /// Surrounding whitespace is ignored, an optional sign and the leading
    /// digits are taken, and anything without leading digits is `0`. Values
    /// beyond the `i64` range clamp to its bounds.
    ///
    /// # Example
    /// ```rust
    /// use pgwarden_core::process::CommandResult;
    ///
    /// let result = |stdout: &str| CommandResult {
    ///     exit_code: 0,
    ///     stdout: stdout.to_string(),
    ///     stderr: String::new(),
    /// };
    /// assert_eq!(result("1\n").sentinel_value(), 1);
    /// assert_eq!(result("DROP DATABASE").sentinel_value(), 0);
    /// ```
    pub fn sentinel_value(&self) -> i64 {
        let text = self.stdout.trim();
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        let digits = &digits[..end];
        if digits.is_empty() {
            return 0;
        }
        // Overflowing digit runs saturate.
        match (digits.parse::<i64>(), negative) {
            (Ok(magnitude), true) => -magnitude,
            (Ok(magnitude), false) => magnitude,
            (Err(_), true) => i64::MIN,
            (Err(_), false) => i64::MAX,
        }
    }

    /// `true` when [`CommandResult::sentinel_value`] is non-zero.
    pub fn indicates_success(&self) -> bool {
        self.sentinel_value() != 0
    }
}

/// Executes shell commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` with `env` merged into the child environment and waits
    /// for it to exit.
    ///
    /// # Errors
    /// - [`LifecycleError::ProcessExecution`] if the command exits non-zero
    /// - [`LifecycleError::Io`] if the command cannot be started
    async fn run(&self, command: &str, env: &ChildEnv) -> Result<CommandResult>;
}

/// Runs commands through `sh -c`.
///
/// There is no timeout, and the child is left running if the awaiting
/// future is dropped: once a destructive command is dispatched it runs to
/// completion.
#[derive(Debug, Clone)]
pub struct ShellProcessRunner {
    shell: String,
}

impl Default for ShellProcessRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellProcessRunner {
    /// Creates a runner using `sh`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to use a different POSIX shell.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn run(&self, command: &str, env: &ChildEnv) -> Result<CommandResult> {
        tracing::debug!(
            command,
            env_vars = ?env.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "Running external command"
        );

        let output = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .envs(env.iter().map(|(name, value)| (name.as_str(), value.as_str())))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| LifecycleError::io(format!("Failed to run '{}'", command), e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::debug!(exit_code = ?output.status.code(), "External command failed");
            return Err(LifecycleError::process_failed(output.status.code(), stderr));
        }

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or_default(),
            stdout,
            stderr,
        })
    }
}

/// Major.minor version of the local `psql` client, e.g. `"16.2"`.
///
/// Informational only; no lifecycle decision depends on it.
///
/// # Errors
/// Returns the runner's error if the probe command fails.
pub async fn client_version(runner: &dyn ProcessRunner) -> Result<String> {
    let result = runner.run(CLIENT_VERSION_COMMAND, &ChildEnv::new()).await?;
    Ok(result.stdout.trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    fn with_stdout(stdout: &str) -> CommandResult {
        CommandResult {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_sentinel_value_parsing() {
        let cases = [
            ("1", 1),
            ("1\n", 1),
            ("  42  ", 42),
            ("0", 0),
            ("", 0),
            ("DROP DATABASE", 0),
            ("7 rows", 7),
            ("-3", -3),
            ("+5", 5),
            ("-", 0),
            ("99999999999999999999", i64::MAX),
            ("-99999999999999999999\n", i64::MIN),
            ("-9223372036854775808", i64::MIN),
        ];
        for (stdout, expected) in cases {
            assert_eq!(with_stdout(stdout).sentinel_value(), expected, "{:?}", stdout);
        }
    }

    #[test]
    fn test_indicates_success() {
        assert!(with_stdout("1").indicates_success());
        assert!(!with_stdout("0").indicates_success());
        assert!(!with_stdout("not a number").indicates_success());
        assert!(with_stdout("99999999999999999999").indicates_success());
    }

    #[tokio::test]
    async fn test_shell_runner_captures_output() {
        let runner = ShellProcessRunner::new();
        let result = runner
            .run("echo out; echo err >&2", &ChildEnv::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_shell_runner_interprets_pipes() {
        let runner = ShellProcessRunner::new();
        let result = runner
            .run("echo 'psql (PostgreSQL) 16.2' | awk '{print $3}' | cut -f1 -d'.'", &ChildEnv::new())
            .await
            .unwrap();

        assert_eq!(result.stdout.trim(), "16");
    }

    #[tokio::test]
    async fn test_shell_runner_non_zero_exit() {
        let runner = ShellProcessRunner::new();
        let err = runner
            .run("echo 1; echo 'permission denied' >&2; exit 1", &ChildEnv::new())
            .await
            .unwrap_err();

        match err {
            LifecycleError::ProcessExecution { exit_code, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "permission denied\n");
            }
            other => panic!("expected process failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shell_runner_injects_environment() {
        let runner = ShellProcessRunner::new();
        let env = vec![(
            "PGWARDEN_TEST_SECRET".to_string(),
            Zeroizing::new("s3cr3t".to_string()),
        )];
        let result = runner
            .run("printf '%s' \"$PGWARDEN_TEST_SECRET\"", &env)
            .await
            .unwrap();

        assert_eq!(result.stdout, "s3cr3t");
        assert!(std::env::var("PGWARDEN_TEST_SECRET").is_err());
    }

    #[tokio::test]
    async fn test_shell_runner_missing_shell() {
        let runner = ShellProcessRunner::new().with_shell("/nonexistent/shell");
        let err = runner.run("true", &ChildEnv::new()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Io { .. }));
    }

    #[tokio::test]
    async fn test_client_version_trims_output() {
        struct FixedOutput;

        #[async_trait]
        impl ProcessRunner for FixedOutput {
            async fn run(&self, command: &str, _env: &ChildEnv) -> Result<CommandResult> {
                assert_eq!(command, CLIENT_VERSION_COMMAND);
                Ok(CommandResult {
                    exit_code: 0,
                    stdout: "16.2\n".to_string(),
                    stderr: String::new(),
                })
            }
        }

        assert_eq!(client_version(&FixedOutput).await.unwrap(), "16.2");
    }
}
