use crate::errors::SinkError;
use crate::scenario::Category;
use crate::sinks::{Evidence, Exposure, Outcome, SinkAdapter, SinkInvocation};
use crate::utils::config::Config;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Command-execution sink. The unsafe path assembles a shell command line by
/// concatenating a trusted echo prefix with the raw input and hands it to
/// `sh -c`; the safe path invokes the echo program directly with the input
/// as one discrete argv element. Echo is the benign marker standing in for
/// an arbitrary command: if the shell splits the input at a metacharacter,
/// the extra execution shows up as output beyond the literal echo.
pub struct CommandSink {
    shell_path: String,
    echo_path: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl CommandSink {
    pub fn new(config: &Config) -> Self {
        Self {
            shell_path: config.sinks.shell_path.clone(),
            echo_path: config.sinks.echo_path.clone(),
            timeout: config.runner.process_timeout(),
            poll_interval: config.runner.poll_interval(),
        }
    }

    /// Spawn, wait with a deadline, kill on expiry. The output of our marker
    /// commands fits the pipe buffer, so collecting after exit is safe.
    fn run_bounded(&self, mut cmd: Command, program: &str) -> Result<String, SinkError> {
        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SinkError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                child.kill().ok();
                child.wait().ok();
                return Err(SinkError::Timeout(self.timeout));
            }
            std::thread::sleep(self.poll_interval);
        }

        let output = child.wait_with_output()?;
        Ok(String::from_utf8(output.stdout)?)
    }

    fn evidence(input: &str, stdout: &str) -> Evidence {
        let trimmed = stdout.trim_end_matches('\n');
        let literal_echo = trimmed == input;
        // a literal echo is one execution no matter how many lines the input
        // itself spans; otherwise every extra line is a command boundary the
        // input managed to create
        let observed = if literal_echo {
            1
        } else {
            trimmed.lines().count().max(1) as u32
        };
        Evidence::ShellExecutions {
            observed,
            literal_echo,
        }
    }
}

impl SinkAdapter for CommandSink {
    fn category(&self) -> Category {
        Category::CommandInjection
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let command_line = format!("{} {}", self.echo_path, input);
        tracing::debug!(target: "sinks", %command_line, "unsafe shell invocation");

        let mut cmd = Command::new(&self.shell_path);
        cmd.arg("-c").arg(&command_line);
        let stdout = self.run_bounded(cmd, &self.shell_path)?;

        Ok(SinkInvocation {
            category: Category::CommandInjection,
            exposure: Exposure::Unsafe,
            raw_input: input.to_owned(),
            payload: format!("{} -c \"{}\"", self.shell_path, command_line),
            evidence: Self::evidence(input, &stdout),
            outcome: Outcome::Value(stdout.trim_end_matches('\n').to_owned()),
        })
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        tracing::debug!(target: "sinks", program = %self.echo_path, arg = %input, "safe argv invocation");

        let mut cmd = Command::new(&self.echo_path);
        cmd.arg(input);
        let stdout = self.run_bounded(cmd, &self.echo_path)?;

        Ok(SinkInvocation {
            category: Category::CommandInjection,
            exposure: Exposure::Safe,
            raw_input: input.to_owned(),
            payload: format!("{} <{:?}>", self.echo_path, input),
            evidence: Self::evidence(input, &stdout),
            outcome: Outcome::Value(stdout.trim_end_matches('\n').to_owned()),
        })
    }
}

#[cfg(test)]
fn test_sink() -> CommandSink {
    CommandSink::new(&Config::default())
}

#[test]
#[cfg(unix)]
fn safe_path_keeps_metacharacters_as_one_literal_argument() {
    let inv = test_sink().invoke_safe("x; id").unwrap();
    assert_eq!(inv.outcome, Outcome::Value("x; id".into()));
    assert_eq!(
        inv.evidence,
        Evidence::ShellExecutions {
            observed: 1,
            literal_echo: true
        }
    );
    assert!(!inv.evidence.injection_observed());
}

#[test]
#[cfg(unix)]
fn unsafe_path_lets_the_shell_split_the_command() {
    let inv = test_sink().invoke_unsafe("x; id").unwrap();
    // first command echoed "x", the second ran `id`
    assert!(inv.evidence.injection_observed());
    match inv.outcome {
        Outcome::Value(ref out) => assert_ne!(out, "x; id"),
        ref other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
#[cfg(unix)]
fn benign_input_is_equivalent_on_both_paths() {
    let unsafe_inv = test_sink().invoke_unsafe("x").unwrap();
    let safe_inv = test_sink().invoke_safe("x").unwrap();
    assert_eq!(unsafe_inv.outcome, safe_inv.outcome);
    assert!(!unsafe_inv.evidence.injection_observed());
    assert!(!safe_inv.evidence.injection_observed());
}

#[test]
#[cfg(unix)]
fn multiline_argument_is_still_one_execution() {
    let inv = test_sink().invoke_safe("a\nb").unwrap();
    assert_eq!(
        inv.evidence,
        Evidence::ShellExecutions {
            observed: 1,
            literal_echo: true
        }
    );
    assert!(!inv.evidence.injection_observed());
}

#[test]
fn missing_program_is_a_spawn_error() {
    let mut config = Config::default();
    config.sinks.echo_path = "/nonexistent/taintproof-echo".into();
    let err = CommandSink::new(&config).invoke_safe("x").unwrap_err();
    assert!(matches!(err, SinkError::Spawn { .. }));
}

#[test]
#[cfg(unix)]
fn hung_process_is_killed_at_the_deadline() {
    let mut config = Config::default();
    config.runner.process_timeout_secs = 1;
    // the "echo" program sleeps instead; the poll loop must reap it
    config.sinks.echo_path = "sleep".into();
    let err = CommandSink::new(&config).invoke_safe("30").unwrap_err();
    assert!(matches!(err, SinkError::Timeout(_)));
}
