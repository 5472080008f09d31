use crate::errors::HarnessResult;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use toml;

static DEFAULT_CONFIG_TOML: &str = include_str!("../../default-taintproof.conf");

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerConfig {
    /// Upper bound on any single spawned external process, in seconds.
    pub process_timeout_secs: u64,

    /// How often the runner polls a child process for exit, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            process_timeout_secs: 5,
            poll_interval_ms: 10,
        }
    }
}

impl RunnerConfig {
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// The default output format when `--format` is not given.
    pub default_format: String,

    /// Suppress everything except the per-scenario report lines.
    pub quiet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "console".into(),
            quiet: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SinksConfig {
    /// Shell interpreter used by the unsafe command path.
    pub shell_path: String,

    /// Program invoked by both command paths; must behave like echo.
    pub echo_path: String,

    /// Type tags the allowlisted reconstruction policy accepts.
    pub deser_allowlist: Vec<String>,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            shell_path: "/bin/sh".into(),
            echo_path: "echo".into(),
            deser_allowlist: vec!["User", "Session", "Config"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerConfig,
    pub output: OutputConfig,
    pub sinks: SinksConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> HarnessResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("taintproof.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("taintproof.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            println!(
                "{}: Loaded user config from: {}\n",
                style("note").green().bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        } else {
            println!(
                "{}: Using {} configuration.\n      Create '{}' to customize.\n",
                style("note").green().bold(),
                style("default").bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        }

        Ok(config)
    }
}

fn create_example_config(config_dir: &Path) -> HarnessResult<()> {
    let example_path = config_dir.join("taintproof.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        tracing::debug!("Example config created at: {}", example_path.display());
    }
    Ok(())
}

/// Merge user config into default config, keeping default allowlist entries
/// the user did not supply and overriding everything else.
fn merge_configs(mut default: Config, user: Config) -> Config {
    // --- RunnerConfig ---
    default.runner.process_timeout_secs = user.runner.process_timeout_secs;
    default.runner.poll_interval_ms = user.runner.poll_interval_ms;

    // --- OutputConfig ---
    default.output.default_format = user.output.default_format;
    default.output.quiet = user.output.quiet;

    // --- SinksConfig ---
    default.sinks.shell_path = user.sinks.shell_path;
    default.sinks.echo_path = user.sinks.echo_path;

    // Merge allowlists (default ⊔ user), then sort & dedupe
    default.sinks.deser_allowlist.extend(user.sinks.deser_allowlist);
    default.sinks.deser_allowlist.sort_unstable();
    default.sinks.deser_allowlist.dedup();

    default
}

#[test]
fn merge_configs_dedupes_allowlist_and_overrides_scalars() {
    let mut default_cfg = Config::default();
    default_cfg.sinks.deser_allowlist = vec!["User".into(), "Config".into()];

    let mut user_cfg = Config::default();
    user_cfg.sinks.deser_allowlist = vec!["Invoice".into(), "User".into()];
    user_cfg.runner.process_timeout_secs = 2;

    let merged = merge_configs(default_cfg, user_cfg);

    assert_eq!(merged.sinks.deser_allowlist, vec!["Config", "Invoice", "User"]);
    assert_eq!(merged.runner.process_timeout_secs, 2);
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [runner]
        process_timeout_secs = 1

        [output]
        quiet = true
    "#;
    fs::write(cfg_path.join("taintproof.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("taintproof.conf").is_file());

    assert_eq!(cfg.runner.process_timeout_secs, 1);
    assert!(cfg.output.quiet);

    assert_eq!(cfg.sinks.shell_path, "/bin/sh");
}
