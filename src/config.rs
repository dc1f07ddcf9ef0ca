use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub bundler: BundlerSettings,
    #[serde(default)]
    pub bridge: BridgeSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    /// Path to the Chrome/Chromium binary. Auto-detected when unset.
    /// Supports ${ENV_VAR} substitution
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Set to false inside containers that cannot run the Chrome sandbox
    #[serde(default = "default_true")]
    pub sandbox: bool,
    /// Extra command-line arguments passed to the browser
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BundlerSettings {
    /// External bundler invoked as `program args... <entry file>`,
    /// printing the bundle on stdout
    Command {
        #[serde(default = "default_bundler_program")]
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Inject the entry module as written, without module resolution
    Passthrough,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BridgeSettings {
    /// Upper bound for one sandbox call, in seconds. No limit when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Where entry modules are staged for the bundler.
    /// Defaults to the system temp directory.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_bundler_program() -> String {
    "browserify".to_string()
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: true,
            args: Vec::new(),
        }
    }
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self::Command {
            program: default_bundler_program(),
            args: Vec::new(),
        }
    }
}

impl BundlerSettings {
    /// Human-readable description of the bundler
    pub fn description(&self) -> String {
        match self {
            Self::Command { program, args } if args.is_empty() => format!("command ({program})"),
            Self::Command { program, args } => format!("command ({program} {})", args.join(" ")),
            Self::Passthrough => "passthrough".to_string(),
        }
    }
}

impl BridgeSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // Expand environment variables like ${CHROME_PATH}
        let expanded = shellexpand::env(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }
}
