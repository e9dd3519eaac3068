//! Launcher configuration loaded from environment variables.
//!
//! All variables are optional. Blank values count as absent, and values that
//! fail to parse are logged and ignored so a typo never prevents the launcher
//! from starting in stub mode.

use std::path::PathBuf;

use tracing::warn;

/// Default port for the launcher's own HTTP listener.
pub const DEFAULT_LISTEN_PORT: u16 = 17872;

/// Model alias sent upstream when `USBLLM_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "default";

/// Sampling temperature used when `USBLLM_TEMPERATURE` is unset or invalid.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Models directory used when `USBLLM_MODELS_DIR` is unset.
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Static configuration record for one launcher process.
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    /// External chat-completion server. When set, the supervisor is skipped.
    pub upstream_url: Option<String>,
    /// Model name/alias the upstream expects.
    pub model: String,
    pub temperature: f32,

    /// Whether a local llama-server may be spawned on demand.
    pub autostart: bool,
    /// Path to the llama-server binary.
    pub bin_path: Option<PathBuf>,
    /// Explicit path to a `.gguf` file (takes precedence over `model_id`).
    pub model_file: Option<PathBuf>,
    /// Registry id resolved against `models_dir`.
    pub model_id: Option<String>,
    pub models_dir: PathBuf,
    /// Port for the local llama-server; auto-picked when absent.
    pub prefer_port: Option<u16>,
    pub ctx_size: Option<u32>,
    pub threads: Option<u32>,
    pub temp_dir: Option<PathBuf>,
    pub log_disable: bool,

    /// Text prepended to the structured system prompt.
    pub system_prelude: Option<String>,
    /// Whether the UI may offer a model picker.
    pub ui_allow_picker: bool,

    /// Port the launcher listens on (loopback only).
    pub listen_port: u16,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            autostart: false,
            bin_path: None,
            model_file: None,
            model_id: None,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            prefer_port: None,
            ctx_size: None,
            threads: None,
            temp_dir: None,
            log_disable: false,
            system_prelude: None,
            ui_allow_picker: false,
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl LauncherConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |key: &str| text(key).is_some_and(|v| parse_bool(&v));

        let temperature = match text("USBLLM_TEMPERATURE") {
            Some(raw) => match raw.parse::<f32>() {
                Ok(t) if t.is_finite() => t,
                _ => {
                    warn!(value = %raw, "Ignoring invalid USBLLM_TEMPERATURE");
                    DEFAULT_TEMPERATURE
                }
            },
            None => DEFAULT_TEMPERATURE,
        };

        Self {
            upstream_url: text("USBLLM_UPSTREAM_URL"),
            model: text("USBLLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            autostart: flag("USBLLM_AUTOSTART"),
            bin_path: text("USBLLM_LLAMA_BIN").map(PathBuf::from),
            model_file: text("USBLLM_MODEL_FILE").map(PathBuf::from),
            model_id: text("USBLLM_MODEL_ID"),
            models_dir: text("USBLLM_MODELS_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR), PathBuf::from),
            prefer_port: parse_number("USBLLM_LLAMA_PORT", text("USBLLM_LLAMA_PORT")),
            ctx_size: parse_number("USBLLM_CTX_SIZE", text("USBLLM_CTX_SIZE")),
            threads: parse_number("USBLLM_THREADS", text("USBLLM_THREADS")),
            temp_dir: text("USBLLM_TEMP_DIR").map(PathBuf::from),
            log_disable: flag("USBLLM_LOG_DISABLE"),
            system_prelude: text("USBLLM_SYSTEM_PRELUDE"),
            ui_allow_picker: flag("USBLLM_UI_ALLOW_PICKER"),
            listen_port: parse_number("PORT", text("PORT")).unwrap_or(DEFAULT_LISTEN_PORT),
        }
    }

    /// True when a local llama-server could be autostarted for drafts.
    pub fn autostart_configured(&self) -> bool {
        self.autostart
            && self.bin_path.is_some()
            && (self.model_file.is_some() || self.model_id.is_some())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring invalid numeric setting");
            None
        }
    }
}
