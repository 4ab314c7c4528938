use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serline_core::{SendMode, TextEncoding};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    None,
    #[default]
    Lf,
    Cr,
    Crlf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "\n",
            LineEnding::Cr => "\r",
            LineEnding::Crlf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub send_mode: SendMode,
    pub encoding: TextEncoding,
    /// Appended to text sends, never to hex sends.
    pub line_ending: LineEnding,
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            send_mode: SendMode::Text,
            encoding: TextEncoding::Utf8,
            line_ending: LineEnding::Lf,
            poll_interval_ms: 10,
        }
    }
}

impl Settings {
    /// `<config dir>/serline/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("serline").join("settings.json"))
    }

    /// Defaults when the file doesn't exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }
}
