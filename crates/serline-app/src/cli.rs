use crate::settings::{LineEnding, Settings};
use clap::{Args, Parser, Subcommand};
use serline_core::{SendMode, TextEncoding};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "serline", version, about = "A lightweight serial port line monitor")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `serline_core=trace`. RUST_LOG wins if set.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports.
    List,
    /// Open a port, print received lines and send lines typed on stdin.
    Monitor(MonitorArgs),
}

#[derive(Args, Debug, Default)]
pub struct MonitorArgs {
    /// Port name, e.g. COM3 or /dev/ttyUSB0. Defaults to the saved port,
    /// then to the first port found.
    #[arg(short, long)]
    pub port: Option<String>,

    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Treat typed lines as hex bytes ("01 03 00 02").
    #[arg(long)]
    pub hex: bool,

    /// Decoding for received lines: UTF-8, GBK or AUTO.
    #[arg(long)]
    pub encoding: Option<TextEncoding>,

    /// Terminator appended to text sends.
    #[arg(long, value_enum)]
    pub line_ending: Option<LineEnding>,

    /// Store the effective options as the new defaults.
    #[arg(long)]
    pub save: bool,
}

impl MonitorArgs {
    /// Command-line options take precedence over `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if self.hex {
            settings.send_mode = SendMode::Hex;
        }
        if let Some(encoding) = self.encoding {
            settings.encoding = encoding;
        }
        if let Some(line_ending) = self.line_ending {
            settings.line_ending = line_ending;
        }
    }
}

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Send { payload: String, mode: SendMode },
    Stats,
    Quit,
    Unknown(String),
}

/// `:hex <bytes>` and `:text <string>` override the default mode for one
/// line; `:stats` and `:quit` are local commands. Text sends get
/// `line_ending` appended.
pub fn parse_input(line: &str, default_mode: SendMode, line_ending: LineEnding) -> Input {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let text = |payload: &str| Input::Send {
        payload: format!("{payload}{}", line_ending.as_str()),
        mode: SendMode::Text,
    };
    let hex = |payload: &str| Input::Send {
        payload: payload.to_string(),
        mode: SendMode::Hex,
    };

    if let Some(command) = line.strip_prefix(':') {
        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        return match name {
            "quit" | "q" => Input::Quit,
            "stats" => Input::Stats,
            "hex" => hex(rest),
            "text" => text(rest),
            _ => Input::Unknown(name.to_string()),
        };
    }

    match default_mode {
        SendMode::Text => text(line),
        SendMode::Hex => hex(line),
    }
}
