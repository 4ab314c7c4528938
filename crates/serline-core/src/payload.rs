/// How a send payload string is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SendMode {
    /// UTF-8 bytes of the string, written verbatim.
    #[default]
    Text,
    /// Hex digit pairs, spaces ignored: `"01 03 00 00"`.
    Hex,
}

impl std::str::FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "hex" => Ok(Self::Hex),
            other => Err(format!("unknown send mode: {other}")),
        }
    }
}

/// Encode `payload` for the wire. An empty result means there is nothing
/// to send.
pub fn encode(payload: &str, mode: SendMode) -> Result<Vec<u8>, hex::FromHexError> {
    match mode {
        SendMode::Text => Ok(payload.as_bytes().to_vec()),
        SendMode::Hex => {
            let digits: String = payload.chars().filter(|&c| c != ' ').collect();
            hex::decode(digits)
        }
    }
}

/// `[0x01, 0x03, 0xFF]` -> `"01 03 FF"`.
pub fn to_hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
