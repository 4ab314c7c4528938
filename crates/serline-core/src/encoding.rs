use encoding_rs::{GBK, UTF_8};

/// How received lines are turned into text. Decoding never fails: bytes
/// that don't fit the encoding become U+FFFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "UTF-8"))]
    Utf8,
    #[cfg_attr(feature = "serde", serde(rename = "GBK"))]
    Gbk,
    #[cfg_attr(feature = "serde", serde(rename = "AUTO"))]
    Auto,
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Self::Utf8),
            "GBK" | "GB2312" => Ok(Self::Gbk),
            "AUTO" => Ok(Self::Auto),
            other => Err(format!("unknown encoding: {other}")),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "UTF-8",
            Self::Gbk => "GBK",
            Self::Auto => "AUTO",
        })
    }
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => UTF_8.decode_without_bom_handling(bytes).0.into_owned(),
            Self::Gbk => GBK.decode_without_bom_handling(bytes).0.into_owned(),
            Self::Auto => detect_and_decode(bytes),
        }
    }
}

fn detect_and_decode(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    encoding.decode_without_bom_handling(bytes).0.into_owned()
}
