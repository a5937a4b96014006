/*!
 * Character encodings accepted for subtitle files.
 *
 * The encoding of a subtitle file is always stated by the caller. The UTF
 * family and Latin-1 are handled directly; any other WHATWG label (`cp1252`,
 * `shift_jis`, `gbk`, ...) is decoded through `encoding_rs`. Labels that are
 * not recognized are rejected instead of falling back to UTF-8.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

/// A subtitle file character encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum SubtitleEncoding {
    /// UTF-8, a leading BOM is tolerated
    #[default]
    Utf8,
    /// UTF-8 with an optional BOM, the label some tools expect
    Utf8Sig,
    /// UTF-16 with byte order taken from the BOM (little endian without one)
    Utf16,
    Utf16Le,
    Utf16Be,
    /// ISO-8859-1, every byte maps to the code point of the same value
    Latin1,
    /// Any other encoding known by its WHATWG label
    Other(&'static Encoding),
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

impl SubtitleEncoding {
    /// Canonical label, as accepted on the command line
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Sig => "utf-8-sig",
            Self::Utf16 => "utf-16",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Latin1 => "latin-1",
            Self::Other(encoding) => encoding.name(),
        }
    }

    /// Decode raw file bytes into text
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 | Self::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(body.to_vec())
                    .map_err(|e| anyhow!("invalid utf-8 at byte {}", e.utf8_error().valid_up_to()))
            }
            Self::Utf16 => match bytes {
                [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
                [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
                _ => decode_utf16(bytes, u16::from_le_bytes),
            },
            Self::Utf16Le => {
                let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
                decode_utf16(body, u16::from_le_bytes)
            }
            Self::Utf16Be => {
                let body = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
                decode_utf16(body, u16::from_be_bytes)
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Self::Other(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
                .ok_or_else(|| anyhow!("invalid {} data", encoding.name())),
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(anyhow!("utf-16 data has an odd number of bytes"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| anyhow!("invalid utf-16 sequence"))
}

impl fmt::Display for SubtitleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SubtitleEncoding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim().to_lowercase().replace('_', "-");
        match label.as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(Self::Utf8Sig),
            "utf-16" | "utf16" => Ok(Self::Utf16),
            "utf-16le" | "utf-16-le" => Ok(Self::Utf16Le),
            "utf-16be" | "utf-16-be" => Ok(Self::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            _ => [s.trim(), label.as_str()]
                .into_iter()
                .find_map(|candidate| Encoding::for_label(candidate.as_bytes()))
                // The replacement encoding only exists to refuse unsafe labels
                .filter(|encoding| *encoding != encoding_rs::REPLACEMENT)
                .map(Self::Other)
                .ok_or_else(|| anyhow!("Unsupported subtitle encoding: {}", s)),
        }
    }
}

impl TryFrom<String> for SubtitleEncoding {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SubtitleEncoding> for String {
    fn from(encoding: SubtitleEncoding) -> Self {
        encoding.label().to_string()
    }
}
