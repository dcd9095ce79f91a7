//! Symbology notation and the fixed rendering parameters that go with it.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use super::error::DomainError;

const MAX_COLOR_KEYWORD_LEN: usize = 32;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EcLevel {
    #[default]
    L,
    M,
    Q,
    H,
}

impl EcLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        }
    }
}

impl FromStr for EcLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            other => Err(DomainError::validation(format!(
                "unknown error-correction level `{other}`"
            ))),
        }
    }
}

/// Encoding scheme, written in the `TYPE[,PARAM...]` notation used by
/// barcode toolkits (`QRCODE,H`, `SRAW`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbology {
    QrCode { ec_level: EcLevel },
    /// 2D raw mode: comma-separated rows of `0`/`1` modules.
    Raw2d,
}

impl Default for Symbology {
    fn default() -> Self {
        Self::QrCode {
            ec_level: EcLevel::H,
        }
    }
}

impl Display for Symbology {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QrCode { ec_level } => write!(f, "QRCODE,{}", ec_level.as_str()),
            Self::Raw2d => f.write_str("SRAW"),
        }
    }
}

impl FromStr for Symbology {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let kind = parts.next().unwrap_or_default().to_ascii_uppercase();
        let params: Vec<&str> = parts.collect();

        match kind.as_str() {
            "QRCODE" => match params.as_slice() {
                [] => Ok(Self::QrCode {
                    ec_level: EcLevel::default(),
                }),
                [level] => Ok(Self::QrCode {
                    ec_level: level.parse()?,
                }),
                _ => Err(DomainError::validation(format!(
                    "unsupported QRCODE parameters in `{s}`"
                ))),
            },
            "SRAW" if params.is_empty() => Ok(Self::Raw2d),
            "SRAW" => Err(DomainError::validation("SRAW takes no parameters")),
            "" => Err(DomainError::validation("symbology must not be empty")),
            other => Err(DomainError::validation(format!(
                "unsupported symbology `{other}`"
            ))),
        }
    }
}

/// A fill color accepted verbatim into SVG attributes: a CSS keyword or `#hex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Color(String);

impl Color {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Color {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let valid = match value.strip_prefix('#') {
            Some(hex) => {
                matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
            }
            None => {
                !value.is_empty()
                    && value.len() <= MAX_COLOR_KEYWORD_LEN
                    && value.chars().all(|c| c.is_ascii_alphabetic())
            }
        };

        if valid {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(DomainError::validation(format!("invalid color `{value}`")))
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quiet zone around the symbol, in modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Padding {
    pub fn uniform(modules: u32) -> Self {
        Self {
            top: modules,
            right: modules,
            bottom: modules,
            left: modules,
        }
    }
}

/// Rendering parameters fixed by deployment configuration; never taken from
/// request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbologySpec {
    pub symbology: Symbology,
    /// Edge length of one module in SVG user units.
    pub module_size: u32,
    pub padding: Padding,
    pub foreground: Color,
    pub background: Color,
}

impl Default for SymbologySpec {
    fn default() -> Self {
        Self {
            symbology: Symbology::default(),
            module_size: 8,
            padding: Padding::uniform(2),
            foreground: Color("black".to_string()),
            background: Color("white".to_string()),
        }
    }
}
