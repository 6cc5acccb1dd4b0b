use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod attempt;
pub mod exercise;
pub mod playback;
pub mod result;

/// Practice modules offered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Speaking,
    Listening,
    Reading,
}

impl ModuleKind {
    /// Short name used in API paths and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Speaking => "speak",
            ModuleKind::Listening => "listen",
            ModuleKind::Reading => "read",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "speak" | "speaking" => Ok(ModuleKind::Speaking),
            "listen" | "listening" => Ok(ModuleKind::Listening),
            "read" | "reading" => Ok(ModuleKind::Reading),
            _ => Err(format!("Invalid module: {}", value)),
        }
    }
}

/// CEFR proficiency bands the backend uses to size content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl Default for CefrLevel {
    // The backend falls back to B1 content when the profile level is unknown.
    fn default() -> Self {
        CefrLevel::B1
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            _ => Err(format!("Invalid CEFR level: {}", value)),
        }
    }
}
