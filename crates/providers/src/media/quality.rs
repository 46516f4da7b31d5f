use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static QUALITY_4K: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)2160p|4k|uhd").unwrap());
static QUALITY_1080: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)1080p|full\s*hd").unwrap());
static QUALITY_720: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)720p|\bhd\b").unwrap());
static QUALITY_480: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)480p").unwrap());
static QUALITY_360: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)360p").unwrap());

/// Fixed quality ladder every free-text provider label maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    Unknown,
    #[serde(rename = "360p")]
    Q360,
    #[serde(rename = "480p")]
    Q480,
    #[serde(rename = "720p")]
    Q720,
    #[serde(rename = "1080p")]
    Q1080,
    #[serde(rename = "4K")]
    Q4K,
}

impl Quality {
    /// Infers a quality from free-text provider metadata. Patterns are
    /// checked highest first so "4K 1080p remux" resolves to 4K.
    pub fn from_label(text: &str) -> Self {
        if QUALITY_4K.is_match(text) {
            Quality::Q4K
        } else if QUALITY_1080.is_match(text) {
            Quality::Q1080
        } else if QUALITY_720.is_match(text) {
            Quality::Q720
        } else if QUALITY_480.is_match(text) {
            Quality::Q480
        } else if QUALITY_360.is_match(text) {
            Quality::Q360
        } else {
            Quality::Unknown
        }
    }

    /// Numeric rank used for descending sorts; 4K ranks highest.
    pub fn rank(&self) -> u32 {
        match self {
            Quality::Q4K => 2160,
            Quality::Q1080 => 1080,
            Quality::Q720 => 720,
            Quality::Q480 => 480,
            Quality::Q360 => 360,
            Quality::Unknown => 0,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Quality::Q4K => "4K",
            Quality::Q1080 => "1080p",
            Quality::Q720 => "720p",
            Quality::Q480 => "480p",
            Quality::Q360 => "360p",
            Quality::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}
