use serde::{Deserialize, Serialize};

/// Raw stream descriptor as addons return it. Shapes differ per addon;
/// everything is optional and normalization decides what survives.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddonStream {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "infoHash")]
    pub info_hash: Option<String>,
    /// Declared size in bytes, when the addon provides one.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, rename = "behaviorHints")]
    pub behavior_hints: Option<BehaviorHints>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BehaviorHints {
    #[serde(default, rename = "videoSize")]
    pub video_size: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StreamsEnvelope {
    #[serde(default)]
    pub streams: Vec<AddonStream>,
}

impl AddonStream {
    /// Free-text fields quality/size inference runs over.
    pub fn descriptive_text(&self) -> String {
        let mut text = String::new();
        if let Some(name) = &self.name {
            text.push_str(name);
            text.push('\n');
        }
        if let Some(title) = &self.title {
            text.push_str(title);
        }
        text
    }

    /// Declared byte size, preferring the explicit field over hints.
    pub fn declared_size(&self) -> Option<u64> {
        self.size
            .or_else(|| self.behavior_hints.as_ref().and_then(|h| h.video_size))
    }
}
