use serde::{Deserialize, Serialize};

use super::quality::Quality;

/// Alternate audio track for one content reference.
///
/// Order is provider-defined and must be preserved: clients re-select a
/// translation by index into this list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub display_name: String,
    pub quality: Quality,
    pub provider: String,
}

impl Translation {
    pub fn new<I, N, P>(id: I, display_name: N, quality: Quality, provider: P) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        P: Into<String>,
    {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            quality,
            provider: provider.into(),
        }
    }
}
