pub mod content;
pub mod quality;
pub mod source;
pub mod translation;

pub use content::ContentRef;
pub use quality::Quality;
pub use source::{PlayerInfo, StreamSource, Subtitle};
pub use translation::Translation;
