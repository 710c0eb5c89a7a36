use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub trait MimeType {
    fn mime_type(&self) -> &str;
}

/// Formats the normalizer re-encodes into
#[derive(
    Deserialize, Serialize, Debug, PartialEq, Hash, Eq, Copy, Clone, EnumString, Display, Default,
)]
pub enum Extensions {
    #[default]
    Webp,
}

impl Extensions {
    pub fn name(&self) -> &str {
        match self {
            Extensions::Webp => "webp",
        }
    }
}

impl MimeType for Extensions {
    fn mime_type(&self) -> &str {
        match &self {
            Extensions::Webp => "image/webp",
        }
    }
}
