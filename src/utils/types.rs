use crate::image_ops::image_types::Extensions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Primary key of an owner record, unique per kind
pub type RecordId = u64;

/// Encoded image, ready to be written to media storage
#[derive(Clone, Debug)]
pub struct ImageContainer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub extension: Extensions,
}

impl ImageContainer {
    pub fn new(data: Vec<u8>, width: u32, height: u32, extension: Extensions) -> Self {
        ImageContainer {
            data,
            width,
            height,
            extension,
        }
    }
}

/// Catalog entities that own an image attachment
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
pub enum OwnerKind {
    Event,
    EventGallery,
    Course,
    Gallery,
    Certificate,
}

/// A stored catalog record with its image attachments.
///
/// `images` maps a field name to a path relative to the media root. A missing
/// key and an empty value both mean the field holds no image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub kind: OwnerKind,
    pub id: RecordId,
    pub label: Option<String>,
    pub images: BTreeMap<String, String>,
}

impl OwnerRecord {
    pub fn new(kind: OwnerKind, id: RecordId) -> Self {
        OwnerRecord {
            kind,
            id,
            label: None,
            images: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_image(mut self, field: impl Into<String>, path: impl Into<String>) -> Self {
        self.images.insert(field.into(), path.into());
        self
    }

    pub fn image(&self, field: &str) -> Option<&str> {
        self.images
            .get(field)
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }

    pub fn set_image(&mut self, field: &str, path: String) {
        self.images.insert(field.to_string(), path);
    }
}

impl fmt::Display for OwnerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} {} ({})", self.kind, self.id, label),
            None => write!(f, "{} {}", self.kind, self.id),
        }
    }
}

/// One (record type, image field) pair scanned by the normalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerField {
    pub kind: OwnerKind,
    pub field: String,
}

impl OwnerField {
    pub fn new(kind: OwnerKind, field: impl Into<String>) -> Self {
        OwnerField {
            kind,
            field: field.into(),
        }
    }

    /// Image fields of the site catalog, in processing order
    pub fn site_defaults() -> Vec<OwnerField> {
        vec![
            OwnerField::new(OwnerKind::Event, "image"),
            OwnerField::new(OwnerKind::EventGallery, "img"),
            OwnerField::new(OwnerKind::Course, "image"),
            OwnerField::new(OwnerKind::Gallery, "img"),
            OwnerField::new(OwnerKind::Certificate, "img"),
        ]
    }
}

impl fmt::Display for OwnerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.field)
    }
}

#[derive(Debug)]
pub struct ParseOwnerFieldError {
    pub msg: String,
}

impl fmt::Display for ParseOwnerFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl FromStr for OwnerField {
    type Err = ParseOwnerFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, field)) = s.trim().split_once(':') else {
            return Err(ParseOwnerFieldError {
                msg: format!("Expected \"Kind:field\", got {}", s),
            });
        };
        let kind = OwnerKind::from_str(kind.trim()).map_err(|_| ParseOwnerFieldError {
            msg: format!("Unknown record kind {}", kind),
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(ParseOwnerFieldError {
                msg: format!("Empty field name in {}", s),
            });
        }
        Ok(OwnerField::new(kind, field))
    }
}

/// Ordered list of owner fields, parsed from `Kind:field,Kind:field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFields(pub Vec<OwnerField>);

impl FromStr for OwnerFields {
    type Err = ParseOwnerFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(OwnerField::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            return Err(ParseOwnerFieldError {
                msg: "At least one owner field is required".to_string(),
            });
        }
        Ok(OwnerFields(fields))
    }
}
