use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Garment category of a closet item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Top,
    Bottom,
    Outer,
    Dress,
    Shoes,
    Bag,
    Accessory,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Top => "top",
            Category::Bottom => "bottom",
            Category::Outer => "outer",
            Category::Dress => "dress",
            Category::Shoes => "shoes",
            Category::Bag => "bag",
            Category::Accessory => "accessory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "top" => Some(Category::Top),
            "bottom" => Some(Category::Bottom),
            "outer" => Some(Category::Outer),
            "dress" => Some(Category::Dress),
            "shoes" => Some(Category::Shoes),
            "bag" => Some(Category::Bag),
            "accessory" => Some(Category::Accessory),
            _ => None,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "fall" | "autumn" => Some(Season::Fall),
            "winter" => Some(Season::Winter),
            _ => None,
        }
    }

    /// Whether an outfit for this season gets an outer layer
    pub fn needs_outer(&self) -> bool {
        matches!(self, Season::Fall | Season::Winter)
    }
}

impl Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A label with the classifier's confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedLabel {
    pub value: String,
    pub confidence: f64,
}

/// Structured attributes produced by image analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub category: Category,
    #[serde(default)]
    pub detection_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleeve_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub material: Vec<WeightedLabel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub print: Vec<WeightedLabel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detail: Vec<WeightedLabel>,
}

impl ItemAttributes {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            detection_confidence: 1.0,
            sub_type: None,
            color: None,
            sub_color: None,
            sleeve_length: None,
            length: None,
            fit: None,
            material: Vec::new(),
            print: Vec::new(),
            detail: Vec::new(),
        }
    }
}

/// A single garment in the user's wardrobe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosetItem {
    pub id: String,
    pub image_url: String,
    pub attributes: ItemAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Empty means the item is worn in every season
    #[serde(default)]
    pub season: Vec<Season>,
    /// Image embedding, filled in asynchronously after upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_vector: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ClosetItem {
    pub fn category(&self) -> Category {
        self.attributes.category
    }

    pub fn fits_season(&self, season: Season) -> bool {
        self.season.is_empty() || self.season.contains(&season)
    }
}

/// Payload for creating a closet item
#[derive(Debug, Clone, Deserialize)]
pub struct NewClosetItem {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub attributes: Option<ItemAttributes>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub season: Vec<Season>,
}
