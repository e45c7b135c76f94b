use serde::{Deserialize, Serialize};

/// Object-class label used by the segmentation and materialisation stages.
/// The backend understands exactly this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Car,
    Furniture,
    Building,
    Instrument,
    Plant,
}

impl Category {
    /// Identifier sent over the wire.
    pub fn id(&self) -> &str {
        match self {
            Self::Car => "car",
            Self::Furniture => "furniture",
            Self::Building => "building",
            Self::Instrument => "instrument",
            Self::Plant => "plant",
        }
    }

    /// Label for display in UI.
    pub fn label(&self) -> &str {
        match self {
            Self::Car => "Car",
            Self::Furniture => "Furniture",
            Self::Building => "Building",
            Self::Instrument => "Instrument",
            Self::Plant => "Plant",
        }
    }

    /// All selectable categories.
    pub fn all() -> [Category; 5] {
        [
            Self::Car,
            Self::Furniture,
            Self::Building,
            Self::Instrument,
            Self::Plant,
        ]
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Car
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ids() {
        assert_eq!(Category::Car.id(), "car");
        assert_eq!(Category::Instrument.id(), "instrument");
    }

    #[test]
    fn test_wire_format_is_lowercase() {
        let json = serde_json::to_string(&Category::Furniture).unwrap();
        assert_eq!(json, "\"furniture\"");
    }

    #[test]
    fn test_all_categories() {
        assert_eq!(Category::all().len(), 5);
    }
}
