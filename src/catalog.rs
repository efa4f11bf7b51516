use std::path::Path;

use dashmap::DashMap;
use thiserror::Error;

use crate::model::Space;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read spaces file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid spaces file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("spaces file defines no setups")]
    Empty,
}

/// Read-only lookup of the room's setups.
pub trait SpaceCatalog: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<Space>;
    /// Every setup, ordered by capacity ascending.
    fn list(&self) -> Vec<Space>;
}

pub struct StaticCatalog {
    spaces: DashMap<String, Space>,
}

impl StaticCatalog {
    pub fn new(spaces: impl IntoIterator<Item = Space>) -> Self {
        let map = DashMap::new();
        for space in spaces {
            map.insert(space.id.clone(), space);
        }
        Self { spaces: map }
    }

    /// Load a JSON array of spaces.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let spaces: Vec<Space> = serde_json::from_str(&raw)?;
        if spaces.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self::new(spaces))
    }

    pub fn with_default_setups() -> Self {
        Self::new(default_setups())
    }
}

impl SpaceCatalog for StaticCatalog {
    fn find_by_id(&self, id: &str) -> Option<Space> {
        self.spaces.get(id).map(|e| e.value().clone())
    }

    fn list(&self) -> Vec<Space> {
        let mut all: Vec<Space> = self.spaces.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.capacity.cmp(&b.capacity).then_with(|| a.id.cmp(&b.id)));
        all
    }
}

fn setup(
    id: &str,
    name_en: &str,
    name_fr: &str,
    capacity: u32,
    price_per_hour: f64,
    price_per_day: f64,
    amenities: &[&str],
) -> Space {
    Space {
        id: id.into(),
        name_en: name_en.into(),
        name_fr: name_fr.into(),
        capacity,
        price_per_hour,
        price_per_day,
        amenities: amenities.iter().map(|a| a.to_string()).collect(),
        available: true,
    }
}

/// The room's stock configurations.
pub fn default_setups() -> Vec<Space> {
    vec![
        setup(
            "setup-s",
            "Setup S (1-10 people)",
            "Configuration S (1-10 personnes)",
            10,
            10.0,
            60.0,
            &["Wi-Fi", "Projecteur/Écran", "Whiteboard", "Café"],
        ),
        setup(
            "setup-m",
            "Setup M (11-25 people)",
            "Configuration M (11-25 personnes)",
            25,
            15.0,
            90.0,
            &["Wi-Fi", "Projecteur/Écran", "Whiteboard", "Video Conferencing", "Café"],
        ),
        setup(
            "setup-l",
            "Setup L (26-40 people)",
            "Configuration L (26-40 personnes)",
            40,
            20.0,
            120.0,
            &[
                "Wi-Fi",
                "Projecteur/Écran",
                "Whiteboard",
                "Video Conferencing",
                "Café",
                "Sonorisation",
            ],
        ),
        setup(
            "setup-xl",
            "Setup XL (41-60 people)",
            "Configuration XL (41-60 personnes)",
            60,
            25.0,
            160.0,
            &[
                "Wi-Fi Premium",
                "Projecteur/Écran",
                "Whiteboard",
                "Video Conferencing",
                "Café",
                "Sonorisation",
                "Assistance Technique",
            ],
        ),
        setup(
            "coworking",
            "Co-working Space",
            "Espace de Coworking",
            1,
            0.5,
            3.0,
            &["Wi-Fi", "Mobilier & espaces communs", "Café"],
        ),
    ]
}
