//! Salon service menu and hairstyle lookup.
//!
//! The menu is a TOML document embedded at compile time from
//! `data/services.toml` and parsed once per process.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::face_shape::FaceShape;
use crate::gender::Gender;

const SERVICES_TOML: &str = include_str!("../data/services.toml");

static MENU: OnceLock<MenuData> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCategory {
    Acne,
    Oily,
    Dry,
    Dull,
    Texture,
    Aging,
    Hair,
    Nails,
    Combos,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acne => "Acne",
            Self::Oily => "Oily",
            Self::Dry => "Dry",
            Self::Dull => "Dull",
            Self::Texture => "Texture",
            Self::Aging => "Aging",
            Self::Hair => "Hair",
            Self::Nails => "Nails",
            Self::Combos => "Combos",
        }
    }
}

/// One bookable salon service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub price: String,
    pub description: String,
}

/// Parsed menu document: gender → category → services, gender → shape → styles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuData {
    #[serde(default)]
    services: BTreeMap<String, BTreeMap<String, Vec<Service>>>,
    #[serde(default)]
    hairstyles: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl MenuData {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn services(&self, gender: Gender, category: ServiceCategory) -> &[Service] {
        self.services
            .get(gender.as_str())
            .and_then(|by_cat| by_cat.get(category.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn hairstyles(&self, gender: Gender, shape: FaceShape) -> &[String] {
        self.hairstyles
            .get(gender.as_str())
            .and_then(|by_shape| by_shape.get(shape.name()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Read-only lookup of services and hairstyles.
pub trait ServiceMenu: Send + Sync {
    fn services(&self, gender: Gender, category: ServiceCategory) -> &[Service];
    fn hairstyles(&self, gender: Gender, shape: FaceShape) -> &[String];
}

/// The compiled-in menu.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedMenu;

impl EmbeddedMenu {
    fn data(&self) -> &'static MenuData {
        MENU.get_or_init(|| match MenuData::from_toml_str(SERVICES_TOML) {
            Ok(menu) => menu,
            Err(e) => {
                tracing::error!(error = %e, "embedded service menu is malformed");
                MenuData::default()
            }
        })
    }
}

impl ServiceMenu for EmbeddedMenu {
    fn services(&self, gender: Gender, category: ServiceCategory) -> &[Service] {
        self.data().services(gender, category)
    }

    fn hairstyles(&self, gender: Gender, shape: FaceShape) -> &[String] {
        self.data().hairstyles(gender, shape)
    }
}

impl ServiceMenu for MenuData {
    fn services(&self, gender: Gender, category: ServiceCategory) -> &[Service] {
        MenuData::services(self, gender, category)
    }

    fn hairstyles(&self, gender: Gender, shape: FaceShape) -> &[String] {
        MenuData::hairstyles(self, gender, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_menu_parses() {
        let menu = MenuData::from_toml_str(SERVICES_TOML).expect("embedded menu parses");
        assert_eq!(menu.services(Gender::Male, ServiceCategory::Acne).len(), 2);
        assert_eq!(menu.services(Gender::Female, ServiceCategory::Combos)[0].name, "Total Radiance Package");
    }

    #[test]
    fn test_every_shape_has_three_styles() {
        let menu = EmbeddedMenu;
        for gender in [Gender::Male, Gender::Female] {
            for &shape in FaceShape::all() {
                assert_eq!(menu.hairstyles(gender, shape).len(), 3, "{gender} {shape}");
            }
        }
    }

    #[test]
    fn test_gender_specific_categories() {
        let menu = EmbeddedMenu;
        assert!(menu.services(Gender::Male, ServiceCategory::Nails).is_empty());
        assert_eq!(menu.services(Gender::Female, ServiceCategory::Nails).len(), 2);
        assert!(menu.services(Gender::Female, ServiceCategory::Dull).is_empty());
    }

    #[test]
    fn test_custom_menu_document() {
        let doc = r#"
            [[services.Female.Dry]]
            name = "Mist"
            price = "10"
            description = "A spray."

            [hairstyles.Female]
            Heart = ["Lob"]
        "#;
        let menu = MenuData::from_toml_str(doc).expect("parses");
        assert_eq!(menu.services(Gender::Female, ServiceCategory::Dry)[0].name, "Mist");
        assert_eq!(menu.hairstyles(Gender::Female, FaceShape::Heart), ["Lob".to_string()]);
        assert!(menu.hairstyles(Gender::Male, FaceShape::Heart).is_empty());
    }
}
