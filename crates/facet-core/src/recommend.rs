//! Rule-table recommendation composer.
//!
//! Turns the classifier outputs into an ordered list of advice lines:
//! diagnosis, routine, styling, colour, lifestyle and salon suggestions.
//! Pure and deterministic.

use serde::{Deserialize, Serialize};

use crate::color::{ColorProfile, Season};
use crate::face_shape::FaceShape;
use crate::gender::Gender;
use crate::menu::{ServiceCategory, ServiceMenu};
use crate::shades::FoundationMatch;
use crate::skin::SkinScores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkinType {
    Oily,
    Dry,
    Combination,
    Balanced,
}

impl SkinType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Oily => "Oily",
            Self::Dry => "Dry",
            Self::Combination => "Combination",
            Self::Balanced => "Balanced",
        }
    }
}

pub fn skin_type(skin: &SkinScores) -> SkinType {
    let (oil, tex) = (skin.oiliness, skin.texture);
    if oil > 0.6 && tex < 0.4 {
        SkinType::Oily
    } else if oil < 0.4 && tex > 0.5 {
        SkinType::Dry
    } else if oil > 0.5 && tex > 0.4 {
        SkinType::Combination
    } else {
        SkinType::Balanced
    }
}

/// Everything the composer reads.
#[derive(Debug, Clone, Copy)]
pub struct Consultation<'a> {
    pub face_shape: FaceShape,
    pub gender: Gender,
    pub skin: &'a SkinScores,
    pub color: Option<&'a ColorProfile>,
    pub foundation: Option<&'a FoundationMatch>,
}

pub fn compose(c: &Consultation<'_>, menu: &dyn ServiceMenu) -> Vec<String> {
    let kind = skin_type(c.skin);
    let mut recs = vec![format!("**Diagnosis ({})**: {} Skin", c.gender, kind.name())];
    routine(c, kind, &mut recs);
    recs.push(styling_tip(c.face_shape, c.gender));

    let styles = menu.hairstyles(c.gender, c.face_shape);
    if !styles.is_empty() {
        recs.push(format!("💇 **Hairstyles for {} faces**: {}", c.face_shape, styles.join(", ")));
    }

    if let Some(profile) = c.color {
        recs.push(season_line(profile.season));
    }
    if let Some(m) = c.foundation {
        recs.push(format!(
            "🎨 **Foundation**: {} ({}), a {} shade with {} undertone (ΔE {:.1}).",
            m.shade,
            m.shade_hex,
            m.category.name(),
            m.undertone.name().to_lowercase(),
            m.delta_e
        ));
    }

    recs.push(lifestyle_line(c.skin).to_string());

    for category in service_categories(c.skin, kind) {
        if let Some(service) = menu.services(c.gender, category).first() {
            recs.push(format!("💆 **Salon Pick**: {} ({}) - {}", service.name, service.price, service.description));
        }
    }

    tracing::debug!(skin_type = kind.name(), lines = recs.len(), "composed recommendations");
    recs
}

fn routine(c: &Consultation<'_>, kind: SkinType, recs: &mut Vec<String>) {
    let SkinScores { acne, oiliness, texture } = *c.skin;
    let male = c.gender == Gender::Male;

    recs.push(
        match kind {
            SkinType::Oily | SkinType::Combination => {
                "🧴 **Cleanser**: Use a Gel or Foam cleanser with Salicylic Acid to control oil."
            }
            SkinType::Dry => "🧴 **Cleanser**: Use a Cream-based hydrating cleanser.",
            SkinType::Balanced => "🧴 **Cleanser**: Use a gentle daily cleanser.",
        }
        .to_string(),
    );

    if male && (acne > 0.1 || texture > 0.3) {
        recs.push("🪒 **Shaving**: Use a sensitive shaving gel and change blades often to prevent irritation.".to_string());
    }

    if acne > 0.3 {
        recs.push("🧪 **Treatment**: Apply Niacinamide (AM) and Spot Treatment (PM) for breakouts.".to_string());
    } else if texture > 0.4 {
        let serum = if male { "a gentle Exfoliant" } else { "Lactic Acid" };
        recs.push(format!("🧪 **Treatment**: Use Vitamin C (AM) and {serum} (PM) for smoothness."));
    } else if oiliness > 0.5 {
        recs.push("🧪 **Treatment**: Niacinamide Serum to regulate sebum.".to_string());
    }

    match kind {
        SkinType::Oily => recs.push("💧 **Moisturizer**: Lightweight, oil-free matte gel.".to_string()),
        SkinType::Dry => {
            recs.push("💧 **Moisturizer**: Rich hydration cream.".to_string());
            if male {
                recs.push("🧔 **Beard**: Apply beard oil to prevent skin dryness underneath.".to_string());
            }
        }
        _ => recs.push("💧 **Moisturizer**: Daily hydrating lotion.".to_string()),
    }

    recs.push("☀️ **SPF**: Daily Sunscreen is non-negotiable!".to_string());
}

fn styling_tip(shape: FaceShape, gender: Gender) -> String {
    let male = gender == Gender::Male;
    let (icon, topic) = if male { ("🧔", "Grooming") } else { ("💄", "Makeup") };
    let advice = match (shape, male) {
        (FaceShape::Round | FaceShape::Square, true) => format!("A squared beard style adds structure to a {shape} face."),
        (FaceShape::Round | FaceShape::Square, false) => {
            format!("Contour the jawline to add definition to your {shape} features.")
        }
        (FaceShape::Oval | FaceShape::Diamond, true) => {
            format!("A clean shave or short stubble highlights your {shape} symmetry.")
        }
        (FaceShape::Oval | FaceShape::Diamond, false) => {
            format!("Highlight cheekbones to accentuate your {shape} structure.")
        }
        (FaceShape::Heart, true) => format!("A fuller beard at the chin balances a {shape} face."),
        (FaceShape::Heart, false) => format!("Balance {shape} features by adding volume/highlight to the jawline."),
        (FaceShape::Long | FaceShape::Rectangle, true) => {
            format!("Keep the beard fuller at the sides to add width to a {shape} face.")
        }
        (FaceShape::Long | FaceShape::Rectangle, false) => {
            format!("Blush applied horizontally across the cheeks shortens a {shape} face.")
        }
        (FaceShape::Pear | FaceShape::Triangle, true) => {
            format!("Keep the beard short at the jaw and add volume on top to balance a {shape} face.")
        }
        (FaceShape::Pear | FaceShape::Triangle, false) => {
            format!("Highlight the temples and soften the jaw with contour to balance {shape} features.")
        }
    };
    format!("{icon} **{topic} Tip**: {advice}")
}

fn season_line(season: Season) -> String {
    let makeup = match season {
        Season::Spring => "try peachy blush and warm bronze eyeshadow",
        Season::Summer => "opt for rose blush and cool-toned mauves",
        Season::Autumn => "try warm bronze and brick red shades",
        Season::Winter => "choose bold reds and cool pinks",
    };
    format!("🎨 **{} Palette**: {}. For makeup, {makeup}.", season.name(), season.palette())
}

/// Lifestyle advice keyed to the dominant concern.
fn lifestyle_line(skin: &SkinScores) -> &'static str {
    if skin.acne > 0.3 {
        "🧘 Stress shows on your skin. Practice 10 minutes of daily meditation or deep breathing to reduce cortisol and prevent stress-related breakouts."
    } else if skin.texture > 0.4 || skin.oiliness < 0.4 {
        "🥗 Hydration starts from within. Drink 8 glasses of water daily and eat omega-3 rich foods (salmon, walnuts) for glowing skin."
    } else {
        "🌙 Quality sleep is your best beauty treatment! Aim for 7-9 hours and use a silk pillowcase to prevent sleep lines and hair breakage."
    }
}

/// Up to two menu categories matching the scores, or the combo package.
pub fn service_categories(skin: &SkinScores, kind: SkinType) -> Vec<ServiceCategory> {
    let mut picks = Vec::with_capacity(2);
    if skin.acne > 0.4 {
        picks.push(ServiceCategory::Acne);
    }
    match kind {
        SkinType::Oily | SkinType::Combination => picks.push(ServiceCategory::Oily),
        SkinType::Dry => picks.push(ServiceCategory::Dry),
        SkinType::Balanced => {}
    }
    if skin.texture > 0.5 {
        picks.push(ServiceCategory::Texture);
    }
    picks.truncate(2);
    if picks.is_empty() {
        picks.push(ServiceCategory::Combos);
    }
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::EmbeddedMenu;

    fn scores(acne: f32, oiliness: f32, texture: f32) -> SkinScores {
        SkinScores { acne, oiliness, texture }
    }

    fn consult(shape: FaceShape, gender: Gender, skin: &SkinScores) -> Vec<String> {
        let c = Consultation { face_shape: shape, gender, skin, color: None, foundation: None };
        compose(&c, &EmbeddedMenu)
    }

    #[test]
    fn test_skin_type_thresholds() {
        assert_eq!(skin_type(&scores(0.0, 0.7, 0.3)), SkinType::Oily);
        assert_eq!(skin_type(&scores(0.0, 0.3, 0.6)), SkinType::Dry);
        assert_eq!(skin_type(&scores(0.0, 0.55, 0.45)), SkinType::Combination);
        assert_eq!(skin_type(&scores(0.0, 0.45, 0.35)), SkinType::Balanced);
        // Boundaries are strict.
        assert_eq!(skin_type(&scores(0.0, 0.6, 0.3)), SkinType::Balanced);
    }

    #[test]
    fn test_diagnosis_comes_first() {
        let recs = consult(FaceShape::Oval, Gender::Female, &scores(0.0, 0.7, 0.3));
        assert_eq!(recs[0], "**Diagnosis (Female)**: Oily Skin");
        assert!(recs.iter().any(|r| r.contains("SPF")));
    }

    #[test]
    fn test_male_dry_gets_shaving_and_beard_lines() {
        let recs = consult(FaceShape::Square, Gender::Male, &scores(0.2, 0.3, 0.6));
        assert!(recs.iter().any(|r| r.starts_with("🪒")));
        assert!(recs.iter().any(|r| r.starts_with("🧔 **Beard**")));
        assert!(recs.iter().any(|r| r.contains("**Grooming Tip**") && r.contains("Square")));
    }

    #[test]
    fn test_female_never_gets_shaving_line() {
        let recs = consult(FaceShape::Heart, Gender::Female, &scores(0.9, 0.9, 0.9));
        assert!(!recs.iter().any(|r| r.starts_with("🪒")));
        assert!(recs.iter().any(|r| r.contains("**Makeup Tip**")));
    }

    #[test]
    fn test_hairstyles_from_menu() {
        let recs = consult(FaceShape::Round, Gender::Male, &scores(0.0, 0.45, 0.35));
        let line = recs.iter().find(|r| r.starts_with("💇")).expect("hairstyle line");
        assert!(line.contains("High Fade with Volume, Side Part, Angular Fringe"));
    }

    #[test]
    fn test_service_category_selection() {
        let acne_oily = scores(0.5, 0.7, 0.3);
        assert_eq!(
            service_categories(&acne_oily, skin_type(&acne_oily)),
            vec![ServiceCategory::Acne, ServiceCategory::Oily]
        );
        let everything = scores(0.5, 0.55, 0.6);
        assert_eq!(service_categories(&everything, skin_type(&everything)).len(), 2);
        let calm = scores(0.0, 0.45, 0.35);
        assert_eq!(service_categories(&calm, skin_type(&calm)), vec![ServiceCategory::Combos]);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let s = scores(0.15, 0.5, 0.45);
        assert_eq!(consult(FaceShape::Long, Gender::Female, &s), consult(FaceShape::Long, Gender::Female, &s));
    }

    #[test]
    fn test_every_shape_has_a_styling_tip() {
        for &shape in FaceShape::all() {
            for gender in [Gender::Male, Gender::Female] {
                assert!(styling_tip(shape, gender).contains(shape.name()));
            }
        }
    }

    #[test]
    fn test_season_line_included_with_profile() {
        use crate::color::{EyeColor, HairColor, SkinTone, Undertone};
        let profile = ColorProfile {
            skin_tone: SkinTone::Fair,
            undertone: Undertone::Cool,
            skin_hex: "#f0e0d0".into(),
            eye_color: EyeColor::Blue,
            eye_hex: "#4060a0".into(),
            hair_color: HairColor::Black,
            hair_hex: "#101010".into(),
            season: Season::Summer,
        };
        let skin = scores(0.0, 0.45, 0.35);
        let c = Consultation {
            face_shape: FaceShape::Oval,
            gender: Gender::Female,
            skin: &skin,
            color: Some(&profile),
            foundation: None,
        };
        let recs = compose(&c, &EmbeddedMenu);
        assert!(recs.iter().any(|r| r.contains("Summer Palette") && r.contains("lavender")));
    }
}
