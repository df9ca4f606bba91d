//! Keyword-routed beauty consultant chat.
//!
//! Replies are deterministic. A [`ChatContext`] from a previous analysis
//! personalises the answers where it is relevant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::{EyeColor, SkinTone};
use crate::face_shape::FaceShape;
use crate::gender::Gender;
use crate::menu::{EmbeddedMenu, ServiceCategory, ServiceMenu};
use crate::skin::SkinScores;

/// What the bot knows about the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatContext {
    pub gender: Option<Gender>,
    pub face_shape: Option<FaceShape>,
    pub skin: Option<SkinScores>,
    pub skin_tone: Option<SkinTone>,
    pub eye_color: Option<EyeColor>,
}

impl ChatContext {
    fn is_empty(&self) -> bool {
        self == &ChatContext::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Greeting,
    Thanks,
    Sunscreen,
    Diet,
    DarkSpots,
    Acne,
    Dryness,
    Oiliness,
    Ageing,
    Routine,
    Products,
    Hair,
    Makeup,
    Booking,
    Services,
    Sensitivity,
    Eyes,
}

/// Keywords per topic, checked in order; the first hit wins.
const ROUTES: &[(Topic, &[&str])] = &[
    (Topic::Greeting, &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"]),
    (Topic::Thanks, &["thank", "appreciate"]),
    (Topic::Sunscreen, &["sunscreen", "spf", "sun protection", "sun damage"]),
    (Topic::Diet, &["food", "diet", "nutrition", "eat", "eating", "vitamin", "supplement"]),
    (Topic::DarkSpots, &["dark spot", "pigment", "discolor", "uneven tone"]),
    (Topic::Acne, &["acne", "pimple", "breakout", "blemish", "spot"]),
    (Topic::Dryness, &["dry", "dryness", "dehydrat", "flaky", "moisture", "hydrat"]),
    (Topic::Oiliness, &["oily", "greasy", "shine", "sebum"]),
    (Topic::Ageing, &["aging", "ageing", "wrinkle", "fine line", "retinol"]),
    (Topic::Routine, &["routine", "regimen", "steps", "order", "morning", "night"]),
    (Topic::Products, &["recommend", "suggest", "product", "brand"]),
    (Topic::Hair, &["hairstyle", "haircut", "hair", "face shape"]),
    (Topic::Makeup, &["makeup", "foundation", "concealer", "blush", "lipstick"]),
    (Topic::Booking, &["book", "appointment", "schedule", "visit"]),
    (Topic::Services, &["service", "treatment", "facial", "peel", "massage", "price", "cost", "how much"]),
    (Topic::Sensitivity, &["sensitive", "irritat", "redness", "react"]),
    (Topic::Eyes, &["eye", "eyes", "dark circle", "puffy", "under eye"]),
];

/// Whole-word match for short keywords, substring match otherwise, so
/// "hi" does not fire on "this".
fn mentions(message: &str, keyword: &str) -> bool {
    if keyword.len() > 3 {
        return message.contains(keyword);
    }
    message
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == keyword)
}

fn route(message: &str) -> Option<Topic> {
    ROUTES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| mentions(message, k)))
        .map(|(topic, _)| *topic)
}

pub struct ConsultantBot {
    menu: Arc<dyn ServiceMenu>,
}

impl Default for ConsultantBot {
    fn default() -> Self {
        Self::new(Arc::new(EmbeddedMenu))
    }
}

impl std::fmt::Debug for ConsultantBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsultantBot").finish_non_exhaustive()
    }
}

impl ConsultantBot {
    pub fn new(menu: Arc<dyn ServiceMenu>) -> Self {
        Self { menu }
    }

    pub fn respond(&self, message: &str, context: Option<&ChatContext>) -> String {
        let msg = message.trim().to_lowercase();
        let empty = ChatContext::default();
        let ctx = context.unwrap_or(&empty);
        let topic = route(&msg);
        tracing::debug!(?topic, personalised = !ctx.is_empty(), "chat message routed");

        match topic {
            Some(Topic::Greeting) => "Hello! 👋 I'm your AI Beauty Consultant. I can help you with skincare routines, \
                product recommendations, and beauty tips. What would you like to know?"
                .to_string(),
            Some(Topic::Thanks) => {
                "You're very welcome! 💕 Feel free to ask me anything else about your beauty routine!".to_string()
            }
            Some(Topic::Sunscreen) => sunscreen(ctx),
            Some(Topic::Diet) => diet(ctx),
            Some(Topic::DarkSpots) => "To fade dark spots:\n• Vitamin C serum (morning)\n• Niacinamide or Alpha Arbutin\n\
                • Chemical exfoliant (AHA/BHA) 2-3x/week\n• SPF 50+ daily (prevents darkening)\n\
                • Be patient - takes 6-12 weeks! 🌟"
                .to_string(),
            Some(Topic::Acne) => acne(ctx),
            Some(Topic::Dryness) => "For dry skin, focus on hydration! Use:\n• Cream-based cleanser (not foam)\n\
                • Hyaluronic acid serum\n• Rich moisturizer with ceramides\n• Facial oil at night\n\
                • Drink 8 glasses of water daily 💧"
                .to_string(),
            Some(Topic::Oiliness) => oiliness(ctx),
            Some(Topic::Ageing) => "For anti-aging, the gold standard is:\n• Retinol/Retinoid at night (start slow!)\n\
                • Vitamin C serum in the morning\n• SPF 50+ daily (most important!)\n\
                • Hyaluronic acid for plumpness\n• Eye cream for delicate areas ✨"
                .to_string(),
            Some(Topic::Routine) => ROUTINE.to_string(),
            Some(Topic::Products) => products(&msg),
            Some(Topic::Hair) => self.hair(ctx),
            Some(Topic::Makeup) => makeup(ctx),
            Some(Topic::Booking) => "I'd love to help you book! Please call our salon or use the booking page to \
                schedule your appointment. Our team will take great care of you! 📅"
                .to_string(),
            Some(Topic::Services) => self.services(ctx),
            Some(Topic::Sensitivity) => "For sensitive skin:\n• Use fragrance-free products\n• Patch test new products\n\
                • Avoid harsh exfoliants\n• Choose gentle, hypoallergenic formulas\n\
                • Look for soothing ingredients like centella, aloe 🌿"
                .to_string(),
            Some(Topic::Eyes) => "For eye concerns:\n• **Dark circles**: Vitamin C or caffeine eye cream\n\
                • **Puffiness**: Cold compress, jade roller\n• **Fine lines**: Retinol eye cream (gentle!)\n\
                • Get 7-8 hours of sleep\n• Stay hydrated 👁️"
                .to_string(),
            None => fallback(ctx),
        }
    }

    fn hair(&self, ctx: &ChatContext) -> String {
        let Some(shape) = ctx.face_shape else {
            return "Upload a photo for face shape analysis, and I'll suggest the perfect hairstyles for you! 💇".to_string();
        };
        let gender = ctx.gender.unwrap_or(Gender::Female);
        let styles = self.menu.hairstyles(gender, shape);
        if styles.is_empty() {
            return format!("You have a {shape} face shape! Consult with a stylist for personalized recommendations. 💇");
        }
        format!("You have a {shape} face shape! Styles that suit you: {}. 💇", styles.join(", "))
    }

    fn services(&self, ctx: &ChatContext) -> String {
        let gender = ctx.gender.unwrap_or(Gender::Female);
        let mut reply = String::from("Our popular services include:\n");
        for category in [ServiceCategory::Acne, ServiceCategory::Dry, ServiceCategory::Texture, ServiceCategory::Combos] {
            if let Some(s) = self.menu.services(gender, category).first() {
                reply.push_str(&format!("• **{}** ({}) - {}\n", s.name, s.price, s.description));
            }
        }
        reply.push_str("\nAsk me about any specific treatment! 💆");
        reply
    }
}

const ROUTINE: &str = "Here's a basic routine:

**Morning:**
1. Cleanser
2. Toner (optional)
3. Serum (Vitamin C)
4. Moisturizer
5. SPF 50+

**Night:**
1. Cleanser (double cleanse if wearing makeup)
2. Toner
3. Treatment (Retinol/Niacinamide)
4. Moisturizer
5. Eye cream 🌙";

fn sunscreen(ctx: &ChatContext) -> String {
    match ctx.skin_tone {
        Some(tone) => format!(
            "For your {} skin tone, I recommend SPF 50+ broad-spectrum sunscreen daily. Apply 15 minutes before sun \
             exposure and reapply every 2 hours. Look for mineral sunscreens with zinc oxide or titanium dioxide for \
             sensitive skin. ☀️",
            tone.name()
        ),
        None => "SPF is crucial! Use SPF 50+ broad-spectrum sunscreen daily, even on cloudy days. Apply 15 minutes \
                 before going outside and reapply every 2 hours. This prevents premature aging and dark spots. ☀️"
            .to_string(),
    }
}

fn diet(ctx: &ChatContext) -> String {
    let mut reply = String::from("**Foods for Healthy Skin** 🥗\n\n");
    if let Some(skin) = ctx.skin {
        if skin.acne > 0.3 || skin.oiliness > 0.6 {
            reply.push_str(
                "**For Acne-Prone/Oily Skin:**\n\
                 • **Eat**: Omega-3 (salmon, walnuts), zinc (pumpkin seeds), green tea, berries\n\
                 • **Avoid**: Sugar, dairy, fried foods, processed carbs\n\
                 • **Drink**: 8+ glasses of water daily\n\n",
            );
        } else {
            reply.push_str(
                "**For Healthy Skin:**\n\
                 • **Vitamin C**: Oranges, strawberries, bell peppers (collagen production)\n\
                 • **Vitamin E**: Almonds, avocado, spinach (antioxidant)\n\
                 • **Omega-3**: Fatty fish, chia seeds, flaxseed (anti-inflammatory)\n\
                 • **Zinc**: Oysters, beef, lentils (healing)\n\
                 • **Water**: 8-10 glasses daily (hydration)\n\n",
            );
        }
    }
    reply.push_str(
        "**General Tips:**\n\
         • Limit sugar and processed foods\n\
         • Eat colorful fruits and vegetables\n\
         • Include healthy fats (avocado, nuts, olive oil)\n\
         • Consider probiotics (yogurt, kimchi) for gut health\n\
         • Green tea for antioxidants ☕",
    );
    reply
}

fn acne(ctx: &ChatContext) -> String {
    if ctx.skin.is_some_and(|s| s.acne > 0.3) {
        return "Based on your analysis, you have moderate acne concerns. I recommend:\n\
                • Cleanser with Salicylic Acid (2%)\n• Niacinamide serum in the morning\n\
                • Benzoyl Peroxide spot treatment at night\n• Oil-free moisturizer\n• Avoid touching your face! 🧴"
            .to_string();
    }
    "For acne-prone skin, use a gentle salicylic acid cleanser, niacinamide serum, and oil-free moisturizer. Avoid \
     heavy makeup and always remove it before bed. Consider seeing a dermatologist for persistent acne. 💊"
        .to_string()
}

fn oiliness(ctx: &ChatContext) -> String {
    match ctx.skin {
        Some(s) if s.oiliness > 0.6 => format!(
            "Your skin shows high oiliness ({:.0}%). Use:\n• Gel or foam cleanser with salicylic acid\n\
             • Lightweight, oil-free moisturizer\n• Niacinamide serum to control sebum\n• Clay mask 2x per week\n\
             • Blotting papers during the day 🧴",
            s.oiliness * 100.0
        ),
        _ => "For oily skin, use gel-based products, salicylic acid cleanser, and niacinamide serum. Don't skip \
              moisturizer - use oil-free formulas. Clay masks help control excess oil. 🌿"
            .to_string(),
    }
}

fn products(msg: &str) -> String {
    if msg.contains("cleanser") {
        "Great cleansers:\n• Cream cleanser with ceramides (dry skin)\n• Salicylic acid gel cleanser (oily/acne)\n\
         • Soap-free gentle cleanser (sensitive)\n• Squalane cleansing balm (all types) 🧴"
            .to_string()
    } else if msg.contains("serum") {
        "Top serums:\n• Niacinamide 10% (oil control)\n• Vitamin C with ferulic acid (brightening)\n\
         • Hyaluronic acid (hydration)\n• 2% BHA (exfoliation) 💧"
            .to_string()
    } else {
        "I can recommend products for specific needs! Ask me about cleansers, serums, moisturizers, or treatments \
         for your skin concern. 💄"
            .to_string()
    }
}

fn makeup(ctx: &ChatContext) -> String {
    match (ctx.skin_tone, ctx.eye_color) {
        (Some(tone), Some(eyes)) => format!(
            "For your {} skin and {} eyes:\n• Foundation: Match your neck, not your face\n\
             • Concealer: One shade lighter\n• Blush: Peachy tones for warm undertones, pink for cool\n\
             • Lipstick: Experiment with your seasonal palette! 💄",
            tone.name(),
            eyes.name()
        ),
        _ => "For makeup tips, upload a photo so I can analyze your skin tone and coloring! I'll suggest the perfect \
              shades for you. 💄"
            .to_string(),
    }
}

fn fallback(ctx: &ChatContext) -> String {
    if let Some(shape) = ctx.face_shape {
        let gender = ctx.gender.unwrap_or(Gender::Female);
        return format!(
            "I see you have a {shape} face shape ({} profile). I can help with:\n• Skincare routines\n\
             • Product recommendations\n• Hairstyle suggestions\n• Makeup tips\n• Treatment options\n\n\
             What would you like to know? 💫",
            gender.as_str().to_lowercase()
        );
    }
    "I'm here to help with all your beauty questions! Ask me about:\n• Skincare routines\n• Product recommendations\n\
     • Acne, dry skin, aging concerns\n• Hairstyles and makeup\n• Our salon services\n\n\
     Or upload a photo for personalized analysis! ✨"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> ConsultantBot {
        ConsultantBot::default()
    }

    fn analysed() -> ChatContext {
        ChatContext {
            gender: Some(Gender::Male),
            face_shape: Some(FaceShape::Square),
            skin: Some(SkinScores { acne: 0.45, oiliness: 0.7, texture: 0.2 }),
            skin_tone: Some(SkinTone::Medium),
            eye_color: Some(EyeColor::Hazel),
        }
    }

    #[test]
    fn test_greeting_is_whole_word() {
        assert!(bot().respond("Hi there", None).starts_with("Hello!"));
        // "this" contains "hi" but is not a greeting.
        assert!(!bot().respond("is this ok for acne?", None).starts_with("Hello!"));
    }

    #[test]
    fn test_acne_personalised_by_scores() {
        let plain = bot().respond("I have pimples", None);
        let personal = bot().respond("I have pimples", Some(&analysed()));
        assert!(plain.starts_with("For acne-prone skin"));
        assert!(personal.starts_with("Based on your analysis"));
    }

    #[test]
    fn test_dark_spots_beat_acne_spot_keyword() {
        assert!(bot().respond("how do I fade a dark spot?", None).starts_with("To fade dark spots"));
    }

    #[test]
    fn test_oiliness_reports_percentage() {
        let reply = bot().respond("my face is so greasy", Some(&analysed()));
        assert!(reply.contains("(70%)"), "{reply}");
    }

    #[test]
    fn test_hair_uses_menu_styles() {
        let reply = bot().respond("what haircut should I get?", Some(&analysed()));
        assert!(reply.contains("Square"));
        assert!(reply.contains("Buzz Cut, Crew Cut, Undercut"));
    }

    #[test]
    fn test_makeup_needs_colour_context() {
        assert!(bot().respond("which blush?", None).starts_with("For makeup tips"));
        let reply = bot().respond("which blush?", Some(&analysed()));
        assert!(reply.contains("Medium skin and Hazel eyes"));
    }

    #[test]
    fn test_services_listed_from_menu() {
        let reply = bot().respond("what services do you offer", Some(&analysed()));
        assert!(reply.contains("Herbal Face Cleanup"));
        assert!(reply.contains("The Gentleman's Cut & Detox"));
    }

    #[test]
    fn test_fallback_mentions_face_shape() {
        let reply = bot().respond("tell me something", Some(&analysed()));
        assert!(reply.contains("Square face shape (male profile)"));
        assert!(bot().respond("tell me something", None).starts_with("I'm here to help"));
    }

    #[test]
    fn test_context_deserialises_partially() {
        let ctx: ChatContext = serde_json::from_str(r#"{"gender":"Female","skin_tone":"Light-Medium"}"#).unwrap();
        assert_eq!(ctx.gender, Some(Gender::Female));
        assert_eq!(ctx.skin_tone, Some(SkinTone::LightMedium));
        assert!(ctx.face_shape.is_none());
    }
}
