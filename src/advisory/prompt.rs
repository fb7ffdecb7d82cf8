//! Localized prompt text, canned greeting menus and answer polishing

use std::sync::LazyLock;

use regex::Regex;

use crate::language::Language;

static GREETING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(hi|hello|hey|namaste|नमस्ते)$").ok());

/// Appended to text-only answers shorter than [`MIN_ANSWER_WORDS`]
pub const ELABORATION_SUFFIX: &str =
    "\n\n(Add specifics on: nutrient needs, irrigation, and monitoring signs.)";

pub const MIN_ANSWER_WORDS: usize = 6;

const STRUCTURE_HINDI: &str = "उत्तर का ढांचा:\n- संक्षिप्त सारांश (1 पंक्ति)\n- फसल / स्थिति पहचान\n- संभावित समस्याएं / कारण\n- तत्काल कदम (बुलेट)\n- पोषक तत्व / खाद सुझाव\n- पानी प्रबंधन\n- रोकथाम / अगले कदम\n\nजहाँ संभव हो मात्रा / समयावधि बताएं।";

const STRUCTURE_ENGLISH: &str = "Answer structure:\n- One-line summary\n- Crop / condition identification\n- Possible issues / causes\n- Immediate actionable steps (bullets)\n- Nutrient / fertilizer recommendation\n- Water management\n- Prevention / next steps\nProvide quantities / timing where possible.";

const GREETING_HINDI: &str = "🌾 नमस्ते! मैं आपका Krishi सहायक हूँ। आप इन विषयों पर पूछ सकते हैं:\n\n• फसल की बीमारी पहचान\n• उर्वरक / NPK / सूक्ष्म पोषक तत्व की जरूरत\n• मिट्टी की उर्वरता बढ़ाने के तरीके\n• सिंचाई का सही समय और मात्रा\n• कीट नियंत्रण (जैविक व रासायनिक)\n• मौसम आधारित सलाह\n\nउदाहरण लिखें: \"गेंहू में पत्तियाँ पीली हो रही हैं क्या करें\" या \"धान में पानी कब बदलें\"";

const GREETING_ENGLISH: &str = "🌾 Hello! I'm your farm advisor. You can ask about:\n\n• Disease or pest identification\n• Fertilizer / NPK / micronutrient schedules\n• Improving soil health\n• Accurate irrigation timing & amount\n• Organic vs chemical pest control\n• Weather-based planning\n\nTry asking: \"Leaves turning yellow in wheat\" or \"Best irrigation schedule for rice seedling stage\"";

/// True when the whole question is one of the fixed greeting tokens
#[must_use]
pub fn is_greeting(question: &str) -> bool {
    GREETING
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(question.trim()))
}

#[must_use]
pub fn greeting_menu(language: Language) -> &'static str {
    match language {
        Language::Hindi => GREETING_HINDI,
        Language::English => GREETING_ENGLISH,
    }
}

/// Instruction asking for the fixed advisory answer structure
#[must_use]
pub fn build_instruction(language: Language, question: Option<&str>, has_image: bool) -> String {
    match (language, has_image) {
        (Language::Hindi, true) => format!(
            "आप एक अनुभवी कृषि सलाहकार हैं। नीचे दी गई फसल की फोटो का विश्लेषण करें। {STRUCTURE_HINDI}"
        ),
        (Language::English, true) => format!(
            "You are an experienced agronomy advisor. Analyze the crop photo. {STRUCTURE_ENGLISH}"
        ),
        (Language::Hindi, false) => format!(
            "आप एक अनुभवी कृषि सलाहकार हैं। किसान ने पूछा है: \"{}\"\n{STRUCTURE_HINDI}",
            question.unwrap_or_default()
        ),
        (Language::English, false) => format!(
            "You are an experienced agronomy advisor. Farmer asked: \"{}\"\n{STRUCTURE_ENGLISH}",
            question.unwrap_or_default()
        ),
    }
}

/// Expand terse text-only answers with a fixed elaboration hint
#[must_use]
pub fn polish_answer(text: String, text_only: bool) -> String {
    let words = text.split_whitespace().count();
    if text_only && !text.is_empty() && words < MIN_ANSWER_WORDS {
        format!("{}{ELABORATION_SUFFIX}", text.trim())
    } else {
        text
    }
}
