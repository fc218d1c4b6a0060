//! Keyword category detection
//!
//! Categories are checked in priority order and the first keyword set with a
//! substring hit wins, so "workout for stress" is a fitness message.

use crate::conversation::Category;

const FITNESS_KEYWORDS: &[&str] = &["fitness", "workout", "exercise", "gym", "training"];

const NUTRITION_KEYWORDS: &[&str] = &["food", "nutrition", "diet", "eating", "meal"];

const MENTAL_KEYWORDS: &[&str] = &["mental", "stress", "anxiety", "mind", "meditation"];

fn keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Fitness => FITNESS_KEYWORDS,
        Category::Nutrition => NUTRITION_KEYWORDS,
        Category::Mental => MENTAL_KEYWORDS,
    }
}

/// Detect the category of a free-text message
pub fn detect_category(message: &str) -> Option<Category> {
    let lower = message.to_lowercase();

    Category::ALL
        .into_iter()
        .find(|category| keywords(*category).iter().any(|kw| lower.contains(kw)))
}
