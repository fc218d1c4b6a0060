//! Tip tables for the local response strategy
//!
//! The builtin tables are used unless a tip book is loaded from TOML.
//!
//! # Example Tip Book
//!
//! ```toml
//! fallback = "Ask me about fitness, nutrition, or mental health!"
//! fitness = ["Stretch for ten minutes after every session."]
//! nutrition = ["Eat a protein source with every meal."]
//! mental = ["Take five slow breaths before you open your inbox."]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::conversation::Category;

use super::ConfigError;

/// Tip lists per category plus the generic fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipBook {
    /// Reply used when no category was detected
    #[serde(default = "default_fallback")]
    pub fallback: String,

    pub fitness: Vec<String>,
    pub nutrition: Vec<String>,
    pub mental: Vec<String>,
}

fn default_fallback() -> String {
    builtin::FALLBACK.to_string()
}

impl TipBook {
    /// Load a tip book from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a tip book from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let book: TipBook = toml::from_str(content)?;
        book.validate()?;
        Ok(book)
    }

    /// Tips for a category, never empty once validated
    pub fn tips(&self, category: Category) -> &[String] {
        match category {
            Category::Fitness => &self.fitness,
            Category::Nutrition => &self.nutrition,
            Category::Mental => &self.mental,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback.trim().is_empty() {
            return Err(ConfigError::Validation("tip book fallback is empty".into()));
        }

        for category in Category::ALL {
            let tips = self.tips(category);
            if tips.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tip book has no {} tips",
                    category
                )));
            }
            if tips.iter().any(|tip| tip.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "tip book has a blank {} tip",
                    category
                )));
            }
        }

        Ok(())
    }
}

impl Default for TipBook {
    fn default() -> Self {
        let owned = |tips: &[&str]| -> Vec<String> { tips.iter().map(|t| t.to_string()).collect() };
        Self {
            fallback: default_fallback(),
            fitness: owned(builtin::FITNESS),
            nutrition: owned(builtin::NUTRITION),
            mental: owned(builtin::MENTAL),
        }
    }
}

/// Built-in tips that don't require files
pub mod builtin {
    pub const FALLBACK: &str = "I'm not sure about that one, bro. Ask me about fitness, nutrition, or mental health and I'll hook you up with a tip!";

    pub const FITNESS: &[&str] = &[
        "Start with compound lifts like squats, deadlifts, and bench press. They work multiple muscle groups at once, bro! 💪",
        "Don't skip leg day! Strong legs are the foundation of a strong body.",
        "Warm up for 5-10 minutes before every workout to get the blood flowing and prevent injuries.",
        "Progressive overload is key. Add a little weight or a few reps each week to keep gains coming.",
        "Rest days are part of the program. Your muscles grow while you recover, not while you train.",
    ];

    pub const NUTRITION: &[&str] = &[
        "Aim for a palm-sized portion of protein with every meal to support muscle recovery.",
        "Drink water throughout the day. Even mild dehydration can tank your energy, bro.",
        "Fill half your plate with vegetables. Fiber keeps you full and your gut happy. 🥦",
        "Prep your meals on Sunday so you're not tempted by fast food during the week.",
        "Don't fear healthy fats. Avocados, nuts, and olive oil fuel your body and brain.",
    ];

    pub const MENTAL: &[&str] = &[
        "Take five slow, deep breaths when stress hits. It tells your nervous system to chill. 🧘",
        "Try a 10-minute meditation in the morning to set the tone for your day.",
        "Get 7-9 hours of sleep. Rest is the ultimate mental recovery tool, bro.",
        "Write down three things you're grateful for each night. It rewires your mind for the positive.",
        "Talk it out. Reaching out to a friend when you're struggling is a sign of strength, not weakness.",
    ];
}
