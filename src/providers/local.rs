//! Canned tips picked at random after a short typing delay

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use crate::config::TipBook;
use crate::conversation::Category;

use super::{ResponseProvider, TipRequest};

pub struct LocalTipProvider {
    tips: TipBook,
    delay: Duration,
}

impl LocalTipProvider {
    pub fn new(tips: TipBook, delay: Duration) -> Self {
        Self { tips, delay }
    }

    /// Uniform pick from the category's list, or the fallback with no category
    pub fn pick(&self, category: Option<Category>) -> String {
        let Some(category) = category else {
            return self.tips.fallback.clone();
        };

        self.tips
            .tips(category)
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| self.tips.fallback.clone())
    }
}

#[async_trait]
impl ResponseProvider for LocalTipProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn respond(&self, request: &TipRequest) -> String {
        let reply = self.pick(request.category);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        tracing::debug!(category = ?request.category, "Picked local tip");
        reply
    }
}
