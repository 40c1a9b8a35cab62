// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template-driven content with topic rotation

use super::{ContentError, ContentRequest, ContentSource};
use async_trait::async_trait;
use minijinja::{context, Environment, UndefinedBehavior};
use pb_core::ContentConfig;
use std::sync::Arc;

/// Renders the configured templates in rotation, one topic per post
#[derive(Clone)]
pub struct TemplateContentSource {
    env: Arc<Environment<'static>>,
    templates: Arc<[String]>,
    topics: Arc<[String]>,
    max_length: usize,
}

impl TemplateContentSource {
    /// Build from config, rejecting templates that do not compile
    pub fn new(config: &ContentConfig) -> Result<Self, ContentError> {
        if config.templates.is_empty() {
            return Err(ContentError::Template("no templates configured".to_string()));
        }
        // Syntax check only; rendering compiles each template again
        let check = Environment::new();
        for (i, source) in config.templates.iter().enumerate() {
            check
                .template_from_str(source)
                .map_err(|e| ContentError::Template(format!("template {}: {}", i, e)))?;
        }

        let mut env = Environment::new();
        // Misspelled variables should fail loudly rather than post blanks
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Ok(Self {
            env: Arc::new(env),
            templates: config.templates.clone().into(),
            topics: config.topics.clone().into(),
            max_length: config.max_length,
        })
    }

    fn render(&self, request: &ContentRequest) -> Result<String, ContentError> {
        let index = request.sequence as usize;
        let template = &self.templates[index % self.templates.len()];
        let topic = if self.topics.is_empty() {
            ""
        } else {
            self.topics[index % self.topics.len()].as_str()
        };

        let rendered = self
            .env
            .render_str(
                template,
                context! {
                    agent => request.agent_id,
                    handle => request.handle,
                    topic => topic,
                    date => request.at.format("%Y-%m-%d").to_string(),
                    sequence => request.sequence,
                },
            )
            .map_err(|e| ContentError::Template(e.to_string()))?;

        let text = rendered.trim();
        if text.is_empty() {
            return Err(ContentError::Empty);
        }
        Ok(truncate_words(text, self.max_length))
    }
}

#[async_trait]
impl ContentSource for TemplateContentSource {
    async fn generate(&self, request: &ContentRequest) -> Result<String, ContentError> {
        self.render(request)
    }
}

/// Shorten to at most `max` chars, cutting at a word boundary and marking
/// the cut with an ellipsis
fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    let kept = match cut.rfind(char::is_whitespace) {
        Some(i) if i > 0 => &cut[..i],
        _ => cut.as_str(),
    };
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
