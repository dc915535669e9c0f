//! Offline analyzer used when no analysis endpoint is configured

use crate::analysis::{Analysis, AnalyzerError, ContentAnalyzer};
use async_trait::async_trait;
use std::collections::HashMap;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "her", "was", "one",
    "our", "out", "has", "have", "had", "his", "how", "its", "may", "new", "now", "see", "two",
    "who", "did", "get", "let", "she", "too", "use", "that", "with", "this", "from", "they",
    "will", "would", "there", "their", "what", "about", "which", "when", "your", "more", "were",
    "been", "than", "them", "then", "into", "also", "only", "some", "such", "these", "those",
    "other", "where", "while", "just", "like", "over", "each", "most", "very", "here",
];

/// Summarizes by lead sentences and picks topics by term frequency
#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    summary_sentences: usize,
    topic_count: usize,
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self {
            summary_sentences: 2,
            topic_count: 5,
        }
    }
}

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn summarize(&self, text: &str) -> String {
        let mut summary = String::new();
        let mut taken = 0;
        for sentence in text.split_inclusive(['.', '!', '?']) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(sentence);
            taken += 1;
            if taken == self.summary_sentences {
                break;
            }
        }
        summary
    }

    fn topics(&self, text: &str) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().count() < 4 {
                continue;
            }
            let word = word.to_lowercase();
            if STOPWORDS.contains(&word.as_str()) || word.chars().all(|c| c.is_numeric()) {
                continue;
            }
            *counts.entry(word).or_default() += 1;
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(self.topic_count)
            .map(|(word, _)| word)
            .collect()
    }
}

fn guess_content_type(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("step 1") || lower.contains("how to") || lower.contains("tutorial") {
        "tutorial"
    } else if lower.contains("posted on") || lower.contains("published") || lower.contains("blog")
    {
        "article"
    } else if lower.contains("documentation") || lower.contains("api reference") {
        "documentation"
    } else {
        "webpage"
    }
}

#[async_trait]
impl ContentAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalyzerError> {
        let words = text.split_whitespace().count();
        // Longer pages are treated as more substantial, saturating at 1500 words.
        let relevance = (words as f32 / 1500.0).clamp(0.1, 1.0);

        Ok(Analysis {
            summary: self.summarize(text),
            key_topics: self.topics(text),
            content_type: guess_content_type(text).to_string(),
            relevance_score: relevance,
            insights: Vec::new(),
        })
    }
}
