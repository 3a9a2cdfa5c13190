use crate::error::EngineError;
use crate::types::{Question, QuestionId};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Source of word pairs for new games. Implementations must degrade through
/// the fallback chain rather than fail: category pool, then the full
/// cross-category pool, then reuse of already-used ids. Only a provider with
/// no questions at all reports `QuestionExhausted`.
pub trait QuestionProvider: Send + Sync {
    fn next(
        &self,
        category: Option<&str>,
        exclude: &HashSet<QuestionId>,
    ) -> Result<Question, EngineError>;
}

/// In-memory question bank, keyed by category.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    banks: HashMap<String, Vec<Question>>,
}

impl QuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small built-in bank so the server is playable with no data files.
    pub fn with_defaults() -> Self {
        let mut bank = Self::new();
        bank.add_category(
            "food",
            &[
                ("dumpling", "wonton"),
                ("coffee", "tea"),
                ("burger", "sandwich"),
                ("noodles", "pasta"),
            ],
        );
        bank.add_category(
            "places",
            &[
                ("beach", "lakeside"),
                ("cinema", "theater"),
                ("library", "bookstore"),
            ],
        );
        bank
    }

    pub fn add_category(&mut self, category: &str, pairs: &[(&str, &str)]) {
        let entries = self.banks.entry(category.to_string()).or_default();
        for (word_a, word_b) in pairs {
            let id = format!("{}-{}", category, entries.len());
            entries.push(Question {
                id,
                category: category.to_string(),
                word_a: word_a.to_string(),
                word_b: word_b.to_string(),
            });
        }
    }

    /// Load a bank from a JSON file of shape
    /// `{"category": [["wordA","wordB"], ...], ...}`.
    pub fn load_json(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: HashMap<String, Vec<(String, String)>> = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut bank = Self::new();
        for (category, pairs) in parsed {
            let pairs: Vec<(&str, &str)> = pairs
                .iter()
                .map(|(a, b)| (a.as_str(), b.as_str()))
                .collect();
            bank.add_category(&category, &pairs);
        }
        Ok(bank)
    }

    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self.banks.keys().cloned().collect();
        cats.sort();
        cats
    }

    pub fn total(&self) -> usize {
        self.banks.values().map(Vec::len).sum()
    }

    fn all_questions(&self) -> Vec<&Question> {
        self.banks.values().flatten().collect()
    }
}

impl QuestionProvider for QuestionBank {
    fn next(
        &self,
        category: Option<&str>,
        exclude: &HashSet<QuestionId>,
    ) -> Result<Question, EngineError> {
        let pool: Vec<&Question> = match category.and_then(|c| self.banks.get(c)) {
            Some(bank) if !bank.is_empty() => bank.iter().collect(),
            _ => self.all_questions(),
        };
        if pool.is_empty() {
            return Err(EngineError::QuestionExhausted);
        }

        let available: Vec<&Question> = pool
            .iter()
            .copied()
            .filter(|q| !exclude.contains(&q.id))
            .collect();
        let available = if available.is_empty() {
            tracing::info!("question pool exhausted for selection, reusing full pool");
            pool
        } else {
            available
        };

        let mut rng = rand::rng();
        Ok(available[rng.random_range(0..available.len())].clone())
    }
}
