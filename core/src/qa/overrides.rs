//! Deterministic fact overrides.
//!
//! A rule matches when every keyword group has at least one keyword contained
//! in the lower-cased question. Keywords are stems ("конституц") so inflected
//! forms match too.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub name: String,
    keyword_groups: Vec<Vec<String>>,
    answers: HashMap<String, String>,
    /// Answer language used when the question's language has no entry
    fallback_language: String,
}

impl OverrideRule {
    pub fn new(name: impl Into<String>, fallback_language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyword_groups: Vec::new(),
            answers: HashMap::new(),
            fallback_language: fallback_language.into(),
        }
    }

    /// Require at least one of `keywords` to appear in the question
    pub fn require_any<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keyword_groups.push(
            keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        );
        self
    }

    pub fn answer(mut self, language: &str, text: impl Into<String>) -> Self {
        self.answers.insert(language.to_lowercase(), text.into());
        self
    }

    pub fn matches(&self, question: &str) -> bool {
        let q = question.to_lowercase();
        !self.keyword_groups.is_empty()
            && self
                .keyword_groups
                .iter()
                .all(|group| group.iter().any(|k| q.contains(k.as_str())))
    }

    fn answer_for(&self, language: &str) -> Option<&str> {
        self.answers
            .get(language)
            .or_else(|| self.answers.get(&self.fallback_language))
            .map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    rules: Vec<OverrideRule>,
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Verified facts that must never be paraphrased by a model
    pub fn builtin() -> Self {
        let constitution = OverrideRule::new("constitution_in_force", "ky")
            .require_any(["конституц", "constitution"])
            .require_any([
                // ru
                "когда", "дата", "принят", "вступил", "вступлен", "последн", "актуальн", "редакц",
                // ky
                "качан", "кабыл", "күчүнө", "акыркы",
                // en
                "when", "date", "adopted", "in force", "current",
            ])
            .answer(
                "ru",
                "Действующая Конституция Кыргызской Республики вступила в силу 5 мая 2021 года.",
            )
            .answer(
                "ky",
                "Кыргыз Республикасынын Конституциясынын азыркы редакциясы 2021-жылдын 5-майында күчүнө кирген.",
            )
            .answer(
                "en",
                "The current Constitution of the Kyrgyz Republic entered into force on 5 May 2021.",
            );
        Self::empty().with_rule(constitution)
    }

    pub fn with_rule(mut self, rule: OverrideRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule's answer in `language`, as `(rule name, text)`.
    pub fn lookup(&self, question: &str, language: &str) -> Option<(&str, &str)> {
        self.rules
            .iter()
            .find(|r| r.matches(question))
            .and_then(|r| r.answer_for(language).map(|a| (r.name.as_str(), a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constitution_date_ru() {
        let table = OverrideTable::builtin();
        let (name, text) = table.lookup("Когда принята конституция?", "ru").unwrap();
        assert_eq!(name, "constitution_in_force");
        assert!(text.contains("5 мая 2021"));
    }

    #[test]
    fn test_constitution_date_ky_and_fallback() {
        let table = OverrideTable::builtin();
        let (_, ky) = table.lookup("Конституция качан кабыл алынган?", "ky").unwrap();
        assert!(ky.contains("2021-жылдын 5-майында"));

        // Unknown languages get the Kyrgyz answer
        let (_, other) = table.lookup("когда вступила конституция", "de").unwrap();
        assert_eq!(other, ky);
    }

    #[test]
    fn test_no_match_without_date_intent() {
        let table = OverrideTable::builtin();
        assert!(table.lookup("Что такое конституция?", "ru").is_none());
        assert!(table.lookup("Когда выборы?", "ru").is_none());
    }

    #[test]
    fn test_rule_without_groups_never_matches() {
        let rule = OverrideRule::new("empty", "ky").answer("ky", "x");
        assert!(!rule.matches("anything"));
    }
}
