//! Keyword relevance filter shared by all adapters

/// Framework and ecosystem terms; at least one is required
pub const FRAMEWORK_KEYWORDS: &[&str] = &[
    "laravel",
    "php",
    "eloquent",
    "artisan",
    "blade",
    "livewire",
    "inertia",
    "filament",
    "nova",
    "vapor",
    "forge",
    "laravel cloud",
    "pest",
    "sail",
];

/// AI and agent terms; at least one is required
pub const AI_KEYWORDS: &[&str] = &[
    "ai",
    "skill",
    "skills",
    "agent",
    "claude",
    "cursor",
    "copilot",
    "windsurf",
    "chatgpt",
    "llm",
    "prompt",
    "vibe coding",
    "ai-first",
    "coding agent",
    "claude code",
];

/// Hashtag that qualifies a post on its own
pub const BRANDED_HASHTAG: &str = "#laravelskills";

/// Substring-based relevance filter.
///
/// Text passes when it contains the branded hashtag, or at least one framework
/// keyword together with at least one AI keyword. Matching is case-insensitive
/// containment with no tokenization, so "ai" also matches inside "email".
#[derive(Debug, Clone)]
pub struct ContentFilter {
    framework: Vec<String>,
    ai: Vec<String>,
    hashtag: String,
}

impl ContentFilter {
    pub fn new(
        framework: impl IntoIterator<Item = impl Into<String>>,
        ai: impl IntoIterator<Item = impl Into<String>>,
        hashtag: impl Into<String>,
    ) -> Self {
        Self {
            framework: lowercase_all(framework),
            ai: lowercase_all(ai),
            hashtag: hashtag.into().to_lowercase(),
        }
    }

    /// Whether the text is relevant
    pub fn passes(&self, text: &str) -> bool {
        let lower = text.to_lowercase();

        if !self.hashtag.is_empty() && lower.contains(&self.hashtag) {
            return true;
        }

        contains_any(&lower, &self.framework) && contains_any(&lower, &self.ai)
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(
            FRAMEWORK_KEYWORDS.iter().copied(),
            AI_KEYWORDS.iter().copied(),
            BRANDED_HASHTAG,
        )
    }
}

fn lowercase_all(words: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    words.into_iter().map(|w| w.into().to_lowercase()).collect()
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branded_hashtag_always_passes() {
        let filter = ContentFilter::default();
        assert!(filter.passes("#LaravelSkills"));
        assert!(filter.passes("nothing relevant here #laravelskills !"));
        assert!(filter.passes("Laravel + Claude Code skill released #laravelskills"));
    }

    #[test]
    fn test_requires_both_groups() {
        let filter = ContentFilter::default();
        assert!(filter.passes("Building a Laravel agent with Claude"));
        assert!(filter.passes("PHP and LLM tooling"));
    }

    #[test]
    fn test_framework_only_fails() {
        let filter = ContentFilter::default();
        assert!(!filter.passes("Laravel 12 released with new Eloquent casts"));
    }

    #[test]
    fn test_ai_only_fails() {
        let filter = ContentFilter::default();
        assert!(!filter.passes("Claude and ChatGPT compared"));
    }

    #[test]
    fn test_empty_text_fails() {
        assert!(!ContentFilter::default().passes(""));
    }

    #[test]
    fn test_substring_matching_is_naive() {
        let filter = ContentFilter::default();
        // "sail" inside "sailing" and "ai" inside "sailing"
        assert!(filter.passes("sailing"));
    }

    #[test]
    fn test_custom_lists_are_case_insensitive() {
        let filter = ContentFilter::new(["Rust"], ["Agent"], "#RustAgents");
        assert!(filter.passes("rust AGENT"));
        assert!(filter.passes("#rustagents"));
        assert!(!filter.passes("rust only"));
    }

    #[test]
    fn test_empty_hashtag_never_matches_alone() {
        let filter = ContentFilter::new(["laravel"], ["ai"], "");
        assert!(!filter.passes("anything"));
    }
}
