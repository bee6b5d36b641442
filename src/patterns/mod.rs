//! Pattern registry for configuration-driven content scoring
//!
//! This module provides:
//! - Target-script Unicode ranges used for script-ratio scoring
//! - The curated regional keyword list used for keyword density
//! - Exclusion keywords marking tourist / foreign-visitor content
//! - Pre-compiled spam patterns for the quality gate

use crate::error::{Result, VidsiftError};
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive range of Unicode scalar values belonging to the target script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRange {
    pub start: u32,
    pub end: u32,
}

impl ScriptRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, c: char) -> bool {
        (self.start..=self.end).contains(&(c as u32))
    }
}

/// Spam pattern definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamPattern {
    pub name: String,
    pub pattern: String,
}

/// Keyword lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    pub region_keywords: Vec<String>,
    pub exclusion_keywords: Vec<String>,
}

/// Spam heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    /// A character followed by at least this many repeats counts as spam
    pub max_char_repeats: usize,
    pub patterns: Vec<SpamPattern>,
}

/// Patterns file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsFile {
    pub script_ranges: Vec<ScriptRange>,
    pub lexicon: LexiconConfig,
    pub spam: SpamConfig,
}

impl Default for PatternsFile {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            script_ranges: vec![
                ScriptRange::new(0x3040, 0x309F), // hiragana
                ScriptRange::new(0x30A0, 0x30FF), // katakana
                ScriptRange::new(0x4E00, 0x9FAF), // CJK ideographs
                ScriptRange::new(0xFF65, 0xFF9F), // half-width katakana
            ],
            lexicon: LexiconConfig {
                region_keywords: owned(&[
                    "日本", "にほん", "ニッポン", "東京", "大阪", "京都", "渋谷", "新宿", "原宿",
                    "秋葉原", "アニメ", "マンガ", "ラーメン", "寿司", "居酒屋", "コンビニ", "電車",
                    "JR", "地下鉄", "駅", "神社", "寺", "桜", "紅葉",
                ]),
                exclusion_keywords: owned(&[
                    "tourist",
                    "travel",
                    "visit",
                    "vacation",
                    "trip",
                    "foreigner",
                    "gaijin",
                    "english",
                    "korean",
                    "chinese",
                    "study abroad",
                    "exchange student",
                    "backpacker",
                ]),
            },
            spam: SpamConfig {
                max_char_repeats: 10,
                patterns: vec![
                    SpamPattern {
                        name: "exclamation_run".to_string(),
                        pattern: r"!{5,}".to_string(),
                    },
                    SpamPattern {
                        name: "question_run".to_string(),
                        pattern: r"\?{5,}".to_string(),
                    },
                    SpamPattern {
                        name: "www_link".to_string(),
                        pattern: r"www\.".to_string(),
                    },
                    SpamPattern {
                        name: "http_link".to_string(),
                        pattern: r"http".to_string(),
                    },
                ],
            },
        }
    }
}

/// Compiled spam pattern
#[derive(Debug, Clone)]
pub struct CompiledSpamPattern {
    pub name: String,
    pub regex: Regex,
}

/// Pattern registry with all pre-compiled patterns
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    pub script_ranges: Vec<ScriptRange>,
    /// Lower-cased regional keywords
    pub region_keywords: Vec<String>,
    /// Lower-cased exclusion keywords
    pub exclusion_keywords: Vec<String>,
    pub max_char_repeats: usize,
    pub spam_patterns: Vec<CompiledSpamPattern>,
}

impl PatternRegistry {
    /// Load pattern registry from a TOML patterns file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VidsiftError::Io {
            source: e,
            context: format!("Failed to read patterns file: {:?}", path),
        })?;
        let file: PatternsFile = toml::from_str(&content)?;

        Self::from_config(file)
    }

    /// Build pattern registry from parsed configuration
    pub fn from_config(file: PatternsFile) -> Result<Self> {
        if file.script_ranges.iter().any(|r| r.start > r.end) {
            return Err(VidsiftError::Config(
                "Script range start must not exceed its end".to_string(),
            ));
        }

        let spam_patterns = file
            .spam
            .patterns
            .iter()
            .map(|sp| -> Result<CompiledSpamPattern> {
                let regex = Regex::new(&sp.pattern)
                    .with_context(|| format!("Invalid spam pattern '{}'", sp.name))?;
                Ok(CompiledSpamPattern {
                    name: sp.name.clone(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let lower = |items: &[String]| items.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();

        Ok(Self {
            script_ranges: file.script_ranges,
            region_keywords: lower(&file.lexicon.region_keywords),
            exclusion_keywords: lower(&file.lexicon.exclusion_keywords),
            max_char_repeats: file.spam.max_char_repeats,
            spam_patterns,
        })
    }

    /// Registry with the built-in lexicon
    pub fn builtin() -> Result<Self> {
        Self::from_config(PatternsFile::default())
    }

    /// Load from an optional override file, falling back to the built-in lexicon
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::builtin(),
        }
    }

    /// Whether `c` belongs to the target script
    pub fn is_target_script(&self, c: char) -> bool {
        self.script_ranges.iter().any(|r| r.contains(c))
    }

    /// First exclusion keyword contained in already lower-cased text
    pub fn find_exclusion(&self, text: &str) -> Option<&str> {
        self.exclusion_keywords
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(|k| k.as_str())
    }

    /// Name of the first spam heuristic the text trips, if any
    pub fn find_spam(&self, text: &str) -> Option<&str> {
        if has_char_run(text, self.max_char_repeats) {
            return Some("repeated_char");
        }

        self.spam_patterns
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| p.name.as_str())
    }
}

/// True when some character is followed by at least `repeats` copies of itself.
/// Newlines never form a run.
fn has_char_run(text: &str, repeats: usize) -> bool {
    let mut prev: Option<char> = None;
    let mut run = 0usize;

    for c in text.chars() {
        if c != '\n' && prev == Some(c) {
            run += 1;
            if run >= repeats {
                return true;
            }
        } else {
            run = 0;
        }
        prev = Some(c);
    }

    false
}
