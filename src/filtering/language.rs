//! Pluggable language detection
//!
//! The pipeline depends on [`LanguageDetector`] only. [`WhatlangDetector`] is the
//! default; [`NullDetector`] disables detection entirely.

use whatlang::Lang;

/// Returned whenever no confident answer is available
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Best-effort language identification. Implementations must not block and must
/// answer [`UNKNOWN_LANGUAGE`] instead of failing.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> String;
}

/// Detector that never identifies anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl LanguageDetector for NullDetector {
    fn detect(&self, _text: &str) -> String {
        UNKNOWN_LANGUAGE.to_string()
    }
}

/// Trigram/script based detection backed by `whatlang`.
/// Work is bounded by the input length, so no timeout is needed.
#[derive(Debug, Clone)]
pub struct WhatlangDetector {
    min_chars: usize,
    min_confidence: f64,
}

impl WhatlangDetector {
    pub fn new(min_chars: usize, min_confidence: f64) -> Self {
        Self {
            min_chars,
            min_confidence,
        }
    }
}

impl Default for WhatlangDetector {
    fn default() -> Self {
        Self::new(10, 0.5)
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return UNKNOWN_LANGUAGE.to_string();
        }

        match whatlang::detect(trimmed) {
            Some(info) if info.confidence() >= self.min_confidence => {
                iso_639_1(info.lang()).to_string()
            }
            _ => UNKNOWN_LANGUAGE.to_string(),
        }
    }
}

/// Two-letter code where one exists, otherwise whatlang's ISO 639-3 code
fn iso_639_1(lang: Lang) -> &'static str {
    match lang {
        Lang::Jpn => "ja",
        Lang::Eng => "en",
        Lang::Kor => "ko",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Por => "pt",
        Lang::Rus => "ru",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Tha => "th",
        Lang::Vie => "vi",
        Lang::Ind => "id",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Pol => "pl",
        Lang::Ukr => "uk",
        other => other.code(),
    }
}
