// Text extraction and content scoring
use crate::patterns::PatternRegistry;
use crate::record::VideoRecord;

/// Concatenate description, hashtags, music title and author name into one
/// lower-cased string. Empty fields contribute nothing.
pub fn extract_text(record: &VideoRecord) -> String {
    std::iter::once(record.description.as_str())
        .chain(record.hashtags.iter().map(String::as_str))
        .chain([record.music_title.as_str(), record.author_nickname.as_str()])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fraction of characters that belong to the target script
pub fn script_ratio(patterns: &PatternRegistry, text: &str) -> f64 {
    let mut total = 0usize;
    let mut matching = 0usize;

    for c in text.chars() {
        total += 1;
        if patterns.is_target_script(c) {
            matching += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    matching as f64 / total as f64
}

/// Distinct regional keywords found in `text`, divided by its whitespace token count
pub fn keyword_density(patterns: &PatternRegistry, text: &str) -> f64 {
    let tokens = text.split_whitespace().count();
    if tokens == 0 {
        return 0.0;
    }

    let hits = patterns
        .region_keywords
        .iter()
        .filter(|k| text.contains(k.as_str()))
        .count();

    hits as f64 / tokens as f64
}
