use std::sync::LazyLock;

use regex::Regex;

/// Maximum length of any single free-text clinical field in characters.
pub const MAX_FIELD_LENGTH: usize = 2_000;

/// Cleaned text plus a record of what was stripped (no patient data).
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedText {
    pub text: String,
    pub modifications: Vec<ModificationKind>,
}

impl SanitizedText {
    pub fn was_modified(&self) -> bool {
        !self.modifications.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    InvisibleUnicodeRemoved,
    ControlCharacterRemoved,
    InjectionPatternRemoved,
    ExcessiveLengthTruncated,
}

/// Sanitize untrusted text before it reaches the reasoning model.
///
/// Applies to clinician input and to retrieved evidence alike.
pub fn sanitize_text(raw: &str, max_length: usize) -> SanitizedText {
    let mut text = raw.to_string();
    let mut modifications = Vec::new();

    // Step 1: Remove non-visible Unicode characters
    let cleaned = remove_invisible_unicode(&text);
    if cleaned != text {
        modifications.push(ModificationKind::InvisibleUnicodeRemoved);
        text = cleaned;
    }

    // Step 2: Remove control characters (except newline, tab)
    let cleaned = remove_control_characters(&text);
    if cleaned != text {
        modifications.push(ModificationKind::ControlCharacterRemoved);
        text = cleaned;
    }

    // Step 3: Neutralise prompt injection patterns
    let cleaned = remove_injection_patterns(&text);
    if cleaned != text {
        modifications.push(ModificationKind::InjectionPatternRemoved);
        text = cleaned;
    }

    // Step 4: Truncate to maximum length
    if text.chars().count() > max_length {
        text = truncate_at_word_boundary(&text, max_length);
        modifications.push(ModificationKind::ExcessiveLengthTruncated);
    }

    SanitizedText {
        text,
        modifications,
    }
}

/// Sanitize a single clinical field with the default length cap.
pub fn sanitize_field(raw: &str) -> String {
    sanitize_text(raw, MAX_FIELD_LENGTH).text
}

/// Remove zero-width and invisible Unicode characters.
fn remove_invisible_unicode(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(
                *c,
                '\u{200B}'..='\u{200F}'  // Zero-width chars
                | '\u{202A}'..='\u{202E}' // Directional formatting
                | '\u{2060}'..='\u{2064}' // Invisible operators
                | '\u{2066}'..='\u{2069}' // Directional isolates
                | '\u{FEFF}'              // BOM
                | '\u{00AD}'              // Soft hyphen
                | '\u{034F}'              // Combining grapheme joiner
                | '\u{061C}'              // Arabic letter mark
                | '\u{180E}'              // Mongolian vowel separator
            )
        })
        .collect()
}

/// Remove control characters except newline and tab.
fn remove_control_characters(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Replace known prompt injection patterns with [FILTERED].
fn remove_injection_patterns(text: &str) -> String {
    static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            // Role override attempts
            r"(?i)ignore\s+(?:previous|above|all\s+prior|the\s+above)\s+(?:instructions?|rules?|prompts?)",
            r"(?i)forget\s+(?:everything|all|your)\s+(?:previous|prior)?",
            r"(?i)new\s+instructions?:",
            r"(?i)you\s+are\s+now\s+(?:a|an)\s+",
            // System/role tags
            r"(?i)system\s*:",
            r"(?i)assistant\s*:",
            r"<<SYS>>",
            r"\[INST\]",
            r"<\|im_start\|>",
            r"<\|im_end\|>",
            // Context delimiter spoofing
            r"(?i)</?(?:PATIENT_DATA|EVIDENCE|GUIDANCE)>",
            // Jailbreak patterns
            r"(?i)(?:DAN|do\s+anything\s+now)\s+mode",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });

    let mut result = text.to_string();
    for pattern in INJECTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[FILTERED]").into_owned();
    }
    result
}

/// Truncate to at most `max` characters, preferring the last word boundary.
pub fn truncate_at_word_boundary(text: &str, max: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max) else {
        return text.to_string();
    };
    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => truncated[..pos].trim_end().to_string(),
        _ => truncated.to_string(),
    }
}
