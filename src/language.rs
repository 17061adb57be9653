//! Heuristic detection of the language register a question is written in.
//!
//! This is not a language classifier. It counts letters per script and
//! looks for a handful of common romanized Telugu and Hindi words, which is
//! enough to tell the model whether to answer in English, in script, or in
//! the same code-mixed style the teacher used.

/// Register the answer should mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageHint {
    English,
    Telugu,
    Hindi,
    /// Native script mixed with Latin-script English words.
    MixedScript,
    /// Latin script carrying Telugu or Hindi words ("photosynthesis ante enti?").
    RomanizedCodeMix,
    Unknown,
}

const TELUGU: std::ops::RangeInclusive<char> = '\u{0C00}'..='\u{0C7F}';
const DEVANAGARI: std::ops::RangeInclusive<char> = '\u{0900}'..='\u{097F}';

/// Frequent romanized Telugu and Hindi function words.
const ROMANIZED_MARKERS: &[&str] = &[
    // Telugu
    "ante", "enti", "emiti", "ela", "ekkada", "eppudu", "enduku", "cheppu", "cheppandi",
    "undi", "ledu", "kaadu", "gurinchi", "lo", "ki", "nenu", "meeru", "avunu",
    // Hindi
    "kya", "hai", "kaise", "kyun", "nahi", "batao", "mein", "aur", "kaun", "kab",
];

/// Guess the register of `text`.
pub fn detect(text: &str) -> LanguageHint {
    let mut telugu = 0usize;
    let mut devanagari = 0usize;
    let mut latin = 0usize;

    for c in text.chars() {
        if TELUGU.contains(&c) {
            telugu += 1;
        } else if DEVANAGARI.contains(&c) {
            devanagari += 1;
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        }
    }

    let native = telugu + devanagari;
    if native == 0 && latin == 0 {
        return LanguageHint::Unknown;
    }
    if native > 0 && latin > 0 {
        return LanguageHint::MixedScript;
    }
    if telugu > 0 {
        return if telugu >= devanagari {
            LanguageHint::Telugu
        } else {
            LanguageHint::Hindi
        };
    }
    if devanagari > 0 {
        return LanguageHint::Hindi;
    }

    let has_marker = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .any(|w| ROMANIZED_MARKERS.contains(&w.to_ascii_lowercase().as_str()));
    if has_marker {
        LanguageHint::RomanizedCodeMix
    } else {
        LanguageHint::English
    }
}

impl LanguageHint {
    /// One-line instruction appended to the grounded prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            LanguageHint::English => "The question is in English. Answer in English.",
            LanguageHint::Telugu => "The question is in Telugu script. Answer in Telugu script.",
            LanguageHint::Hindi => "The question is in Hindi. Answer in Hindi.",
            LanguageHint::MixedScript => {
                "The question mixes Telugu or Hindi script with English words. \
                 Answer in the same mix, keeping English technical terms as they are."
            }
            LanguageHint::RomanizedCodeMix => {
                "The question is written in English letters but uses Telugu or Hindi words. \
                 Answer in the same romanized, code-mixed style."
            }
            LanguageHint::Unknown => "Answer in the language of the question.",
        }
    }
}
