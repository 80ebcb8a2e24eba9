//! Word-level polarity lookup. The fallback strategy, and the only one
//! that works offline.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use redpulse_common::{SentimentAnnotation, SentimentLabel, SentimentMethod};

/// Confidence reported for every lexicon annotation on non-empty text.
/// Kept below what a transformer typically reports so consumers can tell
/// the two apart.
pub const LEXICON_CONFIDENCE: f64 = 0.35;

/// Scores above this are positive, below its negation negative.
const LABEL_THRESHOLD: f64 = 0.1;

/// Tokens after a negation whose polarity is flipped.
const NEGATION_WINDOW: usize = 3;

/// Factor applied to a negated word's score after flipping it.
const NEGATION_DAMPING: f64 = 0.8;

/// Unmatched tokens after an intensity modifier before it lapses.
const MODIFIER_WINDOW: usize = 2;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+(?:'[a-z]+)?|🚀|📈|📉|💎|🌈|🐻|🐂|🤡|🔥").unwrap());

static LEXICON: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    [
        // general positive
        ("good", 0.5),
        ("great", 0.7),
        ("excellent", 0.9),
        ("amazing", 0.8),
        ("awesome", 0.8),
        ("love", 0.7),
        ("like", 0.3),
        ("happy", 0.6),
        ("best", 0.7),
        ("better", 0.4),
        ("nice", 0.4),
        ("win", 0.6),
        ("winning", 0.6),
        ("strong", 0.5),
        ("solid", 0.4),
        ("impressive", 0.6),
        ("optimistic", 0.6),
        ("confident", 0.5),
        ("beat", 0.5),
        ("beats", 0.5),
        ("recommend", 0.5),
        ("thanks", 0.3),
        ("profit", 0.6),
        ("profits", 0.6),
        ("profitable", 0.6),
        ("gain", 0.5),
        ("gains", 0.6),
        ("growth", 0.5),
        ("upgrade", 0.5),
        ("rally", 0.6),
        ("surge", 0.6),
        ("soar", 0.7),
        ("soaring", 0.7),
        ("bullish", 0.8),
        ("bull", 0.5),
        ("undervalued", 0.5),
        ("outperform", 0.6),
        ("breakout", 0.5),
        // reddit / finance slang, positive
        ("moon", 0.8),
        ("mooning", 0.8),
        ("tendies", 0.7),
        ("stonks", 0.5),
        ("hodl", 0.4),
        ("squeeze", 0.4),
        ("rocket", 0.6),
        ("lfg", 0.6),
        ("based", 0.4),
        ("🚀", 0.7),
        ("📈", 0.6),
        ("💎", 0.5),
        ("🐂", 0.5),
        ("🔥", 0.4),
        // general negative
        ("bad", -0.5),
        ("terrible", -0.8),
        ("awful", -0.8),
        ("horrible", -0.8),
        ("worst", -0.8),
        ("worse", -0.5),
        ("hate", -0.7),
        ("sad", -0.5),
        ("angry", -0.6),
        ("disappointing", -0.6),
        ("disappointed", -0.6),
        ("weak", -0.5),
        ("fail", -0.6),
        ("failed", -0.6),
        ("failure", -0.6),
        ("scam", -0.8),
        ("fraud", -0.9),
        ("fear", -0.5),
        ("worried", -0.5),
        ("risky", -0.4),
        ("problem", -0.3),
        ("lose", -0.5),
        ("losing", -0.5),
        ("loss", -0.6),
        ("losses", -0.6),
        ("lost", -0.5),
        ("crash", -0.8),
        ("crashing", -0.8),
        ("dump", -0.6),
        ("dumping", -0.6),
        ("drop", -0.4),
        ("plunge", -0.7),
        ("tank", -0.6),
        ("tanking", -0.7),
        ("downgrade", -0.5),
        ("overvalued", -0.5),
        ("miss", -0.4),
        ("bearish", -0.8),
        ("bear", -0.5),
        ("recession", -0.6),
        ("bankrupt", -0.9),
        ("bankruptcy", -0.9),
        ("sell", -0.3),
        ("selloff", -0.6),
        // reddit / finance slang, negative
        ("bagholder", -0.6),
        ("bagholding", -0.6),
        ("rekt", -0.8),
        ("rugpull", -0.9),
        ("guh", -0.7),
        ("drilling", -0.6),
        ("worthless", -0.7),
        ("📉", -0.6),
        ("🌈", -0.4),
        ("🐻", -0.5),
        ("🤡", -0.5),
    ]
    .into_iter()
    .collect()
});

static MODIFIERS: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    [
        ("very", 1.5),
        ("really", 1.4),
        ("extremely", 2.0),
        ("super", 1.5),
        ("incredibly", 1.8),
        ("absolutely", 1.7),
        ("so", 1.3),
        ("too", 1.2),
        ("highly", 1.5),
        ("massively", 1.8),
        ("insanely", 1.8),
        ("slightly", 0.5),
        ("somewhat", 0.6),
        ("kinda", 0.6),
        ("barely", 0.4),
        ("little", 0.6),
    ]
    .into_iter()
    .collect()
});

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nothing", "neither", "nor", "without", "hardly", "isn't", "isnt",
    "aren't", "arent", "wasn't", "wasnt", "don't", "dont", "doesn't", "doesnt", "didn't", "didnt",
    "won't", "wont", "can't", "cant", "cannot", "shouldn't", "wouldn't",
];

/// Mean polarity of the matched words in `text`, clamped to [-1, 1].
/// Zero when nothing matches.
pub fn polarity(text: &str) -> f64 {
    let lower = text.to_lowercase();

    let mut total = 0.0;
    let mut matched = 0usize;
    let mut modifier = 1.0;
    let mut since_modifier = 0usize;
    let mut negated = false;
    let mut since_negation = 0usize;

    for token in TOKEN_RE.find_iter(&lower).map(|m| m.as_str()) {
        if NEGATIONS.contains(&token) {
            negated = true;
            since_negation = 0;
            continue;
        }

        if let Some(&m) = MODIFIERS.get(token) {
            modifier = m;
            since_modifier = 0;
            continue;
        }

        match LEXICON.get(token) {
            Some(&base) => {
                let mut score = base * modifier;
                if negated && since_negation < NEGATION_WINDOW {
                    score = -score * NEGATION_DAMPING;
                }
                total += score;
                matched += 1;
                modifier = 1.0;
            }
            None => {
                since_modifier += 1;
                if since_modifier >= MODIFIER_WINDOW {
                    modifier = 1.0;
                }
            }
        }

        if negated {
            since_negation += 1;
            if since_negation >= NEGATION_WINDOW {
                negated = false;
            }
        }
    }

    if matched == 0 {
        return 0.0;
    }
    (total / matched as f64).clamp(-1.0, 1.0)
}

pub fn label_for(score: f64) -> SentimentLabel {
    if score > LABEL_THRESHOLD {
        SentimentLabel::Positive
    } else if score < -LABEL_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Score one text with the lexicon.
pub fn annotate(record_id: &str, text: &str) -> SentimentAnnotation {
    if text.trim().is_empty() {
        return SentimentAnnotation::neutral(record_id, SentimentMethod::Lexicon);
    }
    let score = polarity(text);
    SentimentAnnotation {
        record_id: record_id.to_string(),
        label: label_for(score),
        score,
        method: SentimentMethod::Lexicon,
        confidence: LEXICON_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_text() {
        let a = annotate("p", "great earnings, this stock is going to the moon 🚀");
        assert_eq!(a.label, SentimentLabel::Positive);
        assert!(a.score > 0.5);
        assert_eq!(a.confidence, LEXICON_CONFIDENCE);
        assert_eq!(a.method, SentimentMethod::Lexicon);
    }

    #[test]
    fn negative_text() {
        let a = annotate("n", "terrible quarter, total crash and huge losses");
        assert_eq!(a.label, SentimentLabel::Negative);
        assert!(a.score < -0.5);
    }

    #[test]
    fn negation_flips_and_dampens() {
        let plain = polarity("bullish");
        let negated = polarity("not bullish");
        assert!((negated + plain * NEGATION_DAMPING).abs() < 1e-9);
        assert_eq!(label_for(negated), SentimentLabel::Negative);
    }

    #[test]
    fn negation_expires_after_window() {
        // "good" is the fourth token after "not"
        let s = polarity("not one two three good");
        assert!(s > 0.0);
    }

    #[test]
    fn modifier_scales_next_match_only() {
        let base = polarity("good");
        assert!((polarity("very good") - base * 1.5).abs() < 1e-9);
        // modifier is consumed by the first match
        let s = polarity("very good good");
        assert!((s - (base * 1.5 + base) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn modifier_lapses_over_unmatched_tokens() {
        let base = polarity("good");
        assert!((polarity("so very good") - base * 1.5).abs() < 1e-9);
        assert!((polarity("really a good") - base * 1.4).abs() < 1e-9);
        assert!((polarity("so the earnings call was good") - base).abs() < 1e-9);
    }

    #[test]
    fn score_is_clamped() {
        let s = polarity("extremely excellent");
        assert_eq!(s, 1.0);
    }

    #[test]
    fn unmatched_text_is_neutral_with_fixed_confidence() {
        let a = annotate("u", "the meeting is on tuesday");
        assert_eq!(a.label, SentimentLabel::Neutral);
        assert_eq!(a.score, 0.0);
        assert_eq!(a.confidence, LEXICON_CONFIDENCE);
    }

    #[test]
    fn empty_text_has_zero_confidence() {
        let a = annotate("e", "   ");
        assert_eq!(a.label, SentimentLabel::Neutral);
        assert_eq!(a.score, 0.0);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn label_thresholds_are_exclusive() {
        assert_eq!(label_for(0.1), SentimentLabel::Neutral);
        assert_eq!(label_for(-0.1), SentimentLabel::Neutral);
        assert_eq!(label_for(0.11), SentimentLabel::Positive);
        assert_eq!(label_for(-0.11), SentimentLabel::Negative);
    }
}
