//! Emotion detection strategies.
//!
//! The [`EmotionDetector`] trait is the seam for plugging in a real
//! classifier. [`KeywordEmotionDetector`] is the default: a lexicon match
//! with a punctuation-based intensity heuristic. It is an approximation and
//! misses negation, sarcasm and anything outside its word lists.

use super::EmotionState;

/// Strategy that maps text to an emotion state.
pub trait EmotionDetector: Send + Sync {
    fn detect(&self, text: &str) -> EmotionState;
}

/// Word lists used by the keyword detector.
struct EmotionLexicon {
    positive: Vec<&'static str>,
    negative: Vec<&'static str>,
    intensifiers: Vec<&'static str>,
}

impl Default for EmotionLexicon {
    fn default() -> Self {
        Self {
            positive: vec![
                "happy", "glad", "love", "great", "wonderful", "excited", "thank",
                "awesome", "enjoy", "proud", "fun", "beautiful", "relieved", "amazing",
                "开心", "高兴", "喜欢", "爱", "快乐", "幸福", "感谢", "谢谢", "棒", "兴奋",
            ],
            negative: vec![
                "sad", "angry", "hate", "terrible", "awful", "upset", "afraid", "scared",
                "lonely", "tired", "worried", "hurt", "cry", "miss", "annoyed", "stress",
                "难过", "伤心", "生气", "讨厌", "害怕", "孤独", "累", "担心", "哭", "烦",
            ],
            intensifiers: vec![
                "very", "so", "really", "extremely", "totally", "absolutely",
                "非常", "特别", "太", "超级", "真的",
            ],
        }
    }
}

/// Lexicon-based detector (default strategy).
pub struct KeywordEmotionDetector {
    lexicon: EmotionLexicon,
}

impl Default for KeywordEmotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordEmotionDetector {
    pub fn new() -> Self {
        Self {
            lexicon: EmotionLexicon::default(),
        }
    }

    fn count_hits(text: &str, words: &[&'static str]) -> usize {
        words.iter().map(|w| text.matches(w).count()).sum()
    }
}

impl EmotionDetector for KeywordEmotionDetector {
    fn detect(&self, text: &str) -> EmotionState {
        let lower = text.to_lowercase();

        let positive = Self::count_hits(&lower, &self.lexicon.positive) as f64;
        let negative = Self::count_hits(&lower, &self.lexicon.negative) as f64;
        let intensifiers = Self::count_hits(&lower, &self.lexicon.intensifiers) as f64;
        let sentiment_hits = positive + negative;

        // Polarity ratio, scaled up as more sentiment words agree
        let valence = if sentiment_hits > 0.0 {
            let polarity = (positive - negative) / sentiment_hits;
            let confidence = (0.4 + sentiment_hits * 0.2).min(1.0);
            polarity * confidence
        } else {
            0.0
        };

        let exclamations = text.chars().filter(|c| *c == '!' || *c == '！').count() as f64;
        let letters: Vec<char> = text.chars().filter(|c| c.is_ascii_alphabetic()).collect();
        let shouting = letters.len() >= 4 && letters.iter().all(|c| c.is_ascii_uppercase());

        let mut arousal = 0.0;
        if sentiment_hits > 0.0 {
            arousal += 0.3;
        }
        arousal += (exclamations * 0.15).min(0.45);
        arousal += (intensifiers * 0.1).min(0.2);
        if shouting {
            arousal += 0.2;
        }

        EmotionState::new(valence, arousal)
    }
}
