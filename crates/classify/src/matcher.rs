use docsieve_core::DEFAULT_FUZZY_THRESHOLD;

/// Lowercases and collapses whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word containment: an occurrence counts only when it is not
/// flanked by word characters on either side.
pub fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    for (start, _) in text.match_indices(word) {
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word_char(c));
        let after_ok = text[start + word.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_word_char(c));
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

/// Best-local-alignment similarity of `needle` against any substring of
/// `haystack`, on a 0–100 scale.
///
/// Edit-distance DP with a zeroed first row, so the alignment may start
/// (and end) anywhere in the haystack. 100.0 means `needle` occurs
/// verbatim; an empty needle never matches.
pub fn similarity(needle: &str, haystack: &str) -> f32 {
    let needle: Vec<char> = needle.chars().collect();
    let haystack: Vec<char> = haystack.chars().collect();
    if needle.is_empty() {
        return 0.0;
    }
    let n = haystack.len();
    let mut prev = vec![0usize; n + 1];
    let mut curr = vec![0usize; n + 1];
    for (i, &nc) in needle.iter().enumerate() {
        curr[0] = i + 1;
        for j in 1..=n {
            let cost = usize::from(haystack[j - 1] != nc);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let best = prev.iter().copied().min().unwrap_or(needle.len());
    // Subtract in integers first so an exact-threshold distance scores
    // exactly the threshold.
    100.0 * (needle.len() - best) as f32 / needle.len() as f32
}

/// Decides whether keywords count as present in noisy OCR text.
///
/// Three regimes per keyword: 3 characters or fewer demand an exact whole
/// word, multi-word keywords demand every constituent word somewhere in
/// the text, and single long words go through `similarity` against the
/// configured threshold.
#[derive(Debug, Clone)]
pub struct EvidenceMatcher {
    pub fuzzy_threshold: f32,
}

impl Default for EvidenceMatcher {
    fn default() -> Self {
        Self { fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD }
    }
}

impl EvidenceMatcher {
    pub fn new(fuzzy_threshold: f32) -> Self {
        Self { fuzzy_threshold }
    }

    pub fn keyword_present(&self, text: &str, keyword: &str) -> bool {
        let kw = keyword.to_lowercase();
        let text = text.to_lowercase();
        if kw.chars().count() <= 3 {
            contains_word(&text, &kw)
        } else if kw.contains(' ') {
            kw.split_whitespace().all(|w| contains_word(&text, w))
        } else {
            similarity(&kw, &text) >= self.fuzzy_threshold
        }
    }

    /// Each keyword contributes exactly 1 or 0; no partial credit.
    pub fn count_hits(&self, text: &str, keywords: &[String]) -> usize {
        keywords
            .iter()
            .filter(|kw| self.keyword_present(text, kw))
            .count()
    }
}
