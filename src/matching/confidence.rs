use crate::constants::{DOMAIN_KEYWORDS, VERIFIED_GLYPH, VERIFIED_WORD};

/// Heuristic 0.0..=1.0 score for how well a handle and result text fit a name.
///
/// Advisory only. It is stored with the match and never used to reject one.
pub fn confidence_score(name: &str, handle: &str, text: &str) -> f64 {
    let name_lower = name.to_lowercase();
    let handle_lower = handle.to_lowercase();
    let text_lower = text.to_lowercase();
    let mut score = 0.0;

    for token in name_lower.split_whitespace() {
        if token.chars().count() > 2 && handle_lower.contains(token) {
            score += 0.3;
        }
    }

    let full_name = name_lower.trim();
    if !full_name.is_empty() && text_lower.contains(full_name) {
        score += 0.4;
    }

    if DOMAIN_KEYWORDS.iter().any(|keyword| text_lower.contains(keyword)) {
        score += 0.1;
    }

    if text_lower.contains(VERIFIED_WORD) || text.contains(VERIFIED_GLYPH) {
        score += 0.2;
    }

    f64::min(score, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn matching_handle_scores_per_token() {
        let score = confidence_score("Jim Gaffigan", "jimgaffigan", "");
        assert!(score >= 0.3);
        assert!(close(score, 0.6));
    }

    #[test]
    fn unrelated_handle_scores_zero() {
        assert_eq!(confidence_score("Jim Gaffigan", "unrelatedhandle", ""), 0.0);
    }

    #[test]
    fn short_tokens_do_not_count() {
        assert_eq!(confidence_score("Al Jo", "aljo", ""), 0.0);
    }

    #[test]
    fn text_signals_add_up_and_cap() {
        let text = "Jim Gaffigan (@jimgaffigan) Verified comedian and comic";
        // 0.6 tokens + 0.4 name + 0.1 keyword once + 0.2 verified = 1.3, capped
        assert_eq!(confidence_score("Jim Gaffigan", "jimgaffigan", text), 1.0);

        let score = confidence_score("Jim Gaffigan", "other", "jim gaffigan stand-up");
        assert!(close(score, 0.5));

        let score = confidence_score("Nobody", "other", "✓ account");
        assert!(close(score, 0.2));
    }
}
