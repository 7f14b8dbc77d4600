//! Fuzzy "did you mean" suggestions for template errors

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

static UNDEFINED_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"function "(?P<name>[^"]+)" not defined"#).expect("undefined function pattern is valid")
});

/// Suggestion result with its distance to the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
}

/// Find closest matches from a list of candidates
pub fn find_closest_matches<'a>(
    input: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    max_results: usize,
) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = strsim::levenshtein(input, candidate);
            (distance > 0 && distance <= MAX_SUGGESTION_DISTANCE).then(|| Suggestion {
                text: candidate.to_string(),
                distance,
            })
        })
        .collect();

    // Best matches first, ties alphabetically for stable output
    suggestions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.text.cmp(&b.text)));
    suggestions.truncate(max_results);
    suggestions
}

/// Name of the function a parse error complains about
pub fn extract_function_name(message: &str) -> Option<&str> {
    UNDEFINED_FUNCTION
        .captures(message)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str())
}

/// Suggest corrections for an unknown function
pub fn suggest_unknown_function<'a>(
    func_name: &str,
    available: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let matches = find_closest_matches(func_name, available, 3);
    if matches.is_empty() {
        return None;
    }
    let names: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
    Some(format!("Did you mean {}?", names.join(" or ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_closest_matches() {
        let matches = find_closest_matches("toYml", ["toYaml", "toJson", "fromYaml"], 3);
        assert_eq!(matches[0].text, "toYaml");
        assert_eq!(matches[0].distance, 1);
    }

    #[test]
    fn test_exact_match_is_not_suggested() {
        assert!(find_closest_matches("quote", ["quote"], 3).is_empty());
    }

    #[test]
    fn test_extract_function_name() {
        assert_eq!(extract_function_name("function \"toYml\" not defined"), Some("toYml"));
        assert_eq!(extract_function_name("unexpected EOF"), None);
    }

    #[test]
    fn test_suggest_unknown_function() {
        assert_eq!(
            suggest_unknown_function("nindnt", ["nindent", "indent", "quote"]),
            Some("Did you mean `nindent` or `indent`?".to_string())
        );
        assert_eq!(suggest_unknown_function("zzzzzzzz", ["quote"]), None);
    }
}
