//! Hospital name variants and approximate text matching.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Suffixes commonly dropped or swapped in hospital names.
const NAME_SUFFIXES: &[&str] = &[
    "hospital",
    "medical center",
    "health system",
    "healthcare",
    "health",
    "center",
    "clinic",
];

/// Variant forms under which a hospital (or system) name may appear in
/// a file. All variants are lowercase.
pub fn name_variants(name: &str, city: Option<&str>, state: &str) -> Vec<String> {
    let name = normalize(name);
    if name.is_empty() {
        return Vec::new();
    }

    let mut variants = vec![name.clone()];

    // Suffix-stripped forms: "Mercy Hospital" appears as plain "Mercy".
    for suffix in NAME_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            let stripped = stripped.trim().to_string();
            if stripped.len() >= 4 {
                variants.push(stripped);
            }
        }
    }

    // City-prefix-stripped: "Springfield Mercy Hospital" vs "Mercy Hospital".
    if let Some(city) = city {
        let city = normalize(city);
        if let Some(stripped) = name.strip_prefix(&city) {
            let stripped = stripped.trim().to_string();
            if stripped.len() >= 4 {
                variants.push(stripped);
            }
        }
    }

    // Saint/St interchange.
    if name.contains("saint ") {
        variants.push(name.replace("saint ", "st "));
        variants.push(name.replace("saint ", "st. "));
    } else if name.contains("st ") || name.contains("st. ") {
        variants.push(name.replace("st. ", "saint ").replace("st ", "saint "));
    }

    // Initials for multi-word names ("barnes jewish christian" -> "bjc").
    let words: Vec<&str> = name
        .split_whitespace()
        .filter(|w| !NAME_SUFFIXES.contains(w))
        .collect();
    if words.len() >= 3 {
        let initials: String = words.iter().filter_map(|w| w.chars().next()).collect();
        if initials.len() >= 3 {
            variants.push(initials);
        }
    }

    // Name with location attached, the way file headers often write it.
    if let Some(city) = city {
        let city = normalize(city);
        variants.push(format!("{name} {city}"));
        variants.push(format!("{name} {city}, {}", state.to_lowercase()));
    }

    variants.sort();
    variants.dedup();
    variants
}

/// Whether a variant appears in the text.
///
/// Short variants must appear verbatim; longer ones tolerate the
/// punctuation and spelling drift real files have, using similarity
/// against equally-sized word windows. A fuzzy window must also share
/// most of the variant's tokens, so a lone location word can never
/// carry the match by itself.
pub fn variant_in_text(text: &str, variant: &str, threshold: f64) -> bool {
    if variant.is_empty() {
        return false;
    }
    if text.contains(variant) {
        return true;
    }
    if variant.len() <= 12 {
        return false;
    }

    let variant_tokens: Vec<&str> = variant.split_whitespace().collect();
    let required = if variant_tokens.len() == 1 {
        0
    } else {
        (variant_tokens.len() + 1) / 2
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < variant_tokens.len() {
        return shared_token_count(&words, &variant_tokens) >= required
            && similarity(text, variant) >= threshold;
    }

    words.windows(variant_tokens.len()).any(|window| {
        shared_token_count(window, &variant_tokens) >= required
            && similarity(&window.join(" "), variant) >= threshold
    })
}

fn shared_token_count(window: &[&str], variant_tokens: &[&str]) -> usize {
    variant_tokens
        .iter()
        .filter(|t| {
            let t = clean_token(t);
            !t.is_empty() && window.iter().any(|w| clean_token(w) == t)
        })
        .count()
}

fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Blended similarity ratio in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b).max(normalized_levenshtein(a, b))
}

/// Word-level overlap between two names, as a fraction of the smaller
/// name's word count. Used to pick the right facility out of a
/// multi-facility disclosure list.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let a_tokens: Vec<String> = normalize(a)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let b_tokens: Vec<String> = normalize(b)
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let shared = a_tokens.iter().filter(|t| b_tokens.contains(t)).count();
    shared as f64 / a_tokens.len().min(b_tokens.len()) as f64
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == ',' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_include_suffix_stripped() {
        let variants = name_variants("Mercy Hospital", Some("Springfield"), "MO");
        assert!(variants.contains(&"mercy hospital".to_string()));
        assert!(variants.contains(&"mercy".to_string()));
        assert!(variants.contains(&"mercy hospital springfield".to_string()));
    }

    #[test]
    fn saint_st_interchange() {
        let variants = name_variants("Saint Luke's Hospital", None, "MO");
        assert!(variants.iter().any(|v| v.starts_with("st luke")));

        let back = name_variants("St. Mary Medical Center", None, "IN");
        assert!(back.iter().any(|v| v.starts_with("saint mary")));
    }

    #[test]
    fn initials_for_long_names() {
        let variants = name_variants("Barnes Jewish Christian Hospital", None, "MO");
        assert!(variants.contains(&"bjc".to_string()));
    }

    #[test]
    fn short_variants_need_exact_presence() {
        assert!(variant_in_text("gross charges for mercy hospital", "mercy", 0.7));
        // "merci" not close enough to count for a short variant.
        assert!(!variant_in_text("gross charges for merci hospital", "mercy", 0.7));
    }

    #[test]
    fn long_variants_tolerate_drift() {
        let text = "standard charges st lukes hospital of kansas city effective 2024";
        assert!(variant_in_text(text, "saint luke's hospital", 0.7) || {
            // The st-form variant covers the same text.
            variant_in_text(text, "st luke's hospital", 0.7)
        });
    }

    #[test]
    fn location_token_alone_cannot_carry_a_fuzzy_match() {
        // The city is one token of the name+city variant; text that only
        // mentions the city must not count as a name sighting.
        assert!(!variant_in_text(
            "welcome to springfield community events calendar",
            "mercy hospital springfield",
            0.7,
        ));
    }

    #[test]
    fn token_overlap_fraction() {
        assert!(token_overlap("Mercy Hospital Springfield", "Mercy Hospital") > 0.9);
        assert!(token_overlap("Mercy Hospital", "Lakeside Clinic") < 0.1);
        let partial = token_overlap("Mercy Hospital South", "Mercy Clinic South");
        assert!(partial > 0.5 && partial < 0.9);
    }
}
