//! Light suffix-stripping stemmer.
//!
//! Conflates plural and common inflected forms ("mammals", "indexed",
//! "running") with their base. It is not a full Porter stemmer; it only has
//! to be deterministic and applied identically to documents and queries.

/// Words at or below this length are never stemmed.
const MIN_STEM_INPUT: usize = 3;

/// Stem a lowercased word.
///
/// Words containing anything other than ASCII lowercase letters (digits,
/// accented letters) are returned unchanged.
pub fn stem(word: &str) -> String {
    if word.len() <= MIN_STEM_INPUT || !word.bytes().all(|b| b.is_ascii_lowercase()) {
        return word.to_string();
    }

    let mut w = word.to_string();

    // plurals
    if w.ends_with("sses") {
        w.truncate(w.len() - 2);
    } else if w.ends_with("ies") && w.len() > 4 {
        w.truncate(w.len() - 3);
        w.push('y');
    } else if w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") && !w.ends_with("is") {
        w.pop();
    }

    // verb endings
    for suffix in ["ing", "ed"] {
        if let Some(base) = w.strip_suffix(suffix) {
            if base.len() >= 3 && has_vowel(base) {
                let mut base = base.to_string();
                undouble(&mut base);
                w = base;
            }
            break;
        }
    }

    if let Some(base) = w.strip_suffix("ly") {
        if base.len() >= 5 {
            w = base.to_string();
        }
    }

    w
}

fn has_vowel(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'a' | b'e' | b'i' | b'o' | b'u' | b'y'))
}

/// "runn" -> "run", but "fall" and "pass" stay.
fn undouble(s: &mut String) {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return;
    }
    let last = bytes[bytes.len() - 1];
    let prev = bytes[bytes.len() - 2];
    if last == prev && !has_vowel(&s[s.len() - 1..]) && !matches!(last, b'l' | b's' | b'z') {
        s.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plurals() {
        assert_eq!(stem("mammals"), "mammal");
        assert_eq!(stem("cats"), "cat");
        assert_eq!(stem("categories"), "category");
        assert_eq!(stem("classes"), "class");
    }

    #[test]
    fn test_keeps_non_plural_s_endings() {
        assert_eq!(stem("process"), "process");
        assert_eq!(stem("status"), "status");
        assert_eq!(stem("analysis"), "analysis");
    }

    #[test]
    fn test_verb_endings() {
        assert_eq!(stem("indexed"), "index");
        assert_eq!(stem("running"), "run");
        assert_eq!(stem("falling"), "fall");
        assert_eq!(stem("billing"), "bill");
        assert_eq!(stem("need"), "need");
        assert_eq!(stem("string"), "string");
    }

    #[test]
    fn test_adverbs() {
        assert_eq!(stem("quickly"), "quick");
        assert_eq!(stem("family"), "family");
    }

    #[test]
    fn test_short_and_non_ascii_untouched() {
        assert_eq!(stem("bus"), "bus");
        assert_eq!(stem("soc2"), "soc2");
        assert_eq!(stem("cafés"), "cafés");
    }

    #[test]
    fn test_query_and_document_forms_agree() {
        assert_eq!(stem("refunds"), stem("refund"));
        assert_eq!(stem("passwords"), stem("password"));
        assert_eq!(stem("invoices"), "invoice");
    }
}
