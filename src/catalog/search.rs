// Fuzzy matching of a typed character name against the roster.

use std::collections::BTreeMap;

use strsim::jaro_winkler;

/// Roster ids above this are not real characters.
const MAX_CHARA_ID: u32 = 1000;

/// Score bonus per search word contained verbatim in the candidate.
const WORD_MATCH_BONUS: f64 = 0.3;

/// Find the roster entry best matching `name`.
///
/// Returns `(id, matched name, score)`, or `None` when nothing scores above
/// zero. Exact matches score 1.0; otherwise the similarity metric plus a
/// bonus for every shared word. Ties prefer exact matches, then candidates
/// sharing a word, then shorter candidates (more likely a nickname), then
/// the smaller id.
pub fn find_best_match(
    name: &str,
    candidates: &BTreeMap<u32, Vec<String>>,
) -> Option<(u32, String, f64)> {
    let search = name.trim().to_lowercase();
    let search_words: Vec<&str> = search.split_whitespace().collect();

    let mut best: Option<(u32, String, f64)> = None;

    for (&id, names) in candidates {
        if id > MAX_CHARA_ID {
            continue;
        }
        for candidate in names {
            if candidate.is_empty() {
                continue;
            }

            let normalized = candidate.trim().to_lowercase();
            let candidate_words: Vec<&str> = normalized.split_whitespace().collect();
            let score = similarity(&search, &normalized, &search_words, &candidate_words);

            match &mut best {
                None => best = Some((id, candidate.clone(), score)),
                Some((best_id, best_name, best_score)) => {
                    let better = score > *best_score
                        || (score == *best_score
                            && prefer_candidate(
                                &search,
                                &normalized,
                                &search_words,
                                &candidate_words,
                                candidate,
                                best_name,
                                id,
                                *best_id,
                            ));
                    if better {
                        *best_id = id;
                        *best_name = candidate.clone();
                        *best_score = score;
                    }
                }
            }
        }
    }

    best.filter(|(_, _, score)| *score > 0.0)
}

fn similarity(search: &str, candidate: &str, search_words: &[&str], candidate_words: &[&str]) -> f64 {
    if search == candidate {
        return 1.0;
    }

    let mut score = jaro_winkler(search, candidate);
    for word in search_words {
        if candidate_words.iter().any(|c| c == word) {
            score += WORD_MATCH_BONUS;
        }
    }
    score
}

#[allow(clippy::too_many_arguments)]
fn prefer_candidate(
    search: &str,
    normalized: &str,
    search_words: &[&str],
    candidate_words: &[&str],
    candidate: &str,
    best_name: &str,
    id: u32,
    best_id: u32,
) -> bool {
    if search == normalized {
        return true;
    }
    if search_words
        .iter()
        .any(|word| candidate_words.iter().any(|c| c == word))
    {
        return true;
    }
    if candidate.len() < best_name.len() {
        return true;
    }
    candidate.len() == best_name.len() && id < best_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(entries: &[(u32, &[&str])]) -> BTreeMap<u32, Vec<String>> {
        entries
            .iter()
            .map(|(id, names)| (*id, names.iter().map(|n| n.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_direct_name_match() {
        let candidates = roster(&[
            (1, &["Kasumi Toyama", "Kasumi"]),
            (2, &["Tae Hanazono", "Tae"]),
        ]);

        // The shared word pushes both id-1 entries past every id-2 score.
        let (id, _, score) = find_best_match("kasumi", &candidates).unwrap();
        assert_eq!(id, 1);
        assert!(score >= 1.0);
    }

    #[test]
    fn test_word_match_beats_plain_similarity() {
        let candidates = roster(&[(1, &["Kasumi Toyama"]), (2, &["Kasumii"])]);

        let (id, _, _) = find_best_match("kasumi surname", &candidates).unwrap();
        // "kasumi" appears as a word only in entry 1.
        assert_eq!(id, 1);
    }

    #[test]
    fn test_unknown_name_is_no_match() {
        let candidates: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        assert!(find_best_match("anyone", &candidates).is_none());
    }

    #[test]
    fn test_out_of_range_ids_skipped() {
        let candidates = roster(&[(1001, &["Kasumi"])]);
        assert!(find_best_match("kasumi", &candidates).is_none());
    }
}
