//! Property tests for the search query scanner.
//!
//! Queries are generated from fragments that exercise every token shape and
//! from arbitrary character soup. For any successful scan:
//! 1. Coverage: token ranges are contiguous and reconstruct the input.
//! 2. Idempotence: scanning the same input twice yields the same tokens.
//! 3. Decorations are ordered, disjoint and slice the query exactly.
//! 4. A filter's field and value sit inside the filter, field first.

use proptest::prelude::*;
use query_scanner::decorator::decorate_query;
use query_scanner::lexer::scan_search_query;
use query_scanner::token::{SearchPatternType, Token};

const STANDARD: Option<SearchPatternType> = Some(SearchPatternType::Standard);

const FRAGMENTS: &[&str] = &[
    "kind:Pod",
    "-name:nginx",
    "namespace:\"kube system\"",
    "name:/^web-\\d+$/",
    "AND",
    "OR",
    "NOT",
    "and",
    "(",
    ")",
    "foo(bar)",
    "call(a b)",
    "content:foo\"a b\"",
    "\"quoted text\"",
    "/usr/bin",
    "it's",
    "nginx",
    "// note",
    "ownerReferences:",
    "héllo",
];

/// Space-separated sequences of well-formed fragments.
fn fragment_query_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..8).prop_map(|parts| parts.join(" "))
}

/// Arbitrary text drawn from the characters the scanner treats specially.
fn soup_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9:()\"'/\\\\ \té-]{0,30}").unwrap()
}

fn assert_covers(query: &str, tokens: &[Token]) -> Result<(), TestCaseError> {
    let mut offset = 0;
    for token in tokens {
        let range = token.range();
        prop_assert_eq!(range.start, offset, "gap or overlap before {:?}", token);
        prop_assert!(range.end > range.start, "empty token {:?}", token);
        offset = range.end;
    }
    prop_assert_eq!(offset, query.len());

    let rebuilt: String = tokens.iter().map(|token| token.range().slice(query)).collect();
    prop_assert_eq!(rebuilt, query);
    Ok(())
}

fn assert_filter_parts_nested(tokens: &[Token]) -> Result<(), TestCaseError> {
    for token in tokens {
        let Token::Filter(filter) = token else {
            continue;
        };
        prop_assert!(filter.range.contains(filter.field.range), "field outside {:?}", filter);
        if let Some(value) = &filter.value {
            prop_assert!(filter.range.contains(value.range()), "value outside {:?}", filter);
            prop_assert!(filter.field.range.end <= value.range().start, "value before field {:?}", filter);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn well_formed_queries_scan_and_cover_input(query in fragment_query_strategy()) {
        let scanned = scan_search_query(&query, true, STANDARD);
        prop_assert!(scanned.is_ok(), "scan failed for {:?}: {:?}", query, scanned);
        let scanned = scanned.unwrap();
        assert_covers(&query, &scanned.term)?;
        prop_assert_eq!(scanned.range.end, query.len());
    }

    #[test]
    fn successful_scans_cover_input(query in soup_strategy(), comments in any::<bool>()) {
        if let Ok(scanned) = scan_search_query(&query, comments, STANDARD) {
            assert_covers(&query, &scanned.term)?;
        }
    }

    #[test]
    fn scanning_is_idempotent(query in soup_strategy()) {
        let first = scan_search_query(&query, false, STANDARD);
        let second = scan_search_query(&query, false, STANDARD);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn single_pattern_modes_always_cover_input(
        query in soup_strategy(),
        mode in prop::sample::select(&[
            SearchPatternType::Literal,
            SearchPatternType::Regexp,
            SearchPatternType::Structural,
        ][..]),
    ) {
        // An inline patterntype: directive overrides the mode.
        prop_assume!(!query.contains("patterntype"));
        let scanned = scan_search_query(&query, true, Some(mode));
        prop_assert!(scanned.is_ok());
        assert_covers(&query, &scanned.unwrap().term)?;
    }

    #[test]
    fn decorations_are_ordered_and_disjoint(query in fragment_query_strategy()) {
        let decorations = decorate_query(&query, None);
        prop_assert!(decorations.is_some());

        let mut previous_end = 0;
        for decoration in decorations.unwrap() {
            prop_assert!(decoration.range.start >= previous_end);
            prop_assert!(decoration.range.end <= query.len());
            prop_assert_eq!(decoration.range.slice(&query), decoration.value.as_str());
            previous_end = decoration.range.end;
        }
    }

    #[test]
    fn decoration_matches_scan_outcome(query in soup_strategy()) {
        let scanned = scan_search_query(&query, false, STANDARD);
        prop_assert_eq!(decorate_query(&query, None).is_some(), scanned.is_ok());
    }

    #[test]
    fn filter_parts_nest_in_well_formed_queries(query in fragment_query_strategy()) {
        let scanned = scan_search_query(&query, false, STANDARD);
        prop_assert!(scanned.is_ok());
        assert_filter_parts_nested(&scanned.unwrap().term)?;
    }

    #[test]
    fn filter_parts_nest_in_arbitrary_queries(query in soup_strategy()) {
        if let Ok(scanned) = scan_search_query(&query, false, STANDARD) {
            assert_filter_parts_nested(&scanned.term)?;
        }
    }
}
