use proptest::collection::vec;
use proptest::prelude::*;

use lumen::analysis::UAX29Analyzer;
use lumen::query::TokenKind;
use lumen::{Clause, Operator, Query, QueryParser};

fn parser() -> QueryParser {
    QueryParser::new("text", Box::new(UAX29Analyzer))
}

#[test]
fn documented_cases() {
    let parser = parser();
    assert_eq!(
        Query::boolean(vec![
            Clause::must(Query::term("text", "a")),
            Clause::must(Query::term("text", "b")),
        ]),
        parser.parse("a AND b").unwrap()
    );
    assert_eq!(Query::phrase("text", &["a", "b"], 2), parser.parse("\"a b\"~2").unwrap());
    match parser.parse("[1 TO 5]").unwrap() {
        Query::Range {
            lower,
            upper,
            include_lower: true,
            include_upper: true,
            ..
        } => assert_eq!((Some("1".to_string()), Some("5".to_string())), (lower, upper)),
        other => panic!("unexpected {:?}", other),
    }
    let error = parser.parse("a AND").unwrap_err();
    assert!(error.expected.contains(&TokenKind::Term));
    assert!(error.to_string().contains("TERM"));
}

#[test]
fn and_as_default_operator() {
    let parser = parser().with_default_operator(Operator::And);
    assert_eq!(
        parser.parse("a b").unwrap(),
        parser.parse("a AND b").unwrap()
    );
}

fn arb_word() -> BoxedStrategy<String> {
    proptest::sample::select(&["alpha", "beta", "gamma", "delta"][..])
        .prop_map(str::to_string)
        .boxed()
}

fn arb_leaf() -> BoxedStrategy<String> {
    prop_oneof![
        arb_word(),
        arb_word().prop_map(|w| format!("title:{}", w)),
        (arb_word(), arb_word(), 0..4u32).prop_map(|(a, b, slop)| if slop == 0 {
            format!("\"{} {}\"", a, b)
        } else {
            format!("\"{} {}\"~{}", a, b, slop)
        }),
        arb_word().prop_map(|w| format!("{}*", &w[..3])),
        (arb_word(), 0..3u32).prop_map(|(w, d)| format!("{}~{}", w, d)),
        (arb_word(), arb_word()).prop_map(|(a, b)| format!("[{} TO {}}}", a, b)),
    ]
    .boxed()
}

fn arb_query_string() -> BoxedStrategy<String> {
    vec(
        (proptest::sample::select(&["", "+", "-"][..]), arb_leaf()),
        1..5,
    )
    .prop_map(|clauses| {
        clauses
            .into_iter()
            .map(|(occur, leaf)| format!("{}{}", occur, leaf))
            .collect::<Vec<_>>()
            .join(" ")
    })
    .boxed()
}

proptest! {
    #[test]
    fn display_parses_back(input in arb_query_string()) {
        let parser = parser();
        let query = parser.parse(&input).unwrap();
        let reparsed = parser.parse(&query.to_string()).unwrap();
        prop_assert_eq!(query, reparsed);
    }

    #[test]
    fn lenient_parse_never_fails(input in "[a-z\"()\\[\\]{}:^~*?+\\- ]{0,30}") {
        let _ = parser().parse_lenient(&input);
    }
}
