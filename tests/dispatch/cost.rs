use graphql_dispatch::graphql_client::{cost::estimate_cost, error::ClientErrorKind};

#[test]
fn given_no_pagination_limits_when_estimating_then_cost_is_one() {
    let cost = estimate_cost("query { viewer { login name } }").expect("query should parse");
    assert_eq!(cost, 1);
}

#[test]
fn given_single_limit_anywhere_when_estimating_then_cost_is_one() {
    let query = "query { viewer { repositories(first: 100) { nodes { name } } } }";
    assert_eq!(estimate_cost(query).expect("query should parse"), 1);
}

#[test]
fn given_three_nested_limits_when_estimating_then_ancestor_products_accumulate() {
    let query = r#"query {
  viewer {
    repositories(first: 100) {
      nodes {
        issues(first: 50) {
          nodes {
            labels(first: 20) { nodes { name } }
          }
        }
      }
    }
  }
}"#;
    // 1 + 100 + 100 * 50 = 5101
    assert_eq!(estimate_cost(query).expect("query should parse"), 51);
}

#[test]
fn given_sibling_limits_when_estimating_then_they_are_not_multiplied() {
    let query = r#"query {
  a: search(query: "x", type: REPOSITORY, first: 1000) { repositoryCount }
  b: search(query: "y", type: REPOSITORY, first: 1000) { repositoryCount }
}"#;
    assert_eq!(estimate_cost(query).expect("query should parse"), 1);
}

#[test]
fn given_non_integer_limit_when_estimating_then_parse_error() {
    for query in [
        "query { search(first: 1.5) { repositoryCount } }",
        "query { search(first: true) { repositoryCount } }",
        "query { search(first: ALL) { repositoryCount } }",
    ] {
        let err = estimate_cost(query).expect_err("non-integer limit must fail");
        assert_eq!(err.kind, ClientErrorKind::Parse, "{query}");
    }
}

#[test]
fn given_multiple_operations_when_estimating_then_costs_are_summed() {
    let query = r#"
query One { a(first: 100) { b(first: 100) { id } } }
query Two { c(first: 100) { d(first: 100) { id } } }
"#;
    // (1 + 100) + (1 + 100) = 202
    assert_eq!(estimate_cost(query).expect("query should parse"), 2);
}
