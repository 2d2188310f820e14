//! Integration tests for grammar compilation, capture geometry and selector
//! parsing.

mod common;

use selkie_query::grammar::rules;
use selkie_query::{
    AttributeSelector, Combinator, ComparisonOp, CompiledGrammar, Context, GrammarError,
    PseudoSelector, RuleTable, SelectError, SimpleSelector, compile, parse_selector_group,
    within,
};

// ========== expansion ==========

#[test]
fn test_expand_wraps_references_in_named_groups() {
    let table = RuleTable::new()
        .with_rule("Id", "#{Name}")
        .with_rule("Name", "[a-z]+");
    assert_eq!(table.expand("Id").unwrap(), "#(?<Name>[a-z]+)");
}

#[test]
fn test_expand_nested_references() {
    let table: RuleTable = [("A", "{B}{B}"), ("B", "<{C}>"), ("C", "c")]
        .into_iter()
        .collect();
    assert_eq!(
        table.expand("A").unwrap(),
        "(?<B><(?<C>c)>)(?<B><(?<C>c)>)"
    );
}

#[test]
fn test_unknown_placeholder_left_literal() {
    let table = RuleTable::new().with_rule("A", "x{Missing}y{ }z{");
    assert_eq!(table.expand("A").unwrap(), "x{Missing}y{ }z{");

    let grammar = compile(&table, "A").unwrap();
    assert!(grammar.match_full("x{Missing}y{ }z{").is_ok());
}

#[test]
fn test_unknown_start_rule() {
    assert_eq!(
        RuleTable::selectors().compile("Nope").unwrap_err(),
        GrammarError::UnknownRule("Nope".to_string())
    );
}

#[test]
fn test_direct_cycle_fails() {
    let table = RuleTable::new().with_rule("A", "a{A}?");
    assert_eq!(
        compile(&table, "A").unwrap_err(),
        GrammarError::Cycle {
            rule: "A".to_string(),
            chain: vec!["A".to_string(), "A".to_string()],
        }
    );
}

#[test]
fn test_indirect_cycle_names_chain() {
    let table = RuleTable::new()
        .with_rule("Start", "{A}")
        .with_rule("A", "({B}|x)")
        .with_rule("B", "y{C}")
        .with_rule("C", "{A}");
    let err = compile(&table, "Start").unwrap_err();
    assert_eq!(
        err,
        GrammarError::Cycle {
            rule: "A".to_string(),
            chain: ["Start", "A", "B", "C", "A"].map(String::from).to_vec(),
        }
    );
    assert_eq!(
        err.to_string(),
        "grammar rule `A` is recursive: Start -> A -> B -> C -> A"
    );
}

#[test]
fn test_repeated_reference_is_not_a_cycle() {
    let table = RuleTable::new()
        .with_rule("Pair", "{Item},{Item}")
        .with_rule("Item", "[0-9]");
    assert!(compile(&table, "Pair").is_ok());
}

#[test]
fn test_invalid_pattern_reports_offset() {
    let table = RuleTable::new()
        .with_rule("A", "ab{B}")
        .with_rule("B", "(c");
    assert!(matches!(
        compile(&table, "A").unwrap_err(),
        GrammarError::Pattern { offset: 10, .. }
    ));
}

// ========== shipped grammar ==========

#[test]
fn test_shipped_grammar_compiles() {
    let grammar = CompiledGrammar::selectors();
    assert_eq!(grammar.start_rule(), rules::GROUP_OF_SELECTORS);
    assert!(grammar.source().contains("(?<Selector>"));
    assert!(grammar.source().contains(r"\u{A0}"));
}

#[test]
fn test_shipped_table_has_every_rule() {
    let table = RuleTable::selectors();
    for rule in [
        rules::GROUP_OF_SELECTORS,
        rules::SELECTOR,
        rules::COMBINATOR_SEQ,
        rules::SIMPLE_SELECTOR_SEQ,
        rules::SIMPLE_SELECTOR,
        rules::TYPE_SELECTOR,
        rules::UNIVERSAL_SELECTOR,
        rules::ATTRIBUTE_SELECTOR,
        rules::ID_SELECTOR,
        rules::PSEUDO_SELECTOR,
        rules::PSEUDO_ELEMENT,
        rules::PSEUDO_ARGS,
        rules::COMPARISON_OP,
        rules::COMBINATOR,
        rules::IDENTIFIER,
        rules::ATTRIBUTE_VALUE,
        rules::QUOTED_STRING,
    ] {
        assert!(table.get(rule).is_some(), "missing rule {rule}");
    }
    assert_eq!(table.len(), 17);
}

#[test]
fn test_capture_history_keeps_every_alternative() {
    let grammar = CompiledGrammar::selectors();
    let matched = grammar.match_full("a > b, c d, e").unwrap();
    let selectors: Vec<&str> = matched
        .captures(rules::SELECTOR)
        .map(|c| matched.text(c))
        .collect();
    assert_eq!(selectors, ["a > b", "c d", "e"]);
}

#[test]
fn test_subcaptures_stay_inside_region() {
    let grammar = CompiledGrammar::selectors();
    let matched = grammar.match_full("a[x] b[y][z], c[w]").unwrap();
    let first = matched.captures(rules::SELECTOR).next().unwrap();
    let names: Vec<&str> = matched
        .subcaptures(rules::ATTRIBUTE_SELECTOR, first)
        .map(|c| matched.text(c))
        .collect();
    assert_eq!(names, ["[x]", "[y]", "[z]"]);

    let last = matched.captures(rules::SELECTOR).last().unwrap();
    let free: Vec<&str> = within(matched.captures(rules::ATTRIBUTE_SELECTOR), last)
        .map(|c| matched.text(c))
        .collect();
    assert_eq!(free, ["[w]"]);
}

#[test]
fn test_unicode_identifiers() {
    let grammar = CompiledGrammar::selectors();
    assert!(grammar.match_full("été > _x-1").is_ok());
    assert!(grammar.match_full("-a").is_ok());
    assert!(grammar.match_full("1a").is_err());
}

// ========== typed parse ==========

#[test]
fn test_parse_complex_selector() {
    let group = parse_selector_group(CompiledGrammar::selectors(), "a > b#k[x~='y z'] + *").unwrap();
    assert_eq!(group.selectors.len(), 1);
    let selector = &group.selectors[0];
    assert_eq!(
        selector.combinators,
        [Combinator::Child, Combinator::NextSibling]
    );
    assert_eq!(selector.compounds.len(), 3);
    assert_eq!(
        selector.compounds[1].simple_selectors,
        [
            SimpleSelector::Type("b".to_string()),
            SimpleSelector::Id("k".to_string()),
            SimpleSelector::Attribute(AttributeSelector {
                name: "x".to_string(),
                comparison: Some((ComparisonOp::Includes, "y z".to_string())),
            }),
        ]
    );
    assert_eq!(
        selector.compounds[2].simple_selectors,
        [SimpleSelector::Universal]
    );
    assert_eq!(selector.pseudo_element, None);
}

#[test]
fn test_parse_every_comparison_operator() {
    for (text, op) in [
        ("=", ComparisonOp::Equals),
        ("~=", ComparisonOp::Includes),
        ("|=", ComparisonOp::DashMatch),
        ("^=", ComparisonOp::Prefix),
        ("$=", ComparisonOp::Suffix),
        ("*=", ComparisonOp::Substring),
        ("!=", ComparisonOp::NotContains),
    ] {
        let selector = format!("[k{text}v]");
        let group = parse_selector_group(CompiledGrammar::selectors(), &selector).unwrap();
        let SimpleSelector::Attribute(attribute) =
            &group.selectors[0].compounds[0].simple_selectors[0]
        else {
            panic!("expected attribute selector for {selector}");
        };
        assert_eq!(attribute.comparison, Some((op, "v".to_string())));
        assert_eq!(op.to_string(), text);
    }
}

#[test]
fn test_parse_pseudo_components() {
    let group =
        parse_selector_group(CompiledGrammar::selectors(), "li:nth-child(2n + 1)::marker").unwrap();
    let selector = &group.selectors[0];
    assert_eq!(
        selector.compounds[0].simple_selectors[1],
        SimpleSelector::Pseudo(PseudoSelector {
            name: "nth-child".to_string(),
            args: Some("2n + 1".to_string()),
        })
    );
    assert_eq!(selector.pseudo_element.as_deref(), Some("marker"));
    let pseudo: Vec<String> = group.pseudo_components().collect();
    assert_eq!(pseudo, [":nth-child(2n + 1)", "::marker"]);
}

#[test]
fn test_selector_display_round_trips() {
    let group =
        parse_selector_group(CompiledGrammar::selectors(), "a>b  c~d+e[k='v']:x").unwrap();
    assert_eq!(group.selectors[0].to_string(), r#"a > b c ~ d + e[k="v"]:x"#);
}

// ========== custom grammars ==========

/// The shipped table with one rule replaced.
fn custom_grammar(rule: &str, template: &str) -> CompiledGrammar {
    RuleTable::selectors()
        .with_rule(rule, template)
        .compile(rules::GROUP_OF_SELECTORS)
        .unwrap()
}

#[test]
fn test_custom_combinator_the_evaluator_cannot_interpret() {
    let grammar = custom_grammar(rules::COMBINATOR, r"[\s>+~/]");
    let doc = common::tree("<a><b/></a>");
    let ctx = Context::new(&doc, doc.root(), None);
    assert_eq!(
        ctx.select_with(&grammar, "a / b").unwrap_err(),
        SelectError::GrammarMismatch {
            rule: rules::COMBINATOR,
            text: "/".to_string(),
        }
    );
    assert_eq!(ctx.select_with(&grammar, "a > b").unwrap().count(), 1);
}

#[test]
fn test_custom_operator_the_evaluator_cannot_interpret() {
    let grammar = custom_grammar(rules::COMPARISON_OP, "[~^$*|!%]?=");
    assert_eq!(
        parse_selector_group(&grammar, "[k%=v]").unwrap_err(),
        SelectError::GrammarMismatch {
            rule: rules::COMPARISON_OP,
            text: "%=".to_string(),
        }
    );
}

#[test]
fn test_custom_grammar_operator_without_value_is_malformed() {
    let grammar = custom_grammar(
        rules::ATTRIBUTE_SELECTOR,
        r"\[\s*{Identifier}(\s*{ComparisonOp}\s*{AttributeValue}?)?\s*\]",
    );
    assert_eq!(
        parse_selector_group(&grammar, "b[k=]").unwrap_err(),
        SelectError::Malformed {
            text: "[k=]".to_string(),
        }
    );
}

#[test]
fn test_budget_exhaustion_is_too_complex() {
    let grammar = RuleTable::new()
        .with_rule("Start", "({Run})*b")
        .with_rule("Run", "a*")
        .compile("Start")
        .unwrap();
    let input = "a".repeat(40);
    assert_eq!(
        grammar.match_full(&input).unwrap_err(),
        SelectError::TooComplex { selector: input }
    );
}
