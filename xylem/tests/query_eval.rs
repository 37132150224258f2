//! Integration tests for query evaluation and the force-index-use guard
//!
//! Covers the path/predicate subset, comparison coercion, the built-in
//! functions, standalone index use by comparisons, and the
//! `xylem:enforce-index` pragma in its pass and fail scenarios.

use xylem::{
    CompiledQuery, EngineConfig, NameKind, QueryError, RangeType, Store, Value, Variables,
};

const BOOKS: &str = r#"<library>
  <book id="b1"><author>Herbert</author><year>1965</year></book>
  <book id="b2"><author>Orwell</author><year>1949</year></book>
  <book id="b3"><author>Herbert</author><year>1981</year></book>
</library>"#;

fn test_store() -> Store {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Store::new();
    store.create_collection("db").expect("create collection");
    store
        .load_document("db", "books.xml", BOOKS)
        .expect("load books.xml");
    store
}

fn indexed_store() -> Store {
    let store = test_store();
    store
        .configure_range_index("db", NameKind::Attribute, "id", RangeType::String)
        .unwrap();
    store
        .configure_range_index("db", NameKind::Element, "author", RangeType::String)
        .unwrap();
    store
        .configure_range_index("db", NameKind::Element, "year", RangeType::Integer)
        .unwrap();
    store
}

fn run(store: &Store, query: &str) -> Result<Vec<String>, QueryError> {
    let config = EngineConfig::default();
    let context = store.collection_node_set(&["db"])?;
    let mut compiled = CompiledQuery::compile(query)?;
    let result = compiled.eval(store, &config, Some(&context), &Variables::new())?;
    Ok(result
        .items()
        .iter()
        .map(|v| match v {
            Value::Node(n) => store.string_value(*n),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
        })
        .collect())
}

#[test]
fn descendant_paths_find_elements() {
    let store = test_store();
    let authors = run(&store, "//author").unwrap();
    assert_eq!(authors, vec!["Herbert", "Orwell", "Herbert"]);
}

#[test]
fn child_steps_descend_one_level() {
    let store = test_store();
    assert_eq!(run(&store, "/library/book/author").unwrap().len(), 3);
    // library is not a child of book
    assert!(run(&store, "/book/author").unwrap().is_empty());
}

#[test]
fn attribute_steps_select_attributes() {
    let store = test_store();
    let ids = run(&store, "//book/@id").unwrap();
    assert_eq!(ids, vec!["b1", "b2", "b3"]);
}

#[test]
fn string_predicates_filter_by_value() {
    let store = test_store();
    let years = run(&store, r#"//book[author = "Herbert"]/year"#).unwrap();
    assert_eq!(years, vec!["1965", "1981"]);
}

#[test]
fn numeric_predicates_coerce_node_values() {
    let store = test_store();
    assert_eq!(run(&store, "//book[year = 1965]/@id").unwrap(), vec!["b1"]);
    assert_eq!(
        run(&store, "//book[year < 1970]/@id").unwrap(),
        vec!["b1", "b2"]
    );
    assert_eq!(run(&store, "//book[year >= 1981]/@id").unwrap(), vec!["b3"]);
}

#[test]
fn positional_predicates_select_by_position() {
    let store = test_store();
    assert_eq!(run(&store, "//book[1]/@id").unwrap(), vec!["b1"]);
    assert_eq!(run(&store, "//book[3]/@id").unwrap(), vec!["b3"]);
    assert!(run(&store, "//book[4]").unwrap().is_empty());
}

#[test]
fn and_or_combine_predicates() {
    let store = test_store();
    assert_eq!(
        run(&store, r#"//book[author = "Herbert" and year = 1981]/@id"#).unwrap(),
        vec!["b3"]
    );
    assert_eq!(
        run(&store, r#"//book[year = 1949 or year = 1981]/@id"#).unwrap(),
        vec!["b2", "b3"]
    );
}

#[test]
fn functions_operate_on_string_values() {
    let store = test_store();
    assert_eq!(
        run(&store, r#"//book[contains(author, "erber")]/@id"#).unwrap(),
        vec!["b1", "b3"]
    );
    assert_eq!(
        run(&store, r#"//book[starts-with(@id, "b1")]/year"#).unwrap(),
        vec!["1965"]
    );
    assert_eq!(
        run(&store, r#"//book[substring(@id, 2, 1) = "2"]/author"#).unwrap(),
        vec!["Orwell"]
    );
    assert_eq!(
        run(&store, r#"//book[matches(author, "^H.*t$")]/@id"#).unwrap(),
        vec!["b1", "b3"]
    );
    assert_eq!(run(&store, r#"count(//book)"#).unwrap(), vec!["3"]);
    assert_eq!(
        run(&store, r#"//book[not(author = "Herbert")]/@id"#).unwrap(),
        vec!["b2"]
    );
}

#[test]
fn variables_bind_node_sets_and_values() {
    let store = test_store();
    let config = EngineConfig::default();
    let context = store.collection_node_set(&["db"]).unwrap();

    let mut books = CompiledQuery::compile("//book").unwrap();
    let books = books
        .eval(&store, &config, Some(&context), &Variables::new())
        .unwrap();
    let book_set = store.make_node_set(books.node_ids());

    let mut vars = Variables::new();
    vars.insert("books".into(), xylem::Binding::NodeSet(book_set));
    vars.insert(
        "who".into(),
        xylem::Binding::Value(Value::String("Orwell".into())),
    );

    let mut query = CompiledQuery::compile(r#"$books[author = $who]"#).unwrap();
    let result = query.eval(&store, &config, Some(&context), &vars).unwrap();
    assert_eq!(result.len(), 1);
    let book = result.node_ids()[0];
    let id = store.attributes_of(book)[0];
    assert_eq!(store.string_value(id), "b2");

    let mut unbound = CompiledQuery::compile("$missing").unwrap();
    let err = unbound
        .eval(&store, &config, Some(&context), &vars)
        .unwrap_err();
    assert!(matches!(err, QueryError::Dynamic(_)));
}

#[test]
fn comparisons_use_indexes_on_their_own() {
    let store = indexed_store();
    let config = EngineConfig::default();
    let context = store.collection_node_set(&["db"]).unwrap();

    let before = store.index_stats().range_queries;
    let mut query = CompiledQuery::compile(r#"//book[@id = "b2"]/author"#).unwrap();
    let result = query
        .eval(&store, &config, Some(&context), &Variables::new())
        .unwrap();
    assert_eq!(result.len(), 1);
    assert!(store.index_stats().range_queries > before);
}

#[test]
fn indexed_and_unindexed_evaluation_agree() {
    let indexed = indexed_store();
    let plain = test_store();
    for query in [
        r#"//book[@id = "b1"]/author"#,
        r#"//book[author = "Herbert"]/@id"#,
        r#"//book[year < 1970]/@id"#,
        r#"//book[year != 1965]/@id"#,
        r#"//book[author = "nobody"]"#,
    ] {
        assert_eq!(
            run(&indexed, query).unwrap(),
            run(&plain, query).unwrap(),
            "divergence on {}",
            query
        );
    }
}

#[test]
fn guard_passes_when_an_index_answers_the_comparison() {
    let store = indexed_store();
    let result = run(
        &store,
        r#"(# xylem:enforce-index #) { //book[@id = "b1"] }"#,
    );
    assert_eq!(result.unwrap().len(), 1);
}

#[test]
fn guard_fails_for_index_ineligible_comparisons() {
    let store = indexed_store();
    // substring() defeats the index; the comparison falls back to the
    // naive walk and the guard must reject the evaluation
    let err = run(
        &store,
        r#"(# xylem:enforce-index #) { //book[substring(@id, 1, 1) = "b"] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::IndexRequired(_)));
}

#[test]
fn guard_fails_without_any_index_configuration() {
    let store = test_store();
    let err = run(
        &store,
        r#"(# xylem:enforce-index #) { //book[@id = "b1"] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::IndexRequired(_)));
}

#[test]
fn guard_fails_when_nothing_is_index_capable() {
    let store = indexed_store();
    let err = run(&store, r#"(# xylem:enforce-index #) { //book }"#).unwrap_err();
    assert!(matches!(err, QueryError::IndexRequired(_)));
}

#[test]
fn guard_content_is_rejected() {
    let err = CompiledQuery::compile(r#"(# xylem:enforce-index strict=yes #) { //book }"#)
        .unwrap_err();
    assert!(matches!(err, QueryError::Static(_)));
}

#[test]
fn date_indexes_serve_iso_date_comparisons() {
    let store = Store::new();
    store.create_collection("db").unwrap();
    store
        .configure_range_index("db", NameKind::Element, "published", RangeType::Date)
        .unwrap();
    store
        .load_document(
            "db",
            "dates.xml",
            r#"<log>
                 <entry><published>2024-01-15</published></entry>
                 <entry><published>2024-06-01</published></entry>
                 <entry><published>bogus</published></entry>
               </log>"#,
        )
        .unwrap();

    assert_eq!(
        run(&store, r#"count(//entry[published < "2024-05-01"])"#).unwrap(),
        vec!["1"]
    );
    assert_eq!(
        run(&store, r#"count(//entry[published = "2024-06-01"])"#).unwrap(),
        vec!["1"]
    );
}
