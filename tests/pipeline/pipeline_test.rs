//! Statement pipeline integration tests.

use sqlbridge::builder::SelectBuilder;
use sqlbridge::error::ErrorKind;
use sqlbridge::filters::{CollectionFilter, LimitOffset, OrderBy, SearchFilter};
use sqlbridge::pipeline::{
    Parameters, ParamsArg, PipelineError, PrepareArg, StatementKind, StatementPipeline,
};
use sqlbridge::sql::expr::col;
use sqlbridge::sql::Dialect;
use sqlbridge::value::Value;

fn pipeline() -> StatementPipeline {
    StatementPipeline::new()
}

#[test]
fn named_parameters_rewrite_to_numeric() {
    let stmt = pipeline()
        .prepare(
            "SELECT id FROM t WHERE name = :name AND age > :age",
            vec![PrepareArg::map(vec![
                ("name", Value::String("Ada".into())),
                ("age", Value::Int(30)),
            ])],
            Dialect::Postgres,
        )
        .unwrap();

    assert_eq!(stmt.text, "SELECT id FROM t WHERE name = $1 AND age > $2");
    assert_eq!(
        stmt.parameters,
        Parameters::Positional(vec![Value::String("Ada".into()), Value::Int(30)])
    );
}

#[test]
fn question_mark_preserved_and_literal_untouched() {
    let stmt = pipeline()
        .prepare(
            "SELECT * FROM t WHERE x = ? AND note = 'who?'",
            vec![PrepareArg::list(vec![Value::Int(5)])],
            Dialect::Sqlite,
        )
        .unwrap();

    assert_eq!(stmt.text, "SELECT * FROM t WHERE x = ? AND note = 'who?'");
    assert_eq!(stmt.parameters, Parameters::Positional(vec![Value::Int(5)]));
}

#[test]
fn placeholder_conservation_across_dialects() {
    // Placeholder count in the text equals parameter entries, for
    // every target style.
    let sql = "SELECT * FROM t WHERE a = :a AND b = :b AND c = :c";
    let args = || {
        vec![PrepareArg::map(vec![
            ("a", Value::Int(1)),
            ("b", Value::Int(2)),
            ("c", Value::Int(3)),
        ])]
    };

    for dialect in [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Sqlite,
        Dialect::Oracle,
        Dialect::Spanner,
        Dialect::DuckDb,
        Dialect::BigQuery,
        Dialect::Ansi,
    ] {
        let stmt = pipeline().prepare(sql, args(), dialect).unwrap();
        assert_eq!(stmt.parameters.len(), 3, "{dialect}: {}", stmt.text);
    }
}

#[test]
fn style_coherence_per_dialect() {
    let sql = "SELECT * FROM t WHERE a = :a";
    let args = || vec![PrepareArg::map(vec![("a", Value::Int(1))])];

    let pg = pipeline().prepare(sql, args(), Dialect::Postgres).unwrap();
    assert!(pg.text.contains("$1"));
    assert!(matches!(pg.parameters, Parameters::Positional(_)));

    let mysql = pipeline().prepare(sql, args(), Dialect::MySql).unwrap();
    assert!(mysql.text.contains("= ?"));
    assert!(matches!(mysql.parameters, Parameters::Positional(_)));

    let oracle = pipeline().prepare(sql, args(), Dialect::Oracle).unwrap();
    assert!(oracle.text.contains(":a"));
    assert!(matches!(oracle.parameters, Parameters::Named(_)));

    let spanner = pipeline().prepare(sql, args(), Dialect::Spanner).unwrap();
    assert!(spanner.text.contains("@a"));
    assert!(matches!(spanner.parameters, Parameters::Named(_)));
}

#[test]
fn error_taxonomy_surfaces() {
    let p = pipeline();

    let parse = p
        .prepare("SELEC * FORM t", vec![], Dialect::Postgres)
        .unwrap_err();
    assert_eq!(parse.kind(), ErrorKind::Parse);

    let mixed = p
        .prepare(
            "SELECT * FROM t WHERE a = :a AND b = ?",
            vec![PrepareArg::map(vec![("a", Value::Int(1))])],
            Dialect::Postgres,
        )
        .unwrap_err();
    assert_eq!(mixed.kind(), ErrorKind::ParameterStyleMismatch);

    let count = p
        .prepare(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            vec![PrepareArg::list(vec![Value::Int(1)])],
            Dialect::Sqlite,
        )
        .unwrap_err();
    assert!(matches!(
        count,
        PipelineError::CountMismatch {
            expected: 2,
            supplied: 1
        }
    ));

    let missing = p
        .prepare(
            "SELECT * FROM t WHERE a = :a",
            vec![],
            Dialect::Postgres,
        )
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::MissingParameter);
}

#[test]
fn builder_input_flows_through() {
    let builder = SelectBuilder::new()
        .select(vec![col("id"), col("email")])
        .from_("users")
        .where_(("active", true));

    let stmt = pipeline().prepare(builder, vec![], Dialect::Postgres).unwrap();
    assert_eq!(stmt.kind, StatementKind::Select);
    assert_eq!(stmt.parameters.len(), 1);
    assert!(stmt.text.contains("\"active\" = $1"));
}

#[test]
fn filters_compose_left_to_right_on_raw_text() {
    let stmt = pipeline()
        .prepare(
            "SELECT * FROM users",
            vec![
                PrepareArg::filter(CollectionFilter::new(
                    "id",
                    Some(vec![Value::Int(1), Value::Int(2)]),
                )),
                PrepareArg::filter(SearchFilter::new("name", "ada")),
                PrepareArg::filter(OrderBy::desc("created_at")),
                PrepareArg::filter(LimitOffset::new(10, 0)),
            ],
            Dialect::Postgres,
        )
        .unwrap();

    let in_pos = stmt.text.find("IN ($1, $2)").expect("IN clause");
    let like_pos = stmt.text.find("LIKE $3").expect("LIKE clause");
    let order_pos = stmt.text.find("ORDER BY").expect("ORDER BY clause");
    let limit_pos = stmt.text.find("LIMIT 10").expect("LIMIT clause");
    assert!(in_pos < like_pos && like_pos < order_pos && order_pos < limit_pos);
    assert_eq!(stmt.parameters.len(), 3);
}

#[test]
fn filters_apply_to_builder_ast() {
    let builder = SelectBuilder::new().select_star().from_("users");
    let stmt = pipeline()
        .prepare(
            builder,
            vec![
                PrepareArg::filter(CollectionFilter::new("id", Some(vec![Value::Int(7)]))),
                PrepareArg::filter(LimitOffset::new(5, 10)),
            ],
            Dialect::Postgres,
        )
        .unwrap();

    assert!(stmt.text.contains("\"id\" IN ($1)"));
    assert!(stmt.text.contains("LIMIT 5 OFFSET 10"));
    assert_eq!(stmt.parameters.len(), 1);
}

#[test]
fn statement_input_is_a_readonly_snapshot() {
    let p = pipeline();
    let stmt = p
        .prepare(
            "SELECT * FROM t WHERE a = :a",
            vec![PrepareArg::map(vec![("a", Value::Int(1))])],
            Dialect::Postgres,
        )
        .unwrap();

    let replayed = p.prepare(stmt.clone(), vec![], Dialect::Postgres).unwrap();
    assert_eq!(stmt, replayed);
}

#[test]
fn prepare_many_builds_batch_container() {
    let stmt = pipeline()
        .prepare_many(
            "INSERT INTO t (a, b) VALUES (:a, :b)",
            vec![
                ParamsArg::map(vec![("a", Value::Int(1)), ("b", Value::Int(2))]),
                ParamsArg::map(vec![("a", Value::Int(3)), ("b", Value::Int(4))]),
            ],
            Dialect::Postgres,
        )
        .unwrap();

    assert!(stmt.is_many);
    assert_eq!(stmt.text, "INSERT INTO t (a, b) VALUES ($1, $2)");
    assert_eq!(
        stmt.parameters,
        Parameters::Many(vec![
            vec![Value::Int(1), Value::Int(2)],
            vec![Value::Int(3), Value::Int(4)],
        ])
    );
}

#[test]
fn scripts_split_validate_and_flag() {
    let stmt = pipeline()
        .prepare_script(
            "CREATE TABLE logs (msg TEXT); INSERT INTO logs VALUES ('a;b'); SELECT * FROM logs",
            vec![],
            Dialect::Sqlite,
        )
        .unwrap();

    assert!(stmt.is_script);
    assert_eq!(stmt.kind, StatementKind::Script);
    // The quoted semicolon does not split
    assert!(stmt.text.contains("'a;b'"));
}

#[test]
fn script_parameters_require_a_single_shape() {
    let err = pipeline()
        .prepare_script(
            "UPDATE a SET x = :v; DELETE FROM b WHERE y = ?",
            vec![PrepareArg::map(vec![("v", Value::Int(1))])],
            Dialect::Postgres,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParameterStyleMismatch);
}

#[test]
fn empty_script_is_a_parse_error() {
    let err = pipeline()
        .prepare_script("  ;;  ", vec![], Dialect::Postgres)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn returning_and_kind_inferred_from_text() {
    let stmt = pipeline()
        .prepare(
            "UPDATE users SET active = ? RETURNING id",
            vec![PrepareArg::scalar(true)],
            Dialect::Postgres,
        )
        .unwrap();
    assert_eq!(stmt.kind, StatementKind::Update);
    assert!(stmt.returning);

    let stmt = pipeline()
        .prepare(
            "WITH doomed AS (SELECT id FROM inactive) DELETE FROM users WHERE id IN (SELECT id FROM doomed)",
            vec![],
            Dialect::Postgres,
        )
        .unwrap();
    assert_eq!(stmt.kind, StatementKind::Delete);
    assert!(!stmt.returning);
}

#[test]
fn oracle_numeric_binds_preserved() {
    let stmt = pipeline()
        .prepare(
            "SELECT * FROM t WHERE a = :1 AND b = :2",
            vec![PrepareArg::list(vec![Value::Int(10), Value::Int(20)])],
            Dialect::Oracle,
        )
        .unwrap();
    assert_eq!(stmt.text, "SELECT * FROM t WHERE a = :1 AND b = :2");
    assert_eq!(
        stmt.parameters,
        Parameters::Positional(vec![Value::Int(10), Value::Int(20)])
    );
}

#[test]
fn comments_and_casts_are_not_placeholders() {
    let stmt = pipeline()
        .prepare(
            "SELECT x::text -- :fake\nFROM t WHERE y = :real /* ? */",
            vec![PrepareArg::map(vec![("real", Value::Int(1))])],
            Dialect::Postgres,
        )
        .unwrap();
    assert_eq!(stmt.parameters.len(), 1);
    assert!(stmt.text.contains("x::text"));
    assert!(stmt.text.contains(":fake"));
}

#[test]
fn parse_cache_serves_repeat_preparations() {
    let p = StatementPipeline::with_cache_capacity(8);
    let sql = "SELECT * FROM t WHERE a = :a";
    for i in 0..10 {
        let stmt = p
            .prepare(
                sql,
                vec![PrepareArg::map(vec![("a", Value::Int(i))])],
                Dialect::Postgres,
            )
            .unwrap();
        assert_eq!(
            stmt.parameters,
            Parameters::Positional(vec![Value::Int(i)])
        );
    }
}
