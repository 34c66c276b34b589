//! Builder layer integration tests.

use sqlbridge::builder::{
    BuildError, DdlBuilder, DeleteBuilder, InsertBuilder, MergeBuilder, SelectBuilder,
    UpdateBuilder,
};
use sqlbridge::pipeline::{Parameters, StatementKind};
use sqlbridge::sql::expr::{col, lit_int, ExprExt};
use sqlbridge::sql::query::Query;
use sqlbridge::sql::{Dialect, OptimizeFlags};
use sqlbridge::value::Value;

#[test]
fn cte_rebinding_an_alias_fails() {
    let q = Query::new().select(vec![lit_int(1)]);
    let err = SelectBuilder::new()
        .select_star()
        .from_("t")
        .with_cte("a", q.clone())
        .with_cte("a", q)
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::DuplicateCte(_)));
}

#[test]
fn cte_aliases_render_in_insertion_order() {
    let built = SelectBuilder::new()
        .with_cte("a1", Query::new().select(vec![lit_int(1)]))
        .with_cte("a2", Query::new().select(vec![lit_int(2)]))
        .select_star()
        .from_("a2")
        .build()
        .unwrap();

    let first = built.sql.find("\"a1\"").expect("a1 missing");
    let second = built.sql.find("\"a2\"").expect("a2 missing");
    assert!(first < second);
    assert!(built.sql.starts_with("WITH"));
}

#[test]
fn parameter_names_stay_unique_under_any_sequence() {
    let mut builder = SelectBuilder::new();
    let mut names = Vec::new();
    for i in 0..20 {
        let context = if i % 3 == 0 { Some("where") } else { None };
        names.push(builder.add_parameter(Value::Int(i), context));
    }
    let unique: std::collections::HashSet<_> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn delete_with_cte_and_returning() {
    // DELETE FROM users WHERE id IN (SELECT id FROM inactive)
    // RETURNING id, email
    let inactive = Query::new().select(vec![col("id")]).from("inactive");
    let stmt = DeleteBuilder::from_("users")
        .with_cte("inactive_ids", inactive)
        .where_(sqlbridge::sql::Expr::InSubquery {
            expr: Box::new(col("id")),
            subquery: Box::new(Query::new().select(vec![col("id")]).from("inactive_ids")),
            negated: false,
        })
        .returning([col("id"), col("email")])
        .to_statement()
        .unwrap();

    assert_eq!(stmt.kind, StatementKind::Delete);
    assert!(stmt.returning);
    assert!(stmt.text.contains("DELETE FROM \"users\""));
    assert!(stmt.text.contains("RETURNING \"id\", \"email\""));
}

#[test]
fn select_builder_captures_in_declared_order() {
    let built = SelectBuilder::new()
        .select(vec![col("id")])
        .from_("users")
        .where_(("name", "Ada"))
        .where_(("age", ">", 30_i64))
        .build()
        .unwrap();

    assert_eq!(
        built.parameters,
        Parameters::Positional(vec![Value::String("Ada".into()), Value::Int(30)])
    );
    assert!(built.sql.contains("\"name\" = $1 AND \"age\" > $2"));
}

#[test]
fn builder_build_is_pure_and_repeatable() {
    let builder = UpdateBuilder::table("users")
        .set("status", "active")
        .where_(("id", 1_i64));

    let first = builder.build().unwrap();
    let second = builder.build().unwrap();
    let third = builder.build().unwrap();
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn insert_shape_validation() {
    let err = InsertBuilder::into("t")
        .columns(["a", "b", "c"])
        .values(vec![Value::Int(1), Value::Int(2)])
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::InsertShape {
            columns: 3,
            values: 2,
            ..
        }
    ));
}

#[test]
fn insert_from_select_imports_parameters() {
    let source = SelectBuilder::new()
        .select(vec![col("id"), col("email")])
        .from_("staging")
        .where_(("verified", true));

    let built = InsertBuilder::into("users")
        .columns(["id", "email"])
        .from_select(source)
        .build()
        .unwrap();

    assert!(built.sql.contains("INSERT INTO \"users\""));
    assert!(built.sql.contains("SELECT"));
    assert_eq!(built.parameters.len(), 1);
}

#[test]
fn merge_validations() {
    let err = MergeBuilder::into("t")
        .using("s", None)
        .on(col("t.id").eq(col("s.id")))
        .when_not_matched_then_insert(None, Some(vec![Value::Int(1)]), None)
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::MergeValuesWithoutColumns));

    let err = MergeBuilder::into("t")
        .using("s", None)
        .on(col("t.id").eq(col("s.id")))
        .when_not_matched_then_insert(Some(vec!["a"]), Some(vec![Value::Int(1), Value::Int(2)]), None)
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::MergeShape { .. }));
}

#[test]
fn merge_renders_repeatable_when_clauses() {
    let built = MergeBuilder::into("inventory")
        .dialect(Dialect::BigQuery)
        .target_alias("t")
        .using("deliveries", Some("d"))
        .on(col("t.sku").eq(col("d.sku")))
        .when_matched_then_update(vec![("qty", Value::Int(5))], None)
        .when_matched_then_delete(Some(col("d.discontinued").eq(true)))
        .when_not_matched_then_insert(
            Some(vec!["sku", "qty"]),
            Some(vec![Value::String("x".into()), Value::Int(5)]),
            None,
        )
        .build()
        .unwrap();

    let update_pos = built.sql.find("WHEN MATCHED THEN UPDATE").unwrap();
    let delete_pos = built.sql.find("WHEN MATCHED AND").unwrap();
    let insert_pos = built.sql.find("WHEN NOT MATCHED THEN INSERT").unwrap();
    assert!(update_pos < delete_pos && delete_pos < insert_pos);
    assert_eq!(built.kind, StatementKind::Merge);
}

#[test]
fn union_then_order_via_set_operation() {
    let left = SelectBuilder::new().select(vec![col("id")]).from_("a");
    let right = SelectBuilder::new().select(vec![col("id")]).from_("b");

    let built = left.union_all(right).build().unwrap();
    assert!(built.sql.contains("UNION ALL"));
}

#[test]
fn case_builder_through_parent() {
    let mut builder = SelectBuilder::new();
    let grade = builder
        .case()
        .when(col("score").gte(lit_int(90)), "A")
        .else_("F")
        .end();

    let built = builder
        .select(vec![sqlbridge::sql::SelectExpr::new(grade).with_alias("grade")])
        .from_("exams")
        .build()
        .unwrap();

    assert!(built.sql.contains("CASE WHEN \"score\" >= 90 THEN $1 ELSE $2 END"));
    assert_eq!(built.parameters.len(), 2);
}

#[test]
fn ddl_builders_cover_the_statement_family() {
    use sqlbridge::sql::{CreateIndex, CreateSchema, DropObject, Truncate};

    let ctas = DdlBuilder::create_table_as(
        "active_users",
        SelectBuilder::new().select_star().from_("users").where_(("active", true)),
    )
    .build()
    .unwrap();
    assert!(ctas.sql.starts_with("CREATE TABLE \"active_users\" AS SELECT"));
    assert_eq!(ctas.kind, StatementKind::Ddl);

    let index = DdlBuilder::from_statement(
        CreateIndex::new("idx_q", "event_queue")
            .unique()
            .if_not_exists()
            .columns(["channel", "available_at"])
            .using("btree"),
    )
    .dialect(Dialect::Postgres)
    .build()
    .unwrap();
    assert!(index.sql.contains("UNIQUE INDEX IF NOT EXISTS"));
    assert!(index.sql.contains("USING btree"));

    let schema = DdlBuilder::from_statement(CreateSchema::new("audit").authorization("dba"))
        .build()
        .unwrap();
    assert!(schema.sql.contains("AUTHORIZATION \"dba\""));

    let drop = DdlBuilder::from_statement(DropObject::view("v_old").if_exists().restrict())
        .build()
        .unwrap();
    assert_eq!(drop.sql, "DROP VIEW IF EXISTS \"v_old\" RESTRICT");

    let truncate = DdlBuilder::from_statement(
        Truncate::table("event_queue").continue_identity().cascade(),
    )
    .build()
    .unwrap();
    assert!(truncate.sql.contains("CONTINUE IDENTITY CASCADE"));
}

#[test]
fn optimizer_failure_is_not_fatal() {
    // Every pass enabled on a query none of them can improve: the
    // statement still builds.
    let built = SelectBuilder::new()
        .select(vec![col("id")])
        .from_("t")
        .where_(("x", 1_i64))
        .optimize(OptimizeFlags::all())
        .build()
        .unwrap();
    assert!(built.sql.contains("SELECT"));
}

#[test]
fn named_style_builders_produce_named_containers() {
    for (dialect, marker) in [
        (Dialect::Oracle, ":where_param_0"),
        (Dialect::Spanner, "@where_param_0"),
        (Dialect::BigQuery, "@where_param_0"),
    ] {
        let built = SelectBuilder::new()
            .dialect(dialect)
            .select(vec![col("id")])
            .from_("t")
            .where_(("x", 1_i64))
            .build()
            .unwrap();
        assert!(built.sql.contains(marker), "{dialect}: {}", built.sql);
        assert!(matches!(built.parameters, Parameters::Named(_)));
    }
}
