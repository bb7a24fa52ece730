//! Tests for the statement builders.

use crate::builder::{
    Assemble, ClausePart, Column, Direction, JoinType, NO_COLUMNS, PartRef, UnionType, delete,
    select, update,
};
use crate::error::DbError;
use crate::table::TableInfo;
use crate::value::Expr;
use std::sync::Arc;

fn correlations(s: &crate::builder::Select) -> Vec<String> {
    match s.part(ClausePart::From) {
        PartRef::From(entries) => entries.iter().map(|e| e.correlation.clone()).collect(),
        other => panic!("unexpected part: {other:?}"),
    }
}

#[test]
fn test_select_basic() {
    let sql = select().from("users").assemble().unwrap();
    assert_eq!(sql, "SELECT `users`.* FROM `users`");
}

#[test]
fn test_from_then_left_join() {
    let sql = select()
        .from("orders")
        .join_left("items", "orders.id = items.order_id", NO_COLUMNS)
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `orders`.* FROM `orders` LEFT JOIN `items` ON orders.id = items.order_id"
    );
}

#[test]
fn test_from_entries_stay_ahead_of_joins() {
    let s = select()
        .from("a")
        .join_inner("b", "b.a_id = a.id", NO_COLUMNS)
        .from_cols("c", NO_COLUMNS)
        .join_left("d", "d.b_id = b.id", NO_COLUMNS)
        .from_cols("e", NO_COLUMNS);
    assert_eq!(correlations(&s), vec!["a", "c", "e", "b", "d"]);
    assert_eq!(
        s.assemble().unwrap(),
        "SELECT `a`.* FROM `a` INNER JOIN `c` INNER JOIN `e` \
         INNER JOIN `b` ON b.a_id = a.id LEFT JOIN `d` ON d.b_id = b.id"
    );
}

#[test]
fn test_late_from_columns_follow_from_columns() {
    let sql = select()
        .from_cols("a", ["x"])
        .join_inner("b", "b.id = a.b_id", ["y"])
        .from_cols("c", ["z"])
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `a`.`x`, `c`.`z`, `b`.`y` FROM `a` INNER JOIN `c` INNER JOIN `b` ON b.id = a.b_id"
    );
}

#[test]
fn test_columns_for_splices_after_correlation() {
    let sql = select()
        .from_cols("a", ["x"])
        .join_inner("b", "b.id = a.id", ["y"])
        .columns_for(["w"], "a")
        .columns(["v"])
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `a`.`x`, `a`.`w`, `b`.`y`, `a`.`v` FROM `a` INNER JOIN `b` ON b.id = a.id"
    );
}

#[test]
fn test_columns_without_from_is_malformed() {
    let err = select().columns(["a"]).assemble().unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_columns_for_unknown_correlation_is_malformed() {
    let s = select().from_cols("a", ["x"]).columns_for(["w"], "zzz");
    assert!(s.build_error().is_some());
    let err = s.assemble().unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_derived_correlation_names_get_suffixes() {
    let s = select()
        .from("users")
        .join_inner("users", "users_2.parent_id = users.id", NO_COLUMNS)
        .join_left("users", "users_3.id = users_2.parent_id", NO_COLUMNS);
    assert_eq!(correlations(&s), vec!["users", "users_2", "users_3"]);
    assert_eq!(
        s.assemble().unwrap(),
        "SELECT `users`.* FROM `users` \
         INNER JOIN `users` AS `users_2` ON users_2.parent_id = users.id \
         LEFT JOIN `users` AS `users_3` ON users_3.id = users_2.parent_id"
    );
}

#[test]
fn test_explicit_duplicate_correlation_is_malformed() {
    let err = select()
        .from("users AS u")
        .join_inner(("u", "accounts"), "u.id = u.id", NO_COLUMNS)
        .assemble()
        .unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_aliased_and_schema_tables() {
    let sql = select()
        .from("shop.orders")
        .join_inner(("c", "shop.customers"), "c.id = orders.customer_id", ["name"])
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `orders`.*, `c`.`name` FROM `shop`.`orders` \
         INNER JOIN `shop`.`customers` AS `c` ON c.id = orders.customer_id"
    );
}

#[test]
fn test_expression_and_subquery_tables_use_t() {
    let sql = select()
        .from(Expr::new("(SELECT 1 AS one)"))
        .from(select().from("x"))
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `t`.*, `t_2`.* FROM (SELECT 1 AS one) AS `t` \
         INNER JOIN (SELECT `x`.* FROM `x`) AS `t_2`"
    );
}

#[test]
fn test_subquery_errors_propagate() {
    let inner = select().join_using(JoinType::Inner, "x", "id", NO_COLUMNS);
    assert!(inner.build_error().is_some());
    let err = select().from(inner).assemble().unwrap_err();
    assert!(err.is_builder_error());
}

#[test]
fn test_column_token_parsing() {
    let s = select().from_cols(
        "orders AS o",
        [
            Column::from("o.id"),
            Column::from("total AS amount"),
            Column::from("COUNT(*) AS n"),
            Column::aliased("when", "created_at"),
        ],
    );
    assert_eq!(
        s.assemble().unwrap(),
        "SELECT `o`.`id`, `o`.`total` AS `amount`, COUNT(*) AS `n`, \
         `o`.`created_at` AS `when` FROM `orders` AS `o`"
    );
    assert!(!s.is_read_only());

    let s = s.columns(["SUM(o.total)"]);
    assert!(s.is_read_only());
}

#[test]
fn test_wildcard_only_is_not_read_only() {
    assert!(!select().from("t").is_read_only());
    assert!(select().from_cols("t", [Expr::new("NOW()")]).is_read_only());
}

#[test]
fn test_where_or_where() {
    let sql = select()
        .from("t")
        .and_where(("id = ?", 5))
        .or_where(("id = ?", 6))
        .assemble()
        .unwrap();
    assert!(sql.contains("WHERE (id = 5) OR (id = 6)"), "{sql}");
}

#[test]
fn test_where_after_union_is_malformed() {
    let err = select()
        .union(["SELECT 1"], UnionType::Union)
        .and_where("a = 1")
        .assemble()
        .unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_union_after_where_is_malformed() {
    let err = select()
        .and_where("a = 1")
        .union(["SELECT 1"], UnionType::Union)
        .assemble()
        .unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_join_after_union_is_malformed() {
    let err = select()
        .union(["SELECT 1"], UnionType::Union)
        .from("t")
        .assemble()
        .unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_union_rendering() {
    let sql = select()
        .union([select().from("a"), select().from("b")], UnionType::UnionAll)
        .order_by("1")
        .limit(5)
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `a`.* FROM `a` UNION ALL SELECT `b`.* FROM `b` ORDER BY 1 ASC LIMIT 5"
    );
    assert_eq!("union all".parse::<UnionType>().unwrap(), UnionType::UnionAll);
    assert!("intersect".parse::<UnionType>().is_err());
}

#[test]
fn test_limit_rendering() {
    let base = select().from("t");
    assert!(base.clone().limit(10).assemble().unwrap().ends_with(" LIMIT 10"));
    assert!(
        base.clone()
            .limit_offset(10, 20)
            .assemble()
            .unwrap()
            .ends_with(" LIMIT 10 OFFSET 20")
    );
    assert!(
        base.clone()
            .limit_offset(0, 5)
            .assemble()
            .unwrap()
            .ends_with(" LIMIT 18446744073709551615 OFFSET 5")
    );
    assert!(
        base.clone()
            .limit_page(3, 10)
            .assemble()
            .unwrap()
            .ends_with(" LIMIT 10 OFFSET 20")
    );
    assert!(
        base.clone()
            .limit_page(0, 0)
            .assemble()
            .unwrap()
            .ends_with(" LIMIT 1")
    );
    assert!(!base.limit(0).assemble().unwrap().contains("LIMIT"));
}

#[test]
fn test_order_direction_inference() {
    let sql = select()
        .from("t")
        .order_by("created_at desc")
        .order_by("name")
        .order_by("FIELD(id, 3, 1) DESC")
        .order_by("2")
        .order_expr(Expr::new("RAND()"), Direction::Asc)
        .assemble()
        .unwrap();
    assert!(
        sql.ends_with(
            "ORDER BY `created_at` DESC, `name` ASC, FIELD(id, 3, 1) DESC, 2 ASC, RAND() ASC"
        ),
        "{sql}"
    );
}

#[test]
fn test_group_and_having() {
    let sql = select()
        .from_cols("orders", ["customer_id", "COUNT(*) AS n"])
        .group_by("customer_id")
        .and_having(("COUNT(*) > ?", 2))
        .or_having("SUM(total) > 100")
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `orders`.`customer_id`, COUNT(*) AS `n` FROM `orders` \
         GROUP BY `customer_id` HAVING (COUNT(*) > 2) OR (SUM(total) > 100)"
    );
}

#[test]
fn test_group_requires_from() {
    let sql = select()
        .from_cols("", [Expr::new("1")])
        .group_by("x")
        .and_having("x > 1")
        .assemble()
        .unwrap();
    assert_eq!(sql, "SELECT 1");
}

#[test]
fn test_distinct_and_for_update() {
    let sql = select()
        .distinct(true)
        .from("t")
        .for_update(true)
        .assemble()
        .unwrap();
    assert_eq!(sql, "SELECT DISTINCT `t`.* FROM `t` FOR UPDATE");
}

#[test]
fn test_index_hints() {
    let sql = select()
        .from("users")
        .join_inner(("o", "orders"), "o.user_id = users.id", NO_COLUMNS)
        .force_index(&["idx_a", "idx_b"], None, None)
        .use_index(&["idx_user"], Some("join"), Some("o"))
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `users`.* FROM `users` FORCE INDEX (idx_a,idx_b) \
         INNER JOIN `orders` AS `o` USE INDEX FOR JOIN (idx_user) ON o.user_id = users.id"
    );

    let err = select()
        .from("users")
        .ignore_index(&["idx"], None, Some("nope"))
        .assemble()
        .unwrap_err();
    assert!(err.is_builder_error());
}

#[test]
fn test_join_using() {
    let sql = select()
        .from("orders")
        .join_using(JoinType::Left, "items", "order_id", NO_COLUMNS)
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `orders`.* FROM `orders` LEFT JOIN `items` ON `items`.`order_id` = `orders`.`order_id`"
    );

    let err = select()
        .from("orders")
        .join_using(JoinType::Cross, "items", "order_id", NO_COLUMNS)
        .assemble()
        .unwrap_err();
    assert!(err.is_builder_error());
}

#[test]
fn test_join_keywords() {
    let sql = select()
        .from("a")
        .join_straight("b", "b.id = a.id", NO_COLUMNS)
        .join_cross("c", NO_COLUMNS)
        .join_natural("d", NO_COLUMNS)
        .join_right("e", "e.id = a.id", NO_COLUMNS)
        .join_full("f", "f.id = a.id", NO_COLUMNS)
        .assemble()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `a`.* FROM `a` STRAIGHT_JOIN `b` ON b.id = a.id CROSS JOIN `c` \
         NATURAL JOIN `d` RIGHT JOIN `e` ON e.id = a.id FULL JOIN `f` ON f.id = a.id"
    );
    assert_eq!("LEFT  join".parse::<JoinType>().unwrap(), JoinType::Left);
    assert!(matches!(
        "sideways join".parse::<JoinType>(),
        Err(DbError::MalformedClause(_))
    ));
}

#[test]
fn test_bound_table_supplies_implicit_wildcard() {
    let users = Arc::new(TableInfo::new("users"));
    let sql = select().bind_table(users.clone()).assemble().unwrap();
    assert_eq!(sql, "SELECT `users`.* FROM `users`");

    let sql = select()
        .bind_table(users)
        .from_cols("users", NO_COLUMNS)
        .and_where("id = 1")
        .assemble()
        .unwrap();
    assert_eq!(sql, "SELECT `users`.* FROM `users` WHERE (id = 1)");

    let sql = select()
        .bind_table(Arc::new(TableInfo::new("users").schema("app")))
        .assemble()
        .unwrap();
    assert_eq!(sql, "SELECT `users`.* FROM `app`.`users`");
}

#[test]
fn test_no_columns_is_malformed() {
    let err = select().from_cols("t", NO_COLUMNS).assemble().unwrap_err();
    assert!(matches!(err, DbError::MalformedClause(_)));
}

#[test]
fn test_parts_and_reset() {
    let s = select()
        .from("t")
        .and_where("a = 1")
        .limit(3)
        .bind_table(Arc::new(TableInfo::new("t")));

    match s.part_by_name("where").unwrap() {
        PartRef::Predicates(terms) => assert_eq!(terms, ["(a = 1)".to_string()]),
        other => panic!("unexpected part: {other:?}"),
    }
    assert!(matches!(s.part(ClausePart::LimitCount), PartRef::Count(Some(3))));
    assert!(matches!(
        s.part_by_name("bogus"),
        Err(DbError::MalformedClause(_))
    ));

    let s = s.reset_part(ClausePart::Where);
    assert_eq!(s.assemble().unwrap(), "SELECT `t`.* FROM `t` LIMIT 3");

    let s = s.reset();
    assert!(correlations(&s).is_empty());
    assert!(s.table().is_some());
}

#[test]
fn test_mutations_require_where() {
    assert!(matches!(
        update("users").set("a", 1).assemble(),
        Err(DbError::EmptyPredicateGuard { .. })
    ));
    assert!(matches!(
        delete("users").assemble(),
        Err(DbError::EmptyPredicateGuard { .. })
    ));
}
