use futures_util::StreamExt;
use mdo::testing::MemoryConnection;
use mdo::{Cond, DbError, Session, SessionConfig, StatementState, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn session() -> (Session<MemoryConnection>, MemoryConnection) {
    let conn = MemoryConnection::new();
    (Session::new(conn.clone()), conn)
}

#[tokio::test]
async fn prepare_does_not_execute() {
    let (session, conn) = session();
    let _stmt = session.prepare("SELECT 1").unwrap();
    assert!(conn.executed().is_empty());
    assert_eq!(session.pending(), 1);
}

#[tokio::test]
async fn statements_run_in_submission_order() {
    let (session, conn) = session();
    conn.push_rows(&["n"], [[Value::from("first")]]);
    conn.push_rows(&["n"], [[Value::from("second")]]);

    let mut a = session.prepare("SELECT 'a'").unwrap();
    let mut b = session.prepare("SELECT 'b'").unwrap();

    // Requesting b first still runs a first.
    let b_rows = b.fetch_column(0).await.unwrap();
    assert_eq!(conn.executed(), vec!["SELECT 'a'", "SELECT 'b'"]);
    assert_eq!(b_rows, vec![Value::from("second")]);
    assert_eq!(session.pending(), 0);

    let a_rows = a.fetch_column(0).await.unwrap();
    assert_eq!(a_rows, vec![Value::from("first")]);
    assert_eq!(conn.executed().len(), 2);
}

#[tokio::test]
async fn failure_is_reported_by_its_own_statement_only() {
    let (session, conn) = session();
    conn.push_rows(&["n"], [[Value::from(1)]]);
    conn.push_error("duplicate entry");
    conn.push_rows(&["n"], [[Value::from(3)]]);

    let mut a = session.prepare("SELECT 1").unwrap();
    let mut b = session.prepare("INSERT INTO t VALUES (1)").unwrap();
    let mut c = session.prepare("SELECT 3").unwrap();

    assert_eq!(c.fetch_column(0).await.unwrap(), vec![Value::from(3)]);
    assert_eq!(a.fetch_column(0).await.unwrap(), vec![Value::from(1)]);

    let err = b.execute().await.unwrap_err();
    assert!(err.is_engine());
    assert_eq!(err.sql(), Some("INSERT INTO t VALUES (1)"));
    assert_eq!(b.state(), StatementState::Failed);

    // The error is reported once; afterwards the statement is just unusable.
    let err = b.affected_rows().await.unwrap_err();
    assert!(err.is_resource_state());
}

#[tokio::test]
async fn flush_runs_everything_pending() {
    let (session, conn) = session();
    let _a = session.prepare("UPDATE t SET a = 1 WHERE id = 1").unwrap();
    let _b = session.prepare("UPDATE t SET a = 2 WHERE id = 2").unwrap();
    session.flush().await.unwrap();
    assert_eq!(conn.executed().len(), 2);
    assert_eq!(session.pending(), 0);
}

#[tokio::test]
async fn callbacks_run_once_before_materialization() {
    let (session, conn) = session();
    conn.push_rows(&["id"], [[Value::from(1)], [Value::from(2)]]);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen_rows = Arc::new(AtomicUsize::new(0));
    let mut stmt = session.prepare("SELECT id FROM t").unwrap();
    {
        let calls = Arc::clone(&calls);
        let seen_rows = Arc::clone(&seen_rows);
        stmt.on_executed(move |info| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen_rows.store(info.row_count.unwrap_or(0), Ordering::SeqCst);
            assert_eq!(info.columns, vec!["id".to_string()]);
        })
        .unwrap();
    }

    assert_eq!(stmt.fetch_rows().await.unwrap().len(), 2);
    assert_eq!(stmt.fetch_rows().await.unwrap().len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen_rows.load(Ordering::SeqCst), 2);

    let err = stmt.on_executed(|_| {}).unwrap_err();
    assert!(err.is_resource_state());
}

#[tokio::test]
async fn callbacks_of_statements_flushed_ahead_still_run() {
    let (session, _conn) = session();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut a = session.prepare("UPDATE t SET a = 1 WHERE id = 1").unwrap();
    let counter = Arc::clone(&calls);
    a.on_executed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let mut b = session.prepare("SELECT 1").unwrap();

    b.execute().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // a already ran; it can no longer take callbacks.
    assert!(a.on_executed(|_| {}).is_err());
    a.execute().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn open_stream_blocks_the_connection_until_released() {
    let (session, conn) = session();
    conn.push_rows(&["id"], [[Value::from(1)], [Value::from(2)]]);

    let mut streamed = session.prepare_unbuffered("SELECT id FROM t").unwrap();
    streamed.execute().await.unwrap();

    let mut next = session.prepare("SELECT 2").unwrap();
    let err = next.execute().await.unwrap_err();
    assert!(err.is_resource_state());
    assert_eq!(next.state(), StatementState::Queued);
    assert_eq!(session.pending(), 1);

    streamed.release();
    next.execute().await.unwrap();
    assert_eq!(conn.executed().len(), 2);
}

#[tokio::test]
async fn statements_run_ahead_are_buffered() {
    let (session, conn) = session();
    conn.push_rows(&["id"], [[Value::from(1)], [Value::from(2)]]);

    let mut ahead = session.prepare_unbuffered("SELECT id FROM t").unwrap();
    let mut target = session.prepare("SELECT 2").unwrap();

    target.execute().await.unwrap();
    assert_eq!(ahead.row_count().await.unwrap(), Some(2));
    assert_eq!(ahead.fetch_rows().await.unwrap().len(), 2);
    assert_eq!(ahead.fetch_rows().await.unwrap().len(), 2);
}

#[tokio::test]
async fn early_dropped_stream_releases_cursor_once() {
    let (session, conn) = session();
    conn.push_rows(
        &["id"],
        [[Value::from(1)], [Value::from(2)], [Value::from(3)]],
    );

    let mut stmt = session.prepare_unbuffered("SELECT id FROM t").unwrap();
    {
        let mut rows = stmt.stream_rows();
        let first = rows.next().await.unwrap().unwrap();
        assert_eq!(first.get(0), Some(&Value::from(1)));
    }
    assert_eq!(conn.release_count(), 1);
    assert_eq!(conn.fetch_count(), 1);
    assert_eq!(stmt.state(), StatementState::Materialized);

    stmt.release();
    assert_eq!(conn.release_count(), 1);

    // The connection is free again.
    session.prepare("SELECT 2").unwrap().execute().await.unwrap();
}

#[tokio::test]
async fn failing_fetch_still_releases_streamed_cursor() {
    let (session, conn) = session();
    conn.push_rows_failing(
        &["id"],
        [[Value::from(1)], [Value::from(2)], [Value::from(3)]],
        1,
    );

    let mut stmt = session.prepare_unbuffered("SELECT id FROM t").unwrap();
    let err = stmt.fetch_rows().await.unwrap_err();
    assert!(err.is_engine());
    assert_eq!(conn.release_count(), 1);

    session.prepare("SELECT 2").unwrap().execute().await.unwrap();
}

#[tokio::test]
async fn streamed_result_is_single_use() {
    let (session, conn) = session();
    conn.push_rows(&["id"], [[Value::from(1)], [Value::from(2)]]);

    let mut stmt = session.prepare_unbuffered("SELECT id FROM t").unwrap();
    assert_eq!(stmt.fetch_column(0).await.unwrap().len(), 2);
    let err = stmt.fetch_column(0).await.unwrap_err();
    assert!(err.is_resource_state());
}

#[tokio::test]
async fn close_fails_pending_statements_and_cursors() {
    let (session, conn) = session();
    conn.push_rows(&["id"], [[Value::from(1)]]);

    let mut done = session.prepare("SELECT id FROM t").unwrap();
    let mut queued = session.prepare("SELECT 2").unwrap();
    assert_eq!(done.fetch_rows().await.unwrap().len(), 1);

    session.close().await.unwrap();
    assert!(session.is_closed());
    assert!(conn.is_closed());

    let err = queued.fetch_rows().await.unwrap_err();
    assert!(err.is_resource_state());
    assert_eq!(queued.state(), StatementState::Failed);

    let err = done.fetch_rows().await.unwrap_err();
    assert!(err.is_resource_state());

    let err = session.prepare("SELECT 3").unwrap_err();
    assert!(err.is_resource_state());

    session.close().await.unwrap();
    assert_eq!(conn.executed(), vec!["SELECT id FROM t"]);
}

#[tokio::test]
async fn builder_errors_fail_at_prepare() {
    let (session, conn) = session();

    let err = session
        .update_rows("users", [("status", "inactive")], Vec::<Cond>::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::EmptyPredicateGuard {
            statement: "UPDATE",
            ..
        }
    ));

    let err = session.delete_rows("users", Vec::new()).await.unwrap_err();
    assert!(err.is_builder_error());

    let bad = session.select().from("a AS x").from(("x", "b"));
    assert!(session.prepare(&bad).unwrap_err().is_builder_error());

    assert!(conn.executed().is_empty());
    assert_eq!(session.pending(), 0);
}

#[tokio::test]
async fn mutations_report_affected_rows_and_insert_id() {
    let (session, conn) = session();
    conn.push_affected(1, Some(42));
    conn.push_affected(3, None);
    conn.push_affected(2, None);

    let summary = session
        .insert_row("users", [("name", "bob"), ("status", "new")])
        .await
        .unwrap();
    assert_eq!(summary.affected_rows, 1);
    assert_eq!(summary.last_insert_id, Some(42));

    let updated = session
        .update_rows(
            "users",
            [("status", "active")],
            [Cond::bind("status = ?", "new")],
        )
        .await
        .unwrap();
    assert_eq!(updated, 3);

    let deleted = session
        .delete_rows("users", [Cond::raw("status = 'gone'")])
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let executed = conn.executed();
    assert_eq!(
        executed[0],
        "INSERT INTO `users` (`name`, `status`) VALUES ('bob', 'new')"
    );
    assert_eq!(
        executed[1],
        "UPDATE `users` SET `status` = 'active' WHERE (status = 'new')"
    );
    assert_eq!(executed[2], "DELETE FROM `users` WHERE (status = 'gone')");
    assert_eq!(session.last_insert_id().await.unwrap(), Some(42));
}

#[tokio::test]
async fn mutation_has_no_result_set() {
    let (session, conn) = session();
    conn.push_affected(5, None);

    let mut stmt = session.prepare("DELETE FROM t WHERE 1").unwrap();
    assert_eq!(stmt.affected_rows().await.unwrap(), 5);
    let err = stmt.fetch_rows().await.unwrap_err();
    assert!(err.is_resource_state());
}

#[tokio::test]
async fn fetch_row_forces_limit_one() {
    let (session, conn) = session();
    conn.push_rows(&["id", "name"], [[Value::from(7), Value::from("ann")]]);
    conn.push_rows(&["total"], [[Value::from(12)]]);

    let select = session.select().from("users").and_where(("id = ?", 7));
    let row = session.fetch_row(&select).await.unwrap().unwrap();
    assert_eq!(row.get_named("name"), Some(&Value::from("ann")));

    let count = session
        .fetch_one(&session.select().from_cols("users", [mdo::Expr::new("COUNT(*)")]))
        .await
        .unwrap();
    assert_eq!(count, Some(Value::from(12)));

    let executed = conn.executed();
    assert!(executed[0].ends_with("LIMIT 1"), "{}", executed[0]);
    assert!(executed[1].ends_with("LIMIT 1"), "{}", executed[1]);

    // Empty result.
    assert!(session.fetch_row(&select).await.unwrap().is_none());
}

#[tokio::test]
async fn sequences_come_from_the_engine() {
    let conn = MemoryConnection::new();
    conn.set_sequence("users_seq", 10);
    let session = Session::with_config(conn, SessionConfig::new().log_sql(false));

    assert_eq!(session.next_sequence_id("users_seq").await.unwrap(), Some(11));
    assert_eq!(session.next_sequence_id("users_seq").await.unwrap(), Some(12));
    assert_eq!(session.next_sequence_id("other").await.unwrap(), Some(1));
}
