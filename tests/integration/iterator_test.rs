use anyhow::Result;

use rowwire::engine::{EngineError, EngineValue, ScriptedEngine, ScriptedResult};
use rowwire::{Column, RowIterator};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_iterates_example_result_in_order() -> Result<()> {
    let (handle, engine) = example_engine();
    let mut rows = RowIterator::new(handle.execute(EXAMPLE_QUERY)?)?;

    assert_eq!(rows.columns(), example_columns().as_slice());

    let first = rows.next_row()?.expect("first row");
    assert_eq!(first[0], EngineValue::text("world"));
    let second = rows.next_row()?.expect("second row");
    assert_eq!(second[0], EngineValue::text("world2"));

    assert_eq!(rows.next_row()?, None);
    assert!(rows.is_exhausted());
    assert_eq!(rows.rows_read(), 2);

    // exhaustion releases the cursor right away
    assert_eq!(engine.open_cursors(), 0);
    Ok(())
}

#[test]
fn test_exhausted_iterator_stays_exhausted() -> Result<()> {
    let (handle, engine) = scripted_handle(ScriptedEngine::new().with_script("q", counting_result(1)));
    let mut rows = RowIterator::new(handle.execute("q")?)?;

    assert!(rows.next_row()?.is_some());
    for _ in 0..3 {
        assert_eq!(rows.next_row()?, None);
    }
    assert_eq!(engine.rows_pulled(), 1);
    Ok(())
}

#[test]
fn test_iterator_is_lazy() -> Result<()> {
    let (handle, engine) = scripted_handle(ScriptedEngine::new().with_script("q", counting_result(1_000_000)));
    let rows = RowIterator::new(handle.execute("q")?)?;
    assert_eq!(engine.rows_pulled(), 0);

    let taken: Vec<_> = rows.take(5).collect::<std::result::Result<_, _>>()?;
    assert_eq!(taken.len(), 5);
    assert_eq!(engine.rows_pulled(), 5);
    // the iterator was dropped by `take`, which releases the cursor
    assert_eq!(engine.open_cursors(), 0);
    Ok(())
}

#[test]
fn test_cursor_error_is_fatal() -> Result<()> {
    let (handle, engine) =
        scripted_handle(ScriptedEngine::new().with_script("q", counting_result(5).fail_after(2, "I/O error")));
    let mut rows = RowIterator::new(handle.execute("q")?)?;

    assert!(rows.next_row()?.is_some());
    assert!(rows.next_row()?.is_some());
    assert_eq!(rows.next_row(), Err(EngineError::Cursor("I/O error".to_string())));
    assert_eq!(engine.open_cursors(), 0);

    assert_eq!(rows.next_row(), Err(EngineError::CursorFailed));
    assert!(rows.next().is_none());
    assert!(!rows.is_exhausted());
    assert_eq!(rows.rows_read(), 2);
    Ok(())
}

#[test]
fn test_iterator_adapter_yields_error_then_stops() -> Result<()> {
    let (handle, _) =
        scripted_handle(ScriptedEngine::new().with_script("q", counting_result(5).fail_after(3, "boom")));
    let items: Vec<_> = RowIterator::new(handle.execute("q")?)?.collect();

    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(|item| item.is_ok()));
    assert_eq!(items[3], Err(EngineError::Cursor("boom".to_string())));
    Ok(())
}

#[test]
fn test_metadata_failure_releases_cursor() -> Result<()> {
    let (handle, engine) =
        scripted_handle(ScriptedEngine::new().with_script("q", counting_result(1).fail_metadata("no columns")));

    let err = RowIterator::new(handle.execute("q")?).err().unwrap();
    assert_eq!(err, EngineError::Metadata("no columns".to_string()));
    assert_eq!(engine.open_cursors(), 0);
    Ok(())
}

#[test]
fn test_short_row_is_reported() -> Result<()> {
    let result = ScriptedResult::new(vec![Column::new("a", "BIGINT"), Column::new("b", "VARCHAR")])
        .with_row(vec![EngineValue::Int64(1), EngineValue::text("x")])
        .with_row(vec![EngineValue::Int64(2)]);
    let (handle, engine) = scripted_handle(ScriptedEngine::new().with_script("q", result));
    let mut rows = RowIterator::new(handle.execute("q")?)?;

    assert!(rows.next_row()?.is_some());
    assert_eq!(rows.next_row(), Err(EngineError::RowWidth { expected: 2, actual: 1 }));
    assert_eq!(engine.open_cursors(), 0);
    Ok(())
}

#[test]
fn test_close_releases_cursor_early() -> Result<()> {
    let (handle, engine) = scripted_handle(ScriptedEngine::new().with_script("q", counting_result(10)));
    let mut rows = RowIterator::new(handle.execute("q")?)?;

    assert!(rows.next_row()?.is_some());
    assert_eq!(engine.open_cursors(), 1);

    rows.close();
    assert_eq!(engine.open_cursors(), 0);
    assert_eq!(rows.next_row()?, None);
    assert_eq!(engine.rows_pulled(), 1);
    Ok(())
}

#[test]
fn test_sqlite_cursor_through_iterator() -> Result<()> {
    let (sqlite, _dir) = create_temp_sqlite()?;
    sqlite.execute_batch(
        "CREATE TABLE numbers (n INTEGER NOT NULL);
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 100)
         INSERT INTO numbers SELECT x FROM seq;",
    )?;
    let handle = rowwire::EngineHandle::new(sqlite);

    let rows = RowIterator::new(handle.execute("SELECT n FROM numbers ORDER BY n")?)?;
    assert_eq!(rows.columns(), &[Column::new("n", "INTEGER")]);

    let values: Vec<i64> = rows
        .map(|row| match row?.as_slice() {
            [EngineValue::Int64(n)] => Ok(*n),
            other => panic!("unexpected row {:?}", other),
        })
        .collect::<std::result::Result<_, EngineError>>()?;
    assert_eq!(values, (1..=100).collect::<Vec<i64>>());
    Ok(())
}
