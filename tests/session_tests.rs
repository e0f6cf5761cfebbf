use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;
use tempfile::NamedTempFile;
use tillroll::config::{
    parse_date, DatabaseConfig, DateFilter, GroupOrder, TransactionQuery, MAX_CHUNK_SIZE,
};
use tillroll::error::PipelineError;
use tillroll::{Session, Transaction};

const SCHEMA: &str = "CREATE TABLE items_sold_final (
    unique_id INTEGER,
    item_num TEXT,
    retail,
    wholesale,
    the_type TEXT,
    the_time TEXT,
    isfm_id INTEGER,
    num_units,
    statetax,
    countytax,
    citytax,
    void_item_flag TEXT,
    void_sale_flag TEXT
)";

struct Line<'a> {
    unique_id: i64,
    tx: i64,
    kind: &'a str,
    retail: &'a str,
    taxes: [&'a str; 3],
    time: &'a str,
    voided: bool,
}

fn line<'a>(unique_id: i64, tx: i64, kind: &'a str, retail: &'a str, time: &'a str) -> Line<'a> {
    Line {
        unique_id,
        tx,
        kind,
        retail,
        taxes: ["0.00", "0.00", "0.00"],
        time,
        voided: false,
    }
}

fn insert(conn: &Connection, line: &Line) {
    conn.execute(
        "INSERT INTO items_sold_final VALUES (?1, ?2, ?3, '1.00', ?4, ?5, ?6, '1', ?7, ?8, ?9, ?10, 'N')",
        params![
            line.unique_id,
            format!("{}", 24000 + line.unique_id),
            line.retail,
            line.kind,
            line.time,
            line.tx,
            line.taxes[0],
            line.taxes[1],
            line.taxes[2],
            if line.voided { "Y" } else { "N" },
        ],
    )
    .unwrap();
}

fn session_with(lines: &[Line]) -> Session {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    for line in lines {
        insert(&conn, line);
    }
    Session::from_connection(conn)
}

fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

fn collect(session: &Session, query: &TransactionQuery) -> Vec<Transaction> {
    session
        .transactions(query)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn scenario() -> Vec<Line<'static>> {
    let mut sold_a = line(1, 100, "A", "10.00", "2020-02-18 10:00:00");
    sold_a.taxes = ["0.50", "0.20", "0.10"];
    let mut sold_b = line(2, 100, "A", "5.00", "2020-02-18 10:00:00");
    sold_b.taxes = ["0.25", "0.10", "0.05"];
    let mut other = line(3, 100, "F", "3.00", "2020-02-18 10:00:00");
    other.taxes = ["0.24", "0.00", "0.00"];
    let mut single = line(4, 99, "A", "20.00", "2020-02-17 16:45:00");
    single.taxes = ["1.00", "0.40", "0.20"];

    // Inserted out of order; the query sorts
    vec![single, other, sold_b, sold_a]
}

#[test]
fn test_reference_scenario_from_store() {
    let session = session_with(&scenario());

    let txs = collect(&session, &TransactionQuery::default());

    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].id, 100);
    assert_eq!(txs[0].total, dec("15.00"));
    assert_eq!(txs[0].tax, dec("1.20"));
    assert_eq!(txs[0].lines.len(), 2);
    assert_eq!(txs[0].lines[0].id, 1);
    assert_eq!(txs[1].id, 99);
    assert_eq!(txs[1].total, dec("20.00"));
    assert_eq!(txs[1].tax, dec("1.60"));
    assert_eq!(txs[1].lines.len(), 1);
}

#[test]
fn test_chunk_size_does_not_change_output() {
    let mut lines = Vec::new();
    for tx in 1..=9 {
        for n in 0..(tx % 4 + 1) {
            lines.push(line(tx * 10 + n, tx, "A", "1.05", "2020-02-18 10:00:00"));
        }
    }
    let session = session_with(&lines);

    let expected = collect(&session, &TransactionQuery::default());
    assert_eq!(expected.len(), 9);

    for chunk_size in [1, 2, 3, 5, 7, 100] {
        let query = TransactionQuery::default().with_chunk_size(chunk_size);
        assert_eq!(collect(&session, &query), expected, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_source_exclusions() {
    let mut voided = line(5, 101, "A", "50.00", "2020-02-18 11:00:00");
    voided.voided = true;
    let session = session_with(&[
        voided,
        line(6, 101, "A", "2.00", "2020-02-18 11:00:00"),
        line(7, 101, "AT", "9.00", "2020-02-18 11:00:00"),
        line(8, 101, "S", "9.00", "2020-02-18 11:00:00"),
        line(9, 101, "R", "9.00", "2020-02-18 11:00:00"),
        line(10, 101, "L", "9.00", "2020-02-18 11:00:00"),
    ]);

    let txs = collect(&session, &TransactionQuery::default());

    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].lines.len(), 1);
    assert_eq!(txs[0].total, dec("2.00"));
    assert_eq!(session.count_lines(&DateFilter::new()).unwrap(), 1);
}

#[test]
fn test_date_filters() {
    let session = session_with(&[
        line(1, 103, "A", "1.00", "2020-03-01 00:00:00"),
        line(2, 102, "A", "1.00", "2020-02-29 23:59:59"),
        line(3, 101, "A", "1.00", "2020-02-01 00:00:00"),
        line(4, 100, "A", "1.00", "2020-01-31 23:59:59"),
    ]);
    let ids = |filter: DateFilter| -> Vec<i64> {
        collect(&session, &TransactionQuery::new(filter))
            .iter()
            .map(|t| t.id)
            .collect()
    };

    let february = DateFilter::new()
        .start(parse_date("2020-02-01").unwrap())
        .end(parse_date("2020-02-29").unwrap());
    assert_eq!(ids(february.clone()), vec![102, 101]);
    assert_eq!(session.count_lines(&february).unwrap(), 2);

    let on = DateFilter::new().on(parse_date("2020-01-31").unwrap());
    assert_eq!(ids(on), vec![100]);

    let from_march = DateFilter::new().start(parse_date("2020-03-01").unwrap());
    assert_eq!(ids(from_march), vec![103]);

    assert_eq!(ids(DateFilter::new()).len(), 4);
}

#[test]
fn test_empty_store() {
    let session = session_with(&[]);

    let mut stream = session.transactions(&TransactionQuery::default()).unwrap();

    assert!(!stream.has_next().unwrap());
    assert_eq!(session.count_lines(&DateFilter::new()).unwrap(), 0);
}

#[test]
fn test_real_storage_is_read_exactly() {
    let session = session_with(&[line(1, 100, "A", "1.00", "2020-02-18 10:00:00")]);
    session
        .connection()
        .unwrap()
        .execute(
            "UPDATE items_sold_final SET retail = 10.5, statetax = 0.1, countytax = 0.2",
            [],
        )
        .unwrap();

    let txs = collect(&session, &TransactionQuery::default());

    assert_eq!(txs[0].total, dec("10.50"));
    assert_eq!(txs[0].tax, dec("0.3"));
}

#[test]
fn test_numeric_affinity_store() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&SCHEMA.replace("retail,", "retail NUMERIC,"))
        .unwrap();
    insert(&conn, &line(1, 100, "A", "10.50", "2020-02-18 10:00:00"));
    insert(&conn, &line(2, 100, "A", "0.07", "2020-02-18 10:00:00"));
    let stored: String = conn
        .query_row("SELECT typeof(retail) FROM items_sold_final LIMIT 1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(stored, "real");
    let session = Session::from_connection(conn);

    let txs = collect(&session, &TransactionQuery::default());

    assert_eq!(txs[0].total, dec("10.57"));
    assert_eq!(txs[0].lines[0].price, dec("10.50"));
}

#[test]
fn test_unparseable_money_is_rejected() {
    let session = session_with(&[line(1, 100, "A", "ten", "2020-02-18 10:00:00")]);

    let result: Result<Vec<Transaction>, PipelineError> = session
        .transactions(&TransactionQuery::default())
        .unwrap()
        .collect();

    match result {
        Err(PipelineError::Schema { field, .. }) => assert_eq!(field, "retail"),
        _ => panic!("Expected Schema error"),
    }
}

#[test]
fn test_integer_storage_is_accepted() {
    let session = session_with(&[line(1, 100, "A", "1.00", "2020-02-18 10:00:00")]);
    session
        .connection()
        .unwrap()
        .execute("UPDATE items_sold_final SET retail = 7", [])
        .unwrap();

    let txs = collect(&session, &TransactionQuery::default());

    assert_eq!(txs[0].total, Decimal::from(7));
}

#[test]
fn test_strict_order_accepts_store_order() {
    let session = session_with(&scenario());
    let query = TransactionQuery::default().with_order(GroupOrder::Descending);

    assert_eq!(collect(&session, &query).len(), 2);
}

#[test]
fn test_zero_chunk_size_is_rejected() {
    let session = session_with(&scenario());
    let query = TransactionQuery::default().with_chunk_size(0);

    assert!(matches!(
        session.transactions(&query),
        Err(PipelineError::Config { .. })
    ));
}

#[test]
fn test_oversized_chunk_size_is_rejected() {
    let session = session_with(&scenario());

    for chunk_size in [MAX_CHUNK_SIZE + 1, usize::MAX] {
        let query = TransactionQuery::default().with_chunk_size(chunk_size);
        assert!(matches!(
            session.transactions(&query),
            Err(PipelineError::Config { .. })
        ));
    }

    let at_cap = TransactionQuery::default().with_chunk_size(MAX_CHUNK_SIZE);
    assert_eq!(collect(&session, &at_cap).len(), 2);
}

#[test]
fn test_keyset_index_gives_same_output() {
    let mut lines = Vec::new();
    for tx in 1..=6 {
        for n in 0..3 {
            lines.push(line(tx * 10 + n, tx, "A", "2.10", "2020-02-18 10:00:00"));
        }
    }
    let session = session_with(&lines);
    let query = TransactionQuery::default().with_chunk_size(4);
    let unindexed = collect(&session, &query);

    session
        .connection()
        .unwrap()
        .execute_batch(
            "CREATE INDEX items_sold_final_keyset ON items_sold_final (isfm_id DESC, unique_id)",
        )
        .unwrap();

    assert_eq!(collect(&session, &query), unindexed);
    assert_eq!(unindexed.len(), 6);
}

#[test]
fn test_closed_session() {
    let mut session = session_with(&scenario());
    session.close().unwrap();
    session.close().unwrap();

    assert!(matches!(
        session.transactions(&TransactionQuery::default()),
        Err(PipelineError::ClosedResource)
    ));
}

#[test]
fn test_open_read_only_file() {
    let file = NamedTempFile::new().unwrap();
    {
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        for l in scenario() {
            insert(&conn, &l);
        }
    }

    let mut session = Session::open(&DatabaseConfig::new(file.path())).unwrap();
    let txs = collect(&session, &TransactionQuery::default());
    assert_eq!(txs.len(), 2);

    assert!(session
        .connection()
        .unwrap()
        .execute("DELETE FROM items_sold_final", [])
        .is_err());
    session.close().unwrap();
}

#[test]
fn test_open_missing_file_fails() {
    let result = Session::open(&DatabaseConfig::new("/nonexistent/tillroll.db"));
    assert!(matches!(result, Err(PipelineError::Source(_))));
}
