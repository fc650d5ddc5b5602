use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use sql_cluster::prelude::*;
use sql_cluster::test_utils::{MockConnection, MockConnector, MockReply};

#[derive(Debug, Default, Clone, PartialEq)]
struct Account {
    id: i64,
    name: String,
    balance: f64,
    note: String,
}

sql_record!(Account {
    id(db = "id"),
    name(db = "name"),
    balance(db = "balance"),
    note(db = "-"),
});

#[derive(Debug, Default)]
struct Loose {
    id: i64,
    label: String,
}

sql_record!(Loose {
    id(db = "id"),
    label(json = "label"),
});

type Table = Arc<Mutex<BTreeMap<i64, (String, f64)>>>;

fn row(id: i64, name: &str, balance: f64) -> Vec<RowValues> {
    vec![RowValues::Int(id), RowValues::Text(name.to_string()), RowValues::Float(balance)]
}

/// Serve the `accounts` table from memory for the statements the client emits.
fn serve_accounts(conn: &MockConnection) -> Table {
    let table: Table = Arc::new(Mutex::new(BTreeMap::new()));
    let state = table.clone();
    conn.set_handler(move |sql, params| {
        let mut rows = state.lock().unwrap();
        if sql == "INSERT INTO `accounts`(`name`,`balance`) VALUES (?,?)" {
            let id = rows.keys().next_back().copied().unwrap_or(0) + 1;
            rows.insert(
                id,
                (params[0].as_text().unwrap().to_string(), params[1].as_float().unwrap()),
            );
            MockReply::Exec(ExecResult {
                rows_affected: 1,
                last_insert_id: Some(id as u64),
            })
        } else if sql == "SELECT `id`,`name`,`balance` FROM `accounts` WHERE `id` = ? LIMIT ?" {
            let id = *params[0].as_int().unwrap();
            let found = rows.get(&id).map(|(n, b)| row(id, n, *b));
            MockReply::rows(&["id", "name", "balance"], found.into_iter().collect())
        } else if sql
            == "SELECT `id`,`name`,`balance` FROM `accounts` WHERE `balance` >= ? ORDER BY id ASC LIMIT ?"
        {
            let min = params[0].as_float().unwrap();
            let found = rows
                .iter()
                .filter(|(_, (_, b))| *b >= min)
                .map(|(id, (n, b))| row(*id, n, *b))
                .collect();
            MockReply::rows(&["id", "name", "balance"], found)
        } else if sql.starts_with("SELECT COUNT(*) FROM `accounts`") {
            MockReply::rows(&["COUNT(*)"], vec![vec![RowValues::Int(rows.len() as i64)]])
        } else if sql == "UPDATE `accounts` SET `name`=?,`balance`=? WHERE `id`=?" {
            let id = *params[2].as_int().unwrap();
            match rows.get_mut(&id) {
                Some(entry) => {
                    *entry = (params[0].as_text().unwrap().to_string(), params[1].as_float().unwrap());
                    MockReply::affected(1)
                }
                None => MockReply::affected(0),
            }
        } else if sql == "DELETE FROM `accounts` WHERE `id`=?" {
            let id = *params[0].as_int().unwrap();
            MockReply::affected(u64::from(rows.remove(&id).is_some()))
        } else {
            MockReply::affected(0)
        }
    });
    table
}

async fn single_host() -> Result<(Client, MockConnection, Table), SqlClusterError> {
    let connector = Arc::new(MockConnector::new());
    let conn = connector.host("10.0.0.1:3306");
    let table = serve_accounts(&conn);
    let client = Client::with_connector(connector);
    client
        .init(ClusterConfig::new("bank").with_master(["10.0.0.1:3306"]))
        .await?;
    Ok((client, conn, table))
}

fn by_id(id: i64) -> BuiltCondition {
    SqlCondition::new("accounts")
        .with_condition("id", "=", id)
        .with_limit(1)
        .build("")
}

#[tokio::test]
async fn insert_then_fetch_round_trips() -> Result<(), SqlClusterError> {
    let (client, conn, _) = single_host().await?;
    let ann = Account {
        id: 0,
        name: "ann".into(),
        balance: 12.5,
        note: "not stored".into(),
    };

    let id = client
        .insert("accounts", &ann, &InsertOptions::new().with_skip_column("id"))
        .await?;
    assert_eq!(id, 1);

    let insert = &conn.statements()[0];
    assert_eq!(insert.query.matches('?').count(), insert.params.len());

    let fetched: Account = client.fetch_one(&by_id(1)).await?.expect("row exists");
    assert_eq!(
        fetched,
        Account {
            id: 1,
            note: String::new(),
            ..ann
        }
    );
    Ok(())
}

#[tokio::test]
async fn find_one_reads_a_single_row() -> Result<(), SqlClusterError> {
    let (client, conn, table) = single_host().await?;
    table.lock().unwrap().insert(7, ("gus".to_string(), 3.0));

    let condition = SqlCondition::new("accounts").with_condition("id", "=", 7_i64);
    assert_eq!(condition.limit(), 300);
    let found: Account = client.find_one(&condition, "").await?.expect("row exists");
    assert_eq!(found.name, "gus");

    let select = conn.statements().pop().expect("select was sent");
    assert!(select.query.ends_with(" LIMIT ?"), "{}", select.query);
    assert_eq!(select.params.last(), Some(&RowValues::Int(1)));

    let missing = SqlCondition::new("accounts").with_condition("id", "=", 8_i64);
    assert_eq!(client.find_one::<Account>(&missing, "").await?, None);
    Ok(())
}

#[tokio::test]
async fn missing_rows_are_not_errors() -> Result<(), SqlClusterError> {
    let (client, _, _) = single_host().await?;

    assert_eq!(client.fetch_one::<Account>(&by_id(42)).await?, None);
    let none: Vec<Account> = client
        .fetch_list(
            &SqlCondition::new("accounts")
                .with_condition("balance", ">=", 1.0)
                .with_order("id", Direction::Asc)
                .build(""),
        )
        .await?;
    assert!(none.is_empty());
    assert_eq!(client.count(&SqlCondition::new("accounts").build("")).await?, 0);
    Ok(())
}

#[tokio::test]
async fn list_count_update_delete() -> Result<(), SqlClusterError> {
    let (client, conn, table) = single_host().await?;
    for (name, balance) in [("ann", 5.0), ("bob", 20.0), ("cy", 30.0)] {
        let account = Account {
            name: name.into(),
            balance,
            ..Account::default()
        };
        client
            .insert("accounts", &account, &InsertOptions::new().with_skip_column("id"))
            .await?;
    }

    let rich: Vec<Account> = client
        .find(
            &SqlCondition::new("accounts")
                .with_condition("balance", ">=", 10.0)
                .with_order("id", Direction::Asc),
            "",
        )
        .await?;
    assert_eq!(rich.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), ["bob", "cy"]);
    assert_eq!(client.count(&SqlCondition::new("accounts").build("")).await?, 3);

    let mut bob = rich[0].clone();
    bob.balance = 25.0;
    assert_eq!(client.update_record("accounts", &["id"], &bob).await?, 1);
    assert_eq!(table.lock().unwrap()[&bob.id], ("bob".to_string(), 25.0));

    assert_eq!(client.delete("accounts", [("id", 1i64)]).await?, 1);
    assert!(!table.lock().unwrap().contains_key(&1));

    client
        .delete_where(
            &SqlCondition::new("accounts")
                .with_condition("balance", "<", 1.0)
                .with_limit(10),
            "",
        )
        .await?;
    let last = conn.statements().pop().unwrap();
    assert_eq!(last.query, "DELETE FROM `accounts` WHERE `balance` < ? LIMIT ?");
    assert_eq!(last.params, [RowValues::Float(1.0), RowValues::Int(10)]);
    Ok(())
}

#[tokio::test]
async fn unsafe_statements_are_rejected_before_sql() -> Result<(), SqlClusterError> {
    let (client, conn, _) = single_host().await?;

    let err = client
        .update::<&str>("accounts", &[], &[("name", RowValues::Text("x".into()))])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlClusterError::ProgrammingError(_)));

    let err = client
        .delete("accounts", Vec::<(&str, RowValues)>::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlClusterError::UnsafeStatement(_)));

    let err = client
        .delete_where(&SqlCondition::new("accounts"), "")
        .await
        .unwrap_err();
    assert!(matches!(err, SqlClusterError::UnsafeStatement(_)));

    let err = client
        .find::<Account>(&SqlCondition::new("accounts").with_limit(0), "")
        .await
        .unwrap_err();
    assert!(matches!(err, SqlClusterError::UnsafeStatement(_)));

    assert!(conn.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn strict_fetch_rejects_untagged_fields() -> Result<(), SqlClusterError> {
    let (client, conn, _) = single_host().await?;

    let err = client.fetch_one::<Loose>(&by_id(1)).await.unwrap_err();
    assert!(matches!(err, SqlClusterError::MappingError(ref msg) if msg.contains("label")));
    assert!(conn.statements().is_empty());

    // The lenient insert path falls back to the json name.
    client
        .insert(
            "loose",
            &Loose {
                id: 3,
                label: "x".into(),
            },
            &InsertOptions::new(),
        )
        .await?;
    assert_eq!(
        conn.statements()[0].query,
        "INSERT INTO `loose`(`id`,`label`) VALUES (?,?)"
    );
    Ok(())
}
