use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::HostTarget;
use crate::error::SqlClusterError;
use crate::host::{HostConnection, HostConnector, HostTransaction};
use crate::results::ResultSet;
use crate::types::{ExecResult, QueryAndParams, RowValues};

use super::result_set;

/// One scripted answer.
#[derive(Debug)]
pub enum MockReply {
    Rows(ResultSet),
    Exec(ExecResult),
    Error(SqlClusterError),
    /// Sleep, then answer with an empty result
    Delay(Duration),
}

impl MockReply {
    #[must_use]
    pub fn rows(columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        Self::Rows(result_set(columns, rows))
    }

    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self::Exec(ExecResult {
            rows_affected,
            last_insert_id: None,
        })
    }

    fn duplicate(&self) -> Self {
        match self {
            Self::Rows(rs) => Self::Rows(rs.clone()),
            Self::Exec(res) => Self::Exec(*res),
            Self::Delay(d) => Self::Delay(*d),
            Self::Error(err) => Self::Error(err.replay()),
        }
    }
}

type Handler = dyn Fn(&str, &[RowValues]) -> MockReply + Send + Sync;

struct MockState {
    name: String,
    replies: Mutex<VecDeque<MockReply>>,
    default: Mutex<Option<MockReply>>,
    handler: Mutex<Option<Arc<Handler>>>,
    commit_failure: Mutex<Option<SqlClusterError>>,
    log: Mutex<Vec<QueryAndParams>>,
    queries: AtomicUsize,
    execs: AtomicUsize,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    closes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MockState {
    fn next_reply(&self, sql: &str, params: &[RowValues]) -> Option<MockReply> {
        lock(&self.log).push(QueryAndParams::new(sql, params.to_vec()));
        if let Some(reply) = lock(&self.replies).pop_front() {
            return Some(reply);
        }
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            return Some(handler(sql, params));
        }
        lock(&self.default).as_ref().map(MockReply::duplicate)
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.next_reply(sql, params) {
            Some(MockReply::Rows(rs)) => Ok(rs),
            Some(MockReply::Error(err)) => Err(err),
            Some(MockReply::Delay(d)) => {
                tokio::time::sleep(d).await;
                Ok(ResultSet::default())
            }
            Some(MockReply::Exec(_)) | None => Ok(ResultSet::default()),
        }
    }

    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        self.execs.fetch_add(1, Ordering::SeqCst);
        match self.next_reply(sql, params) {
            Some(MockReply::Exec(res)) => Ok(res),
            Some(MockReply::Error(err)) => Err(err),
            Some(MockReply::Delay(d)) => {
                tokio::time::sleep(d).await;
                Ok(ExecResult::default())
            }
            Some(MockReply::Rows(_)) | None => Ok(ExecResult::default()),
        }
    }
}

/// A scripted host connection.
#[derive(Clone)]
pub struct MockConnection {
    state: Arc<MockState>,
}

impl MockConnection {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MockState {
                name: name.into(),
                replies: Mutex::new(VecDeque::new()),
                default: Mutex::new(None),
                handler: Mutex::new(None),
                commit_failure: Mutex::new(None),
                log: Mutex::new(Vec::new()),
                queries: AtomicUsize::new(0),
                execs: AtomicUsize::new(0),
                begins: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Queue a reply for the next call.
    pub fn push(&self, reply: MockReply) {
        lock(&self.state.replies).push_back(reply);
    }

    /// Reply used once the queue is empty and no handler is set.
    pub fn set_default(&self, reply: MockReply) {
        *lock(&self.state.default) = Some(reply);
    }

    /// Compute replies from the statement once the queue is empty.
    pub fn set_handler(&self, handler: impl Fn(&str, &[RowValues]) -> MockReply + Send + Sync + 'static) {
        *lock(&self.state.handler) = Some(Arc::new(handler));
    }

    /// Make the next commit fail with `err`.
    pub fn fail_commit(&self, err: SqlClusterError) {
        *lock(&self.state.commit_failure) = Some(err);
    }

    /// Every statement seen so far, including those run in transactions.
    #[must_use]
    pub fn statements(&self) -> Vec<QueryAndParams> {
        lock(&self.state.log).clone()
    }

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.state.queries.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn exec_count(&self) -> usize {
        self.state.execs.load(Ordering::SeqCst)
    }

    /// Total calls of any kind (queries, statements, transaction begins).
    #[must_use]
    pub fn calls(&self) -> usize {
        self.query_count() + self.exec_count() + self.state.begins.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostConnection for MockConnection {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        self.state.query(sql, params).await
    }

    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        self.state.exec(sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn HostTransaction>, SqlClusterError> {
        self.state.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransaction {
            state: self.state.clone(),
            finished: false,
        }))
    }

    async fn close(&self) -> Result<(), SqlClusterError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Follows the driver contract: a failed commit leaves the transaction
/// open, and a finished one refuses further commits and rollbacks.
struct MockTransaction {
    state: Arc<MockState>,
    finished: bool,
}

impl MockTransaction {
    fn ensure_open(&self) -> Result<(), SqlClusterError> {
        if self.finished {
            return Err(SqlClusterError::ProgrammingError("transaction already finished".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HostTransaction for MockTransaction {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlClusterError> {
        self.state.query(sql, params).await
    }

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlClusterError> {
        self.state.exec(sql, params).await
    }

    async fn commit(&mut self) -> Result<(), SqlClusterError> {
        self.ensure_open()?;
        if let Some(err) = lock(&self.state.commit_failure).take() {
            return Err(err);
        }
        self.finished = true;
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlClusterError> {
        self.ensure_open()?;
        self.finished = true;
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one [`MockConnection`] per host address.
#[derive(Default)]
pub struct MockConnector {
    hosts: Mutex<HashMap<String, MockConnection>>,
    unreachable: Mutex<HashSet<String>>,
    connects: AtomicUsize,
}

impl MockConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection for `address` (`host:port`), created on first use.
    #[must_use]
    pub fn host(&self, address: &str) -> MockConnection {
        lock(&self.hosts)
            .entry(address.to_string())
            .or_insert_with(|| MockConnection::new(address))
            .clone()
    }

    /// Make `connect` fail for `address`.
    pub fn refuse(&self, address: &str) {
        lock(&self.unreachable).insert(address.to_string());
    }

    /// Number of `connect` calls, successful or not.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostConnector for MockConnector {
    async fn connect(&self, target: &HostTarget) -> Result<Arc<dyn HostConnection>, SqlClusterError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let address = target.address();
        if lock(&self.unreachable).contains(&address) {
            return Err(SqlClusterError::ConnectionError(format!("{address}: connection refused")));
        }
        Ok(Arc::new(self.host(&address)))
    }
}
