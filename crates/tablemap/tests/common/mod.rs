//! Recording connector shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tablemap::{
    Connection, ConnectionError, ConnectionErrorKind, Connector, QueryError, Result, Row,
    Statement, Value,
};

#[derive(Default)]
struct Shared {
    statements: Mutex<Vec<Statement>>,
    result_sets: Mutex<VecDeque<Vec<Row>>>,
    connects: AtomicUsize,
    open: AtomicUsize,
}

/// Records every statement and replays queued result sets in order.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    shared: Arc<Shared>,
    affected: u64,
    refuse: bool,
    reject_statements: bool,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self {
            affected: 1,
            ..Self::default()
        }
    }

    /// A connector whose `connect` always fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// A connector whose connections reject every statement.
    pub fn rejecting() -> Self {
        Self {
            reject_statements: true,
            ..Self::default()
        }
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.shared.result_sets.lock().unwrap().push_back(rows);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.shared.statements.lock().unwrap().clone()
    }

    pub fn last(&self) -> Statement {
        self.statements().pop().expect("no statement was executed")
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Connections currently open (not yet dropped).
    pub fn open_connections(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }
}

pub struct RecordingConnection {
    shared: Arc<Shared>,
    affected: u64,
    reject: bool,
}

impl Drop for RecordingConnection {
    fn drop(&mut self) {
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Connection for RecordingConnection {
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        self.shared.statements.lock().unwrap().push(statement.clone());
        if self.reject {
            return Err(QueryError::new("Incorrect syntax near the keyword").into());
        }
        Ok(self
            .shared
            .result_sets
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        self.shared.statements.lock().unwrap().push(statement.clone());
        if self.reject {
            return Err(QueryError::new("Violation of PRIMARY KEY constraint").into());
        }
        Ok(self.affected)
    }
}

impl Connector for RecordingConnector {
    type Connection = RecordingConnection;

    fn connect(&self) -> Result<Self::Connection> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(ConnectionError::new(
                ConnectionErrorKind::Connect,
                "A network-related error occurred while establishing a connection",
            )
            .into());
        }
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingConnection {
            shared: Arc::clone(&self.shared),
            affected: self.affected,
            reject: self.reject_statements,
        })
    }
}

pub fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    Row::from_pairs(pairs)
}
