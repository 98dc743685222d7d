//! In-memory connector used by unit tests.
//!
//! Backs a single one-column table `t(a)`. Statements are recognized by
//! their leading keyword; any statement containing `FAIL` errors and a
//! query containing `SLEEP` never finishes.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::error::{Error, Result};
use crate::table::Table;
use crate::traits::{Connection, Connector};
use crate::value::Value;

#[derive(Default)]
pub(crate) struct FakeState {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub pings: AtomicUsize,
    pub refuse: AtomicBool,
    pub dead: AtomicBool,
    next_id: AtomicU32,
    rows: Mutex<Vec<Value>>,
}

impl FakeState {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    pub state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn refusing() -> Self {
        let connector = Self::default();
        connector.state.refuse.store(true, Ordering::SeqCst);
        connector
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Conn = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.refuse.load(Ordering::SeqCst) {
            return Err(Error::connection(
                "bad-host",
                3306,
                Error::Statement("host not found".into()),
            ));
        }
        self.state.dead.store(false, Ordering::SeqCst);
        Ok(FakeConnection {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            state: self.state.clone(),
        })
    }

    fn endpoint(&self) -> (&str, u16) {
        ("fake", 3306)
    }
}

#[derive(Debug)]
pub(crate) struct FakeConnection {
    pub id: u32,
    state: Arc<FakeState>,
}

impl std::fmt::Debug for FakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeState").finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn is_alive(&mut self) -> bool {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        !self.state.dead.load(Ordering::SeqCst)
    }

    async fn query(&mut self, sql: &str, _params: &[Value]) -> Result<Table> {
        if sql.contains("SLEEP") {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if sql.contains("FAIL") {
            return Err(Error::Statement(format!("syntax error near {:?}", sql)));
        }
        let rows = self.state.rows.lock().unwrap();
        if sql.to_uppercase().contains("COUNT(*)") {
            return Table::new(
                vec!["COUNT(*)".into()],
                vec![vec![Value::Int(rows.len() as i64)]],
            );
        }
        Table::new(vec!["a".into()], rows.iter().map(|v| vec![v.clone()]).collect())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        if sql.contains("FAIL") {
            return Err(Error::Statement(format!("syntax error near {:?}", sql)));
        }
        let mut rows = self.state.rows.lock().unwrap();
        let keyword = sql.split_whitespace().next().unwrap_or("").to_uppercase();
        match keyword.as_str() {
            "INSERT" => {
                rows.push(params.first().cloned().unwrap_or(Value::Null));
                Ok(1)
            }
            "UPDATE" => Ok(rows.len().min(1) as u64),
            "DELETE" => {
                let n = rows.len() as u64;
                rows.clear();
                Ok(n)
            }
            _ => Ok(0),
        }
    }

    async fn close(self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts ERROR-level events.
#[derive(Clone, Default)]
pub(crate) struct ErrorCounter(pub Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Install an [`ErrorCounter`] for the current thread.
pub(crate) fn count_errors() -> (ErrorCounter, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::layer::SubscriberExt;

    let counter = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (counter, guard)
}
