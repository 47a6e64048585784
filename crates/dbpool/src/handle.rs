use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u32);

/// A single persistent connection plus a scratch slot for the parameters of whichever statement
/// is about to be executed against it. `peek_handle`/`poke_handle`/`reset_handle` are the only
/// ways a `Handle`'s transaction state changes; nothing else in this crate begins or ends one.
///
/// The original wrapped each acquired handle in an implicit transaction for the lifetime of the
/// caller's use of it. `postgres::Transaction` borrows its `Client` for the transaction's
/// lifetime, which does not fit a value that needs to be checked out of a pool and handed to a
/// caller across function boundaries; the transaction is instead framed with explicit
/// `BEGIN`/`COMMIT`/`ROLLBACK` statements, tracked by `transaction_open`.
pub struct Handle {
    pub id: HandleId,
    pub(crate) conninfo: String,
    client: Client,
    transaction_open: bool,
    params: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl Handle {
    pub(crate) fn connect(id: HandleId, conninfo: &str) -> DbResult<Self> {
        let client = Client::connect(conninfo, NoTls).map_err(|source| DbError::Connect {
            chain: "unnamed",
            source,
        })?;
        Ok(Handle {
            id,
            conninfo: conninfo.to_string(),
            client,
            transaction_open: false,
            params: Vec::new(),
        })
    }

    pub fn is_transaction_open(&self) -> bool {
        self.transaction_open
    }

    pub(crate) fn begin(&mut self) -> DbResult<()> {
        self.client
            .batch_execute("BEGIN")
            .map_err(|source| DbError::TransactionStart {
                handle_id: self.id.0,
                source,
            })?;
        self.transaction_open = true;
        Ok(())
    }

    pub(crate) fn commit(&mut self) -> DbResult<()> {
        self.client
            .batch_execute("COMMIT")
            .map_err(|source| DbError::TransactionCommit {
                handle_id: self.id.0,
                source,
            })?;
        self.transaction_open = false;
        Ok(())
    }

    pub(crate) fn rollback(&mut self) -> DbResult<()> {
        self.client
            .batch_execute("ROLLBACK")
            .map_err(|source| DbError::TransactionRollback {
                handle_id: self.id.0,
                source,
            })?;
        self.transaction_open = false;
        Ok(())
    }

    pub(crate) fn reconnect(&mut self) -> DbResult<()> {
        self.client = Client::connect(&self.conninfo, NoTls).map_err(|source| DbError::Connect {
            chain: "unnamed",
            source,
        })?;
        self.transaction_open = false;
        Ok(())
    }

    fn push<T: ToSql + Sync + Send + 'static>(&mut self, value: T) {
        self.params.push(Box::new(value));
    }

    pub fn push_bigint(&mut self, value: Option<i64>) {
        self.push(value)
    }

    pub fn push_integer(&mut self, value: Option<i32>) {
        self.push(value)
    }

    pub fn push_double(&mut self, value: Option<f64>) {
        self.push(value)
    }

    pub fn push_real(&mut self, value: Option<f32>) {
        self.push(value)
    }

    pub fn push_char(&mut self, value: Option<i8>) {
        self.push(value)
    }

    pub fn push_varchar(&mut self, value: Option<String>) {
        self.push(value)
    }

    pub fn push_bytea(&mut self, value: Option<Vec<u8>>) {
        self.push(value)
    }

    pub fn push_uuid(&mut self, value: Option<[u8; 16]>) {
        self.push(value.map(|bytes| uuid_to_string(&bytes)))
    }

    pub fn push_bigint_array(&mut self, value: Vec<i64>) {
        self.push(value)
    }

    /// Executes `sql` against the accumulated parameter vector, in order, then clears it
    /// regardless of whether the query succeeded, so a failed call never leaks stale parameters
    /// into the next one on this handle.
    pub fn execute(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        let refs: Vec<&(dyn ToSql + Sync)> = self.params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
        let result = self
            .client
            .query(sql, &refs)
            .map_err(|source| DbError::Query {
                handle_id: self.id.0,
                source,
            });
        self.params.clear();
        result
    }
}

fn uuid_to_string(bytes: &[u8; 16]) -> String {
    let mut s = String::with_capacity(36);
    for (i, byte) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            s.push('-');
        }
        s.push_str(&format!("{:02x}", byte));
    }
    s
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("transaction_open", &self.transaction_open)
            .field("pending_params", &self.params.len())
            .finish()
    }
}
