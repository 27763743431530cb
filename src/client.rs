//! Client session: one engine connection, one field catalog, at most one
//! open transaction.
//!
//! ```ignore
//! let client = Client::new(LoopbackEngine::new(), StaticDirectory::builtin())?;
//! let input = client.flist_from(flist!({ "PIN_FLD_POID" => "/account" }))?;
//!
//! let txn = client.transaction("/account")?;
//! let output = client.execute(&input, "PCM_OP_TEST_LOOPBACK", 0u32)?;
//! txn.commit()?;
//! ```

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::catalog::{FieldCatalog, FieldDirectory};
use crate::config::ClientConfig;
use crate::deserialization;
use crate::engine::{
    Engine, Opcode, PCM_OP_SEARCH, PCM_OP_TRANS_ABORT, PCM_OP_TRANS_COMMIT, PCM_OP_TRANS_OPEN,
};
use crate::error::{FlistError, Result};
use crate::flags::FlagSpec;
use crate::flist::{FlistContext, Record};
use crate::flist_value::FlistValue;
use crate::search::SearchBuilder;
use crate::xml;

const POID_FIELD: &str = "PIN_FLD_POID";
const RESULTS_FIELD: &str = "PIN_FLD_RESULTS";

/// What [`Client::search`] returns.
#[derive(Debug, PartialEq)]
pub enum SearchOutcome {
    /// One record per match, in element order.
    Records(Vec<Record>),
    /// Count-only searches report the match count as the element id of
    /// their single result.
    Count(i64),
}

struct OpenTransaction {
    id: u64,
    input: Record,
}

pub struct Client<E: Engine = Box<dyn Engine>> {
    engine: RefCell<E>,
    ctx: Rc<FlistContext>,
    config: ClientConfig,
    opcodes: RefCell<FxHashMap<SmolStr, u32>>,
    connected: Cell<bool>,
    transaction: RefCell<Option<OpenTransaction>>,
    next_transaction: Cell<u64>,
}

impl<E: Engine> Client<E> {
    pub fn new(engine: E, directory: impl FieldDirectory + 'static) -> Result<Self> {
        Self::with_config(engine, directory, ClientConfig::default())
    }

    pub fn with_config(mut engine: E, directory: impl FieldDirectory + 'static, config: ClientConfig) -> Result<Self> {
        let catalog = FieldCatalog::new(directory, config.catalog_cache_capacity);
        let ctx = FlistContext::with_xml_root(catalog, config.default_database, config.xml_root.clone());
        let database = engine.connect()?;
        ctx.set_database(database);
        info!(database, "client connected");

        Ok(Self {
            engine: RefCell::new(engine),
            ctx,
            config,
            opcodes: RefCell::new(FxHashMap::default()),
            connected: Cell::new(true),
            transaction: RefCell::new(None),
            next_transaction: Cell::new(1),
        })
    }

    pub fn context(&self) -> &Rc<FlistContext> {
        &self.ctx
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn database(&self) -> u64 {
        self.ctx.database()
    }

    pub fn engine(&self) -> Ref<'_, E> {
        self.engine.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.borrow().is_some()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.get() {
            Ok(())
        } else {
            Err(FlistError::NotConnected)
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Records
    // ════════════════════════════════════════════════════════════════════════

    pub fn flist(&self) -> Record {
        Record::new(&self.ctx)
    }

    pub fn flist_from(&self, data: impl Into<FlistValue>) -> Result<Record> {
        Record::from_data(&self.ctx, data)
    }

    /// A record holding each named field, unset.
    pub fn flist_with_fields<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<Record> {
        Record::from_data(&self.ctx, FlistValue::names(names))
    }

    /// Reads JSON, XML or the engine's text form, in that order.
    pub fn parse_flist(&self, text: &str) -> Result<Record> {
        let engine = self.engine.borrow();
        deserialization::parse(&self.ctx, text, |text| engine.decode_text(text))
    }

    pub fn flist_from_json(&self, text: &str) -> Result<Record> {
        deserialization::from_json(&self.ctx, text)
    }

    pub fn flist_from_xml(&self, text: &str) -> Result<Record> {
        xml::from_xml(&self.ctx, text)
    }

    pub fn flist_from_cbor(&self, bytes: &[u8]) -> Result<Record> {
        deserialization::from_cbor(&self.ctx, bytes)
    }

    /// The engine's text form of `record`.
    pub fn to_text(&self, record: &Record) -> Result<String> {
        self.engine.borrow().encode_text(record)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Execution
    // ════════════════════════════════════════════════════════════════════════

    /// Opcode number for `name`; lookups are remembered for the life of
    /// the client.
    pub fn opcode(&self, name: &str) -> Result<u32> {
        if let Some(code) = self.opcodes.borrow().get(name) {
            return Ok(*code);
        }
        let code = self.engine.borrow().opcode_by_name(name)?;
        self.opcodes.borrow_mut().insert(SmolStr::new(name), code);
        Ok(code)
    }

    /// Runs an opcode on a copy of `record` and returns the output as a new
    /// record.
    pub fn execute(&self, record: &Record, opcode: impl Into<Opcode>, flags: impl Into<FlagSpec>) -> Result<Record> {
        let output = self.run(record, opcode.into(), flags.into(), false)?;
        Record::from_data(&self.ctx, output)
    }

    /// Runs an opcode on `record` itself: the output replaces its contents
    /// and the returned record is a view of the same storage.
    pub fn execute_by_ref(
        &self,
        record: &Record,
        opcode: impl Into<Opcode>,
        flags: impl Into<FlagSpec>,
    ) -> Result<Record> {
        let output = self.run(record, opcode.into(), flags.into(), true)?;
        let replacement = Record::from_data(&self.ctx, output)?;
        record.clear();
        record.update(&replacement)?;
        Ok(record.clone())
    }

    fn run(&self, record: &Record, opcode: Opcode, flags: FlagSpec, by_reference: bool) -> Result<FlistValue> {
        self.ensure_connected()?;
        let code = match &opcode {
            Opcode::Name(name) => self.opcode(name)?,
            Opcode::Number(code) => *code,
        };
        let flags = flags.resolve()?;
        debug!(opcode = ?opcode, code, flags, by_reference, "execute");
        self.engine
            .borrow_mut()
            .execute(record, code, flags, by_reference)
            .inspect_err(|e| debug!(code, error = %e, "opcode failed"))
    }

    /// Builds and runs a search.
    pub fn search(&self, search: &SearchBuilder) -> Result<SearchOutcome> {
        let input = search.build(&self.ctx)?;
        let flags = search.opcode_flags(FlagSpec::NONE)?;
        let output = self.execute(&input, PCM_OP_SEARCH, flags)?;

        if !output.contains(RESULTS_FIELD)? {
            return Ok(if search.is_count_only() {
                SearchOutcome::Count(0)
            } else {
                SearchOutcome::Records(Vec::new())
            });
        }
        let results = output.get_array(RESULTS_FIELD)?;
        if search.is_count_only() {
            return Ok(SearchOutcome::Count(results.keys().first().copied().unwrap_or(0)));
        }
        Ok(SearchOutcome::Records(results.values().into_iter().flatten().collect()))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Transactions
    // ════════════════════════════════════════════════════════════════════════

    /// Opens a transaction on `poid` with the configured flags.
    pub fn transaction(&self, poid: impl Into<FlistValue>) -> Result<Transaction<'_, E>> {
        self.transaction_with_flags(poid, self.config.transaction_flags.clone())
    }

    pub fn transaction_with_flags(
        &self,
        poid: impl Into<FlistValue>,
        flags: impl Into<FlagSpec>,
    ) -> Result<Transaction<'_, E>> {
        self.ensure_connected()?;
        if self.in_transaction() {
            return Err(FlistError::Transaction("a transaction is already open"));
        }
        let input = Record::new(&self.ctx);
        input.set(POID_FIELD, poid)?;
        self.run(&input, Opcode::Number(PCM_OP_TRANS_OPEN), flags.into(), false)?;

        let id = self.next_transaction.get();
        self.next_transaction.set(id + 1);
        let poid = input.get_poid(POID_FIELD)?.map(|p| p.to_string()).unwrap_or_default();
        info!(id, %poid, "transaction opened");
        *self.transaction.borrow_mut() = Some(OpenTransaction { id, input });
        Ok(Transaction {
            client: self,
            id,
            state: Cell::new(TransactionState::Open),
        })
    }

    fn open_transaction_id(&self) -> Option<u64> {
        self.transaction.borrow().as_ref().map(|t| t.id)
    }

    /// Ends the open transaction with `opcode`. The slot is cleared whether
    /// or not the engine call succeeds.
    fn finish_transaction(&self, opcode: u32) -> Result<()> {
        let Some(open) = self.transaction.borrow_mut().take() else {
            return Ok(());
        };
        self.run(&open.input, Opcode::Number(opcode), FlagSpec::NONE, false)
            .map(|_| ())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Shutdown
    // ════════════════════════════════════════════════════════════════════════

    /// Rolls back any open transaction and disconnects. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        if !self.connected.get() {
            return Ok(());
        }
        if self.in_transaction() {
            warn!("closing client with an open transaction, rolling back");
            if let Err(e) = self.finish_transaction(PCM_OP_TRANS_ABORT) {
                warn!(error = %e, "rollback on close failed");
            }
        }
        self.connected.set(false);
        self.engine.borrow_mut().disconnect()?;
        info!("client closed");
        Ok(())
    }
}

impl<E: Engine> Drop for Client<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "close on drop failed");
        }
    }
}

impl<E: Engine> fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("database", &self.database())
            .field("connected", &self.connected.get())
            .field("transaction", &self.open_transaction_id())
            .finish()
    }
}

// ─── Transaction ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// Guard for the client's open transaction. Dropping it while open rolls
/// the transaction back.
pub struct Transaction<'c, E: Engine = Box<dyn Engine>> {
    client: &'c Client<E>,
    id: u64,
    state: Cell<TransactionState>,
}

impl<E: Engine> Transaction<'_, E> {
    pub fn is_open(&self) -> bool {
        self.state.get() == TransactionState::Open && self.client.open_transaction_id() == Some(self.id)
    }

    /// A transaction the client rolled back on close reports `RolledBack`.
    pub fn state(&self) -> TransactionState {
        match self.state.get() {
            TransactionState::Open if !self.is_open() => TransactionState::RolledBack,
            state => state,
        }
    }

    /// Commits. A failed commit leaves the transaction rolled back.
    pub fn commit(&self) -> Result<()> {
        if !self.is_open() {
            return Err(FlistError::Transaction("commit on a transaction that is not open"));
        }
        let result = self.client.finish_transaction(PCM_OP_TRANS_COMMIT);
        match &result {
            Ok(()) => {
                self.state.set(TransactionState::Committed);
                info!(id = self.id, "transaction committed");
            }
            Err(e) => {
                self.state.set(TransactionState::RolledBack);
                warn!(id = self.id, error = %e, "commit failed");
            }
        }
        result
    }

    /// Rolls back; a no-op once the transaction is closed.
    pub fn rollback(&self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.state.set(TransactionState::RolledBack);
        info!(id = self.id, "transaction rolled back");
        self.client.finish_transaction(PCM_OP_TRANS_ABORT)
    }
}

impl<E: Engine> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(id = self.id, "transaction dropped while open, rolling back");
            if let Err(e) = self.rollback() {
                warn!(id = self.id, error = %e, "rollback on drop failed");
            }
        }
    }
}

impl<E: Engine> fmt::Debug for Transaction<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
