//! Setup / operation / teardown hooks for the benchmarked behaviours.
//!
//! Hooks are a closed set of tagged variants. A [`HookSet`] names one of each;
//! a [`HookRun`] binds the set to a store, a collection and the reused
//! document for one scenario run.

use std::hint::black_box;

use crate::error::{BenchError, Result};
use crate::harness::Batch;
use crate::payload::Document;
use crate::store::{DocumentCursor, DocumentStore, ID_FIELD};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupHook {
    /// Nothing to prepare.
    Null,
    /// Insert one document so that there is something to find.
    FindOne,
    /// Insert one document per iteration and open a cursor over them.
    Cursor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationHook {
    Insert,
    FindOne,
    CursorNext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownHook {
    /// Remove every document from the collection.
    Default,
    /// Remove every document and report how many queries the cursor issued.
    Cursor,
}

impl SetupHook {
    pub fn name(&self) -> &'static str {
        match self {
            SetupHook::Null => "null_setup",
            SetupHook::FindOne => "find_one_setup",
            SetupHook::Cursor => "cursor_setup",
        }
    }
}

impl OperationHook {
    pub fn name(&self) -> &'static str {
        match self {
            OperationHook::Insert => "insert",
            OperationHook::FindOne => "find_one",
            OperationHook::CursorNext => "cursor_next",
        }
    }
}

impl TeardownHook {
    pub fn name(&self) -> &'static str {
        match self {
            TeardownHook::Default => "default_teardown",
            TeardownHook::Cursor => "cursor_teardown",
        }
    }
}

/// One setup / operation / teardown triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HookSet {
    pub setup: SetupHook,
    pub operation: OperationHook,
    pub teardown: TeardownHook,
}

impl HookSet {
    pub const INSERT_ONLY: HookSet = HookSet {
        setup: SetupHook::Null,
        operation: OperationHook::Insert,
        teardown: TeardownHook::Default,
    };

    pub const FIND_ONE: HookSet = HookSet {
        setup: SetupHook::FindOne,
        operation: OperationHook::FindOne,
        teardown: TeardownHook::Default,
    };

    pub const CURSOR_SCAN: HookSet = HookSet {
        setup: SetupHook::Cursor,
        operation: OperationHook::CursorNext,
        teardown: TeardownHook::Cursor,
    };
}

/// State hooks carry across calls within one scenario run.
#[derive(Default)]
pub struct HookState {
    cursor: Option<Box<dyn DocumentCursor>>,
    queries: u64,
}

impl HookState {
    /// Number of queries the cursor hooks have issued since the last setup.
    pub fn queries(&self) -> u64 {
        self.queries
    }
}

/// Hooks bound to the store, collection and document of a single run.
///
/// The document is reused for every iteration; mutations made by one phase
/// (such as the identity attached by an insert) are visible to the next.
pub struct HookRun<'a> {
    hooks: HookSet,
    store: &'a mut dyn DocumentStore,
    collection: &'a str,
    document: Document,
    state: HookState,
}

impl<'a> HookRun<'a> {
    pub fn new(
        hooks: HookSet,
        store: &'a mut dyn DocumentStore,
        collection: &'a str,
        document: Document,
    ) -> Self {
        Self {
            hooks,
            store,
            collection,
            document,
            state: HookState::default(),
        }
    }

    pub fn state(&self) -> &HookState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn insert(&mut self) -> Result<()> {
        // A document still carrying its identity would be stored as an update.
        self.document.remove(ID_FIELD);
        let id = self.store.insert_one(self.collection, &mut self.document)?;
        black_box(id);
        Ok(())
    }

    fn find_one(&mut self) -> Result<()> {
        match self.store.find_one(self.collection)? {
            Some(doc) => {
                black_box(doc);
                Ok(())
            }
            None => Err(BenchError::operation(
                OperationHook::FindOne.name(),
                format!("no document in {}", self.collection),
            )),
        }
    }

    fn cursor_next(&mut self) -> Result<()> {
        let name = OperationHook::CursorNext.name();
        let cursor = self
            .state
            .cursor
            .as_mut()
            .ok_or_else(|| BenchError::operation(name, "no open cursor"))?;
        if let Some(doc) = cursor.next_document()? {
            black_box(doc);
            return Ok(());
        }

        let mut cursor = self.store.find(self.collection)?;
        self.state.queries += 1;
        let doc = cursor.next_document()?.ok_or_else(|| {
            BenchError::operation(name, format!("{} is empty", self.collection))
        })?;
        black_box(doc);
        self.state.cursor = Some(cursor);
        Ok(())
    }
}

impl Batch for HookRun<'_> {
    fn setup(&mut self, iterations: u64) -> Result<()> {
        match self.hooks.setup {
            SetupHook::Null => {}
            SetupHook::FindOne => self.insert()?,
            SetupHook::Cursor => {
                for _ in 0..iterations {
                    self.insert()?;
                }
                self.state.cursor = Some(self.store.find(self.collection)?);
                self.state.queries = 1;
            }
        }
        Ok(())
    }

    fn run_one(&mut self) -> Result<()> {
        match self.hooks.operation {
            OperationHook::Insert => self.insert(),
            OperationHook::FindOne => self.find_one(),
            OperationHook::CursorNext => self.cursor_next(),
        }
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.remove_all(self.collection)?;
        if self.hooks.teardown == TeardownHook::Cursor {
            self.state.cursor = None;
            log::info!("queries: {}", self.state.queries);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Mode;
    use serde_json::{json, Value};

    fn doc() -> Document {
        match json!({"8": "********"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_insert_twice_stores_two_documents() {
        let mut store = MemoryStore::new("t", Mode::Native);
        let mut run = HookRun::new(HookSet::INSERT_ONLY, &mut store, "c", doc());
        run.setup(2).unwrap();
        run.run_one().unwrap();
        let first = run.document()[ID_FIELD].clone();
        run.run_one().unwrap();
        let second = run.document()[ID_FIELD].clone();
        assert_ne!(first, second);
        drop(run);

        assert_eq!(store.count("c"), 2);
        let mut cursor = store.find("c").unwrap();
        let a = cursor.next_document().unwrap().unwrap();
        let b = cursor.next_document().unwrap().unwrap();
        assert_ne!(a[ID_FIELD], b[ID_FIELD]);
    }

    #[test]
    fn test_insert_teardown_empties_collection() {
        let mut store = MemoryStore::new("t", Mode::Interpreted);
        let mut run = HookRun::new(HookSet::INSERT_ONLY, &mut store, "c", doc());
        run.setup(3).unwrap();
        for _ in 0..3 {
            run.run_one().unwrap();
        }
        run.teardown().unwrap();
        drop(run);
        assert_eq!(store.count("c"), 0);
    }

    #[test]
    fn test_find_one_fails_loudly_without_setup() {
        let mut store = MemoryStore::new("t", Mode::Native);
        let mut run = HookRun::new(HookSet::FIND_ONE, &mut store, "c", doc());
        let err = run.run_one().unwrap_err();
        assert!(matches!(
            err,
            BenchError::OperationFailure {
                operation: "find_one",
                ..
            }
        ));

        run.setup(1).unwrap();
        run.run_one().unwrap();
        run.run_one().unwrap();
    }

    #[test]
    fn test_cursor_reopens_on_exhaustion() {
        let mut store = MemoryStore::new("t", Mode::Interpreted);
        let mut run = HookRun::new(HookSet::CURSOR_SCAN, &mut store, "c", doc());
        run.setup(5).unwrap();
        assert_eq!(run.state().queries(), 1);
        for _ in 0..5 {
            run.run_one().unwrap();
        }
        assert_eq!(run.state().queries(), 1);
        run.run_one().unwrap();
        assert_eq!(run.state().queries(), 2);
        run.teardown().unwrap();
        assert_eq!(run.state().queries(), 2);
        drop(run);
        assert_eq!(store.count("c"), 0);
    }

    #[test]
    fn test_cursor_next_without_setup_fails() {
        let mut store = MemoryStore::new("t", Mode::Native);
        let mut run = HookRun::new(HookSet::CURSOR_SCAN, &mut store, "c", doc());
        assert!(run.run_one().is_err());
    }

    #[test]
    fn test_setup_resets_query_counter() {
        let mut store = MemoryStore::new("t", Mode::Native);
        let mut run = HookRun::new(HookSet::CURSOR_SCAN, &mut store, "c", doc());
        run.setup(1).unwrap();
        run.run_one().unwrap();
        run.run_one().unwrap();
        assert_eq!(run.state().queries(), 2);
        run.teardown().unwrap();
        run.setup(2).unwrap();
        assert_eq!(run.state().queries(), 1);
    }
}
