//! In-process document store the benchmarks drive.
//!
//! Each collection is a shared, append-only vector of stored documents so that
//! cursors can walk it lazily while the store stays mutably borrowed elsewhere.
//! A cursor reads that live vector, so inserts made during a scan are visible
//! to it. The [`Mode`] picks how documents are held:
//!
//! - `Native` keeps a structured copy and clones it on every read.
//! - `Interpreted` encodes to JSON bytes on insert and parses on every read.
//!
//! Bodies are held without their identity. Every insert still pays for its own
//! copy or encoding, but a body equal to the previous one in the collection is
//! dropped in favour of the one already stored, so repeated inserts of the same
//! document keep memory flat.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::error::{BenchError, Result};
use crate::payload::Document;
use crate::Mode;

/// Identity field attached to inserted documents.
pub const ID_FIELD: &str = "_id";

/// 12-byte document identity: 4-byte seconds, 5 random bytes, 3-byte counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    fn new(seconds: u32, process: [u8; 5], counter: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&process);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn parse_hex(s: &str) -> Option<Self> {
        if s.len() != 24 || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Operations the benchmark hooks need from a document store.
pub trait DocumentStore {
    /// Insert `document`, attaching its identity under [`ID_FIELD`].
    ///
    /// A document that already carries the identity of a stored document
    /// replaces it instead of adding a new one.
    fn insert_one(&mut self, collection: &str, document: &mut Document) -> Result<ObjectId>;
    fn find_one(&self, collection: &str) -> Result<Option<Document>>;
    fn find(&self, collection: &str) -> Result<Box<dyn DocumentCursor>>;
    /// Remove every document, returning how many were removed.
    fn remove_all(&mut self, collection: &str) -> Result<u64>;
    fn count(&self, collection: &str) -> u64;
    fn drop_database(&mut self) -> Result<()>;
}

pub trait DocumentCursor {
    /// Next document, or `None` once the cursor is exhausted.
    fn next_document(&mut self) -> Result<Option<Document>>;
}

#[derive(Debug, PartialEq)]
enum Body {
    Native(Document),
    Encoded(Vec<u8>),
}

#[derive(Debug)]
struct Stored {
    id: ObjectId,
    body: Rc<Body>,
}

impl Stored {
    fn decode(&self) -> Result<Document> {
        let mut doc: Document = match &*self.body {
            Body::Native(doc) => doc.clone(),
            Body::Encoded(bytes) => serde_json::from_slice(bytes)?,
        };
        doc.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        Ok(doc)
    }
}

type Collection = Rc<RefCell<Vec<Stored>>>;

pub struct MemoryStore {
    name: String,
    mode: Mode,
    collections: HashMap<String, Collection>,
    process: [u8; 5],
    counter: u32,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            collections: HashMap::new(),
            process: rand::random(),
            counter: rand::random::<u32>() & 0x00ff_ffff,
        }
    }

    fn next_id(&mut self) -> ObjectId {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        self.counter = (self.counter + 1) & 0x00ff_ffff;
        ObjectId::new(seconds, self.process, self.counter)
    }

    /// `document` must not carry its identity.
    fn encode(&self, document: &Document) -> Result<Body> {
        Ok(match self.mode {
            Mode::Native => Body::Native(document.clone()),
            Mode::Interpreted => Body::Encoded(serde_json::to_vec(document)?),
        })
    }
}

impl DocumentStore for MemoryStore {
    fn insert_one(&mut self, collection: &str, document: &mut Document) -> Result<ObjectId> {
        let existing = match document.get(ID_FIELD) {
            Some(Value::String(s)) => Some(ObjectId::parse_hex(s).ok_or_else(|| {
                BenchError::operation("insert", format!("malformed {ID_FIELD} {s:?}"))
            })?),
            Some(other) => {
                return Err(BenchError::operation(
                    "insert",
                    format!("unsupported {ID_FIELD} {other}"),
                ))
            }
            None => None,
        };

        let id = match existing {
            Some(id) => id,
            None => self.next_id(),
        };
        document.remove(ID_FIELD);
        let encoded = self.encode(document);
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let body = encoded?;

        let docs = self.collections.entry(collection.to_string()).or_default();
        let mut docs = docs.borrow_mut();
        let body = match docs.last() {
            Some(prev) if *prev.body == body => Rc::clone(&prev.body),
            _ => Rc::new(body),
        };
        let stored = Stored { id, body };
        match docs.iter_mut().find(|d| d.id == id) {
            Some(slot) => *slot = stored,
            None => docs.push(stored),
        }
        Ok(id)
    }

    fn find_one(&self, collection: &str) -> Result<Option<Document>> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(None);
        };
        let docs = docs.borrow();
        docs.first().map(Stored::decode).transpose()
    }

    fn find(&self, collection: &str) -> Result<Box<dyn DocumentCursor>> {
        let docs = self.collections.get(collection).cloned().unwrap_or_default();
        Ok(Box::new(MemoryCursor { docs, position: 0 }))
    }

    fn remove_all(&mut self, collection: &str) -> Result<u64> {
        let removed = match self.collections.get(collection) {
            Some(docs) => {
                let mut docs = docs.borrow_mut();
                let n = docs.len() as u64;
                docs.clear();
                n
            }
            None => 0,
        };
        Ok(removed)
    }

    fn count(&self, collection: &str) -> u64 {
        self.collections
            .get(collection)
            .map(|docs| docs.borrow().len() as u64)
            .unwrap_or(0)
    }

    fn drop_database(&mut self) -> Result<()> {
        log::debug!("dropping database {}", self.name);
        self.collections.clear();
        Ok(())
    }
}

struct MemoryCursor {
    docs: Collection,
    position: usize,
}

impl DocumentCursor for MemoryCursor {
    fn next_document(&mut self) -> Result<Option<Document>> {
        let docs = self.docs.borrow();
        let Some(stored) = docs.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        stored.decode().map(Some)
    }
}
