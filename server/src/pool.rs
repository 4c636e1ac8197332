use std::sync::Arc;

use client::{Client, ClientHandle};
use parking_lot::Mutex;

/// The clients taking part in a run, the client at position `i` answers to index `i`.
#[derive(Clone, Default)]
pub struct ClientPool {
    clients: Vec<ClientHandle>,
}

impl ClientPool {
    pub fn new<I>(clients: I) -> Self
    where
        I: IntoIterator<Item = Client>,
    {
        Self {
            clients: clients
                .into_iter()
                .map(|client| Arc::new(Mutex::new(client)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ClientHandle> {
        self.clients.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientHandle> {
        self.clients.iter()
    }
}

impl FromIterator<ClientHandle> for ClientPool {
    fn from_iter<T: IntoIterator<Item = ClientHandle>>(iter: T) -> Self {
        Self {
            clients: iter.into_iter().collect(),
        }
    }
}
