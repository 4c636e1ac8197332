use std::ops::{Deref, DerefMut};

use log::debug;

use crate::Client;

/// Scoped ownership of a client's local model: whatever happens while it is alive, the model
/// is released once it goes out of scope.
pub(crate) struct ModelLease<'a> {
    client: &'a mut Client,
    round: usize,
}

impl<'a> ModelLease<'a> {
    pub(crate) fn new(client: &'a mut Client, round: usize) -> Self {
        Self { client, round }
    }
}

impl Deref for ModelLease<'_> {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl DerefMut for ModelLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

impl Drop for ModelLease<'_> {
    fn drop(&mut self) {
        self.client.reset();
        debug!(client = self.client.index(), round = self.round; "released local model");
    }
}
