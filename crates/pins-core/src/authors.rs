//! First-seen-wins author deduplication.

use std::collections::BTreeMap;

use crate::models::{Author, PinnedMessage, Snowflake, UserRef};

/// Collects the sender and mentioned users of accepted pins.
///
/// The first observation of an id is kept as is; later observations of the
/// same id are ignored even when their name or avatar differ.
#[derive(Debug, Default)]
pub struct AuthorAggregator {
    authors: BTreeMap<Snowflake, Author>,
}

impl AuthorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `user` unless their id is already known. Returns whether it
    /// was inserted.
    pub fn observe(&mut self, user: &UserRef) -> bool {
        let mut inserted = false;
        self.authors.entry(user.id).or_insert_with(|| {
            inserted = true;
            Author::from(user)
        });
        inserted
    }

    /// Sender first, then mentions in message order.
    pub fn observe_message(&mut self, message: &PinnedMessage) {
        self.observe(&message.author);
        for user in &message.mentions {
            self.observe(user);
        }
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<Snowflake, Author> {
        self.authors
    }
}
