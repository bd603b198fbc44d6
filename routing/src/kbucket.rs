use crate::config::RoutingConfig;
use crate::contact::Contact;
use crate::error::{Error, Result};
use crate::id::Id;

/// How an insertion landed in the bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketInsert {
    /// The contact was new and appended at the tail.
    Appended,
    /// The id was already present, the entry moved to the tail and its
    /// stored address and counters were replaced.
    Refreshed,
}

/// A bounded list of contacts covering the inclusive id range
/// `[range_min, range_max]`.
///
/// Entries are kept in observation order: index 0 is the
/// least-recently-seen contact, the tail is the most-recently-seen.
/// The replacement cache holds candidates that arrived while the bucket
/// was full, it stays empty unless the owning table uses the cache
/// eviction policy.
#[derive(Clone, Debug)]
pub struct KBucket {
    pub contacts: Vec<Contact>,
    pub replacement_cache: Vec<Contact>,
    pub(crate) range_min: Id,
    pub(crate) range_max: Id,
    pub(crate) last_accessed: u64,
}

impl KBucket {
    pub fn new(range_min: Id, range_max: Id) -> Self {
        KBucket {
            contacts: Vec::new(),
            replacement_cache: Vec::new(),
            range_min,
            range_max,
            last_accessed: 0,
        }
    }

    pub fn range_min(&self) -> Id {
        self.range_min
    }

    pub fn range_max(&self) -> Id {
        self.range_max
    }

    pub fn last_accessed(&self) -> u64 {
        self.last_accessed
    }

    pub fn touch(&mut self, now: u64) {
        self.last_accessed = now;
    }

    pub fn key_in_range(&self, id: Id) -> bool {
        self.range_min <= id && id <= self.range_max
    }

    /// Adds or refreshes a contact.
    ///
    /// A contact whose id is already present is moved to the tail with its
    /// failure counter zeroed and its address taken from `contact`. A new
    /// contact is appended while there is room, otherwise the call fails
    /// with [`Error::BucketFull`] and the bucket is left untouched.
    pub fn add_contact(
        &mut self,
        mut contact: Contact,
        config: &RoutingConfig,
        now: u64,
    ) -> Result<BucketInsert> {
        contact.failed_rpcs = 0;
        let existing = self.contacts.iter().position(|x| x.id == contact.id);
        let insert = match existing {
            Some(index) => {
                self.contacts.remove(index);
                self.contacts.push(contact);
                BucketInsert::Refreshed
            }
            None if self.contacts.len() < config.bucket_size => {
                // A queued copy must not survive promotion into the bucket,
                // every id appears once across both lists.
                self.remove_cached(contact.id);
                self.contacts.push(contact);
                BucketInsert::Appended
            }
            None => return Err(Error::BucketFull),
        };
        self.last_accessed = now;
        Ok(insert)
    }

    pub fn get_contact(&self, id: Id) -> Option<&Contact> {
        self.contacts.iter().find(|x| x.id == id)
    }

    /// Removes the contact with this id from the bucket proper.
    pub fn remove_contact(&mut self, id: Id) -> Result<Contact> {
        match self.contacts.iter().position(|x| x.id == id) {
            Some(index) => Ok(self.contacts.remove(index)),
            None => Err(Error::NotPresent(id)),
        }
    }

    /// Drops a queued candidate with this id, if one exists.
    pub fn remove_cached(&mut self, id: Id) -> bool {
        match self.replacement_cache.iter().position(|x| x.id == id) {
            Some(index) => {
                self.replacement_cache.remove(index);
                true
            }
            None => false,
        }
    }

    /// Up to `n` contacts in observation order, skipping `exclude`.
    pub fn get_contacts(&self, n: usize, exclude: Option<Id>) -> Vec<Contact> {
        self.contacts
            .iter()
            .filter(|x| Some(x.id) != exclude)
            .take(n)
            .cloned()
            .collect()
    }

    /// Queues a candidate for the next freed slot.
    ///
    /// A queued id is re-queued at the tail (most recent), and the oldest
    /// candidates are dropped beyond the configured cache size.
    pub fn queue_replacement(&mut self, contact: Contact, config: &RoutingConfig) {
        self.remove_cached(contact.id);
        self.replacement_cache.push(contact);
        while self.replacement_cache.len() > config.replacement_cache_size {
            self.replacement_cache.remove(0);
        }
    }

    /// Pops the most recently queued candidate.
    pub fn pop_replacement(&mut self) -> Option<Contact> {
        self.replacement_cache.pop()
    }
}
