use rand::Rng;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::RoutingConfig;
use crate::contact::Contact;
use crate::error::{Error, Result};
use crate::id::Id;
use crate::kbucket::{BucketInsert, KBucket};

/// Ordered list of buckets partitioning the whole id space.
///
/// Starts as a single bucket covering everything; buckets split on demand
/// and are never merged, so `range_max` values grow strictly along the
/// list and every id is covered by exactly one bucket. The local node's
/// own id is only used to drive splits, it is never stored.
pub struct KTree<C: Clock = SystemClock> {
    parent_id: Id,
    config: RoutingConfig,
    clock: C,
    buckets: Vec<KBucket>,
}

impl KTree<SystemClock> {
    pub fn new(parent_id: Id, config: RoutingConfig) -> Self {
        KTree::with_clock(parent_id, config, SystemClock)
    }
}

impl<C: Clock> KTree<C> {
    pub fn with_clock(parent_id: Id, config: RoutingConfig, clock: C) -> Self {
        let mut root = KBucket::new(Id::ZERO, Id::MAX);
        root.touch(clock.now());
        KTree {
            parent_id,
            config,
            clock,
            buckets: vec![root],
        }
    }

    pub fn parent_id(&self) -> Id {
        self.parent_id
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn buckets(&self) -> &[KBucket] {
        &self.buckets
    }

    pub(crate) fn bucket_mut(&mut self, index: usize) -> &mut KBucket {
        &mut self.buckets[index]
    }

    /// Index of the bucket covering `id`.
    ///
    /// Bucket ranges are disjoint and their `range_max` values increase
    /// monotonically, so a binary search finds the only candidate; a miss
    /// means the partition itself is broken.
    pub fn kbucket_index(&self, id: Id) -> Result<usize> {
        let index = self.buckets.partition_point(|x| x.range_max() < id);
        if index < self.buckets.len() && self.buckets[index].key_in_range(id) {
            Ok(index)
        } else {
            Err(Error::InvariantViolation("no bucket covers the id"))
        }
    }

    /// A full bucket may only split while it covers the local id and is
    /// wider than a single id.
    pub fn can_split(&self, index: usize) -> bool {
        let bucket = &self.buckets[index];
        bucket.key_in_range(self.parent_id) && bucket.range_min() != bucket.range_max()
    }

    /// Halves `buckets[index]`, inserting the upper half right after it.
    ///
    /// Contacts and queued candidates move to the half covering them,
    /// keeping their relative order. No contact is lost or duplicated.
    pub fn split_bucket(&mut self, index: usize) {
        let mid = {
            let bucket = &mut self.buckets[index];
            let mid = Id::midpoint_upper(bucket.range_min(), bucket.range_max());
            let mut upper = KBucket::new(mid, bucket.range_max());
            upper.touch(bucket.last_accessed());
            bucket.range_max = mid.wrapping_sub(Id::ONE);

            let (stay, moved): (Vec<_>, Vec<_>) =
                bucket.contacts.drain(..).partition(|x| x.id < mid);
            bucket.contacts = stay;
            upper.contacts = moved;

            let (stay, moved): (Vec<_>, Vec<_>) =
                bucket.replacement_cache.drain(..).partition(|x| x.id < mid);
            bucket.replacement_cache = stay;
            upper.replacement_cache = moved;

            self.buckets.insert(index + 1, upper);
            mid
        };
        debug!(bucket = index, split_at = %mid, "split bucket");
    }

    pub(crate) fn try_insert(&mut self, index: usize, contact: Contact) -> Result<BucketInsert> {
        let now = self.clock.now();
        self.buckets[index].add_contact(contact, &self.config, now)
    }

    pub(crate) fn queue_replacement(&mut self, index: usize, contact: Contact) {
        self.buckets[index].queue_replacement(contact, &self.config);
    }

    pub fn get_contact(&self, id: Id) -> Result<Contact> {
        let index = self.kbucket_index(id)?;
        self.buckets[index]
            .get_contact(id)
            .cloned()
            .ok_or(Error::NotPresent(id))
    }

    /// Removes `id` from its bucket, returning the removed contact.
    ///
    /// A missing id is not an error (removal must stay idempotent, ping
    /// continuations can race with explicit removals); a queued copy in
    /// the replacement cache is dropped either way.
    pub fn remove_contact(&mut self, id: Id) -> Result<Option<Contact>> {
        let index = self.kbucket_index(id)?;
        let bucket = &mut self.buckets[index];
        match bucket.remove_contact(id) {
            Ok(contact) => Ok(Some(contact)),
            Err(Error::NotPresent(_)) => {
                bucket.remove_cached(id);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Contacts near `target`, walking outward bucket by bucket.
    ///
    /// Collection starts at the covering bucket and expands to index
    /// neighbours until the configured bucket size is reached or every
    /// bucket was visited. The result is in visit order, not by distance;
    /// callers wanting proximity order sort by `target ^ id`.
    pub fn find_close_nodes(
        &self,
        target: Id,
        exclude: Option<Id>,
    ) -> Result<Vec<Contact>> {
        let k = self.config.bucket_size;
        let start = self.kbucket_index(target)?;
        let mut found = self.buckets[start].get_contacts(k, exclude);

        let mut step = 1;
        loop {
            let lower = start.checked_sub(step);
            let upper = start + step;
            if found.len() >= k || (lower.is_none() && upper >= self.buckets.len()) {
                break;
            }
            if let Some(lower) = lower {
                found.extend(self.buckets[lower].get_contacts(k - found.len(), exclude));
            }
            if upper < self.buckets.len() && found.len() < k {
                found.extend(self.buckets[upper].get_contacts(k - found.len(), exclude));
            }
            step += 1;
        }
        Ok(found)
    }

    /// Hex-encoded random targets for every bucket due a refresh, in
    /// bucket order, starting at `start_index`.
    pub fn refresh_targets<R: Rng + ?Sized>(
        &self,
        start_index: usize,
        force: bool,
        rng: &mut R,
    ) -> Vec<String> {
        let now = self.clock.now();
        self.buckets
            .iter()
            .skip(start_index)
            .filter(|x| force || now.saturating_sub(x.last_accessed()) >= self.config.refresh_timeout)
            .map(|x| Id::random_in_range(rng, x.range_min(), x.range_max()).to_hex())
            .collect()
    }

    pub fn touch(&mut self, id: Id) -> Result<()> {
        let index = self.kbucket_index(id)?;
        let now = self.clock.now();
        self.buckets[index].touch(now);
        Ok(())
    }

    /// Contacts stored across all buckets, cache candidates excluded.
    pub fn contact_count(&self) -> usize {
        self.buckets.iter().map(|x| x.contacts.len()).sum()
    }
}
