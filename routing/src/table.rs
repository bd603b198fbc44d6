use std::future::Future;

use rand::Rng;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::RoutingConfig;
use crate::contact::Contact;
use crate::error::{Error, Result};
use crate::id::Id;
use crate::kbucket::BucketInsert;
use crate::ktree::KTree;
use crate::transport::{TransportError, TransportSender};

/// What became of an observed contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The contact is the local node, nothing is stored.
    Ignored,
    /// Appended to a bucket with room (possibly after splits).
    Inserted,
    /// Already known, moved to the most-recently-seen position.
    Refreshed,
    /// A stale head failed its liveness probe and was replaced.
    Evicted { stale: Id },
    /// The bucket was full and its head answered the probe, the candidate
    /// was discarded.
    Dropped,
    /// The bucket was full and could not split, the candidate was queued
    /// in its replacement cache.
    Cached,
}

/// The operations a node needs from its routing table.
///
/// Two implementations share this contract: [`TreeRoutingTable`] probes
/// stale bucket heads before evicting them, [`CachedRoutingTable`] queues
/// candidates in a per-bucket replacement cache instead. Observing a
/// contact is the only operation that may suspend (it can await a ping);
/// everything else runs to completion synchronously.
pub trait RoutingTable {
    /// Routes `contact` to its bucket, splitting, probing or queueing as
    /// the policy dictates. The local node's own id is never stored.
    fn add_contact<T>(
        &mut self,
        contact: Contact,
        transport: &T,
    ) -> impl Future<Output = Result<AddOutcome>> + Send
    where
        T: TransportSender + Sync;

    /// The known contact with this id, [`Error::NotPresent`] otherwise.
    fn get_contact(&self, id: Id) -> Result<Contact>;

    /// Removes a contact; removing an unknown id is a no-op. Returns
    /// whether a stored contact was actually dropped.
    fn remove_contact(&mut self, id: Id) -> Result<bool>;

    /// Contacts near `target`, excluding `exclude` (an RPC caller passes
    /// its own id here so it never learns about itself).
    ///
    /// `count` is accepted for interface parity with callers; the search
    /// always fills to the configured bucket size. The result is not
    /// distance-sorted.
    fn find_close_nodes(
        &self,
        target: Id,
        count: usize,
        exclude: Option<Id>,
    ) -> Result<Vec<Contact>>;

    /// Hex-encoded lookup targets for every bucket due a refresh, in
    /// bucket order starting from `start_index`; `force` refreshes
    /// regardless of age.
    fn get_refresh_list<R: Rng + ?Sized>(
        &self,
        start_index: usize,
        force: bool,
        rng: &mut R,
    ) -> Vec<String>;

    /// Marks the bucket covering `id` as freshly used.
    fn touch_kbucket(&mut self, id: Id) -> Result<()>;
}

/// Routing table with ping-based eviction (section 2.2 of the Kademlia
/// paper).
///
/// When a bucket that cannot split is full, the least-recently-seen head
/// is pinged: a timeout evicts it in favour of the candidate, an answer
/// keeps the bucket as it is. Costs a network round-trip per rejected
/// candidate but never remembers more than k contacts per bucket.
pub struct TreeRoutingTable<C: Clock = SystemClock> {
    tree: KTree<C>,
}

impl TreeRoutingTable<SystemClock> {
    pub fn new(parent_id: Id, config: RoutingConfig) -> Self {
        TreeRoutingTable {
            tree: KTree::new(parent_id, config),
        }
    }
}

impl<C: Clock> TreeRoutingTable<C> {
    pub fn with_clock(parent_id: Id, config: RoutingConfig, clock: C) -> Self {
        TreeRoutingTable {
            tree: KTree::with_clock(parent_id, config, clock),
        }
    }

    pub fn tree(&self) -> &KTree<C> {
        &self.tree
    }
}

impl<C: Clock> RoutingTable for TreeRoutingTable<C> {
    fn add_contact<T>(
        &mut self,
        contact: Contact,
        transport: &T,
    ) -> impl Future<Output = Result<AddOutcome>> + Send
    where
        T: TransportSender + Sync,
    {
        async move {
            if contact.id == self.tree.parent_id() {
                return Ok(AddOutcome::Ignored);
            }
            let mut evicted = None;
            loop {
                let index = self.tree.kbucket_index(contact.id)?;
                match self.tree.try_insert(index, contact.clone()) {
                    Ok(BucketInsert::Appended) => {
                        return Ok(match evicted {
                            Some(stale) => AddOutcome::Evicted { stale },
                            None => AddOutcome::Inserted,
                        })
                    }
                    Ok(BucketInsert::Refreshed) => return Ok(AddOutcome::Refreshed),
                    Err(Error::BucketFull) => {
                        if self.tree.can_split(index) {
                            self.tree.split_bucket(index);
                            continue;
                        }
                        let head = match self.tree.buckets()[index].contacts.first() {
                            Some(x) => x.clone(),
                            None => return Err(Error::InvariantViolation("full bucket has no head")),
                        };
                        debug!(head = %head.id, candidate = %contact.id, "bucket full, probing head");
                        match transport.ping(&head).await {
                            Err(TransportError::Timeout(stale)) => {
                                // Removal is idempotent, the head may already
                                // be gone. No removal, no retry.
                                if self.tree.remove_contact(stale)?.is_none() {
                                    return Ok(AddOutcome::Dropped);
                                }
                                info!(%stale, replacement = %contact.id, "evicted unresponsive head");
                                evicted = Some(stale);
                            }
                            Ok(()) => {
                                debug!(head = %head.id, "head is alive, dropping candidate");
                                return Ok(AddOutcome::Dropped);
                            }
                            // Cancelled or failed probes leave the table as it is.
                            Err(_) => return Ok(AddOutcome::Dropped),
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
        }
    }

    fn get_contact(&self, id: Id) -> Result<Contact> {
        self.tree.get_contact(id)
    }

    fn remove_contact(&mut self, id: Id) -> Result<bool> {
        Ok(self.tree.remove_contact(id)?.is_some())
    }

    fn find_close_nodes(
        &self,
        target: Id,
        _count: usize,
        exclude: Option<Id>,
    ) -> Result<Vec<Contact>> {
        self.tree.find_close_nodes(target, exclude)
    }

    fn get_refresh_list<R: Rng + ?Sized>(
        &self,
        start_index: usize,
        force: bool,
        rng: &mut R,
    ) -> Vec<String> {
        self.tree.refresh_targets(start_index, force, rng)
    }

    fn touch_kbucket(&mut self, id: Id) -> Result<()> {
        self.tree.touch(id)
    }
}

/// Routing table with a per-bucket replacement cache (the optimized
/// contact accounting of section 4.1 of the Kademlia paper).
///
/// Rejected candidates are queued instead of triggering probes, which
/// trades a little memory for much less ping traffic. A queued candidate
/// is promoted the next time its bucket loses an entry.
pub struct CachedRoutingTable<C: Clock = SystemClock> {
    tree: KTree<C>,
}

impl CachedRoutingTable<SystemClock> {
    pub fn new(parent_id: Id, config: RoutingConfig) -> Self {
        CachedRoutingTable {
            tree: KTree::new(parent_id, config),
        }
    }
}

impl<C: Clock> CachedRoutingTable<C> {
    pub fn with_clock(parent_id: Id, config: RoutingConfig, clock: C) -> Self {
        CachedRoutingTable {
            tree: KTree::with_clock(parent_id, config, clock),
        }
    }

    pub fn tree(&self) -> &KTree<C> {
        &self.tree
    }

    fn insert_or_queue(&mut self, contact: Contact) -> Result<AddOutcome> {
        loop {
            let index = self.tree.kbucket_index(contact.id)?;
            match self.tree.try_insert(index, contact.clone()) {
                Ok(BucketInsert::Appended) => return Ok(AddOutcome::Inserted),
                Ok(BucketInsert::Refreshed) => return Ok(AddOutcome::Refreshed),
                Err(Error::BucketFull) => {
                    if self.tree.can_split(index) {
                        self.tree.split_bucket(index);
                        continue;
                    }
                    debug!(candidate = %contact.id, bucket = index, "bucket full, queueing candidate");
                    self.tree.queue_replacement(index, contact);
                    return Ok(AddOutcome::Cached);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

impl<C: Clock> RoutingTable for CachedRoutingTable<C> {
    fn add_contact<T>(
        &mut self,
        contact: Contact,
        _transport: &T,
    ) -> impl Future<Output = Result<AddOutcome>> + Send
    where
        T: TransportSender + Sync,
    {
        async move {
            if contact.id == self.tree.parent_id() {
                return Ok(AddOutcome::Ignored);
            }
            let mut contact = contact;
            contact.failed_rpcs = 0;
            let index = self.tree.kbucket_index(contact.id)?;
            let old_address = self.tree.buckets()[index]
                .get_contact(contact.id)
                .map(|x| x.address.clone());
            if let Some(old) = old_address {
                if old != contact.address {
                    // The peer rebound to a new address: drop the stale entry
                    // (promoting a cached candidate if one is queued) and run
                    // the candidate through the normal insertion path.
                    info!(id = %contact.id, %old, new = %contact.address, "contact rebound");
                    self.remove_contact(contact.id)?;
                }
            }
            self.insert_or_queue(contact)
        }
    }

    fn get_contact(&self, id: Id) -> Result<Contact> {
        self.tree.get_contact(id)
    }

    fn remove_contact(&mut self, id: Id) -> Result<bool> {
        match self.tree.remove_contact(id)? {
            Some(_) => {
                let index = self.tree.kbucket_index(id)?;
                if let Some(promoted) = self.tree.bucket_mut(index).pop_replacement() {
                    debug!(promoted = %promoted.id, bucket = index, "promoted cached candidate");
                    self.tree.try_insert(index, promoted)?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_close_nodes(
        &self,
        target: Id,
        _count: usize,
        exclude: Option<Id>,
    ) -> Result<Vec<Contact>> {
        self.tree.find_close_nodes(target, exclude)
    }

    fn get_refresh_list<R: Rng + ?Sized>(
        &self,
        start_index: usize,
        force: bool,
        rng: &mut R,
    ) -> Vec<String> {
        self.tree.refresh_targets(start_index, force, rng)
    }

    fn touch_kbucket(&mut self, id: Id) -> Result<()> {
        self.tree.touch(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::future;
    use std::sync::{Arc, Mutex};

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::consts::ID_LEN;
    use crate::contact::PeerAddr;

    /// Answers pings from ids in `dead` with a timeout, everything else
    /// with success, recording every probe.
    #[derive(Clone, Default)]
    struct RecordingPinger {
        dead: Arc<Mutex<HashSet<Id>>>,
        pinged: Arc<Mutex<Vec<Id>>>,
    }

    impl RecordingPinger {
        fn mark_dead(&self, id: Id) {
            self.dead.lock().unwrap().insert(id);
        }

        fn pinged(&self) -> Vec<Id> {
            self.pinged.lock().unwrap().clone()
        }
    }

    impl TransportSender for RecordingPinger {
        type Fut = future::Ready<std::result::Result<(), TransportError>>;

        fn ping(&self, target: &Contact) -> Self::Fut {
            self.pinged.lock().unwrap().push(target.id);
            if self.dead.lock().unwrap().contains(&target.id) {
                future::ready(Err(TransportError::Timeout(target.id)))
            } else {
                future::ready(Ok(()))
            }
        }
    }

    /// The cache policy must never generate ping traffic.
    #[derive(Clone)]
    struct NoPinger;

    impl TransportSender for NoPinger {
        type Fut = future::Ready<std::result::Result<(), TransportError>>;

        fn ping(&self, target: &Contact) -> Self::Fut {
            panic!("unexpected ping to {}", target.id);
        }
    }

    fn tid(prefix: &[u8]) -> Id {
        let mut raw = [0u8; ID_LEN];
        raw[..prefix.len()].copy_from_slice(prefix);
        Id(raw)
    }

    fn peer(prefix: &[u8]) -> Contact {
        Contact::new(tid(prefix), PeerAddr::new("127.0.0.1", 4000 + prefix[0] as u16))
    }

    fn config(bucket_size: usize) -> RoutingConfig {
        RoutingConfig {
            bucket_size,
            replacement_cache_size: bucket_size,
            ..Default::default()
        }
    }

    /// Fills the lower half of the id space for a parent living in the
    /// upper half: two low contacts make the (non-splittable after one
    /// split) low bucket full at k = 2.
    async fn full_low_bucket<R, T>(table: &mut R, transport: &T)
    where
        R: RoutingTable,
        T: TransportSender + Sync,
    {
        assert_eq!(
            table.add_contact(peer(&[0x01]), transport).await.unwrap(),
            AddOutcome::Inserted
        );
        assert_eq!(
            table.add_contact(peer(&[0x02]), transport).await.unwrap(),
            AddOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn ignores_own_id() {
        let parent = tid(&[0xc0]);
        let transport = RecordingPinger::default();
        let mut table = TreeRoutingTable::new(parent, config(2));
        let own = Contact::new(parent, PeerAddr::new("127.0.0.1", 1));
        assert_eq!(table.add_contact(own, &transport).await.unwrap(), AddOutcome::Ignored);
        assert_eq!(table.tree().contact_count(), 0);
        assert!(transport.pinged().is_empty());
    }

    #[tokio::test]
    async fn splits_to_make_room_near_parent() {
        let transport = RecordingPinger::default();
        let mut table = TreeRoutingTable::new(tid(&[0xc0]), config(2));
        for prefix in [&[0xff_u8][..], &[0xfe], &[0xc1]] {
            let outcome = table.add_contact(peer(prefix), &transport).await.unwrap();
            assert_eq!(outcome, AddOutcome::Inserted);
        }
        // room was made by splitting, not by probing
        assert!(transport.pinged().is_empty());
        assert!(table.tree().buckets().len() > 1);
        assert_eq!(table.tree().contact_count(), 3);
        for bucket in table.tree().buckets() {
            assert!(bucket.contacts.len() <= 2);
            for contact in &bucket.contacts {
                assert!(bucket.key_in_range(contact.id));
            }
        }
    }

    #[test_log::test(tokio::test)]
    async fn evicts_unresponsive_head() {
        let transport = RecordingPinger::default();
        let mut table = TreeRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &transport).await;
        transport.mark_dead(tid(&[0x01]));

        let outcome = table.add_contact(peer(&[0x03]), &transport).await.unwrap();
        assert_eq!(outcome, AddOutcome::Evicted { stale: tid(&[0x01]) });
        assert_eq!(transport.pinged(), vec![tid(&[0x01])]);

        let index = table.tree().kbucket_index(tid(&[0x03])).unwrap();
        let ids: Vec<_> = table.tree().buckets()[index].contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x02]), tid(&[0x03])]);
        assert!(matches!(table.get_contact(tid(&[0x01])), Err(Error::NotPresent(_))));
    }

    #[test_log::test(tokio::test)]
    async fn keeps_responsive_head() {
        let transport = RecordingPinger::default();
        let mut table = TreeRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &transport).await;

        let outcome = table.add_contact(peer(&[0x03]), &transport).await.unwrap();
        assert_eq!(outcome, AddOutcome::Dropped);
        assert_eq!(transport.pinged(), vec![tid(&[0x01])]);

        let index = table.tree().kbucket_index(tid(&[0x01])).unwrap();
        let ids: Vec<_> = table.tree().buckets()[index].contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x01]), tid(&[0x02])]);
        assert!(matches!(table.get_contact(tid(&[0x03])), Err(Error::NotPresent(_))));
    }

    #[tokio::test]
    async fn readding_known_contact_refreshes() {
        let transport = RecordingPinger::default();
        let mut table = TreeRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &transport).await;
        let outcome = table.add_contact(peer(&[0x01]), &transport).await.unwrap();
        assert_eq!(outcome, AddOutcome::Refreshed);
        let index = table.tree().kbucket_index(tid(&[0x01])).unwrap();
        let ids: Vec<_> = table.tree().buckets()[index].contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x02]), tid(&[0x01])]);
    }

    #[tokio::test]
    async fn cache_policy_queues_instead_of_pinging() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &NoPinger).await;

        assert_eq!(
            table.add_contact(peer(&[0x03]), &NoPinger).await.unwrap(),
            AddOutcome::Cached
        );
        assert_eq!(
            table.add_contact(peer(&[0x04]), &NoPinger).await.unwrap(),
            AddOutcome::Cached
        );
        let index = table.tree().kbucket_index(tid(&[0x03])).unwrap();
        let cached: Vec<_> = table.tree().buckets()[index]
            .replacement_cache
            .iter()
            .map(|x| x.id)
            .collect();
        assert_eq!(cached, vec![tid(&[0x03]), tid(&[0x04])]);
        // queued candidates are not reachable through lookups
        assert!(matches!(table.get_contact(tid(&[0x03])), Err(Error::NotPresent(_))));
    }

    #[tokio::test]
    async fn removal_promotes_most_recent_candidate() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &NoPinger).await;
        table.add_contact(peer(&[0x03]), &NoPinger).await.unwrap();
        table.add_contact(peer(&[0x04]), &NoPinger).await.unwrap();

        assert!(table.remove_contact(tid(&[0x01])).unwrap());
        let index = table.tree().kbucket_index(tid(&[0x04])).unwrap();
        let ids: Vec<_> = table.tree().buckets()[index].contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x02]), tid(&[0x04])]);
        assert!(table.get_contact(tid(&[0x04])).is_ok());

        assert!(table.remove_contact(tid(&[0x02])).unwrap());
        let ids: Vec<_> = table.tree().buckets()[index].contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x04]), tid(&[0x03])]);

        // removing an unknown id stays a no-op
        assert!(!table.remove_contact(tid(&[0x99])).unwrap());
    }

    #[tokio::test]
    async fn rebind_updates_address() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        let mut first = peer(&[0x01]);
        first.address = PeerAddr::new("10.0.0.1", 1111);
        table.add_contact(first, &NoPinger).await.unwrap();
        table.add_contact(peer(&[0x02]), &NoPinger).await.unwrap();

        let mut rebound = peer(&[0x01]);
        rebound.address = PeerAddr::new("10.0.0.2", 2222);
        let outcome = table.add_contact(rebound, &NoPinger).await.unwrap();
        assert_eq!(outcome, AddOutcome::Inserted);

        let stored = table.get_contact(tid(&[0x01])).unwrap();
        assert_eq!(stored.address, PeerAddr::new("10.0.0.2", 2222));
        // reinsertion lands at the most-recently-seen position
        let index = table.tree().kbucket_index(tid(&[0x01])).unwrap();
        let ids: Vec<_> = table.tree().buckets()[index].contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x02]), tid(&[0x01])]);
    }

    #[tokio::test]
    async fn rebind_in_full_bucket_goes_through_cache() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &NoPinger).await;
        table.add_contact(peer(&[0x03]), &NoPinger).await.unwrap();

        let mut rebound = peer(&[0x01]);
        rebound.address = PeerAddr::new("10.0.0.2", 2222);
        let outcome = table.add_contact(rebound, &NoPinger).await.unwrap();
        // the stale entry left, the queued candidate took its slot and the
        // rebound contact itself ended up queued
        assert_eq!(outcome, AddOutcome::Cached);
        let index = table.tree().kbucket_index(tid(&[0x01])).unwrap();
        let bucket = &table.tree().buckets()[index];
        let ids: Vec<_> = bucket.contacts.iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![tid(&[0x02]), tid(&[0x03])]);
        let cached: Vec<_> = bucket.replacement_cache.iter().map(|x| x.id).collect();
        assert_eq!(cached, vec![tid(&[0x01])]);
        assert_eq!(
            bucket.replacement_cache[0].address,
            PeerAddr::new("10.0.0.2", 2222)
        );
    }

    #[tokio::test]
    async fn same_address_readd_is_a_refresh() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        table.add_contact(peer(&[0x01]), &NoPinger).await.unwrap();
        let outcome = table.add_contact(peer(&[0x01]), &NoPinger).await.unwrap();
        assert_eq!(outcome, AddOutcome::Refreshed);
        assert_eq!(table.tree().contact_count(), 1);
    }

    #[tokio::test]
    async fn failed_rpc_counter_resets_on_insertion() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        let mut contact = peer(&[0x01]);
        contact.failed_rpcs = 9;
        table.add_contact(contact, &NoPinger).await.unwrap();
        assert_eq!(table.get_contact(tid(&[0x01])).unwrap().failed_rpcs, 0);
    }

    #[tokio::test]
    async fn close_nodes_ignore_requested_count() {
        let mut table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        full_low_bucket(&mut table, &NoPinger).await;
        // the count argument does not bound the result, the configured
        // bucket size does
        let found = table.find_close_nodes(tid(&[0x01]), 1, None).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn lookup_of_unknown_contact_fails() {
        let table = CachedRoutingTable::new(tid(&[0xc0]), config(2));
        assert!(matches!(table.get_contact(tid(&[0x42])), Err(Error::NotPresent(_))));
    }

    #[tokio::test]
    async fn random_churn_preserves_invariants() {
        let mut rng = StdRng::seed_from_u64(0x50c4);
        let parent: Id = rng.gen();
        let bucket_size = 4;
        let mut table = CachedRoutingTable::new(parent, config(bucket_size));
        let mut known: Vec<Id> = Vec::new();

        for round in 0..400 {
            let roll: u8 = rng.gen_range(0..100);
            if roll < 60 || known.is_empty() {
                let id: Id = rng.gen();
                let contact = Contact::new(id, PeerAddr::new("127.0.0.1", rng.gen()));
                table.add_contact(contact, &NoPinger).await.unwrap();
                known.push(id);
            } else if roll < 85 {
                let id = known[rng.gen_range(0..known.len())];
                table.remove_contact(id).unwrap();
            } else {
                // rebind of a previously seen peer
                let id = known[rng.gen_range(0..known.len())];
                let contact = Contact::new(id, PeerAddr::new("10.9.8.7", rng.gen()));
                table.add_contact(contact, &NoPinger).await.unwrap();
            }

            if round % 20 == 0 {
                assert_invariants(&table, parent, bucket_size);
            }
        }
        assert_invariants(&table, parent, bucket_size);

        // a lookup returns the full bucket size while enough contacts remain
        let stored = table.tree().contact_count();
        let target: Id = rng.gen();
        let found = table.find_close_nodes(target, 0, None).unwrap();
        assert_eq!(found.len(), stored.min(bucket_size));
    }

    fn assert_invariants<C: Clock>(table: &CachedRoutingTable<C>, parent: Id, bucket_size: usize) {
        let buckets = table.tree().buckets();
        assert_eq!(buckets[0].range_min(), Id::ZERO);
        assert_eq!(buckets[buckets.len() - 1].range_max(), Id::MAX);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].range_max().wrapping_add(Id::ONE), pair[1].range_min());
        }
        let mut seen = HashSet::new();
        for bucket in buckets {
            assert!(bucket.contacts.len() <= bucket_size);
            assert!(bucket.replacement_cache.len() <= bucket_size);
            for contact in &bucket.contacts {
                assert!(bucket.key_in_range(contact.id));
                assert_ne!(contact.id, parent);
                assert!(seen.insert(contact.id), "duplicate contact across buckets");
            }
            for contact in &bucket.replacement_cache {
                assert!(bucket.key_in_range(contact.id));
                assert_ne!(contact.id, parent);
                assert!(!bucket.contacts.contains(contact), "queued copy of a stored contact");
            }
        }
    }
}
