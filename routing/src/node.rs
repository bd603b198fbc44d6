use std::future::Future;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use crate::config::SystemConfig;
use crate::contact::Contact;
use crate::error::Result;
use crate::id::Id;
use crate::table::{AddOutcome, RoutingTable};
use crate::transport::{Request, Response, TransportListener, TransportSender};

/// The owning side of a routing table.
///
/// Serializes every table mutation (including the suspension while a
/// liveness probe is in flight) behind a single async mutex, so the
/// table itself stays single-writer.
pub struct RoutingNode<T, R> {
    config: SystemConfig,
    id: Id,
    transport: T,
    table: Mutex<R>,
}

impl<T, R> RoutingNode<T, R>
where
    T: TransportSender + Sync,
    R: RoutingTable + Send,
{
    pub fn new(config: SystemConfig, id: Id, transport: T, table: R) -> Self {
        Self {
            config,
            id,
            transport,
            table: Mutex::new(table),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Feeds an observed peer into the table.
    #[instrument(skip_all, fields(market = %self.config.market_id, peer = %contact.id))]
    pub async fn observe(&self, contact: Contact) -> Result<AddOutcome> {
        let outcome = self
            .table
            .lock()
            .await
            .add_contact(contact, &self.transport)
            .await?;
        debug!(?outcome, "observed peer");
        Ok(outcome)
    }

    pub async fn forget(&self, id: Id) -> Result<bool> {
        self.table.lock().await.remove_contact(id)
    }

    pub async fn contact(&self, id: Id) -> Result<Contact> {
        self.table.lock().await.get_contact(id)
    }

    /// The closest known peers to `target`, nearest first.
    pub async fn closest(&self, target: Id, count: usize) -> Result<Vec<Contact>> {
        let mut found = self
            .table
            .lock()
            .await
            .find_close_nodes(target, count, None)?;
        found.sort_unstable_by_key(|x| target ^ x.id);
        Ok(found)
    }

    /// Random lookup targets for buckets that went quiet.
    pub async fn refresh_targets<RN: Rng>(
        &self,
        start_index: usize,
        force: bool,
        rng: &mut RN,
    ) -> Vec<String> {
        self.table
            .lock()
            .await
            .get_refresh_list(start_index, force, rng)
    }

    pub async fn touch(&self, id: Id) -> Result<()> {
        self.table.lock().await.touch_kbucket(id)
    }
}

impl<T, R> TransportListener for RoutingNode<T, R>
where
    T: TransportSender + Sync,
    R: RoutingTable + Send,
{
    fn on_connect(&self, contact: Contact) -> impl Future<Output = bool> + Send {
        async move {
            matches!(
                self.observe(contact).await,
                Ok(AddOutcome::Inserted | AddOutcome::Refreshed | AddOutcome::Evicted { .. })
            )
        }
    }

    fn on_disconnect(&self, id: Id) -> impl Future<Output = ()> + Send {
        async move {
            if let Err(err) = self.forget(id).await {
                error!(market = %self.config.market_id, %id, %err, "disconnect cleanup failed");
            }
        }
    }

    fn on_request(&self, sender: Id, request: Request) -> impl Future<Output = Response> + Send {
        async move {
            let mut table = self.table.lock().await;
            // A message from the sender counts as activity in its bucket.
            if let Err(err) = table.touch_kbucket(sender) {
                error!(market = %self.config.market_id, %sender, %err, "touch failed");
            }
            match request {
                Request::FindNodes(target) => {
                    let count = self.config.routing.bucket_size;
                    let found = table.find_close_nodes(target, count, Some(sender));
                    let mut found = match found {
                        Ok(x) => x,
                        Err(err) => {
                            error!(market = %self.config.market_id, %target, %err, "find nodes failed");
                            Vec::new()
                        }
                    };
                    found.sort_unstable_by_key(|x| target ^ x.id);
                    debug!(market = %self.config.market_id, %target, count = found.len(), "answered find nodes");
                    Response::FoundNodes(found)
                }
            }
        }
    }
}
