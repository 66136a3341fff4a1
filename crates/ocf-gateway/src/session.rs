//! Per-connection session state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use coap_lite::Packet;
use ocf_gateway_coap::{ClientCommander, NotificationSink, Observation};
use ocf_gateway_pb::resources::AuthorizationContext;
use tracing::{debug, error, info};

use crate::config::KeepaliveConfig;
use crate::keepalive::Keepalive;
use crate::model::ResourceLink;

/// A published resource together with its observation handle; the handle is
/// absent for resources that do not advertise observability, and for
/// observable ones whose registration failed (a later re-publish retries).
struct ObservedResource {
    link: ResourceLink,
    observation: Option<Observation>,
}

/// State of one device connection: the authorization context established at
/// sign-in and the table of observed resources built up by publishes.
///
/// The two mutexes are independent: the observed-resource lock may be held
/// across observation open/cancel (both are queue writes, never awaited),
/// the authorization lock only ever guards a field copy.
pub struct Session {
    commander: ClientCommander,
    keepalive: Keepalive,
    observed: Mutex<HashMap<String, HashMap<i64, ObservedResource>>>,
    auth_context: Mutex<Option<AuthorizationContext>>,
}

impl Session {
    pub(crate) fn new(commander: ClientCommander, keepalive: KeepaliveConfig) -> Arc<Self> {
        info!(peer = %commander.remote_addr(), "new session");
        Arc::new(Self {
            keepalive: Keepalive::spawn(commander.clone(), keepalive),
            commander,
            observed: Mutex::new(HashMap::new()),
            auth_context: Mutex::new(None),
        })
    }

    /// The connection this session belongs to.
    pub fn commander(&self) -> &ClientCommander {
        &self.commander
    }

    /// Track a published resource and open its observation.
    ///
    /// Re-publishing an already-tracked `(device, instance)` pair is a no-op,
    /// so duplicate publishes never double-observe. Observation failures are
    /// logged and leave the resource tracked without a handle.
    pub fn observe_resource(&self, link: &ResourceLink) {
        let mut table = self.observed.lock().expect("observed mutex poisoned");
        let device = table.entry(link.device_id.clone()).or_default();
        if device.contains_key(&link.instance_id) {
            debug!(
                "resource ocf://{}{} already published, nothing to do",
                link.device_id, link.href
            );
            return;
        }

        let observable = link.is_observable();
        info!(
            "adding published resource ocf://{}{}, observable: {}",
            link.device_id, link.href, observable
        );
        let observation = if observable {
            let device_id = link.device_id.clone();
            let href = link.href.clone();
            let sink: NotificationSink =
                Arc::new(move |packet| forward_notification(&device_id, &href, &packet));
            match self.commander.observe(&link.href, sink) {
                Ok(observation) => Some(observation),
                Err(err) => {
                    error!("cannot observe ocf://{}{}: {err}", link.device_id, link.href);
                    None
                }
            }
        } else {
            let commander = self.commander.clone();
            let device_id = link.device_id.clone();
            let href = link.href.clone();
            tokio::spawn(async move {
                match commander.get(&href).await {
                    Ok(packet) => forward_notification(&device_id, &href, &packet),
                    Err(err) => error!("cannot get ocf://{device_id}{href}: {err}"),
                }
            });
            None
        };

        device.insert(
            link.instance_id,
            ObservedResource {
                link: link.clone(),
                observation,
            },
        );
    }

    /// Tracked resources of `device_id` matching `instance_ids`.
    ///
    /// An empty id list matches nothing; bulk device-wide queries are not
    /// part of this surface.
    pub fn get_observed_resources(&self, device_id: &str, instance_ids: &[i64]) -> Vec<ResourceLink> {
        if instance_ids.is_empty() {
            return Vec::new();
        }
        let table = self.observed.lock().expect("observed mutex poisoned");
        let Some(device) = table.get(device_id) else {
            return Vec::new();
        };
        instance_ids
            .iter()
            .filter_map(|instance_id| device.get(instance_id))
            .map(|entry| entry.link.clone())
            .collect()
    }

    /// Cancel observations for `links` and drop the table entries whose
    /// resource id maps to `true` in `unpublished`. Entries whose unpublish
    /// RPC failed stay tracked (handle-less) for a later retry; session
    /// close sweeps whatever remains.
    pub fn unobserve_resources(&self, links: &[ResourceLink], unpublished: &HashMap<String, bool>) {
        let mut table = self.observed.lock().expect("observed mutex poisoned");
        for link in links {
            let mut device_empty = false;
            if let Some(device) = table.get_mut(&link.device_id) {
                if let Some(entry) = device.get_mut(&link.instance_id) {
                    if let Some(observation) = entry.observation.take() {
                        if observation.cancel().is_err() {
                            error!(
                                "cannot cancel observation ocf://{}{}",
                                link.device_id, link.href
                            );
                        }
                    }
                    if unpublished.get(&link.id).copied().unwrap_or(false) {
                        debug!(
                            "removing published resource ocf://{}{}",
                            link.device_id, link.href
                        );
                        device.remove(&link.instance_id);
                    }
                }
                device_empty = device.is_empty();
            }
            if device_empty {
                table.remove(&link.device_id);
            }
        }
    }

    /// Store the authorization context established at sign-in.
    pub fn store_authorization_context(&self, context: AuthorizationContext) {
        info!(
            peer = %self.commander.remote_addr(),
            device = %context.device_id,
            user = %context.user_id,
            "authorization context stored"
        );
        *self.auth_context.lock().expect("auth context mutex poisoned") = Some(context);
    }

    /// The stored authorization context, or an empty one before sign-in.
    pub fn load_authorization_context(&self) -> AuthorizationContext {
        self.auth_context
            .lock()
            .expect("auth context mutex poisoned")
            .clone()
            .unwrap_or_default()
    }

    /// Number of tracked resources across all devices.
    pub fn observed_resource_count(&self) -> usize {
        self.observed
            .lock()
            .expect("observed mutex poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Tear the session down: stop keepalive, cancel every observation,
    /// clear the table.
    pub fn close(&self) {
        info!(peer = %self.commander.remote_addr(), "close session");
        self.keepalive.stop();
        let mut table = self.observed.lock().expect("observed mutex poisoned");
        for (device_id, device) in table.iter_mut() {
            for entry in device.values_mut() {
                if let Some(observation) = entry.observation.take() {
                    if observation.cancel().is_err() {
                        error!(
                            "cannot cancel observation ocf://{}{}",
                            device_id, entry.link.href
                        );
                    }
                }
            }
        }
        table.clear();
    }
}

/// Inbound notification sink. The forwarding pipeline to the back-end is a
/// separate collaborator; at this layer the notification is only accounted
/// for.
fn forward_notification(device_id: &str, href: &str, packet: &Packet) {
    debug!(
        "notification from ocf://{device_id}{href}: {} payload bytes",
        packet.payload.len()
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ocf_gateway_coap::{attach_stream, NoSessionEvents, ServeMux};
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;
    use crate::model::Policy;

    fn keepalive_config() -> KeepaliveConfig {
        KeepaliveConfig {
            time: Duration::from_secs(3600),
            interval: Duration::from_secs(5),
            retry: 5,
        }
    }

    fn test_session() -> (Arc<Session>, DuplexStream) {
        let (local, remote) = tokio::io::duplex(16 * 1024);
        let commander = attach_stream(
            local,
            "127.0.0.1:41001".parse().unwrap(),
            Arc::new(ServeMux::new()),
            Arc::new(NoSessionEvents),
        );
        (Session::new(commander, keepalive_config()), remote)
    }

    fn observable_link(device_id: &str, href: &str, instance_id: i64) -> ResourceLink {
        ResourceLink {
            device_id: device_id.into(),
            href: href.into(),
            id: crate::model::resource_id(device_id, href),
            instance_id,
            policies: Some(Policy { bit_flags: 2 }),
            ..Default::default()
        }
    }

    async fn drain_one_frame(remote: &mut DuplexStream) {
        let mut chunk = [0u8; 1024];
        let n = remote.read(&mut chunk).await.unwrap();
        assert!(n > 0);
    }

    #[tokio::test]
    async fn duplicate_publish_is_idempotent() {
        let (session, mut remote) = test_session();
        let link = observable_link("a", "/a", 1);
        session.observe_resource(&link);
        session.observe_resource(&link);
        assert_eq!(session.observed_resource_count(), 1);

        // exactly one observe registration reaches the device
        drain_one_frame(&mut remote).await;
        let quiet = tokio::time::timeout(Duration::from_millis(50), async {
            let mut chunk = [0u8; 64];
            let _ = remote.read(&mut chunk).await;
        })
        .await;
        assert!(quiet.is_err(), "unexpected second registration on the wire");
    }

    #[tokio::test]
    async fn empty_instance_id_query_is_a_no_op() {
        let (session, _remote) = test_session();
        session.observe_resource(&observable_link("a", "/a", 1));
        session.observe_resource(&observable_link("a", "/b", 2));

        assert!(session.get_observed_resources("a", &[]).is_empty());
        let matched = session.get_observed_resources("a", &[2]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].href, "/b");
        assert!(session.get_observed_resources("other", &[1]).is_empty());
    }

    #[tokio::test]
    async fn failed_unpublish_keeps_the_entry() {
        let (session, _remote) = test_session();
        let kept = observable_link("a", "/a", 1);
        let dropped = observable_link("a", "/b", 2);
        session.observe_resource(&kept);
        session.observe_resource(&dropped);

        let mut unpublished = HashMap::new();
        unpublished.insert(kept.id.clone(), false);
        unpublished.insert(dropped.id.clone(), true);
        session.unobserve_resources(&[kept.clone(), dropped], &unpublished);

        assert_eq!(session.observed_resource_count(), 1);
        let remaining = session.get_observed_resources("a", &[1]);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].href, "/a");
    }

    #[tokio::test]
    async fn unpublishing_the_last_resource_prunes_the_device() {
        let (session, _remote) = test_session();
        let link = observable_link("a", "/a", 1);
        session.observe_resource(&link);

        let mut unpublished = HashMap::new();
        unpublished.insert(link.id.clone(), true);
        session.unobserve_resources(&[link], &unpublished);

        assert_eq!(session.observed_resource_count(), 0);
    }

    #[tokio::test]
    async fn close_cancels_every_observation() {
        let (session, _remote) = test_session();
        session.observe_resource(&observable_link("a", "/a", 1));
        session.observe_resource(&observable_link("b", "/b", 2));
        assert_eq!(session.observed_resource_count(), 2);

        session.close();
        assert_eq!(session.observed_resource_count(), 0);
    }

    #[tokio::test]
    async fn authorization_context_roundtrip() {
        let (session, _remote) = test_session();
        assert_eq!(session.load_authorization_context(), AuthorizationContext::default());

        let context = AuthorizationContext {
            access_token: "token".into(),
            device_id: "a".into(),
            user_id: "u".into(),
        };
        session.store_authorization_context(context.clone());
        assert_eq!(session.load_authorization_context(), context);
    }
}
