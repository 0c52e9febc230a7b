//! TCP forwarding from translated host endpoints to containers.
//!
//! Under the loopback scheme a container at `10.10.0.x` is advertised as
//! `127.0.0.x`. The proxy makes that true by listening on
//! `127.0.0.x:<host port>` and forwarding each connection to
//! `10.10.0.x:<container port>`. Routes are re-planned from every new
//! snapshot; listeners for vanished routes are aborted along with their
//! open connections.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddrV4;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use berth_common::config::HostScheme;

use crate::registry::Snapshot;
use crate::translate::PortTranslator;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// One forwarded endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route {
    /// Host endpoint accepting connections.
    pub listen: SocketAddrV4,
    /// Container endpoint receiving them.
    pub target: SocketAddrV4,
}

/// Computes the routes a snapshot needs.
///
/// Only running containers with a bridge address are forwarded, and only
/// under the loopback scheme.
#[must_use]
pub fn plan(translator: &PortTranslator, snapshot: &Snapshot) -> Vec<Route> {
    if translator.scheme() != HostScheme::Loopback {
        return Vec::new();
    }
    let mut routes = BTreeSet::new();
    for container in snapshot.containers().filter(|c| c.is_running()) {
        let Some(address) = container.address.as_deref() else {
            continue;
        };
        for mapping in &container.ports {
            if let Some(target) = PortTranslator::container_endpoint(address, *mapping) {
                let _ = routes.insert(Route {
                    listen: translator.host_endpoint(address, *mapping),
                    target,
                });
            }
        }
    }
    routes.into_iter().collect()
}

/// Owns the listener tasks for the active routes.
#[derive(Debug)]
pub struct ProxyManager {
    translator: PortTranslator,
    listeners: Mutex<HashMap<Route, JoinHandle<()>>>,
}

impl ProxyManager {
    /// Creates a manager with no active routes.
    #[must_use]
    pub fn new(translator: PortTranslator) -> Self {
        Self {
            translator,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Re-plans routes from a snapshot and applies them.
    pub async fn sync(&self, snapshot: &Snapshot) {
        self.apply(plan(&self.translator, snapshot)).await;
    }

    /// Makes the active routes exactly `routes`.
    ///
    /// Routes whose listener cannot bind are logged and retried on the next
    /// call.
    pub async fn apply(&self, routes: Vec<Route>) {
        let wanted: BTreeSet<Route> = routes.into_iter().collect();
        let missing: Vec<Route> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|route, handle| {
                let keep = wanted.contains(route) && !handle.is_finished();
                if !keep {
                    handle.abort();
                    tracing::debug!(listen = %route.listen, target = %route.target, "route closed");
                }
                keep
            });
            wanted.iter().filter(|r| !listeners.contains_key(r)).copied().collect()
        };

        for route in missing {
            match TcpListener::bind(route.listen).await {
                Ok(listener) => {
                    tracing::info!(listen = %route.listen, target = %route.target, "route opened");
                    let handle = tokio::spawn(serve(listener, route.target));
                    if let Some(old) = self.listeners.lock().insert(route, handle) {
                        old.abort();
                    }
                }
                Err(e) => {
                    tracing::warn!(listen = %route.listen, error = %e, "cannot bind proxy listener");
                }
            }
        }
    }

    /// Currently active routes.
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.listeners.lock().keys().copied().collect();
        routes.sort();
        routes
    }

    /// Closes every listener and connection.
    pub fn shutdown(&self) {
        for (_, handle) in self.listeners.lock().drain() {
            handle.abort();
        }
    }
}

impl Drop for ProxyManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve(listener: TcpListener, target: SocketAddrV4) {
    serve_with(|| listener.accept(), target).await;
}

async fn serve_with<A, F>(mut accept: A, target: SocketAddrV4)
where
    A: FnMut() -> F,
    F: Future<Output = std::io::Result<(TcpStream, std::net::SocketAddr)>>,
{
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = accept() => match accepted {
                Ok((inbound, peer)) => {
                    let _ = connections.spawn(forward(inbound, target, peer));
                }
                Err(e) => {
                    tracing::warn!(target = %target, error = %e, "proxy accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn forward(mut inbound: TcpStream, target: SocketAddrV4, peer: std::net::SocketAddr) {
    let mut outbound = match TcpStream::connect(target).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(peer = %peer, target = %target, error = %e, "proxy connect failed");
            return;
        }
    };
    match tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await {
        Ok((up, down)) => tracing::trace!(peer = %peer, target = %target, up, down, "proxy connection closed"),
        Err(e) => tracing::debug!(peer = %peer, target = %target, error = %e, "proxy connection reset"),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use berth_common::types::{Container, ContainerId, ContainerStatus, PortMapping, Project};

    fn container(id: &str, address: Option<&str>, running: bool, ports: &[(u16, u16)]) -> Container {
        Container {
            id: ContainerId::new(id),
            name: id.into(),
            image: "nginx".into(),
            status: if running { ContainerStatus::Running } else { ContainerStatus::Stopped },
            address: address.map(str::to_owned),
            ports: ports.iter().map(|&(host, container)| PortMapping { host, container }).collect(),
            args: vec![],
            created: None,
            project: None,
            raw: serde_json::Value::Null,
        }
    }

    fn snapshot(containers: Vec<Container>) -> Snapshot {
        Snapshot {
            generation: 1,
            refreshed_at: None,
            projects: vec![Project {
                name: "default".into(),
                containers,
            }],
        }
    }

    #[test]
    fn plan_forwards_running_published_ports() {
        let snap = snapshot(vec![
            container("a", Some("10.10.0.2"), true, &[(8080, 80), (8443, 443)]),
            container("b", Some("10.10.0.3"), false, &[(9090, 90)]),
            container("c", None, true, &[(7070, 70)]),
        ]);
        let routes = plan(&PortTranslator::default(), &snap);
        assert_eq!(
            routes,
            vec![
                Route {
                    listen: SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 2), 8080),
                    target: SocketAddrV4::new(Ipv4Addr::new(10, 10, 0, 2), 80),
                },
                Route {
                    listen: SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 2), 8443),
                    target: SocketAddrV4::new(Ipv4Addr::new(10, 10, 0, 2), 443),
                },
            ]
        );
    }

    #[test]
    fn direct_scheme_needs_no_routes() {
        let snap = snapshot(vec![container("a", Some("10.10.0.2"), true, &[(8080, 80)])]);
        let translator = PortTranslator::new(HostScheme::Direct, [10, 10, 0], [127, 0, 0]);
        assert!(plan(&translator, &snap).is_empty());
    }

    async fn free_port() -> u16 {
        let scratch = TcpListener::bind("127.0.0.1:0").await.unwrap();
        scratch.local_addr().unwrap().port()
    }

    #[tokio::test(start_paused = true)]
    async fn failing_accept_backs_off() {
        let attempts = std::sync::atomic::AtomicUsize::new(0);
        let accept = || {
            let _ = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            std::future::ready::<std::io::Result<(TcpStream, std::net::SocketAddr)>>(Err(
                std::io::Error::other("too many open files"),
            ))
        };
        let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9);
        let _ = tokio::time::timeout(Duration::from_secs(1), serve_with(accept, target)).await;

        let attempts = attempts.load(std::sync::atomic::Ordering::SeqCst);
        assert!((10..=11).contains(&attempts), "{attempts} accept attempts");
    }

    #[tokio::test]
    async fn applied_route_forwards_bytes_and_can_be_withdrawn() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let std::net::SocketAddr::V4(target) = upstream.local_addr().unwrap() else {
            panic!("expected ipv4");
        };
        let _echo = tokio::spawn(async move {
            loop {
                let (mut sock, _) = upstream.accept().await.unwrap();
                let _ = tokio::spawn(async move {
                    let mut buf = [0u8; 64];
                    let n = sock.read(&mut buf).await.unwrap();
                    sock.write_all(&buf[..n]).await.unwrap();
                });
            }
        });

        let listen = SocketAddrV4::new(Ipv4Addr::LOCALHOST, free_port().await);
        let route = Route { listen, target };
        let proxy = ProxyManager::new(PortTranslator::default());
        proxy.apply(vec![route]).await;
        assert_eq!(proxy.routes(), vec![route]);

        let mut client = TcpStream::connect(listen).await.unwrap();
        client.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ping");

        proxy.apply(Vec::new()).await;
        assert!(proxy.routes().is_empty());
    }
}
