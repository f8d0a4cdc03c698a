//! # Heartbeat Example
//!
//! Drives one node and one application through the core with short timeouts:
//! - `node-1` registers and heartbeats, reporting container `c1` as running (launch)
//! - container `c2` is allocated but never reported, so its allocation expires
//! - heartbeats stop, `node-1` is declared lost and `c1` is released with it
//!
//! ## Run
//! ```bash
//! cargo run --example heartbeat
//! ```

use std::{
    collections::BTreeMap,
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use rmvisor::{
    AppId, Config, ContainerStatus, LogWriter, NodeHealthStatus, NodeStatusEvent, Notice,
    NoticeKind, Resource, ResourceManager, ResponseId, SchedulerEvent, Subscribe,
};

#[derive(Default)]
struct Tally {
    launched: AtomicU64,
    released: AtomicU64,
    expired: AtomicU64,
    lost: AtomicU64,
}

impl Tally {
    fn print(&self) {
        println!();
        println!("Notices:");
        println!(" ├─► Launched:  {}", self.launched.load(Ordering::Relaxed));
        println!(" ├─► Released:  {}", self.released.load(Ordering::Relaxed));
        println!(" ├─► Expired:   {}", self.expired.load(Ordering::Relaxed));
        println!(" └─► Nodes lost: {}", self.lost.load(Ordering::Relaxed));
    }
}

#[async_trait::async_trait]
impl Subscribe for Tally {
    async fn on_notice(&self, n: &Notice) {
        let counter = match n.kind {
            NoticeKind::ContainerLaunched => &self.launched,
            NoticeKind::ContainerReleased => &self.released,
            NoticeKind::ContainerExpired => &self.expired,
            NoticeKind::NodeLost => &self.lost,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
    fn name(&self) -> &'static str {
        "tally"
    }
}

fn heartbeat(token: u64, app: &AppId) -> SchedulerEvent {
    let mut containers = BTreeMap::new();
    containers.insert(app.clone(), vec![ContainerStatus::running("c1")]);
    SchedulerEvent::node_update(NodeStatusEvent::new(
        "node-1".into(),
        NodeHealthStatus::healthy(),
        containers,
        ResponseId(token),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rmvisor::telemetry::init_tracing("info");

    let cfg = Config {
        node_expiry: Duration::from_secs(3),
        container_expiry: Duration::from_secs(2),
        monitor_interval: Duration::from_millis(500),
        grace: Duration::from_secs(5),
        ..Config::default()
    };
    let tally = Arc::new(Tally::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), tally.clone()];

    let rm = ResourceManager::builder(cfg).with_subscribers(subs).build()?;
    rm.start()?;

    let app = rm.new_application().app_id;
    rm.dispatch(SchedulerEvent::node_added("node-1"))?;
    rm.dispatch(SchedulerEvent::app_added(app.clone()))?;
    rm.drained().await?;

    rm.apps().accept(&app).await?;
    let size = Resource::new(1024, 1);
    rm.apps()
        .allocate(&app, "c1".into(), "node-1".into(), size)
        .await?;
    rm.apps()
        .allocate(&app, "c2".into(), "node-1".into(), size)
        .await?;

    for token in 1..=4 {
        rm.dispatch(heartbeat(token, &app))?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    println!("available after expiry: {}", rm.pool().available());

    tokio::time::sleep(Duration::from_secs(4)).await;
    rm.drained().await?;
    println!(
        "node-1 state: {:?}",
        rm.nodes().state(&"node-1".into()).await
    );
    println!("available after node loss: {}", rm.pool().available());

    rm.shutdown().await?;
    tally.print();
    Ok(())
}
