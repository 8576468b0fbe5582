//! Connectivity probe for the session backends.
//!
//! In sentinel mode it pings each Sentinel address individually, resolves
//! the master through the quorum, and runs a SET/GET/TTL/DEL round trip
//! against it. In single-instance mode it does the same against one Redis
//! endpoint.
//!
//! ```text
//! cargo run --example backend_probe -- --redis-addr redis://127.0.0.1:6379
//! cargo run --example backend_probe -- --sentinel-mode \
//!     --master-name mymaster \
//!     --sentinel-addrs redis://10.0.0.1:26379,redis://10.0.0.2:26379
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use redis_http_sessions::{RedisBackend, SentinelBackend, SessionBackend};

#[derive(Parser, Debug)]
#[command(name = "backend_probe", about = "Ping and exercise a session backend")]
struct Args {
    #[arg(long)]
    sentinel_mode: bool,

    /// Redis address, ignored in sentinel mode.
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_addr: String,

    /// Redis Sentinel master name.
    #[arg(long, default_value = "mymaster")]
    master_name: String,

    /// Sentinel failover addresses.
    #[arg(long, value_delimiter = ',', default_value = "redis://127.0.0.1:26379")]
    sentinel_addrs: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let backend: Arc<dyn SessionBackend> = if args.sentinel_mode {
        println!("step 1: ping each sentinel separately...");
        for addr in &args.sentinel_addrs {
            match ping(addr).await {
                Ok(pong) => println!("  {addr} -> {pong}"),
                Err(err) => println!("  {addr} -> error: {err}"),
            }
        }

        println!("step 2: resolve master {:?} through the quorum...", args.master_name);
        Arc::new(
            SentinelBackend::connect(args.sentinel_addrs.clone(), &args.master_name)
                .context("building sentinel client")?,
        )
    } else {
        println!("step 1: connect to {}...", args.redis_addr);
        Arc::new(
            RedisBackend::connect(&args.redis_addr)
                .await
                .context("connecting to redis")?,
        )
    };

    println!("step 3: simple actions...");
    backend
        .set("probe_key", b"value", 60)
        .await
        .context("SET probe_key")?;

    let value = backend.get("probe_key").await.context("GET probe_key")?;
    println!(
        "  probe_key = {:?}",
        value.as_deref().map(String::from_utf8_lossy)
    );

    let ttl = backend.ttl("probe_key").await.context("TTL probe_key")?;
    println!("  probe_key ttl = {ttl:?}");

    let missing = backend.get("probe_key2").await.context("GET probe_key2")?;
    if missing.is_none() {
        println!("  probe_key2 does not exist");
    }

    backend.delete("probe_key").await.context("DEL probe_key")?;
    println!("  probe_key deleted");

    Ok(())
}

async fn ping(addr: &str) -> anyhow::Result<String> {
    let client = redis::Client::open(addr).context("parsing address")?;
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .context("connecting")?;
    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("pinging")?;
    Ok(pong)
}
