use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

use tracing_sls_sink::init::{init_tracing_with_config, LayerConfig};
use tracing_sls_sink::noop::NoopClient;
use tracing_sls_sink::{SinkConfig, SlsSink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SinkConfig::builder("load-project", "load-logstore", "cn-hangzhou")
        .access_key_id("noop")
        .access_key_secret("noop")
        .batch_size(1_000)
        .flush_interval(Duration::from_millis(200))
        .auto_detect_host_ip(false)
        .build()?;
    let sink = Arc::new(SlsSink::with_client(config, Arc::new(NoopClient))?);

    init_tracing_with_config(
        sink.clone(),
        LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        },
    )?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "handled {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sink.close();
    println!("{:?}", sink.stats());
    Ok(())
}
