//! Ships a few events to SLS using a URL-configured sink.
//!
//! ```text
//! SLS_ACCESS_KEY_ID=... SLS_ACCESS_KEY_SECRET=... \
//! SLS_URL='sls://my-project/app-log?region=cn-hangzhou&app_name=demo' \
//! cargo run --example sls_url
//! ```

use tracing::{error, info, info_span, warn};
use tracing_sls_sink::{init_tracing, SinkRegistry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var("SLS_URL")
        .unwrap_or_else(|_| "sls://my-project/app-log?region=cn-hangzhou&flush_interval=1".to_string());

    let sink = SinkRegistry::with_defaults().build(&url)?;
    init_tracing(sink.clone())?;

    let span = info_span!("checkout");
    {
        let _guard = span.enter();
        info!(order_id = 1001, "order received");
        warn!(latency_ms = 870, "payment provider slow");
        error!(order_id = 1001, "payment error: card declined");
    }
    info!(target: "api", "GET /orders 200");

    sink.close();
    Ok(())
}
