use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use factory_dashboard::config::Config;
use factory_dashboard::data::load_table;
use factory_dashboard::dispatch::{self, Dispatcher, ScatterSelection};
use factory_dashboard::logging::{self, obj, v_int, v_str, Domain, Level};
use factory_dashboard::prepare::prepare;
use factory_dashboard::resolver::ViewResolver;
use factory_dashboard::server;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    if cfg.debug {
        logging::set_min_level(Level::Debug);
    }
    cfg.validate()?;

    let (raw, report) = load_table(Path::new(&cfg.dataset_path), cfg.delimiter)
        .with_context(|| format!("loading {}", cfg.dataset_path))?;
    logging::info(
        Domain::Data,
        "data.loaded",
        obj(&[
            ("path", v_str(&cfg.dataset_path)),
            ("rows", v_int(report.rows)),
            ("bad_rows", v_int(report.bad_rows)),
        ]),
    );
    for warning in report.warnings.iter().take(20) {
        logging::warn(Domain::Data, "data.warning", obj(&[("msg", v_str(warning))]));
    }

    let dataset = match prepare(&raw, cfg.window) {
        Ok(ds) => Arc::new(ds),
        Err(err) => {
            logging::error(Domain::System, "startup.failed", obj(&[("msg", v_str(&err.to_string()))]));
            return Err(err.into());
        }
    };
    let resolver = ViewResolver::new(dataset);
    let dispatcher = Dispatcher::new(resolver, ScatterSelection::new(&cfg.scatter_x, &cfg.scatter_y))
        .context("default scatter pair")?;
    let handle = dispatch::spawn(dispatcher, cfg.dispatch_capacity);

    let listener = TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr()))?;
    logging::info(
        Domain::System,
        "startup.serving",
        obj(&[
            ("addr", v_str(&cfg.listen_addr())),
            ("columns", v_int(handle.resolver().registry().len() as u64)),
            ("prepared_at", v_str(&handle.resolver().dataset().prepared_at().to_rfc3339())),
            ("debug", serde_json::Value::Bool(cfg.debug)),
        ]),
    );

    server::serve(listener, handle).await;
    Ok(())
}
