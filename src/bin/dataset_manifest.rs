use factory_dashboard::config::Config;
use factory_dashboard::data::{analyze_dataset, default_manifest_path, REQUIRED_COLUMNS};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let cfg = Config::from_env();
    let path = PathBuf::from(env::args().nth(1).unwrap_or(cfg.dataset_path));

    let now_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let manifest = match analyze_dataset(&path, cfg.delimiter, now_ts) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {}", err);
            std::process::exit(1);
        }
    };

    if !manifest.missing_required.is_empty() {
        eprintln!("schema mismatch: missing {:?}", manifest.missing_required);
        eprintln!("required columns: {:?}", REQUIRED_COLUMNS);
        std::process::exit(2);
    }

    let out_path = default_manifest_path(&path);
    let payload = match serde_json::to_string_pretty(&manifest) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(3);
        }
    };
    if let Err(err) = fs::write(&out_path, payload) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("wrote manifest {} ({} rows, {} bad)", out_path.display(), manifest.row_count, manifest.bad_rows);
}
