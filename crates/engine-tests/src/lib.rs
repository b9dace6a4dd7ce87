#![allow(dead_code)]

use engine_config::settings::{LoaderSettings, validated::ValidatedSettings};
use engine_core::memory::MemorySession;
use serde_json::json;
use std::{path::Path, sync::Arc};

pub mod integration;
pub mod utils;

/// A fresh in-memory store holding the empty `geo.ip_by_country` table.
fn memory_store() -> Arc<MemorySession> {
    Arc::new(MemorySession::new().with_table(utils::ip_by_country_table()))
}

/// Run settings targeting `geo.ip_by_country`, with quarantine files under
/// `log_dir`. `overrides` is merged section by section over the defaults.
fn settings(log_dir: &Path, overrides: serde_json::Value) -> ValidatedSettings {
    let mut doc = json!({
        "schema": {"keyspace": "geo", "table": "ip_by_country"},
        "executor": {"base_delay_ms": 0, "max_delay_ms": 0},
        "log": {"directory": log_dir},
        "monitoring": {"report_interval_ms": 50}
    });
    merge(&mut doc, overrides);
    LoaderSettings::from_json_str(&doc.to_string())
        .expect("parse settings")
        .validate()
        .expect("valid settings")
}

fn merge(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge(base.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (base, value) => *base = value,
    }
}
