#![allow(dead_code)]

use futures::{Stream, stream};
use model::{
    core::{
        data_type::DataType,
        table::{ColumnKind, ColumnMetadata, TableMetadata},
    },
    records::{
        external::ExternalValue,
        record::{Record, SourceLocator},
    },
};
use serde_json::{Value as JsonValue, json};
use std::{fs, path::Path};

pub const IP_BY_COUNTRY_RESOURCE: &str = "ip-by-country-sample.json";

/// Countries of the sample, six consecutive ranges each.
const COUNTRIES: [(&str, &str); 4] = [
    ("AU", "Australia"),
    ("CN", "China"),
    ("JP", "Japan"),
    ("TH", "Thailand"),
];

/// `geo.ip_by_country`: partitioned by country, clustered by range start.
pub fn ip_by_country_table() -> TableMetadata {
    TableMetadata::new("geo", "ip_by_country")
        .column(ColumnMetadata::new(
            "country_code",
            DataType::Text,
            ColumnKind::PartitionKey,
        ))
        .column(ColumnMetadata::new(
            "beginning_ip_address",
            DataType::Inet,
            ColumnKind::Clustering,
        ))
        .column(ColumnMetadata::new(
            "ending_ip_address",
            DataType::Inet,
            ColumnKind::Regular,
        ))
        .column(ColumnMetadata::new(
            "beginning_ip_number",
            DataType::BigInt,
            ColumnKind::Regular,
        ))
        .column(ColumnMetadata::new(
            "ending_ip_number",
            DataType::BigInt,
            ColumnKind::Regular,
        ))
        .column(ColumnMetadata::new(
            "country_name",
            DataType::Text,
            ColumnKind::Regular,
        ))
}

/// The 24 well-formed sample documents, grouped by country.
pub fn ip_by_country_docs() -> Vec<JsonValue> {
    (0..24u64)
        .map(|i| {
            let (code, name) = COUNTRIES[(i / 6) as usize];
            let begin = 16_777_216 + i * 256;
            let end = begin + 255;
            json!({
                "beginning_ip_address": ipv4(begin),
                "ending_ip_address": ipv4(end),
                "beginning_ip_number": begin,
                "ending_ip_number": end,
                "country_code": code,
                "country_name": name,
            })
        })
        .collect()
}

/// Sample documents where each position in `malformed` has an unparsable
/// `beginning_ip_number`.
pub fn ip_by_country_docs_with_malformed(malformed: &[usize]) -> Vec<JsonValue> {
    let mut docs = ip_by_country_docs();
    for &i in malformed {
        docs[i]["beginning_ip_number"] = json!("not-a-number");
    }
    docs
}

/// Turns documents into records as a JSON connector would: one record per
/// document, positions starting at 1.
pub fn json_records(docs: Vec<JsonValue>) -> Vec<Record> {
    docs.into_iter()
        .enumerate()
        .map(|(i, doc)| {
            let source = doc.to_string();
            let fields = match doc {
                JsonValue::Object(map) => map.into_iter().collect::<Vec<_>>(),
                other => vec![("value".to_string(), other)],
            };
            Record::named(
                SourceLocator::new(IP_BY_COUNTRY_RESOURCE, i as u64 + 1),
                fields.into_iter().map(|(k, v)| (k, ExternalValue::Json(v))),
            )
            .with_source(source)
        })
        .collect()
}

pub fn record_stream(records: Vec<Record>) -> impl Stream<Item = Record> + Send {
    stream::iter(records)
}

/// Entries of a text quarantine log, one per failed record.
pub fn quarantine_entries(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .split("\n\n")
            .filter(|e| !e.trim().is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn ipv4(n: u64) -> String {
    format!(
        "{}.{}.{}.{}",
        (n >> 24) & 0xff,
        (n >> 16) & 0xff,
        (n >> 8) & 0xff,
        n & 0xff
    )
}
