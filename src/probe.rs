use std::cmp::Ordering;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::rest::TclRestClient;
use crate::storage::{ProbeData, RnProbeData};
use crate::types::ConfigRecord;
use crate::{Error, Result};

const BUNDLE_SUFFIX: &str = "main.jsbundle";

static MAP_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)new Map\(\[(.*?)\]\)").expect("valid map literal pattern")
});

static FAN_SPEED_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]FAN_SPEED_([A-Z0-9_]+)['"]\s*,\s*(-?\d+)"#)
        .expect("valid fan speed pattern")
});

fn version_key(version: &str) -> Option<Vec<u64>> {
    if version.trim().is_empty() {
        return None;
    }
    version.trim().split('.').map(|p| p.parse().ok()).collect()
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (version_key(a), version_key(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

pub fn latest_record(records: &[ConfigRecord]) -> Option<&ConfigRecord> {
    records
        .iter()
        .filter(|r| !r.plug_in_url.is_empty())
        .max_by(|a, b| compare_versions(&a.plug_in_version, &b.plug_in_version))
}

pub fn bundle_text(archive: &[u8]) -> Result<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let name = zip
        .file_names()
        .find(|n| n.ends_with(BUNDLE_SUFFIX))
        .map(str::to_string)
        .ok_or_else(|| Error::Probe(format!("archive has no {BUNDLE_SUFFIX}")))?;
    let mut bytes = Vec::new();
    zip.by_name(&name)?.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Fan-speed tokens of the first map literal that has any, in source order,
/// without the `FAN_SPEED_` prefix.
pub fn fan_speed_tokens(bundle: &str) -> Option<Vec<String>> {
    MAP_LITERAL.captures_iter(bundle).find_map(|map| {
        let body = map.get(1)?.as_str();
        let tokens: Vec<String> = FAN_SPEED_ENTRY
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        (!tokens.is_empty()).then_some(tokens)
    })
}

/// Runs the whole probe for one product. Never fails: any problem yields an
/// unsuccessful record.
pub async fn run(
    rest: &TclRestClient,
    cloud_url: &str,
    saas_token: &str,
    product_key: &str,
    country_abbr: &str,
) -> RnProbeData {
    match try_run(rest, cloud_url, saas_token, product_key, country_abbr).await {
        Ok(tokens) => {
            debug!(product_key, ?tokens, "plug-in bundle probe succeeded");
            RnProbeData {
                is_success: true,
                data: ProbeData { fan_speed_mapping: tokens },
            }
        }
        Err(e) => {
            debug!(product_key, "plug-in bundle probe failed: {e}");
            RnProbeData::default()
        }
    }
}

async fn try_run(
    rest: &TclRestClient,
    cloud_url: &str,
    saas_token: &str,
    product_key: &str,
    country_abbr: &str,
) -> Result<Vec<String>> {
    let records = rest
        .get_rn_config(cloud_url, saas_token, product_key, country_abbr)
        .await?;
    let record = latest_record(&records)
        .ok_or_else(|| Error::Probe("no plug-in records".into()))?;
    debug!(version = %record.plug_in_version, url = %record.plug_in_url, "downloading plug-in bundle");
    let archive = rest.download(&record.plug_in_url).await?;
    let text = bundle_text(&archive)?;
    fan_speed_tokens(&text).ok_or_else(|| Error::Probe("no FAN_SPEED map in bundle".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(version: &str, url: &str) -> ConfigRecord {
        ConfigRecord {
            plug_in_version: version.into(),
            plug_in_url: url.into(),
            product_key: "pk".into(),
        }
    }

    #[test]
    fn highest_version_wins_numerically() {
        let records = vec![
            record("3.0.6", "a"),
            record("3.1.0", "b"),
            record("3.0.10", "c"),
            record("garbage", "d"),
        ];
        assert_eq!(latest_record(&records).unwrap().plug_in_url, "b");
        assert_eq!(compare_versions("3.0.10", "3.0.9"), Ordering::Greater);
        assert_eq!(compare_versions("", "0.0.1"), Ordering::Less);
    }

    #[test]
    fn tokens_from_first_fan_map() {
        let js = r#"var a = new Map([['OTHER', 1]]); var b = new Map([['FAN_SPEED_AUTO',0],["FAN_SPEED_LOW", 1],['FAN_SPEED_MED',2],['FAN_SPEED_HIGH',3]]); var c = new Map([['FAN_SPEED_TURBO',9]]);"#;
        assert_eq!(
            fan_speed_tokens(js).unwrap(),
            vec!["AUTO", "LOW", "MED", "HIGH"]
        );
        assert!(fan_speed_tokens("new Map([['X',1]])").is_none());
    }

    #[test]
    fn bundle_member_is_found_by_suffix() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file("assets/readme.txt", opts).unwrap();
            zip.write_all(b"nothing").unwrap();
            zip.start_file("bundle/android/main.jsbundle", opts).unwrap();
            zip.write_all(b"new Map([['FAN_SPEED_LOW',1]])").unwrap();
            zip.finish().unwrap();
        }
        let text = bundle_text(buf.get_ref()).unwrap();
        assert_eq!(fan_speed_tokens(&text).unwrap(), vec!["LOW"]);
    }

    #[test]
    fn archive_without_bundle_is_an_error() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("x.txt", zip::write::SimpleFileOptions::default()).unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(bundle_text(buf.get_ref()), Err(Error::Probe(_))));
        assert!(bundle_text(b"not a zip").is_err());
    }
}
