//! Beacon URL encoding and decoding.
//!
//! A ping is a GET of `https://<host>/v1/<bucket>/ping.gif?<query>`. The
//! query carries a few fixed platform constants followed by the session's
//! identity and progress fields. Fields that are not set are omitted.

use std::fmt::Display;
use std::str::FromStr;

use reqwest::Url;

use pltx_core::{Bucket, CorrelationId, DomainError, DomainResult, EventCode, Identity, PingParams};

/// Collector host used when none is configured.
pub const DEFAULT_COLLECTOR_HOST: &str = "ihe.jwpltx.com";

/// Fixed leading parameters: schema (`pss`), platform (`oos`, `oosv`), SDK flag.
const FIXED_PARAMS: [(&str, &str); 4] = [("pss", "1"), ("oos", "Web"), ("oosv", "5"), ("sdk", "0")];

/// Base URL (no query) for a bucket on the given collector host.
pub fn collector_url(host: &str, bucket: Bucket) -> String {
    format!("https://{host}/v1/{bucket}/ping.gif")
}

/// Query pairs for a ping, in wire order.
pub fn encode_query(ping: &PingParams) -> Vec<(&'static str, String)> {
    let mut pairs: Vec<(&'static str, String)> = FIXED_PARAMS
        .iter()
        .map(|(key, value)| (*key, (*value).to_string()))
        .collect();

    let identity = &ping.identity;
    let optional = [
        ("aid", &identity.account_id),
        ("bun", &identity.bundle_id),
        ("fed", &identity.feed_id),
        ("id", &identity.media_id),
        ("t", &identity.title),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            pairs.push((key, value.clone()));
        }
    }

    pairs.push(("emi", ping.session_id.to_string()));
    pairs.push(("pli", ping.play_session_id.to_string()));
    pairs.push(("e", ping.event.to_string()));
    pairs.push(("sa", ping.sent_at.to_string()));

    if let Some(vd) = ping.duration {
        pairs.push(("vd", vd.to_string()));
    }
    if let Some(q) = ping.quantiles {
        pairs.push(("q", q.to_string()));
    }
    if let Some(pw) = ping.progress_watched {
        pairs.push(("pw", pw.to_string()));
    }
    if let Some(ti) = ping.time_watched {
        pairs.push(("ti", ti.to_string()));
    }

    pairs
}

/// Full beacon URL for a ping, routed to the bucket of its event type.
///
/// Values are form-urlencoded, so a space goes out as `+` rather than
/// `%20`. Collectors decode both to the same value.
///
/// # Errors
///
/// Returns `DomainError::InvalidFieldValue` if the host does not form a
/// valid URL.
pub fn beacon_url(host: &str, ping: &PingParams) -> DomainResult<Url> {
    let base = collector_url(host, ping.event.bucket());
    Url::parse_with_params(&base, encode_query(ping)).map_err(|e| DomainError::InvalidFieldValue {
        field: "collector host".to_string(),
        value: host.to_string(),
        expected: format!("a host name usable in a URL ({e})"),
    })
}

/// Recovers the bucket and ping parameters from a beacon URL.
///
/// # Errors
///
/// Returns `DomainError::ParseError` if the path has no bucket, a required
/// field (`emi`, `pli`, `e`, `sa`) is missing, or a value fails to parse.
pub fn decode_beacon(url: &Url) -> DomainResult<(Bucket, PingParams)> {
    let bucket = match url.path_segments().and_then(|mut segments| segments.nth(1)) {
        Some("jwplayer6") => Bucket::Player,
        Some("clienta") => Bucket::Ads,
        other => {
            return Err(DomainError::parse(
                "bucket",
                format!("unknown path segment {other:?}"),
            ))
        }
    };

    let mut identity = Identity::default();
    let mut session_id = None;
    let mut play_session_id = None;
    let mut event = None;
    let mut sent_at = None;
    let mut duration = None;
    let mut quantiles = None;
    let mut progress_watched = None;
    let mut time_watched = None;

    for (key, value) in url.query_pairs() {
        let value = value.into_owned();
        match key.as_ref() {
            "aid" => identity.account_id = Some(value),
            "bun" => identity.bundle_id = Some(value),
            "fed" => identity.feed_id = Some(value),
            "id" => identity.media_id = Some(value),
            "t" => identity.title = Some(value),
            "emi" => session_id = Some(CorrelationId::parse(&value)?),
            "pli" => play_session_id = Some(CorrelationId::parse(&value)?),
            "e" => event = Some(value.parse::<EventCode>()?),
            "sa" => sent_at = Some(parse_field("sa", &value)?),
            "vd" => duration = Some(parse_field("vd", &value)?),
            "q" => quantiles = Some(parse_field("q", &value)?),
            "pw" => progress_watched = Some(parse_field("pw", &value)?),
            "ti" => time_watched = Some(parse_field("ti", &value)?),
            // Platform constants and unknown keys
            _ => {}
        }
    }

    let ping = PingParams {
        identity,
        session_id: session_id.ok_or_else(|| DomainError::parse("emi", "missing"))?,
        play_session_id: play_session_id.ok_or_else(|| DomainError::parse("pli", "missing"))?,
        event: event.ok_or_else(|| DomainError::parse("e", "missing"))?,
        sent_at: sent_at.ok_or_else(|| DomainError::parse("sa", "missing"))?,
        duration,
        quantiles,
        progress_watched,
        time_watched,
    };

    Ok((bucket, ping))
}

fn parse_field<T>(field: &str, value: &str) -> DomainResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse::<T>()
        .map_err(|e| DomainError::parse(field, format!("{value:?}: {e}")))
}
