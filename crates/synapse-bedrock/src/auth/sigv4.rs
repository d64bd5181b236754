//! AWS Signature Version 4
//!
//! Only the header-based flavour is implemented: the caller sets
//! `x-amz-content-sha256` (see [`super::prepare_headers`]) and this module
//! adds `x-amz-date`, the optional session token and `Authorization`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use hmac::{Hmac, Mac};
use http::{HeaderMap, HeaderValue, Method};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::BedrockError;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const IGNORED_HEADERS: [&str; 5] = ["authorization", "user-agent", "x-amzn-trace-id", "expect", "transfer-encoding"];

/// Key pair used for signing
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

/// Where and when a request is signed
#[derive(Debug, Clone, Copy)]
pub struct SigningScope<'a> {
    pub region: &'a str,
    pub service: &'a str,
    pub time: jiff::Timestamp,
}

impl SigningScope<'_> {
    fn amz_date(&self) -> String {
        self.time.strftime("%Y%m%dT%H%M%SZ").to_string()
    }
}

type HmacSha256 = Hmac<Sha256>;

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, BedrockError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BedrockError::Configuration(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `kSigning` from the `AWS4{secret}` / date / region / service chain
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, BedrockError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// Derived keys, valid for one UTC day
#[derive(Debug, Default)]
pub struct SigningKeyCache {
    keys: Mutex<HashMap<String, Vec<u8>>>,
}

impl SigningKeyCache {
    fn get_or_derive(&self, creds: &Credentials, date: &str, region: &str, service: &str) -> Result<Vec<u8>, BedrockError> {
        let cache_key = format!("{}/{date}/{region}/{service}", creds.access_key_id);

        if let Some(key) = self.keys.lock().unwrap_or_else(PoisonError::into_inner).get(&cache_key) {
            return Ok(key.clone());
        }

        let key = derive_signing_key(creds.secret_access_key.expose_secret(), date, region, service)?;

        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let today = format!("/{date}/");
        keys.retain(|k, _| k.contains(&today));
        keys.insert(cache_key, key.clone());

        Ok(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// RFC 3986 encoding: unreserved characters pass, everything else is `%XX`
pub fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(char::from(byte)),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn canonical_uri(url: &Url, service: &str) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_owned();
    }
    // S3 signs the path as sent; every other service encodes it once more
    if service == "s3" {
        return path.to_owned();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sorted `name -> value` set that takes part in the signature
fn signed_header_set(url: &Url, headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut set: BTreeMap<String, String> = BTreeMap::new();
    set.insert("host".to_owned(), host(url));

    for (name, value) in headers {
        let name = name.as_str();
        if IGNORED_HEADERS.contains(&name) || name == "host" {
            continue;
        }
        let value = collapse_whitespace(&String::from_utf8_lossy(value.as_bytes()));
        set.entry(name.to_owned())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    set
}

/// The canonical request and its signed-header list
pub fn canonical_request(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    payload_hash: &str,
    service: &str,
) -> (String, String) {
    let set = signed_header_set(url, headers);
    let canonical_headers: String = set.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
    let signed_headers = set.keys().map(String::as_str).collect::<Vec<_>>().join(";");

    let request = format!(
        "{method}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        canonical_uri(url, service),
        canonical_query(url),
    );

    (request, signed_headers)
}

/// Sign in place, adding `x-amz-date`, `x-amz-security-token` and `Authorization`
pub fn sign(
    method: &Method,
    url: &Url,
    headers: &mut HeaderMap,
    payload: &[u8],
    creds: &Credentials,
    scope: SigningScope<'_>,
    cache: &SigningKeyCache,
) -> Result<(), BedrockError> {
    let amz_date = scope.amz_date();
    let date = &amz_date[..8];

    headers.insert("x-amz-date", header_value(&amz_date)?);
    if let Some(token) = &creds.session_token {
        headers.insert("x-amz-security-token", header_value(token.expose_secret())?);
    }

    let payload_hash = match headers.get("x-amz-content-sha256").and_then(|v| v.to_str().ok()) {
        Some(hash) => hash.to_owned(),
        None => sha256_hex(payload),
    };

    let (canonical, signed_headers) = canonical_request(method, url, headers, &payload_hash, scope.service);
    let credential_scope = format!("{date}/{}/{}/aws4_request", scope.region, scope.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );

    let key = cache.get_or_derive(creds, date, scope.region, scope.service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
        creds.access_key_id
    );
    headers.insert(http::header::AUTHORIZATION, header_value(&authorization)?);

    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue, BedrockError> {
    HeaderValue::from_str(value).map_err(|e| BedrockError::Configuration(format!("invalid signing header: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_creds() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_owned(),
            secret_access_key: SecretString::from("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
            session_token: None,
        }
    }

    fn at(stamp: &str) -> jiff::Timestamp {
        stamp.parse().unwrap()
    }

    #[test]
    fn signing_key_matches_published_vector() {
        let key = derive_signing_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let mut headers = HeaderMap::new();
        let scope = SigningScope {
            region: "us-east-1",
            service: "service",
            time: at("2015-08-30T12:36:00Z"),
        };

        sign(&Method::GET, &url, &mut headers, b"", &example_creds(), scope, &SigningKeyCache::default()).unwrap();

        assert_eq!(headers["x-amz-date"], "20150830T123600Z");
        assert_eq!(
            headers["authorization"],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn ignored_headers_stay_out_of_the_signature() {
        let url = Url::parse("https://bedrock.us-east-1.amazonaws.com/foundation-models").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("synapse"));
        headers.insert("x-amzn-trace-id", HeaderValue::from_static("Root=1"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let (_, signed) = canonical_request(&Method::GET, &url, &headers, "hash", "bedrock");
        assert_eq!(signed, "content-type;host");
    }

    #[test]
    fn session_token_is_signed() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let mut headers = HeaderMap::new();
        let creds = Credentials {
            session_token: Some(SecretString::from("token")),
            ..example_creds()
        };
        let scope = SigningScope {
            region: "us-east-1",
            service: "bedrock",
            time: at("2024-01-01T00:00:00Z"),
        };

        sign(&Method::GET, &url, &mut headers, b"", &creds, scope, &SigningKeyCache::default()).unwrap();

        assert_eq!(headers["x-amz-security-token"], "token");
        let auth = headers["authorization"].to_str().unwrap();
        assert!(auth.contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn model_paths_are_encoded_twice_outside_s3() {
        let url = Url::parse("https://bedrock-runtime.us-east-1.amazonaws.com/model/us.anthropic.claude%3Av1/converse")
            .unwrap();
        assert_eq!(canonical_uri(&url, "bedrock"), "/model/us.anthropic.claude%253Av1/converse");

        let url = Url::parse("https://b.s3.us-east-1.amazonaws.com/a%20b/c.jsonl").unwrap();
        assert_eq!(canonical_uri(&url, "s3"), "/a%20b/c.jsonl");
    }

    #[test]
    fn query_is_sorted_and_space_encoded() {
        let url = Url::parse("https://b.s3.amazonaws.com/?prefix=a b&list-type=2").unwrap();
        assert_eq!(canonical_query(&url), "list-type=2&prefix=a%20b");
    }

    #[test]
    fn cache_keeps_only_the_current_day() {
        let cache = SigningKeyCache::default();
        let creds = example_creds();

        cache.get_or_derive(&creds, "20240101", "us-east-1", "bedrock").unwrap();
        cache.get_or_derive(&creds, "20240101", "us-east-1", "s3").unwrap();
        assert_eq!(cache.len(), 2);

        cache.get_or_derive(&creds, "20240102", "us-east-1", "bedrock").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn non_ascii_is_percent_encoded() {
        assert_eq!(uri_encode("a b/é~"), "a%20b%2F%C3%A9~");
    }
}
