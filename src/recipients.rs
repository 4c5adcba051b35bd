//! Mail recipient extraction
//!
//! Recipients come from three places, all unioned:
//! 1. `to` query parameter (v2 single value)
//! 2. `to[]` query parameter (v2 repeated value)
//! 3. `x-smtpapi` JSON header: the v2 `to` list and v3 personalizations

use hyper::HeaderMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::SinkError;

/// Header carrying the JSON recipient document
pub const SMTPAPI_HEADER: &str = "x-smtpapi";

/// Single-value query key
pub const TO_PARAM: &str = "to";

/// Repeated query key
pub const TO_ARRAY_PARAM: &str = "to[]";

/// x-smtpapi document; the v2 `to` list and v3 personalizations may both appear
#[derive(Debug, Deserialize)]
struct SmtpApiHeader {
    #[serde(default)]
    to: Option<Vec<String>>,
    #[serde(default)]
    personalizations: Option<Vec<Personalization>>,
}

#[derive(Debug, Deserialize)]
struct Personalization {
    #[serde(default)]
    to: Option<Vec<Address>>,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(default)]
    email: Option<String>,
}

impl SmtpApiHeader {
    /// v2 addresses first, then every personalization address in order
    fn into_recipients(self) -> Vec<String> {
        let v3 = self
            .personalizations
            .into_iter()
            .flatten()
            .flat_map(|p| p.to.into_iter().flatten())
            .filter_map(|address| address.email);

        self.to.into_iter().flatten().chain(v3).collect()
    }
}

/// Extract the normalized recipients of a request
///
/// Never fails: a malformed header is logged and the query-derived
/// recipients are returned as-is.
#[must_use]
pub fn extract_recipients(query: Option<&str>, headers: &HeaderMap) -> Vec<String> {
    let mut recipients = Vec::new();

    if let Some(query) = query {
        let pairs = query_pairs(query);

        if let Some((_, to)) = pairs.iter().find(|(key, _)| key == TO_PARAM) {
            push_normalized(&mut recipients, to);
        }

        for (_, to) in pairs.iter().filter(|(key, _)| key == TO_ARRAY_PARAM) {
            push_normalized(&mut recipients, to);
        }
    }

    let Some(header) = headers.get(SMTPAPI_HEADER) else {
        return recipients;
    };

    match parse_smtpapi(header.as_bytes()) {
        Ok(from_header) => {
            for to in &from_header {
                push_normalized(&mut recipients, to);
            }
        }
        Err(e) => warn!("{}", e),
    }

    debug!("Extracted {} recipient(s)", recipients.len());
    recipients
}

/// Decode the x-smtpapi header into raw recipient strings
///
/// # Errors
///
/// Returns [`SinkError::MalformedRecipientHeader`] if the header is not a JSON
/// object of the expected shape
pub fn parse_smtpapi(raw: &[u8]) -> Result<Vec<String>, SinkError> {
    let header: SmtpApiHeader = serde_json::from_slice(raw)?;
    Ok(header.into_recipients())
}

/// Normalize an address for case-insensitive comparison
#[must_use]
pub fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

fn push_normalized(recipients: &mut Vec<String>, address: &str) {
    let address = normalize(address);
    if !address.is_empty() {
        recipients.push(address);
    }
}

/// Split a raw query string into decoded key/value pairs
pub(crate) fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn smtpapi(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SMTPAPI_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_single_to_param() {
        let recipients = extract_recipients(Some("to=A%40x.com&subject=hi"), &HeaderMap::new());
        assert_eq!(recipients, vec!["a@x.com"]);
    }

    #[test]
    fn test_only_first_to_param() {
        let recipients = extract_recipients(Some("to=a@x.com&to=b@x.com"), &HeaderMap::new());
        assert_eq!(recipients, vec!["a@x.com"]);
    }

    #[test]
    fn test_array_to_param() {
        let recipients = extract_recipients(
            Some("to%5B%5D=a@x.com&to[]=b@x.com&to=c@x.com"),
            &HeaderMap::new(),
        );
        assert_eq!(recipients, vec!["c@x.com", "a@x.com", "b@x.com"]);
    }

    #[test]
    fn test_empty_to_param_skipped() {
        let recipients = extract_recipients(Some("to=&from=z@x.com"), &HeaderMap::new());
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_v3_header() {
        let headers = smtpapi(
            r#"{"personalizations":[{"to":[{"email":"B@x.com"},{"email":"c@x.com"}]},{"to":[{"email":"d@x.com"}]}]}"#,
        );
        let recipients = extract_recipients(None, &headers);
        assert_eq!(recipients, vec!["b@x.com", "c@x.com", "d@x.com"]);
    }

    #[test]
    fn test_v2_header() {
        let headers = smtpapi(r#"{"to":["e@x.com","F@X.COM"]}"#);
        let recipients = extract_recipients(None, &headers);
        assert_eq!(recipients, vec!["e@x.com", "f@x.com"]);
    }

    #[test]
    fn test_header_without_recipients() {
        let headers = smtpapi(r#"{"category":["newsletter"]}"#);
        let recipients = extract_recipients(Some("to=a@x.com"), &headers);
        assert_eq!(recipients, vec!["a@x.com"]);
    }

    #[test]
    fn test_malformed_header_keeps_query_recipients() {
        let headers = smtpapi("{not json");
        let recipients = extract_recipients(Some("to=a@x.com"), &headers);
        assert_eq!(recipients, vec!["a@x.com"]);
    }

    #[test]
    fn test_parse_smtpapi_error() {
        let result = parse_smtpapi(b"[1, 2");
        assert!(matches!(result, Err(SinkError::MalformedRecipientHeader(_))));
    }

    #[test]
    fn test_parse_smtpapi_wrong_shape() {
        let cases: [&[u8]; 3] = [b"[1, 2]", b"\"x\"", br#"{"to":"a@x.com"}"#];
        for raw in cases {
            let result = parse_smtpapi(raw);
            assert!(matches!(result, Err(SinkError::MalformedRecipientHeader(_))));
        }
    }

    #[test]
    fn test_mixed_v2_and_v3_header() {
        let headers = smtpapi(
            r#"{"to":["a@x.com"],"personalizations":[{"to":[{"email":"b@x.com"}]}]}"#,
        );
        let recipients = extract_recipients(None, &headers);
        assert_eq!(recipients, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn test_personalization_without_email() {
        let headers = smtpapi(
            r#"{"personalizations":[{"to":[{"email":"a@x.com"}]},{"to":[{"name":"n"}]},{}]}"#,
        );
        let recipients = extract_recipients(None, &headers);
        assert_eq!(recipients, vec!["a@x.com"]);
    }

    #[test]
    fn test_null_fields_accepted() {
        let recipients = parse_smtpapi(br#"{"to":null,"personalizations":null}"#).unwrap();
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_query_and_header_union() {
        let headers = smtpapi(r#"{"to":["h@x.com"]}"#);
        let recipients = extract_recipients(Some("to=g@x.com"), &headers);
        assert_eq!(recipients, vec!["g@x.com", "h@x.com"]);
    }

    #[test]
    fn test_query_pairs_decoding() {
        let pairs = query_pairs("a=1+2&b=%C3%A9&flag");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1 2".to_string()),
                ("b".to_string(), "é".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }
}
