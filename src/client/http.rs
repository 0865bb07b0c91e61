//! Blocking client for S3-compatible HTTP endpoints.
//!
//! Requests are path-style (`{endpoint}/{bucket}/{object}`) and unsigned,
//! so only objects readable anonymously can be fetched.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::HeaderValue;
use url::Url;

use super::{
    GetObjectOptions, ObjectClient, ObjectReader, check_bucket_name, check_object_name,
};
use crate::error::ObjectError;

pub struct HttpClient {
    endpoint: Url,
    secure: bool,
    http: Client,
}

impl HttpClient {
    /// Creates a client for `endpoint`, e.g. `https://play.min.io`.
    ///
    /// Plain `http` endpoints are accepted but will refuse every SSE-C
    /// request.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid endpoint '{endpoint}'"))?;

        match endpoint.scheme() {
            "https" => {}
            "http" => warn!("endpoint {endpoint} is not TLS; SSE-C requests will be refused"),
            other => bail!("unsupported endpoint scheme '{other}'"),
        }
        if endpoint.cannot_be_a_base() || endpoint.host().is_none() {
            bail!("endpoint '{endpoint}' has no host");
        }

        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        let secure = endpoint.scheme() == "https";
        Ok(Self {
            endpoint,
            secure,
            http,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `.` and `..` segments are rejected: the URL parser would collapse
    /// them and the request would address a different resource.
    fn object_url(&self, bucket: &str, object: &str) -> Result<Url> {
        if object.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(ObjectError::InvalidRequest(format!(
                "object name '{object}' contains a relative path segment"
            ))
            .into());
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("endpoint '{}' has no host", self.endpoint))?
            .pop_if_empty()
            .push(bucket)
            .extend(object.split('/'));
        Ok(url)
    }
}

impl ObjectClient for HttpClient {
    fn is_secure(&self) -> bool {
        self.secure
    }

    fn get_object(
        &self,
        bucket: &str,
        object: &str,
        opts: GetObjectOptions,
    ) -> Result<ObjectReader> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;

        let headers = opts.headers(self.is_secure())?;
        let url = self.object_url(bucket, object)?;

        let mut request = self.http.get(url);
        for (name, value) in &headers {
            let mut value = HeaderValue::from_str(value)?;
            value.set_sensitive(true);
            request = request.header(*name, value);
        }
        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }

        debug!("GET {bucket}/{object} from {}", self.endpoint);
        let response = request.send()?;
        let status = response.status();
        debug!("GET {bucket}/{object} returned {status}");

        if status.is_success() {
            return Ok(Box::new(response));
        }

        let body = response.text().unwrap_or_else(|e| {
            debug!("failed to read error body for {bucket}/{object}: {e}");
            String::new()
        });
        Err(s3_error(status.as_u16(), &body, bucket, object).into())
    }
}

/// Maps an S3 error response onto [`ObjectError`].
fn s3_error(status: u16, body: &str, bucket: &str, object: &str) -> ObjectError {
    let code = xml_element(body, "Code").unwrap_or_default();
    let message = xml_element(body, "Message").unwrap_or_default();

    match (code.as_str(), status) {
        ("NoSuchBucket", _) => ObjectError::NoSuchBucket(bucket.to_string()),
        ("NoSuchKey", _) | ("", 404) => ObjectError::NoSuchKey {
            bucket: bucket.to_string(),
            object: object.to_string(),
        },
        ("AccessDenied", _) | ("", 403) => ObjectError::AccessDenied {
            bucket: bucket.to_string(),
            object: object.to_string(),
        },
        ("InvalidRequest" | "InvalidArgument", _) => ObjectError::InvalidRequest(message),
        (code, status) => ObjectError::Http {
            status,
            code: code.to_string(),
            message,
        },
    }
}

fn xml_element(body: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = body.find(&open)? + open.len();
    let len = body[start..].find(&close)?;
    Some(unescape_xml(body[start..start + len].trim()))
}

/// Decodes the predefined XML entities. Anything else is kept verbatim.
fn unescape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').and_then(|end| {
            let c = match &rest[1..end] {
                "amp" => '&',
                "lt" => '<',
                "gt" => '>',
                "quot" => '"',
                "apos" => '\'',
                _ => return None,
            };
            Some((c, end + 1))
        });

        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SseCustomer;
    use crate::error::SseError;

    #[test]
    fn only_https_is_secure() {
        assert!(HttpClient::new("https://s3.example.com").unwrap().is_secure());
        assert!(!HttpClient::new("http://s3.example.com").unwrap().is_secure());
    }

    #[test]
    fn rejects_unsupported_endpoints() {
        assert!(HttpClient::new("ftp://s3.example.com").is_err());
        assert!(HttpClient::new("not a url").is_err());
    }

    #[test]
    fn object_url_is_path_style_and_escaped() {
        let client = HttpClient::new("https://s3.example.com/").unwrap();
        let url = client.object_url("photos", "2017/my beach.jpg").unwrap();

        assert_eq!(
            url.as_str(),
            "https://s3.example.com/photos/2017/my%20beach.jpg"
        );

        for name in ["..", ".", "a/../b", "./x", "a/."] {
            let err = client.object_url("photos", name).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<ObjectError>(),
                    Some(ObjectError::InvalidRequest(_))
                ),
                "{name}"
            );
        }
        assert!(client.object_url("photos", "a/..b/.c").is_ok());
    }

    #[test]
    fn object_url_keeps_endpoint_prefix() {
        let client = HttpClient::new("https://gw.example.com/s3").unwrap();
        let url = client.object_url("photos", "a.jpg").unwrap();

        assert_eq!(url.as_str(), "https://gw.example.com/s3/photos/a.jpg");
    }

    #[test]
    fn sse_over_plain_http_is_refused_before_sending() {
        // Nothing listens on the discard port; a sent request would fail
        // with a connection error instead.
        let client = HttpClient::new("http://127.0.0.1:9").unwrap();
        let opts = GetObjectOptions::with_sse(SseCustomer::new(&[3u8; 32]).unwrap());

        let err = client
            .get_object("photos", "beach.jpg", opts)
            .err()
            .expect("insecure SSE-C request must fail");
        assert_eq!(
            err.downcast_ref::<SseError>(),
            Some(&SseError::InsecureTransport)
        );
    }

    #[test]
    fn invalid_names_are_rejected_before_sending() {
        let client = HttpClient::new("https://127.0.0.1:9").unwrap();

        let err = client
            .get_object("Bad_Bucket", "x", GetObjectOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ObjectError>(),
            Some(ObjectError::InvalidRequest(_))
        ));
    }

    #[test]
    fn error_messages_are_unescaped() {
        let body = "<Error><Code>InvalidArgument</Code>\
                    <Message>can&apos;t use &lt;key&gt; &amp; &quot;md5&quot; &bogus;</Message></Error>";
        assert_eq!(
            s3_error(400, body, "photos", "a.jpg"),
            ObjectError::InvalidRequest("can't use <key> & \"md5\" &bogus;".into())
        );
        assert_eq!(unescape_xml("a & b"), "a & b");
    }

    #[test]
    fn s3_errors_map_to_object_errors() {
        let denied = "<?xml version=\"1.0\"?><Error><Code>AccessDenied</Code>\
                      <Message>The provided encryption parameters did not match</Message></Error>";
        assert_eq!(
            s3_error(403, denied, "photos", "a.jpg"),
            ObjectError::AccessDenied {
                bucket: "photos".into(),
                object: "a.jpg".into()
            }
        );

        let missing = "<Error><Code>NoSuchBucket</Code><Message>x</Message></Error>";
        assert_eq!(
            s3_error(404, missing, "photos", "a.jpg"),
            ObjectError::NoSuchBucket("photos".into())
        );

        assert_eq!(
            s3_error(404, "", "photos", "a.jpg"),
            ObjectError::NoSuchKey {
                bucket: "photos".into(),
                object: "a.jpg".into()
            }
        );

        let invalid = "<Error><Code>InvalidRequest</Code>\
                       <Message>The object was stored using a form of SSE</Message></Error>";
        assert_eq!(
            s3_error(400, invalid, "photos", "a.jpg"),
            ObjectError::InvalidRequest("The object was stored using a form of SSE".into())
        );

        let other = "<Error><Code>SlowDown</Code><Message>reduce rate</Message></Error>";
        assert_eq!(
            s3_error(503, other, "photos", "a.jpg"),
            ObjectError::Http {
                status: 503,
                code: "SlowDown".into(),
                message: "reduce rate".into()
            }
        );
    }

    mod live {
        use std::io::Read;
        use std::time::Duration;

        use httpmock::{Method, MockServer};

        use super::*;
        use crate::crypto::sse::{
            SSE_CUSTOMER_ALGORITHM_HEADER, SSE_CUSTOMER_KEY_HEADER, SSE_CUSTOMER_KEY_MD5_HEADER,
        };

        /// Treats the plain-http mock server as a secure endpoint.
        fn client_for(server: &MockServer) -> HttpClient {
            let mut client = HttpClient::new(&server.base_url()).unwrap();
            client.secure = true;
            client
        }

        fn object_error(err: anyhow::Error) -> ObjectError {
            match err.downcast::<ObjectError>() {
                Ok(e) => e,
                Err(other) => panic!("expected ObjectError, got: {other:?}"),
            }
        }

        #[test]
        fn success_streams_body_and_sends_sse_headers() {
            let server = MockServer::start();
            let opts = GetObjectOptions::with_sse(SseCustomer::new(&[7u8; 32]).unwrap());

            let object_mock = server.mock(|when, then| {
                when.method(Method::GET)
                    .path("/photos/2017/beach.jpg")
                    .header(
                        SSE_CUSTOMER_ALGORITHM_HEADER.to_ascii_lowercase(),
                        "AES256".to_string(),
                    )
                    .header(
                        SSE_CUSTOMER_KEY_HEADER.to_ascii_lowercase(),
                        "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=".to_string(),
                    )
                    .header(
                        SSE_CUSTOMER_KEY_MD5_HEADER.to_ascii_lowercase(),
                        "y4HAEFCYWuvAXWFTtA1Qpg==".to_string(),
                    );
                then.status(200).body("decrypted bytes");
            });

            let mut body = client_for(&server)
                .get_object("photos", "2017/beach.jpg", opts)
                .unwrap();
            let mut buf = Vec::new();
            body.read_to_end(&mut buf).unwrap();

            object_mock.assert();
            assert_eq!(buf, b"decrypted bytes");
        }

        #[test]
        fn plain_request_carries_no_sse_headers() {
            let server = MockServer::start();
            let sse_mock = server.mock(|when, then| {
                when.method(Method::GET)
                    .path("/photos/a.txt")
                    .header_exists(SSE_CUSTOMER_KEY_HEADER.to_ascii_lowercase());
                then.status(500);
            });
            let plain_mock = server.mock(|when, then| {
                when.method(Method::GET).path("/photos/a.txt");
                then.status(200).body("open");
            });

            let mut body = client_for(&server)
                .get_object("photos", "a.txt", GetObjectOptions::default())
                .unwrap();
            let mut buf = String::new();
            body.read_to_string(&mut buf).unwrap();

            assert_eq!(buf, "open");
            sse_mock.assert_hits(0);
            plain_mock.assert();
        }

        #[test]
        fn access_denied_response_is_mapped() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(Method::GET).path("/photos/a.jpg");
                then.status(403).body(
                    "<?xml version=\"1.0\"?><Error><Code>AccessDenied</Code>\
                     <Message>The provided encryption parameters did not match</Message></Error>",
                );
            });

            let opts = GetObjectOptions::with_sse(SseCustomer::new(&[1u8; 32]).unwrap());
            let err = client_for(&server)
                .get_object("photos", "a.jpg", opts)
                .err()
                .unwrap();

            assert_eq!(
                object_error(err),
                ObjectError::AccessDenied {
                    bucket: "photos".into(),
                    object: "a.jpg".into()
                }
            );
        }

        #[test]
        fn missing_object_response_is_mapped() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(Method::GET).path("/photos/gone.jpg");
                then.status(404)
                    .body("<Error><Code>NoSuchKey</Code><Message>missing</Message></Error>");
            });

            let err = client_for(&server)
                .get_object("photos", "gone.jpg", GetObjectOptions::default())
                .err()
                .unwrap();

            assert_eq!(
                object_error(err),
                ObjectError::NoSuchKey {
                    bucket: "photos".into(),
                    object: "gone.jpg".into()
                }
            );
        }

        #[test]
        fn timeout_is_applied_to_the_request() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(Method::GET).path("/photos/slow.jpg");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .body("late");
            });

            let opts = GetObjectOptions {
                timeout: Some(Duration::from_millis(100)),
                ..GetObjectOptions::default()
            };
            let err = client_for(&server)
                .get_object("photos", "slow.jpg", opts)
                .err()
                .unwrap();

            let http_err = err
                .downcast_ref::<reqwest::Error>()
                .expect("expected a reqwest error");
            assert!(http_err.is_timeout(), "{http_err}");
        }

        #[test]
        fn dot_segments_are_not_sent() {
            let server = MockServer::start();
            let any = server.mock(|when, then| {
                when.method(Method::GET);
                then.status(200).body("listing");
            });

            let err = client_for(&server)
                .get_object("photos", "..", GetObjectOptions::default())
                .err()
                .unwrap();

            assert!(matches!(object_error(err), ObjectError::InvalidRequest(_)));
            any.assert_hits(0);
        }
    }
}
