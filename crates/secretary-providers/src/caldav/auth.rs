//! HTTP authentication for CalDAV servers.
//!
//! Basic (RFC 7617) and Digest (RFC 7616, MD5 only) authentication. The
//! scheme is chosen from the server's `WWW-Authenticate` challenge after a
//! first unauthenticated request is refused.

use base64::Engine;
use rand::Rng;
use std::collections::HashMap;

/// The authentication scheme a server asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic,
    Digest(DigestAuth),
}

impl Challenge {
    /// Picks a scheme from a `WWW-Authenticate` header value.
    ///
    /// Digest is preferred when the header is a digest challenge that
    /// carries a realm and a nonce; anything else falls back to Basic.
    pub fn from_header(header: &str) -> Self {
        DigestAuth::parse(header).map_or(Self::Basic, Self::Digest)
    }

    /// Builds the `Authorization` header value for one request.
    pub fn authorize(&mut self, method: &str, uri: &str, username: &str, password: &str) -> String {
        match self {
            Self::Basic => basic_auth(username, password),
            Self::Digest(digest) => digest.authorize(method, uri, username, password),
        }
    }
}

/// Digest challenge state. The nonce count grows with every request
/// authorized against the same nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestAuth {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// Whether the server offered `qop=auth`.
    pub qop_auth: bool,
    pub algorithm: String,
    nc: u32,
}

impl DigestAuth {
    /// Parses a `Digest ...` challenge. Returns `None` for other schemes or
    /// when the realm or nonce is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, content) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }
        let params = parse_auth_params(content);

        let qop_auth = params
            .get("qop")
            .is_some_and(|qop| qop.split(',').any(|q| q.trim() == "auth"));

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            qop_auth,
            algorithm: params
                .get("algorithm")
                .cloned()
                .unwrap_or_else(|| "MD5".to_string()),
            nc: 0,
        })
    }

    pub fn authorize(&mut self, method: &str, uri: &str, username: &str, password: &str) -> String {
        self.nc += 1;
        let nc = format!("{:08x}", self.nc);
        let cnonce = generate_cnonce();

        let ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let response = if self.qop_auth {
            md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce))
        };

        let mut parts = vec![
            format!("username=\"{username}\""),
            format!("realm=\"{}\"", self.realm),
            format!("nonce=\"{}\"", self.nonce),
            format!("uri=\"{uri}\""),
            format!("response=\"{response}\""),
            format!("algorithm={}", self.algorithm),
        ];
        if self.qop_auth {
            parts.push("qop=auth".to_string());
            parts.push(format!("nc={nc}"));
            parts.push(format!("cnonce=\"{cnonce}\""));
        }
        if let Some(opaque) = &self.opaque {
            parts.push(format!("opaque=\"{opaque}\""));
        }

        format!("Digest {}", parts.join(", "))
    }
}

/// Builds a Basic `Authorization` header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

/// Splits `key=value, key="quoted value"` pairs. Keys are lowercased.
fn parse_auth_params(content: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = content.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_lowercase();
        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            let mut escaped = false;
            for c in chars.by_ref() {
                match c {
                    _ if escaped => {
                        value.push(c);
                        escaped = false;
                    }
                    '\\' => escaped = true,
                    '"' => break,
                    _ => value.push(c),
                }
            }
            value
        } else {
            chars
                .by_ref()
                .take_while(|c| *c != ',' && !c.is_whitespace())
                .collect()
        };

        params.insert(key, value);
    }

    params
}

fn generate_cnonce() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}
