/// Link Preview Fetcher
///
/// Resolves a URL to page metadata (title, description, image). A failed or empty lookup
/// is not an error for the caller: it just means there is no preview.
use regex::Regex;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

use crate::{api::error, modules::message::schema::LinkPreview};

const MAX_HTML_BYTES: usize = 512 * 1024;
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"), " link-preview");

#[async_trait::async_trait]
pub trait LinkPreviewFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<LinkPreview>;
}

lazy_static::lazy_static! {
    static ref META_TAG: Regex = Regex::new(r#"(?is)<meta\s[^>]*>"#).unwrap();
    static ref META_ATTR: Regex =
        Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref TITLE_TAG: Regex = Regex::new(r#"(?is)<title[^>]*>(.*?)</title>"#).unwrap();
}

/// Loopback, private, link-local, shared and unspecified ranges are never fetched.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast()
                // 0.0.0.0/8
                || a == 0
                // 100.64.0.0/10, carrier-grade NAT
                || (a == 100 && (b & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_internal_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7, unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10, link-local
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Whether a URL may be requested as far as its literal host goes. Domain names are
/// checked after resolution by [`PublicOnlyResolver`].
fn is_fetchable(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Ipv4(ip)) => !is_internal_ip(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => !is_internal_ip(&IpAddr::V6(ip)),
        Some(Host::Domain(_)) => true,
        None => false,
    }
}

type ResolveError = Box<dyn std::error::Error + Send + Sync>;

async fn resolve_public(host: String) -> Result<Addrs, ResolveError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .filter(|addr| !is_internal_ip(&addr.ip()))
        .collect();
    if addrs.is_empty() {
        tracing::debug!("Refusing to preview {}: no public address", host);
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("{} does not resolve to a public address", host),
        )
        .into());
    }
    Ok(Box::new(addrs.into_iter()))
}

/// DNS resolver that drops internal addresses, so every hop (redirects included) can only
/// connect to public hosts.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

#[derive(Clone)]
pub struct HttpLinkPreviewFetcher {
    client: reqwest::Client,
}

impl HttpLinkPreviewFetcher {
    pub fn new(timeout: Duration) -> Result<Self, error::SystemError> {
        let redirects = reqwest::redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !is_fetchable(attempt.url()) {
                tracing::debug!("Not following redirect to {}", attempt.url());
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(redirects)
            .dns_resolver(Arc::new(PublicOnlyResolver))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &Url) -> Result<Option<String>, error::SystemError> {
        let mut response = self.client.get(url.clone()).send().await?.error_for_status()?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html") || v.starts_with("application/xhtml"));
        if !is_html {
            return Ok(None);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_HTML_BYTES {
                body.truncate(MAX_HTML_BYTES);
                break;
            }
        }

        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }
}

#[async_trait::async_trait]
impl LinkPreviewFetcher for HttpLinkPreviewFetcher {
    async fn fetch(&self, url: &str) -> Option<LinkPreview> {
        let parsed = match Url::parse(url) {
            Ok(parsed) if is_fetchable(&parsed) => parsed,
            _ => {
                tracing::debug!("Not previewing {}", url);
                return None;
            }
        };

        match self.fetch_html(&parsed).await {
            Ok(Some(html)) => parse_html_metadata(&html, &parsed),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Link preview lookup failed for {}: {}", url, e);
                None
            }
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
}

fn clean(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let decoded = decode_entities(&collapsed);
    (!decoded.is_empty()).then_some(decoded)
}

/// Extract preview metadata from a page. Open Graph tags win over Twitter cards, which win
/// over plain `<title>` / `description`. Returns `None` when the page yields nothing useful.
pub fn parse_html_metadata(html: &str, page_url: &Url) -> Option<LinkPreview> {
    let mut og_title = None;
    let mut twitter_title = None;
    let mut og_description = None;
    let mut description = None;
    let mut og_image = None;
    let mut twitter_image = None;
    let mut og_url = None;

    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for attr in META_ATTR.captures_iter(tag.as_str()) {
            let name = attr[1].to_ascii_lowercase();
            let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str());
            match name.as_str() {
                "property" | "name" => key = value.map(str::to_ascii_lowercase),
                "content" => content = value.and_then(clean),
                _ => {}
            }
        }

        let (Some(key), Some(content)) = (key, content) else {
            continue;
        };
        let slot = match key.as_str() {
            "og:title" => &mut og_title,
            "twitter:title" => &mut twitter_title,
            "og:description" => &mut og_description,
            "description" | "twitter:description" => &mut description,
            "og:image" | "og:image:url" => &mut og_image,
            "twitter:image" => &mut twitter_image,
            "og:url" => &mut og_url,
            _ => continue,
        };
        slot.get_or_insert(content);
    }

    let title = og_title
        .or(twitter_title)
        .or_else(|| TITLE_TAG.captures(html).and_then(|c| clean(&c[1])));
    let description = og_description.or(description);
    let image = og_image
        .or(twitter_image)
        .and_then(|src| page_url.join(&src).ok())
        .map(String::from);

    if title.is_none() && description.is_none() && image.is_none() {
        return None;
    }

    let url = og_url
        .and_then(|u| page_url.join(&u).ok())
        .map(String::from)
        .unwrap_or_else(|| page_url.to_string());

    Some(LinkPreview { url, title, description, image })
}
