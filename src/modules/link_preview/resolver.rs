use regex::Regex;

use crate::modules::message::schema::LinkPreview;

lazy_static::lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r#"https?://[^\s<>"']+"#).unwrap();
}

/// First http(s) URL in the text, without trailing sentence punctuation.
pub fn extract_first_url(text: &str) -> Option<&str> {
    let found = URL_PATTERN.find(text)?.as_str();
    let trimmed = found.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}']);
    let (_, host) = trimmed.split_once("://")?;
    (!host.is_empty()).then_some(trimmed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewAction {
    None,
    /// Look this URL up; the result goes back through [`PreviewResolver::resolved`].
    Fetch(String),
    /// The draft no longer has a URL, drop whatever was shown.
    Clear,
}

/// Draft link-preview state. Lookups may complete in any order; a result is only shown while
/// the draft still contains its URL, so the last resolved lookup for the current text wins.
#[derive(Debug, Default)]
pub struct PreviewResolver {
    preview: Option<LinkPreview>,
    /// URL of the most recent lookup still expected.
    pending: Option<String>,
}

impl PreviewResolver {
    pub fn current(&self) -> Option<&LinkPreview> {
        self.preview.as_ref()
    }

    pub fn text_changed(&mut self, text: &str) -> PreviewAction {
        match extract_first_url(text) {
            None => {
                self.pending = None;
                if self.preview.take().is_some() {
                    PreviewAction::Clear
                } else {
                    PreviewAction::None
                }
            }
            Some(url) => {
                let already_shown = self.preview.as_ref().is_some_and(|p| p.url == url);
                let already_pending = self.pending.as_deref() == Some(url);
                if already_shown || already_pending {
                    return PreviewAction::None;
                }
                self.pending = Some(url.to_string());
                PreviewAction::Fetch(url.to_string())
            }
        }
    }

    /// Apply a finished lookup for `url`. Returns whether the shown preview changed.
    pub fn resolved(&mut self, text: &str, url: &str, preview: Option<LinkPreview>) -> bool {
        if self.pending.as_deref() == Some(url) {
            self.pending = None;
        }
        if extract_first_url(text) != Some(url) {
            tracing::debug!("Dropping preview for {}, draft moved on", url);
            return false;
        }

        match preview {
            Some(mut preview) => {
                // keep the URL as typed so later comparisons with the draft hold
                preview.url = url.to_string();
                if self.preview.as_ref() == Some(&preview) {
                    return false;
                }
                self.preview = Some(preview);
                true
            }
            None => self.preview.take().is_some(),
        }
    }

    /// After a successful send: drop the preview if it is still the one that went out.
    pub fn sent(&mut self, url: &str) -> bool {
        if self.preview.as_ref().is_some_and(|p| p.url == url) {
            self.preview = None;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.preview = None;
        self.pending = None;
    }
}
