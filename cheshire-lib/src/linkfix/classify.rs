use std::ops::Range;

pub const TWITTER_HOSTS: &[&str] = &["twitter.com", "www.twitter.com", "mobile.twitter.com"];
pub const X_HOSTS: &[&str] = &["x.com", "www.x.com", "mobile.x.com"];
pub const REDDIT_HOSTS: &[&str] = &[
    "reddit.com",
    "www.reddit.com",
    "old.reddit.com",
    "new.reddit.com",
    "redd.it",
];
pub const INSTAGRAM_HOSTS: &[&str] = &["instagram.com", "www.instagram.com", "m.instagram.com"];
pub const FACEBOOK_HOSTS: &[&str] = &["facebook.com", "www.facebook.com", "m.facebook.com"];

/// Proxies that already embed properly. These match anywhere in the url,
/// not only in the host.
pub const SKIP_DOMAINS: &[&str] = &[
    "fxtwitter.com",
    "vxtwitter.com",
    "fixupx.com",
    "fixvx.com",
    "rxddit.com",
    "vxreddit.com",
    "rxyddit.com",
    "redditez.com",
];

pub const TWITTER_REPLACEMENT: &str = "fxtwitter.com";
pub const X_REPLACEMENT: &str = "fixupx.com";
pub const REDDIT_REPLACEMENT: &str = "rxddit.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Twitter,
    X,
    Reddit,
    Instagram,
    Facebook,
    /// Already points at an embed proxy.
    Skip,
    Other,
}

impl LinkKind {
    /// The proxy host for kinds that are fixed by swapping the host.
    pub fn replacement_host(self) -> Option<&'static str> {
        match self {
            LinkKind::Twitter => Some(TWITTER_REPLACEMENT),
            LinkKind::X => Some(X_REPLACEMENT),
            LinkKind::Reddit => Some(REDDIT_REPLACEMENT),
            _ => None,
        }
    }

    /// Kinds that are fixed by downloading and re-uploading the media.
    pub fn is_media(self) -> bool {
        matches!(self, LinkKind::Instagram | LinkKind::Facebook)
    }
}

/// Byte range of the host (between `://` and the next `/`).
pub fn host_range(url: &str) -> Option<Range<usize>> {
    let start = url.find("://")? + 3;
    let end = url[start..].find('/').map_or(url.len(), |offset| start + offset);

    Some(start..end)
}

/// The lower-cased host of `url`, if it has a scheme separator.
pub fn extract_host(url: &str) -> Option<String> {
    host_range(url).map(|range| url[range].to_lowercase())
}

pub fn classify(url: &str) -> LinkKind {
    let lowered = url.to_lowercase();
    if SKIP_DOMAINS.iter().any(|domain| lowered.contains(domain)) {
        return LinkKind::Skip;
    }

    let Some(host) = extract_host(url) else {
        return LinkKind::Other;
    };
    let host = host.as_str();

    if TWITTER_HOSTS.contains(&host) {
        LinkKind::Twitter
    } else if X_HOSTS.contains(&host) {
        LinkKind::X
    } else if REDDIT_HOSTS.contains(&host) {
        LinkKind::Reddit
    } else if INSTAGRAM_HOSTS.contains(&host) {
        LinkKind::Instagram
    } else if FACEBOOK_HOSTS.contains(&host) {
        LinkKind::Facebook
    } else {
        LinkKind::Other
    }
}
