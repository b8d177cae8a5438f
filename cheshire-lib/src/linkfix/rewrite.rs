use super::{
    classify::{classify, host_range},
    scan::candidate_urls,
};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    /// Whether at least one url was swapped.
    pub changed: bool,
}

/// Swaps the host of a Twitter, X or Reddit url for its embed proxy.
/// Anything else comes back untouched.
pub fn rewrite_url(url: &str) -> Cow<'_, str> {
    let Some(replacement) = classify(url).replacement_host() else {
        return Cow::Borrowed(url);
    };
    let Some(host) = host_range(url) else {
        return Cow::Borrowed(url);
    };

    let mut fixed = String::with_capacity(url.len() + replacement.len());
    fixed.push_str(&url[..host.start]);
    fixed.push_str(replacement);
    fixed.push_str(&url[host.end..]);

    Cow::Owned(fixed)
}

/// Rewrites every eligible url in `content`, keeping all other text as is.
/// Instagram and Facebook urls are left alone; they go through the media path.
pub fn rewrite_links(content: &str) -> Rewritten {
    let mut text = String::with_capacity(content.len());
    let mut changed = false;
    let mut last = 0;

    for span in candidate_urls(content) {
        text.push_str(&content[last..span.range.start]);

        let fixed = rewrite_url(span.url);
        changed |= matches!(fixed, Cow::Owned(_));
        text.push_str(&fixed);

        last = span.range.end;
    }
    text.push_str(&content[last..]);

    Rewritten { text, changed }
}
