use crate::data::PoiseContext;
use color_eyre::eyre::{Report, Result};
use poise::{
    CreateReply,
    serenity_prelude::{self as serenity, http::HttpError},
};

pub trait SendReplyEphemeral {
    async fn reply_ephemeral(self, content: impl Into<String>) -> Result<()>;
}

impl SendReplyEphemeral for PoiseContext<'_> {
    async fn reply_ephemeral(self, content: impl Into<String>) -> Result<()> {
        self.send(CreateReply::default().content(content).ephemeral(true))
            .await?;

        Ok(())
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}

/// The status of a failed Discord request, if that is what failed.
pub fn http_status(error: &serenity::Error) -> Option<u16> {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            Some(response.status_code.as_u16())
        }
        _ => None,
    }
}

/// [`http_status`] for a report that may wrap a serenity error.
pub fn report_http_status(report: &Report) -> Option<u16> {
    report.downcast_ref::<serenity::Error>().and_then(http_status)
}
