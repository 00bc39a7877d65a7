//! Outgoing email contract and the messages the auth flows send.

/// Delivers an HTML email. Returns whether delivery was accepted.
///
/// Failures are reported as `false`, never as an error: no auth flow
/// changes its outcome because mail could not be sent.
pub trait EmailSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
}

/// Minimal HTML escaping for user-supplied text placed in a message body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn confirmation_message(
    product_name: &str,
    first_name: &str,
    link: &str,
    valid_hours: u64,
) -> EmailMessage {
    let first_name = escape_html(first_name);
    let link = escape_html(link);
    EmailMessage {
        subject: format!("Confirm your {product_name} account"),
        html_body: format!(
            "<p>Hi {first_name},</p>\
             <p>Please confirm your email address by clicking the link below:</p>\
             <p><a href=\"{link}\">Confirm email</a></p>\
             <p>This link is valid for {valid_hours} hours.</p>"
        ),
    }
}

pub fn welcome_message(product_name: &str, first_name: &str) -> EmailMessage {
    let first_name = escape_html(first_name);
    EmailMessage {
        subject: format!("Welcome to {product_name}"),
        html_body: format!(
            "<p>Hi {first_name},</p>\
             <p>Your email is confirmed and your {product_name} account is ready.</p>"
        ),
    }
}

/// Logs messages instead of sending them. For development setups
/// without an SMTP relay.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool {
        tracing::info!(to, subject, body = html_body, "email (log sender)");
        true
    }
}
