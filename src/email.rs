//! Postmark delivery. Sends rendered HTML newsletters per-subscriber with an
//! individual unsubscribe link, plus confirmation mail on signup. The
//! markdown converter handles the subset the generator actually emits.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, POSTMARK_API_URL};
use crate::db::Subscription;
use crate::error::{AppError, Result};
use crate::topics;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    message_stream: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostmarkResponse {
    #[serde(rename = "MessageID")]
    message_id: Option<String>,
    #[serde(rename = "ErrorCode", default)]
    error_code: i64,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
    pub email: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch outcome. A failed recipient never aborts the rest of the batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailReport {
    pub total_recipients: usize,
    pub successful_sends: usize,
    pub failed_sends: usize,
    pub results: Vec<SendResult>,
}

pub struct PostmarkSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
    base_url: String,
}

impl PostmarkSender {
    pub fn new(cfg: &Config) -> Result<Self> {
        let api_key = cfg
            .postmark_api_key
            .clone()
            .ok_or_else(|| AppError::Config("POSTMARK_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_url: POSTMARK_API_URL.to_string(),
            api_key,
            from_email: cfg.from_email.clone(),
            base_url: cfg.base_url.clone(),
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Send one newsletter to every subscriber, each with their own
    /// unsubscribe link. Subject comes from the AI headline when present.
    pub async fn send_newsletter(
        &self,
        content: &str,
        subscribers: &[Subscription],
        topic_keys: &[String],
    ) -> EmailReport {
        if subscribers.is_empty() {
            return EmailReport::default();
        }

        let subject = extract_ai_title(content).unwrap_or_else(|| {
            let names: Vec<String> = topic_keys.iter().map(|k| topics::display_name(k)).collect();
            format!("The Reality Index: {} Weekly Update", names.join(" + "))
        });

        info!("Sending newsletter to {} subscribers", subscribers.len());

        let mut report = EmailReport {
            total_recipients: subscribers.len(),
            ..EmailReport::default()
        };

        for subscriber in subscribers {
            let unsubscribe_url =
                format!("{}/unsubscribe/{}", self.base_url, subscriber.unsubscribe_token);
            let html = markdown_to_html(content, &unsubscribe_url);

            match self.deliver(&subscriber.email, &subject, &html).await {
                Ok(message_id) => {
                    report.successful_sends += 1;
                    report.results.push(SendResult {
                        email: subscriber.email.clone(),
                        status: "success",
                        message_id,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("Failed to send to {}: {e}", subscriber.email);
                    report.failed_sends += 1;
                    report.results.push(SendResult {
                        email: subscriber.email.clone(),
                        status: "failed",
                        message_id: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        report
    }

    pub async fn send_confirmation_email(
        &self,
        email: &str,
        topic_keys: &[String],
        unsubscribe_token: &str,
    ) -> Result<()> {
        let names: Vec<String> = topic_keys.iter().map(|k| topics::display_name(k)).collect();
        let joined = names.join(" + ");
        let subject =
            format!("Welcome to The Reality Index - {joined} Subscription Confirmed");

        let content = format!(
            "# Welcome to The Reality Index!\n\n\
             ## Your subscription is confirmed\n\n\
             Thank you for subscribing to The Reality Index newsletter for **{joined}**.\n\n\
             ### What happens next?\n\n\
             - **When you'll receive newsletters:** every Friday at 6:00 PM PST\n\
             - **What you'll get:** AI-generated insights from prediction market data\n\
             - **Your topics:** {}\n\n\
             ### About The Reality Index\n\n\
             We analyze thousands of prediction markets to identify what will actually happen \
             versus just opinions and media hype. Our AI processes market signals to find the \
             most significant trends in your chosen topic areas.\n\n\
             You can unsubscribe anytime using the link in any newsletter.\n\n\
             ---\n\n\
             Welcome aboard!\n\n\
             **The Reality Index Team**\n",
            names.join(", "),
        );

        let unsubscribe_url = format!("{}/unsubscribe/{unsubscribe_token}", self.base_url);
        let html = markdown_to_html(&content, &unsubscribe_url);
        self.deliver(email, &subject, &html).await?;
        Ok(())
    }

    async fn deliver(&self, to: &str, subject: &str, html_body: &str) -> Result<Option<String>> {
        let message = PostmarkMessage {
            from: &self.from_email,
            to,
            subject,
            html_body,
            message_stream: "outbound",
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("X-Postmark-Server-Token", &self.api_key)
            .json(&message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Email(format!("Postmark returned {status}: {body}")));
        }

        let parsed: PostmarkResponse = response.json().await?;
        if parsed.error_code != 0 {
            return Err(AppError::Email(format!(
                "Postmark error {}: {}",
                parsed.error_code, parsed.message
            )));
        }
        Ok(parsed.message_id)
    }
}

/// First markdown H1 line, used as the email subject.
pub fn extract_ai_title(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("# ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Inline `**bold**` spans. Unbalanced markers are left as literal text.
fn render_inline(s: &str) -> String {
    let escaped = escape_html(s);
    let parts: Vec<&str> = escaped.split("**").collect();
    if parts.len() < 3 || parts.len() % 2 == 0 {
        return escaped;
    }

    let mut out = String::with_capacity(escaped.len());
    for (i, part) in parts.iter().enumerate() {
        if i % 2 == 1 {
            out.push_str("<strong>");
            out.push_str(part);
            out.push_str("</strong>");
        } else {
            out.push_str(part);
        }
    }
    out
}

/// Convert generator markdown (headers, bold, bullet lists, horizontal
/// rules, paragraphs) to a styled standalone HTML document with an
/// unsubscribe footer.
pub fn markdown_to_html(markdown: &str, unsubscribe_url: &str) -> String {
    let mut body = String::new();
    let mut in_list = false;
    let mut paragraph: Vec<String> = Vec::new();

    let flush_paragraph = |body: &mut String, paragraph: &mut Vec<String>| {
        if !paragraph.is_empty() {
            body.push_str("<p>");
            body.push_str(&paragraph.join("<br>\n"));
            body.push_str("</p>\n");
            paragraph.clear();
        }
    };
    let close_list = |body: &mut String, in_list: &mut bool| {
        if *in_list {
            body.push_str("</ul>\n");
            *in_list = false;
        }
    };

    for line in markdown.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush_paragraph(&mut body, &mut paragraph);
            close_list(&mut body, &mut in_list);
            continue;
        }

        if trimmed == "---" {
            flush_paragraph(&mut body, &mut paragraph);
            close_list(&mut body, &mut in_list);
            body.push_str("<hr>\n");
            continue;
        }

        let header = [("#### ", "h4"), ("### ", "h3"), ("## ", "h2"), ("# ", "h1")]
            .iter()
            .find_map(|(prefix, tag)| trimmed.strip_prefix(prefix).map(|rest| (*tag, rest)));
        if let Some((tag, rest)) = header {
            flush_paragraph(&mut body, &mut paragraph);
            close_list(&mut body, &mut in_list);
            body.push_str(&format!("<{tag}>{}</{tag}>\n", render_inline(rest)));
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            flush_paragraph(&mut body, &mut paragraph);
            if !in_list {
                body.push_str("<ul>\n");
                in_list = true;
            }
            body.push_str(&format!("<li>{}</li>\n", render_inline(item)));
            continue;
        }

        close_list(&mut body, &mut in_list);
        paragraph.push(render_inline(trimmed));
    }
    flush_paragraph(&mut body, &mut paragraph);
    close_list(&mut body, &mut in_list);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>The Reality Index Newsletter</title>
    <style>
        body {{
            font-family: Georgia, 'Times New Roman', serif;
            line-height: 1.6;
            color: #333;
            max-width: 600px;
            margin: 0 auto;
            padding: 20px;
            background-color: #f9fafb;
        }}
        .container {{
            background-color: white;
            border-radius: 8px;
            padding: 30px;
            box-shadow: 0 1px 3px rgba(0, 0, 0, 0.1);
        }}
        h1, h2, h3, h4 {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Helvetica Neue', Arial, sans-serif;
            font-weight: 600;
        }}
        h1 {{
            color: #1f2937;
            border-bottom: 2px solid #3b82f6;
            padding-bottom: 10px;
            margin-bottom: 20px;
        }}
        h2 {{
            color: #374151;
            border-left: 4px solid #3b82f6;
            padding-left: 15px;
            margin-top: 30px;
        }}
        h3 {{ color: #4b5563; margin-top: 25px; }}
        h4 {{ color: #6b7280; margin-top: 20px; }}
        strong {{ font-weight: 600; color: #1f2937; }}
        p {{ margin-bottom: 15px; }}
        ul {{ margin-bottom: 15px; padding-left: 25px; }}
        li {{ margin-bottom: 5px; }}
        a {{ color: #3b82f6; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
    </style>
</head>
<body>
    <div class="container">
        {body}
        <div style="margin-top: 40px; padding-top: 20px; border-top: 1px solid #e5e7eb; text-align: center;">
            <p style="margin: 0; color: #6b7280; font-size: 14px;">
                Don't want to receive these emails?
                <a href="{unsubscribe_url}" style="color: #3b82f6; text-decoration: none;">Unsubscribe here</a>
            </p>
            <p style="margin: 8px 0 0 0; color: #9ca3af; font-size: 12px;">
                The Reality Index &bull; AI-Generated Prediction Market Newsletter
            </p>
        </div>
    </div>
</body>
</html>
"#
    )
}

/// Minimal shape check, intentionally permissive.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_extraction() {
        let md = "Preamble\n\n# The Reality Index: Fed Week\n\n## Body";
        assert_eq!(extract_ai_title(md).as_deref(), Some("The Reality Index: Fed Week"));
        assert_eq!(extract_ai_title("## only subheaders"), None);
        assert_eq!(extract_ai_title(""), None);
    }

    #[test]
    fn markdown_headers_and_bold_render() {
        let html = markdown_to_html(
            "# Title\n\n## Section\n\nSome **bold** text.\n\n- item one\n- item **two**\n",
            "https://example.com/unsubscribe/tok",
        );
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<h2>Section</h2>"));
        assert!(html.contains("Some <strong>bold</strong> text."));
        assert!(html.contains("<li>item one</li>"));
        assert!(html.contains("<li>item <strong>two</strong></li>"));
        assert!(html.contains("https://example.com/unsubscribe/tok"));
    }

    #[test]
    fn unbalanced_bold_is_left_alone() {
        assert_eq!(render_inline("a ** b"), "a ** b");
        assert_eq!(render_inline("plain"), "plain");
    }

    #[test]
    fn html_is_escaped() {
        let html = markdown_to_html("x < y & z > w\n", "u");
        assert!(html.contains("x &lt; y &amp; z &gt; w"));
    }

    #[test]
    fn horizontal_rule_and_paragraph_joining() {
        let html = markdown_to_html("line one\nline two\n\n---\n\nafter\n", "u");
        assert!(html.contains("<p>line one<br>\nline two</p>"));
        assert!(html.contains("<hr>"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn email_shape_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("nobody"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user name@example.com"));
        assert!(!is_valid_email("user@.com"));
    }
}
