//! Public certificate validation page.
//!
//! Served without authentication. Every user-influenced value is
//! HTML-escaped before it reaches markup; the unknown-code page is the
//! same for empty, malformed and never-issued codes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
};

use crate::api::server::AppState;
use crate::certificate::CertificateSummary;

/// Escape a value for interpolation into HTML text content.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{title}</title>\n</head>\n<body>\n{body}\n</body>\n</html>"
    )
}

fn not_found_page() -> String {
    page(
        "Certificate Not Found",
        "<h1>Invalid certificate</h1>\n\
         <p>The supplied validation code was not found.</p>",
    )
}

fn certificate_page(summary: &CertificateSummary, site_name: &str) -> String {
    let holder = escape_html(&summary.holder_name);
    let course = escape_html(&summary.course_title);
    let code = escape_html(&summary.validation_code);
    let issued = summary.issued_at.format("%Y-%m-%d").to_string();
    let site = escape_html(site_name);
    page(
        "Authentic Certificate",
        &format!(
            "<h1>Authentic certificate</h1>\n\
             <p>This certifies that</p>\n<h2>{holder}</h2>\n\
             <p>successfully completed the course</p>\n<h3>{course}</h3>\n\
             <dl>\n<dt>Issued</dt><dd>{issued}</dd>\n\
             <dt>Validation code</dt><dd><code>{code}</code></dd>\n</dl>\n\
             <footer>{site} &mdash; public certificate verification</footer>"
        ),
    )
}

pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> (StatusCode, Html<String>) {
    match state.verifier.verify(&code).await {
        Ok(Some(summary)) => (
            StatusCode::OK,
            Html(certificate_page(&summary, &state.site_name)),
        ),
        Ok(None) => (StatusCode::NOT_FOUND, Html(not_found_page())),
        Err(e) => {
            log::error!("certificate verification failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(page("Verification Error", "<p>Internal error.</p>")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
    }

    #[test]
    fn certificate_page_escapes_holder_name() {
        let summary = CertificateSummary {
            holder_name: "<img src=x onerror=alert(1)>".to_string(),
            course_title: "Course".to_string(),
            issued_at: Utc::now(),
            validation_code: "CODE1234".to_string(),
        };
        let html = certificate_page(&summary, "CourseGate");
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn not_found_page_mentions_no_code() {
        // The page must not echo the attempted code back.
        let html = not_found_page();
        assert!(!html.contains("doesnotexist"));
    }
}
