use std::path::Path;

use andro_llm::ProviderPart;
use base64::Engine as _;
use snafu::{ResultExt, Snafu, ensure};

use crate::message::Part;

/// Characters of URL or single-file context forwarded to the API.
pub const CONTEXT_CHAR_LIMIT: usize = 6000;
pub const TRUNCATION_MARKER: &str = "... [CONTENT TRUNCATED]";
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
pub const ALLOWED_TEXT_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/html",
    "text/css",
    "text/javascript",
    "application/json",
    "application/xml",
];

/// User-selected context staged for the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Image {
        file_name: String,
        mime_type: String,
        base64: String,
    },
    Text {
        file_name: String,
        mime_type: String,
        content: String,
    },
    Url {
        url: String,
        content: String,
    },
}

impl Attachment {
    pub fn label(&self) -> &str {
        match self {
            Self::Image { file_name, .. } | Self::Text { file_name, .. } => file_name,
            Self::Url { url, .. } => url,
        }
    }

    /// Images and URLs cannot share the staging area with anything else.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Image { .. } | Self::Url { .. })
    }
}

/// Staging area for attachments pending the next send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentSet {
    items: Vec<Attachment>,
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an attachment. Images and URLs replace whatever is staged; text
    /// files accumulate unless an exclusive attachment is present.
    pub fn stage(&mut self, attachment: Attachment) {
        if attachment.is_exclusive() || self.items.iter().any(Attachment::is_exclusive) {
            self.items.clear();
        }
        self.items.push(attachment);
    }

    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn as_slice(&self) -> &[Attachment] {
        &self.items
    }
}

/// Display-bound and API-bound renditions of one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltParts {
    pub display: Vec<Part>,
    pub api: Vec<ProviderPart>,
}

impl BuiltParts {
    fn text_only(display: String, api: String) -> Self {
        Self {
            display: vec![Part::text(display)],
            api: vec![ProviderPart::text(api)],
        }
    }
}

pub fn build_parts(message: &str, attachments: &[Attachment]) -> BuiltParts {
    match attachments {
        [] => BuiltParts::text_only(message.to_string(), message.to_string()),
        [Attachment::Url { url, content }] => BuiltParts::text_only(
            display_with_prefix(&format!("[Attached URL: {url}]"), message),
            wrap_single_context(&format!("CONTEXT FROM URL: {url}"), content, message),
        ),
        [Attachment::Text {
            file_name, content, ..
        }] => BuiltParts::text_only(
            display_with_prefix(&format!("[Attached File: {file_name}]"), message),
            wrap_single_context(&format!("CONTEXT FROM FILE: {file_name}"), content, message),
        ),
        [
            Attachment::Image {
                file_name,
                mime_type,
                base64,
            },
        ] => {
            let mut display = vec![Part::inline_data(
                mime_type.clone(),
                base64.clone(),
                Some(file_name.clone()),
            )];
            let mut api = vec![ProviderPart::inline_data(mime_type.clone(), base64.clone())];
            if !message.trim().is_empty() {
                display.push(Part::text(message));
                api.push(ProviderPart::text(message));
            }
            BuiltParts { display, api }
        }
        many => build_many(message, many),
    }
}

fn build_many(message: &str, attachments: &[Attachment]) -> BuiltParts {
    let mut display = Vec::new();
    let mut api = Vec::new();
    let mut labels = Vec::new();
    let mut context = String::new();

    for attachment in attachments {
        match attachment {
            Attachment::Image {
                file_name,
                mime_type,
                base64,
            } => {
                display.push(Part::inline_data(
                    mime_type.clone(),
                    base64.clone(),
                    Some(file_name.clone()),
                ));
                api.push(ProviderPart::inline_data(mime_type.clone(), base64.clone()));
            }
            Attachment::Text { file_name, content, .. } => {
                labels.push(file_name.as_str());
                push_file_block(&mut context, file_name, content);
            }
            Attachment::Url { url, content } => {
                labels.push(url.as_str());
                push_file_block(&mut context, url, content);
            }
        }
    }

    if labels.is_empty() {
        if !message.trim().is_empty() {
            display.push(Part::text(message));
            api.push(ProviderPart::text(message));
        }
        return BuiltParts { display, api };
    }

    display.push(Part::text(display_with_prefix(
        &format!("[Attached Files: {}]", labels.join(", ")),
        message,
    )));
    api.push(ProviderPart::text(format!(
        "{context}---\n\nUSER PROMPT: {message}"
    )));

    BuiltParts { display, api }
}

fn push_file_block(context: &mut String, name: &str, content: &str) {
    context.push_str(&format!(
        "--- START OF FILE {name} ---\n{content}\n--- END OF FILE {name} ---\n\n"
    ));
}

fn display_with_prefix(prefix: &str, message: &str) -> String {
    format!("{prefix} {message}").trim_end().to_string()
}

fn wrap_single_context(header: &str, content: &str, message: &str) -> String {
    let content = truncate_context(content);
    format!("{header}\n\n\"\"\"\n{content}\n\"\"\"\n\n---\n\nUSER PROMPT: {message}")
}

/// Caps context at [`CONTEXT_CHAR_LIMIT`] characters, marking the cut.
pub fn truncate_context(content: &str) -> String {
    match content.char_indices().nth(CONTEXT_CHAR_LIMIT) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_string(),
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AttachmentError {
    #[snafu(display("failed to read attachment {path}"))]
    ReadAttachment {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("attachment {path} is {size_bytes} bytes, limit is {limit_bytes}"))]
    TooLarge {
        stage: &'static str,
        path: String,
        size_bytes: u64,
        limit_bytes: u64,
    },
    #[snafu(display("attachment {path} has unsupported type '{mime_type}'"))]
    DisallowedType {
        stage: &'static str,
        path: String,
        mime_type: String,
    },
    #[snafu(display("attachment {path} is not valid UTF-8 text"))]
    NotUtf8 {
        stage: &'static str,
        path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("'{url}' is not a valid http(s) URL"))]
    InvalidUrl { stage: &'static str, url: String },
    #[snafu(display("failed to fetch {url} on `{stage}`: {source}"))]
    FetchUrl {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

/// Reads a local file into an attachment, enforcing size and type limits.
pub fn load_attachment(path: &Path) -> AttachmentResult<Attachment> {
    let display_path = path.display().to_string();
    let metadata = std::fs::metadata(path).context(ReadAttachmentSnafu {
        stage: "stat-attachment",
        path: display_path.clone(),
    })?;

    ensure!(
        metadata.len() <= MAX_FILE_SIZE,
        TooLargeSnafu {
            stage: "check-attachment-size",
            path: display_path.clone(),
            size_bytes: metadata.len(),
            limit_bytes: MAX_FILE_SIZE,
        }
    );

    let mime_type = mime_type_for_path(path);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_path.clone());

    let bytes = std::fs::read(path).context(ReadAttachmentSnafu {
        stage: "read-attachment",
        path: display_path.clone(),
    })?;

    if ALLOWED_IMAGE_TYPES.contains(&mime_type) {
        return Ok(Attachment::Image {
            file_name,
            mime_type: mime_type.to_string(),
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        });
    }

    ensure!(
        is_allowed_text_type(mime_type),
        DisallowedTypeSnafu {
            stage: "check-attachment-type",
            path: display_path.clone(),
            mime_type: mime_type.to_string(),
        }
    );

    let content = String::from_utf8(bytes).context(NotUtf8Snafu {
        stage: "decode-attachment-text",
        path: display_path,
    })?;

    Ok(Attachment::Text {
        file_name,
        mime_type: mime_type.to_string(),
        content,
    })
}

pub fn is_allowed_text_type(mime_type: &str) -> bool {
    ALLOWED_TEXT_TYPES.contains(&mime_type) || mime_type.starts_with("text/")
}

/// Extension-based MIME lookup covering the types the input bar accepts.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "rs" => "text/x-rust",
        "py" => "text/x-python",
        "toml" => "text/x-toml",
        "yaml" | "yml" => "text/yaml",
        "sh" => "text/x-shellscript",
        _ => "application/octet-stream",
    }
}

/// Fetches a page body to attach as URL context.
pub async fn fetch_url_context(url: &str) -> AttachmentResult<Attachment> {
    let url = url.trim();
    ensure!(
        url.starts_with("http://") || url.starts_with("https://"),
        InvalidUrlSnafu {
            stage: "validate-url",
            url: url.to_string(),
        }
    );

    let response = reqwest::get(url)
        .await
        .and_then(reqwest::Response::error_for_status)
        .context(FetchUrlSnafu {
            stage: "send-url-request",
            url: url.to_string(),
        })?;

    let content = response.text().await.context(FetchUrlSnafu {
        stage: "read-url-body",
        url: url.to_string(),
    })?;

    tracing::debug!(url = %url, content_len = content.len(), "fetched url context");

    Ok(Attachment::Url {
        url: url.to_string(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_file(name: &str, content: &str) -> Attachment {
        Attachment::Text {
            file_name: name.to_string(),
            mime_type: "text/plain".to_string(),
            content: content.to_string(),
        }
    }

    fn api_text(parts: &BuiltParts) -> &str {
        match parts.api.as_slice() {
            [ProviderPart::Text(text)] => text,
            other => panic!("expected one api text part, got {other:?}"),
        }
    }

    #[test]
    fn plain_message_is_verbatim_on_both_sides() {
        let parts = build_parts("hello", &[]);

        assert_eq!(parts.display, vec![Part::text("hello")]);
        assert_eq!(parts.api, vec![ProviderPart::text("hello")]);
    }

    #[test]
    fn url_context_under_limit_is_embedded_in_full() {
        let content = "a".repeat(CONTEXT_CHAR_LIMIT);
        let attachment = Attachment::Url {
            url: "https://example.com".to_string(),
            content: content.clone(),
        };

        let parts = build_parts("hello", &[attachment]);
        let api = api_text(&parts);

        assert!(api.contains("USER PROMPT: hello"));
        assert!(api.contains(&content));
        assert!(!api.contains(TRUNCATION_MARKER));
        assert_eq!(
            parts.display,
            vec![Part::text("[Attached URL: https://example.com] hello")]
        );
    }

    #[test]
    fn url_context_over_limit_is_truncated_with_marker() {
        let content = format!("{}{}", "b".repeat(CONTEXT_CHAR_LIMIT), "OVERFLOW");
        let attachment = Attachment::Url {
            url: "https://example.com/long".to_string(),
            content,
        };

        let parts = build_parts("hello", &[attachment]);
        let api = api_text(&parts);
        let expected = format!("{}{TRUNCATION_MARKER}", "b".repeat(CONTEXT_CHAR_LIMIT));

        assert!(api.contains(&expected));
        assert!(!api.contains("OVERFLOW"));
        assert!(api.ends_with("USER PROMPT: hello"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "é".repeat(CONTEXT_CHAR_LIMIT + 1);

        let truncated = truncate_context(&content);

        assert_eq!(
            truncated,
            format!("{}{TRUNCATION_MARKER}", "é".repeat(CONTEXT_CHAR_LIMIT))
        );
    }

    #[test]
    fn single_text_file_uses_file_header() {
        let parts = build_parts("summarise", &[text_file("notes.md", "# Notes")]);

        assert!(api_text(&parts).starts_with("CONTEXT FROM FILE: notes.md"));
        assert_eq!(
            parts.display,
            vec![Part::text("[Attached File: notes.md] summarise")]
        );
    }

    #[test]
    fn image_keeps_file_name_for_display_only() {
        let attachment = Attachment::Image {
            file_name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            base64: "iVBOR".to_string(),
        };

        let parts = build_parts("what is this", &[attachment.clone()]);

        assert_eq!(
            parts.display,
            vec![
                Part::inline_data("image/png", "iVBOR", Some("cat.png".to_string())),
                Part::text("what is this"),
            ]
        );
        assert_eq!(
            parts.api,
            vec![
                ProviderPart::inline_data("image/png", "iVBOR"),
                ProviderPart::text("what is this"),
            ]
        );

        let silent = build_parts("  ", &[attachment]);
        assert_eq!(silent.display.len(), 1);
        assert_eq!(silent.api.len(), 1);
    }

    #[test]
    fn multiple_text_files_concatenate_in_order() {
        let parts = build_parts(
            "compare",
            &[text_file("a.txt", "alpha"), text_file("b.txt", "beta")],
        );
        let api = api_text(&parts);

        let first = api.find("--- START OF FILE a.txt ---");
        let second = api.find("--- START OF FILE b.txt ---");
        assert!(matches!((first, second), (Some(a), Some(b)) if a < b));
        assert!(api.contains("alpha\n--- END OF FILE a.txt ---"));
        assert!(api.ends_with("USER PROMPT: compare"));
        assert_eq!(
            parts.display,
            vec![Part::text("[Attached Files: a.txt, b.txt] compare")]
        );
    }

    #[test]
    fn exclusive_attachments_replace_staging() {
        let mut staged = AttachmentSet::new();
        staged.stage(text_file("a.txt", "alpha"));
        staged.stage(text_file("b.txt", "beta"));
        assert_eq!(staged.len(), 2);

        staged.stage(Attachment::Url {
            url: "https://example.com".to_string(),
            content: "page".to_string(),
        });
        assert_eq!(staged.len(), 1);

        staged.stage(text_file("c.txt", "gamma"));
        assert_eq!(staged.as_slice(), &[text_file("c.txt", "gamma")]);

        assert_eq!(staged.remove(3), None);
        assert!(staged.remove(0).is_some());
        assert!(staged.is_empty());
    }

    #[test]
    fn mime_lookup_and_text_allow_list() {
        assert_eq!(mime_type_for_path(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("main.rs")), "text/x-rust");
        assert_eq!(mime_type_for_path(Path::new("archive.zip")), "application/octet-stream");

        assert!(is_allowed_text_type("application/json"));
        assert!(is_allowed_text_type("text/csv"));
        assert!(!is_allowed_text_type("application/pdf"));
    }

    #[test]
    fn load_attachment_enforces_type_and_reads_text() {
        let directory = std::env::temp_dir().join(format!("andro-attach-{}", uuid::Uuid::now_v7()));
        if let Err(error) = std::fs::create_dir_all(&directory) {
            panic!("temp dir: {error}");
        }

        let text_path = directory.join("notes.md");
        let binary_path = directory.join("blob.bin");
        let image_path = directory.join("dot.png");
        for (path, bytes) in [
            (&text_path, b"# hi".as_slice()),
            (&binary_path, b"\x00\x01".as_slice()),
            (&image_path, b"\x89PNG".as_slice()),
        ] {
            if let Err(error) = std::fs::write(path, bytes) {
                panic!("write fixture: {error}");
            }
        }

        assert!(matches!(
            load_attachment(&text_path),
            Ok(Attachment::Text { ref content, ref mime_type, .. })
                if content == "# hi" && mime_type == "text/markdown"
        ));
        assert!(matches!(
            load_attachment(&binary_path),
            Err(AttachmentError::DisallowedType { .. })
        ));
        assert!(matches!(
            load_attachment(&image_path),
            Ok(Attachment::Image { ref base64, .. }) if base64 == "iVBORw=="
        ));
        assert!(matches!(
            load_attachment(&directory.join("missing.txt")),
            Err(AttachmentError::ReadAttachment { .. })
        ));

        let _ = std::fs::remove_dir_all(&directory);
    }

    #[tokio::test]
    async fn fetch_rejects_non_http_urls() {
        assert!(matches!(
            fetch_url_context("ftp://example.com").await,
            Err(AttachmentError::InvalidUrl { .. })
        ));
    }
}
