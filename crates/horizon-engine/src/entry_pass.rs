//! Entry passes.
//!
//! A ticket's `entry_payload` is fixed at issue time. Renderers turn it
//! into whatever the door scanner reads (QR image, PDF, plain text); the
//! output depends on the payload alone.

/// Turns an entry payload into printable bytes.
pub trait EntryPassRenderer: Send + Sync {
    fn render(&self, payload: &str) -> Vec<u8>;

    /// MIME type of the rendered bytes.
    fn content_type(&self) -> &'static str;
}

/// A plain-text pass, for terminals and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPassRenderer;

impl EntryPassRenderer for TextPassRenderer {
    fn render(&self, payload: &str) -> Vec<u8> {
        format!("HORIZON ENTRY PASS\n{payload}\n").into_bytes()
    }

    fn content_type(&self) -> &'static str {
        "text/plain"
    }
}

/// A rendered pass with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPass {
    pub ticket_number: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}
