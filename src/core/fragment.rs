//! # Trusted Fragments
//!
//! Event payloads are HTML fragments that get inserted as raw markup.
//! Anything that ends up inside a container has to pass through
//! `TrustedFragment` first, so the point where server markup is trusted
//! shows up in the types instead of hiding in the renderer.

use std::fmt;

/// Markup that is allowed to be inserted into a container verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedFragment(String);

impl TrustedFragment {
    /// Trusts `markup` as-is. Script tags, event handlers and friends go
    /// straight through, so only call this for content from a server you control.
    pub fn trust(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    /// Treats `text` as plain text and escapes it so it renders literally.
    pub fn escaped(text: &str) -> Self {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustedFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
