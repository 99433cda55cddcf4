//! # Event Containers
//!
//! The container is the node rendered events accumulate in. The loop never
//! owns it: callers hand in `&mut dyn EventContainer` and keep it afterwards.
//!
//! Containers only grow. Nothing here clears, reorders or deduplicates
//! children.

use std::io::{self, Write};

use log::{debug, warn};

use super::fragment::TrustedFragment;

/// Tag used for every rendered event node.
pub const EVENT_TAG: &str = "div";

/// A single child node created for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    pub inner_html: TrustedFragment,
}

impl Element {
    pub fn new(inner_html: TrustedFragment) -> Self {
        Self {
            tag: EVENT_TAG,
            inner_html,
        }
    }

    pub fn outer_html(&self) -> String {
        format!("<{tag}>{}</{tag}>", self.inner_html, tag = self.tag)
    }
}

pub trait EventContainer {
    /// Appends `element` as the last child.
    fn append_child(&mut self, element: Element);

    /// True once the container can no longer show anything, e.g. its output
    /// was closed. The poll loop stops when this turns true.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Renders `events` into `container`, one `div` per fragment, in order.
///
/// `None` and an empty list are both a no-op. Returns how many nodes were
/// appended.
pub fn render_events(
    events: Option<Vec<TrustedFragment>>,
    container: &mut dyn EventContainer,
) -> usize {
    let Some(events) = events else {
        return 0;
    };
    let count = events.len();
    for fragment in events {
        container.append_child(Element::new(fragment));
    }
    if count > 0 {
        debug!("Rendered {} event(s)", count);
    }
    count
}

// ============================================================================
// In-memory container
// ============================================================================

/// Container that keeps its children in memory, like a detached DOM node.
#[derive(Debug, Default)]
pub struct DomContainer {
    children: Vec<Element>,
}

impl DomContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Serialized markup of all children, in document order.
    pub fn inner_html(&self) -> String {
        self.children.iter().map(Element::outer_html).collect()
    }
}

impl EventContainer for DomContainer {
    fn append_child(&mut self, element: Element) {
        self.children.push(element);
    }
}

// ============================================================================
// Writer container
// ============================================================================

/// Container that streams each appended element to a writer, one per line.
///
/// The first write failure closes the container: it is kept in `error()`
/// and every later element is dropped without touching the writer.
pub struct WriterContainer<W: Write> {
    writer: W,
    written: usize,
    error: Option<io::Error>,
}

impl<W: Write> WriterContainer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            error: None,
        }
    }

    /// Number of elements successfully written.
    pub fn written(&self) -> usize {
        self.written
    }

    /// The write failure that closed this container, if any.
    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_element(&mut self, element: &Element) -> io::Result<()> {
        writeln!(self.writer, "{}", element.outer_html())?;
        self.writer.flush()
    }
}

impl<W: Write> EventContainer for WriterContainer<W> {
    fn append_child(&mut self, element: Element) {
        if self.error.is_some() {
            return;
        }
        match self.write_element(&element) {
            Ok(()) => self.written += 1,
            Err(e) => {
                warn!("Failed to write event node, closing output: {}", e);
                self.error = Some(e);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.error.is_some()
    }
}
