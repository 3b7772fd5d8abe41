//! Element catalog capture
//!
//! A capture walks the interactive elements of the focused document and
//! produces an immutable [`Catalog`]: an ordered table of opaque references
//! (`e1`, `e2`, ...) to [`ElementDescriptor`] records. Descriptors carry
//! identifying data only, never live handles; turning a reference back into
//! a live element is the resolver's job (see [`resolve`]).
//!
//! Capture is read-only and re-run on demand. The policy is snapshot, act,
//! re-snapshot — not a live subscription to DOM changes.

use crate::driver::{Driver, DriverElement, Locator, Rect};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

pub mod resolve;

pub use resolve::{resolve, ResolveOptions, Strategy};

/// Bounds applied during capture
#[derive(Debug, Clone)]
pub struct CaptureLimits {
    /// Maximum catalog entries; keeps capture cost predictable on
    /// pathological pages
    pub max_elements: usize,
    /// Maximum stored visible-text length, in characters
    pub text_limit: usize,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_elements: 100,
            text_limit: 100,
        }
    }
}

/// The fixed attribute subset recorded per element; each field is present
/// only when the live attribute read returned a value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementAttributes {
    /// `id` attribute
    pub id: Option<String>,
    /// `name` attribute
    pub name: Option<String>,
    /// `type` attribute
    pub r#type: Option<String>,
    /// `href` attribute
    pub href: Option<String>,
    /// `placeholder` attribute
    pub placeholder: Option<String>,
}

/// Snapshot-time record of one interactive element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Reference token indexing this descriptor within its catalog
    pub reference: String,
    /// Lowercase tag name
    pub tag: String,
    /// Visible text at capture time, truncated
    pub text: String,
    /// Accessible label (`aria-label`), when present
    pub aria_label: Option<String>,
    /// Recorded attribute subset
    pub attributes: ElementAttributes,
    /// Tag/attribute-based clickability heuristic
    pub clickable: bool,
    /// Bounding box at capture time
    pub rect: Rect,
}

impl ElementDescriptor {
    /// Preferred short label: accessible label, else visible text, else tag
    pub fn label(&self) -> &str {
        match self.aria_label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ if !self.text.is_empty() => &self.text,
            _ => &self.tag,
        }
    }
}

/// Immutable inventory of interactive elements from one capture
#[derive(Debug, Clone)]
pub struct Catalog {
    url: String,
    title: String,
    captured_at: DateTime<Utc>,
    entries: Vec<ElementDescriptor>,
}

impl Catalog {
    /// Build a catalog from already-captured descriptors
    pub fn from_descriptors(
        url: impl Into<String>,
        title: impl Into<String>,
        entries: Vec<ElementDescriptor>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            captured_at: Utc::now(),
            entries,
        }
    }

    /// Capture the interactive elements of the focused document
    #[instrument(skip(driver, limits))]
    pub async fn capture<D: Driver>(driver: &D, limits: &CaptureLimits) -> Result<Self> {
        let url = driver.current_url().await?;
        let title = driver.title().await?;

        let candidates = driver.find_elements(&Locator::interactive()).await?;
        let mut entries = Vec::new();

        for element in candidates {
            if entries.len() >= limits.max_elements {
                debug!(cap = limits.max_elements, "Capture element cap reached");
                break;
            }
            let reference = format!("e{}", entries.len() + 1);
            // A candidate that throws mid-inspection is already detached;
            // skip it rather than failing the whole capture.
            match describe(&element, reference, limits).await {
                Ok(Some(descriptor)) => entries.push(descriptor),
                Ok(None) => {}
                Err(e) => warn!("Skipping element during capture: {e}"),
            }
        }

        debug!(count = entries.len(), %url, "Captured snapshot");
        Ok(Self {
            url,
            title,
            captured_at: Utc::now(),
            entries,
        })
    }

    /// Page URL at capture time
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Page title at capture time
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Capture timestamp
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Descriptor for a reference, if it belongs to this catalog
    pub fn get(&self, reference: &str) -> Option<&ElementDescriptor> {
        self.entries.iter().find(|d| d.reference == reference)
    }

    /// All references, in capture (document) order
    pub fn references(&self) -> Vec<String> {
        self.entries.iter().map(|d| d.reference.clone()).collect()
    }

    /// Descriptors in capture order
    pub fn entries(&self) -> &[ElementDescriptor] {
        &self.entries
    }

    /// Number of catalog entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deterministic human-legible rendering: page state header plus one
    /// line per entry in capture order
    pub fn format_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len() + 5);
        lines.push("### Page state".to_string());
        lines.push(format!("- Page URL: {}", self.url));
        lines.push(format!("- Page Title: {}", self.title));
        lines.push("- Page Snapshot:".to_string());
        lines.push("```yaml".to_string());
        for entry in &self.entries {
            let mut line = format!("- {}", entry.tag);
            let label = entry.label();
            if label != entry.tag {
                line.push_str(&format!(" \"{label}\""));
            }
            line.push_str(&format!(" [ref={}]", entry.reference));
            if !entry.clickable {
                line.push_str(" [disabled]");
            }
            lines.push(line);
        }
        lines.push("```".to_string());
        lines.join("\n")
    }
}

/// Inspect one live element into a descriptor; `None` when not displayed
async fn describe<E: DriverElement>(
    element: &E,
    reference: String,
    limits: &CaptureLimits,
) -> Result<Option<ElementDescriptor>> {
    if !element.is_displayed().await? {
        return Ok(None);
    }

    let tag = element.tag_name().await?;
    let text = truncate(&element.text().await?, limits.text_limit);
    let aria_label = element.attribute("aria-label").await?;
    let role = element.attribute("role").await?;
    let onclick = element.attribute("onclick").await?;

    let attributes = ElementAttributes {
        id: element.attribute("id").await?,
        name: element.attribute("name").await?,
        r#type: element.attribute("type").await?,
        href: element.attribute("href").await?,
        placeholder: element.attribute("placeholder").await?,
    };

    let clickable = is_clickable(&tag, role.as_deref(), onclick.is_some());
    let rect = element.rect().await?;

    Ok(Some(ElementDescriptor {
        reference,
        tag,
        text,
        aria_label,
        attributes,
        clickable,
        rect,
    }))
}

/// Tag/attribute heuristic for whether an element accepts activation
fn is_clickable(tag: &str, role: Option<&str>, has_onclick: bool) -> bool {
    matches!(tag, "a" | "button" | "input" | "select" | "textarea")
        || matches!(role, Some("button" | "link" | "checkbox" | "radio"))
        || has_onclick
}

/// Truncate to a character budget without splitting a code point
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDriver, FakeNode};
    use pretty_assertions::assert_eq;

    fn three_buttons() -> Vec<FakeNode> {
        vec![
            FakeNode::new("button").text("A").at(10.0, 10.0),
            FakeNode::new("button").text("B").at(100.0, 10.0),
            FakeNode::new("button").text("C").at(190.0, 10.0),
        ]
    }

    #[tokio::test]
    async fn test_capture_assigns_unique_refs_in_document_order() {
        let driver = FakeDriver::with_nodes(three_buttons());
        let catalog = Catalog::capture(&driver, &CaptureLimits::default())
            .await
            .unwrap();

        assert_eq!(catalog.references(), vec!["e1", "e2", "e3"]);
        assert_eq!(catalog.get("e1").unwrap().text, "A");
        assert_eq!(catalog.get("e2").unwrap().text, "B");
        assert_eq!(catalog.get("e3").unwrap().text, "C");
    }

    #[tokio::test]
    async fn test_capture_is_idempotent_on_static_page() {
        let driver = FakeDriver::with_nodes(three_buttons());
        let limits = CaptureLimits::default();
        let first = Catalog::capture(&driver, &limits).await.unwrap();
        let second = Catalog::capture(&driver, &limits).await.unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.entries().iter().zip(second.entries()) {
            assert_eq!(a.reference, b.reference);
            assert_eq!(a.tag, b.tag);
            assert_eq!(a.text, b.text);
            assert_eq!(a.attributes, b.attributes);
        }
    }

    #[tokio::test]
    async fn test_capture_skips_hidden_elements() {
        let driver = FakeDriver::with_nodes(vec![
            FakeNode::new("button").text("shown"),
            FakeNode::new("button").text("hidden").hidden(),
            FakeNode::new("a").text("link").attr("href", "/x"),
        ]);
        let catalog = Catalog::capture(&driver, &CaptureLimits::default())
            .await
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("e1").unwrap().text, "shown");
        assert_eq!(catalog.get("e2").unwrap().tag, "a");
        assert_eq!(catalog.get("e2").unwrap().attributes.href.as_deref(), Some("/x"));
    }

    #[tokio::test]
    async fn test_capture_respects_element_cap() {
        let nodes = (0..250)
            .map(|i| FakeNode::new("button").text(&format!("b{i}")))
            .collect();
        let driver = FakeDriver::with_nodes(nodes);
        let limits = CaptureLimits {
            max_elements: 100,
            ..Default::default()
        };
        let catalog = Catalog::capture(&driver, &limits).await.unwrap();

        assert_eq!(catalog.len(), 100);
        assert_eq!(catalog.entries().last().unwrap().reference, "e100");
    }

    #[tokio::test]
    async fn test_capture_truncates_text() {
        let long = "x".repeat(500);
        let driver = FakeDriver::with_nodes(vec![FakeNode::new("button").text(&long)]);
        let catalog = Catalog::capture(&driver, &CaptureLimits::default())
            .await
            .unwrap();

        assert_eq!(catalog.get("e1").unwrap().text.chars().count(), 100);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn test_clickable_heuristic() {
        assert!(is_clickable("button", None, false));
        assert!(is_clickable("a", None, false));
        assert!(is_clickable("div", Some("button"), false));
        assert!(is_clickable("div", None, true));
        assert!(!is_clickable("div", Some("presentation"), false));
        assert!(!is_clickable("span", None, false));
    }

    #[test]
    fn test_descriptor_label_preference() {
        let mut descriptor = ElementDescriptor {
            reference: "e1".to_string(),
            tag: "button".to_string(),
            text: "Visible".to_string(),
            aria_label: Some("Accessible".to_string()),
            attributes: ElementAttributes::default(),
            clickable: true,
            rect: Rect::default(),
        };
        assert_eq!(descriptor.label(), "Accessible");

        descriptor.aria_label = None;
        assert_eq!(descriptor.label(), "Visible");

        descriptor.text.clear();
        assert_eq!(descriptor.label(), "button");
    }

    #[test]
    fn test_format_text_is_stable() {
        let entries = vec![
            ElementDescriptor {
                reference: "e1".to_string(),
                tag: "button".to_string(),
                text: "Save".to_string(),
                aria_label: None,
                attributes: ElementAttributes::default(),
                clickable: true,
                rect: Rect::default(),
            },
            ElementDescriptor {
                reference: "e2".to_string(),
                tag: "span".to_string(),
                text: String::new(),
                aria_label: None,
                attributes: ElementAttributes::default(),
                clickable: false,
                rect: Rect::default(),
            },
        ];
        let catalog =
            Catalog::from_descriptors("https://example.com", "Example", entries.clone());
        let rendered = catalog.format_text();

        assert!(rendered.contains("- Page URL: https://example.com"));
        assert!(rendered.contains("- Page Title: Example"));
        assert!(rendered.contains("- button \"Save\" [ref=e1]"));
        assert!(rendered.contains("- span [ref=e2] [disabled]"));

        let again = Catalog::from_descriptors("https://example.com", "Example", entries);
        assert_eq!(rendered, again.format_text());
    }
}
