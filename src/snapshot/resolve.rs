//! Reference resolution
//!
//! Turns a catalog reference back into a live element handle. The document
//! may have mutated since capture, so resolution is an ordered fallback
//! chain over the descriptor's identifying data: stable attributes first,
//! content matching next, position last. A strategy that errors or matches
//! nothing simply yields to the next one; only exhaustion of the whole
//! chain is reported.

use crate::driver::{Driver, DriverElement, Locator};
use crate::error::{ResolveError, Result};
use crate::snapshot::{Catalog, ElementDescriptor};
use tracing::{debug, instrument};

/// Tags whose visible text is a usable selector; text-matching against
/// form controls is unreliable and skipped.
const TEXT_MATCH_TAGS: &[&str] = &["a", "button"];

/// Tunables for reference resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Maximum per-axis distance, in pixels, between the captured and the
    /// current bounding-box origin for the positional fallback. Small enough
    /// to disambiguate neighbors, large enough to survive minor reflow.
    pub position_tolerance: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            position_tolerance: 10.0,
        }
    }
}

/// One step of the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Match by recorded `id` attribute
    ById,
    /// Match by recorded `name` attribute
    ByName,
    /// Match by visible text within the descriptor's tag, anchor/button
    /// family only
    ByText,
    /// Match by exact `aria-label`
    ByAriaLabel,
    /// Match by bounding-box origin within tolerance, same tag
    ByPosition,
}

impl Strategy {
    /// The chain, in priority order: attribute identity, then content,
    /// then position
    pub const ALL: [Strategy; 5] = [
        Strategy::ById,
        Strategy::ByName,
        Strategy::ByText,
        Strategy::ByAriaLabel,
        Strategy::ByPosition,
    ];

    /// Whether the descriptor carries the data this strategy needs
    pub fn applies(&self, descriptor: &ElementDescriptor) -> bool {
        match self {
            Strategy::ById => descriptor.attributes.id.is_some(),
            Strategy::ByName => descriptor.attributes.name.is_some(),
            Strategy::ByText => {
                !descriptor.text.is_empty() && TEXT_MATCH_TAGS.contains(&descriptor.tag.as_str())
            }
            Strategy::ByAriaLabel => descriptor.aria_label.is_some(),
            Strategy::ByPosition => true,
        }
    }

    /// Attempt this strategy; `None` means it did not succeed, for any
    /// reason, including driver errors
    pub async fn attempt<D: Driver>(
        &self,
        driver: &D,
        descriptor: &ElementDescriptor,
        options: &ResolveOptions,
    ) -> Option<D::Element> {
        match self {
            Strategy::ById => {
                let id = descriptor.attributes.id.as_ref()?;
                first_displayed(driver, &Locator::Id(id.clone())).await
            }
            Strategy::ByName => {
                let name = descriptor.attributes.name.as_ref()?;
                first_displayed(driver, &Locator::Name(name.clone())).await
            }
            Strategy::ByText => {
                let candidates = driver
                    .find_elements(&Locator::Tag(descriptor.tag.clone()))
                    .await
                    .ok()?;
                for candidate in candidates {
                    if !candidate.is_displayed().await.unwrap_or(false) {
                        continue;
                    }
                    // A candidate can detach between the visibility check and
                    // the read; skip it rather than abandoning the strategy.
                    let Ok(live) = candidate.text().await else {
                        continue;
                    };
                    // Captured text may be truncated; contains covers it.
                    if live == descriptor.text || live.contains(&descriptor.text) {
                        return Some(candidate);
                    }
                }
                None
            }
            Strategy::ByAriaLabel => {
                let label = descriptor.aria_label.as_ref()?;
                first_displayed(driver, &Locator::AriaLabel(label.clone())).await
            }
            Strategy::ByPosition => {
                let candidates = driver
                    .find_elements(&Locator::Tag(descriptor.tag.clone()))
                    .await
                    .ok()?;
                for candidate in candidates {
                    if !candidate.is_displayed().await.unwrap_or(false) {
                        continue;
                    }
                    let Ok(rect) = candidate.rect().await else {
                        continue;
                    };
                    if (rect.x - descriptor.rect.x).abs() <= options.position_tolerance
                        && (rect.y - descriptor.rect.y).abs() <= options.position_tolerance
                    {
                        return Some(candidate);
                    }
                }
                None
            }
        }
    }
}

/// First currently-displayed element matching a locator
async fn first_displayed<D: Driver>(driver: &D, locator: &Locator) -> Option<D::Element> {
    let candidates = driver.find_elements(locator).await.ok()?;
    for candidate in candidates {
        if candidate.is_displayed().await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

/// Resolve a reference from `catalog` to a live element handle
///
/// Fails with [`ResolveError::RefNotFound`] when the reference is not in
/// the catalog, and [`ResolveError::ResolutionFailed`] when every
/// applicable strategy came up empty.
#[instrument(skip(driver, catalog, options))]
pub async fn resolve<D: Driver>(
    driver: &D,
    catalog: &Catalog,
    reference: &str,
    options: &ResolveOptions,
) -> Result<D::Element> {
    let descriptor = catalog.get(reference).ok_or_else(|| ResolveError::RefNotFound {
        reference: reference.to_string(),
        known: catalog.references(),
    })?;

    for strategy in Strategy::ALL {
        if !strategy.applies(descriptor) {
            continue;
        }
        if let Some(element) = strategy.attempt(driver, descriptor, options).await {
            debug!(?strategy, reference, "Resolved element");
            return Ok(element);
        }
    }

    Err(ResolveError::ResolutionFailed {
        reference: reference.to_string(),
        tag: descriptor.tag.clone(),
    }
    .into())
}
