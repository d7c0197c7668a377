//! Catalog resolution policy
//!
//! Maps a decoded payload or a typed query to at most one catalog entry.
//! Rules are tried in priority order; within a rule the first entry in
//! catalog order wins, so a barcode hit on any entry beats a SKU hit on an
//! earlier one.
//!
//! Barcode containment works in both directions: it tolerates framing
//! characters some decoders emit around the real code as well as truncated
//! reads. SKU containment only checks the payload side. Short or shared
//! barcodes can produce false positives through containment.

use super::CatalogEntry;

/// Outcome of one resolution
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Found(CatalogEntry),
    NotFound,
}

impl MatchResult {
    pub fn is_found(&self) -> bool {
        matches!(self, MatchResult::Found(_))
    }

    pub fn entry(&self) -> Option<&CatalogEntry> {
        match self {
            MatchResult::Found(entry) => Some(entry),
            MatchResult::NotFound => None,
        }
    }
}

/// Rule that produced a code match, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Barcode equals the payload, or one contains the other
    Barcode,
    /// SKU equals the payload, ignoring case
    Sku,
    /// Name equals the payload, ignoring case
    Name,
    /// Payload contains the SKU, ignoring case
    SkuInPayload,
}

const RULES: [MatchRule; 4] = [
    MatchRule::Barcode,
    MatchRule::Sku,
    MatchRule::Name,
    MatchRule::SkuInPayload,
];

impl MatchRule {
    fn matches(self, entry: &CatalogEntry, payload: &str, payload_lower: &str) -> bool {
        match self {
            MatchRule::Barcode => entry
                .barcode()
                .is_some_and(|barcode| {
                    barcode == payload || payload.contains(barcode) || barcode.contains(payload)
                }),
            MatchRule::Sku => entry.sku.to_lowercase() == payload_lower,
            MatchRule::Name => entry.name.to_lowercase() == payload_lower,
            MatchRule::SkuInPayload => {
                !entry.sku.is_empty() && payload_lower.contains(&entry.sku.to_lowercase())
            }
        }
    }
}

/// Find the entry for a decoded payload and the rule that matched it
pub fn find_code<'a>(
    payload: &str,
    catalog: &'a [CatalogEntry],
) -> Option<(MatchRule, &'a CatalogEntry)> {
    if payload.is_empty() {
        return None;
    }
    let payload_lower = payload.to_lowercase();

    RULES.iter().find_map(|&rule| {
        catalog
            .iter()
            .find(|entry| rule.matches(entry, payload, &payload_lower))
            .map(|entry| (rule, entry))
    })
}

/// Resolve a decoded payload against the catalog
pub fn resolve_code(payload: &str, catalog: &[CatalogEntry]) -> MatchResult {
    match find_code(payload, catalog) {
        Some((rule, entry)) => {
            log::debug!("Payload {:?} matched entry {} by {:?}", payload, entry.id, rule);
            MatchResult::Found(entry.clone())
        }
        None => MatchResult::NotFound,
    }
}

/// Trimmed query, or `None` if it is blank and must be ignored
pub fn normalize_query(query: &str) -> Option<&str> {
    let trimmed = query.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Resolve a typed search against SKU and name substrings
///
/// Blank queries never match.
pub fn resolve_query(query: &str, catalog: &[CatalogEntry]) -> MatchResult {
    let Some(query) = normalize_query(query) else {
        return MatchResult::NotFound;
    };
    let needle = query.to_lowercase();

    catalog
        .iter()
        .find(|entry| {
            entry.sku.to_lowercase().contains(&needle) || entry.name.to_lowercase().contains(&needle)
        })
        .map_or(MatchResult::NotFound, |entry| MatchResult::Found(entry.clone()))
}
