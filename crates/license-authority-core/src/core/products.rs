// crates/license-authority-core/src/core/products.rs
// ============================================================================
// Module: Product Registry
// Description: Product definitions, tiers, and the static registry.
// Purpose: Resolve license tiers once instead of matching name suffixes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every license request names a product. The [`ProductRegistry`] maps the
//! product identifier to a [`ProductDefinition`] carrying its
//! [`ProductTier`], feature list, and certificate metadata. Callers branch on
//! the tier enum rather than on naming conventions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ProductId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default community license lifetime in days.
pub const DEFAULT_COMMUNITY_TTL_DAYS: u32 = 365;

// ============================================================================
// SECTION: Types
// ============================================================================

/// License tier for a product.
///
/// # Invariants
/// - Variants are stable labels embedded in issued certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductTier {
    /// Free tier issued with an unconditional TTL.
    Community,
    /// Paid tier governed by an agreement with reuse semantics.
    Enterprise,
}

impl ProductTier {
    /// Returns the stable label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Enterprise => "enterprise",
        }
    }
}

/// Static description of a licensable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDefinition {
    /// Product identifier.
    pub id: ProductId,
    /// Human-readable product name.
    pub display_name: String,
    /// License tier.
    pub tier: ProductTier,
    /// Product line code embedded as the certificate country attribute.
    pub product_line: String,
    /// Features unlocked by the license (embedded as the organization).
    #[serde(default)]
    pub features: Vec<String>,
    /// Community license lifetime in days.
    #[serde(default = "default_community_ttl_days")]
    pub community_ttl_days: u32,
    /// Optional maximum number of clusters per enterprise agreement.
    #[serde(default)]
    pub max_clusters: Option<u32>,
}

/// Returns the default community TTL.
const fn default_community_ttl_days() -> u32 {
    DEFAULT_COMMUNITY_TTL_DAYS
}

impl ProductDefinition {
    /// Returns the comma-joined feature list used in the organization field.
    #[must_use]
    pub fn feature_list(&self) -> String {
        self.features.join(",")
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Lookup table of known products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRegistry {
    /// Product definitions keyed by identifier.
    products: BTreeMap<ProductId, ProductDefinition>,
}

impl ProductRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from definitions; later entries replace earlier ones.
    #[must_use]
    pub fn from_definitions(definitions: impl IntoIterator<Item = ProductDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition);
        }
        registry
    }

    /// Returns the built-in product catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_definitions(builtin_products())
    }

    /// Inserts or replaces a definition.
    pub fn insert(&mut self, definition: ProductDefinition) {
        self.products.insert(definition.id.clone(), definition);
    }

    /// Resolves a product definition.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&ProductDefinition> {
        self.products.get(id)
    }

    /// Iterates definitions in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &ProductDefinition> {
        self.products.values()
    }

    /// Returns the number of registered products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns true when no product is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Built-in product definitions.
fn builtin_products() -> Vec<ProductDefinition> {
    vec![
        ProductDefinition {
            id: ProductId::new("platform-community"),
            display_name: "Platform Community".to_string(),
            tier: ProductTier::Community,
            product_line: "PL".to_string(),
            features: vec!["platform".to_string()],
            community_ttl_days: DEFAULT_COMMUNITY_TTL_DAYS,
            max_clusters: None,
        },
        ProductDefinition {
            id: ProductId::new("platform-enterprise"),
            display_name: "Platform Enterprise".to_string(),
            tier: ProductTier::Enterprise,
            product_line: "PL".to_string(),
            features: vec![
                "platform".to_string(),
                "backup".to_string(),
                "monitoring".to_string(),
            ],
            community_ttl_days: DEFAULT_COMMUNITY_TTL_DAYS,
            max_clusters: None,
        },
    ]
}
