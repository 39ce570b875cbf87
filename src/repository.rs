//! The fixed set of known mask variants, keyed by nominal size.
//!
//! A repository is built once at startup and shared read-only. Loading is
//! tolerant: a variant that fails to decode is reported and skipped, and
//! an empty repository simply means the automatic path is unavailable.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::mask::{MaskAsset, MaskConfig, MaskSource};

/// One size-selection rule: matches when BOTH image dimensions strictly
/// exceed the minima.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRule {
    /// Image width must strictly exceed this.
    pub min_width: u32,
    /// Image height must strictly exceed this.
    pub min_height: u32,
    /// Nominal stencil size chosen when the rule matches.
    pub nominal_size: u32,
}

/// Default policy: the 96px stencil above 1024x1024, the 48px one otherwise.
///
/// The two tiers mirror the two watermark rendering sizes used by the
/// source compositor; this is a discrete table, not proportional scaling.
pub const DEFAULT_SELECTION_RULES: &[SelectionRule] = &[
    SelectionRule {
        min_width: 1024,
        min_height: 1024,
        nominal_size: 96,
    },
    SelectionRule {
        min_width: 0,
        min_height: 0,
        nominal_size: 48,
    },
];

/// A mask variant that failed to load; the repository continues without it.
#[derive(Debug)]
pub struct LoadFailure {
    /// Nominal size of the failed variant.
    pub nominal_size: u32,
    /// Why it failed.
    pub error: Error,
}

/// Loaded mask variants plus the selection policy over them.
#[derive(Debug, Clone)]
pub struct MaskRepository {
    masks: BTreeMap<u32, MaskAsset>,
    rules: Vec<SelectionRule>,
}

impl Default for MaskRepository {
    fn default() -> Self {
        Self::empty()
    }
}

impl MaskRepository {
    /// A repository with no variants and the default selection rules.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            masks: BTreeMap::new(),
            rules: DEFAULT_SELECTION_RULES.to_vec(),
        }
    }

    /// Load every configured variant.
    ///
    /// Never fails outright: each variant that cannot be read or decoded is
    /// recorded in the returned failure list and the rest still load. The
    /// result may be empty, which callers must treat as "automatic mode
    /// unavailable", not as an error.
    #[must_use]
    pub fn load(configs: &[MaskConfig]) -> (Self, Vec<LoadFailure>) {
        let mut repository = Self::empty();
        let mut failures = Vec::new();

        for config in configs {
            match load_one(config) {
                Ok(asset) => {
                    repository.masks.insert(config.nominal_size, asset);
                }
                Err(error) => failures.push(LoadFailure {
                    nominal_size: config.nominal_size,
                    error,
                }),
            }
        }

        (repository, failures)
    }

    /// Replace the selection rule table (evaluated in order).
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<SelectionRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Insert an already-built asset, e.g. a synthetic stencil.
    pub fn insert(&mut self, nominal_size: u32, asset: MaskAsset) {
        self.masks.insert(nominal_size, asset);
    }

    /// Whether no variant loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Number of loaded variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Look up a variant by nominal size.
    #[must_use]
    pub fn get(&self, nominal_size: u32) -> Option<&MaskAsset> {
        self.masks.get(&nominal_size)
    }

    /// Nominal size the rule table names for an image of the given size.
    ///
    /// The first matching rule wins; with no match at all (a custom table
    /// without a catch-all) the last rule's size is used.
    #[must_use]
    pub fn nominal_size_for(&self, width: u32, height: u32) -> u32 {
        self.rules
            .iter()
            .find(|rule| width > rule.min_width && height > rule.min_height)
            .or_else(|| self.rules.last())
            .map_or(0, |rule| rule.nominal_size)
    }

    /// Pick the variant for an image of the given size.
    ///
    /// `None` means that size class never loaded; the caller must fall back
    /// to manual mode rather than fail.
    #[must_use]
    pub fn select(&self, width: u32, height: u32) -> Option<&MaskAsset> {
        self.get(self.nominal_size_for(width, height))
    }
}

fn load_one(config: &MaskConfig) -> Result<MaskAsset> {
    match &config.source {
        MaskSource::Bytes(bytes) => MaskAsset::from_bytes(bytes, config.margin),
        MaskSource::Path(path) => {
            let bytes = std::fs::read(path)?;
            MaskAsset::from_bytes(&bytes, config.margin)
        }
    }
}
