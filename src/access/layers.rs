//! Layer policy tree
//!
//! Layers are resource kinds addressed by dot-separated paths. Each layer
//! carries one or more policy variants; `default` is used whenever the
//! requested variant is missing. Lookups walk the tree segment by segment,
//! and anything not found resolves to the empty policy (no opinion).

use crate::access::path;
use crate::config::{LayerEntryConfig, LayersConfig, PolicyConfig};
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Variant used when no (known) variant is requested
pub const DEFAULT_VARIANT: &str = "default";

/// Prefix marking a variant key in configuration (`_default`, `_staff`)
const VARIANT_PREFIX: char = '_';

static EMPTY_POLICY: Policy = Policy {
    owner_can: None,
    anyone_can: None,
    no_one_can: None,
    inherit: false,
};

/// Rules of one layer variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Policy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_can: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anyone_can: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_one_can: Option<String>,
    pub inherit: bool,
}

impl Policy {
    /// The policy that grants nothing and blocks nothing
    pub fn empty() -> &'static Policy {
        &EMPTY_POLICY
    }

    pub fn is_empty(&self) -> bool {
        self == &EMPTY_POLICY
    }

    /// Actions named by this policy, with the rule naming them
    pub fn actions(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("owner_can", self.owner_can.as_deref()),
            ("anyone_can", self.anyone_can.as_deref()),
            ("no_one_can", self.no_one_can.as_deref()),
        ]
        .into_iter()
        .filter_map(|(rule, action)| action.map(|a| (rule, a)))
    }
}

impl From<&PolicyConfig> for Policy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            owner_can: config.owner_can.clone(),
            anyone_can: config.anyone_can.clone(),
            no_one_can: config.no_one_can.clone(),
            inherit: config.inherit,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LayerNode {
    variants: BTreeMap<String, Policy>,
    children: BTreeMap<String, LayerNode>,
}

/// A policy as listed by [`LayerTree::entries`]
#[derive(Debug, Clone, Serialize)]
pub struct LayerEntry<'a> {
    pub layer: String,
    pub variant: &'a str,
    pub policy: &'a Policy,
}

/// Immutable tree of layer policies
#[derive(Debug, Clone, Default)]
pub struct LayerTree {
    root: LayerNode,
}

impl LayerTree {
    /// Compile the configured layer tree
    pub fn from_config(config: &LayersConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            root: Self::compile(None, config)?,
        })
    }

    fn compile(layer: Option<&str>, config: &LayersConfig) -> Result<LayerNode, ConfigError> {
        let mut node = LayerNode::default();

        for (key, entry) in &config.0 {
            if let Some(variant) = key.strip_prefix(VARIANT_PREFIX) {
                let Some(layer) = layer else {
                    return Err(ConfigError::Invalid {
                        message: format!("variant '{}' must belong to a layer", key),
                    });
                };
                if variant.is_empty() {
                    return Err(ConfigError::Invalid {
                        message: format!("layer '{}' has an unnamed variant", layer),
                    });
                }
                let LayerEntryConfig::Policy(policy) = entry else {
                    return Err(ConfigError::Invalid {
                        message: format!(
                            "variant '{}' of layer '{}' is not a policy table",
                            key, layer
                        ),
                    });
                };
                node.variants.insert(variant.to_string(), Policy::from(policy));
                continue;
            }

            if key.is_empty() || key.contains(path::SEPARATOR) {
                return Err(ConfigError::Invalid {
                    message: format!("invalid layer name '{}'", key),
                });
            }

            let child_path = match layer {
                Some(parent) => format!("{}{}{}", parent, path::SEPARATOR, key),
                None => key.clone(),
            };

            let child = match entry {
                LayerEntryConfig::Layer(children) => Self::compile(Some(&child_path), children)?,
                // An empty table parses as a policy; treat it as an empty layer
                LayerEntryConfig::Policy(policy) if *policy == PolicyConfig::default() => {
                    LayerNode::default()
                }
                LayerEntryConfig::Policy(_) => {
                    return Err(ConfigError::Invalid {
                        message: format!(
                            "layer '{}' has policy fields outside a variant; use '{}.{}default'",
                            child_path, child_path, VARIANT_PREFIX
                        ),
                    });
                }
            };
            node.children.insert(key.clone(), child);
        }

        Ok(node)
    }

    fn find(&self, layer: &str) -> Option<&LayerNode> {
        path::segments(layer).try_fold(&self.root, |node, segment| node.children.get(segment))
    }

    /// Resolve the policy for a layer and optional variant.
    ///
    /// Prefers the named variant, then `default`; unknown layers and layers
    /// without a usable variant resolve to the empty policy.
    pub fn resolve(&self, layer: &str, variant: Option<&str>) -> &Policy {
        let Some(node) = self.find(layer) else {
            return Policy::empty();
        };

        variant
            .filter(|v| !v.is_empty())
            .and_then(|v| node.variants.get(v))
            .or_else(|| node.variants.get(DEFAULT_VARIANT))
            .unwrap_or(Policy::empty())
    }

    /// Whether the tree defines this layer
    pub fn contains(&self, layer: &str) -> bool {
        self.find(layer).is_some()
    }

    /// Every layer path with its variant names, depth first
    pub fn layer_paths(&self) -> Vec<(String, Vec<&str>)> {
        self.flatten()
            .into_iter()
            .map(|(layer, node)| (layer, node.variants.keys().map(String::as_str).collect()))
            .collect()
    }

    /// Every (layer, variant, policy) triple, depth first
    pub fn entries(&self) -> Vec<LayerEntry<'_>> {
        self.flatten()
            .into_iter()
            .flat_map(|(layer, node)| {
                node.variants.iter().map(move |(variant, policy)| LayerEntry {
                    layer: layer.clone(),
                    variant,
                    policy,
                })
            })
            .collect()
    }

    fn flatten(&self) -> Vec<(String, &LayerNode)> {
        let mut layers = Vec::new();
        Self::collect(&self.root, None, &mut layers);
        layers
    }

    fn collect<'a>(
        node: &'a LayerNode,
        layer: Option<&str>,
        layers: &mut Vec<(String, &'a LayerNode)>,
    ) {
        for (name, child) in &node.children {
            let child_path = match layer {
                Some(parent) => format!("{}{}{}", parent, path::SEPARATOR, name),
                None => name.clone(),
            };
            layers.push((child_path.clone(), child));
            Self::collect(child, Some(&child_path), layers);
        }
    }
}
