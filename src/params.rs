//! Named parameter trees
//!
//! Parameters are flat `f32` buffers keyed by dotted names
//! (`"encode.weight"`, `"decode.bias"`). The encoder and decoder sub-trees are
//! always carried as a [`ModelParams`] pair: initialized together, updated
//! together, and serialized together. The trainer owns the pair exclusively;
//! only the optimizer's update step mutates it.

use crate::{Error, Result};
use ndarray::Array1;
use std::collections::BTreeMap;

/// Ordered mapping from parameter name to a flat value buffer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamTree(BTreeMap<String, Array1<f32>>);

impl ParamTree {
    /// Create an empty tree
    pub fn new() -> Self {
        ParamTree(BTreeMap::new())
    }

    /// Insert or replace a parameter buffer
    pub fn insert(&mut self, name: impl Into<String>, values: Array1<f32>) {
        self.0.insert(name.into(), values);
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&Array1<f32>> {
        self.0.get(name)
    }

    /// Look up a parameter, erroring if absent
    pub fn require(&self, name: &str) -> Result<&Array1<f32>> {
        self.0.get(name).ok_or_else(|| {
            Error::shape_mismatch("parameter lookup", name, "missing parameter")
        })
    }

    /// Number of parameter buffers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameters are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of scalar values across all buffers
    pub fn num_values(&self) -> usize {
        self.0.values().map(Array1::len).sum()
    }

    /// Iterate buffers in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array1<f32>)> {
        self.0.iter().map(|(name, values)| (name.as_str(), values))
    }

    /// Iterate buffers mutably in name order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Array1<f32>)> {
        self.0.iter_mut().map(|(name, values)| (name.as_str(), values))
    }

    /// Structure signature: (name, length) pairs in name order
    pub fn structure(&self) -> Vec<(String, usize)> {
        self.0.iter().map(|(name, values)| (name.clone(), values.len())).collect()
    }

    /// Check that `other` has exactly this tree's names and buffer lengths
    pub fn check_same_structure(&self, other: &ParamTree, context: &str) -> Result<()> {
        if self.structure() != other.structure() {
            return Err(Error::shape_mismatch(context, self.structure(), other.structure()));
        }
        Ok(())
    }

    /// Tree of zeros with this tree's structure
    pub fn zeros_like(&self) -> ParamTree {
        ParamTree(
            self.0
                .iter()
                .map(|(name, values)| (name.clone(), Array1::zeros(values.len())))
                .collect(),
        )
    }
}

impl FromIterator<(String, Array1<f32>)> for ParamTree {
    fn from_iter<I: IntoIterator<Item = (String, Array1<f32>)>>(iter: I) -> Self {
        ParamTree(iter.into_iter().collect())
    }
}

/// The encoder/decoder parameter pair
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelParams {
    /// Encoder sub-tree
    pub encoder: ParamTree,
    /// Decoder sub-tree
    pub decoder: ParamTree,
}

impl ModelParams {
    /// Create a pair from its sub-trees
    pub fn new(encoder: ParamTree, decoder: ParamTree) -> Self {
        Self { encoder, decoder }
    }

    /// Flatten to `encoder.` / `decoder.`-prefixed (name, buffer) pairs in a
    /// deterministic order. This is the serialization layout.
    pub fn flatten(&self) -> Vec<(String, &Array1<f32>)> {
        let mut out = Vec::with_capacity(self.encoder.len() + self.decoder.len());
        for (name, values) in self.encoder.iter() {
            out.push((format!("encoder.{name}"), values));
        }
        for (name, values) in self.decoder.iter() {
            out.push((format!("decoder.{name}"), values));
        }
        out
    }

    /// Rebuild a pair from prefixed (name, buffer) pairs, validating the
    /// structure against `template`
    pub fn unflatten(
        entries: Vec<(String, Array1<f32>)>,
        template: &ModelParams,
    ) -> Result<ModelParams> {
        let mut encoder = ParamTree::new();
        let mut decoder = ParamTree::new();
        for (name, values) in entries {
            if let Some(rest) = name.strip_prefix("encoder.") {
                encoder.insert(rest, values);
            } else if let Some(rest) = name.strip_prefix("decoder.") {
                decoder.insert(rest, values);
            } else {
                return Err(Error::shape_mismatch(
                    "parameter pair",
                    "encoder.* or decoder.* name",
                    name,
                ));
            }
        }
        let params = ModelParams::new(encoder, decoder);
        params.check_same_structure(template, "checkpoint restore")?;
        Ok(params)
    }

    /// Check both sub-trees against a template pair
    pub fn check_same_structure(&self, template: &ModelParams, context: &str) -> Result<()> {
        template.encoder.check_same_structure(&self.encoder, context)?;
        template.decoder.check_same_structure(&self.decoder, context)
    }

    /// Pair of zeros with this pair's structure (gradient accumulators)
    pub fn zeros_like(&self) -> ModelParams {
        ModelParams::new(self.encoder.zeros_like(), self.decoder.zeros_like())
    }

    /// Total scalar count across both sub-trees
    pub fn num_values(&self) -> usize {
        self.encoder.num_values() + self.decoder.num_values()
    }
}
