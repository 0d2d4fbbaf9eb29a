use crate::builtin;
use crate::descriptor::Descriptor;
use crate::{Tre, TreError};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;

/// Source of descriptors the registry does not hold itself.
pub trait PluginLookup {
    fn lookup(&self, tag: &str) -> Option<Descriptor>;
}

impl<F> PluginLookup for F
where
    F: Fn(&str) -> Option<Descriptor>,
{
    fn lookup(&self, tag: &str) -> Option<Descriptor> {
        self(tag)
    }
}

/// Maps TRE tags to descriptors. Its own table is consulted first, then
/// each lookup in the order it was added.
#[derive(Default)]
pub struct Registry {
    descriptors: HashMap<String, Descriptor>,
    lookups: Vec<Box<dyn PluginLookup>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tags: Vec<&String> = self.descriptors.keys().collect();
        tags.sort();
        f.debug_struct("Registry")
            .field("descriptors", &tags)
            .field("lookups", &self.lookups.len())
            .finish()
    }
}

impl Registry {
    /// An empty registry; every TRE decodes raw.
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn with_builtins() -> Registry {
        let mut registry = Registry::new();
        for descriptor in builtin::descriptors() {
            registry.register(descriptor);
        }
        registry
    }

    /// Adds a descriptor, replacing any previous one for the same tag.
    pub fn register(&mut self, descriptor: Descriptor) {
        self.descriptors
            .insert(descriptor.tag().to_owned(), descriptor);
    }

    pub fn add_lookup<L: PluginLookup + 'static>(&mut self, lookup: L) {
        self.lookups.push(Box::new(lookup));
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.descriptors.contains_key(tag)
    }

    pub fn descriptor(&self, tag: &str) -> Option<Descriptor> {
        if let Some(descriptor) = self.descriptors.get(tag) {
            return Some(descriptor.clone());
        }
        self.lookups.iter().find_map(|lookup| lookup.lookup(tag))
    }

    /// Decodes a payload, failing on any descriptor mismatch.
    pub fn decode_strict(&self, tag: &str, payload: &[u8]) -> Result<Tre, TreError> {
        match self.descriptor(tag) {
            Some(descriptor) => descriptor.decode(tag, payload),
            None => {
                debug!("no descriptor for TRE {}, keeping raw", tag);
                Tre::raw(tag, payload.to_vec())
            }
        }
    }

    /// Decodes a payload. A payload that does not fit its descriptor is kept
    /// raw and the error is returned alongside.
    pub fn decode(&self, tag: &str, payload: &[u8]) -> (Tre, Option<TreError>) {
        match self.decode_strict(tag, payload) {
            Ok(tre) => (tre, None),
            Err(error) => {
                warn!("TRE {} kept raw: {}", tag, error);
                let tre = Tre::raw_unchecked(tag, payload.to_vec());
                (tre, Some(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Item;
    use bcs::Kind;

    #[test]
    fn test_unknown_tag_is_raw() {
        let registry = Registry::new();
        let (tre, warning) = registry.decode("ZZZZZZ", b"payload");
        assert!(tre.is_raw());
        assert!(warning.is_none());
    }

    #[test]
    fn test_lookup_consulted_after_table() {
        let mut registry = Registry::new();
        registry.register(Descriptor::new(
            "ONE",
            vec![Item::field("A", Kind::Alphanumeric, 2)],
        ));
        registry.add_lookup(|tag: &str| match tag {
            "ONE" | "TWO" => Some(Descriptor::new(
                tag,
                vec![Item::field("B", Kind::Numeric, 2)],
            )),
            _ => None,
        });

        let (one, _) = registry.decode("ONE", b"xy");
        assert!(one.field("A").is_some());
        let (two, _) = registry.decode("TWO", b"12");
        assert_eq!(two.field("B").and_then(|f| f.as_u64()), Some(12));
        assert!(registry.descriptor("THREE").is_none());
    }

    #[test]
    fn test_mismatch_falls_back_to_raw() {
        let mut registry = Registry::new();
        registry.register(Descriptor::new(
            "NUM",
            vec![Item::field("N", Kind::Numeric, 3)],
        ));
        let (tre, warning) = registry.decode("NUM", b"abc");
        assert!(tre.is_raw());
        assert!(matches!(warning, Some(TreError::Field { .. })));
        assert_eq!(tre.encode_payload().unwrap(), b"abc");
        assert!(registry.decode_strict("NUM", b"abc").is_err());
    }
}
