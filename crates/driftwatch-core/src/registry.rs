use std::collections::HashMap;

use thiserror::Error;

/// A configuration entry named a type tag that no compiled-in adapter handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} type '{tag}'")]
pub struct UnknownTypeError {
    /// What was being resolved ("poller", "notifier", ...).
    pub kind: &'static str,
    pub tag: String,
}

/// Registry mapping a config type tag to a constructor.
///
/// Built once at startup from the closed set of compiled-in adapters and
/// read-only afterwards. `C` is whatever the caller needs to build an
/// instance, usually a boxed `Fn(&Config) -> Arc<dyn Trait>`.
pub struct TypeRegistry<C> {
    kind: &'static str,
    constructors: HashMap<String, C>,
}

impl<C> TypeRegistry<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor under `tag`, replacing any previous one.
    pub fn register(&mut self, tag: impl Into<String>, constructor: C) -> &mut Self {
        self.constructors.insert(tag.into(), constructor);
        self
    }

    pub fn resolve(&self, tag: &str) -> Result<&C, UnknownTypeError> {
        self.constructors.get(tag).ok_or_else(|| UnknownTypeError {
            kind: self.kind,
            tag: tag.to_string(),
        })
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Greeter = fn() -> String;

    fn registry() -> TypeRegistry<Greeter> {
        let mut r: TypeRegistry<Greeter> = TypeRegistry::new("greeter");
        r.register("en", || "hello".to_string())
            .register("fr", || "bonjour".to_string());
        r
    }

    #[test]
    fn resolves_registered_tag() {
        let r = registry();
        let ctor = r.resolve("fr").unwrap();
        assert_eq!(ctor(), "bonjour");
        assert!(r.resolve("en").is_ok());
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn unknown_tag_names_kind_and_tag() {
        let r = registry();
        let err = r.resolve("de").err().unwrap();
        assert_eq!(err.kind, "greeter");
        assert_eq!(err.tag, "de");
        assert_eq!(err.to_string(), "unknown greeter type 'de'");
    }

    #[test]
    fn tags_are_sorted() {
        assert_eq!(registry().tags(), vec!["en", "fr"]);
    }

    #[test]
    fn empty_registry() {
        let r: TypeRegistry<Greeter> = TypeRegistry::new("greeter");
        assert!(r.is_empty());
        assert_eq!(r.len(), 0);
    }
}
