//! Configuration access port trait.

/// Raw key lookup by INI section. Typed parsing and defaults live in
/// [`crate::domain::config`].
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
