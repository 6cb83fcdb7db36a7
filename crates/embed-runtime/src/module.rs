//! Native module descriptors and the bootstrap protocol.

use std::fmt;

use crate::diagnostics::Diagnostics;

/// Descriptor version understood by this crate.
pub const NATIVE_MODULE_VERSION: u32 = 1;

/// Reserved internal name the native module is registered under. Only the
/// bootstrap script links it; user scripts never address it.
pub const EMBEDDER_BINDING: &str = "__embedder_mod";

/// The fixed bootstrap script.
///
/// Installs a `require` rooted at the current working directory into the
/// global scope, then links the native module, which runs its entry point.
/// Engines provide the `__embedder` object it relies on.
pub const BOOTSTRAP_SOURCE: &str = r#"(() => {
  const publicRequire = __embedder.createRequire(__embedder.cwd() + "/");
  globalThis.require = publicRequire;
  __embedder.linkedBinding("__embedder_mod");
})();
"#;

/// Entry point of a native module, called once with the engine binding.
pub type ModuleEntry<B> = Box<dyn FnOnce(&mut B) -> anyhow::Result<()> + Send>;

/// Host-provided functionality injected before user scripts run.
pub struct NativeModule<B> {
    name: String,
    version: u32,
    entry: ModuleEntry<B>,
}

impl<B> NativeModule<B> {
    pub fn new<F>(name: impl Into<String>, entry: F) -> Self
    where
        F: FnOnce(&mut B) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            version: NATIVE_MODULE_VERSION,
            entry: Box::new(entry),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Diagnostic label, used in logs and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Check the descriptor before registration.
    pub fn validate(&self) -> Result<(), Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        if self.name.is_empty() {
            diagnostics.push("native module name must not be empty");
        } else if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            diagnostics.push(format!(
                "native module name '{}' must not contain whitespace or path separators",
                self.name
            ));
        }

        if self.version != NATIVE_MODULE_VERSION {
            diagnostics.push(format!(
                "native module '{}' has version {}, expected {}",
                self.name, self.version, NATIVE_MODULE_VERSION
            ));
        }

        diagnostics.into_result(())
    }

    /// Run the entry point against the engine binding.
    pub fn link(self, binding: &mut B) -> anyhow::Result<()> {
        tracing::debug!("[native_module:{}] Linking", self.name);
        (self.entry)(binding)
    }
}

impl<B> fmt::Debug for NativeModule<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> NativeModule<Vec<String>> {
        NativeModule::new(name, |_: &mut Vec<String>| Ok(()))
    }

    #[test]
    fn test_validate_accepts_plain_name() {
        assert!(noop("host").validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let module = noop("my module").with_version(9);
        let diagnostics = module.validate().unwrap_err();

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.join().contains("whitespace"));
        assert!(diagnostics.join().contains("version 9"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let diagnostics = noop("").validate().unwrap_err();
        assert_eq!(diagnostics.join(), "native module name must not be empty");
    }

    #[test]
    fn test_link_runs_entry_with_binding() {
        let module = NativeModule::new("host", |binding: &mut Vec<String>| {
            binding.push("linked".to_string());
            Ok(())
        });
        let mut binding = Vec::new();

        module.link(&mut binding).unwrap();
        assert_eq!(binding, vec!["linked".to_string()]);
    }

    #[test]
    fn test_bootstrap_links_reserved_binding() {
        assert!(BOOTSTRAP_SOURCE.contains(EMBEDDER_BINDING));
        let require_at = BOOTSTRAP_SOURCE.find("globalThis.require").unwrap();
        let link_at = BOOTSTRAP_SOURCE.find("linkedBinding").unwrap();
        assert!(require_at < link_at);
    }
}
