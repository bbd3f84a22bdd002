//! Compile-time module loading.
//!
//! `require` resolves a logical module name against the configured search
//! paths, reads the file, registers its text as a compile-time script (so
//! errors inside it translate back), and delegates evaluation to the
//! driver-supplied `ModuleLoader`. Results are cached under BOTH the logical
//! name and the canonical absolute path: one physical file loaded under two
//! names evaluates once.

use std::path::{Path, PathBuf};

use crate::errors::{self, ErrorReporting, GraftError};
use crate::value::Value;

use super::MacroContext;

/// Evaluates a resolved module's text under the macro environment. Supplied
/// by the driver; the engine owns resolution and caching only.
pub trait ModuleLoader {
    fn evaluate(
        &mut self,
        ctx: &mut MacroContext,
        name: &str,
        path: &Path,
        text: &str,
    ) -> Result<Value, GraftError>;
}

impl MacroContext {
    /// Loads an auxiliary compile-time module, evaluated under the macro
    /// environment so it has access to all injection and hygiene
    /// primitives. Failure aggregates every attempted path.
    pub fn require(
        &mut self,
        name: &str,
        loader: &mut dyn ModuleLoader,
    ) -> Result<Value, GraftError> {
        if let Some(cached) = self.modules.get(name) {
            return Ok(cached.clone());
        }

        let relative = module_relative_path(name, &self.options.module_extension);
        let mut attempts = Vec::new();
        let mut resolved: Option<PathBuf> = None;
        for base in self.options.search_paths.clone() {
            let candidate = base.join(&relative);
            match std::fs::canonicalize(&candidate) {
                Ok(absolute) => {
                    resolved = Some(absolute);
                    break;
                }
                Err(_) => attempts.push(candidate.display().to_string()),
            }
        }
        let Some(absolute) = resolved else {
            return Err(self.module_not_found(name, attempts, errors::unspanned()));
        };

        // Same physical file under a different logical name: evaluate once.
        if let Some(cached) = self.module_paths.get(&absolute) {
            let value = cached.clone();
            self.modules.insert(name.to_string(), value.clone());
            return Ok(value);
        }

        let text = std::fs::read_to_string(&absolute).map_err(|io| {
            self.internal_violation(
                &format!("cannot read module '{}': {}", absolute.display(), io),
                errors::unspanned(),
            )
        })?;
        self.register_script(name, &text);

        self.push_script(name);
        let evaluated = loader.evaluate(self, name, &absolute, &text);
        self.pop_script();
        let value = evaluated?;

        self.modules.insert(name.to_string(), value.clone());
        self.module_paths.insert(absolute, value.clone());
        Ok(value)
    }
}

// Logical dots map to path separators: `lib.util` -> `lib/util.<ext>`.
fn module_relative_path(name: &str, extension: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for part in name.split('.') {
        path.push(part);
    }
    path.set_extension(extension);
    path
}
