//! shellvec-modules
//!
//! Built-in modules, registered into a [`Catalog`] once per session.
//! FOR AUTHORIZED PENETRATION TESTING, CTF, AND EDUCATIONAL USE ONLY.

pub mod bruteforce;

use shellvec_config::Config;
use shellvec_core::Result;
use shellvec_engine::Catalog;

/// Catalog holding every built-in module, configured from `config`.
pub fn builtin(config: &Config) -> Result<Catalog> {
    let mut catalog = Catalog::new();
    catalog.register(Box::new(bruteforce::Sql::new(config.chunking.clone())?))?;
    Ok(catalog)
}
