//! Named module catalog
//!
//! Keeps every registered module, runs them by name and carries their
//! stored arguments to and from the state file.

use crate::module::{Execution, HelpOptions, Module};
use crate::runner::ModuleRunner;
use shellvec_config::StateFile;
use shellvec_core::{Error, Result, Session};
use std::collections::BTreeMap;

#[derive(Default)]
pub struct Catalog {
    modules: BTreeMap<String, Box<dyn Module>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Box<dyn Module>) -> Result<()> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(Error::Initialization(format!("duplicate module '{}'", name)));
        }
        tracing::debug!(module = %name, "registered module");
        self.modules.insert(name, module);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&dyn Module> {
        self.modules
            .get(name)
            .map(|m| m.as_ref())
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut (dyn Module + 'static)> {
        self.modules
            .get_mut(name)
            .map(|m| m.as_mut())
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    /// Module names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Names of modules whose name or description contains `query`,
    /// ignoring case.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.modules
            .values()
            .filter(|m| {
                m.name().to_lowercase().contains(&query)
                    || m.base().description().to_lowercase().contains(&query)
            })
            .map(|m| m.name())
            .collect()
    }

    pub fn help(&self, name: &str, opts: &HelpOptions) -> Result<String> {
        Ok(self.get(name)?.base().format_help(opts))
    }

    pub fn store(&mut self, name: &str, pairs: &[String]) -> Result<()> {
        self.get_mut(name)?.base_mut().store_args(pairs);
        Ok(())
    }

    pub fn run<S: AsRef<str>>(
        &mut self,
        session: &mut Session,
        name: &str,
        tokens: &[S],
    ) -> Result<Execution> {
        let module = self.get_mut(name)?;
        ModuleRunner::new(session).run(module, tokens)
    }

    /// Replace every module's stored arguments with what `state` holds.
    pub fn load_state(&mut self, state: &StateFile) {
        for (name, module) in &mut self.modules {
            if let Some(stored) = state.module(name) {
                module.base_mut().arguments_mut().replace_stored(stored.clone());
            }
        }
    }

    pub fn save_state(&self, state: &mut StateFile) {
        for (name, module) in &self.modules {
            state.set_module(name, module.base().arguments().stored().clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Parameter;
    use crate::module::{Context, ModuleBase};
    use crate::vector::VectorRegistry;
    use shellvec_core::{Flow, ReplayChannel, ResultValue};

    struct Whoami {
        base: ModuleBase,
    }

    impl Whoami {
        fn boxed(name: &str, description: &str) -> Box<dyn Module> {
            let base = ModuleBase::new(
                name,
                description,
                vec![Parameter::flag("prefix", "Output prefix")],
                VectorRegistry::new(),
            )
            .unwrap();
            Box::new(Self { base })
        }
    }

    impl Module for Whoami {
        fn base(&self) -> &ModuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModuleBase {
            &mut self.base
        }

        fn probe(&mut self, ctx: &mut Context<'_>) -> Flow<ResultValue> {
            let prefix = ctx.args.get("prefix").unwrap_or("");
            Ok(ResultValue::text(format!("{}www-data", prefix)))
        }
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.register(Whoami::boxed("system.whoami", "Current remote user")).unwrap();
        catalog.register(Whoami::boxed("system.info", "Collect system information")).unwrap();
        catalog
    }

    fn session() -> Session {
        let mut session = Session::new(Box::new(ReplayChannel::default()));
        session.set_echo(false);
        session
    }

    #[test]
    fn test_duplicate_module_is_init_error() {
        let mut catalog = catalog();
        let err = catalog.register(Whoami::boxed("system.info", "")).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_search_matches_name_and_description() {
        let catalog = catalog();
        assert_eq!(catalog.search("WHOAMI"), vec!["system.whoami"]);
        assert_eq!(catalog.search("information"), vec!["system.info"]);
        assert_eq!(catalog.search("system").len(), 2);
        assert!(catalog.search("sql").is_empty());
    }

    #[test]
    fn test_run_unknown_module() {
        let mut catalog = catalog();
        let err = catalog.run::<&str>(&mut session(), "file.read", &[]).unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(_)));
    }

    #[test]
    fn test_stored_arguments_apply_to_run() {
        let mut catalog = catalog();
        catalog.store("system.whoami", &["prefix=user: ".to_string()]).unwrap();
        let exec = catalog.run::<&str>(&mut session(), "system.whoami", &[]).unwrap();
        assert_eq!(exec.output, "user: www-data");
    }

    #[test]
    fn test_state_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.yaml");

        let mut catalog = catalog();
        catalog.store("system.info", &["prefix=> ".to_string()]).unwrap();
        let mut state = StateFile::default();
        catalog.save_state(&mut state);
        state.save(&path).unwrap();

        let mut fresh = self::catalog();
        fresh.load_state(&StateFile::load(&path).unwrap());
        assert_eq!(
            fresh.get("system.info").unwrap().base().arguments().stored().get("prefix"),
            Some(&Some("> ".to_string()))
        );
        assert!(fresh
            .get("system.whoami")
            .unwrap()
            .base()
            .arguments()
            .stored()
            .is_empty());
    }
}
