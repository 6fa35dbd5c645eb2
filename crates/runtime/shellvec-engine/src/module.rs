//! Module trait and shared module state

use crate::args::{ArgumentStore, Parameter, ParameterSchema, ResolvedArgs};
use crate::vector::VectorRegistry;
use shellvec_config::StoredMap;
use shellvec_core::{Flow, Result, ResultValue, Session};

/// Name of the implicit parameter holding a forced vector.
pub const VECTOR_PARAM: &str = "vector";

/// State every module owns: name, arguments and vectors.
#[derive(Debug, Clone)]
pub struct ModuleBase {
    name: String,
    arguments: ArgumentStore,
    vectors: VectorRegistry,
}

impl ModuleBase {
    /// Build the schema from `params`. When the module declares vectors an
    /// optional `vector` flag restricted to their names is appended.
    pub fn new(
        name: &str,
        description: &str,
        params: Vec<Parameter>,
        vectors: VectorRegistry,
    ) -> Result<Self> {
        let mut schema = ParameterSchema::new(&format!(":{}", name), description);
        for param in params {
            schema.add(param)?;
        }
        if !vectors.is_empty() {
            schema.add(
                Parameter::flag(VECTOR_PARAM, "Force a specific vector").choices(vectors.names()),
            )?;
        }

        Ok(Self {
            name: name.to_string(),
            arguments: ArgumentStore::new(schema),
            vectors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        self.arguments.schema().description()
    }

    pub fn arguments(&self) -> &ArgumentStore {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut ArgumentStore {
        &mut self.arguments
    }

    pub fn vectors(&self) -> &VectorRegistry {
        &self.vectors
    }

    pub fn store_args<S: AsRef<str>>(&mut self, tokens: &[S]) {
        self.arguments.store(tokens);
    }

    pub fn format_stored_args(&self) -> String {
        self.arguments.format_stored()
    }

    pub fn format_help(&self, opts: &HelpOptions) -> String {
        let mut out = String::new();
        let schema = self.arguments.schema();

        if opts.full {
            out.push_str(&format!("{}\n", schema.render_help().trim_end()));
        } else {
            if opts.name {
                out.push_str(&format!("[{}]", self.name));
            }
            if opts.description {
                if opts.name {
                    out.push(' ');
                }
                out.push_str(&format!("{}\n", schema.description()));
            }
            if opts.usage {
                out.push_str(&format!("{}\n", schema.render_usage().trim_end()));
            }
        }

        let stored = self.format_stored_args();
        if opts.stored_args && !stored.is_empty() {
            out.push_str(&format!(
                "stored arguments: {}\n",
                stored.replace('\n', &format!("\n{}", " ".repeat(18)))
            ));
        }

        let pad = " ".repeat(opts.padding);
        let padded = format!("{}{}", pad, out.replace('\n', &format!("\n{}", pad)));
        padded.trim_end_matches(' ').to_string()
    }
}

/// Which parts of the help block to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpOptions {
    /// Full parser help instead of the compact `[name] description` form.
    pub full: bool,
    pub stored_args: bool,
    pub name: bool,
    pub description: bool,
    pub usage: bool,
    pub padding: usize,
}

impl Default for HelpOptions {
    fn default() -> Self {
        Self {
            full: true,
            stored_args: true,
            name: true,
            description: true,
            usage: true,
            padding: 0,
        }
    }
}

impl HelpOptions {
    pub fn compact() -> Self {
        Self {
            full: false,
            ..Self::default()
        }
    }
}

/// Everything one run of a module can touch.
pub struct Context<'a> {
    pub session: &'a mut Session,
    pub args: ResolvedArgs,
    module: String,
    recorded: StoredMap,
}

impl<'a> Context<'a> {
    pub fn new(session: &'a mut Session, args: ResolvedArgs, module: &str) -> Self {
        Self {
            session,
            args,
            module: module.to_string(),
            recorded: StoredMap::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// Print a notice attributed to the running module.
    pub fn warn(&mut self, message: &str) {
        self.session.notice(&self.module, message);
    }

    /// Set an argument for the rest of this run and store it once the run
    /// succeeds.
    pub fn record(&mut self, name: &str, value: &str) {
        self.args.set(name, Some(value.to_string()));
        self.recorded.insert(name.to_string(), Some(value.to_string()));
    }

    pub(crate) fn take_recorded(&mut self) -> StoredMap {
        std::mem::take(&mut self.recorded)
    }
}

/// A unit of probing logic.
///
/// The runner calls `prepare`, `probe` and `verify` in that order after
/// resolving arguments. Only `probe` is mandatory.
pub trait Module: Send {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Normalise resolved arguments before probing.
    fn prepare(&mut self, _ctx: &mut Context<'_>) -> Flow {
        Ok(())
    }

    fn probe(&mut self, ctx: &mut Context<'_>) -> Flow<ResultValue>;

    /// Post-check the structured result.
    fn verify(&mut self, _ctx: &mut Context<'_>, _result: &ResultValue) -> Flow {
        Ok(())
    }
}

/// Structured result and its rendering from one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub result: ResultValue,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;
    use shellvec_core::Error;

    fn base() -> ModuleBase {
        let vectors = VectorRegistry::new()
            .with(Vector::new("php_read", "php", "readfile('%s');"))
            .unwrap()
            .with(Vector::new("sh_cat", "sh", "cat '%s'"))
            .unwrap();
        ModuleBase::new(
            "file.read",
            "Read a remote file",
            vec![Parameter::positional("rpath", 0, "Remote path").required()],
            vectors,
        )
        .unwrap()
    }

    #[test]
    fn test_vector_parameter_is_implicit() {
        let base = base();
        let param = base.arguments().schema().get(VECTOR_PARAM).unwrap();
        assert_eq!(param.choices, vec!["php_read".to_string(), "sh_cat".to_string()]);
    }

    #[test]
    fn test_no_vector_parameter_without_vectors() {
        let base = ModuleBase::new("audit.none", "", vec![], VectorRegistry::new()).unwrap();
        assert!(base.arguments().schema().get(VECTOR_PARAM).is_none());
    }

    #[test]
    fn test_schema_clash_is_init_error() {
        let vectors = VectorRegistry::new().with(Vector::new("v", "php", "")).unwrap();
        let err = ModuleBase::new(
            "x.y",
            "",
            vec![Parameter::flag(VECTOR_PARAM, "mine")],
            vectors,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[test]
    fn test_compact_help_layout() {
        let mut base = base();
        base.store_args(&["rpath=/etc/passwd"]);

        let help = base.format_help(&HelpOptions {
            padding: 2,
            ..HelpOptions::compact()
        });
        let lines: Vec<&str> = help.lines().collect();
        assert_eq!(lines[0], "  [file.read] Read a remote file");
        assert!(lines[1].starts_with("  "));
        assert!(lines[1].contains(":file.read <rpath> [--vector VECTOR]"));
        assert_eq!(lines[2], "  stored arguments: rpath='/etc/passwd' vector='' ");
    }

    #[test]
    fn test_help_without_stored_block() {
        let help = base().format_help(&HelpOptions {
            stored_args: false,
            ..HelpOptions::default()
        });
        assert!(!help.contains("stored arguments"));
        assert!(help.contains("Read a remote file"));
    }

    #[test]
    fn test_stored_block_continuation_indent() {
        let params = (0..5)
            .map(|i| Parameter::flag(&format!("p{}", i), ""))
            .collect();
        let base = ModuleBase::new("m.n", "d", params, VectorRegistry::new()).unwrap();
        let help = base.format_help(&HelpOptions {
            name: false,
            description: false,
            usage: false,
            ..HelpOptions::compact()
        });
        assert_eq!(
            help,
            "stored arguments: p0='' p1='' p2='' p3='' \n                  p4='' \n"
        );
    }

    #[test]
    fn test_record_updates_args_and_pending_store() {
        let mut session = Session::new(Box::new(shellvec_core::ReplayChannel::default()));
        let mut ctx = Context::new(&mut session, ResolvedArgs::default(), "file.read");
        ctx.record(VECTOR_PARAM, "sh_cat");
        assert_eq!(ctx.args.get(VECTOR_PARAM), Some("sh_cat"));
        let recorded = ctx.take_recorded();
        assert_eq!(recorded.get(VECTOR_PARAM), Some(&Some("sh_cat".to_string())));
    }
}
