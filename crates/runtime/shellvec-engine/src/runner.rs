//! Module runner
//!
//! Resolve arguments, prepare, probe, verify, format. Usage and
//! initialization errors are returned to the caller; every other failure
//! becomes one `[!] Error:` line and an empty execution, so a batch of
//! modules can continue past a failing one.

use crate::format::stringify;
use crate::module::{Context, Execution, Module};
use shellvec_core::{Error, Flow, Halt, Result, ResultValue, Session, Severity};

pub struct ModuleRunner<'s> {
    session: &'s mut Session,
}

impl<'s> ModuleRunner<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    pub fn run<S: AsRef<str>>(&mut self, module: &mut dyn Module, tokens: &[S]) -> Result<Execution> {
        let name = module.name().to_string();

        let (args, unconsumed) = module.base_mut().arguments_mut().resolve(tokens)?;
        if !unconsumed.is_empty() {
            tracing::debug!(module = %name, ?unconsumed, "ignoring unconsumed arguments");
        }

        let mut ctx = Context::new(&mut *self.session, args, &name);
        let outcome = Self::pipeline(module, &mut ctx);
        let recorded = ctx.take_recorded();

        let result = match outcome {
            Ok(result) => result,
            Err(Halt::Found(result)) => {
                tracing::debug!(module = %name, "probe finished early");
                result
            }
            Err(Halt::Failed(err)) if err.is_fatal() => return Err(err),
            Err(Halt::Failed(err)) => {
                self.report(&name, &err);
                return Ok(Execution::default());
            }
        };

        module.base_mut().arguments_mut().commit(recorded);

        match stringify(&result) {
            Ok(output) => Ok(Execution { result, output }),
            Err(err) => {
                self.report(&name, &err);
                Ok(Execution::default())
            }
        }
    }

    fn pipeline(module: &mut dyn Module, ctx: &mut Context<'_>) -> Flow<ResultValue> {
        module.prepare(ctx)?;
        let result = module.probe(ctx)?;
        module.verify(ctx, &result)?;
        Ok(result)
    }

    fn report(&mut self, running: &str, err: &Error) {
        let module = err.attributed_module().unwrap_or(running).to_string();
        tracing::warn!(module = %module, error = %err, "module run failed");
        self.session
            .emit(&module, &format!("[!] Error: {}", err), Severity::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Parameter;
    use crate::module::{ModuleBase, VECTOR_PARAM};
    use crate::vector::{Vector, VectorRegistry};
    use shellvec_core::{Payload, ReplayChannel, Scalar};

    enum Behaviour {
        Answer,
        ProbeError,
        ModuleErrorElsewhere,
        EarlyHit,
        FatalInProbe,
        Ragged,
    }

    struct Echo {
        base: ModuleBase,
        behaviour: Behaviour,
        verified: bool,
    }

    impl Echo {
        fn new(behaviour: Behaviour) -> Self {
            let vectors = VectorRegistry::new()
                .with(Vector::new("php_echo", "php", "echo '%s';"))
                .unwrap();
            let base = ModuleBase::new(
                "shell.echo",
                "Echo a string remotely",
                vec![
                    Parameter::positional("text", 0, "Text to echo").required(),
                    Parameter::flag("mode", "Mode").choices(["plain", "upper"]).default_value("plain"),
                ],
                vectors,
            )
            .unwrap();
            Self {
                base,
                behaviour,
                verified: false,
            }
        }
    }

    impl Module for Echo {
        fn base(&self) -> &ModuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModuleBase {
            &mut self.base
        }

        fn prepare(&mut self, ctx: &mut Context<'_>) -> Flow {
            if ctx.args.get("mode") == Some("upper") {
                let upper = ctx.args.require("text")?.to_uppercase();
                ctx.args.set("text", Some(upper));
            }
            Ok(())
        }

        fn probe(&mut self, ctx: &mut Context<'_>) -> Flow<ResultValue> {
            match self.behaviour {
                Behaviour::Answer => {
                    let vector = self.base.vectors().by_name("php_echo")?;
                    let body = vector.fill(&[ctx.args.require("text")?])?;
                    let response = ctx.session.deliver(&vector.capability, &Payload::new(body))?;
                    ctx.record(VECTOR_PARAM, &vector.name);
                    Ok(response.map(ResultValue::text).unwrap_or_default())
                }
                Behaviour::ProbeError => Err(Error::probe("host unreachable").into()),
                Behaviour::ModuleErrorElsewhere => Err(Error::module("shell.php", "vector broken").into()),
                Behaviour::EarlyHit => Err(Halt::Found(ResultValue::from(false))),
                Behaviour::FatalInProbe => Err(Error::Initialization("bad wiring".into()).into()),
                Behaviour::Ragged => Ok(ResultValue::RowMatrix(vec![
                    vec![Scalar::Int(1), Scalar::Int(2)],
                    vec![Scalar::Int(3)],
                ])),
            }
        }

        fn verify(&mut self, _ctx: &mut Context<'_>, _result: &ResultValue) -> Flow {
            self.verified = true;
            Ok(())
        }
    }

    fn session(responses: Vec<Option<&str>>) -> (Session, shellvec_core::DeliveryLog) {
        let channel = ReplayChannel::new(responses);
        let log = channel.recorder();
        let mut session = Session::new(Box::new(channel)).with_capabilities(["php"]);
        session.set_echo(false);
        (session, log)
    }

    #[test]
    fn test_run_formats_probe_result() {
        let (mut session, log) = session(vec![Some("hello")]);
        let mut module = Echo::new(Behaviour::Answer);

        let exec = ModuleRunner::new(&mut session).run(&mut module, &["hello"]).unwrap();
        assert_eq!(exec.result, ResultValue::text("hello"));
        assert_eq!(exec.output, "hello");
        assert!(module.verified);
        assert_eq!(log.deliveries()[0].payload.body, "echo 'hello';");
    }

    #[test]
    fn test_prepare_runs_before_probe() {
        let (mut session, log) = session(vec![Some("HI")]);
        let mut module = Echo::new(Behaviour::Answer);
        ModuleRunner::new(&mut session)
            .run(&mut module, &["hi", "--mode", "upper"])
            .unwrap();
        assert_eq!(log.deliveries()[0].payload.body, "echo 'HI';");
    }

    #[test]
    fn test_successful_run_records_vector() {
        let (mut session, _) = session(vec![Some("x")]);
        let mut module = Echo::new(Behaviour::Answer);
        ModuleRunner::new(&mut session).run(&mut module, &["x"]).unwrap();
        assert_eq!(
            module.base().arguments().stored().get(VECTOR_PARAM),
            Some(&Some("php_echo".to_string()))
        );
    }

    #[test]
    fn test_argument_error_propagates_before_delivery() {
        let (mut session, log) = session(vec![Some("x")]);
        let mut module = Echo::new(Behaviour::Answer);

        let err = ModuleRunner::new(&mut session)
            .run(&mut module, &["x", "--mode", "shout"])
            .unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
        assert!(log.is_empty());
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn test_missing_required_propagates() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::Answer);
        let err = ModuleRunner::new(&mut session).run::<&str>(&mut module, &[]).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn test_probe_error_becomes_warning() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::ProbeError);

        let exec = ModuleRunner::new(&mut session).run(&mut module, &["x"]).unwrap();
        assert_eq!(exec, Execution::default());
        assert!(!module.verified);

        let warnings = session.warnings().entries();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].module, "shell.echo");
        assert_eq!(warnings[0].message, "[!] Error: host unreachable");
    }

    #[test]
    fn test_module_error_attributed_to_named_module() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::ModuleErrorElsewhere);
        ModuleRunner::new(&mut session).run(&mut module, &["x"]).unwrap();
        assert_eq!(session.warnings().entries()[0].module, "shell.php");
    }

    #[test]
    fn test_early_hit_skips_verify_and_formats() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::EarlyHit);
        let exec = ModuleRunner::new(&mut session).run(&mut module, &["x"]).unwrap();
        assert_eq!(exec.result, ResultValue::from(false));
        assert_eq!(exec.output, "false");
        assert!(!module.verified);
    }

    #[test]
    fn test_initialization_error_in_probe_propagates() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::FatalInProbe);
        let err = ModuleRunner::new(&mut session).run(&mut module, &["x"]).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[test]
    fn test_format_failure_becomes_warning() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::Ragged);
        let exec = ModuleRunner::new(&mut session).run(&mut module, &["x"]).unwrap();
        assert_eq!(exec.output, "");
        assert!(session.warnings().text().contains("[!] Error: Format error"));
    }

    #[test]
    fn test_failed_run_keeps_resolved_arguments() {
        let (mut session, _) = session(vec![]);
        let mut module = Echo::new(Behaviour::ProbeError);
        ModuleRunner::new(&mut session).run(&mut module, &["kept"]).unwrap();
        assert_eq!(
            module.base().arguments().stored().get("text"),
            Some(&Some("kept".to_string()))
        );
        assert!(module.base().arguments().stored().get(VECTOR_PARAM).is_none());
    }
}
