//! Parameter schema and stored arguments
//!
//! Parsing and help rendering go through clap's builder API. Requiredness,
//! allowed values and validators are checked after stored arguments are
//! merged in, so a value stored earlier can satisfy a required parameter.
//! Nothing is stored unless every check passes.

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};
use shellvec_config::StoredMap;
use shellvec_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Hidden catch-all collecting tokens no parameter consumed.
const REST: &str = "__unconsumed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamForm {
    /// Zero-based position among positional parameters.
    Positional(usize),
    /// `--name value`
    Flag,
}

/// Value check run during resolution. The message names what is wrong
/// with the value; the parameter name is added by the caller.
pub type Validator = fn(&str) -> std::result::Result<(), String>;

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub help: String,
    pub form: ParamForm,
    pub required: bool,
    pub default: Option<String>,
    pub choices: Vec<String>,
    pub validator: Option<Validator>,
}

impl Parameter {
    pub fn positional(name: &str, position: usize, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            form: ParamForm::Positional(position),
            required: false,
            default: None,
            choices: Vec::new(),
            validator: None,
        }
    }

    pub fn flag(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            form: ParamForm::Flag,
            required: false,
            default: None,
            choices: Vec::new(),
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Allowed set first, then the validator.
    fn check_value(&self, value: &str) -> Result<()> {
        self.check_choice(value)?;
        match self.validator {
            Some(validate) => validate(value)
                .map_err(|e| Error::Argument(format!("argument {}: {}", self.name, e))),
            None => Ok(()),
        }
    }

    fn usage_token(&self) -> String {
        match (self.form, self.required) {
            (ParamForm::Positional(_), true) => format!("<{}>", self.name),
            (ParamForm::Positional(_), false) => format!("[{}]", self.name),
            (ParamForm::Flag, true) => format!("--{} {}", self.name, self.name.to_uppercase()),
            (ParamForm::Flag, false) => format!("[--{} {}]", self.name, self.name.to_uppercase()),
        }
    }

    fn check_choice(&self, value: &str) -> Result<()> {
        if self.choices.is_empty() || self.choices.iter().any(|c| c == value) {
            return Ok(());
        }
        Err(Error::Argument(format!(
            "argument {}: invalid choice: '{}' (choose from {})",
            self.name,
            value,
            self.choices
                .iter()
                .map(|c| format!("'{}'", c))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    fn to_arg(&self) -> Arg {
        let help = match &self.default {
            Some(default) => format!("{} (default: {})", self.help, default),
            None => self.help.clone(),
        };
        let mut arg = Arg::new(self.name.clone())
            .help(help)
            .action(ArgAction::Set);

        arg = match self.form {
            ParamForm::Positional(position) => arg.index(position + 1).value_name(self.name.clone()),
            ParamForm::Flag => arg.long(self.name.clone()).value_name(self.name.to_uppercase()),
        };

        if !self.choices.is_empty() {
            arg = arg.value_parser(PossibleValuesParser::new(self.choices.clone()));
        }
        arg
    }
}

/// Ordered parameter set of one module. Names are unique.
#[derive(Debug, Clone)]
pub struct ParameterSchema {
    prog: String,
    description: String,
    params: Vec<Parameter>,
}

impl ParameterSchema {
    pub fn new(prog: &str, description: &str) -> Self {
        Self {
            prog: prog.to_string(),
            description: description.to_string(),
            params: Vec::new(),
        }
    }

    pub fn add(&mut self, param: Parameter) -> Result<()> {
        if param.name == REST || self.get(&param.name).is_some() {
            return Err(Error::Initialization(format!(
                "{}: duplicate parameter '{}'",
                self.prog, param.name
            )));
        }
        if let Some(default) = &param.default {
            param
                .check_value(default)
                .map_err(|e| Error::Initialization(format!("{}: {}", self.prog, e)))?;
        }
        self.params.push(param);
        self.check_positions()
    }

    fn check_positions(&self) -> Result<()> {
        let positions: BTreeSet<usize> = self
            .params
            .iter()
            .filter_map(|p| match p.form {
                ParamForm::Positional(i) => Some(i),
                ParamForm::Flag => None,
            })
            .collect();
        let count = self
            .params
            .iter()
            .filter(|p| matches!(p.form, ParamForm::Positional(_)))
            .count();
        if positions.len() != count {
            return Err(Error::Initialization(format!(
                "{}: two parameters share a position",
                self.prog
            )));
        }
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    fn command(&self) -> Command {
        let mut positionals: Vec<&Parameter> = self
            .params
            .iter()
            .filter(|p| matches!(p.form, ParamForm::Positional(_)))
            .collect();
        positionals.sort_by_key(|p| match p.form {
            ParamForm::Positional(i) => i,
            ParamForm::Flag => usize::MAX,
        });

        let mut cmd = Command::new(self.prog.clone())
            .about(self.description.clone())
            .override_usage(self.usage_line(&positionals))
            .no_binary_name(true)
            .disable_version_flag(true);

        // clap wants contiguous 1-based indices; declared positions only fix the order.
        for (index, param) in positionals.iter().enumerate() {
            cmd = cmd.arg(param.to_arg().index(index + 1));
        }
        for param in self.params.iter().filter(|p| p.form == ParamForm::Flag) {
            cmd = cmd.arg(param.to_arg());
        }

        cmd.arg(
            Arg::new(REST)
                .index(positionals.len() + 1)
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .action(ArgAction::Append)
                .hide(true),
        )
    }

    /// `prog <required> [optional] [--flag FLAG]`, positionals in order.
    fn usage_line(&self, positionals: &[&Parameter]) -> String {
        let flags = self.params.iter().filter(|p| p.form == ParamForm::Flag);
        std::iter::once(self.prog.clone())
            .chain(positionals.iter().copied().chain(flags).map(Parameter::usage_token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse `tokens`, returning the values given on the command line and
    /// the tokens nothing consumed.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<(BTreeMap<String, String>, Vec<String>)> {
        let matches = self
            .command()
            .try_get_matches_from(tokens.iter().map(|t| t.as_ref().to_string()))
            .map_err(|e| Error::Argument(e.to_string().trim_end().to_string()))?;

        let mut parsed = BTreeMap::new();
        for param in &self.params {
            if let Some(value) = matches.get_one::<String>(&param.name) {
                parsed.insert(param.name.clone(), value.clone());
            }
        }

        let rest = matches
            .get_many::<String>(REST)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        Ok((parsed, rest))
    }

    pub fn render_help(&self) -> String {
        self.command().render_help().to_string()
    }

    pub fn render_usage(&self) -> String {
        self.command().render_usage().to_string()
    }
}

/// Arguments after merging command line, stored values and defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs {
    values: BTreeMap<String, Option<String>>,
}

impl ResolvedArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_deref())
    }

    /// Value of a parameter the schema guarantees, or an argument error.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::Argument(format!("argument {} is unset", name)))
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: &str, value: Option<String>) {
        self.values.insert(name.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// Schema plus the arguments persisted from earlier invocations.
#[derive(Debug, Clone)]
pub struct ArgumentStore {
    schema: ParameterSchema,
    stored: StoredMap,
}

impl ArgumentStore {
    pub fn new(schema: ParameterSchema) -> Self {
        Self {
            schema,
            stored: StoredMap::new(),
        }
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn stored(&self) -> &StoredMap {
        &self.stored
    }

    pub fn replace_stored(&mut self, stored: StoredMap) {
        self.stored = stored;
    }

    /// Store every `key=value` token. An empty value clears the key.
    /// Keys outside the schema are kept but never used for resolution.
    pub fn store<S: AsRef<str>>(&mut self, tokens: &[S]) {
        for token in tokens {
            if let Some((key, value)) = token.as_ref().split_once('=') {
                let value = (!value.is_empty()).then(|| value.to_string());
                self.stored.insert(key.to_string(), value);
            }
        }
    }

    /// Merge recorded values into storage.
    pub fn commit(&mut self, recorded: StoredMap) {
        self.stored.extend(recorded);
    }

    fn stored_value(&self, name: &str) -> Option<&str> {
        self.stored.get(name).and_then(|v| v.as_deref())
    }

    /// Resolve `tokens` against the schema and stored arguments.
    ///
    /// Precedence is command line, then stored value, then default.
    /// Values given on the command line are stored for the next run.
    pub fn resolve<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<(ResolvedArgs, Vec<String>)> {
        let (parsed, rest) = self.schema.parse(tokens)?;

        let mut resolved = ResolvedArgs::default();
        let mut missing = Vec::new();

        for param in self.schema.params() {
            let value = parsed
                .get(&param.name)
                .map(String::as_str)
                .or_else(|| self.stored_value(&param.name))
                .or(param.default.as_deref());

            match value {
                Some(value) => param.check_value(value)?,
                None if param.required => missing.push(param.name.clone()),
                None => {}
            }
            resolved.set(&param.name, value.map(str::to_string));
        }

        if !missing.is_empty() {
            return Err(Error::Argument(format!(
                "the following arguments are required: {}",
                missing.join(", ")
            )));
        }

        self.stored
            .extend(parsed.into_iter().map(|(k, v)| (k, Some(v))));

        Ok((resolved, rest))
    }

    /// Stored values as `name='value'` tokens, four per line.
    pub fn format_stored(&self) -> String {
        let mut out = String::new();
        for (i, name) in self.schema.names().enumerate() {
            let value = self.stored_value(name).unwrap_or("");
            out.push_str(&format!("{}='{}' ", name, value));
            if (i + 1) % 4 == 0 {
                out.push('\n');
            }
        }
        out
    }
}
