use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use enreach_core::{
    CallFilter, ClassifiedType, ClientConfig, EnreachClient, NewClassification, PollPolicy,
    SchemaQuery,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "enreach", version, about = "EnreachVoice REST API client")]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct AuthArgs {
    /// Account username (email)
    #[arg(long, env = "ENREACH_USERNAME", global = true)]
    username: Option<String>,
    /// API secret key; takes precedence over --password
    #[arg(long, env = "ENREACH_SECRETKEY", hide_env_values = true, global = true)]
    secret_key: Option<String>,
    /// Account password, exchanged for a secret key at login
    #[arg(long, env = "ENREACH_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
    /// Discovery service used to locate the API endpoint
    #[arg(long, env = "ENREACH_DISCOVERY_URL", global = true)]
    discovery_url: Option<String>,
    /// Skip discovery and use this API endpoint
    #[arg(long, env = "ENREACH_API_ENDPOINT", global = true)]
    api_endpoint: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Show the authenticated user
    Whoami,
    /// List the user's calls
    Calls(CallArgs),
    /// List inbound queue (service) calls
    QueueCalls(CallArgs),
    /// Download a recording as <dir>/<id>.mp3
    Recording {
        id: String,
        /// Target directory (created if missing)
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Fetch a call transcript
    Transcript {
        id: String,
        /// Poll while the transcript is still pending
        #[arg(long)]
        wait: bool,
        /// Seconds between polls
        #[arg(long, default_value_t = 10)]
        poll_interval: u64,
        /// Give up polling after this many seconds
        #[arg(long, default_value_t = 100)]
        poll_timeout: u64,
    },
    /// List classification schemas
    Schemas {
        /// Include groups and tags
        #[arg(long)]
        children: bool,
        #[arg(long)]
        archived: bool,
        #[arg(long)]
        deleted: bool,
        /// Only schemas modified after this time (RFC 3339)
        #[arg(long)]
        modified_after: Option<DateTime<Utc>>,
    },
    /// Show one classification schema
    Schema {
        id: Uuid,
        /// Include groups and tags
        #[arg(long)]
        children: bool,
    },
    /// List queue to schema bindings
    QueueSchemas,
    /// List callback list to schema bindings
    CalllistSchemas,
    /// Classify a call or callback list item
    Classify {
        /// Call id, or callback list item id with --kind call-list-item
        #[arg(long)]
        item: Uuid,
        #[arg(long)]
        schema: Uuid,
        /// Tag id (repeatable)
        #[arg(long = "tag", required = true)]
        tags: Vec<i64>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, value_enum, default_value_t = ItemKind::ServiceCall)]
        kind: ItemKind,
    },
    /// Find classifications for a call or callback list item
    Classifications {
        #[arg(long)]
        call_id: Option<Uuid>,
        #[arg(long)]
        item_id: Option<Uuid>,
    },
    /// Show a call's classification with group and tag names resolved
    Classification { call_id: Uuid },
}

#[derive(Args)]
struct CallArgs {
    #[arg(long)]
    call_id: Option<String>,
    /// Range start (RFC 3339)
    #[arg(long, requires = "end")]
    start: Option<DateTime<Utc>>,
    /// Range end (RFC 3339)
    #[arg(long, requires = "start")]
    end: Option<DateTime<Utc>>,
    #[arg(long, requires = "modified_before")]
    modified_after: Option<DateTime<Utc>>,
    #[arg(long, requires = "modified_after")]
    modified_before: Option<DateTime<Utc>>,
    /// Extra query parameter as NAME=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ItemKind {
    ServiceCall,
    DirectCall,
    Email,
    CallListItem,
}

impl From<ItemKind> for ClassifiedType {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::ServiceCall => ClassifiedType::ServiceCall,
            ItemKind::DirectCall => ClassifiedType::DirectCall,
            ItemKind::Email => ClassifiedType::Email,
            ItemKind::CallListItem => ClassifiedType::CallListItem,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}

impl CallArgs {
    fn to_filter(&self) -> CallFilter {
        CallFilter {
            call_id: self.call_id.clone(),
            start_time: self.start,
            end_time: self.end,
            modified_after: self.modified_after,
            modified_before: self.modified_before,
            extra: self.params.clone(),
        }
    }
}

impl AuthArgs {
    fn config(&self, transcript_poll: PollPolicy) -> anyhow::Result<ClientConfig> {
        let Some(username) = &self.username else {
            bail!("--username (or ENREACH_USERNAME) is required");
        };
        let mut builder = ClientConfig::builder(username)
            .request_timeout(Duration::from_secs(self.timeout))
            .transcript_poll(transcript_poll);
        if let Some(key) = &self.secret_key {
            builder = builder.secret_key(key);
        }
        if let Some(password) = &self.password {
            builder = builder.password(password);
        }
        if let Some(url) = &self.discovery_url {
            builder = builder.discovery_url(url);
        }
        if let Some(url) = &self.api_endpoint {
            builder = builder.api_endpoint(url);
        }
        Ok(builder.build()?)
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let poll = match &cli.cmd {
        Command::Transcript {
            poll_interval,
            poll_timeout,
            ..
        } => PollPolicy::new(
            Duration::from_secs(*poll_interval),
            Duration::from_secs(*poll_timeout),
        ),
        _ => PollPolicy::default(),
    };
    let config = cli.auth.config(poll)?;
    let client = EnreachClient::connect(&config).context("login failed")?;

    match cli.cmd {
        Command::Whoami => print_json(&client.current_user()?),
        Command::Calls(args) => print_json(&client.get_usercalls(&args.to_filter())?),
        Command::QueueCalls(args) => print_json(&client.get_inbound_queuecalls(&args.to_filter())?),
        Command::Recording { id, dir } => {
            let path = client
                .get_recording_file(&id, &dir)
                .with_context(|| format!("downloading recording {id}"))?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Transcript { id, wait, .. } => print_json(&client.get_transcript(&id, wait)?),
        Command::Schemas {
            children,
            archived,
            deleted,
            modified_after,
        } => print_json(&client.get_classification_schemas(&SchemaQuery {
            include_children: children,
            include_archived: archived,
            include_deleted: deleted,
            modified_after,
        })?),
        Command::Schema { id, children } => {
            print_json(&client.get_classification_schema(id, children)?)
        }
        Command::QueueSchemas => print_json(&client.get_queue_schemas()?),
        Command::CalllistSchemas => print_json(&client.get_calllist_schemas()?),
        Command::Classify {
            item,
            schema,
            tags,
            note,
            kind,
        } => {
            let mut input = NewClassification::for_call(item, schema, tags).with_type(kind.into());
            if let Some(note) = note {
                input = input.with_note(note);
            }
            print_json(&client.create_classification(&input)?)
        }
        Command::Classifications { call_id, item_id } => {
            print_json(&client.find_classifications(call_id, item_id)?)
        }
        Command::Classification { call_id } => match client.get_call_classification_pretty(call_id)? {
            Some(pretty) => print_json(&pretty),
            None => bail!("call {call_id} has no classification"),
        },
    }
}
