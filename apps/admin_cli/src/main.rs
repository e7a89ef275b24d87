mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use admin_core::{
    AdminContext, FetchStatus, HttpTransport, ListController, ListProps, ListSnapshot,
    MutationController, MutationKind, MutationProps, ShowController, ShowProps, StrategyRegistry,
};
use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use query_builder::{Document, OperationSource};
use serde::Serialize;
use serde_json::Value;
use shared::domain::{FilterMap, ListState, Pagination, RecordId, SortDirection, SortMap};
use tracing::info;
use url::Url;
use url_state::{
    with_filters, with_pagination, with_sort, ListDefaults, MemoryLocation, ParamStore,
};

#[derive(Parser, Debug)]
#[command(about = "Run admin data operations against a GraphQL backend")]
struct Args {
    /// Overrides the configured GraphQL endpoint.
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct OperationArgs {
    /// Resource name, e.g. `Company`.
    resource: String,
    /// Named operation, built from `--field` selections.
    #[arg(long, conflicts_with = "document")]
    operation: Option<String>,
    /// File holding a hand-written GraphQL document.
    #[arg(long)]
    document: Option<PathBuf>,
    /// Dot-path of a field to select; repeatable or comma separated.
    #[arg(long = "field", value_delimiter = ',')]
    fields: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[command(flatten)]
        target: OperationArgs,
        /// Deep link whose query string seeds the list state.
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u64>,
        /// `field=asc|desc`; repeatable.
        #[arg(long = "sort", value_parser = parse_sort)]
        sort: Vec<(String, SortDirection)>,
        /// `field=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },
    Show {
        #[command(flatten)]
        target: OperationArgs,
        #[arg(long)]
        id: String,
    },
    Create {
        #[command(flatten)]
        target: OperationArgs,
        /// JSON object of field values.
        #[arg(long)]
        values: String,
    },
    Edit {
        #[command(flatten)]
        target: OperationArgs,
        #[arg(long)]
        id: String,
        #[arg(long)]
        values: String,
    },
    Delete {
        #[command(flatten)]
        target: OperationArgs,
        #[arg(long)]
        id: String,
    },
}

#[derive(Serialize)]
struct ListOutput {
    href: String,
    state: ListState,
    total: u64,
    page_count: u64,
    data: Vec<Value>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected field=value, got '{raw}'")),
    }
}

fn parse_sort(raw: &str) -> Result<(String, SortDirection), String> {
    let (field, direction) = parse_pair(raw)?;
    let direction = direction.parse().map_err(|err| format!("{err}"))?;
    Ok((field, direction))
}

impl OperationArgs {
    fn source(&self) -> Result<OperationSource> {
        match (&self.operation, &self.document) {
            (_, Some(path)) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read document '{}'", path.display()))?;
                Ok(Document::parse(raw)?.into())
            }
            (Some(operation), None) => Ok(OperationSource::named(operation)),
            (None, None) => bail!("either --operation or --document is required"),
        }
    }
}

struct ListFlags {
    limit: Option<u32>,
    offset: Option<u64>,
    sort: Vec<(String, SortDirection)>,
    filters: Vec<(String, String)>,
}

/// Writes list flags into the location. Filters go first since a filter
/// change returns to the first page; an explicit `--offset` still wins.
fn apply_list_flags(
    location: &dyn ParamStore,
    defaults: &ListDefaults,
    flags: ListFlags,
) -> Result<()> {
    if !flags.filters.is_empty() {
        let filters: FilterMap = flags.filters.into_iter().collect();
        location.update(&|prev| with_filters(prev, &filters));
    }
    if !flags.sort.is_empty() {
        let sort: SortMap = flags.sort.into_iter().collect();
        location.update(&|prev| with_sort(prev, &sort));
    }
    if flags.limit.is_some() || flags.offset.is_some() {
        let current = url_state::decode(&location.read(), defaults);
        let pagination = Pagination::new(
            flags.limit.unwrap_or(current.limit),
            flags.offset.unwrap_or(current.offset),
        );
        pagination.validate()?;
        location.update(&|prev| with_pagination(prev, pagination));
    }
    Ok(())
}

fn list_output(href: String, snapshot: ListSnapshot) -> Result<ListOutput> {
    if let Some(err) = snapshot.error {
        return Err(anyhow::Error::new(err).context("list request failed"));
    }
    if snapshot.status == FetchStatus::Idle {
        bail!("nothing was fetched: a named operation needs at least one --field");
    }
    Ok(ListOutput {
        href,
        state: snapshot.state,
        total: snapshot.total,
        page_count: snapshot.page_count,
        data: snapshot.data,
    })
}

fn parse_values(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("--values must be a JSON document")
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_context(settings: &config::Settings) -> Result<AdminContext> {
    let endpoint = Url::parse(&settings.graphql_endpoint)
        .with_context(|| format!("invalid graphql endpoint '{}'", settings.graphql_endpoint))?;
    let mut transport =
        HttpTransport::with_timeout(endpoint, Duration::from_secs(settings.request_timeout_secs))?;
    if let Some(token) = &settings.bearer_token {
        transport = transport.bearer_token(token.clone());
    }
    Ok(AdminContext::new(
        StrategyRegistry::with_defaults(),
        Arc::new(transport),
    ))
}

async fn mutate(
    ctx: AdminContext,
    kind: MutationKind,
    target: OperationArgs,
    id: Option<RecordId>,
    values: Value,
) -> Result<()> {
    let props = MutationProps::new(kind, target.resource.clone(), target.source()?)
        .fields(target.fields);
    let controller = MutationController::new(ctx, props)?;
    let data = controller.submit(id.as_ref(), &values).await?;
    print_json(&data)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(endpoint) = args.endpoint {
        settings.graphql_endpoint = endpoint;
    }
    if let Some(token) = args.token {
        settings.bearer_token = Some(token);
    }
    info!(endpoint = settings.graphql_endpoint.as_str(), "cli: starting");
    let ctx = build_context(&settings)?;

    match args.command {
        Command::List {
            target,
            location,
            limit,
            offset,
            sort,
            filters,
        } => {
            let href = location.unwrap_or_else(|| {
                format!("http://admin.local/{}", target.resource.to_lowercase())
            });
            let location = Arc::new(
                MemoryLocation::parse(&href).with_context(|| format!("invalid location '{href}'"))?,
            );
            let defaults = ListDefaults::default().per_page(settings.default_limit);

            apply_list_flags(
                &*location,
                &defaults,
                ListFlags {
                    limit,
                    offset,
                    sort,
                    filters,
                },
            )?;

            let props = ListProps::new(target.resource.clone(), target.source()?)
                .fields(target.fields)
                .defaults(defaults);
            let list = ListController::mount(ctx, location.clone(), props).await?;
            print_json(&list_output(location.href(), list.snapshot())?)
        }
        Command::Show { target, id } => {
            let props = ShowProps::new(target.resource.clone(), id, target.source()?)
                .fields(target.fields);
            let show = ShowController::mount(ctx, props).await?;
            let snapshot = show.snapshot();
            if let Some(err) = snapshot.error {
                return Err(anyhow::Error::new(err).context("show request failed"));
            }
            print_json(&snapshot.record.unwrap_or(Value::Null))
        }
        Command::Create { target, values } => {
            let values = parse_values(&values)?;
            mutate(ctx, MutationKind::Create, target, None, values).await
        }
        Command::Edit { target, id, values } => {
            let values = parse_values(&values)?;
            mutate(ctx, MutationKind::Edit, target, Some(RecordId::from(id)), values).await
        }
        Command::Delete { target, id } => {
            mutate(ctx, MutationKind::Delete, target, Some(RecordId::from(id)), Value::Null).await
        }
    }
}
