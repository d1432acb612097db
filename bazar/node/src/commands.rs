use crate::cli::{Command, MatchArg, OutputFormat};
use anyhow::Context;
use bc_api::{BazarApi, GqlArgs, ReadHandlerArgs};
use bc_state::domain;
use bp_ao::{Cursor, ProcessId, Query, Tag, TagFilter};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;

pub async fn run(api: &BazarApi, command: Command, output: OutputFormat) -> anyhow::Result<()> {
    match command {
        Command::Gateway => {
            let gateway = api.query_client().resolver().get_working().await;
            write_output(output, &json!({ "url": gateway.url, "rank": gateway.rank }))
        }
        Command::Query { ids, tags, match_, owners, after, min_block, max_block, page_size, all } => {
            let query = build_query(ids, tags, match_, owners, after, (min_block, max_block), page_size);
            match all {
                Some(max_pages) => {
                    let edges = api.query_client().query_all(&query, max_pages).await?;
                    write_output(output, &edges)
                }
                None => {
                    let page = api.get_gql_data(GqlArgs { query, gateway: None }).await?;
                    write_output(output, &page)
                }
            }
        }
        Command::Read { process_id, action, tags, data, owner } => {
            let tags = tags.into_iter().map(|(name, value)| Tag::new(name, value)).collect();
            let value = api.read_handler(ReadHandlerArgs { process_id, action, tags, data, owner }).await?;
            write_output(output, &value)
        }
        Command::State { process_id, path } => {
            let process_id = parse_process_id(&process_id)?;
            let state = api.state_reader().read_state(&process_id, path.as_deref()).await?;
            write_output(output, &state)
        }
        Command::Results { process_id, message_id, max_attempts } => {
            let process_id = parse_process_id(&process_id)?;
            let result = api.correlator().await_message_result(&process_id, &message_id, max_attempts).await?;
            if result.is_none() {
                tracing::warn!(message_id, "Message has not been evaluated yet");
            }
            write_output(output, &result)
        }
        Command::ClaimStatus { process_id, wallet, profile } => {
            let process_id = parse_process_id(&process_id)?;
            let state = api.state_reader().read_state(&process_id, None).await?;
            write_output(output, &domain::claim_status(&state, &wallet, profile.as_deref()))
        }
        Command::Stats { process_id } => {
            let process_id = parse_process_id(&process_id)?;
            let state = api.state_reader().read_state(&process_id, None).await?;
            write_output(output, &domain::stats(&state))
        }
    }
}

fn parse_process_id(raw: &str) -> anyhow::Result<ProcessId> {
    raw.parse().with_context(|| format!("Invalid process id {raw:?}"))
}

/// Repeated tag names become one filter with several values.
fn build_query(
    ids: Vec<String>,
    tags: Vec<(String, String)>,
    match_: MatchArg,
    owners: Vec<String>,
    after: Option<String>,
    (min_block, max_block): (Option<u64>, Option<u64>),
    page_size: Option<u32>,
) -> Query {
    let mut query = Query::new();
    if !ids.is_empty() {
        query = query.ids(ids.into_iter().filter(|id| !id.is_empty()));
    }

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in tags {
        grouped.entry(name).or_default().push(value);
    }
    for (name, values) in grouped {
        query = query.tag(TagFilter::exact(name, values).with_match(match_.into()));
    }

    if !owners.is_empty() {
        query = query.owners(owners);
    }
    if let Some(cursor) = after {
        query = query.after(Cursor::from(cursor));
    }
    if min_block.is_some() {
        query = query.blocks(min_block, max_block);
    }
    if let Some(page_size) = page_size {
        query = query.page_size(page_size);
    }
    query
}

fn write_output<T: Serialize>(format: OutputFormat, value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
        OutputFormat::Yaml => serde_yaml::to_writer(&mut stdout, value)?,
    }
    Ok(())
}
