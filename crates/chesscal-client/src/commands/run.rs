//! The default command: authenticate, insert the test event, list upcoming
//! events.

use std::io::Write;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use chesscal_core::CalendarEvent;
use chesscal_google::{
    CalendarClient, ClientSecret, GoogleConfig, TokenCache, resolve_credential,
};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Everything a run needs, merged from flags, config file and defaults.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub google: GoogleConfig,
    pub calendar_id: String,
    pub max_results: usize,
    /// The event to insert, or `None` with `--no-insert`.
    pub test_event: Option<CalendarEvent>,
    pub force_reauth: bool,
}

impl RunOptions {
    /// Merges CLI flags over the configuration file.
    pub fn new(cli: &Cli, config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            google: config.google_config(cli),
            calendar_id: config.calendar_id(cli),
            max_results: config.max_results(cli)?,
            test_event: (!cli.no_insert).then(|| config.test_event.to_event()),
            force_reauth: cli.force_reauth,
        })
    }
}

/// Runs the command, printing results to stdout.
///
/// A credential failure aborts the run. Calendar calls are all attempted;
/// their failures are reported as they happen and collected into
/// [`ClientError::RemoteSteps`].
pub async fn run(options: &RunOptions) -> ClientResult<()> {
    if options.force_reauth {
        clear_cache_for_reauth(&options.google)?;
    }

    let credential = resolve_credential(&options.google).await?;
    let client = CalendarClient::new(&credential, options.google.timeout)?;

    run_steps(&client, options, Utc::now(), &mut std::io::stdout()).await
}

/// Inserts the test event (if any) and lists events starting from `now`.
pub async fn run_steps<W: Write>(
    client: &CalendarClient,
    options: &RunOptions,
    now: DateTime<Utc>,
    out: &mut W,
) -> ClientResult<()> {
    let mut failed = Vec::new();

    if let Some(ref event) = options.test_event {
        match client.insert_event(&options.calendar_id, event).await {
            Ok(created) => {
                info!("inserted event {:?}", created.id);
                writeln!(
                    out,
                    "Event created: {}",
                    created.html_link.as_deref().unwrap_or("(no link)")
                )?;
            }
            Err(e) => {
                report_failure("insert event", &e);
                failed.push("insert event".to_string());
            }
        }
    } else {
        debug!("skipping test event insertion");
    }

    match client
        .list_upcoming(&options.calendar_id, now, options.max_results)
        .await
    {
        Ok(events) if events.is_empty() => writeln!(out, "No upcoming events found.")?,
        Ok(events) => {
            for event in &events {
                writeln!(out, "{}", event.listing_line())?;
            }
        }
        Err(e) => {
            report_failure("list events", &e);
            failed.push("list events".to_string());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(ClientError::RemoteSteps(failed))
    }
}

/// Deletes the cached credential, but only once the client secret loads, so a
/// bad `--cred-path` leaves the cache alone.
fn clear_cache_for_reauth(google: &GoogleConfig) -> ClientResult<()> {
    ClientSecret::from_file(&google.secret_path)?;
    TokenCache::new(&google.token_path).clear()?;
    Ok(())
}

fn report_failure(step: &str, err: &chesscal_google::GoogleError) {
    eprintln!("error: {} failed: {}", step, err);
    if let Some(hint) = err.hint() {
        eprintln!("hint: {}", hint);
    }
}
