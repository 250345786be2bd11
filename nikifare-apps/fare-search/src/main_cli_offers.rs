//!  Nikifare Fare Search
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! CLI for flyniki.com fare search.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use nikifare_fare_search::{
    ClientConfig, FlynikiClient, Itinerary, OfferSearchResult, ParseOptions, RowErrorPolicy,
    SearchContext, SearchOutcome,
};
use term_size;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "nikifare-offers")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Departure airport IATA code (e.g., BER, DME)
    #[arg(short, long)]
    from: String,

    /// Destination airport IATA code (e.g., ROM, LON)
    #[arg(short, long)]
    to: String,

    /// Departure date (DD.MM.YY or YYYY-MM-DD)
    #[arg(short, long)]
    date: String,

    /// Return date for round trips (DD.MM.YY or YYYY-MM-DD)
    #[arg(short = 'R', long)]
    return_date: Option<String>,

    /// Number of adult passengers
    #[arg(long, default_value = "1")]
    adults: u32,

    /// Number of child passengers
    #[arg(long, default_value = "0")]
    children: u32,

    /// Number of infant passengers
    #[arg(long, default_value = "0")]
    infants: u32,

    /// Site language
    #[arg(long, default_value = "en")]
    language: String,

    /// Shop (market) the prices are quoted for
    #[arg(long, default_value = "RU")]
    shop: String,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Abort the search on the first unparsable flight row instead of skipping it
    #[arg(long)]
    strict_rows: bool,

    /// Print the ranked itineraries as JSON
    #[arg(long)]
    json: bool,

    /// Save the raw response bundle to this file for debugging
    #[arg(long)]
    save_response: Option<String>,

    /// Verbose output
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn default_log_directive(verbose: bool) -> &'static str {
    if verbose {
        "info,nikifare_fare_search=debug"
    } else {
        "info"
    }
}

/// Configure logging: `RUST_LOG` wins, otherwise `-v` selects debug for this crate.
fn setup_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_directive(verbose).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Parse date string to NaiveDate
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%d.%m.%y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .context(format!("Invalid date format: {}. Use DD.MM.YY or YYYY-MM-DD", s))
}

fn fmt_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%d.%m.%y %H:%M").to_string()
}

/// Get terminal width for the separator bars
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(100)
}

fn dash_bar() -> String {
    "-".repeat(get_terminal_width().min(110))
}

fn render_leg(direction: &str, leg: &nikifare_fare_search::LegChoice) -> String {
    format!(
        "  {:<9} {:>15} → {:<15} {:>10}  {:>10}  {}",
        direction,
        fmt_timestamp(&leg.offer.departure),
        fmt_timestamp(&leg.offer.arrival),
        leg.offer.duration,
        leg.price,
        leg.fare_class
    )
}

fn render_itinerary(rank: usize, itin: &Itinerary, currency: &str) {
    println!(
        "#{:<3} total {} {} (with tax {} {})",
        rank,
        itin.total_price,
        currency,
        itin.total_with_tax,
        currency
    );
    println!("{}", render_leg("outbound", &itin.outbound));
    if let Some(inbound) = &itin.inbound {
        println!("{}", render_leg("return", inbound));
    }
}

/// Render results to stdout
fn render_results(result: &OfferSearchResult) {
    println!("\n{}\n", result.route);

    if result.is_empty() {
        println!("No connections found for the entered data.");
        return;
    }

    println!(
        "{} flight options, tax {} {} per booking{}",
        result.len(),
        result.tax.amount,
        result.tax.currency,
        if result.combinable || result.context.trip.is_one_way() {
            ""
        } else {
            ", cabin classes cannot be mixed"
        }
    );
    println!("{}", dash_bar());
    for (i, itin) in result.itineraries().iter().enumerate() {
        render_itinerary(i + 1, itin, &result.tax.currency);
        println!("{}", dash_bar());
    }

    let dropped = result.dropped_rows().count();
    if dropped > 0 {
        println!("⚠️  {} flight rows could not be read and were skipped", dropped);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    tracing::info!("Starting nikifare-offers CLI");
    tracing::debug!("Args: {:?}", args);

    let depart_date = parse_date(&args.date)?;
    let return_date = args.return_date.as_deref().map(parse_date).transpose()?;

    let mut builder = SearchContext::builder(args.from.clone(), args.to.clone(), depart_date)
        .passengers(args.adults, args.children, args.infants);
    if let Some(rd) = return_date {
        builder = builder.return_date(rd);
    }
    let context = builder
        .build()
        .context("Failed to build search parameters")?;

    let options = ParseOptions {
        row_policy: if args.strict_rows {
            RowErrorPolicy::Abort
        } else {
            RowErrorPolicy::Skip
        },
    };

    let client = FlynikiClient::new(ClientConfig {
        language: args.language.clone(),
        shop: args.shop.clone(),
        timeout_secs: args.timeout,
        ..ClientConfig::default()
    })?;

    let outcome = if let Some(path) = &args.save_response {
        let bundle = client.fetch_raw(&context).await.context("Fetch failed")?;
        let raw = serde_json::to_string_pretty(&bundle).context("Serialize response")?;
        std::fs::write(path, raw).context("Failed to write response file")?;
        tracing::info!("Saved response bundle to {}", path);
        FlynikiClient::outcome_from_bundle(&bundle, context, options).context("Parse failed")?
    } else {
        client
            .search_offers(&context, options)
            .await
            .context("Search failed")?
    };

    match outcome {
        SearchOutcome::NoConnections { message } => {
            println!("\n{}", message);
        }
        SearchOutcome::Offers(result) => {
            tracing::info!(
                "Search completed: {} itineraries found",
                result.itineraries().len()
            );
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result.outcome).context("Serialize results")?
                );
            } else {
                render_results(&result);
            }
        }
    }

    Ok(())
}
