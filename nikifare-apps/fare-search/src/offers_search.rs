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

//! # flyniki.com Search Client
//!
//! Effectful (network) operations: opens a booking session, posts the search
//! form, decodes the response bundle and hands it to the results parser.

use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use wreq::redirect::Policy;
use wreq_util::Emulation;

use crate::errors::{FetchError, SearchError};
use crate::offers_query_builder::{SearchContext, cookie_header};
use crate::offers_results_parser::{OfferSearchResult, ParseOptions, ResponseBundle};

const NO_CONNECTIONS_MARKER: &str = "No connections";

/// Connection settings for the booking site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub language: String,
    /// Market whose currency the prices are quoted in.
    pub shop: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.flyniki.com".to_string(),
            language: "en".to_string(),
            shop: "RU".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Outcome of a search that reached the booking site.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// The site has no flights for the requested dates.
    NoConnections { message: String },
    Offers(Box<OfferSearchResult>),
}

/// Classify a decoded bundle before offer extraction.
///
/// `Ok(Some(message))` is the "no connections" outcome. `Err` is a
/// site-reported error or a bundle without templates. A `main` template
/// without flight tables is left to the parser, which reports it as a
/// structural fault.
pub fn check_for_result_errors(bundle: &ResponseBundle) -> Result<Option<String>, FetchError> {
    if let Some(error) = &bundle.error {
        return Err(FetchError::Site(site_error_message(error)));
    }
    let templates = bundle.templates()?;
    if templates.dateoverview.contains(NO_CONNECTIONS_MARKER) {
        return Ok(Some(
            "No connections found for the entered data. \
             However, connections are available on days either side."
                .to_string(),
        ));
    }
    Ok(None)
}

/// Text of the error template's `wrapper` element, or the raw markup text.
fn site_error_message(markup: &str) -> String {
    let html = Html::parse_fragment(markup);
    let wrapper = Selector::parse(r#"[class="wrapper"]"#).unwrap();
    let text: Vec<&str> = match html.select(&wrapper).next() {
        Some(el) => el.text().flat_map(str::split_whitespace).collect(),
        None => html.root_element().text().flat_map(str::split_whitespace).collect(),
    };
    text.join(" ")
}

#[derive(Clone)]
pub struct FlynikiClient {
    client: Arc<wreq::Client>,
    config: ClientConfig,
}

impl FlynikiClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let client = wreq::Client::builder()
            .emulation(Emulation::Safari18_5)
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| FetchError::Connection {
                url: config.base_url.clone(),
                source,
            })?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl FlynikiClient {
    /// Open a booking session and return the search URL plus session cookies.
    async fn open_session(&self) -> Result<(String, String), FetchError> {
        let url = format!(
            "{}/{}/booking/flight/vacancy.php",
            self.config.base_url.trim_end_matches('/'),
            self.config.language
        );
        let cookie = cookie_header(&self.config.language, &self.config.shop);

        tracing::trace!("[open_session] POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("Cookie", &cookie)
            .send()
            .await
            .map_err(|source| FetchError::Connection {
                url: url.clone(),
                source,
            })?;

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                FetchError::UnexpectedResponse(format!(
                    "no search location in session response (HTTP {})",
                    response.status()
                ))
            })?;
        let search_url = if location.starts_with("http") {
            location.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                location.trim_start_matches('/')
            )
        };

        let session_cookies: Vec<String> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .collect();
        let mut cookies = vec![cookie];
        cookies.extend(session_cookies);

        tracing::debug!("[open_session] Search location: {}", search_url);
        Ok((search_url, cookies.join("; ")))
    }

    /// Post the search form and decode the response bundle.
    pub async fn fetch_raw(&self, context: &SearchContext) -> Result<ResponseBundle, FetchError> {
        let (search_url, cookies) = self.open_session().await?;

        let fetch_start = std::time::Instant::now();
        let response = self
            .client
            .post(&search_url)
            .header("Cookie", &cookies)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(context.form_body())
            .send()
            .await
            .map_err(|source| FetchError::Connection {
                url: search_url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Connection {
                url: search_url.clone(),
                source,
            })?;
        tracing::debug!(
            "[fetch_raw] HTTP {} in {:?}, {} KB",
            status.as_u16(),
            fetch_start.elapsed(),
            body.len() / 1024
        );

        if !status.is_success() {
            let body_preview = body.chars().take(500).collect::<String>();
            return Err(FetchError::UnexpectedResponse(format!(
                "HTTP error {}: {}",
                status, body_preview
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            let body_preview = body.chars().take(300).collect::<String>();
            FetchError::UnexpectedResponse(format!(
                "response is not a template bundle ({}): {}",
                e, body_preview
            ))
        })
    }

    pub async fn search_offers(
        &self,
        context: &SearchContext,
        options: ParseOptions,
    ) -> Result<SearchOutcome, SearchError> {
        let overall_start = std::time::Instant::now();
        tracing::info!(
            "Searching {} -> {} on {} ({:?})",
            context.origin,
            context.destination,
            context.outbound_date,
            context.trip
        );

        let bundle = self.fetch_raw(context).await?;
        Self::outcome_from_bundle(&bundle, context.clone(), options).inspect(|_| {
            tracing::info!("Total search_offers time: {:?}", overall_start.elapsed());
        })
    }

    /// Classify and parse an already fetched bundle.
    pub fn outcome_from_bundle(
        bundle: &ResponseBundle,
        context: SearchContext,
        options: ParseOptions,
    ) -> Result<SearchOutcome, SearchError> {
        if let Some(message) = check_for_result_errors(bundle)? {
            tracing::info!("{}", message);
            return Ok(SearchOutcome::NoConnections { message });
        }

        let templates = bundle.templates()?;
        let parse_start = std::time::Instant::now();
        let result = OfferSearchResult::from_templates(templates, context, options).inspect_err(|e| {
            let preview = templates.main.chars().take(2000).collect::<String>();
            tracing::error!("Parse failed after {:?}: {}", parse_start.elapsed(), e);
            tracing::error!("Main template preview (first 2000 chars):\n{}", preview);
        })?;
        tracing::debug!(
            "Parsed {} itineraries in {:?}",
            result.len(),
            parse_start.elapsed()
        );
        Ok(SearchOutcome::Offers(Box::new(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offers_results_parser::Templates;

    fn bundle(main: &str, dateoverview: &str, error: Option<&str>) -> ResponseBundle {
        ResponseBundle {
            error: error.map(str::to_string),
            templates: Some(Templates {
                main: main.to_string(),
                priceoverview: String::new(),
                dateoverview: dateoverview.to_string(),
            }),
        }
    }

    #[test]
    fn test_site_error_uses_wrapper_text() {
        let b = bundle(
            "",
            "",
            Some(r#"<div class="error"><div class="wrapper"> Please check   your dates. </div></div>"#),
        );
        match check_for_result_errors(&b) {
            Err(FetchError::Site(msg)) => assert_eq!(msg, "Please check your dates."),
            other => panic!("expected site error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_connections_outcomes() {
        let b = bundle(r#"<table class="flighttable"></table>"#, "<p>No connections</p>", None);
        assert!(check_for_result_errors(&b).unwrap().is_some());

        let b = bundle(r#"<table class="flighttable"></table>"#, "", None);
        assert!(check_for_result_errors(&b).unwrap().is_none());

        // a layout without flight tables is for the parser to reject
        let b = bundle("<p>empty</p>", "", None);
        assert!(check_for_result_errors(&b).unwrap().is_none());
    }

    #[test]
    fn test_bundle_without_templates_is_unexpected() {
        for json in [r#"{}"#, r#"{"unexpected": 1}"#] {
            let b: ResponseBundle = serde_json::from_str(json).unwrap();
            assert!(
                matches!(check_for_result_errors(&b), Err(FetchError::UnexpectedResponse(_))),
                "{}",
                json
            );
        }

        let json = r#"{"templates": {"dateoverview": ""}}"#;
        assert!(serde_json::from_str::<ResponseBundle>(json).is_err());
    }

    #[test]
    fn test_missing_table_is_structural() {
        let b = bundle("<p>Please choose another date</p>", "", None);
        let context = crate::SearchContext::builder(
            "TXL".to_string(),
            "FCO".to_string(),
            chrono::NaiveDate::from_ymd_opt(2017, 8, 29).unwrap(),
        )
        .build()
        .unwrap();
        let err = FlynikiClient::outcome_from_bundle(&b, context, ParseOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SearchError::Offer(crate::OfferError::Structure(_))
        ));
    }

    #[test]
    fn test_bundle_deserialization() {
        let json = r#"{"templates":{"main":"<div></div>","priceoverview":"<p></p>","infos":"x"}}"#;
        let b: ResponseBundle = serde_json::from_str(json).unwrap();
        assert!(b.error.is_none());
        let templates = b.templates().unwrap();
        assert_eq!(templates.main, "<div></div>");
        assert_eq!(templates.dateoverview, "");

        let json = r#"{"error":"<div class=\"wrapper\">Oops</div>"}"#;
        let b: ResponseBundle = serde_json::from_str(json).unwrap();
        assert!(matches!(check_for_result_errors(&b), Err(FetchError::Site(_))));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.shop, "RU");
    }
}
