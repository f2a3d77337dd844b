//! DuckDuckGo via its no-JavaScript HTML endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde_json::{json, Value};
use url::Url;

use super::html::{first_text, selector, text_of};
use super::{
    empty_results, web_item, Operation, RoutineContext, RoutineError, RoutineResult,
    SearchParams, SearchRoutine,
};
use crate::continuation::looks_blocked;

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

pub struct DuckDuckGo {
    ctx: Arc<RoutineContext>,
}

pub fn factory(ctx: Arc<RoutineContext>) -> Box<dyn SearchRoutine> {
    Box::new(DuckDuckGo { ctx })
}

/// Region code (`kl`) from country and language.
fn region(params: &SearchParams) -> String {
    match params.get_str("country").unwrap_or("us") {
        "any" | "" => "wt-wt".to_string(),
        country => format!("{}-{}", country, params.get_str("lang").unwrap_or("en")),
    }
}

/// Safe search level (`kp`).
fn safe_search(params: &SearchParams) -> &'static str {
    match params.get_str("nsfw").unwrap_or("yes") {
        "no" => "1",
        "maybe" => "-1",
        _ => "-2",
    }
}

fn search_url(params: &SearchParams) -> Result<String, RoutineError> {
    let mut pairs = vec![
        ("q", params.query().to_string()),
        ("kl", region(params)),
        ("kp", safe_search(params).to_string()),
    ];
    if let Some(date @ ("d" | "w" | "m" | "y")) = params.get_str("date") {
        pairs.push(("df", date.to_string()));
    }

    Url::parse_with_params(ENDPOINT, &pairs)
        .map(|u| u.to_string())
        .map_err(|e| RoutineError::Parse(e.to_string()))
}

/// Result links are redirects carrying the target in `uddg`.
fn decode_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

struct ParsedPage {
    items: Vec<Value>,
    next: Option<String>,
}

fn parse_page(html: &str) -> Result<ParsedPage, RoutineError> {
    let doc = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let title_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;
    let form_sel = selector("div.nav-link form")?;
    let submit_sel = selector("input[type=submit]")?;
    let hidden_sel = selector("input[type=hidden]")?;

    let mut items = Vec::new();
    for result in doc.select(&result_sel) {
        let class = result.value().attr("class").unwrap_or("");
        if class.contains("result--ad") {
            continue;
        }

        let Some(title) = result.select(&title_sel).next() else {
            continue;
        };
        let Some(href) = title.value().attr("href") else {
            continue;
        };

        let description = first_text(&result, &snippet_sel).unwrap_or_default();
        items.push(web_item(&text_of(&title), &description, &decode_link(href)));
    }

    let next = doc
        .select(&form_sel)
        .find(|form| {
            form.select(&submit_sel)
                .any(|input| input.value().attr("value") == Some("Next"))
        })
        .and_then(|form| {
            let pairs: Vec<(&str, &str)> = form
                .select(&hidden_sel)
                .filter_map(|input| {
                    Some((input.value().attr("name")?, input.value().attr("value")?))
                })
                .collect();
            Url::parse_with_params(ENDPOINT, &pairs).ok()
        })
        .map(|u| u.to_string());

    Ok(ParsedPage { items, next })
}

#[async_trait]
impl SearchRoutine for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn filters(&self, page: Operation) -> Value {
        if page != Operation::Web {
            return json!({});
        }

        json!({
            "country": {
                "display": "Country",
                "option": {
                    "any": "All regions",
                    "us": "United States",
                    "uk": "United Kingdom",
                    "ca": "Canada",
                    "au": "Australia",
                    "de": "Germany",
                    "fr": "France",
                    "es": "Spain",
                    "jp": "Japan"
                }
            },
            "nsfw": {
                "display": "NSFW",
                "option": {"yes": "Yes", "maybe": "Maybe", "no": "No"}
            },
            "date": {
                "display": "Time posted",
                "option": {
                    "any": "Any time",
                    "d": "Past day",
                    "w": "Past week",
                    "m": "Past month",
                    "y": "Past year"
                }
            }
        })
    }

    async fn web(&self, params: &SearchParams) -> RoutineResult {
        let (url, proxy) = match params.npt() {
            Some(token) => {
                let state = self.ctx.restore(token).await;
                let url = state
                    .resource_locator
                    .ok_or(RoutineError::ContinuationLost)?;
                (url, state.proxy)
            }
            None => {
                if params.query().is_empty() {
                    return Err(RoutineError::InvalidParameter(
                        "search term is empty".to_string(),
                    ));
                }
                (search_url(params)?, self.ctx.select_proxy())
            }
        };

        let html = self.ctx.fetch(&proxy, &url).await?;
        if looks_blocked(&html) {
            return Err(RoutineError::Blocked);
        }

        let page = parse_page(&html)?;
        let mut out = empty_results();
        out["web"] = Value::Array(page.items);
        if let Some(next) = page.next {
            out["npt"] = json!(self.ctx.store(&next, "web", &proxy).await);
        }
        Ok(out)
    }
}
