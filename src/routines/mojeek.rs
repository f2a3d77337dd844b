//! Mojeek web search.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde_json::{json, Value};
use url::Url;

use super::html::{absolutize, first_text, selector, text_of};
use super::{
    empty_results, web_item, Operation, RoutineContext, RoutineError, RoutineResult,
    SearchParams, SearchRoutine,
};
use crate::continuation::looks_blocked;

const BASE_URL: &str = "https://www.mojeek.com";

pub struct Mojeek {
    ctx: Arc<RoutineContext>,
}

pub fn factory(ctx: Arc<RoutineContext>) -> Box<dyn SearchRoutine> {
    Box::new(Mojeek { ctx })
}

fn search_url(params: &SearchParams) -> Result<String, RoutineError> {
    let mut pairs = vec![("q", params.query().to_string())];

    match params.get_str("lang") {
        Some(lang) if lang != "any" && !lang.is_empty() => pairs.push(("lb", lang.to_string())),
        _ => {}
    }
    match params.get_str("country") {
        Some(country) if country != "any" && !country.is_empty() => {
            pairs.push(("arc", country.to_string()))
        }
        _ => {}
    }
    let safe = if params.get_str("nsfw") == Some("yes") { "0" } else { "1" };
    pairs.push(("safe", safe.to_string()));

    if let Some(date @ ("day" | "week" | "month" | "year")) = params.get_str("date") {
        pairs.push(("since", date.to_string()));
    }

    Url::parse_with_params(&format!("{}/search", BASE_URL), &pairs)
        .map(|u| u.to_string())
        .map_err(|e| RoutineError::Parse(e.to_string()))
}

struct ParsedPage {
    items: Vec<Value>,
    related: Vec<String>,
    next: Option<String>,
}

fn parse_page(html: &str, page_url: &str) -> Result<ParsedPage, RoutineError> {
    let doc = Html::parse_document(html);
    let result_sel = selector("ul.results-standard > li")?;
    let title_sel = selector("a.title")?;
    let desc_sel = selector("p.s")?;
    let related_sel = selector("div.related-searches li a")?;
    let pager_sel = selector("div.pagination a")?;

    let mut items = Vec::new();
    for result in doc.select(&result_sel) {
        let Some(title) = result.select(&title_sel).next() else {
            continue;
        };
        let Some(url) = title
            .value()
            .attr("href")
            .and_then(|href| absolutize(page_url, href))
        else {
            continue;
        };

        let description = first_text(&result, &desc_sel).unwrap_or_default();
        items.push(web_item(&text_of(&title), &description, &url));
    }

    let related = doc
        .select(&related_sel)
        .map(|a| text_of(&a))
        .filter(|t| !t.is_empty())
        .collect();

    let next = doc
        .select(&pager_sel)
        .find(|a| text_of(a).contains("Next"))
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolutize(page_url, href));

    Ok(ParsedPage {
        items,
        related,
        next,
    })
}

#[async_trait]
impl SearchRoutine for Mojeek {
    fn name(&self) -> &'static str {
        "mojeek"
    }

    fn filters(&self, page: Operation) -> Value {
        if page != Operation::Web {
            return json!({});
        }

        json!({
            "lang": {
                "display": "Language",
                "option": {
                    "any": "Any language",
                    "en": "English",
                    "de": "German",
                    "fr": "French",
                    "es": "Spanish",
                    "it": "Italian",
                    "nl": "Dutch"
                }
            },
            "country": {
                "display": "Region",
                "option": {
                    "any": "Any region",
                    "gb": "United Kingdom",
                    "us": "United States",
                    "de": "Germany",
                    "fr": "France"
                }
            },
            "nsfw": {
                "display": "NSFW",
                "option": {"yes": "Yes", "no": "No"}
            },
            "date": {
                "display": "Time posted",
                "option": {
                    "any": "Any time",
                    "day": "Past day",
                    "week": "Past week",
                    "month": "Past month",
                    "year": "Past year"
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

        let page = parse_page(&html, &url)?;
        let mut out = empty_results();
        out["web"] = Value::Array(page.items);
        out["related"] = json!(page.related);
        if let Some(next) = page.next {
            out["npt"] = json!(self.ctx.store(&next, "web", &proxy).await);
        }
        Ok(out)
    }
}
