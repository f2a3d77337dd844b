//! Search routines and the capability interface they implement.
//!
//! A routine scrapes one engine. It is constructed with a
//! [`RoutineContext`] that supplies everything with side effects (network,
//! proxy choice, continuation storage), and exposes one method per search
//! category it supports.

mod catalog;
mod context;
pub mod duckduckgo;
mod error;
pub mod html;
pub mod mojeek;
mod params;

pub use catalog::{LoadError, LoadedRoutine, RoutineCatalog, RoutineFactory};
pub use context::RoutineContext;
pub use error::RoutineError;
pub use params::SearchParams;

use std::fmt;

use async_trait::async_trait;
use serde_json::{json, Value};

/// Results per page assumed when a routine does not declare its own.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

pub type RoutineResult = Result<Value, RoutineError>;

/// Search category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Web,
    Images,
    Videos,
    News,
    Music,
}

impl Operation {
    pub const ALL: &'static [Operation] = &[
        Operation::Web,
        Operation::Images,
        Operation::Videos,
        Operation::News,
        Operation::Music,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "web" => Some(Self::Web),
            "images" | "image" => Some(Self::Images),
            "videos" | "video" => Some(Self::Videos),
            "news" => Some(Self::News),
            "music" | "songs" | "song" => Some(Self::Music),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Images => "images",
            Self::Videos => "videos",
            Self::News => "news",
            Self::Music => "music",
        }
    }

    /// Key holding this category's items in a result object.
    pub fn result_key(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Images => "image",
            Self::Videos => "video",
            Self::News => "news",
            Self::Music => "song",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface implemented by every engine.
///
/// Category methods default to [`RoutineError::NotSupported`]; a routine
/// overrides the ones it lists in [`SearchRoutine::operations`].
#[async_trait]
pub trait SearchRoutine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Results per page, used to key the positional continuation index.
    fn page_size(&self) -> u64 {
        DEFAULT_PAGE_SIZE
    }

    fn operations(&self) -> &'static [Operation] {
        &[Operation::Web]
    }

    /// Filters offered on `page`. Must not fetch anything.
    fn filters(&self, page: Operation) -> Value;

    async fn web(&self, _params: &SearchParams) -> RoutineResult {
        Err(RoutineError::NotSupported(Operation::Web))
    }

    async fn images(&self, _params: &SearchParams) -> RoutineResult {
        Err(RoutineError::NotSupported(Operation::Images))
    }

    async fn videos(&self, _params: &SearchParams) -> RoutineResult {
        Err(RoutineError::NotSupported(Operation::Videos))
    }

    async fn news(&self, _params: &SearchParams) -> RoutineResult {
        Err(RoutineError::NotSupported(Operation::News))
    }

    async fn music(&self, _params: &SearchParams) -> RoutineResult {
        Err(RoutineError::NotSupported(Operation::Music))
    }
}

/// Run `operation` on `routine`.
pub async fn invoke(
    routine: &dyn SearchRoutine,
    operation: Operation,
    params: &SearchParams,
) -> RoutineResult {
    if !routine.operations().contains(&operation) {
        return Err(RoutineError::NotSupported(operation));
    }

    match operation {
        Operation::Web => routine.web(params).await,
        Operation::Images => routine.images(params).await,
        Operation::Videos => routine.videos(params).await,
        Operation::News => routine.news(params).await,
        Operation::Music => routine.music(params).await,
    }
}

/// Empty result object in the shape front ends expect.
pub fn empty_results() -> Value {
    json!({
        "status": "ok",
        "spelling": {
            "type": "no_correction",
            "using": null,
            "correction": null
        },
        "npt": null,
        "answer": [],
        "web": [],
        "image": [],
        "video": [],
        "news": [],
        "related": []
    })
}

/// One web result.
pub fn web_item(title: &str, description: &str, url: &str) -> Value {
    json!({
        "title": title,
        "description": description,
        "url": url,
        "date": null,
        "type": "web",
        "thumb": {"url": null, "ratio": null},
        "sublink": [],
        "table": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WebOnly;

    #[async_trait]
    impl SearchRoutine for WebOnly {
        fn name(&self) -> &'static str {
            "web_only"
        }

        fn filters(&self, _page: Operation) -> Value {
            json!({})
        }

        async fn web(&self, params: &SearchParams) -> RoutineResult {
            let mut out = empty_results();
            out["web"] = json!([web_item(params.query(), "", "https://example.com")]);
            Ok(out)
        }

        async fn news(&self, _params: &SearchParams) -> RoutineResult {
            Ok(empty_results())
        }
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!(Operation::parse("web"), Some(Operation::Web));
        assert_eq!(Operation::parse(""), Some(Operation::Web));
        assert_eq!(Operation::parse("Images"), Some(Operation::Images));
        assert_eq!(Operation::parse("song"), Some(Operation::Music));
        assert_eq!(Operation::parse("maps"), None);
        assert_eq!(Operation::Images.result_key(), "image");
    }

    #[tokio::test]
    async fn test_invoke_supported() {
        let params = SearchParams::merged(
            json!({"s": "hello"}).as_object().cloned().unwrap(),
        );
        let out = invoke(&WebOnly, Operation::Web, &params).await.unwrap();
        assert_eq!(out["web"][0]["title"], "hello");
    }

    #[tokio::test]
    async fn test_invoke_rejects_undeclared_operation() {
        // news is implemented but not declared
        let err = invoke(&WebOnly, Operation::News, &SearchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutineError::NotSupported(Operation::News)));

        let err = invoke(&WebOnly, Operation::Videos, &SearchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutineError::NotSupported(Operation::Videos)));
    }
}
