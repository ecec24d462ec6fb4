use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The backend handler that produced an answer.
///
/// The service tags replies with a route such as `kb-query`.  Tags this crate
/// knows about get a display name; anything else is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Route {
    /// A route tag with a known meaning.
    Known(KnownRoute),

    /// Any other route tag reported by the service.
    Custom(String),
}

/// Route tags with a known meaning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnownRoute {
    /// Small talk handled without the knowledge base.
    GeneralQuery,

    /// The assistant asked the user for more information.
    AdditionalQuery,

    /// Vector knowledge base lookup.
    KbQuery,

    /// Knowledge graph lookup.
    GraphragQuery,

    /// Statistics answered through SQL generation.
    Text2sqlQuery,

    /// Image understanding.
    ImageQuery,

    /// Uploaded file processing.
    FileQuery,
}

impl KnownRoute {
    /// Every known route, in catalog order.
    pub const ALL: [KnownRoute; 7] = [
        KnownRoute::GeneralQuery,
        KnownRoute::AdditionalQuery,
        KnownRoute::KbQuery,
        KnownRoute::GraphragQuery,
        KnownRoute::Text2sqlQuery,
        KnownRoute::ImageQuery,
        KnownRoute::FileQuery,
    ];

    /// The wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            KnownRoute::GeneralQuery => "general-query",
            KnownRoute::AdditionalQuery => "additional-query",
            KnownRoute::KbQuery => "kb-query",
            KnownRoute::GraphragQuery => "graphrag-query",
            KnownRoute::Text2sqlQuery => "text2sql-query",
            KnownRoute::ImageQuery => "image-query",
            KnownRoute::FileQuery => "file-query",
        }
    }

    /// The label shown next to an answer.
    pub fn display_name(&self) -> &'static str {
        match self {
            KnownRoute::GeneralQuery => "日常对话",
            KnownRoute::AdditionalQuery => "补充信息",
            KnownRoute::KbQuery => "知识库查询",
            KnownRoute::GraphragQuery => "图谱查询",
            KnownRoute::Text2sqlQuery => "统计查询",
            KnownRoute::ImageQuery => "图片处理",
            KnownRoute::FileQuery => "文件处理",
        }
    }
}

impl Route {
    /// The wire tag.
    pub fn tag(&self) -> &str {
        match self {
            Route::Known(known) => known.tag(),
            Route::Custom(custom) => custom,
        }
    }

    /// The label shown next to an answer; unknown tags display as themselves.
    pub fn display_name(&self) -> &str {
        match self {
            Route::Known(known) => known.display_name(),
            Route::Custom(custom) => custom,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl fmt::Display for KnownRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Route {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Route::from(s))
    }
}

impl From<KnownRoute> for Route {
    fn from(route: KnownRoute) -> Self {
        Route::Known(route)
    }
}

impl From<&str> for Route {
    fn from(route: &str) -> Self {
        KnownRoute::ALL
            .iter()
            .find(|known| known.tag() == route)
            .map(|known| Route::Known(*known))
            .unwrap_or_else(|| Route::Custom(route.to_string()))
    }
}

impl From<String> for Route {
    fn from(route: String) -> Self {
        Route::from(route.as_str())
    }
}
