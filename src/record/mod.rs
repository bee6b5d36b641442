//! Normalization of heterogeneous scraper output into [`VideoRecord`]
//!
//! Scraper payloads vary by provider and endpoint: counts arrive as numbers or
//! suffixed strings, author data may be nested, and any field may be missing.
//! [`VideoRecord::from_value`] maps all of that onto one total structure so the
//! filter stages never deal with absent keys.

mod count;

pub use count::{count_from_float, parse_count};

use crate::error::{Result, VidsiftError};
use serde_json::{Map, Value};

/// Count field as received, parsed lazily by the stages that need it
#[derive(Debug, Clone, PartialEq)]
pub enum RawCount {
    Absent,
    Number(f64),
    Text(String),
}

impl RawCount {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Absent, Self::Number),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(Value::Bool(b)) => Self::Number(if *b { 1.0 } else { 0.0 }),
            _ => Self::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Parse into an integer count; `None` when the field is absent
    pub fn parse(&self) -> Result<Option<u64>> {
        match self {
            Self::Absent => Ok(None),
            Self::Number(n) => count_from_float(*n)
                .map(Some)
                .ok_or_else(|| VidsiftError::Parsing(format!("Count out of range: {}", n))),
            Self::Text(s) => parse_count(s).map(Some),
        }
    }

    /// Parse, treating an absent field as zero
    pub fn parse_or_zero(&self) -> Result<u64> {
        Ok(self.parse()?.unwrap_or(0))
    }
}

/// Creation time as received
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Absent,
    Text(String),
    Epoch(f64),
}

impl RawTimestamp {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Self::Text(s.trim().to_string()),
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Absent, Self::Epoch),
            _ => Self::Absent,
        }
    }
}

/// Canonical video metadata record
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub id: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub create_time: RawTimestamp,
    pub view_count: RawCount,
    pub like_count: RawCount,
    pub comment_count: RawCount,
    pub share_count: RawCount,
    pub is_verified: bool,
    pub follower_count: RawCount,
    pub following_count: RawCount,
    pub region: String,
    pub music_title: String,
    pub music_author: String,
    pub author_nickname: String,
    pub author_username: String,
    pub video_url: String,
    pub duration: RawCount,
    pub language: String,
    /// Original payload, carried through untouched to the output
    pub source: Map<String, Value>,
}

const ID_KEYS: &[&str] = &["id", "video_id", "aweme_id"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc"];
const HASHTAG_KEYS: &[&str] = &["hashtags", "challenges"];
const CREATE_TIME_KEYS: &[&str] = &["createTime", "create_time"];
const VIEW_KEYS: &[&str] = &["viewCount", "view_count", "playCount", "stats.playCount"];
const LIKE_KEYS: &[&str] = &["likeCount", "like_count", "diggCount", "stats.diggCount"];
const COMMENT_KEYS: &[&str] = &["commentCount", "comment_count", "stats.commentCount"];
const SHARE_KEYS: &[&str] = &["shareCount", "share_count", "stats.shareCount"];
const VERIFIED_KEYS: &[&str] = &[
    "isVerified",
    "is_verified",
    "author.verified",
    "authorMeta.verified",
];
const FOLLOWER_KEYS: &[&str] = &[
    "followerCount",
    "follower_count",
    "author.followerCount",
    "authorMeta.fans",
];
const FOLLOWING_KEYS: &[&str] = &["followingCount", "following_count", "author.followingCount"];
const REGION_KEYS: &[&str] = &["region", "country"];
const MUSIC_TITLE_KEYS: &[&str] = &["musicTitle", "music_title", "music.title"];
const MUSIC_AUTHOR_KEYS: &[&str] = &["musicAuthor", "music_author", "music.authorName"];
const NICKNAME_KEYS: &[&str] = &["authorNickname", "author_nickname", "author.nickname"];
const USERNAME_KEYS: &[&str] = &[
    "authorUsername",
    "author_username",
    "author.uniqueId",
    "authorMeta.name",
];
const URL_KEYS: &[&str] = &["videoUrl", "video_url", "url", "webVideoUrl"];
const DURATION_KEYS: &[&str] = &["duration", "video.duration", "videoMeta.duration"];
const LANGUAGE_KEYS: &[&str] = &["language", "textLanguage"];

impl VideoRecord {
    /// Normalize one scraper payload. Fails only when the payload is not a JSON object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            VidsiftError::Parsing(format!("Record is not an object: {}", type_name(value)))
        })?;

        Ok(Self {
            id: text_field(obj, ID_KEYS),
            description: text_field(obj, DESCRIPTION_KEYS),
            hashtags: hashtags(lookup(obj, HASHTAG_KEYS)),
            create_time: RawTimestamp::from_value(lookup(obj, CREATE_TIME_KEYS)),
            view_count: RawCount::from_value(lookup(obj, VIEW_KEYS)),
            like_count: RawCount::from_value(lookup(obj, LIKE_KEYS)),
            comment_count: RawCount::from_value(lookup(obj, COMMENT_KEYS)),
            share_count: RawCount::from_value(lookup(obj, SHARE_KEYS)),
            is_verified: VERIFIED_KEYS
                .iter()
                .filter_map(|k| get_path(obj, k))
                .any(truthy),
            follower_count: RawCount::from_value(lookup(obj, FOLLOWER_KEYS)),
            following_count: RawCount::from_value(lookup(obj, FOLLOWING_KEYS)),
            region: text_field(obj, REGION_KEYS),
            music_title: text_field(obj, MUSIC_TITLE_KEYS),
            music_author: text_field(obj, MUSIC_AUTHOR_KEYS),
            author_nickname: text_field(obj, NICKNAME_KEYS),
            author_username: text_field(obj, USERNAME_KEYS),
            video_url: text_field(obj, URL_KEYS),
            duration: RawCount::from_value(lookup(obj, DURATION_KEYS)),
            language: text_field(obj, LANGUAGE_KEYS),
            source: obj.clone(),
        })
    }
}

/// Video id of a raw payload, if it carries one
pub fn record_id(value: &Value) -> Option<String> {
    let id = text_field(value.as_object()?, ID_KEYS);
    (!id.is_empty()).then_some(id)
}

/// Resolve a dotted path like `author.followerCount`
fn get_path<'a>(obj: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = obj.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// First alias carrying a usable value; nulls and empty strings fall through
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| get_path(obj, k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    match lookup(obj, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn hashtags(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => ["title", "name", "hashtag_name"]
                    .iter()
                    .find_map(|k| o.get(*k).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    raw.iter()
        .map(|tag| tag.trim().trim_start_matches('#').to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
