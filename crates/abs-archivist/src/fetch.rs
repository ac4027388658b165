//! Read access to the game's universe API for systems and worlds that are not
//! cached yet.

use abs_core::records::{Entity, RawFields, RecordKey, SystemRecord, WorldRecord};
use abs_core::schema::EntityKind;
use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("unreadable response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Source of system and world metadata.
///
/// `Ok(None)` means the game does not disclose the entity (for example an
/// unexplored system); it is not an error.
pub trait UniverseFetcher {
    fn fetch_system(&self, id: &RecordKey) -> Result<Option<SystemRecord>, FetchError>;

    /// Worlds come back without coordinates; they sit at their system's.
    fn fetch_world(&self, id: &RecordKey) -> Result<Option<WorldRecord>, FetchError>;
}

impl<T: UniverseFetcher + ?Sized> UniverseFetcher for &T {
    fn fetch_system(&self, id: &RecordKey) -> Result<Option<SystemRecord>, FetchError> {
        (**self).fetch_system(id)
    }

    fn fetch_world(&self, id: &RecordKey) -> Result<Option<WorldRecord>, FetchError> {
        (**self).fetch_world(id)
    }
}

impl<T: UniverseFetcher + ?Sized> UniverseFetcher for Box<T> {
    fn fetch_system(&self, id: &RecordKey) -> Result<Option<SystemRecord>, FetchError> {
        (**self).fetch_system(id)
    }

    fn fetch_world(&self, id: &RecordKey) -> Result<Option<WorldRecord>, FetchError> {
        (**self).fetch_world(id)
    }
}

/// Never reaches the network; everything is undiscoverable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl UniverseFetcher for OfflineFetcher {
    fn fetch_system(&self, _id: &RecordKey) -> Result<Option<SystemRecord>, FetchError> {
        Ok(None)
    }

    fn fetch_world(&self, _id: &RecordKey) -> Result<Option<WorldRecord>, FetchError> {
        Ok(None)
    }
}

pub struct HttpFetcher {
    client: Client,
    api: Url,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let transport = |message: String| FetchError::Transport {
            url: base_url.to_string(),
            message,
        };
        let mut base = Url::parse(base_url).map_err(|err| transport(err.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let api = base.join("API/").map_err(|err| transport(err.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| transport(err.to_string()))?;
        Ok(Self { client, api })
    }

    pub fn endpoint(&self, command: &str, id: &RecordKey) -> Url {
        let mut url = self.api.clone();
        url.query_pairs_mut()
            .append_pair("c", command)
            .append_pair("ID", &id.to_string());
        url
    }

    fn get_json(&self, url: Url) -> Result<Option<Value>, FetchError> {
        debug!(%url, "fetching universe data");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().map_err(|err| FetchError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Ok(present(body))
    }
}

impl UniverseFetcher for HttpFetcher {
    fn fetch_system(&self, id: &RecordKey) -> Result<Option<SystemRecord>, FetchError> {
        let url = self.endpoint("system", id);
        let Some(body) = self.get_json(url.clone())? else {
            return Ok(None);
        };
        match decode_api_record(EntityKind::System, body, &url)? {
            Entity::System(system) => Ok(Some(system)),
            _ => Ok(None),
        }
    }

    fn fetch_world(&self, id: &RecordKey) -> Result<Option<WorldRecord>, FetchError> {
        let url = self.endpoint("world", id);
        let Some(body) = self.get_json(url.clone())? else {
            return Ok(None);
        };
        match decode_api_record(EntityKind::World, body, &url)? {
            Entity::World(world) => Ok(Some(world)),
            _ => Ok(None),
        }
    }
}

/// `null`, `false` and empty strings mean "not disclosed".
fn present(body: Value) -> Option<Value> {
    match body {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.trim().is_empty() => None,
        other => Some(other),
    }
}

/// The API keys records by `ID`; everything else matches attribute names.
pub fn decode_api_record(kind: EntityKind, body: Value, url: &Url) -> Result<Entity, FetchError> {
    let decode_error = |message: String| FetchError::Decode {
        url: url.to_string(),
        message,
    };
    let Value::Object(object) = body else {
        return Err(decode_error("expected a JSON object".to_string()));
    };

    let mut fields = RawFields::new();
    for (name, value) in object {
        let name = if name == "ID" { "id".to_string() } else { name };
        fields.insert(name, value);
    }
    Entity::from_fields(kind, &fields).map_err(|err| decode_error(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url() -> Url {
        Url::parse("https://example.test/API/?c=system&ID=1").expect("url")
    }

    #[test]
    fn endpoint_targets_api_path_with_query() {
        let fetcher =
            HttpFetcher::new("https://www.atmoburn.com", None).expect("fetcher");
        let endpoint = fetcher.endpoint("system", &RecordKey::Int(42));
        assert_eq!(
            endpoint.as_str(),
            "https://www.atmoburn.com/API/?c=system&ID=42"
        );

        let nested = HttpFetcher::new("http://localhost:8080/game", None).expect("fetcher");
        assert_eq!(
            nested.endpoint("world", &RecordKey::Int(7)).as_str(),
            "http://localhost:8080/game/API/?c=world&ID=7"
        );
    }

    #[test]
    fn api_system_maps_upper_case_id() {
        let body = json!({ "ID": "12", "name": "Sol", "x": 1, "y": 2, "z": 3, "galaxy": 1 });
        let Entity::System(system) =
            decode_api_record(EntityKind::System, body, &url()).expect("decode")
        else {
            panic!("expected system");
        };
        assert_eq!(system.id, RecordKey::Int(12));
        assert_eq!(system.name.as_deref(), Some("Sol"));
        assert_eq!(system.galaxy, Some(1));
    }

    #[test]
    fn api_record_without_id_is_a_decode_error() {
        let err = decode_api_record(EntityKind::World, json!({ "name": "x" }), &url())
            .expect_err("missing id");
        assert!(matches!(err, FetchError::Decode { .. }));
        let err = decode_api_record(EntityKind::World, json!([1, 2]), &url())
            .expect_err("not an object");
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn falsy_bodies_are_absent() {
        assert_eq!(present(json!(null)), None);
        assert_eq!(present(json!(false)), None);
        assert_eq!(present(json!("  ")), None);
        assert!(present(json!({ "ID": 1 })).is_some());
    }
}
