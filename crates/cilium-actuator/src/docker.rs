use crate::ActuatorError;
use cilium_schema::{ApiContainer, ContainerInfo};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, warn};

/// One entry of the Docker event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerEvent {
    #[serde(alias = "Id", default)]
    pub id: String,
    #[serde(alias = "Status", default)]
    pub status: String,
    #[serde(alias = "From", default)]
    pub from: String,
    #[serde(alias = "Time", default)]
    pub time: i64,
}

pub trait DockerApi: Send + Sync {
    fn ping(&self) -> Result<(), ActuatorError>;

    /// `None` when the daemon does not know the container (yet).
    fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>, ActuatorError>;

    fn list_containers(&self, all: bool) -> Result<Vec<ApiContainer>, ActuatorError>;

    /// Feed events newer than `since` to `sink` until the stream ends or
    /// `sink` returns false.
    fn stream_events(
        &self,
        since: i64,
        sink: &mut dyn FnMut(DockerEvent) -> bool,
    ) -> Result<(), ActuatorError>;
}

/// Docker remote API client over plain HTTP.
pub struct HttpDocker {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpDocker {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn get(&self, path: &str) -> Result<Option<ureq::Body>, ActuatorError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");
        match self.agent.get(&url).call() {
            Ok(resp) => Ok(Some(resp.into_body())),
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(ureq::Error::StatusCode(code)) => {
                Err(ActuatorError::Http(format!("HTTP {code} for {url}")))
            }
            Err(e) => Err(ActuatorError::Http(e.to_string())),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ActuatorError> {
        let Some(body) = self.get(path)? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        body.into_reader().read_to_end(&mut bytes)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

impl DockerApi for HttpDocker {
    fn ping(&self) -> Result<(), ActuatorError> {
        self.get("/_ping")?
            .map(|_| ())
            .ok_or_else(|| ActuatorError::Http(format!("{}/_ping not found", self.base_url)))
    }

    fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>, ActuatorError> {
        self.get_json(&format!("/containers/{id}/json"))
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ApiContainer>, ActuatorError> {
        let path = if all {
            "/containers/json?all=1"
        } else {
            "/containers/json"
        };
        Ok(self.get_json(path)?.unwrap_or_default())
    }

    fn stream_events(
        &self,
        since: i64,
        sink: &mut dyn FnMut(DockerEvent) -> bool,
    ) -> Result<(), ActuatorError> {
        let Some(body) = self.get(&format!("/events?since={since}"))? else {
            return Err(ActuatorError::Http(format!("{}/events not found", self.base_url)));
        };
        let stream = serde_json::Deserializer::from_reader(body.into_reader()).into_iter::<DockerEvent>();
        for event in stream {
            match event {
                Ok(event) => {
                    if !sink(event) {
                        break;
                    }
                }
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    warn!("error while reading events: {e}");
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}
