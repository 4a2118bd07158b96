//! In-memory engine for unit tests.
//!
//! Keeps networks, images and containers in plain vectors, records every call
//! in order, and can be told to fail specific calls.

use crate::container::{
    BuildProgress, BuildStream, ContainerError, ContainerInfo, Engine, EngineEvent, EventStream,
    ExecStream, ImageInfo, NetworkInfo, Result,
};
use async_trait::async_trait;
use bollard::models::{ContainerCreateBody, ExecConfig as ExecRequest, NetworkCreateRequest};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Mutex;

pub(crate) struct FakeState {
    pub networks: Vec<NetworkInfo>,
    pub images: Vec<ImageInfo>,
    pub containers: Vec<ContainerInfo>,
    pub calls: Vec<String>,
    pub network_requests: Vec<NetworkCreateRequest>,
    pub container_requests: Vec<(String, ContainerCreateBody)>,
    pub exec_requests: Vec<ExecRequest>,
    /// Chunks every exec session emits
    pub exec_chunks: Vec<Vec<u8>>,
    pub exec_exit_code: Option<i64>,
    pub build_messages: Vec<BuildProgress>,
    pub events: Vec<EngineEvent>,
    /// State a container takes when started
    pub start_state: String,
    pub failing: HashSet<&'static str>,
    next_id: u64,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            images: Vec::new(),
            containers: Vec::new(),
            calls: Vec::new(),
            network_requests: Vec::new(),
            container_requests: Vec::new(),
            exec_requests: Vec::new(),
            exec_chunks: Vec::new(),
            exec_exit_code: Some(0),
            build_messages: Vec::new(),
            events: Vec::new(),
            start_state: "running".to_string(),
            failing: HashSet::new(),
            next_id: 0,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(self, name: &str) -> Self {
        self.configure(|s| {
            s.networks.push(NetworkInfo {
                id: format!("{}-net-id", name),
                name: name.to_string(),
                driver: "bridge".to_string(),
            })
        });
        self
    }

    pub fn with_image(self, tag: &str) -> Self {
        self.configure(|s| {
            s.images.push(ImageInfo {
                id: format!("sha256:{}", tag),
                repo_tags: vec![tag.to_string()],
                ..Default::default()
            })
        });
        self
    }

    pub fn with_container(self, name: &str, state: &str) -> Self {
        self.configure(|s| {
            s.containers.push(ContainerInfo {
                id: format!("{}-existing-id", name),
                names: vec![format!("/{}", name)],
                image: "some-image:latest".to_string(),
                state: state.to_string(),
                status: state.to_string(),
            })
        });
        self
    }

    pub fn failing(self, call: &'static str) -> Self {
        self.configure(|s| {
            s.failing.insert(call);
        });
        self
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&FakeState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<String> {
        self.inspect(|s| s.calls.clone())
    }

    pub fn calls_named(&self, call: &str) -> usize {
        self.inspect(|s| {
            s.calls
                .iter()
                .filter(|c| c.split(':').next() == Some(call))
                .count()
        })
    }

    fn record(&self, call: &'static str, detail: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if detail.is_empty() {
            state.calls.push(call.to_string());
        } else {
            state.calls.push(format!("{}:{}", call, detail));
        }

        if state.failing.contains(call) {
            return Err(ContainerError::Other(format!("{} failed", call)));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }

    fn set_state(&self, id: &str, new_state: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let new_state = new_state
            .map(String::from)
            .unwrap_or_else(|| state.start_state.clone());
        if let Some(container) = state.containers.iter_mut().find(|c| c.id == id) {
            container.status = new_state.clone();
            container.state = new_state;
        }
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn ping(&self) -> Result<()> {
        self.record("ping", "")
    }

    async fn list_networks(&self) -> Result<Vec<NetworkInfo>> {
        self.record("list_networks", "")?;
        Ok(self.inspect(|s| s.networks.clone()))
    }

    async fn create_network(&self, request: NetworkCreateRequest) -> Result<String> {
        self.record("create_network", &request.name)?;
        let id = self.next_id("net");
        self.configure(|s| {
            s.networks.push(NetworkInfo {
                id: id.clone(),
                name: request.name.clone(),
                driver: request.driver.clone().unwrap_or_default(),
            });
            s.network_requests.push(request);
        });
        Ok(id)
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        self.record("list_images", "")?;
        Ok(self.inspect(|s| s.images.clone()))
    }

    fn build_image(&self, dockerfile: &str, tag: &str, context: Vec<u8>) -> BuildStream<'_> {
        if let Err(e) = self.record("build_image", &format!("{}@{}", tag, dockerfile)) {
            return Box::pin(stream::iter(vec![Err(e)]));
        }

        let messages = self.inspect(|s| s.build_messages.clone());
        if !context.is_empty() && messages.iter().all(|m| m.error.is_none()) {
            let tag = if tag.contains(':') {
                tag.to_string()
            } else {
                format!("{}:latest", tag)
            };
            self.configure(|s| {
                s.images.push(ImageInfo {
                    id: format!("sha256:{}", tag),
                    repo_tags: vec![tag],
                    ..Default::default()
                })
            });
        }

        Box::pin(stream::iter(messages.into_iter().map(Ok)))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.record("pull_image", image)?;
        self.configure(|s| {
            s.images.push(ImageInfo {
                id: format!("sha256:{}", image),
                repo_tags: vec![image.to_string()],
                ..Default::default()
            })
        });
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        self.record("list_containers", "")?;
        Ok(self.inspect(|s| s.containers.clone()))
    }

    async fn create_container(&self, name: &str, body: ContainerCreateBody) -> Result<String> {
        self.record("create_container", name)?;
        let id = self.next_id(name);
        self.configure(|s| {
            s.containers.push(ContainerInfo {
                id: id.clone(),
                names: vec![format!("/{}", name)],
                image: body.image.clone().unwrap_or_default(),
                state: "created".to_string(),
                status: "Created".to_string(),
            });
            s.container_requests.push((name.to_string(), body));
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record("start_container", id)?;
        self.set_state(id, None);
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace_secs: u32) -> Result<()> {
        self.record("stop_container", &format!("{}@{}", id, grace_secs))?;
        self.set_state(id, Some("exited"));
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record("remove_container", id)?;
        self.configure(|s| s.containers.retain(|c| c.id != id));
        Ok(())
    }

    async fn create_exec(&self, container_id: &str, request: ExecRequest) -> Result<String> {
        self.record("create_exec", container_id)?;
        self.configure(|s| s.exec_requests.push(request));
        Ok(self.next_id("exec"))
    }

    async fn start_exec(&self, exec_id: &str) -> Result<ExecStream> {
        self.record("start_exec", exec_id)?;
        let chunks = self.inspect(|s| s.exec_chunks.clone());
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn exec_exit_code(&self, exec_id: &str) -> Result<Option<i64>> {
        self.record("exec_exit_code", exec_id)?;
        Ok(self.inspect(|s| s.exec_exit_code))
    }

    fn events(&self) -> EventStream {
        let _ = self.record("events", "");
        let events = self.inspect(|s| s.events.clone());
        Box::pin(stream::iter(events.into_iter().map(Ok)).chain(stream::pending()))
    }
}
