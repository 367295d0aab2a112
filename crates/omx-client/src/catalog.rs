//! HTTP implementation of the workflow catalog.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use omx_core::provision::{CatalogWorkflow, CreateWorkflowRequest, WorkflowCatalog};

pub struct HttpWorkflowCatalog {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpWorkflowCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl WorkflowCatalog for HttpWorkflowCatalog {
    async fn list_workflows(&self, name_filter: &str) -> anyhow::Result<Vec<CatalogWorkflow>> {
        let url = self.url("workflows");
        debug!("Listing workflows named {} via {}", name_filter, url);

        let response = self
            .authorized(self.client.get(&url))
            .query(&[("name", name_filter)])
            .send()
            .await
            .context("failed to send workflow listing request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("workflow listing failed with status {status}: {text}");
        }

        response
            .json()
            .await
            .context("failed to parse workflow listing response")
    }

    async fn create_workflow(
        &self,
        request: &CreateWorkflowRequest,
    ) -> anyhow::Result<CatalogWorkflow> {
        let url = self.url("workflows");
        debug!("Creating workflow {} via {}", request.name, url);

        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .context("failed to send workflow creation request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("workflow creation failed with status {status}: {text}");
        }

        response
            .json()
            .await
            .context("failed to parse workflow creation response")
    }

    async fn delete_workflow(&self, id: &str) -> anyhow::Result<()> {
        let url = self.url(&format!("workflows/{id}"));

        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await
            .context("failed to send workflow deletion request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("workflow deletion failed with status {status}: {text}");
        }
        Ok(())
    }
}
