//! Foundation-model listing filtered through each key's allow-list and deployments

use std::collections::HashSet;

use http::Method;
use synapse_config::BedrockKey;
use synapse_core::CallContext;
use tracing::debug;

use crate::auth::Service;
use crate::client::{BedrockClient, request};
use crate::error::BedrockError;
use crate::pagination::{Page, serial_page};
use crate::protocol::control::{FoundationModelSummary, FoundationModelsResponse};
use crate::types::{ListModelsRequest, ModelInfo, ModelList};

/// Cross-region inference profile prefixes Bedrock puts in front of model ids
const REGION_PREFIXES: [&str; 7] = ["us.", "eu.", "ap.", "ca.", "sa.", "af.", "global."];

const BACKFILL_OWNER: &str = "bedrock";

fn strip_region(id: &str) -> &str {
    REGION_PREFIXES
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id)
}

/// Allow-list entry that names `id`, with or without a region prefix on either side
fn allowed_match<'a>(allowed: &'a [String], id: &str) -> Option<&'a str> {
    let bare = strip_region(id);
    allowed
        .iter()
        .find(|item| item.as_str() == id)
        .or_else(|| allowed.iter().find(|item| strip_region(item) == bare))
        .map(String::as_str)
}

/// `(deployment, alias)` whose deployment or alias names `id`
fn deployment_match<'a>(key: &'a BedrockKey, id: &str) -> Option<(&'a str, &'a str)> {
    let bare = strip_region(id);
    key.deployments
        .iter()
        .find(|(alias, deployment)| {
            deployment.as_str() == id
                || alias.as_str() == id
                || strip_region(deployment) == bare
                || strip_region(alias) == bare
        })
        .map(|(alias, deployment)| (deployment.as_str(), alias.as_str()))
}

/// Apply one key's filters to a listing
///
/// With both an allow-list and deployments, a model must be deployed under
/// an alias that is itself allowed. Allowed ids missing from the reply are
/// appended so callers still see them.
pub fn filter_models(key: &BedrockKey, summaries: Vec<FoundationModelSummary>) -> Vec<ModelInfo> {
    let has_allowed = !key.models.is_empty();
    let has_deployments = !key.deployments.is_empty();

    let mut included: HashSet<String> = HashSet::new();
    let mut models = Vec::with_capacity(summaries.len());

    for summary in summaries {
        let allowed = if has_allowed {
            allowed_match(&key.models, &summary.model_id)
        } else {
            None
        };
        let deployed = if has_deployments {
            deployment_match(key, &summary.model_id)
        } else {
            None
        };

        let keep = match (has_allowed, has_deployments) {
            (true, true) => deployed.is_some_and(|(_, alias)| key.models.iter().any(|m| m == alias)),
            (true, false) => allowed.is_some(),
            (false, true) => deployed.is_some(),
            (false, false) => true,
        };
        if !keep {
            continue;
        }

        let (id, deployment) = match (deployed, allowed) {
            (Some((deployment, alias)), _) => (alias.to_owned(), Some(deployment.to_owned())),
            (None, Some(allowed)) => (allowed.to_owned(), None),
            (None, None) => (summary.model_id.clone(), None),
        };

        included.insert(id.clone());
        models.push(ModelInfo {
            name: summary.model_name.unwrap_or_else(|| summary.model_id.clone()),
            owned_by: summary.provider_name.unwrap_or_else(|| BACKFILL_OWNER.to_owned()),
            id,
            input_modalities: summary.input_modalities,
            output_modalities: summary.output_modalities,
            deployment,
        });
    }

    for allowed in &key.models {
        if !included.contains(allowed) {
            models.push(ModelInfo {
                id: allowed.clone(),
                name: allowed.clone(),
                owned_by: BACKFILL_OWNER.to_owned(),
                input_modalities: Vec::new(),
                output_modalities: Vec::new(),
                deployment: key.deployments.get(allowed).cloned(),
            });
        }
    }

    models
}

impl BedrockClient {
    /// One key's `GET /foundation-models` reply, unfiltered
    pub(crate) async fn foundation_models(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        filters: &ListModelsRequest,
    ) -> Result<Vec<FoundationModelSummary>, BedrockError> {
        let mut url = self.control_url(key, "foundation-models")?;
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in [
                ("byProvider", &filters.by_provider),
                ("byOutputModality", &filters.by_output_modality),
                ("byInferenceType", &filters.by_inference_type),
                ("byCustomizationType", &filters.by_customization_type),
            ] {
                if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                    query.append_pair(name, value);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let reply: FoundationModelsResponse = self
            .send_json(ctx, key, Service::Bedrock, request(Method::GET, url, None), "foundation-models")
            .await?;
        debug!(key = %key.name, count = reply.model_summaries.len(), "listed foundation models");
        Ok(reply.model_summaries)
    }

    /// List models one key per page, in key order
    pub async fn list_models(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        request: &ListModelsRequest,
    ) -> Result<ModelList, BedrockError> {
        let page = serial_page(keys, request.after.as_deref(), |key, _token| async move {
            let summaries = self.foundation_models(ctx, key, request).await?;
            Ok(Page {
                items: filter_models(key, summaries),
                next_token: None,
            })
        })
        .await?;

        Ok(ModelList {
            has_more: page.has_more(),
            data: page.items,
            after: page.after,
        })
    }
}
