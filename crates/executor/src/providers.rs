//! Static provider catalogs.
//!
//! Embedding and reranking models run outside the engine. These commands only
//! describe what a deployment offers so clients can pick a model; nothing
//! here touches the store.

use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};

/// Embedding providers, keyed by provider name.
pub static VECTOR_PROVIDERS: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "openai": {
            "displayName": "OpenAI",
            "url": "https://api.openai.com/v1/",
            "supportedAuthentication": ["HEADER"],
            "models": [
                {"name": "text-embedding-3-small", "vectorDimension": null, "defaultDimension": 1536},
                {"name": "text-embedding-3-large", "vectorDimension": null, "defaultDimension": 3072},
                {"name": "text-embedding-ada-002", "vectorDimension": 1536}
            ]
        },
        "nvidia": {
            "displayName": "NVIDIA",
            "url": "https://integrate.api.nvidia.com/v1/",
            "supportedAuthentication": ["NONE"],
            "models": [
                {"name": "NV-Embed-QA", "vectorDimension": 1024}
            ]
        },
        "mistral": {
            "displayName": "Mistral AI",
            "url": "https://api.mistral.ai/v1/",
            "supportedAuthentication": ["HEADER"],
            "models": [
                {"name": "mistral-embed", "vectorDimension": 1024}
            ]
        }
    })
});

/// Reranking providers, keyed by provider name.
pub static RERANKING_PROVIDERS: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "nvidia": {
            "displayName": "NVIDIA",
            "isDefault": true,
            "supportedAuthentication": ["NONE"],
            "models": [
                {"name": "nvidia/llama-3.2-nv-rerankqa-1b-v2", "isDefault": true}
            ]
        }
    })
});
