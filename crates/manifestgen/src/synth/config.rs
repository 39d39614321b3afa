use base64::{Engine, engine::general_purpose::STANDARD};
use k8s_openapi::{
    ByteString,
    api::core::v1::{ConfigMap, Secret},
};

use crate::synth::Context;

pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
pub const DEFAULT_REGISTRY_SERVER: &str = "https://index.docker.io/v1/";

pub fn config_maps(ctx: &Context) -> Vec<ConfigMap> {
    ctx.descriptor
        .config_maps
        .iter()
        .map(|config_map| ConfigMap {
            metadata: ctx.metadata(&config_map.name),
            data: (!config_map.data.is_empty()).then(|| config_map.data.clone()),
            ..ConfigMap::default()
        })
        .collect()
}

pub fn secrets(ctx: &Context) -> Vec<Secret> {
    ctx.descriptor
        .secrets
        .iter()
        .map(|secret| Secret {
            metadata: ctx.metadata(&secret.name),
            type_: secret.type_.clone(),
            string_data: (!secret.string_data.is_empty()).then(|| secret.string_data.clone()),
            ..Secret::default()
        })
        .collect()
}

/// The name of the generated image pull secret.
pub fn pull_secret_name(ctx: &Context) -> String {
    format!("{name}-pull-secret", name = ctx.name())
}

/// Pull secrets of every pod running the application image: the declared ones, then the
/// generated one.
pub fn image_pull_secrets(ctx: &Context) -> Vec<String> {
    let image = &ctx.descriptor.image;
    let generated = image
        .registry_credentials
        .as_ref()
        .map(|_| pull_secret_name(ctx));

    image.pull_secrets.iter().cloned().chain(generated).collect()
}

/// A `dockerconfigjson` Secret holding the registry credentials, if any were configured.
pub fn pull_secret(ctx: &Context) -> Option<Secret> {
    let image = &ctx.descriptor.image;
    let credentials = image.registry_credentials.as_ref()?;

    let server = image.registry.as_deref().unwrap_or(DEFAULT_REGISTRY_SERVER);
    let auth = STANDARD.encode(format!(
        "{username}:{password}",
        username = credentials.username,
        password = credentials.password
    ));
    let docker_config = serde_json::json!({
        "auths": {
            server: {
                "username": credentials.username,
                "password": credentials.password,
                "auth": auth,
            }
        }
    });

    Some(Secret {
        metadata: ctx.metadata(pull_secret_name(ctx)),
        type_: Some(DOCKER_CONFIG_JSON_TYPE.to_owned()),
        data: Some(
            [(
                DOCKER_CONFIG_JSON_KEY.to_owned(),
                ByteString(docker_config.to_string().into_bytes()),
            )]
            .into(),
        ),
        ..Secret::default()
    })
}
