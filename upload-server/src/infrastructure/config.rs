use anyhow::bail;
use serde::Deserialize;
use service_storage::{DEFAULT_MAX_OBJECT_SIZE, MAX_PART_COUNT, MIN_PART_SIZE};

use super::TelemetryConfig;

#[derive(Default, Clone, Deserialize, Debug)]
pub struct UploadServerConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl UploadServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let upload = &self.upload;
        if upload.part_size == 0 {
            bail!("upload.part_size must not be zero");
        }
        if upload.max_object_size == 0 {
            bail!("upload.max_object_size must not be zero");
        }
        if upload.allowed_content_types.is_empty() {
            bail!("upload.allowed_content_types must not be empty");
        }
        if matches!(self.store, StoreConfig::S3(_)) {
            if upload.part_size < MIN_PART_SIZE {
                bail!(
                    "upload.part_size: {} is below the S3 minimum part size: {MIN_PART_SIZE}",
                    upload.part_size
                );
            }
            let parts = upload.max_object_size.div_ceil(upload.part_size as u64);
            if parts > u64::from(MAX_PART_COUNT) {
                bail!(
                    "upload.max_object_size: {} needs {parts} parts of {} bytes, S3 allows {MAX_PART_COUNT}",
                    upload.max_object_size,
                    upload.part_size
                );
            }
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct HostConfig {
    #[serde(default = "HostConfig::default_address")]
    pub bind_address: String,
    #[serde(default = "HostConfig::default_port")]
    pub bind_port: u16,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::default_address(),
            bind_port: Self::default_port(),
        }
    }
}

impl HostConfig {
    fn default_address() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        8080
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct UploadConfig {
    #[serde(default = "UploadConfig::default_max_object_size")]
    pub max_object_size: u64,
    #[serde(default = "UploadConfig::default_part_size")]
    pub part_size: usize,
    /// Media type prefixes accepted for upload, e.g. `image/`.
    #[serde(default = "UploadConfig::default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
    #[serde(default = "UploadConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Body pieces buffered between the connection and the upload task.
    #[serde(default = "UploadConfig::default_body_channel_capacity")]
    pub body_channel_capacity: usize,
    #[serde(default = "UploadConfig::default_buffer_pool_size")]
    pub buffer_pool_size: usize,
}

impl UploadConfig {
    fn default_max_object_size() -> u64 {
        DEFAULT_MAX_OBJECT_SIZE
    }
    fn default_part_size() -> usize {
        MIN_PART_SIZE
    }
    fn default_allowed_content_types() -> Vec<String> {
        vec!["image/".to_string(), "video/".to_string()]
    }
    fn default_request_timeout_secs() -> u64 {
        60 * 60
    }
    fn default_body_channel_capacity() -> usize {
        16
    }
    fn default_buffer_pool_size() -> usize {
        8
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_object_size: Self::default_max_object_size(),
            part_size: Self::default_part_size(),
            allowed_content_types: Self::default_allowed_content_types(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            body_channel_capacity: Self::default_body_channel_capacity(),
            buffer_pool_size: Self::default_buffer_pool_size(),
        }
    }
}

#[derive(Default, Clone, Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    S3(S3Config),
    /// Objects live in process memory and vanish on restart.
    #[default]
    Memory,
}

#[derive(Clone, Deserialize, Debug)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "S3Config::default_region")]
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default = "S3Config::default_force_path_style")]
    pub force_path_style: bool,
    /// Base of the links returned to clients, the object key is appended.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl S3Config {
    fn default_region() -> String {
        "us-east-1".to_string()
    }
    fn default_force_path_style() -> bool {
        true
    }
}

pub fn build_config() -> anyhow::Result<UploadServerConfig> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = config::Config::builder().add_source(
        config::File::with_name("config")
            .required(false)
            .format(config::FileFormat::Yaml),
    );
    for arg in args {
        if arg.ends_with("yaml") || arg.ends_with("yml") {
            config = config.add_source(
                config::File::from(std::path::Path::new(arg.as_str()))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }
    }
    config = config.add_source(
        config::Environment::with_prefix("UPLOAD")
            .separator("__")
            .try_parsing(true)
            .list_separator(";")
            .with_list_parse_key("upload.allowed_content_types"),
    );
    Ok(config.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> UploadServerConfig {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = from_yaml("{}");
        assert_eq!(config.host.bind_port, 8080);
        assert_eq!(config.upload.part_size, 5 * 1024 * 1024);
        assert_eq!(config.upload.allowed_content_types, ["image/", "video/"]);
        assert!(matches!(config.store, StoreConfig::Memory));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn s3_store_is_read_from_yaml() {
        let config = from_yaml(
            r#"
upload:
  max_object_size: 1048576000
  allowed_content_types: ["image/"]
store:
  kind: s3
  endpoint: http://localhost:9000
  bucket: media
  access_key_id: minio
  secret_access_key: minio123
"#,
        );
        assert_eq!(config.upload.max_object_size, 1048576000);
        let StoreConfig::S3(s3) = &config.store else {
            panic!("expected s3 store, got {:?}", config.store);
        };
        assert_eq!(s3.bucket, "media");
        assert_eq!(s3.region, "us-east-1");
        assert!(s3.force_path_style);
        assert!(s3.public_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn s3_rejects_parts_below_the_store_minimum() {
        let config = from_yaml(
            r#"
upload:
  part_size: 1024
store:
  kind: s3
  endpoint: http://localhost:9000
  bucket: media
  access_key_id: minio
  secret_access_key: minio123
"#,
        );
        assert!(config.validate().is_err());

        let memory = from_yaml("upload:\n  part_size: 1024\n");
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn s3_rejects_objects_needing_more_parts_than_allowed() {
        let s3 = r#"
store:
  kind: s3
  endpoint: http://localhost:9000
  bucket: media
  access_key_id: minio
  secret_access_key: minio123
"#;
        // 100 GiB in 5 MiB parts needs 20480 parts.
        let config = from_yaml(&format!("upload:\n  max_object_size: 107374182400\n{s3}"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("20480 parts"), "{err}");

        // The same size fits once parts are large enough.
        let config = from_yaml(&format!(
            "upload:\n  max_object_size: 107374182400\n  part_size: 16777216\n{s3}"
        ));
        assert!(config.validate().is_ok());
    }
}
