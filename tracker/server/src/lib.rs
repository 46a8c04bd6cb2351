pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        pub supabase_url: String,
        pub supabase_key: String,
        #[serde(default = "default_port")]
        pub port: u16,
        #[serde(default = "default_task_table")]
        pub task_table: String,
        #[serde(default = "default_run_table")]
        pub run_table: String,
        #[serde(default = "default_task_bucket")]
        pub task_bucket: String,
        #[serde(default = "default_run_bucket")]
        pub run_bucket: String,
        /// The run edit form has always uploaded into its own bucket.
        #[serde(default = "default_run_edit_bucket")]
        pub run_edit_bucket: String,
        /// `chrono` format string used for dates in the list tables.
        #[serde(default = "default_date_format")]
        pub date_format: String,
        #[serde(default = "default_request_timeout_secs")]
        pub request_timeout_secs: u64,
        #[serde(default = "default_max_upload_bytes")]
        pub max_upload_bytes: usize,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_builder(
                config::Config::builder().add_source(config::Environment::default()),
            )
        }

        /// Builds the configuration from an already populated builder.
        pub fn from_builder(
            builder: config::ConfigBuilder<config::builder::DefaultState>,
        ) -> anyhow::Result<Self> {
            let settings = builder.build()?;
            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_task_table() -> String {
        "task_tb".to_string()
    }

    fn default_run_table() -> String {
        "myrun_tb".to_string()
    }

    fn default_task_bucket() -> String {
        "task_bk".to_string()
    }

    fn default_run_bucket() -> String {
        "myrun_bucket".to_string()
    }

    fn default_run_edit_bucket() -> String {
        "run_images".to_string()
    }

    fn default_date_format() -> String {
        "%-m/%-d/%Y".to_string()
    }

    fn default_request_timeout_secs() -> u64 {
        30
    }

    fn default_max_upload_bytes() -> usize {
        10 * 1024 * 1024
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn builder_with_credentials() -> config::ConfigBuilder<config::builder::DefaultState> {
            config::Config::builder()
                .set_override("supabase_url", "https://example.supabase.co")
                .unwrap()
                .set_override("supabase_key", "anon-key")
                .unwrap()
        }

        #[test]
        fn can_fill_defaults_when_only_credentials_are_set() {
            let config = Config::from_builder(builder_with_credentials()).unwrap();

            assert_eq!(config.supabase_url, "https://example.supabase.co");
            assert_eq!(config.supabase_key, "anon-key");
            assert_eq!(config.port, 8080);
            assert_eq!(config.task_table, "task_tb");
            assert_eq!(config.run_table, "myrun_tb");
            assert_eq!(config.task_bucket, "task_bk");
            assert_eq!(config.run_bucket, "myrun_bucket");
            assert_eq!(config.run_edit_bucket, "run_images");
            assert_eq!(config.date_format, "%-m/%-d/%Y");
            assert_eq!(config.request_timeout_secs, 30);
            assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        }

        #[test]
        fn can_override_port_and_buckets() {
            let builder = builder_with_credentials()
                .set_override("port", 9090)
                .unwrap()
                .set_override("run_edit_bucket", "myrun_bucket")
                .unwrap();

            let config = Config::from_builder(builder).unwrap();

            assert_eq!(config.port, 9090);
            assert_eq!(config.run_edit_bucket, "myrun_bucket");
        }

        #[test]
        fn cannot_load_without_backend_credentials() {
            let result = Config::from_builder(config::Config::builder());
            assert!(result.is_err());
        }
    }
}

pub mod backend;
pub mod record;
pub mod run;
pub mod task;
pub mod web;
