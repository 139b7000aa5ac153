use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_u16, parse_u32, parse_u64, parse_usize,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExtractionSettings,
    GradingSettings, RuntimeSettings, S3Settings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("GRADEFLOW_HOST", "0.0.0.0");
        let port = env_or_default("GRADEFLOW_PORT", "8000");

        let environment = parse_environment(
            env_optional("GRADEFLOW_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("GRADEFLOW_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Gradeflow API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "gradeflow");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "gradeflow_db");
        let database_url = env_optional("DATABASE_URL");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let grading_model = env_or_default("AI_GRADING_MODEL", "gpt-4o");
        let quick_model = env_or_default("AI_QUICK_MODEL", "gpt-4o-mini");
        let max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "2000"))?;
        let quick_max_tokens =
            parse_u32("AI_QUICK_MAX_TOKENS", env_or_default("AI_QUICK_MAX_TOKENS", "500"))?;
        let temperature = parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.2"))?;
        let request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "120"))?;
        let max_attempts = parse_u32("AI_MAX_ATTEMPTS", env_or_default("AI_MAX_ATTEMPTS", "3"))?;

        let batch_size =
            parse_usize("GRADING_BATCH_SIZE", env_or_default("GRADING_BATCH_SIZE", "5"))?;
        let batch_pause_ms =
            parse_u64("GRADING_BATCH_PAUSE_MS", env_or_default("GRADING_BATCH_PAUSE_MS", "1000"))?;
        let short_answer_threshold = parse_f64(
            "SHORT_ANSWER_CORRECT_THRESHOLD",
            env_or_default("SHORT_ANSWER_CORRECT_THRESHOLD", "80"),
        )?;
        let essay_threshold = parse_f64(
            "ESSAY_CORRECT_THRESHOLD",
            env_or_default("ESSAY_CORRECT_THRESHOLD", "60"),
        )?;

        let extraction_api_key = env_or_default("EXTRACTION_API_KEY", "");
        let extraction_base_url =
            env_or_default("EXTRACTION_BASE_URL", "https://www.datalab.to/api/v1");
        let extraction_timeout_seconds = parse_u64(
            "EXTRACTION_TIMEOUT_SECONDS",
            env_or_default("EXTRACTION_TIMEOUT_SECONDS", "120"),
        )?;
        let extraction_poll_interval_seconds = parse_u64(
            "EXTRACTION_POLL_INTERVAL_SECONDS",
            env_or_default("EXTRACTION_POLL_INTERVAL_SECONDS", "2"),
        )?;
        let extraction_max_poll_attempts = parse_u32(
            "EXTRACTION_MAX_POLL_ATTEMPTS",
            env_or_default("EXTRACTION_MAX_POLL_ATTEMPTS", "60"),
        )?;

        let s3_endpoint = env_or_default("S3_ENDPOINT", "http://localhost:9000");
        let s3_access_key = env_or_default("S3_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("S3_SECRET_KEY", "");
        let s3_bucket = env_or_default("S3_BUCKET", "gradeflow-documents");
        let s3_region = env_or_default("S3_REGION", "us-east-1");

        let log_level = env_or_default("GRADEFLOW_LOG_LEVEL", "info");
        let json = env_optional("GRADEFLOW_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                grading_model,
                quick_model,
                max_tokens,
                quick_max_tokens,
                temperature,
                request_timeout,
                max_attempts,
            },
            grading: GradingSettings {
                batch_size,
                batch_pause_ms,
                short_answer_threshold,
                essay_threshold,
            },
            extraction: ExtractionSettings {
                api_key: extraction_api_key,
                base_url: extraction_base_url,
                timeout_seconds: extraction_timeout_seconds,
                poll_interval_seconds: extraction_poll_interval_seconds,
                max_poll_attempts: extraction_max_poll_attempts,
            },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn extraction(&self) -> &ExtractionSettings {
        &self.extraction
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grading.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        for (field, value) in [
            ("SHORT_ANSWER_CORRECT_THRESHOLD", self.grading.short_answer_threshold),
            ("ESSAY_CORRECT_THRESHOLD", self.grading.essay_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidValue { field, value: value.to_string() });
            }
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "AI_TEMPERATURE",
                value: self.ai.temperature.to_string(),
            });
        }

        if self.ai.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.extraction.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXTRACTION_POLL_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.extraction.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXTRACTION_MAX_POLL_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.extraction.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("EXTRACTION_API_KEY"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use crate::core::config::ConfigError;
    use crate::test_support;

    #[tokio::test]
    async fn defaults_match_grading_policy() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.grading().batch_size, 5);
        assert_eq!(settings.grading().batch_pause_ms, 1000);
        assert_eq!(settings.grading().short_answer_threshold, 80.0);
        assert_eq!(settings.grading().essay_threshold, 60.0);
        assert_eq!(settings.ai().max_attempts, 3);
        assert!(settings.ai().temperature <= 0.3);
    }

    #[tokio::test]
    async fn rejects_threshold_outside_percentage_range() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("ESSAY_CORRECT_THRESHOLD", "140");

        let result = Settings::load();
        std::env::remove_var("ESSAY_CORRECT_THRESHOLD");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "ESSAY_CORRECT_THRESHOLD", .. })
        ));
    }

    #[tokio::test]
    async fn strict_mode_requires_ai_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("GRADEFLOW_STRICT_CONFIG", "1");
        std::env::remove_var("OPENAI_API_KEY");

        let result = Settings::load();
        std::env::set_var("GRADEFLOW_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("OPENAI_API_KEY"))));
    }
}
