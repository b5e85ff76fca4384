#[derive(Debug, Clone)]
pub struct Config {
    pub firebase_api_key: String,
    pub firebase_project_id: String,
    pub collection: String,
    pub poll_interval_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let firebase_api_key = env_required("INTAKE_FIREBASE_API_KEY")?;
        let firebase_project_id = env_required("INTAKE_FIREBASE_PROJECT_ID")?;

        let collection = env_or("INTAKE_COLLECTION", "tableau-submissions");

        let poll_interval_secs: u64 = env_or("INTAKE_POLL_INTERVAL_SECS", "2")
            .parse()
            .map_err(|e| format!("Invalid INTAKE_POLL_INTERVAL_SECS: {e}"))?;

        let log_level = env_or("INTAKE_LOG_LEVEL", "info");

        Ok(Config {
            firebase_api_key,
            firebase_project_id,
            collection,
            poll_interval_secs,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
