// types.rs
use chrono::{DateTime, Local, SubsecRound};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DirectoryError, Result};

/// Reserved id of the environment backed by the locally configured kubeconfig.
pub const DEFAULT_ENV_ID: &str = "default";
/// Synthesized id of an environment's management cluster.
pub const MANAGEMENT_CLUSTER_ID: &str = "gaia";

/// Placeholder stored in the connection fields of the local environment.
pub const NO_REMOTE: &str = "--";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(rename = "createTime", with = "timestamp", default = "now")]
    pub created_at: DateTime<Local>,
    #[serde(rename = "updateTime", with = "timestamp", default = "now")]
    pub updated_at: DateTime<Local>,
    #[serde(rename = "ip")]
    pub host: String,
    #[serde(rename = "user")]
    pub ssh_user: String,
    #[serde(rename = "password", default)]
    pub ssh_password: String,
    #[serde(rename = "kubeconfig", default)]
    pub management_kubeconfig: PathBuf,
}

impl Environment {
    /// A candidate record as collected from the operator; timestamps are
    /// overwritten by the registry on add/update.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        host: impl Into<String>,
        ssh_user: impl Into<String>,
        ssh_password: impl Into<String>,
    ) -> Self {
        let stamp = now();
        Self {
            id: id.into(),
            display_name: display_name.into(),
            created_at: stamp,
            updated_at: stamp,
            host: host.into(),
            ssh_user: ssh_user.into(),
            ssh_password: ssh_password.into(),
            management_kubeconfig: PathBuf::new(),
        }
    }

    pub fn local_default(kubeconfig: PathBuf) -> Self {
        let mut env = Self::new(DEFAULT_ENV_ID, DEFAULT_ENV_ID, NO_REMOTE, NO_REMOTE, NO_REMOTE);
        env.management_kubeconfig = kubeconfig;
        env
    }

    pub fn is_local_default(&self) -> bool {
        self.id == DEFAULT_ENV_ID
    }
}

/// Current local time at the precision the registry document stores.
pub fn now() -> DateTime<Local> {
    Local::now().trunc_subsecs(0)
}

/// Readiness reported by the management cluster for a workload cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Ready,
    NotReady,
    Unknown,
}

impl ReadyState {
    /// Decodes `status.ready`, accepting booleans and their string forms.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Bool(true)) => Self::Ready,
            Some(serde_json::Value::Bool(false)) => Self::NotReady,
            Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("true") => Self::Ready,
            Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("false") => {
                Self::NotReady
            }
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::NotReady => "notready",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord {
    pub id: String,
    pub display_name: String,
    pub os: String,
    pub arch: String,
    pub region: String,
    pub container_runtime: String,
    pub kubernetes_version: String,
    pub api_server_endpoint: String,
    pub ready: ReadyState,
    pub kubeconfig_secret_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub internal_ip: String,
}

/// Rejects ids that cannot safely become a single path component.
pub fn validate_id(field: &'static str, id: &str) -> Result<()> {
    let reason = if id.trim().is_empty() {
        Some("must not be empty")
    } else if id == "." || id == ".." {
        Some("must not be a relative path component")
    } else if id.contains(['/', '\\', '\0']) {
        Some("must not contain path separators")
    } else if id.starts_with('.') {
        Some("must not start with a dot")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DirectoryError::Invalid {
            field,
            reason: format!("`{}` {}", id, reason),
        }),
        None => Ok(()),
    }
}

pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(raw.trim(), FORMAT).map_err(de::Error::custom)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| de::Error::custom(format!("`{}` is not a valid local time", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ready_state_decodes_defensively() {
        assert_eq!(ReadyState::from_value(Some(&json!(true))), ReadyState::Ready);
        assert_eq!(ReadyState::from_value(Some(&json!(false))), ReadyState::NotReady);
        assert_eq!(ReadyState::from_value(Some(&json!("True"))), ReadyState::Ready);
        assert_eq!(ReadyState::from_value(Some(&json!({"x": 1}))), ReadyState::Unknown);
        assert_eq!(ReadyState::from_value(None), ReadyState::Unknown);
    }

    #[test]
    fn environment_uses_document_field_names() {
        let yaml = "\
id: prod-1
name: Production
createTime: 2024-03-01 10:00:00
updateTime: 2024-03-02 11:30:00
ip: 10.0.0.5
user: root
password: secret
kubeconfig: /home/op/.devctl/kubeconfigs/prod-1/config
";
        let env: Environment = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(env.id, "prod-1");
        assert_eq!(env.display_name, "Production");
        assert_eq!(env.host, "10.0.0.5");
        assert_eq!(env.updated_at.format(timestamp::FORMAT).to_string(), "2024-03-02 11:30:00");

        let out = serde_yaml::to_string(&env).unwrap();
        assert!(out.contains("createTime: 2024-03-01 10:00:00"));
        assert!(out.contains("ip: 10.0.0.5"));
    }

    #[test]
    fn missing_timestamps_default_to_now() {
        let before = now();
        let env: Environment = serde_yaml::from_str("id: lab\nip: 10.0.0.9\nuser: root\n").unwrap();
        assert!(env.created_at >= before);
        assert!(env.updated_at >= before);
        assert_eq!(env.display_name, "");
    }

    #[test]
    fn ids_must_be_single_path_components() {
        assert!(validate_id("environment id", "prod-1").is_ok());
        for bad in ["", "  ", ".", "..", "a/b", ".hidden", "a\\b"] {
            assert!(validate_id("environment id", bad).is_err(), "{:?}", bad);
        }
    }
}
