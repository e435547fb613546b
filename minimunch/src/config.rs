use crate::*;
use serde::{Deserialize, Serialize};
use std::{
    io::{Read, Write},
    path::PathBuf,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct Configuration {
    pub remote: Arc<RemoteConfiguration>,
    #[serde(default)]
    pub view:   Arc<ViewConfiguration>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            remote: Default::default(),
            view:   Default::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteConfiguration {
    Mqtt(MqttConfiguration),
    Memory(MemoryConfiguration),
}

impl Default for RemoteConfiguration {
    fn default() -> Self {
        Self::Mqtt(Default::default())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct MqttConfiguration {
    pub client_id:       String,
    pub host:            String,
    pub port:            u16,
    pub base_topic:      String,
    pub keep_alive_secs: u64,
    pub reconnect_secs:  u64,
}

impl Default for MqttConfiguration {
    fn default() -> Self {
        MqttConfiguration {
            client_id:       crate_name!().into(),
            host:            "localhost".into(),
            port:            1883,
            base_topic:      crate_name!().into(),
            keep_alive_secs: 5,
            reconnect_secs:  5,
        }
    }
}

/// In-process store, seeded with a record. Useful without a broker.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "snake_case", default)]
pub struct MemoryConfiguration {
    pub seed: DispenserRecord,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "snake_case", default)]
pub struct ViewConfiguration {
    /// Path of the dispenser record in the store.
    pub path:      String,
    /// Hold optimistic values until a snapshot confirms them, and roll them
    /// back when the write fails.
    pub reconcile: bool,
}

impl Default for ViewConfiguration {
    fn default() -> Self {
        ViewConfiguration {
            path:      Dispenser::RECORD_PATH.into(),
            reconcile: false,
        }
    }
}

impl Configuration {
    pub fn load(file: PathBuf) -> Result<Arc<Self>> {
        let path = file.to_string_lossy().to_string();
        let mut f = std::fs::File::open(file)
            .with_context(|| format!("Could not load configuration from file {}!", path))?;
        let mut contents = String::new();
        f.read_to_string(&mut contents)?;
        let c = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse contents of {}!", path))?;
        Ok(Arc::new(c))
    }

    pub fn generate_default(file: PathBuf) -> Result<()> {
        let path = file.to_string_lossy().to_string();
        let config = Self::default();
        let content = toml::to_vec(&config)?;
        let mut f = std::fs::File::create(file)
            .with_context(|| format!("Could not create file {}!", path))?;
        f.write_all(&content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_default_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("minimunch.toml");
        Configuration::generate_default(file.clone()).unwrap();
        let loaded = Configuration::load(file).unwrap();
        assert_eq!(*loaded, Configuration::default());
    }

    #[test]
    fn memory_remote_with_partial_sections() {
        let c: Configuration = toml::from_str(
            r#"
            [remote]
            type = "memory"

            [view]
            reconcile = true
            "#,
        )
        .unwrap();
        assert_eq!(
            *c.remote,
            RemoteConfiguration::Memory(MemoryConfiguration::default())
        );
        assert_eq!(c.view.path, "dispensador");
        assert!(c.view.reconcile);
    }

    #[test]
    fn mqtt_remote_fills_defaults() {
        let c: Configuration = toml::from_str(
            r#"
            [remote]
            type = "mqtt"
            host = "broker.local"
            "#,
        )
        .unwrap();
        match &*c.remote {
            RemoteConfiguration::Mqtt(m) => {
                assert_eq!(m.host, "broker.local");
                assert_eq!(m.port, 1883);
                assert_eq!(m.base_topic, "minimunch");
            }
            other => panic!("unexpected remote {:?}", other),
        }
        assert_eq!(*c.view, ViewConfiguration::default());
    }

    #[test]
    fn unknown_view_keys_are_rejected() {
        let r: std::result::Result<Configuration, _> = toml::from_str(
            r#"
            [remote]
            type = "memory"

            [view]
            colour = "red"
            "#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Configuration::load(PathBuf::from("/nonexistent/minimunch.toml")).unwrap_err();
        assert!(format!("{}", err).contains("/nonexistent/minimunch.toml"));
    }
}
