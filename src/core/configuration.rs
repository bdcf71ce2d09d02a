use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Configuration {
    pub network: Option<NetworkConfiguration>,
    pub hub: Option<HubConfiguration>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NetworkConfiguration {
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HubConfiguration {
    /// directory served as the document root
    pub path: Option<String>,
    pub host: Option<String>,
    /// inline rewrite rules, evaluated before anything from `rules_file`
    pub rewrite_rules: Option<String>,
    /// path to an htaccess-style rule document
    pub rules_file: Option<String>,
    /// seed for the parser's `RewriteEngine` state
    pub engine: Option<bool>,
    pub server_string: Option<String>,
}

pub async fn load_configuration(
    path: &str,
) -> Result<Configuration, Box<dyn std::error::Error + Send + Sync>> {
    let res = tokio::fs::read_to_string(path).await?;
    let config = serde_yaml::from_str::<Configuration>(&res)?;
    Ok(config)
}

pub fn try_get_rules(configuration: &Configuration) -> Option<String> {
    configuration
        .hub
        .as_ref()
        .and_then(|hub| hub.rewrite_rules.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
network:
  port: 9090
hub:
  path: ./public/
  server_string: htserve/0.3
  engine: true
  rewrite_rules: |
    RewriteRule ^docs/(.*)$ /doc/$1 [L]
"#;

    #[test]
    fn test_parse_configuration() {
        let config = serde_yaml::from_str::<Configuration>(SAMPLE).unwrap();
        assert_eq!(config.network.as_ref().unwrap().port, Some(9090));

        let hub = config.hub.as_ref().unwrap();
        assert_eq!(hub.path.as_deref(), Some("./public/"));
        assert_eq!(hub.server_string.as_deref(), Some("htserve/0.3"));
        assert_eq!(hub.engine, Some(true));

        let rules = try_get_rules(&config).unwrap();
        assert!(rules.contains("RewriteRule ^docs/(.*)$"));
    }

    #[test]
    fn test_sections_optional() {
        let config = serde_yaml::from_str::<Configuration>("network:\n  port: 80\n").unwrap();
        assert!(config.hub.is_none());
        assert!(try_get_rules(&config).is_none());
    }
}
