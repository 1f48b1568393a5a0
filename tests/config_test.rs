mod helpers;

use anyhow::Result;
use rsdetect::RsdetectError;
use rsdetect::config::{Credentials, load_global_config, load_optional_config};
use rsdetect::strategy::DownloadStrategy;
use tempfile::tempdir;

#[test]
fn test_load_global_config_full() -> Result<()> {
    let dir = tempdir()?;
    let base = helpers::utf8(dir.path());
    let path = base.join("rsdetect.yaml");
    // editorconfig-checker-disable
    std::fs::write(
        &path,
        r#"---
server:
  url: https://blackduck.example.com
  credentials: bd-token
  timeout: 300
  trust_cert: true
download_strategy:
  type: air_gap
  installation: detect-offline
tools_dir: cache/tools
installations:
  - name: detect-offline
    home: /opt/detect
  - name: detect-local
    home: vendor/detect
proxy:
  host: proxy.example.com
  port: 3128
  credentials: proxy-login
  no_proxy_hosts: "*.internal.example.com, localhost"
credentials:
  bd-token:
    token: abc123
  proxy-login:
    username: builder
    password: hunter2
platform_version: "2.440.3"
"#,
    )?;
    // editorconfig-checker-enable

    let config = load_global_config(&path)?;

    let server = config.server.as_ref().expect("server should be set");
    assert_eq!(server.url.as_str(), "https://blackduck.example.com/");
    assert_eq!(server.timeout, 300);
    assert!(server.trust_cert);
    assert_eq!(
        config.download_strategy,
        Some(DownloadStrategy::AirGap {
            installation: "detect-offline".to_string()
        })
    );
    assert_eq!(config.tools_dir, base.join("cache/tools"));
    assert_eq!(config.installation_home("detect-offline").map(|p| p.as_str()), Some("/opt/detect"));
    assert_eq!(
        config.installation_home("detect-local"),
        Some(base.join("vendor/detect").as_path())
    );
    assert_eq!(config.platform_version.as_deref(), Some("2.440.3"));
    assert!(matches!(
        config.credentials.get("bd-token"),
        Some(Credentials::Token { .. })
    ));

    let proxy = config.proxy_descriptor().expect("proxy should be set");
    assert_eq!(proxy.host, "proxy.example.com");
    assert_eq!(proxy.port, 3128);
    assert_eq!(proxy.username.as_deref(), Some("builder"));
    assert_eq!(proxy.password.as_deref(), Some("hunter2"));
    assert_eq!(proxy.ignored_hosts, vec!["*.internal.example.com", "localhost"]);

    Ok(())
}

#[test]
fn test_load_global_config_defaults() -> Result<()> {
    let dir = tempdir()?;
    let base = helpers::utf8(dir.path());
    let path = base.join("rsdetect.yaml");
    std::fs::write(&path, "{}\n")?;

    let config = load_global_config(&path)?;
    assert!(config.server.is_none());
    assert!(config.download_strategy.is_none());
    assert_eq!(config.tools_dir, base.join("tools"));
    assert!(config.installations.is_empty());
    assert!(config.proxy_descriptor().is_none());
    assert!(config.child_environment().is_empty());

    Ok(())
}

#[test]
fn test_unknown_field_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = helpers::utf8(dir.path()).join("rsdetect.yaml");
    std::fs::write(&path, "tool_dir: typo\n")?;

    let err = load_global_config(&path).unwrap_err();
    assert!(matches!(err, RsdetectError::Config(_)), "got {:?}", err);

    Ok(())
}

#[test]
fn test_undefined_air_gap_installation_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = helpers::utf8(dir.path()).join("rsdetect.yaml");
    std::fs::write(&path, "download_strategy:\n  type: air_gap\n  installation: missing\n")?;

    let err = load_global_config(&path).unwrap_err();
    assert!(matches!(err, RsdetectError::Validation(_)), "got {:?}", err);
    assert!(err.to_string().contains("missing"));

    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_global_config(camino::Utf8Path::new("/nonexistent/rsdetect.yaml")).unwrap_err();
    assert!(matches!(err, RsdetectError::Io { .. }), "got {:?}", err);
}

#[test]
fn test_optional_config_explicit_path() -> Result<()> {
    let dir = tempdir()?;
    let path = helpers::utf8(dir.path()).join("ci.yaml");
    std::fs::write(&path, "platform_version: \"2.0\"\n")?;

    let config = load_optional_config(Some(&path))?.expect("config should load");
    assert_eq!(config.platform_version.as_deref(), Some("2.0"));

    Ok(())
}
