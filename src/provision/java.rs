//! Java executable lookup on the execution node.

use camino::Utf8PathBuf;
use tracing::debug;

use crate::environment::{self, EnvironmentSnapshot};
use crate::remote::OsFamily;

fn java_binary(os: OsFamily) -> &'static str {
    match os {
        OsFamily::Windows => "java.exe",
        OsFamily::Unix => "java",
    }
}

/// Resolves the java executable used to run a Detect jar.
///
/// Priority:
/// 1. `jdk_home` (the JDK selected for this build) + `bin/java`
/// 2. `DETECT_JAVA_PATH`
/// 3. `JAVA_HOME` + `bin/java`
/// 4. `java` found on the snapshot's `PATH`, or bare `java`
///
/// The result is canonicalized when the path exists; otherwise it is used as-is.
pub fn resolve_java(jdk_home: Option<&str>, env: &EnvironmentSnapshot, os: OsFamily) -> String {
    let java = if let Some(home) = jdk_home.filter(|h| !h.trim().is_empty()) {
        debug!("using java from the build's JDK at {}", home);
        Utf8PathBuf::from(home).join("bin").join(java_binary(os))
    } else if let Some(path) = env.get_non_blank(environment::DETECT_JAVA_PATH) {
        debug!("using java from {}: {}", environment::DETECT_JAVA_PATH, path);
        Utf8PathBuf::from(path)
    } else if let Some(home) = env.get_non_blank(environment::JAVA_HOME) {
        debug!("using java from {}: {}", environment::JAVA_HOME, home);
        Utf8PathBuf::from(home).join("bin").join(java_binary(os))
    } else {
        debug!(
            "no JDK configured, looking up java on PATH: {}",
            env.get(environment::PATH).unwrap_or_default()
        );
        lookup_on_path(env, os).unwrap_or_else(|| Utf8PathBuf::from("java"))
    };

    canonicalize(java)
}

fn lookup_on_path(env: &EnvironmentSnapshot, os: OsFamily) -> Option<Utf8PathBuf> {
    let path = env.get_non_blank(environment::PATH)?;
    let cwd = std::env::current_dir().ok()?;
    let found = which::which_in(java_binary(os), Some(path), cwd).ok()?;
    Utf8PathBuf::from_path_buf(found).ok()
}

fn canonicalize(java: Utf8PathBuf) -> String {
    match java.canonicalize_utf8() {
        Ok(canonical) => canonical.into_string(),
        Err(e) => {
            debug!("could not canonicalize {}, using it as-is: {}", java, e);
            java.into_string()
        }
    }
}
