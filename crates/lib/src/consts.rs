//! Version defaults, source locations and layout names.

pub const APP_NAME: &str = "pybundle";

/// Environment variable overriding the workspace root.
pub const ROOT_ENV: &str = "PYBUNDLE_ROOT";

pub const PYTHON_VERSION: &str = "3.9.2";
pub const OPENSSL_VERSION: &str = "1.1.1g";
pub const BZIP2_VERSION: &str = "1.0.8";
pub const MAC_DEP_TARGET: &str = "10.13";

/// Placeholder substituted with the builder version in URL and path templates.
pub const VERSION_PLACEHOLDER: &str = "${VERSION}";

pub const PYTHON_URL: &str = "https://www.python.org/ftp/python/${VERSION}/Python-${VERSION}.tgz";
pub const OPENSSL_URL: &str = "https://www.openssl.org/source/openssl-${VERSION}.tar.gz";
pub const BZIP2_URL: &str = "https://sourceware.org/pub/bzip2/bzip2-${VERSION}.tar.gz";

/// Homebrew framework location; `${VERSION}` is the major.minor version.
pub const HOMEBREW_ROOT: &str = "/usr/local/opt/python3/Frameworks/Python.framework/Versions/${VERSION}";

pub const DEFAULT_EXTERNAL: &str = "py";
pub const PLUGIN_EXTENSION: &str = "mxo";
pub const FRAMEWORK_NAME: &str = "Python.framework";
pub const FRAMEWORK_LIBRARY: &str = "Python";
pub const SITE_PACKAGES: &str = "site-packages";
