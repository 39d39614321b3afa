use const_format::concatcp;

const K8S_APP_KEY_PREFIX: &str = "app.kubernetes.io/";

/// The prefix of annotations describing how an object was built.
const MANIFESTGEN_KEY_PREFIX: &str = "app.manifestgen.dev/";

/// `app.kubernetes.io/name`, the application name.
pub const K8S_APP_NAME_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "name");

/// `app.kubernetes.io/version`, the application version.
pub const K8S_APP_VERSION_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "version");

/// `app.kubernetes.io/part-of`, the larger system the application belongs to.
pub const K8S_APP_PART_OF_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "part-of");

/// `app.kubernetes.io/managed-by`, the tool which manages the application.
pub const K8S_APP_MANAGED_BY_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "managed-by");

/// The commit the application was built from.
pub const COMMIT_ID_KEY: &str = concatcp!(MANIFESTGEN_KEY_PREFIX, "commit-id");

/// The repository the application was built from.
pub const VCS_URI_KEY: &str = concatcp!(MANIFESTGEN_KEY_PREFIX, "vcs-uri");

/// When the manifests were generated.
pub const BUILD_TIMESTAMP_KEY: &str = concatcp!(MANIFESTGEN_KEY_PREFIX, "build-timestamp");
