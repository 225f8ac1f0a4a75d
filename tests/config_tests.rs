//! Configuration loading, profile discovery, and connection resolution.

use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use ec2kit::config::ConfigError;
use ec2kit::test_support::{EnvGuard, ScriptedApi, ScriptedGroups, ScriptedSubnets};
use ec2kit::{
    ClientFactory, ConfiguredConnector, ConnectionDefaults, ConnectionParams, Credentials,
    Ec2Config, Ec2Error, Ec2Module, Profile, ProfileFile, ResolvedConnection,
};
use ortho_config::ConfigDiscovery;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn valid_config() -> Ec2Config {
    Ec2Config {
        region: String::from("us-east-1"),
        key: None,
        keyid: None,
        default_instance_type: String::from("m1.small"),
        poll_interval_secs: 5,
        max_poll_attempts: 60,
    }
}

#[rstest]
#[case::region(|cfg: &mut Ec2Config| cfg.region.clear(), "EC2_REGION", "region")]
#[case::instance_type(
    |cfg: &mut Ec2Config| cfg.default_instance_type = String::from("  "),
    "EC2_DEFAULT_INSTANCE_TYPE",
    "default_instance_type"
)]
#[case::key_without_keyid(
    |cfg: &mut Ec2Config| cfg.key = Some(String::from("secret")),
    "EC2_KEYID",
    "keyid"
)]
#[case::keyid_without_key(
    |cfg: &mut Ec2Config| cfg.keyid = Some(String::from("AKIAEXAMPLE")),
    "EC2_KEY",
    "key"
)]
fn validation_errors_are_actionable(
    valid_config: Ec2Config,
    #[case] mutate: fn(&mut Ec2Config),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);

    let error = cfg.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("ec2kit.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[tokio::test]
async fn environment_overrides_defaults() {
    let _guard = EnvGuard::set_vars(&[
        ("EC2_REGION", Some("ap-northeast-1")),
        ("EC2_MAX_POLL_ATTEMPTS", Some("12")),
        ("EC2_KEY", None),
        ("EC2_KEYID", None),
        ("EC2_DEFAULT_INSTANCE_TYPE", None),
        ("EC2_POLL_INTERVAL_SECS", None),
        ("EC2KIT_CONFIG_PATH", None),
    ])
    .await;

    let config = Ec2Config::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config should load: {err}"));

    assert_eq!(config.region, "ap-northeast-1");
    assert_eq!(config.max_poll_attempts, 12);
    assert_eq!(config.default_instance_type, "m1.small");
    assert_eq!(config.poll_interval_secs, 5);
}

#[derive(Clone, Default)]
struct RecordingFactory {
    api: ScriptedApi,
    built: Arc<Mutex<Vec<ResolvedConnection>>>,
}

impl RecordingFactory {
    fn built(&self) -> Vec<ResolvedConnection> {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientFactory for RecordingFactory {
    type Api = ScriptedApi;

    fn build(&self, connection: &ResolvedConnection) -> Result<Self::Api, Ec2Error> {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(connection.clone());
        Ok(self.api.clone())
    }
}

fn profiles_in(tmp: &TempDir, contents: &str) -> ProfileFile {
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    Dir::open_ambient_dir(&root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp dir: {err}"))
        .write("ec2kit.toml", contents)
        .unwrap_or_else(|err| panic!("write config: {err}"));
    ProfileFile::with_discovery(
        ConfigDiscovery::builder("ec2kit")
            .config_file_name("ec2kit.toml")
            .project_file_name("ec2kit.toml")
            .clear_project_roots()
            .add_project_root(&root)
            .build(),
    )
}

#[tokio::test]
async fn named_profiles_drive_connections() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let profiles = profiles_in(
        &tmp,
        "[profiles.prod]\nregion = \"eu-west-1\"\nkeyid = \"AKIAPROD\"\nkey = \"prod-secret\"\n",
    )
    .load()
    .unwrap_or_else(|err| panic!("load profiles: {err}"));
    let factory = RecordingFactory {
        api: ScriptedApi::new().with_zones(["eu-west-1a"]),
        ..RecordingFactory::default()
    };
    let connector = ConfiguredConnector::new(
        factory,
        ConnectionDefaults::from(&valid_config()),
        profiles,
    );
    let module = Ec2Module::new(connector, ScriptedSubnets::default(), ScriptedGroups::default());

    let zones = module
        .get_zones(&ConnectionParams::default().with_profile(Profile::Named(String::from("prod"))))
        .await
        .unwrap_or_else(|err| panic!("zones: {err}"));
    module
        .get_zones(&ConnectionParams::default())
        .await
        .unwrap_or_else(|err| panic!("zones: {err}"));

    assert_eq!(zones, vec!["eu-west-1a"]);
    assert_eq!(
        module.connector().factory().built(),
        vec![
            ResolvedConnection {
                region: String::from("eu-west-1"),
                credentials: Credentials::Static {
                    keyid: String::from("AKIAPROD"),
                    key: String::from("prod-secret"),
                },
            },
            ResolvedConnection {
                region: String::from("us-east-1"),
                credentials: Credentials::Ambient,
            },
        ]
    );
}

#[tokio::test]
async fn unknown_profiles_fail_before_any_remote_call() {
    let api = ScriptedApi::new();
    let factory = RecordingFactory {
        api: api.clone(),
        ..RecordingFactory::default()
    };
    let connector = ConfiguredConnector::new(
        factory,
        ConnectionDefaults::default(),
        ec2kit::Profiles::new(),
    );
    let module = Ec2Module::new(connector, ScriptedSubnets::default(), ScriptedGroups::default());
    let params = ConnectionParams::default().with_profile(Profile::Named(String::from("staging")));

    let err = module
        .get_zones(&params)
        .await
        .expect_err("profile is unknown");

    assert!(matches!(err, Ec2Error::Configuration(_)), "got {err:?}");
    assert!(module.connector().factory().built().is_empty());
    assert!(api.calls().is_empty());
}
