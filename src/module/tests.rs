//! Unit tests for the operation module.

use std::time::Duration;

use camino::Utf8Path;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use super::*;
use crate::api::{Image, InterfaceAttachment, KeyPair, NetworkInterface, RemoteError};
use crate::connection::ConnectionParams;
use crate::envelope::Envelope;
use crate::finder::{ImageSelector, ResourceClass, Selector};
use crate::projection::InstanceAttribute;
use crate::test_support::{ScriptedApi, ScriptedConnector, ScriptedGroups, ScriptedSubnets};
use crate::types::{AttachmentId, FilterSet, ImageId, InstanceId, NetworkInterfaceId, Tags, VpcId};

type TestModule = Ec2Module<ScriptedConnector, ScriptedSubnets, ScriptedGroups>;

fn module_for(api: &ScriptedApi) -> TestModule {
    Ec2Module::new(
        ScriptedConnector::new(api.clone()),
        ScriptedSubnets::default().with_subnet("subnet-1", "vpc-1"),
        ScriptedGroups::default()
            .with_group("vpc-1", "web", "sg-web")
            .with_group("vpc-1", "ssh", "sg-ssh"),
    )
    .with_launch_policy(LaunchPolicy::new(Duration::from_millis(1), 3))
}

fn params() -> ConnectionParams {
    ConnectionParams::default().with_region("eu-west-1")
}

fn interface(id: &str, name: &str) -> NetworkInterface {
    NetworkInterface {
        id: NetworkInterfaceId::from(id),
        region: String::from("us-east-1"),
        status: Some(String::from("available")),
        vpc_id: Some(VpcId::from("vpc-1")),
        tags: Tags::from([(String::from("Name"), name.to_owned())]),
        ..NetworkInterface::default()
    }
}

fn attached(mut eni: NetworkInterface, attachment_id: &str) -> NetworkInterface {
    eni.status = Some(String::from("in-use"));
    eni.attachment = Some(InterfaceAttachment {
        id: Some(AttachmentId::from(attachment_id)),
        device_index: Some(1),
        instance_id: Some(InstanceId::from("i-0001")),
        ..InterfaceAttachment::default()
    });
    eni
}

#[fixture]
fn web_fleet() -> ScriptedApi {
    ScriptedApi::new()
        .with_named_instance("i-0001", "web1")
        .with_named_instance("i-0002", "web2")
        .with_named_instance("i-0003", "web2")
}

#[rstest]
#[case(Some("web1"), None, InstanceTarget::Name(String::from("web1")))]
#[case(None, Some("i-0001"), InstanceTarget::Id(InstanceId::from("i-0001")))]
#[case(Some(""), Some("i-0001"), InstanceTarget::Id(InstanceId::from("i-0001")))]
fn instance_target_accepts_exactly_one_selector(
    #[case] name: Option<&str>,
    #[case] id: Option<&str>,
    #[case] expected: InstanceTarget,
) {
    assert_eq!(InstanceTarget::from_options(name, id), Ok(expected));
}

#[rstest]
#[case(Some("web1"), Some("i-0001"))]
#[case(None, None)]
fn instance_target_rejects_both_or_neither(#[case] name: Option<&str>, #[case] id: Option<&str>) {
    let err = InstanceTarget::from_options(name, id).expect_err("selector should be rejected");
    assert!(matches!(err, Ec2Error::Validation(_)), "got {err:?}");
}

#[test]
fn interface_target_prefers_the_identifier() {
    assert_eq!(
        InterfaceTarget::from_options(Some("eth1"), Some("eni-1")),
        Ok(InterfaceTarget::Id(NetworkInterfaceId::from("eni-1")))
    );
    assert!(InterfaceTarget::from_options(None, Some("")).is_err());
}

#[test]
fn detach_target_prefers_the_attachment() {
    assert_eq!(
        DetachTarget::from_options(Some("eth1"), None, Some("eni-attach-1")),
        Ok(DetachTarget::Attachment(AttachmentId::from("eni-attach-1")))
    );
    assert_eq!(
        DetachTarget::from_options(Some("eth1"), None, None),
        Ok(DetachTarget::Interface(InterfaceTarget::Name(String::from("eth1"))))
    );
    let err = DetachTarget::from_options(None, None, None).expect_err("nothing to detach");
    assert!(err.to_string().contains("attachment_id"));
}

#[rstest]
#[case("groups", "groupSet")]
#[case("source_dest_check", "sourceDestCheck")]
#[case("delete_on_termination", "deleteOnTermination")]
#[case("description", "description")]
fn attribute_names_are_translated(#[case] attribute: &str, #[case] expected: &str) {
    assert_eq!(api_attribute_name(attribute), expected);
}

#[test]
fn from_config_applies_polling_and_instance_type() {
    let config = crate::config::Ec2Config {
        region: String::from("us-east-1"),
        key: None,
        keyid: None,
        default_instance_type: String::from("t3.micro"),
        poll_interval_secs: 2,
        max_poll_attempts: 7,
    };
    let module = Ec2Module::from_config(
        ScriptedConnector::default(),
        ScriptedSubnets::default(),
        ScriptedGroups::default(),
        &config,
    )
    .expect("config should validate");

    assert_eq!(
        module.launch_policy(),
        LaunchPolicy::new(Duration::from_secs(2), 7)
    );
    assert_eq!(module.default_instance_type, "t3.micro");
}

#[tokio::test]
async fn get_zones_forwards_connection_params() {
    let api = ScriptedApi::new().with_zones(["eu-west-1a", "eu-west-1b"]);
    let module = module_for(&api);

    let zones = module.get_zones(&params()).await.expect("zones");

    assert_eq!(zones, vec!["eu-west-1a", "eu-west-1b"]);
    assert_eq!(module.connector().connections(), vec![params()]);
}

#[rstest]
#[case(Some("web1"), Ok(Some(InstanceId::from("i-0001"))))]
#[case(Some("db1"), Ok(None))]
#[tokio::test]
async fn get_id_resolves_single_matches(
    web_fleet: ScriptedApi,
    #[case] name: Option<&str>,
    #[case] expected: Result<Option<InstanceId>, Ec2Error>,
) {
    let module = module_for(&web_fleet);
    assert_eq!(module.get_id(name, &Tags::new(), &params()).await, expected);
}

#[rstest]
#[tokio::test]
async fn get_id_reports_ambiguous_names(web_fleet: ScriptedApi) {
    let module = module_for(&web_fleet);

    let err = module
        .get_id(Some("web2"), &Tags::new(), &params())
        .await
        .expect_err("two instances share the name");

    assert!(matches!(
        err,
        Ec2Error::AmbiguousSelector {
            class: ResourceClass::Instance,
            count: 2,
            ..
        }
    ));
}

#[rstest]
#[tokio::test]
async fn exists_connects_with_default_params(web_fleet: ScriptedApi) {
    let module = module_for(&web_fleet);

    assert_eq!(module.exists(&Selector::by_name("web2")).await, Ok(true));
    assert_eq!(module.exists(&Selector::by_id("i-9999")).await, Ok(false));
    assert!(
        module
            .connector()
            .connections()
            .iter()
            .all(|seen| *seen == ConnectionParams::default())
    );
}

#[rstest]
#[tokio::test]
async fn terminate_rejects_an_empty_selector(web_fleet: ScriptedApi) {
    let module = module_for(&web_fleet);

    let err = module
        .terminate(&Selector::default(), &params())
        .await
        .expect_err("empty selector");

    assert!(matches!(err, Ec2Error::Validation(_)));
    assert!(web_fleet.calls().is_empty());
}

#[tokio::test]
async fn run_tags_the_instance_once_running() {
    let api = ScriptedApi::new();
    api.queue_states(["pending", "running"]);
    let module = module_for(&api).with_default_instance_type("t3.nano");
    let request = LaunchRequest::new("ami-1")
        .with_name("web3")
        .with_tag("role", "web");

    let instance_id = module.run(&request, &params()).await.expect("launch");

    let launched = api
        .instances()
        .into_iter()
        .find(|instance| instance.id == instance_id)
        .expect("instance recorded");
    assert_eq!(launched.state, "running");
    assert_eq!(launched.instance_type.as_deref(), Some("t3.nano"));
    assert_eq!(launched.name(), Some("web3"));
    assert_eq!(launched.tags.get("role").map(String::as_str), Some("web"));
    assert_eq!(api.calls_to("create_tags").len(), 1);
}

#[tokio::test]
async fn run_reports_refused_reservations() {
    let api = ScriptedApi::new().refusing_reservations();
    let module = module_for(&api);

    let err = module
        .run(&LaunchRequest::new("ami-1"), &params())
        .await
        .expect_err("no reservation");

    assert_eq!(
        err,
        Ec2Error::ReservationRefused {
            image_id: String::from("ami-1")
        }
    );
    assert!(api.calls_to("instance_state").is_empty());
}

#[tokio::test]
async fn run_does_not_tag_failed_instances() {
    let api = ScriptedApi::new();
    api.queue_states(["terminated"]);
    let module = module_for(&api);

    let err = module
        .run(&LaunchRequest::new("ami-1").with_name("web3"), &params())
        .await
        .expect_err("instance terminated during startup");

    assert!(matches!(err, Ec2Error::StartupFailed { ref state, .. } if state == "terminated"));
    assert!(api.calls_to("create_tags").is_empty());
}

#[rstest]
#[tokio::test]
async fn get_attribute_resolves_names(web_fleet: ScriptedApi) {
    let api = web_fleet.with_attribute("i-0001", InstanceAttribute::InstanceType, json!("m1.small"));
    let module = module_for(&api);
    let target = InstanceTarget::Name(String::from("web1"));

    let record = module
        .get_attribute("instanceType", &target, &params())
        .await
        .expect("attribute");

    assert_eq!(
        record.get(&InstanceAttribute::InstanceType),
        Some(&json!("m1.small"))
    );
}

#[rstest]
#[tokio::test]
async fn unknown_attributes_fail_before_connecting(web_fleet: ScriptedApi) {
    let module = module_for(&web_fleet);
    let target = InstanceTarget::Id(InstanceId::from("i-0001"));

    let err = module
        .set_attribute("favouriteColour", &json!("blue"), &target, &params())
        .await
        .expect_err("attribute outside the allow-list");

    assert!(matches!(err, Ec2Error::Validation(_)));
    assert!(module.connector().connections().is_empty());
    assert!(web_fleet.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn set_attribute_modifies_by_id(web_fleet: ScriptedApi) {
    let module = module_for(&web_fleet);
    let target = InstanceTarget::Id(InstanceId::from("i-0002"));

    let changed = module
        .set_attribute("sourceDestCheck", &Value::Bool(false), &target, &params())
        .await
        .expect("modify");

    assert!(changed);
    assert_eq!(web_fleet.calls_to("describe_instances").len(), 0);
    assert_eq!(web_fleet.calls_to("modify_instance_attribute").len(), 1);
}

#[rstest]
#[tokio::test]
async fn create_image_needs_exactly_one_source(web_fleet: ScriptedApi) {
    let module = module_for(&web_fleet);
    let options = ImageOptions::new("web-golden");

    let err = module
        .create_image(&options, &Selector::by_name("web2"), &params())
        .await
        .expect_err("ambiguous source");
    assert!(matches!(err, Ec2Error::AmbiguousSelector { .. }));
    assert!(web_fleet.calls_to("create_image").is_empty());

    let image_id = module
        .create_image(&options, &Selector::by_name("web1"), &params())
        .await
        .expect("image");
    assert_eq!(web_fleet.calls_to("create_image")[0].target, "i-0001");

    let found = module
        .find_images(
            &ImageSelector {
                name: Some(String::from("web-golden")),
                ..ImageSelector::default()
            },
            &params(),
        )
        .await
        .expect("images");
    assert_eq!(found.ids(), vec![image_id]);
}

#[tokio::test]
async fn find_images_passes_owner_filters() {
    let api = ScriptedApi::new()
        .with_image(Image {
            id: ImageId::from("ami-1"),
            name: Some(String::from("base")),
            owner_id: Some(String::from("self")),
            ..Image::default()
        })
        .with_image(Image {
            id: ImageId::from("ami-2"),
            name: Some(String::from("base")),
            owner_id: Some(String::from("amazon")),
            ..Image::default()
        });
    let module = module_for(&api);
    let selector = ImageSelector {
        name: Some(String::from("base")),
        owners: vec![String::from("amazon")],
        ..ImageSelector::default()
    };

    let found = module.find_images(&selector, &params()).await.expect("images");

    assert_eq!(found.ids(), vec![ImageId::from("ami-2")]);
}

#[tokio::test]
async fn key_pair_lifecycle() {
    let api = ScriptedApi::new().with_key_pair(KeyPair {
        name: String::from("ops"),
        fingerprint: String::from("aa:bb"),
        material: None,
    });
    let module = module_for(&api);

    assert_eq!(
        module.get_key("ops", &params()).await,
        Ok(Some((String::from("ops"), String::from("aa:bb"))))
    );
    assert_eq!(module.get_key("missing", &params()).await, Ok(None));

    let fingerprint = module
        .import_key("deploy", "ssh-ed25519 AAAA", &params())
        .await
        .expect("import");
    assert_eq!(fingerprint, "fp:16");

    let names = module
        .get_keys(&[], &FilterSet::new(), &params())
        .await
        .expect("list");
    assert_eq!(names, vec!["ops", "deploy"]);

    assert_eq!(module.delete_key("ops", &params()).await, Ok(true));
    assert_eq!(
        module
            .get_keys(&[String::from("ops")], &FilterSet::new(), &params())
            .await,
        Ok(Vec::new())
    );
}

#[tokio::test]
async fn create_key_saves_private_material() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let dir = Utf8Path::from_path(tmp.path()).expect("utf-8 temp path");
    let api = ScriptedApi::new();
    let module = module_for(&api);

    let material = module
        .create_key("deploy", dir, &params())
        .await
        .expect("create key");

    let saved = std::fs::read_to_string(dir.join("deploy.pem")).expect("key file");
    assert_eq!(saved, material);
    assert!(material.contains("deploy"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(dir.join("deploy.pem"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn create_key_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let dir = Utf8Path::from_path(tmp.path()).expect("utf-8 temp path");
    std::fs::write(dir.join("deploy.pem"), "existing").expect("seed file");
    let api = ScriptedApi::new();
    let module = module_for(&api);

    let err = module
        .create_key("deploy", dir, &params())
        .await
        .expect_err("file exists");

    assert!(matches!(err, Ec2Error::KeyMaterial { .. }));
    assert!(api.calls_to("create_key_pair").is_empty());
    assert_eq!(
        std::fs::read_to_string(dir.join("deploy.pem")).expect("key file"),
        "existing"
    );
}

#[tokio::test]
async fn create_key_surfaces_provider_errors() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let dir = Utf8Path::from_path(tmp.path()).expect("utf-8 temp path");
    let api = ScriptedApi::new().with_key_pair(KeyPair {
        name: String::from("deploy"),
        ..KeyPair::default()
    });
    let module = module_for(&api);

    let err = module
        .create_key("deploy", dir, &params())
        .await
        .expect_err("duplicate key pair");

    assert!(matches!(err, Ec2Error::Remote(_)));
    assert!(!dir.join("deploy.pem").exists());
}

#[tokio::test]
async fn get_network_interface_reports_missing_as_none() {
    let api = ScriptedApi::new();
    let module = module_for(&api);

    let envelope = module
        .get_network_interface(&InterfaceTarget::Name(String::from("eth1")), &params())
        .await
        .expect("connect");

    assert_eq!(envelope, Envelope::Result(None));
}

#[tokio::test]
async fn get_network_interface_id_reports_ambiguous_names() {
    let api = ScriptedApi::new()
        .with_interface(interface("eni-1", "eth1"))
        .with_interface(interface("eni-2", "eth1"));
    let module = module_for(&api);

    let envelope = module
        .get_network_interface_id("eth1", &params())
        .await
        .expect("connect");

    assert_eq!(
        envelope,
        Envelope::error("Name specified is tagged on multiple ENIs.")
    );
}

#[tokio::test]
async fn create_network_interface_resolves_groups_and_tags() {
    let api = ScriptedApi::new();
    let module = module_for(&api);
    let request = CreateInterfaceRequest::new("eth1", "subnet-1")
        .with_group("web")
        .with_group("ssh");

    let description = module
        .create_network_interface(&request, &params())
        .await
        .expect("connect")
        .into_result()
        .expect("interface created");

    assert_eq!(description.tags.get("Name").map(String::as_str), Some("eth1"));
    let group_ids: Vec<&str> = description.groups.iter().map(|group| group.id.as_str()).collect();
    assert_eq!(group_ids, vec!["sg-web", "sg-ssh"]);
    assert_eq!(
        api.interfaces()[0].name(),
        Some("eth1"),
        "provider side tag should be applied"
    );
}

#[tokio::test]
async fn create_network_interface_needs_a_vpc_subnet() {
    let api = ScriptedApi::new();
    let module = module_for(&api);
    let request = CreateInterfaceRequest::new("eth1", "subnet-orphan");

    let envelope = module
        .create_network_interface(&request, &params())
        .await
        .expect("connect");

    assert_eq!(
        envelope,
        Envelope::error("subnet_id subnet-orphan does not map to a valid vpc id")
    );
    assert!(api.mutating_calls().is_empty());
}

#[tokio::test]
async fn create_network_interface_rejects_unknown_groups() {
    let api = ScriptedApi::new();
    let module = module_for(&api);
    let request = CreateInterfaceRequest::new("eth1", "subnet-1").with_group("nope");

    let envelope = module
        .create_network_interface(&request, &params())
        .await
        .expect("connect");

    assert!(!envelope.is_ok());
    assert!(api.mutating_calls().is_empty());
}

#[tokio::test]
async fn attach_then_detach_by_name() {
    let api = ScriptedApi::new().with_interface(interface("eni-1", "eth1"));
    let module = module_for(&api);
    let target = InterfaceTarget::Name(String::from("eth1"));

    let attachment_id = module
        .attach_network_interface(&target, &InstanceId::from("i-0001"), 0, &params())
        .await
        .expect("connect")
        .into_result()
        .expect("attached");
    assert_eq!(
        api.interfaces()[0]
            .attachment
            .as_ref()
            .and_then(|attachment| attachment.id.clone()),
        Some(attachment_id.clone())
    );

    let detached = module
        .detach_network_interface(&DetachTarget::Interface(target), false, &params())
        .await
        .expect("connect");
    assert_eq!(detached, Envelope::Result(true));
    assert_eq!(
        api.calls_to("detach_network_interface")[0].target,
        format!("{attachment_id} force=false")
    );
}

#[tokio::test]
async fn detach_requires_an_attachment() {
    let api = ScriptedApi::new().with_interface(interface("eni-1", "eth1"));
    let module = module_for(&api);
    let target = DetachTarget::Interface(InterfaceTarget::Id(NetworkInterfaceId::from("eni-1")));

    let envelope = module
        .detach_network_interface(&target, true, &params())
        .await
        .expect("connect");

    assert_eq!(envelope, Envelope::error("Attachment id not found for this ENI."));
    assert!(api.mutating_calls().is_empty());
}

#[tokio::test]
async fn detach_by_attachment_skips_the_lookup() {
    let api = ScriptedApi::new().with_interface(attached(interface("eni-1", "eth1"), "eni-attach-9"));
    let module = module_for(&api);
    let target = DetachTarget::Attachment(AttachmentId::from("eni-attach-9"));

    let envelope = module
        .detach_network_interface(&target, true, &params())
        .await
        .expect("connect");

    assert_eq!(envelope, Envelope::Result(true));
    assert!(api.calls_to("describe_network_interfaces").is_empty());
}

#[tokio::test]
async fn modify_groups_resolves_names_within_the_vpc() {
    let api = ScriptedApi::new().with_interface(interface("eni-1", "eth1"));
    let module = module_for(&api);
    let target = InterfaceTarget::Name(String::from("eth1"));

    let envelope = module
        .modify_network_interface_attribute(&target, "groups", &json!(["web", "ssh"]), &params())
        .await
        .expect("connect");

    assert_eq!(envelope, Envelope::Result(true));
    let changes = api.interface_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].1.attribute, "groupSet");
    assert_eq!(changes[0].1.value, json!(["sg-web", "sg-ssh"]));
}

#[tokio::test]
async fn modify_groups_rejects_malformed_values() {
    let api = ScriptedApi::new().with_interface(interface("eni-1", "eth1"));
    let module = module_for(&api);
    let target = InterfaceTarget::Name(String::from("eth1"));

    let err = module
        .modify_network_interface_attribute(&target, "groups", &json!(42), &params())
        .await
        .expect_err("groups must be names");

    assert!(matches!(err, Ec2Error::Validation(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn modify_delete_on_termination_uses_the_attachment() {
    let api = ScriptedApi::new().with_interface(attached(interface("eni-1", "eth1"), "eni-attach-1"));
    let module = module_for(&api);
    let target = InterfaceTarget::Id(NetworkInterfaceId::from("eni-1"));

    let envelope = module
        .modify_network_interface_attribute(
            &target,
            "delete_on_termination",
            &Value::Bool(true),
            &params(),
        )
        .await
        .expect("connect");

    assert_eq!(envelope, Envelope::Result(true));
    let changes = api.interface_changes();
    assert_eq!(changes[0].1.attribute, "deleteOnTermination");
    assert_eq!(
        changes[0].1.attachment_id,
        Some(AttachmentId::from("eni-attach-1"))
    );
}

#[tokio::test]
async fn interface_remote_failures_become_error_envelopes() {
    let api = ScriptedApi::new()
        .with_interface(interface("eni-1", "eth1"))
        .failing(
            "delete_network_interface",
            RemoteError::with_code("InvalidNetworkInterface.InUse", "interface is in use"),
        );
    let module = module_for(&api);

    let envelope = module
        .delete_network_interface(&InterfaceTarget::Name(String::from("eth1")), &params())
        .await
        .expect("connect");

    assert_eq!(
        envelope,
        Envelope::error("InvalidNetworkInterface.InUse: interface is in use")
    );
    assert_eq!(api.interfaces().len(), 1);
}

#[tokio::test]
async fn connection_failures_are_errors_not_envelopes() {
    let module = Ec2Module::new(
        ScriptedConnector::default()
            .failing(Ec2Error::Configuration(String::from("unknown profile staging"))),
        ScriptedSubnets::default(),
        ScriptedGroups::default(),
    );

    let err = module
        .delete_network_interface(&InterfaceTarget::Name(String::from("eth1")), &params())
        .await
        .expect_err("connection should fail");

    assert_eq!(
        err,
        Ec2Error::Configuration(String::from("unknown profile staging"))
    );
}
