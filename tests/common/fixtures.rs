//! Shared builders for the integration suites.

use std::time::Duration;

use ec2kit::test_support::{ScriptedApi, ScriptedConnector, ScriptedGroups, ScriptedSubnets};
use ec2kit::{Ec2Module, LaunchPolicy};

/// Module type every suite drives.
pub type ScriptedModule = Ec2Module<ScriptedConnector, ScriptedSubnets, ScriptedGroups>;

/// Builds a module over `api` with one VPC subnet, a `web` security group,
/// and millisecond launch polling.
pub fn module_with(api: &ScriptedApi) -> ScriptedModule {
    Ec2Module::new(
        ScriptedConnector::new(api.clone()),
        ScriptedSubnets::default().with_subnet("subnet-1", "vpc-1"),
        ScriptedGroups::default().with_group("vpc-1", "web", "sg-web"),
    )
    .with_launch_policy(LaunchPolicy::new(Duration::from_millis(1), 4))
}

