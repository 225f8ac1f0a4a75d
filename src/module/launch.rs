//! Bounded wait for freshly launched instances.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::api::Ec2Api;
use crate::error::Ec2Error;
use crate::types::InstanceId;

const PENDING: &str = "pending";
const RUNNING: &str = "running";

/// How often and how many times a launch is checked before giving up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LaunchPolicy {
    /// Delay before each status check.
    pub poll_interval: Duration,
    /// Maximum number of status checks.
    pub max_attempts: u32,
}

impl LaunchPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts,
        }
    }
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 60)
    }
}

/// Waits until `instance_id` leaves `pending`.
///
/// Sleeps `poll_interval` before every check. Dropping the future abandons
/// the wait.
pub(crate) async fn wait_until_started<A>(
    api: &A,
    instance_id: &InstanceId,
    policy: LaunchPolicy,
) -> Result<(), Ec2Error>
where
    A: Ec2Api + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        sleep(policy.poll_interval).await;
        let state = api.instance_state(instance_id).await?;
        debug!(%instance_id, attempt, %state, "launch status");
        match state.as_str() {
            PENDING => {}
            RUNNING => return Ok(()),
            _ => {
                warn!(%instance_id, %state, "instance could not be started");
                return Err(Ec2Error::StartupFailed {
                    instance_id: instance_id.to_string(),
                    state,
                });
            }
        }
    }

    warn!(%instance_id, attempts = policy.max_attempts, "instance still pending");
    Err(Ec2Error::StartupTimeout {
        instance_id: instance_id.to_string(),
        attempts: policy.max_attempts,
    })
}
